use actix_files::Files;
use actix_multipart::form::MultipartFormConfig;
use actix_server::ServerHandle;
use actix_web::{
    App, HttpServer,
    web::{self, Data},
};
use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use log::{debug, error, info};
use rustls::crypto::{CryptoProvider, ring::default_provider};
use std::io::Write;
use vue_page::{
    api::Api,
    config::{AppConfig, CertificateConfig},
    pages,
    token::TokenManager,
};

#[actix_web::main]
async fn main() {
    if let Err(e) = run().await {
        error!("application error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    initialize()?;

    let (server_handle, server_task) = run_server().context("failed to start server")?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            debug!("ctrl-c received");
        },
        result = server_task => {
            match result {
                Ok(Ok(())) => debug!("server stopped normally"),
                Ok(Err(e)) => error!("server stopped with error: {e}"),
                Err(e) => error!("server task panicked: {e}"),
            }
        },
    }

    info!("shutting down");
    server_handle.stop(true).await;
    info!("shutdown complete");

    Ok(())
}

fn initialize() -> Result<()> {
    log_panics::init();

    let mut builder = if cfg!(debug_assertions) {
        Builder::from_env(Env::default().default_filter_or("debug"))
    } else {
        Builder::from_env(Env::default().default_filter_or("info"))
    };

    builder.format(|f, record| match record.level() {
        log::Level::Error => {
            eprintln!("{}", record.args());
            Ok(())
        }
        _ => {
            writeln!(f, "{}", record.args())
        }
    });

    builder.target(Target::Stdout).init();

    info!("module version: {}", env!("CARGO_PKG_VERSION"));

    CryptoProvider::install_default(default_provider())
        .map_err(|_| anyhow::anyhow!("crypto provider already installed"))?;

    Ok(())
}

fn run_server() -> Result<(
    ServerHandle,
    tokio::task::JoinHandle<Result<(), std::io::Error>>,
)> {
    let config = AppConfig::get();
    let pages = match &config.markup_dir {
        Some(dir) => pages::load(dir),
        None => pages::registry().map_err(Into::into),
    }
    .context("failed to register pages")?;

    for name in pages.names() {
        info!("serving /{name}/page.js and /{name}/component.js");
    }

    let api = Api::new(pages);
    let token_manager = TokenManager::new(&config.token.secret);
    let upload = config.upload.clone();
    let static_dir = config
        .static_dir
        .try_exists()
        .unwrap_or(false)
        .then(|| config.static_dir.clone());

    let server = HttpServer::new(move || {
        let app = App::new()
            .app_data(
                MultipartFormConfig::default()
                    .total_limit(upload.total_limit)
                    .memory_limit(upload.memory_limit),
            )
            .app_data(Data::new(token_manager.clone()))
            .app_data(Data::new(api.clone()))
            .configure(Api::configure);

        let app = match &static_dir {
            Some(dir) => app.service(Files::new("/static", dir)),
            None => app,
        };

        app.default_service(web::route().to(not_found))
    });

    let address = config.server.address();
    let server = match &config.certificate {
        Some(certificate) => {
            info!("listening on https://{address}");
            server
                .bind_rustls_0_23(&address, load_tls_config(certificate)?)
                .context("failed to bind server")?
        }
        None => {
            info!("listening on http://{address}");
            server.bind(&address).context("failed to bind server")?
        }
    }
    .disable_signals()
    .run();

    Ok((server.handle(), tokio::spawn(server)))
}

async fn not_found() -> actix_web::HttpResponse {
    actix_web::HttpResponse::NotFound().finish()
}

fn load_tls_config(paths: &CertificateConfig) -> Result<rustls::ServerConfig> {
    let mut tls_certs = std::io::BufReader::new(
        std::fs::File::open(&paths.cert_path).context("failed to open certificate file")?,
    );

    let mut tls_key = std::io::BufReader::new(
        std::fs::File::open(&paths.key_path).context("failed to open key file")?,
    );

    let tls_certs = rustls_pemfile::certs(&mut tls_certs)
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse certificate pem")?;

    let key_item = rustls_pemfile::read_one(&mut tls_key)
        .context("failed to read key pem file")?
        .context("no valid key found in pem file")?;

    let config = match key_item {
        rustls_pemfile::Item::Pkcs1Key(key) => rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(tls_certs, rustls::pki_types::PrivateKeyDer::Pkcs1(key))
            .context("failed to create tls config with pkcs1 key")?,
        rustls_pemfile::Item::Pkcs8Key(key) => rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(tls_certs, rustls::pki_types::PrivateKeyDer::Pkcs8(key))
            .context("failed to create tls config with pkcs8 key")?,
        _ => anyhow::bail!("unexpected key type in pem file"),
    };

    Ok(config)
}
