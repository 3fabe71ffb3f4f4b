use anyhow::{Context, Result, ensure};
use std::{env, path::PathBuf, sync::OnceLock};
use uuid::Uuid;

/// Application configuration loaded and validated at startup
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// TLS certificate configuration, plain HTTP when absent
    pub certificate: Option<CertificateConfig>,

    /// Caller token configuration
    pub token: TokenConfig,

    /// Multipart upload limits
    pub upload: UploadConfig,

    /// Directory served under `/static`
    pub static_dir: PathBuf,

    /// Directory with `<page>.html`, `.js` and `.css` files replacing the
    /// built-in markup
    pub markup_dir: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct CertificateConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct TokenConfig {
    pub secret: String,
}

#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub total_limit: usize,
    pub memory_limit: usize,
}

impl AppConfig {
    /// Get or load the application configuration
    ///
    /// On first call all configuration is loaded from environment variables,
    /// subsequent calls return the cached instance.
    ///
    /// # Panics
    /// Panics if configuration loading fails. The server cannot start
    /// without a valid configuration.
    pub fn get() -> &'static Self {
        static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();
        APP_CONFIG
            .get_or_init(|| Self::load().expect("failed to load application configuration"))
    }

    /// Load all configuration from environment variables
    pub fn load() -> Result<Self> {
        Ok(Self {
            server: ServerConfig::load()?,
            certificate: CertificateConfig::load()?,
            token: TokenConfig::load(),
            upload: UploadConfig::load()?,
            static_dir: env::var("STATIC_DIR")
                .unwrap_or_else(|_| "static".to_string())
                .into(),
            markup_dir: env::var("MARKUP_DIR").ok().map(PathBuf::from),
        })
    }
}

impl ServerConfig {
    fn load() -> Result<Self> {
        let port = parse_var("UI_PORT", 1977)?;
        let bind_address = env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0".to_string());

        Ok(Self { bind_address, port })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

impl CertificateConfig {
    fn load() -> Result<Option<Self>> {
        match (env::var("CERT_PATH"), env::var("KEY_PATH")) {
            (Ok(cert_path), Ok(key_path)) => Ok(Some(Self {
                cert_path: cert_path.into(),
                key_path: key_path.into(),
            })),
            (Err(_), Err(_)) => Ok(None),
            _ => anyhow::bail!("failed to load certificate config: CERT_PATH and KEY_PATH must be set together"),
        }
    }
}

impl TokenConfig {
    fn load() -> Self {
        // tokens issued before a restart are invalid unless a secret is configured
        let secret = env::var("TOKEN_SECRET").unwrap_or_else(|_| Uuid::new_v4().to_string());

        Self { secret }
    }
}

impl UploadConfig {
    fn load() -> Result<Self> {
        let total_limit = parse_var("UPLOAD_LIMIT_BYTES", 250 * 1024 * 1024)?;
        let memory_limit = parse_var("MEMORY_LIMIT_BYTES", 10 * 1024 * 1024)?;

        ensure!(
            memory_limit <= total_limit,
            "failed to load upload config: MEMORY_LIMIT_BYTES exceeds UPLOAD_LIMIT_BYTES"
        );

        Ok(Self {
            total_limit,
            memory_limit,
        })
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse()
            .with_context(|| format!("failed to parse {name}: invalid format")),
        Err(_) => Ok(default),
    }
}
