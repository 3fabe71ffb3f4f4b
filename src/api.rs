use crate::{
    dispatch::{Identity, Principal},
    host::Pages,
    param::{Attachment, Token},
    response::{JavaScript, handle_service_result},
    token::TokenManager,
    update::UpdateRequest,
};
use actix_multipart::form::{MultipartForm, tempfile::TempFile, text::Text};
use actix_web::{HttpResponse, Responder, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use anyhow::{Context, Result};
use base64::{Engine, prelude::BASE64_STANDARD};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_mount_id")]
    id: String,
}

fn default_mount_id() -> String {
    "app".to_string()
}

#[derive(Deserialize)]
pub struct FilePayload {
    name: Option<String>,
    content_type: Option<String>,
    /// Base64 encoded content
    data: String,
}

#[derive(Deserialize)]
pub struct UpdatePayload {
    /// Snapshot as JSON text, a plain object is accepted too
    snapshot: Value,
    method: String,
    #[serde(default)]
    parameters: Vec<Token>,
    #[serde(default)]
    files: Vec<FilePayload>,
}

impl UpdatePayload {
    fn into_request(self) -> Result<UpdateRequest> {
        let files = self
            .files
            .into_iter()
            .enumerate()
            .map(|(i, file)| {
                Ok(Attachment {
                    data: BASE64_STANDARD
                        .decode(file.data)
                        .with_context(|| format!("failed to decode file {i}"))?,
                    file_name: file.name,
                    content_type: file.content_type,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(UpdateRequest {
            snapshot: snapshot_text(self.snapshot),
            method: self.method,
            parameters: self.parameters,
            files,
        })
    }
}

fn snapshot_text(snapshot: Value) -> String {
    match snapshot {
        Value::String(text) => text,
        other => other.to_string(),
    }
}

#[derive(MultipartForm)]
pub struct UploadForm {
    snapshot: Text<String>,
    method: Text<String>,
    /// JSON array of argument tokens
    parameters: Option<Text<String>>,
    files: Vec<TempFile>,
}

impl UploadForm {
    fn into_request(self) -> Result<UpdateRequest> {
        let parameters = match &self.parameters {
            Some(text) if !text.trim().is_empty() => {
                serde_json::from_str(text).context("failed to parse parameters")?
            }
            _ => Vec::new(),
        };

        let files = self
            .files
            .into_iter()
            .map(|file| {
                Ok(Attachment {
                    data: std::fs::read(file.file.path())
                        .context("failed to read uploaded file")?,
                    file_name: file.file_name,
                    content_type: file.content_type.map(|mime| mime.to_string()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(UpdateRequest {
            snapshot: self.snapshot.into_inner(),
            method: self.method.into_inner(),
            parameters,
            files,
        })
    }
}

#[derive(Clone)]
pub struct Api {
    pub pages: Pages,
}

impl Api {
    pub fn new(pages: Pages) -> Self {
        Api { pages }
    }

    /// Register all routes of the page service
    pub fn configure(cfg: &mut web::ServiceConfig) {
        cfg.route("/version", web::get().to(Self::version))
            .route("/{page}/page.js", web::get().to(Self::page_script))
            .route("/{page}/component.js", web::get().to(Self::component_script))
            .route("/{page}/update", web::post().to(Self::update))
            .route("/{page}/upload", web::post().to(Self::upload));
    }

    pub async fn version() -> impl Responder {
        HttpResponse::Ok().body(env!("CARGO_PKG_VERSION"))
    }

    pub async fn page_script(
        api: web::Data<Self>,
        page: web::Path<String>,
        query: web::Query<PageQuery>,
    ) -> impl Responder {
        debug!("page_script() called for {page}");

        let Some(view) = api.pages.get(&page) else {
            return unknown_page(&page);
        };

        handle_service_result(
            view.render_page(&query.id).map(JavaScript),
            "page_script",
        )
    }

    pub async fn component_script(api: web::Data<Self>, page: web::Path<String>) -> impl Responder {
        debug!("component_script() called for {page}");

        let Some(view) = api.pages.get(&page) else {
            return unknown_page(&page);
        };

        handle_service_result(
            view.render_component(&format!("/{page}")).map(JavaScript),
            "component_script",
        )
    }

    pub async fn update(
        api: web::Data<Self>,
        token_manager: web::Data<TokenManager>,
        auth: Option<BearerAuth>,
        page: web::Path<String>,
        body: web::Json<UpdatePayload>,
    ) -> impl Responder {
        debug!("update() called for {page}::{}", body.method);

        match body.into_inner().into_request() {
            Ok(request) => Self::run_update(&api, &token_manager, auth, &page, request),
            Err(e) => bad_request(e),
        }
    }

    pub async fn upload(
        api: web::Data<Self>,
        token_manager: web::Data<TokenManager>,
        auth: Option<BearerAuth>,
        page: web::Path<String>,
        MultipartForm(form): MultipartForm<UploadForm>,
    ) -> impl Responder {
        debug!("upload() called for {page}::{}", form.method.as_str());

        match form.into_request() {
            Ok(request) => Self::run_update(&api, &token_manager, auth, &page, request),
            Err(e) => bad_request(e),
        }
    }

    fn run_update(
        api: &Api,
        token_manager: &TokenManager,
        auth: Option<BearerAuth>,
        page: &str,
        request: UpdateRequest,
    ) -> HttpResponse {
        let Some(view) = api.pages.get(page) else {
            return unknown_page(page);
        };

        let caller: Option<Principal> =
            auth.and_then(|auth| token_manager.verify_token(auth.token()));

        handle_service_result(
            view.update(request, caller.as_ref().map(|c| c as &dyn Identity)),
            "update",
        )
    }
}

fn unknown_page(page: &str) -> HttpResponse {
    warn!("no page registered as '{page}'");
    HttpResponse::NotFound().body(format!("page {page} not found"))
}

fn bad_request(e: anyhow::Error) -> HttpResponse {
    warn!("rejected update request: {e:#}");
    HttpResponse::BadRequest().body(format!("{e:#}"))
}
