use crate::{diff::ChangeSet, error::Error};
use actix_web::{HttpResponse, http::StatusCode};
use log::{error, warn};

/// Rendered page or component script
pub struct JavaScript(pub String);

/// Trait for converting service results into HTTP responses
pub trait ServiceResultResponse {
    fn into_response(self) -> HttpResponse;
}

impl ServiceResultResponse for JavaScript {
    fn into_response(self) -> HttpResponse {
        HttpResponse::Ok()
            .content_type("application/javascript; charset=utf-8")
            .body(self.0)
    }
}

impl ServiceResultResponse for ChangeSet {
    fn into_response(self) -> HttpResponse {
        HttpResponse::Ok().json(self)
    }
}

/// Status code reported for a failed render or update
pub fn status_code(error: &Error) -> StatusCode {
    match error {
        Error::Definition(_) | Error::ActionFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        Error::Authorization(_) => StatusCode::FORBIDDEN,
        Error::Coercion(_) | Error::InvalidSnapshot(_) => StatusCode::BAD_REQUEST,
    }
}

/// Convert a render or update result into a response
///
/// Failures carry their message as body and never a partial result.
///
/// # Arguments
/// * `result` - The Result to handle
/// * `operation` - Context message describing the operation
pub fn handle_service_result<T>(result: Result<T, Error>, operation: &str) -> HttpResponse
where
    T: ServiceResultResponse,
{
    match result {
        Ok(data) => data.into_response(),
        Err(e) => {
            let status = status_code(&e);

            if status.is_server_error() {
                error!("{operation} failed: {e:#}");
            } else {
                warn!("{operation} failed: {e:#}");
            }

            HttpResponse::build(status).body(e.to_string())
        }
    }
}
