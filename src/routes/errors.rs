use crate::middleware::session_viewer;
use crate::models::db_operations::DbError;
use actix_session::SessionExt;
use actix_web::{
    dev::ServiceResponse,
    http::{header, StatusCode},
    middleware::{ErrorHandlerResponse, ErrorHandlers},
    web, HttpResponse, ResponseError,
};
use tera::{Context, Tera};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Page not found")]
    NotFound,
    #[error("Login required to access '{next}'")]
    LoginRequired { next: String },
    #[error("Database error: {0}")]
    Db(#[from] DbError),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
    #[error("Upload error: {0}")]
    Upload(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<r2d2::Error> for AppError {
    fn from(err: r2d2::Error) -> Self {
        AppError::Db(DbError::Pool(err))
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Db(DbError::Rusqlite(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(format!("I/O error: {}", err))
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(err: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("Blocking task failed: {}", err))
    }
}

impl From<actix_session::SessionInsertError> for AppError {
    fn from(err: actix_session::SessionInsertError) -> Self {
        AppError::Internal(format!("Session write failed: {}", err))
    }
}

/// Where an anonymous visitor is sent, remembering the page they asked for.
pub fn login_url(next: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("/auth/login/?next={}", encoded)
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::LoginRequired { .. } => StatusCode::FOUND,
            AppError::Upload(_) => StatusCode::BAD_REQUEST,
            AppError::Db(_) | AppError::Template(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::LoginRequired { next } => HttpResponse::Found()
                .append_header((header::LOCATION, login_url(next)))
                .finish(),
            other => {
                let status = other.status_code();
                if status.is_server_error() {
                    log::error!("{}", other);
                }
                // The body is filled in by the error page handlers.
                HttpResponse::build(status).finish()
            }
        }
    }
}

// ====================================================================
// =========================== ERROR PAGES ============================
// ====================================================================

pub fn error_pages<B: 'static>() -> ErrorHandlers<B> {
    ErrorHandlers::new()
        .handler(StatusCode::NOT_FOUND, render_not_found)
        .handler(StatusCode::FORBIDDEN, render_request_rejected)
        .handler(StatusCode::BAD_REQUEST, render_request_rejected)
        .handler(StatusCode::UNPROCESSABLE_ENTITY, render_request_rejected)
        .handler(StatusCode::INTERNAL_SERVER_ERROR, render_server_error)
}

fn render_not_found<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    render_error_page(res, "pages/404.html")
}

// CSRF failures and malformed submissions land here.
fn render_request_rejected<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    render_error_page(res, "pages/403csrf.html")
}

fn render_server_error<B>(res: ServiceResponse<B>) -> actix_web::Result<ErrorHandlerResponse<B>> {
    render_error_page(res, "pages/500.html")
}

fn render_error_page<B>(res: ServiceResponse<B>, template: &str) -> actix_web::Result<ErrorHandlerResponse<B>> {
    let rendered = {
        let req = res.request();
        let viewer = session_viewer(&req.get_session());
        let mut ctx = Context::new();
        ctx.insert("user", &viewer);
        ctx.insert("status", &res.status().as_u16());

        match req.app_data::<web::Data<Tera>>() {
            Some(tera) => match tera.render(template, &ctx) {
                Ok(body) => Some(body),
                Err(err) => {
                    log::error!("Failed to render error page '{}': {}", template, err);
                    None
                }
            },
            None => None,
        }
    };

    let Some(body) = rendered else {
        return Ok(ErrorHandlerResponse::Response(res.map_into_left_body()));
    };

    let (req, res) = res.into_parts();
    let res = res.set_body(body);
    let mut res = ServiceResponse::new(req, res)
        .map_into_boxed_body()
        .map_into_right_body();
    res.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    Ok(ErrorHandlerResponse::Response(res))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_redirect_keeps_the_requested_path() {
        let response = AppError::LoginRequired { next: "/posts/3/edit/".to_string() }.error_response();
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers().get(header::LOCATION).unwrap().to_str().unwrap();
        assert_eq!(location, "/auth/login/?next=%2Fposts%2F3%2Fedit%2F");
    }

    #[test]
    fn statuses_follow_the_variant() {
        assert_eq!(AppError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Internal("boom".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            AppError::Db(DbError::Rusqlite(rusqlite::Error::QueryReturnedNoRows)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
