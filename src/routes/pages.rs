use crate::helper::public_helpers::{base_context, render};
use crate::middleware::SessionUser;
use crate::routes::errors::AppError;
use actix_web::{web, HttpResponse};
use tera::Tera;

pub fn config_pages(cfg: &mut web::ServiceConfig) {
    cfg.route("/pages/about/", web::get().to(about))
        .route("/pages/rules/", web::get().to(rules));
}

async fn about(viewer: Option<SessionUser>, tera: web::Data<Tera>) -> Result<HttpResponse, AppError> {
    render(&tera, "pages/about.html", &base_context(viewer.as_ref()))
}

async fn rules(viewer: Option<SessionUser>, tera: web::Data<Tera>) -> Result<HttpResponse, AppError> {
    render(&tera, "pages/rules.html", &base_context(viewer.as_ref()))
}
