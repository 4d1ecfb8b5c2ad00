use crate::middleware::SessionUser;
use crate::models::db_operations::posts_db_operations::{self, PostQuery};
use crate::models::pagination::{Page, PageWindow};
use crate::models::PostCard;
use crate::routes::errors::AppError;
use actix_web::{http::header, HttpResponse};
use chrono::Utc;
use rusqlite::Connection;
use serde::Deserialize;
use tera::{Context, Tera};

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

/// A context carrying the visitor, which the base layout always reads.
pub fn base_context(viewer: Option<&SessionUser>) -> Context {
    let mut ctx = Context::new();
    ctx.insert("user", &viewer);
    ctx
}

pub fn render(tera: &Tera, template: &str, ctx: &Context) -> Result<HttpResponse, AppError> {
    let rendered = tera.render(template, ctx).map_err(|err| {
        log::error!("Template rendering error for '{}': {:?}", template, err);
        err
    })?;
    Ok(HttpResponse::Ok().content_type("text/html; charset=utf-8").body(rendered))
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found().append_header((header::LOCATION, location)).finish()
}

/// Loads one page of a post listing; a page outside the listing is a 404.
pub fn fetch_post_page(
    conn: &Connection,
    query: &PostQuery,
    raw_page: Option<&str>,
    per_page: u32,
) -> Result<Page<PostCard>, AppError> {
    let total = posts_db_operations::count_posts(conn, query)?;
    let window = PageWindow::resolve(raw_page, total, per_page).ok_or(AppError::NotFound)?;
    let now = Utc::now();
    let cards = posts_db_operations::read_posts(conn, query, window.limit(), window.offset())?
        .iter()
        .map(|post| post.card(now))
        .collect();
    Ok(Page::new(cards, window))
}
