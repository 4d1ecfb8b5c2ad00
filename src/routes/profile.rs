use crate::config::Config;
use crate::forms::{CsrfForm, FormErrors, ProfileData, ProfileForm};
use crate::helper::public_helpers::{base_context, fetch_post_page, redirect, render, PageQuery};
use crate::middleware::{self, SessionUser};
use crate::models::db_operations::posts_db_operations::PostQuery;
use crate::models::db_operations::users_db_operations;
use crate::models::local_display;
use crate::routes::errors::AppError;
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfToken};
use actix_session::Session;
use actix_web::{web, HttpResponse};
use chrono::Utc;
use rusqlite::Connection;
use tera::Tera;

pub fn config_profile(cfg: &mut web::ServiceConfig) {
    // `edit` must be matched before it can be taken for a username.
    cfg.route("/profile/edit/", web::get().to(show_edit_profile_form))
        .route("/profile/edit/", web::post().to(edit_profile_action))
        .route("/profile/{username}/", web::get().to(profile_page));
}

async fn profile_page(
    viewer: Option<SessionUser>,
    path: web::Path<String>,
    query: web::Query<PageQuery>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    config: web::Data<Config>,
) -> Result<HttpResponse, AppError> {
    let username = path.into_inner();
    let conn = pool.get()?;
    let profile = users_db_operations::read_user_by_username(&conn, &username)?.ok_or(AppError::NotFound)?;

    // The owner sees drafts and scheduled posts too.
    let is_owner = viewer.as_ref().map_or(false, |v| v.id == profile.id);
    let posts = if is_owner {
        PostQuery::all().by_author(profile.id)
    } else {
        PostQuery::visible(Utc::now()).by_author(profile.id)
    };
    let page = fetch_post_page(&conn, &posts, query.page.as_deref(), config.posts_per_page)?;

    let mut ctx = base_context(viewer.as_ref());
    ctx.insert("profile", &profile);
    ctx.insert("profile_joined", &local_display(&profile.date_joined));
    ctx.insert("is_owner", &is_owner);
    ctx.insert("page_obj", &page);
    render(&tera, "blog/profile.html", &ctx)
}

fn render_profile_form(
    tera: &Tera,
    user: &SessionUser,
    form: &ProfileForm,
    errors: &FormErrors,
    csrf_token: &str,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(Some(user));
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("csrf_token", csrf_token);
    render(tera, "blog/user.html", &ctx)
}

/// Field checks plus the one rule that needs the database: the new username
/// must not belong to someone else.
fn bind_profile_form(conn: &Connection, form: &ProfileForm, user_id: i64) -> Result<Result<ProfileData, FormErrors>, AppError> {
    let data = match form.validate() {
        Ok(data) => data,
        Err(errors) => return Ok(Err(errors)),
    };
    if users_db_operations::username_taken(conn, &data.username, Some(user_id))? {
        let mut errors = FormErrors::default();
        errors.add("username", "A user with that username already exists.");
        return Ok(Err(errors));
    }
    Ok(Ok(data))
}

async fn show_edit_profile_form(
    user: SessionUser,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    let conn = pool.get()?;
    let stored = users_db_operations::read_user_by_id(&conn, user.id)?.ok_or(AppError::NotFound)?;
    render_profile_form(&tera, &user, &ProfileForm::from_user(&stored), &FormErrors::default(), token.get())
}

async fn edit_profile_action(
    user: SessionUser,
    session: Session,
    form: Csrf<web::Form<CsrfForm<ProfileForm>>>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let submitted = form.into_inner().into_inner();
    let conn = pool.get()?;

    match bind_profile_form(&conn, &submitted.fields, user.id)? {
        Ok(data) => {
            users_db_operations::update_profile(&conn, user.id, &data)?;
            middleware::rename_session_user(&session, &data.username)?;
            log::info!("User {} updated their profile as '{}'", user.id, data.username);
            Ok(redirect(&format!("/profile/{}/", data.username)))
        }
        Err(errors) => render_profile_form(&tera, &user, &submitted.fields, &errors, submitted.token()),
    }
}
