use crate::forms::{safe_next, CsrfForm, FormErrors, LoginForm, RegistrationForm};
use crate::helper::public_helpers::{base_context, redirect, render};
use crate::middleware::{self, SessionUser};
use crate::models::db_operations::users_db_operations;
use crate::routes::errors::AppError;
use crate::DbPool;
use actix_csrf::extractor::{Csrf, CsrfToken};
use actix_session::Session;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tera::Tera;

const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Deserialize)]
struct NextQuery {
    next: Option<String>,
}

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.route("/auth/login/", web::get().to(show_login_form))
        .route("/auth/login/", web::post().to(login_action))
        .route("/auth/logout/", web::post().to(logout_action))
        .route("/auth/registration/", web::get().to(show_registration_form))
        .route("/auth/registration/", web::post().to(registration_action));
}

fn render_login(
    tera: &Tera,
    viewer: Option<&SessionUser>,
    form: &LoginForm,
    error: Option<&str>,
    csrf_token: &str,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(viewer);
    ctx.insert("form", form);
    ctx.insert("error", &error);
    ctx.insert("csrf_token", csrf_token);
    render(tera, "registration/login.html", &ctx)
}

async fn show_login_form(
    viewer: Option<SessionUser>,
    query: web::Query<NextQuery>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    let form = LoginForm { next: safe_next(query.next.as_deref()), ..Default::default() };
    render_login(&tera, viewer.as_ref(), &form, None, token.get())
}

async fn login_action(
    session: Session,
    form: Csrf<web::Form<CsrfForm<LoginForm>>>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let submitted = form.into_inner().into_inner();
    let login = &submitted.fields;
    let conn = pool.get()?;

    match users_db_operations::verify_credentials(&conn, login.username.trim(), &login.password)? {
        Some(user) => {
            middleware::log_in(&session, &user)?;
            users_db_operations::update_last_login_time(&conn, user.id)?;
            log::info!("User '{}' logged in", user.username);
            let target = safe_next(login.next.as_deref()).unwrap_or_else(|| "/".to_string());
            Ok(redirect(&target))
        }
        None => {
            log::warn!("Failed login attempt for username '{}'", login.username);
            render_login(&tera, None, login, Some(INVALID_LOGIN), submitted.token())
        }
    }
}

async fn logout_action(session: Session, tera: web::Data<Tera>) -> Result<HttpResponse, AppError> {
    middleware::log_out(&session);
    render(&tera, "registration/logged_out.html", &base_context(None))
}

fn render_registration(
    tera: &Tera,
    viewer: Option<&SessionUser>,
    form: &RegistrationForm,
    errors: &FormErrors,
    csrf_token: &str,
) -> Result<HttpResponse, AppError> {
    let mut ctx = base_context(viewer);
    ctx.insert("form", form);
    ctx.insert("errors", errors);
    ctx.insert("csrf_token", csrf_token);
    render(tera, "registration/registration_form.html", &ctx)
}

async fn show_registration_form(
    viewer: Option<SessionUser>,
    tera: web::Data<Tera>,
    token: CsrfToken,
) -> Result<HttpResponse, AppError> {
    render_registration(&tera, viewer.as_ref(), &RegistrationForm::default(), &FormErrors::default(), token.get())
}

async fn registration_action(
    viewer: Option<SessionUser>,
    form: Csrf<web::Form<CsrfForm<RegistrationForm>>>,
    pool: web::Data<DbPool>,
    tera: web::Data<Tera>,
) -> Result<HttpResponse, AppError> {
    let submitted = form.into_inner().into_inner();
    let conn = pool.get()?;

    let data = match submitted.fields.validate() {
        Ok(data) if users_db_operations::username_taken(&conn, &data.username, None)? => {
            let mut errors = FormErrors::default();
            errors.add("username", "A user with that username already exists.");
            Err(errors)
        }
        other => other,
    };

    match data {
        Ok(data) => {
            users_db_operations::create_user(&conn, &data.username, &data.email, &data.password, false)?;
            log::info!("Registered new user '{}'", data.username);
            Ok(redirect("/"))
        }
        Err(errors) => render_registration(&tera, viewer.as_ref(), &submitted.fields, &errors, submitted.token()),
    }
}
