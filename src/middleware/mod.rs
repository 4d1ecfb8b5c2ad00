use crate::models::User;
use crate::routes::errors::AppError;
use actix_csrf::CsrfMiddleware;
use actix_session::{storage::CookieSessionStore, Session, SessionExt, SessionMiddleware};
use actix_web::{
    body::EitherBody,
    cookie::{Key, SameSite},
    dev::{self, forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::Method,
    Error, FromRequest, HttpRequest, HttpResponse,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use rand::prelude::StdRng;
use serde::Serialize;
use std::future::{ready, Ready as StdReady};

const USER_ID_KEY: &str = "user_id";
const USERNAME_KEY: &str = "username";
const IS_STAFF_KEY: &str = "is_staff";

/// GET pages that render a URL-encoded form and therefore hand out a CSRF token.
/// Patterns must match the registered routes exactly.
const TOKEN_PAGES: &[&str] = &[
    "/auth/login/",
    "/auth/registration/",
    "/profile/edit/",
    "/posts/{post_id}/",
    "/posts/{post_id}/delete/",
    "/posts/{post_id}/comment/",
    "/posts/{post_id}/edit_comment/{comment_id}/",
    "/posts/{post_id}/delete_comment/{comment_id}/",
];

/// Management pages, relative to the admin base URL.
const ADMIN_TOKEN_PAGES: &[&str] = &[
    "/dashboard/",
    "/categories/{category_id}/",
    "/locations/{location_id}/",
];

pub fn csrf_protection(admin_base_url: &str) -> CsrfMiddleware<StdRng> {
    let mut csrf = CsrfMiddleware::<StdRng>::new();
    for page in TOKEN_PAGES {
        csrf = csrf.set_cookie(Method::GET, *page);
    }
    for page in ADMIN_TOKEN_PAGES {
        csrf = csrf.set_cookie(Method::GET, format!("{}{}", admin_base_url, page));
    }
    csrf
}

pub fn session_store(key: Key, secure: bool) -> SessionMiddleware<CookieSessionStore> {
    SessionMiddleware::builder(CookieSessionStore::default(), key)
        .cookie_secure(secure)
        .cookie_http_only(true)
        .cookie_same_site(SameSite::Lax)
        .build()
}

/// The logged-in visitor, as remembered by the session cookie.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionUser {
    pub id: i64,
    pub username: String,
    pub is_staff: bool,
}

/// Reads the visitor from the session; a broken or partial session counts as anonymous.
pub fn session_viewer(session: &Session) -> Option<SessionUser> {
    let id = session.get::<i64>(USER_ID_KEY).ok().flatten()?;
    let username = session.get::<String>(USERNAME_KEY).ok().flatten()?;
    let is_staff = session.get::<bool>(IS_STAFF_KEY).ok().flatten().unwrap_or(false);
    Some(SessionUser { id, username, is_staff })
}

/// Starts a fresh session for `user`.
pub fn log_in(session: &Session, user: &User) -> Result<(), AppError> {
    session.renew();
    session.insert(USER_ID_KEY, user.id)?;
    session.insert(USERNAME_KEY, &user.username)?;
    session.insert(IS_STAFF_KEY, user.is_staff)?;
    Ok(())
}

/// Keeps the session in step with a renamed account.
pub fn rename_session_user(session: &Session, username: &str) -> Result<(), AppError> {
    session.insert(USERNAME_KEY, username)?;
    Ok(())
}

pub fn log_out(session: &Session) {
    session.purge();
}

impl FromRequest for SessionUser {
    type Error = AppError;
    type Future = StdReady<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        match session_viewer(&req.get_session()) {
            Some(user) => ready(Ok(user)),
            None => {
                let next = req
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| req.path().to_string());
                ready(Err(AppError::LoginRequired { next }))
            }
        }
    }
}

// --- Staff gate for the management area ---

/// Lets only staff sessions through; everyone else sees a plain 404 so the
/// management area does not reveal itself.
pub struct StaffOnly;

impl<S, B> Transform<S, ServiceRequest> for StaffOnly
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = StaffOnlyMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(StaffOnlyMiddleware { service })
    }
}

pub struct StaffOnlyMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for StaffOnlyMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let is_staff = session_viewer(&req.get_session()).map_or(false, |user| user.is_staff);

        if is_staff {
            let fut = self.service.call(req);
            Box::pin(async move {
                let res = fut.await?;
                Ok(res.map_into_left_body())
            })
        } else {
            log::warn!("Non-staff request to the management area: {}", req.path());
            Box::pin(async move {
                let (http_req, _payload) = req.into_parts();
                let res = HttpResponse::NotFound().finish().map_into_right_body();
                Ok(ServiceResponse::new(http_req, res))
            })
        }
    }
}
