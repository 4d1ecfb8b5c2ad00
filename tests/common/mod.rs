#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::{header, StatusCode};
use actix_web::test::{self, TestRequest};
use blogicum::config::{Config, WebConfig};
use blogicum::forms::PostData;
use blogicum::models::db_operations::{catalog_db_operations, posts_db_operations, users_db_operations};
use blogicum::setup::db_setup;
use blogicum::DbPool;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;
use tera::Tera;

pub const PASSWORD: &str = "secret-pass";
const BOUNDARY: &str = "----blogicum-test-boundary";

/// Builds the same application the server runs, minus CORS, the access log and `/static`.
#[macro_export]
macro_rules! blog_app {
    ($site:expr) => {{
        actix_web::test::init_service(blogicum::build_app(
            $site.config.clone(),
            $site.tera.clone(),
            $site.pool.clone(),
            actix_web::cookie::Key::generate(),
        ))
        .await
    }};
}

/// Sends a request built by a [`Browser`] and feeds the response back into it.
#[macro_export]
macro_rules! fetch {
    ($app:expr, $browser:expr, $request:expr) => {{
        let request = $request;
        let response = actix_web::test::call_service(&$app, request.to_request()).await;
        $browser.receive(response).await
    }};
}

/// Logs `$username` in through the login form, leaving the session in the browser.
#[macro_export]
macro_rules! log_in {
    ($app:expr, $browser:expr, $username:expr) => {{
        let form = $crate::fetch!($app, $browser, $browser.get("/auth/login/"));
        let token = form.csrf_token();
        let done = $crate::fetch!(
            $app,
            $browser,
            $browser.post_form(
                "/auth/login/",
                &[("csrf_token", token.as_str()), ("username", $username), ("password", $crate::common::PASSWORD)],
            )
        );
        assert_eq!(done.status, actix_web::http::StatusCode::FOUND, "login of {} failed", $username);
    }};
}

/// A throwaway site: its own database file, media folder and the real templates.
pub struct TestSite {
    pub config: Config,
    pub pool: DbPool,
    pub tera: Tera,
    root: PathBuf,
}

impl TestSite {
    pub fn new() -> Self {
        let root = std::env::temp_dir().join(format!("blogicum-test-{}", uuid::Uuid::new_v4()));
        let config = Config {
            web: WebConfig { host: "127.0.0.1".to_string(), port: 0 },
            database_path: root.join("data").to_string_lossy().into_owned(),
            media_path: root.join("media").to_string_lossy().into_owned(),
            allowed_origins: String::new(),
            log_level: "warn".to_string(),
            session_secret_key: "ab".repeat(64),
            admin_url_prefix: "staff".to_string(),
            use_secure_cookies: false,
            posts_per_page: 10,
            max_image_size_mb: 1,
        };

        let db_path = config.blog_db_path();
        fs::create_dir_all(db_path.parent().unwrap()).unwrap();
        fs::create_dir_all(config.post_images_dir()).unwrap();
        let pool = db_setup::build_pool(&db_path).unwrap();
        db_setup::setup_blog_db(&mut pool.get().unwrap()).unwrap();

        let tera = Tera::new(concat!(env!("CARGO_MANIFEST_DIR"), "/templates/**/*.html")).unwrap();

        TestSite { config, pool, tera, root }
    }

    pub fn user(&self, username: &str) -> i64 {
        self.account(username, false)
    }

    pub fn staff(&self, username: &str) -> i64 {
        self.account(username, true)
    }

    fn account(&self, username: &str, is_staff: bool) -> i64 {
        let conn = self.pool.get().unwrap();
        users_db_operations::create_user_with_cost(&conn, username, "", PASSWORD, is_staff, 4).unwrap()
    }

    pub fn category(&self, slug: &str, is_published: bool) -> i64 {
        let conn = self.pool.get().unwrap();
        catalog_db_operations::create_category(&conn, &format!("Category {}", slug), "Stories", slug, is_published).unwrap()
    }

    pub fn post(&self, author_id: i64, title: &str, category_id: Option<i64>, pub_date: DateTime<Utc>, is_published: bool) -> i64 {
        let conn = self.pool.get().unwrap();
        let data = PostData {
            title: title.to_string(),
            text: "Some text".to_string(),
            pub_date,
            location_id: None,
            category_id,
        };
        let id = posts_db_operations::create_post(&conn, author_id, &data, None).unwrap();
        if !is_published {
            posts_db_operations::set_post_publication(&conn, id, false, category_id).unwrap();
        }
        id
    }

    pub fn set_category_published(&self, category_id: i64, is_published: bool) {
        let conn = self.pool.get().unwrap();
        let category = catalog_db_operations::read_category(&conn, category_id).unwrap().unwrap();
        catalog_db_operations::update_category(
            &conn,
            category_id,
            &category.title,
            &category.description,
            &category.slug,
            is_published,
        )
        .unwrap();
    }
}

impl Drop for TestSite {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

/// What a test sees of a response.
pub struct Page {
    pub status: StatusCode,
    pub location: Option<String>,
    pub body: String,
}

impl Page {
    pub fn csrf_token(&self) -> String {
        static TOKEN: OnceLock<Regex> = OnceLock::new();
        let re = TOKEN.get_or_init(|| Regex::new(r#"name="csrf_token" value="([^"]+)""#).unwrap());
        re.captures(&self.body)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| panic!("no csrf token in page:\n{}", self.body))
    }

    pub fn redirects_to(&self, target: &str) -> bool {
        self.status == StatusCode::FOUND && self.location.as_deref() == Some(target)
    }
}

/// Keeps cookies between requests like a browser would.
#[derive(Default)]
pub struct Browser {
    cookies: HashMap<String, String>,
}

impl Browser {
    fn with_cookies(&self, mut request: TestRequest) -> TestRequest {
        for (name, value) in &self.cookies {
            request = request.cookie(actix_web::cookie::Cookie::new(name.clone(), value.clone()));
        }
        request
    }

    pub fn get(&self, path: &str) -> TestRequest {
        self.with_cookies(TestRequest::get().uri(path))
    }

    pub fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> TestRequest {
        self.with_cookies(TestRequest::post().uri(path).set_form(fields))
    }

    /// A multipart post form; `image` is `(file name, content type, bytes)`.
    pub fn post_multipart(&self, path: &str, fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> TestRequest {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!("--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n", BOUNDARY, name, value).as_bytes(),
            );
        }
        if let Some((file_name, content_type, bytes)) = image {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    BOUNDARY, file_name, content_type
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        self.with_cookies(
            TestRequest::post()
                .uri(path)
                .insert_header((header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", BOUNDARY)))
                .set_payload(body),
        )
    }

    pub async fn receive<B: MessageBody>(&mut self, response: ServiceResponse<B>) -> Page {
        for cookie in response.response().cookies() {
            if cookie.value().is_empty() {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies.insert(cookie.name().to_string(), cookie.value().to_string());
            }
        }
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = test::read_body(response).await;
        Page { status, location, body: String::from_utf8_lossy(&body).into_owned() }
    }
}

/// Value for the `datetime-local` input.
pub fn input_date(dt: DateTime<Utc>) -> String {
    blogicum::models::local_input_value(&dt)
}
