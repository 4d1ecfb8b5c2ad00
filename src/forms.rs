//! Form payloads, their validation, and the typed data they bind to.
//!
//! Every form keeps its raw string values so a rejected submission can be
//! rendered again exactly as the user typed it. Validation either produces
//! the typed data or a [`FormErrors`] map keyed by field name.

use crate::models::{Category, Location, Post, local_input_value, PUB_DATE_INPUT_FORMAT};
use actix_csrf::extractor::{CsrfGuarded, CsrfToken};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

const TITLE_MAX_LEN: usize = 256;
const NAME_MAX_LEN: usize = 150;
const EMAIL_MAX_LEN: usize = 254;
const PASSWORD_MIN_LEN: usize = 8;

const REQUIRED: &str = "This field is required.";

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern compiles"))
}

fn slug_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug pattern compiles"))
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"))
}

/// Per-field validation messages, rendered next to the offending inputs.
#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// One line for all fields, for pages that cannot show errors next to inputs.
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn finish<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Any URL-encoded form together with its double-submit CSRF token.
#[derive(Deserialize)]
pub struct CsrfForm<T> {
    csrf_token: CsrfToken,
    #[serde(flatten)]
    pub fields: T,
}

impl<T> CsrfGuarded for CsrfForm<T> {
    fn csrf_token(&self) -> &CsrfToken {
        &self.csrf_token
    }
}

impl<T> CsrfForm<T> {
    /// The submitted token, reused when the form has to be rendered again.
    pub fn token(&self) -> &str {
        self.csrf_token.get()
    }
}

fn required_text(errors: &mut FormErrors, field: &str, value: &str, max_len: Option<usize>) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, REQUIRED);
    } else if let Some(max) = max_len {
        if value.chars().count() > max {
            errors.add(field, format!("Ensure this value has at most {} characters.", max));
        }
    }
    value.to_string()
}

fn parse_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

// ====================================================================
// ============================== POSTS ===============================
// ====================================================================

/// Typed content of a valid post form.
#[derive(Debug, Clone)]
pub struct PostData {
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub location_id: Option<i64>,
    pub category_id: Option<i64>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PostForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub pub_date: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub category: String,
}

impl PostForm {
    /// An empty form whose publication date defaults to the current local minute.
    pub fn blank() -> Self {
        PostForm { pub_date: local_input_value(&Utc::now()), ..Default::default() }
    }

    pub fn from_post(post: &Post) -> Self {
        PostForm {
            title: post.title.clone(),
            text: post.text.clone(),
            pub_date: local_input_value(&post.pub_date),
            location: post.location.as_ref().map(|l| l.id.to_string()).unwrap_or_default(),
            category: post.category.as_ref().map(|c| c.id.to_string()).unwrap_or_default(),
        }
    }

    /// Builds the form from the text parts of a multipart submission.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let get = |name: &str| fields.get(name).cloned().unwrap_or_default();
        PostForm {
            title: get("title"),
            text: get("text"),
            pub_date: get("pub_date"),
            location: get("location"),
            category: get("category"),
        }
    }

    /// Category is required and location optional; both must name existing rows.
    pub fn validate(&self, categories: &[Category], locations: &[Location]) -> Result<PostData, FormErrors> {
        let mut errors = FormErrors::default();

        let title = required_text(&mut errors, "title", &self.title, Some(TITLE_MAX_LEN));
        let text = required_text(&mut errors, "text", &self.text, None);

        let pub_date = match parse_local_datetime(&self.pub_date) {
            Some(dt) => Some(dt),
            None => {
                if self.pub_date.trim().is_empty() {
                    errors.add("pub_date", REQUIRED);
                } else {
                    errors.add("pub_date", "Enter a valid date/time.");
                }
                None
            }
        };

        let category_id = match parse_id(&self.category) {
            Some(id) if categories.iter().any(|c| c.id == id) => Some(id),
            _ if self.category.trim().is_empty() => {
                errors.add("category", REQUIRED);
                None
            }
            _ => {
                errors.add("category", "Select a valid choice.");
                None
            }
        };

        let location_id = if self.location.trim().is_empty() {
            None
        } else {
            match parse_id(&self.location) {
                Some(id) if locations.iter().any(|l| l.id == id) => Some(id),
                _ => {
                    errors.add("location", "Select a valid choice.");
                    None
                }
            }
        };

        match pub_date {
            Some(pub_date) => errors.finish(PostData { title, text, pub_date, location_id, category_id }),
            None => Err(errors),
        }
    }
}

/// Reads a `datetime-local` value as the server's local time.
pub fn parse_local_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), PUB_DATE_INPUT_FORMAT).ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

// ====================================================================
// ============================ COMMENTS ==============================
// ====================================================================

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub text: String,
}

impl CommentForm {
    pub fn validate(&self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::default();
        let text = required_text(&mut errors, "text", &self.text, None);
        errors.finish(text)
    }
}

// ====================================================================
// ============================= USERS ================================
// ====================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileData {
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

fn validate_username(errors: &mut FormErrors, raw: &str) -> String {
    let username = required_text(errors, "username", raw, Some(NAME_MAX_LEN));
    if !username.is_empty() && !username_regex().is_match(&username) {
        errors.add(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        );
    }
    username
}

fn validate_email(errors: &mut FormErrors, raw: &str) -> String {
    let email = raw.trim().to_string();
    if email.is_empty() {
        return email;
    }
    if email.chars().count() > EMAIL_MAX_LEN {
        errors.add("email", format!("Ensure this value has at most {} characters.", EMAIL_MAX_LEN));
    } else if !email_regex().is_match(&email) {
        errors.add("email", "Enter a valid email address.");
    }
    email
}

impl ProfileForm {
    pub fn from_user(user: &crate::models::User) -> Self {
        ProfileForm {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }

    /// Checks the fields on their own; username uniqueness needs the database
    /// and is left to the caller.
    pub fn validate(&self) -> Result<ProfileData, FormErrors> {
        let mut errors = FormErrors::default();
        let first_name = required_text(&mut errors, "first_name", &self.first_name, Some(NAME_MAX_LEN));
        let last_name = required_text(&mut errors, "last_name", &self.last_name, Some(NAME_MAX_LEN));
        let username = validate_username(&mut errors, &self.username);
        let email = validate_email(&mut errors, &self.email);
        errors.finish(ProfileData { first_name, last_name, username, email })
    }
}

#[derive(Debug, Clone)]
pub struct RegistrationData {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<RegistrationData, FormErrors> {
        let mut errors = FormErrors::default();
        let username = validate_username(&mut errors, &self.username);
        let email = validate_email(&mut errors, &self.email);

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        } else {
            if self.password1.chars().count() < PASSWORD_MIN_LEN {
                errors.add(
                    "password2",
                    format!("This password is too short. It must contain at least {} characters.", PASSWORD_MIN_LEN),
                );
            }
            if self.password1.chars().all(|c| c.is_ascii_digit()) {
                errors.add("password2", "This password is entirely numeric.");
            }
        }

        errors.finish(RegistrationData { username, email, password: self.password1.clone() })
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Only local absolute paths are followed after login.
pub fn safe_next(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    let is_local = next.starts_with('/') && !next.starts_with("//") && !next.contains('\\');
    if is_local { Some(next.to_string()) } else { None }
}

// ====================================================================
// ======================== ADMINISTRATION ============================
// ====================================================================

#[derive(Debug, Clone)]
pub struct CategoryData {
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub is_published: Option<String>,
}

fn checkbox(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("on") | Some("true") | Some("1"))
}

impl CategoryForm {
    pub fn validate(&self) -> Result<CategoryData, FormErrors> {
        let mut errors = FormErrors::default();
        let title = required_text(&mut errors, "title", &self.title, Some(TITLE_MAX_LEN));
        let description = required_text(&mut errors, "description", &self.description, None);
        let slug = required_text(&mut errors, "slug", &self.slug, None);
        if !slug.is_empty() && !slug_regex().is_match(&slug) {
            errors.add(
                "slug",
                "Enter a valid slug consisting of latin letters, numbers, underscores or hyphens.",
            );
        }
        errors.finish(CategoryData { title, description, slug, is_published: checkbox(&self.is_published) })
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct LocationForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_published: Option<String>,
}

impl LocationForm {
    pub fn validate(&self) -> Result<(String, bool), FormErrors> {
        let mut errors = FormErrors::default();
        let name = required_text(&mut errors, "name", &self.name, Some(TITLE_MAX_LEN));
        errors.finish((name, checkbox(&self.is_published)))
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostModerationForm {
    #[serde(default)]
    pub is_published: Option<String>,
    #[serde(default)]
    pub category: String,
}

impl PostModerationForm {
    /// An empty category leaves the post uncategorized, which hides it.
    pub fn validate(&self, categories: &[Category]) -> Result<(bool, Option<i64>), FormErrors> {
        let mut errors = FormErrors::default();
        let category_id = if self.category.trim().is_empty() {
            None
        } else {
            match parse_id(&self.category) {
                Some(id) if categories.iter().any(|c| c.id == id) => Some(id),
                _ => {
                    errors.add("category", "Select a valid choice.");
                    None
                }
            }
        };
        errors.finish((checkbox(&self.is_published), category_id))
    }
}

/// Confirmation forms carry nothing but the CSRF token.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ConfirmForm {}
