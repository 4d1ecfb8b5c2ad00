use chrono::{DateTime, Local, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

pub mod db_operations;
pub mod pagination;

/// Format used by the `datetime-local` input of the post form.
pub const PUB_DATE_INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DISPLAY_FORMAT: &str = "%d %B %Y, %H:%M";

// Fixed-width UTC form, so lexicographic order in SQLite is chronological order.
pub fn to_db_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_db_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw).map(|dt| dt.with_timezone(&Utc))
}

/// Reads a timestamp column written by [`to_db_timestamp`].
pub fn timestamp_column(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn local_display(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format(DISPLAY_FORMAT).to_string()
}

pub fn local_input_value(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format(PUB_DATE_INPUT_FORMAT).to_string()
}

fn full_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name, last_name).trim().to_string()
}

#[derive(Debug, Serialize, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<String>,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, username, first_name, last_name, email, is_staff, is_active, date_joined, last_login";

    /// Maps a row selected with [`User::COLUMNS`].
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let first_name: String = row.get(2)?;
        let last_name: String = row.get(3)?;
        Ok(User {
            id: row.get(0)?,
            username: row.get(1)?,
            full_name: full_name(&first_name, &last_name),
            first_name,
            last_name,
            email: row.get(4)?,
            is_staff: row.get(5)?,
            is_active: row.get(6)?,
            date_joined: timestamp_column(row, 7)?,
            last_login: row.get(8)?,
        })
    }
}

/// The slice of a user shown next to posts and comments.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Author {
    pub id: i64,
    pub username: String,
    pub full_name: String,
}

impl Author {
    pub fn new(id: i64, username: String, first_name: &str, last_name: &str) -> Self {
        Author { id, username, full_name: full_name(first_name, last_name) }
    }
}

#[derive(Debug, Serialize, Clone)]
pub struct Category {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub slug: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone)]
pub struct Location {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CategoryRef {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub is_published: bool,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LocationRef {
    pub id: i64,
    pub name: String,
    pub is_published: bool,
}

#[derive(Debug, Clone)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub pub_date: DateTime<Utc>,
    pub image: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub author: Author,
    pub category: Option<CategoryRef>,
    pub location: Option<LocationRef>,
    pub comment_count: i64,
}

impl Post {
    /// A post is effectively visible when its own flag is set, its publication
    /// date has been reached and its category exists and is published.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.is_published
            && self.pub_date <= now
            && self.category.as_ref().map_or(false, |c| c.is_published)
    }

    pub fn is_authored_by(&self, user_id: i64) -> bool {
        self.author.id == user_id
    }

    pub fn card(&self, now: DateTime<Utc>) -> PostCard {
        PostCard {
            id: self.id,
            title: self.title.clone(),
            text: self.text.clone(),
            image_url: self.image.as_ref().map(|path| format!("/media/{}", path)),
            pub_date: local_display(&self.pub_date),
            created_at: local_display(&self.created_at),
            is_published: self.is_published,
            is_visible: self.is_visible_at(now),
            author: self.author.clone(),
            category: self.category.clone(),
            location: self.location.clone(),
            comment_count: self.comment_count,
        }
    }
}

/// Template-facing rendition of a [`Post`].
#[derive(Debug, Serialize)]
pub struct PostCard {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub image_url: Option<String>,
    pub pub_date: String,
    pub created_at: String,
    pub is_published: bool,
    pub is_visible: bool,
    pub author: Author,
    pub category: Option<CategoryRef>,
    pub location: Option<LocationRef>,
    pub comment_count: i64,
}

#[derive(Debug, Clone)]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub created_at: DateTime<Utc>,
    pub author: Author,
}

impl Comment {
    pub fn card(&self) -> CommentCard {
        CommentCard {
            id: self.id,
            text: self.text.clone(),
            post_id: self.post_id,
            created_at: local_display(&self.created_at),
            author: self.author.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CommentCard {
    pub id: i64,
    pub text: String,
    pub post_id: i64,
    pub created_at: String,
    pub author: Author,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Notification {
    pub message: String,
    pub r#type: String, // 'success' or 'error'
}
