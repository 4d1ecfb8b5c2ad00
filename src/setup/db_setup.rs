use crate::DbPool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

const SCHEMA: &[(&str, &str)] = &[
    (
        "users",
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            is_staff INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            date_joined TEXT NOT NULL,
            last_login TEXT
        )",
    ),
    (
        "categories",
        "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            slug TEXT NOT NULL UNIQUE,
            is_published INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "locations",
        "CREATE TABLE IF NOT EXISTS locations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            is_published INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )",
    ),
    (
        "posts",
        "CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            text TEXT NOT NULL,
            pub_date TEXT NOT NULL,
            image TEXT,
            is_published INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            author_id INTEGER NOT NULL,
            location_id INTEGER,
            category_id INTEGER,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (location_id) REFERENCES locations(id) ON DELETE SET NULL,
            FOREIGN KEY (category_id) REFERENCES categories(id) ON DELETE SET NULL
        )",
    ),
    (
        "comments",
        "CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            text TEXT NOT NULL,
            created_at TEXT NOT NULL,
            author_id INTEGER NOT NULL,
            post_id INTEGER NOT NULL,
            FOREIGN KEY (author_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE
        )",
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts (pub_date)",
    "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts (author_id)",
    "CREATE INDEX IF NOT EXISTS idx_posts_category ON posts (category_id)",
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments (post_id, created_at)",
];

/// Creates every table and index of the blog. Safe to run repeatedly.
pub fn setup_blog_db(conn: &mut Connection) -> Result<(), SetupError> {
    let tx = conn.transaction()?;
    for (table, ddl) in SCHEMA {
        log::info!("Creating '{}' table...", table);
        tx.execute(ddl, [])?;
    }
    for ddl in INDEXES {
        tx.execute(ddl, [])?;
    }
    tx.commit()?;
    Ok(())
}

/// Connection manager with foreign keys switched on for every pooled connection,
/// so the cascade and set-null rules of the schema apply.
pub fn connection_manager(db_path: &Path) -> SqliteConnectionManager {
    SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"))
}

pub fn build_pool(db_path: &Path) -> Result<DbPool, SetupError> {
    Ok(r2d2::Pool::builder().build(connection_manager(db_path))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        setup_blog_db(&mut conn).unwrap();
        setup_blog_db(&mut conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'categories', 'locations', 'posts', 'comments')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }
}
