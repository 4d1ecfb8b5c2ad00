//! Categories and locations, the administrator-managed side of the catalog.

use crate::models::db_operations::DbError;
use crate::models::{timestamp_column, to_db_timestamp, Category, Location};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const CATEGORY_COLUMNS: &str = "id, title, description, slug, is_published, created_at";
const LOCATION_COLUMNS: &str = "id, name, is_published, created_at";

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        slug: row.get(3)?,
        is_published: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
    })
}

fn location_from_row(row: &Row) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        is_published: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
    })
}

// ====================================================================
// ========================= CATEGORIES ===============================
// ====================================================================

pub fn create_category(
    conn: &Connection,
    title: &str,
    description: &str,
    slug: &str,
    is_published: bool,
) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO categories (title, description, slug, is_published, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![title, description, slug, is_published, to_db_timestamp(&Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_category(
    conn: &Connection,
    category_id: i64,
    title: &str,
    description: &str,
    slug: &str,
    is_published: bool,
) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE categories SET title = ?1, description = ?2, slug = ?3, is_published = ?4 WHERE id = ?5",
        params![title, description, slug, is_published, category_id],
    )?)
}

/// Posts of a deleted category keep existing with a NULL category.
pub fn delete_category(conn: &Connection, category_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM categories WHERE id = ?1", [category_id])?)
}

pub fn read_all_categories(conn: &Connection) -> Result<Vec<Category>, DbError> {
    let sql = format!("SELECT {} FROM categories ORDER BY title, id", CATEGORY_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let categories = stmt.query_map([], category_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(categories)
}

/// Only a published category resolves; anything else is treated as missing.
pub fn read_published_category_by_slug(conn: &Connection, slug: &str) -> Result<Option<Category>, DbError> {
    let sql = format!("SELECT {} FROM categories WHERE slug = ?1 AND is_published = 1", CATEGORY_COLUMNS);
    Ok(conn.query_row(&sql, [slug], category_from_row).optional()?)
}

pub fn read_category(conn: &Connection, category_id: i64) -> Result<Option<Category>, DbError> {
    let sql = format!("SELECT {} FROM categories WHERE id = ?1", CATEGORY_COLUMNS);
    Ok(conn.query_row(&sql, [category_id], category_from_row).optional()?)
}

pub fn slug_taken(conn: &Connection, slug: &str, exclude_id: Option<i64>) -> Result<bool, DbError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE slug = ?1 AND id != ?2)",
        params![slug, exclude_id.unwrap_or(0)],
        |row| row.get(0),
    )?)
}

// ====================================================================
// ========================== LOCATIONS ===============================
// ====================================================================

pub fn create_location(conn: &Connection, name: &str, is_published: bool) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO locations (name, is_published, created_at) VALUES (?1, ?2, ?3)",
        params![name, is_published, to_db_timestamp(&Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_location(conn: &Connection, location_id: i64, name: &str, is_published: bool) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE locations SET name = ?1, is_published = ?2 WHERE id = ?3",
        params![name, is_published, location_id],
    )?)
}

pub fn delete_location(conn: &Connection, location_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM locations WHERE id = ?1", [location_id])?)
}

pub fn read_all_locations(conn: &Connection) -> Result<Vec<Location>, DbError> {
    let sql = format!("SELECT {} FROM locations ORDER BY name, id", LOCATION_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let locations = stmt.query_map([], location_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(locations)
}

pub fn read_location(conn: &Connection, location_id: i64) -> Result<Option<Location>, DbError> {
    let sql = format!("SELECT {} FROM locations WHERE id = ?1", LOCATION_COLUMNS);
    Ok(conn.query_row(&sql, [location_id], location_from_row).optional()?)
}
