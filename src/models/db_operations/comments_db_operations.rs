use crate::models::db_operations::DbError;
use crate::models::{timestamp_column, to_db_timestamp, Author, Comment};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

const COMMENT_SELECT: &str = "SELECT cm.id, cm.text, cm.post_id, cm.created_at, u.id, u.username, u.first_name, u.last_name
    FROM comments cm
    JOIN users u ON u.id = cm.author_id";

fn comment_from_row(row: &Row) -> rusqlite::Result<Comment> {
    let first_name: String = row.get(6)?;
    let last_name: String = row.get(7)?;
    Ok(Comment {
        id: row.get(0)?,
        text: row.get(1)?,
        post_id: row.get(2)?,
        created_at: timestamp_column(row, 3)?,
        author: Author::new(row.get(4)?, row.get(5)?, &first_name, &last_name),
    })
}

/// Oldest first, the order a discussion reads in.
pub fn read_comments_for_post(conn: &Connection, post_id: i64) -> Result<Vec<Comment>, DbError> {
    let sql = format!("{} WHERE cm.post_id = ?1 ORDER BY cm.created_at ASC, cm.id ASC", COMMENT_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let comments = stmt.query_map([post_id], comment_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}

/// Resolves a comment only when it belongs to both the post and the author.
pub fn read_comment_by_author(
    conn: &Connection,
    comment_id: i64,
    post_id: i64,
    author_id: i64,
) -> Result<Option<Comment>, DbError> {
    let sql = format!("{} WHERE cm.id = ?1 AND cm.post_id = ?2 AND cm.author_id = ?3", COMMENT_SELECT);
    Ok(conn
        .query_row(&sql, params![comment_id, post_id, author_id], comment_from_row)
        .optional()?)
}

pub fn create_comment(conn: &Connection, post_id: i64, author_id: i64, text: &str) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO comments (text, created_at, author_id, post_id) VALUES (?1, ?2, ?3, ?4)",
        params![text, to_db_timestamp(&Utc::now()), author_id, post_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_comment(conn: &Connection, comment_id: i64, text: &str) -> Result<usize, DbError> {
    Ok(conn.execute("UPDATE comments SET text = ?1 WHERE id = ?2", params![text, comment_id])?)
}

pub fn delete_comment(conn: &Connection, comment_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?)
}

/// Newest first, for the management dashboard.
pub fn read_latest_comments(conn: &Connection, limit: u32) -> Result<Vec<Comment>, DbError> {
    let sql = format!("{} ORDER BY cm.created_at DESC, cm.id DESC LIMIT ?1", COMMENT_SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let comments = stmt.query_map([limit], comment_from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(comments)
}
