use crate::forms::ProfileData;
use crate::models::db_operations::DbError;
use crate::models::{to_db_timestamp, User};
use bcrypt::{hash, verify};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

pub fn create_user(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
    is_staff: bool,
) -> Result<i64, DbError> {
    create_user_with_cost(conn, username, email, password, is_staff, bcrypt::DEFAULT_COST)
}

/// Same as [`create_user`] with an explicit bcrypt cost.
pub fn create_user_with_cost(
    conn: &Connection,
    username: &str,
    email: &str,
    password: &str,
    is_staff: bool,
    cost: u32,
) -> Result<i64, DbError> {
    let hashed_password = hash(password, cost)?;
    conn.execute(
        "INSERT INTO users (username, password_hash, email, is_staff, date_joined) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![username, hashed_password, email, is_staff, to_db_timestamp(&Utc::now())],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn read_user_by_id(conn: &Connection, user_id: i64) -> Result<Option<User>, DbError> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS);
    Ok(conn.query_row(&sql, [user_id], User::from_row).optional()?)
}

pub fn read_user_by_username(conn: &Connection, username: &str) -> Result<Option<User>, DbError> {
    let sql = format!("SELECT {} FROM users WHERE username = ?1", User::COLUMNS);
    Ok(conn.query_row(&sql, [username], User::from_row).optional()?)
}

pub fn username_taken(conn: &Connection, username: &str, exclude_id: Option<i64>) -> Result<bool, DbError> {
    let taken = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1 AND id != ?2)",
        params![username, exclude_id.unwrap_or(0)],
        |row| row.get(0),
    )?;
    Ok(taken)
}

/// Returns the user when the password matches and the account is active.
pub fn verify_credentials(conn: &Connection, username: &str, password: &str) -> Result<Option<User>, DbError> {
    let stored: Option<(i64, String, bool)> = conn
        .query_row(
            "SELECT id, password_hash, is_active FROM users WHERE username = ?1",
            [username],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    match stored {
        Some((user_id, password_hash, true)) if verify(password, &password_hash).unwrap_or(false) => read_user_by_id(conn, user_id),
        _ => Ok(None),
    }
}

pub fn update_last_login_time(conn: &Connection, user_id: i64) -> Result<(), DbError> {
    conn.execute(
        "UPDATE users SET last_login = ?1 WHERE id = ?2",
        params![to_db_timestamp(&Utc::now()), user_id],
    )?;
    Ok(())
}

pub fn update_profile(conn: &Connection, user_id: i64, profile: &ProfileData) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE users SET first_name = ?1, last_name = ?2, username = ?3, email = ?4 WHERE id = ?5",
        params![profile.first_name, profile.last_name, profile.username, profile.email, user_id],
    )?)
}

pub fn change_password(conn: &Connection, username: &str, new_password: &str) -> Result<usize, DbError> {
    let hashed_password = hash(new_password, bcrypt::DEFAULT_COST)?;
    Ok(conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE username = ?2",
        params![hashed_password, username],
    )?)
}

pub fn read_staff_users(conn: &Connection) -> Result<Vec<User>, DbError> {
    let sql = format!("SELECT {} FROM users WHERE is_staff = 1 ORDER BY username", User::COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let users = stmt.query_map([], User::from_row)?.collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}
