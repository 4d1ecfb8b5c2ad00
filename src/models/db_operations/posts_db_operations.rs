use crate::forms::PostData;
use crate::models::db_operations::DbError;
use crate::models::{timestamp_column, to_db_timestamp, Author, CategoryRef, LocationRef, Post};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

const POST_SELECT: &str = "SELECT p.id, p.title, p.text, p.pub_date, p.image, p.is_published, p.created_at,
        u.id, u.username, u.first_name, u.last_name,
        c.id, c.title, c.slug, c.is_published,
        l.id, l.name, l.is_published,
        (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id)
    FROM posts p
    JOIN users u ON u.id = p.author_id
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN locations l ON l.id = p.location_id";

const POST_COUNT: &str = "SELECT COUNT(*)
    FROM posts p
    LEFT JOIN categories c ON c.id = p.category_id";

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    let first_name: String = row.get(9)?;
    let last_name: String = row.get(10)?;

    let category = match row.get::<_, Option<i64>>(11)? {
        Some(id) => Some(CategoryRef {
            id,
            title: row.get(12)?,
            slug: row.get(13)?,
            is_published: row.get(14)?,
        }),
        None => None,
    };
    let location = match row.get::<_, Option<i64>>(15)? {
        Some(id) => Some(LocationRef {
            id,
            name: row.get(16)?,
            is_published: row.get(17)?,
        }),
        None => None,
    };

    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        text: row.get(2)?,
        pub_date: timestamp_column(row, 3)?,
        image: row.get(4)?,
        is_published: row.get(5)?,
        created_at: timestamp_column(row, 6)?,
        author: Author::new(row.get(7)?, row.get(8)?, &first_name, &last_name),
        category,
        location,
        comment_count: row.get(18)?,
    })
}

/// Which posts a listing may show.
#[derive(Debug, Clone, Copy)]
pub enum PostScope {
    /// Every post, whatever its publication state.
    All,
    /// Published, with `pub_date` reached and a published category.
    Visible { now: DateTime<Utc> },
}

#[derive(Debug, Clone, Copy)]
pub struct PostQuery {
    pub scope: PostScope,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
}

impl PostQuery {
    pub fn visible(now: DateTime<Utc>) -> Self {
        PostQuery { scope: PostScope::Visible { now }, author_id: None, category_id: None }
    }

    pub fn all() -> Self {
        PostQuery { scope: PostScope::All, author_id: None, category_id: None }
    }

    pub fn by_author(mut self, author_id: i64) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn in_category(mut self, category_id: i64) -> Self {
        self.category_id = Some(category_id);
        self
    }

    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut conditions: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let PostScope::Visible { now } = self.scope {
            // The category join is an outer join: a missing category yields
            // NULL here, which never compares equal to 1.
            conditions.push("p.is_published = 1 AND p.pub_date <= ? AND c.is_published = 1");
            values.push(Value::Text(to_db_timestamp(&now)));
        }
        if let Some(author_id) = self.author_id {
            conditions.push("p.author_id = ?");
            values.push(Value::Integer(author_id));
        }
        if let Some(category_id) = self.category_id {
            conditions.push("p.category_id = ?");
            values.push(Value::Integer(category_id));
        }

        if conditions.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), values)
        }
    }
}

pub fn count_posts(conn: &Connection, query: &PostQuery) -> Result<i64, DbError> {
    let (clause, values) = query.where_clause();
    let sql = format!("{}{}", POST_COUNT, clause);
    Ok(conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?)
}

/// Newest publication date first.
pub fn read_posts(conn: &Connection, query: &PostQuery, limit: u32, offset: u32) -> Result<Vec<Post>, DbError> {
    let (clause, mut values) = query.where_clause();
    let sql = format!("{}{} ORDER BY p.pub_date DESC, p.id DESC LIMIT ? OFFSET ?", POST_SELECT, clause);
    values.push(Value::Integer(limit as i64));
    values.push(Value::Integer(offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let posts = stmt
        .query_map(params_from_iter(values), post_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(posts)
}

/// Loads a post regardless of visibility; callers decide who may see it.
pub fn read_post(conn: &Connection, post_id: i64) -> Result<Option<Post>, DbError> {
    let sql = format!("{} WHERE p.id = ?1", POST_SELECT);
    Ok(conn.query_row(&sql, [post_id], post_from_row).optional()?)
}

pub fn create_post(conn: &Connection, author_id: i64, data: &PostData, image: Option<&str>) -> Result<i64, DbError> {
    conn.execute(
        "INSERT INTO posts (title, text, pub_date, image, is_published, created_at, author_id, location_id, category_id)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8)",
        params![
            data.title,
            data.text,
            to_db_timestamp(&data.pub_date),
            image,
            to_db_timestamp(&Utc::now()),
            author_id,
            data.location_id,
            data.category_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Rewrites the form-editable fields. `is_published` and the author are kept.
pub fn update_post(conn: &Connection, post_id: i64, data: &PostData, image: Option<&str>) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE posts SET title = ?1, text = ?2, pub_date = ?3, image = ?4, location_id = ?5, category_id = ?6 WHERE id = ?7",
        params![
            data.title,
            data.text,
            to_db_timestamp(&data.pub_date),
            image,
            data.location_id,
            data.category_id,
            post_id,
        ],
    )?)
}

/// Comments go with the post through the cascade rule.
pub fn delete_post(conn: &Connection, post_id: i64) -> Result<usize, DbError> {
    Ok(conn.execute("DELETE FROM posts WHERE id = ?1", [post_id])?)
}

pub fn set_post_publication(
    conn: &Connection,
    post_id: i64,
    is_published: bool,
    category_id: Option<i64>,
) -> Result<usize, DbError> {
    Ok(conn.execute(
        "UPDATE posts SET is_published = ?1, category_id = ?2 WHERE id = ?3",
        params![is_published, category_id, post_id],
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::db_operations::catalog_db_operations;
    use crate::models::db_operations::test_support::{category, memory_db, now, post, user};
    use chrono::Duration;

    #[test]
    fn visible_scope_matches_the_in_memory_predicate() {
        let conn = memory_db();
        let author = user(&conn, "anna");
        let open = category(&conn, "open", true);
        let hidden = category(&conn, "hidden", false);
        let t = now();

        let cases = [
            post(&conn, author, Some(open), t - Duration::days(1), true),
            post(&conn, author, Some(open), t + Duration::days(1), true),
            post(&conn, author, Some(open), t - Duration::days(1), false),
            post(&conn, author, Some(hidden), t - Duration::days(1), true),
            post(&conn, author, None, t - Duration::days(1), true),
        ];

        let listed: Vec<i64> = read_posts(&conn, &PostQuery::visible(t), 50, 0)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(listed, vec![cases[0]]);
        assert_eq!(count_posts(&conn, &PostQuery::visible(t)).unwrap(), 1);

        for id in cases {
            let stored = read_post(&conn, id).unwrap().unwrap();
            assert_eq!(stored.is_visible_at(t), listed.contains(&id));
        }
    }

    #[test]
    fn listings_are_newest_first_and_paginated() {
        let conn = memory_db();
        let author = user(&conn, "anna");
        let cat = category(&conn, "open", true);
        let t = now();
        let oldest = post(&conn, author, Some(cat), t - Duration::days(3), true);
        let newest = post(&conn, author, Some(cat), t - Duration::days(1), true);
        let middle = post(&conn, author, Some(cat), t - Duration::days(2), true);

        let first: Vec<i64> = read_posts(&conn, &PostQuery::visible(t), 2, 0).unwrap().iter().map(|p| p.id).collect();
        let second: Vec<i64> = read_posts(&conn, &PostQuery::visible(t), 2, 2).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(first, vec![newest, middle]);
        assert_eq!(second, vec![oldest]);
    }

    #[test]
    fn author_scope_switches_between_all_and_visible() {
        let conn = memory_db();
        let anna = user(&conn, "anna");
        let boris = user(&conn, "boris");
        let cat = category(&conn, "open", true);
        let t = now();
        post(&conn, anna, Some(cat), t - Duration::days(1), true);
        post(&conn, anna, Some(cat), t - Duration::days(1), false);
        post(&conn, anna, Some(cat), t + Duration::days(1), true);
        post(&conn, boris, Some(cat), t - Duration::days(1), true);

        assert_eq!(count_posts(&conn, &PostQuery::all().by_author(anna)).unwrap(), 3);
        assert_eq!(count_posts(&conn, &PostQuery::visible(t).by_author(anna)).unwrap(), 1);
    }

    #[test]
    fn category_scope_only_lists_that_category() {
        let conn = memory_db();
        let anna = user(&conn, "anna");
        let travel = category(&conn, "travel", true);
        let food = category(&conn, "food", true);
        let t = now();
        let in_travel = post(&conn, anna, Some(travel), t - Duration::hours(1), true);
        post(&conn, anna, Some(food), t - Duration::hours(1), true);

        let ids: Vec<i64> = read_posts(&conn, &PostQuery::visible(t).in_category(travel), 10, 0)
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![in_travel]);
    }

    #[test]
    fn update_keeps_publication_flag_and_delete_cascades_comments() {
        let conn = memory_db();
        let anna = user(&conn, "anna");
        let cat = category(&conn, "open", true);
        let id = post(&conn, anna, Some(cat), now(), false);
        let location = catalog_db_operations::create_location(&conn, "Kazan", true).unwrap();

        let data = PostData {
            title: "Renamed".to_string(),
            text: "New body".to_string(),
            pub_date: now(),
            location_id: Some(location),
            category_id: Some(cat),
        };
        update_post(&conn, id, &data, Some("posts_images/x.png")).unwrap();
        let stored = read_post(&conn, id).unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert!(!stored.is_published);
        assert_eq!(stored.location.unwrap().name, "Kazan");
        assert_eq!(stored.image.as_deref(), Some("posts_images/x.png"));

        conn.execute(
            "INSERT INTO comments (text, created_at, author_id, post_id) VALUES ('hi', ?1, ?2, ?3)",
            params![to_db_timestamp(&now()), anna, id],
        )
        .unwrap();
        assert_eq!(read_post(&conn, id).unwrap().unwrap().comment_count, 1);

        assert_eq!(delete_post(&conn, id).unwrap(), 1);
        let left: i64 = conn.query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0)).unwrap();
        assert_eq!(left, 0);
    }
}
