use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::Store;
use super::schema::SCHEMA;
use crate::error::{Error, Result};
use crate::types::*;

const USER_COLUMNS: &str =
    "id, email, password_hash, name, profile_image, customer_id, customer_pending_key, created_at";
const SITE_COLUMNS: &str =
    "id, user_id, name, description, subdirectory, image_url, created_at, updated_at";
const POST_COLUMNS: &str = "id, user_id, site_id, title, slug, small_description, image, \
     article_content, created_at, updated_at";
const SUBSCRIPTION_COLUMNS: &str = "stripe_subscription_id, user_id, interval, status, plan_id, \
     current_period_start, current_period_end, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::from_connection(Connection::open(db_path)?)
    }

    /// Opens a private in-memory database. Its contents vanish with the store.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

/// Fixed-width so that text ordering matches chronological ordering.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Turns UNIQUE constraint failures into `Error::UniqueViolation` naming the
/// first offending column.
fn map_write_error(err: rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(failure, Some(message)) = &err {
        if failure.code == rusqlite::ErrorCode::ConstraintViolation {
            if let Some(columns) = message.strip_prefix("UNIQUE constraint failed: ") {
                let first = columns.split(", ").next().unwrap_or(columns);
                let field = first.rsplit('.').next().unwrap_or(first);
                return Error::UniqueViolation {
                    field: field.to_string(),
                };
            }
        }
    }
    Error::from(err)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        profile_image: row.get(4)?,
        customer_id: row.get(5)?,
        customer_pending_key: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn site_from_row(row: &Row<'_>) -> rusqlite::Result<Site> {
    Ok(Site {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        subdirectory: row.get(4)?,
        image_url: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    let content: String = row.get(7)?;
    let article_content = serde_json::from_str(&content)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, Type::Text, Box::new(e)))?;

    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        site_id: row.get(2)?,
        title: row.get(3)?,
        slug: row.get(4)?,
        small_description: row.get(5)?,
        image: row.get(6)?,
        article_content,
        created_at: parse_datetime(&row.get::<_, String>(8)?),
        updated_at: parse_datetime(&row.get::<_, String>(9)?),
    })
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    Ok(Subscription {
        stripe_subscription_id: row.get(0)?,
        user_id: row.get(1)?,
        interval: row.get(2)?,
        status: row.get(3)?,
        plan_id: row.get(4)?,
        current_period_start: row.get(5)?,
        current_period_end: row.get(6)?,
        created_at: parse_datetime(&row.get::<_, String>(7)?),
        updated_at: parse_datetime(&row.get::<_, String>(8)?),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, email, password_hash, name, profile_image, customer_id,
                                    customer_pending_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    user.id,
                    user.email,
                    user.password_hash,
                    user.name,
                    user.profile_image,
                    user.customer_id,
                    user.customer_pending_key,
                    format_datetime(&user.created_at),
                ],
            )
            .map_err(map_write_error)?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.conn()
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                user_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn claim_customer_pending_key(&self, user_id: &str, key: &str) -> Result<User> {
        let conn = self.conn();
        conn.execute(
            "UPDATE users SET customer_pending_key = ?1
             WHERE id = ?2 AND customer_pending_key IS NULL AND customer_id IS NULL",
            params![key, user_id],
        )?;

        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            params![user_id],
            user_from_row,
        )
        .optional()?
        .ok_or(Error::NotFound)
    }

    fn set_customer_id(&self, user_id: &str, customer_id: &str) -> Result<String> {
        let conn = self.conn();
        conn.execute(
            "UPDATE users SET customer_id = ?1, customer_pending_key = NULL
             WHERE id = ?2 AND customer_id IS NULL",
            params![customer_id, user_id],
        )
        .map_err(map_write_error)?;

        let stored: Option<Option<String>> = conn
            .query_row(
                "SELECT customer_id FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        stored.flatten().ok_or(Error::NotFound)
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO sessions (id, token_hash, token_lookup, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.id,
                session.token_hash,
                session.token_lookup,
                session.user_id,
                format_datetime(&session.created_at),
                format_datetime(&session.expires_at),
            ],
        );

        match result.map_err(map_write_error) {
            Ok(_) => Ok(()),
            Err(Error::UniqueViolation { field }) if field == "token_lookup" => {
                Err(Error::SessionLookupCollision)
            }
            Err(e) => Err(e),
        }
    }

    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>> {
        self.conn()
            .query_row(
                "SELECT id, token_hash, token_lookup, user_id, created_at, expires_at
                 FROM sessions WHERE token_lookup = ?1",
                params![lookup],
                |row| {
                    Ok(Session {
                        id: row.get(0)?,
                        token_hash: row.get(1)?,
                        token_lookup: row.get(2)?,
                        user_id: row.get(3)?,
                        created_at: parse_datetime(&row.get::<_, String>(4)?),
                        expires_at: parse_datetime(&row.get::<_, String>(5)?),
                    })
                },
            )
            .optional()
            .map_err(Error::from)
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Site operations

    fn create_site(&self, site: &Site) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO sites (id, user_id, name, description, subdirectory, image_url,
                                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    site.id,
                    site.user_id,
                    site.name,
                    site.description,
                    site.subdirectory,
                    site.image_url,
                    format_datetime(&site.created_at),
                    format_datetime(&site.updated_at),
                ],
            )
            .map_err(map_write_error)?;
        Ok(())
    }

    fn create_site_within_limit(&self, site: &Site, limit: i64) -> Result<bool> {
        let rows = self
            .conn()
            .execute(
                "INSERT INTO sites (id, user_id, name, description, subdirectory, image_url,
                                    created_at, updated_at)
                 SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8
                 WHERE (SELECT COUNT(*) FROM sites WHERE user_id = ?2) < ?9",
                params![
                    site.id,
                    site.user_id,
                    site.name,
                    site.description,
                    site.subdirectory,
                    site.image_url,
                    format_datetime(&site.created_at),
                    format_datetime(&site.updated_at),
                    limit,
                ],
            )
            .map_err(map_write_error)?;
        Ok(rows > 0)
    }

    fn get_site(&self, user_id: &str, id: &str) -> Result<Option<Site>> {
        self.conn()
            .query_row(
                &format!("SELECT {SITE_COLUMNS} FROM sites WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                site_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn subdirectory_exists(&self, subdirectory: &str) -> Result<bool> {
        self.conn()
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM sites WHERE subdirectory = ?1)",
                params![subdirectory],
                |row| row.get(0),
            )
            .map_err(Error::from)
    }

    fn list_sites(&self, user_id: &str, limit: Option<i64>) -> Result<Vec<Site>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SITE_COLUMNS} FROM sites WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))?;

        // A negative LIMIT means no limit in SQLite.
        let rows = stmt.query_map(params![user_id, limit.unwrap_or(-1)], site_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn count_sites(&self, user_id: &str) -> Result<i64> {
        self.conn()
            .query_row(
                "SELECT COUNT(*) FROM sites WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .map_err(Error::from)
    }

    fn update_site_image(&self, user_id: &str, id: &str, image_url: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE sites SET image_url = ?1, updated_at = ?2 WHERE id = ?3 AND user_id = ?4",
            params![image_url, format_datetime(&Utc::now()), id, user_id],
        )?;
        Ok(rows > 0)
    }

    fn delete_site(&self, user_id: &str, id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM sites WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // Post operations

    fn create_post(&self, post: &Post) -> Result<()> {
        let content = serde_json::to_string(&post.article_content)?;
        self.conn()
            .execute(
                "INSERT INTO posts (id, user_id, site_id, title, slug, small_description, image,
                                    article_content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    post.id,
                    post.user_id,
                    post.site_id,
                    post.title,
                    post.slug,
                    post.small_description,
                    post.image,
                    content,
                    format_datetime(&post.created_at),
                    format_datetime(&post.updated_at),
                ],
            )
            .map_err(map_write_error)?;
        Ok(())
    }

    fn get_post(&self, user_id: &str, id: &str) -> Result<Option<Post>> {
        self.conn()
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1 AND user_id = ?2"),
                params![id, user_id],
                post_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn list_site_posts(&self, user_id: &str, site_id: &str) -> Result<Vec<Post>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?1 AND site_id = ?2
             ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(params![user_id, site_id], post_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_recent_posts(&self, user_id: &str, limit: i64) -> Result<Vec<Post>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))?;

        let rows = stmt.query_map(params![user_id, limit], post_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_post(
        &self,
        user_id: &str,
        site_id: &str,
        id: &str,
        changes: &PostChanges,
    ) -> Result<bool> {
        let content = serde_json::to_string(&changes.article_content)?;
        let rows = self
            .conn()
            .execute(
                "UPDATE posts SET title = ?1, slug = ?2, small_description = ?3, image = ?4,
                                  article_content = ?5, updated_at = ?6
                 WHERE id = ?7 AND user_id = ?8 AND site_id = ?9",
                params![
                    changes.title,
                    changes.slug,
                    changes.small_description,
                    changes.image,
                    content,
                    format_datetime(&Utc::now()),
                    id,
                    user_id,
                    site_id,
                ],
            )
            .map_err(map_write_error)?;
        Ok(rows > 0)
    }

    fn delete_post(&self, user_id: &str, id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM posts WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(rows > 0)
    }

    // Subscription operations

    fn get_subscription(&self, user_id: &str) -> Result<Option<Subscription>> {
        self.conn()
            .query_row(
                &format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE user_id = ?1"),
                params![user_id],
                subscription_from_row,
            )
            .optional()
            .map_err(Error::from)
    }

    fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO subscriptions (stripe_subscription_id, user_id, interval, status,
                                            plan_id, current_period_start, current_period_end,
                                            created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(stripe_subscription_id) DO UPDATE SET
                    interval = excluded.interval,
                    status = excluded.status,
                    plan_id = excluded.plan_id,
                    current_period_start = excluded.current_period_start,
                    current_period_end = excluded.current_period_end,
                    updated_at = excluded.updated_at",
                params![
                    subscription.stripe_subscription_id,
                    subscription.user_id,
                    subscription.interval,
                    subscription.status,
                    subscription.plan_id,
                    subscription.current_period_start,
                    subscription.current_period_end,
                    format_datetime(&subscription.created_at),
                    format_datetime(&subscription.updated_at),
                ],
            )
            .map_err(map_write_error)?;
        Ok(())
    }
}
