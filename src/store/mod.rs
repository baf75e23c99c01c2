mod connection;
mod schema;
mod sqlite;

pub use connection::{Connector, Database, SqliteConnector};
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the database interface.
///
/// Site and post operations take the caller's user id and never touch rows
/// owned by anyone else.
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user(&self, id: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Records `key` as the pending billing-customer key unless a key or a
    /// customer id is already stored. Returns the user as stored afterwards.
    fn claim_customer_pending_key(&self, user_id: &str, key: &str) -> Result<User>;
    /// Stores the customer id unless one is already set, clearing the pending
    /// key. Returns the customer id the user ends up with.
    fn set_customer_id(&self, user_id: &str, customer_id: &str) -> Result<String>;
    /// Inserts the site only while the owner has fewer than `limit` sites.
    /// Returns false when the limit blocked the insert.
    fn create_site_within_limit(&self, site: &Site, limit: i64) -> Result<bool>;

    // Session operations
    fn create_session(&self, session: &Session) -> Result<()>;
    fn get_session_by_lookup(&self, lookup: &str) -> Result<Option<Session>>;
    fn delete_session(&self, id: &str) -> Result<bool>;

    // Site operations
    fn create_site(&self, site: &Site) -> Result<()>;
    fn get_site(&self, user_id: &str, id: &str) -> Result<Option<Site>>;
    fn subdirectory_exists(&self, subdirectory: &str) -> Result<bool>;
    fn list_sites(&self, user_id: &str, limit: Option<i64>) -> Result<Vec<Site>>;
    fn count_sites(&self, user_id: &str) -> Result<i64>;
    fn update_site_image(&self, user_id: &str, id: &str, image_url: &str) -> Result<bool>;
    fn delete_site(&self, user_id: &str, id: &str) -> Result<bool>;

    // Post operations
    fn create_post(&self, post: &Post) -> Result<()>;
    fn get_post(&self, user_id: &str, id: &str) -> Result<Option<Post>>;
    fn list_site_posts(&self, user_id: &str, site_id: &str) -> Result<Vec<Post>>;
    fn list_recent_posts(&self, user_id: &str, limit: i64) -> Result<Vec<Post>>;
    fn update_post(
        &self,
        user_id: &str,
        site_id: &str,
        id: &str,
        changes: &PostChanges,
    ) -> Result<bool>;
    fn delete_post(&self, user_id: &str, id: &str) -> Result<bool>;

    // Subscription operations
    fn get_subscription(&self, user_id: &str) -> Result<Option<Subscription>>;
    fn upsert_subscription(&self, subscription: &Subscription) -> Result<()>;
}
