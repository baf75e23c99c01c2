use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription status written by the billing provider for a paying account.
pub const SUBSCRIPTION_ACTIVE: &str = "active";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<String>,
    /// Idempotency key of a billing customer creation that has been started
    /// but whose resulting id has not been recorded yet.
    #[serde(skip)]
    pub customer_pending_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub subdirectory: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub site_id: String,
    pub title: String,
    pub slug: String,
    pub small_description: String,
    pub image: String,
    pub article_content: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub stripe_subscription_id: String,
    pub user_id: String,
    pub interval: String,
    pub status: String,
    pub plan_id: String,
    pub current_period_start: i64,
    pub current_period_end: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SUBSCRIPTION_ACTIVE
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub token_hash: String,
    pub token_lookup: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Owner-scoped fields of a post that an edit replaces.
#[derive(Debug, Clone)]
pub struct PostChanges {
    pub title: String,
    pub slug: String,
    pub small_description: String,
    pub image: String,
    pub article_content: serde_json::Value,
}
