//! Form actions.
//!
//! Every action requires a signed-in user, touches only records that user
//! owns, and answers with a 303 redirect on success or a 422 validation
//! report that the dashboard re-displays next to the form.

mod posts;
mod sites;
mod subscription;

use std::sync::Arc;

use axum::{Router, routing::post};

use crate::server::AppState;

pub const DASHBOARD_PATH: &str = "/dashboard";
pub const SITES_PATH: &str = "/dashboard/sites";
pub const PRICING_PATH: &str = "/dashboard/pricing";
pub const PAYMENT_SUCCESS_PATH: &str = "/dashboard/payment/success";
pub const PAYMENT_CANCELLED_PATH: &str = "/dashboard/payment/cancelled";

/// Dashboard page of one site. The id is percent-encoded as a path segment.
pub fn site_path(site_id: &str) -> String {
    format!("{SITES_PATH}/{}", urlencoding::encode(site_id))
}

pub fn actions_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sites", post(sites::create_site))
        .route("/sites/image", post(sites::update_site_image))
        .route("/sites/delete", post(sites::delete_site))
        .route("/posts", post(posts::create_post))
        .route("/posts/edit", post(posts::edit_post))
        .route("/posts/delete", post(posts::delete_post))
        .route("/subscription", post(subscription::create_subscription))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_path_encodes_segment() {
        assert_eq!(site_path("abc-123"), "/dashboard/sites/abc-123");
        assert_eq!(site_path("a/b c"), "/dashboard/sites/a%2Fb%20c");
    }
}
