use std::sync::Arc;

use axum::{Form, extract::State, response::Redirect};
use chrono::Utc;
use uuid::Uuid;

use super::{PRICING_PATH, SITES_PATH, site_path};
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{DeleteSiteForm, ImageForm, SiteForm};
use crate::server::response::{ActionResult, StoreResultExt};
use crate::server::validation::{parse_image_update, parse_site_creation};
use crate::types::{Site, Subscription};

/// Sites a user without an active subscription may own.
const FREE_SITE_LIMIT: i64 = 1;

pub async fn create_site(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Form(form): Form<SiteForm>,
) -> ActionResult {
    let user = &auth.user;
    let store = state.store().await?;

    let subscribed = store
        .get_subscription(&user.id)
        .api_err("Failed to load subscription")?
        .as_ref()
        .is_some_and(Subscription::is_active);
    let site_count = store
        .count_sites(&user.id)
        .api_err("Failed to count sites")?;

    if !subscribed && site_count >= FREE_SITE_LIMIT {
        tracing::info!(user_id = %user.id, site_count, "Free plan site limit reached");
        return Ok(Redirect::to(PRICING_PATH));
    }

    let lookup = Arc::clone(&store);
    let input = parse_site_creation(&form, |subdirectory| async move {
        lookup
            .subdirectory_exists(&subdirectory)
            .map(|exists| !exists)
    })
    .await
    .api_err("Failed to check subdirectory")?
    .into_result()?;

    let now = Utc::now();
    let site = Site {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        name: input.name,
        description: input.description,
        subdirectory: input.subdirectory,
        image_url: None,
        created_at: now,
        updated_at: now,
    };

    // The count above may be stale; the free-plan insert re-checks it.
    let created = if subscribed {
        store.create_site(&site).map(|()| true)
    } else {
        store.create_site_within_limit(&site, FREE_SITE_LIMIT)
    }
    .or_conflict("Failed to create site")?;
    if !created {
        tracing::info!(user_id = %user.id, "Free plan site limit reached");
        return Ok(Redirect::to(PRICING_PATH));
    }
    tracing::info!(
        user_id = %user.id,
        site_id = %site.id,
        subdirectory = %site.subdirectory,
        "Site created"
    );

    Ok(Redirect::to(SITES_PATH))
}

pub async fn update_site_image(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Form(form): Form<ImageForm>,
) -> ActionResult {
    let input = parse_image_update(&form).into_result()?;
    let store = state.store().await?;

    let updated = store
        .update_site_image(&auth.user.id, &input.site_id, &input.image_url)
        .api_err("Failed to update site image")?;
    if !updated {
        tracing::debug!(
            user_id = %auth.user.id,
            site_id = %input.site_id,
            "No owned site to update"
        );
    }

    Ok(Redirect::to(&site_path(&input.site_id)))
}

pub async fn delete_site(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Form(form): Form<DeleteSiteForm>,
) -> ActionResult {
    if let Some(site_id) = form.site_id.as_deref().filter(|id| !id.is_empty()) {
        let store = state.store().await?;
        let deleted = store
            .delete_site(&auth.user.id, site_id)
            .api_err("Failed to delete site")?;
        if deleted {
            tracing::info!(user_id = %auth.user.id, site_id, "Site deleted");
        }
    }

    Ok(Redirect::to(SITES_PATH))
}
