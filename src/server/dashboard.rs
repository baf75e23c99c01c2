//! Read-only JSON views backing the dashboard pages. Every query is scoped
//! to the signed-in user.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};

use super::dto::{DashboardResponse, SiteDetailResponse};
use super::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::auth::RequireUser;
use crate::server::AppState;

const RECENT_LIMIT: i64 = 3;

pub fn dashboard_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/dashboard", get(overview))
        .route("/dashboard/sites", get(list_sites))
        .route("/dashboard/sites/{site_id}", get(get_site))
        .route("/dashboard/sites/{site_id}/{article_id}", get(get_post))
}

async fn overview(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store().await?;
    let sites = store
        .list_sites(&auth.user.id, Some(RECENT_LIMIT))
        .api_err("Failed to list sites")?;
    let articles = store
        .list_recent_posts(&auth.user.id, RECENT_LIMIT)
        .api_err("Failed to list articles")?;

    Ok(Json(ApiResponse::success(DashboardResponse { sites, articles })))
}

async fn list_sites(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store().await?;
    let sites = store
        .list_sites(&auth.user.id, None)
        .api_err("Failed to list sites")?;

    Ok(Json(ApiResponse::success(sites)))
}

async fn get_site(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path(site_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store().await?;
    let site = store
        .get_site(&auth.user.id, &site_id)
        .api_err("Failed to get site")?
        .or_not_found("Site not found")?;
    let posts = store
        .list_site_posts(&auth.user.id, &site.id)
        .api_err("Failed to list posts")?;

    Ok(Json(ApiResponse::success(SiteDetailResponse { site, posts })))
}

async fn get_post(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Path((site_id, article_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store().await?;
    let post = store
        .get_post(&auth.user.id, &article_id)
        .api_err("Failed to get post")?
        .filter(|post| post.site_id == site_id)
        .or_not_found("Post not found")?;

    Ok(Json(ApiResponse::success(post)))
}
