use std::sync::Arc;

use axum::{Form, extract::State, response::Redirect};
use chrono::Utc;
use uuid::Uuid;

use super::{SITES_PATH, site_path};
use crate::auth::RequireUser;
use crate::server::AppState;
use crate::server::dto::{DeletePostForm, PostForm};
use crate::server::response::{ActionError, ActionResult, StoreResultExt};
use crate::server::validation::{
    PostInput, SITE_ID, SITE_NOT_FOUND, ValidationReport, parse_post, parse_post_edit,
};
use crate::store::Store;
use crate::types::{Post, PostChanges};

/// A post may only be attached to a site its author owns.
fn require_owned_site(store: &dyn Store, user_id: &str, site_id: &str) -> Result<(), ActionError> {
    match store
        .get_site(user_id, site_id)
        .api_err("Failed to load site")?
    {
        Some(_) => Ok(()),
        None => Err(ValidationReport::single(SITE_ID.name, SITE_NOT_FOUND).into()),
    }
}

fn changes(input: PostInput) -> PostChanges {
    PostChanges {
        title: input.title,
        slug: input.slug,
        small_description: input.small_description,
        image: input.cover_image,
        article_content: input.article_content,
    }
}

pub async fn create_post(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Form(form): Form<PostForm>,
) -> ActionResult {
    let input = parse_post(&form).into_result()?;
    let store = state.store().await?;
    let user_id = &auth.user.id;

    require_owned_site(store.as_ref(), user_id, &input.site_id)?;

    let now = Utc::now();
    let post = Post {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.clone(),
        site_id: input.site_id,
        title: input.title,
        slug: input.slug,
        small_description: input.small_description,
        image: input.cover_image,
        article_content: input.article_content,
        created_at: now,
        updated_at: now,
    };

    store.create_post(&post).or_conflict("Failed to create post")?;
    tracing::info!(user_id = %user_id, site_id = %post.site_id, post_id = %post.id, "Post created");

    Ok(Redirect::to(&site_path(&post.site_id)))
}

pub async fn edit_post(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Form(form): Form<PostForm>,
) -> ActionResult {
    let edit = parse_post_edit(&form).into_result()?;
    let store = state.store().await?;
    let user_id = &auth.user.id;
    let site_id = edit.post.site_id.clone();

    require_owned_site(store.as_ref(), user_id, &site_id)?;

    let updated = store
        .update_post(user_id, &site_id, &edit.article_id, &changes(edit.post))
        .or_conflict("Failed to update post")?;
    if updated {
        tracing::info!(user_id = %user_id, post_id = %edit.article_id, "Post updated");
    } else {
        tracing::debug!(
            user_id = %user_id,
            post_id = %edit.article_id,
            "No matching post to update"
        );
    }

    Ok(Redirect::to(&site_path(&site_id)))
}

pub async fn delete_post(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
    Form(form): Form<DeletePostForm>,
) -> ActionResult {
    if let Some(article_id) = form.article_id.as_deref().filter(|id| !id.is_empty()) {
        let store = state.store().await?;
        let deleted = store
            .delete_post(&auth.user.id, article_id)
            .api_err("Failed to delete post")?;
        if deleted {
            tracing::info!(user_id = %auth.user.id, post_id = article_id, "Post deleted");
        }
    }

    let target = match form.site_id.as_deref().filter(|id| !id.is_empty()) {
        Some(site_id) => site_path(site_id),
        None => SITES_PATH.to_string(),
    };
    Ok(Redirect::to(&target))
}
