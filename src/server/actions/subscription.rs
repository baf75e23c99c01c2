use std::sync::Arc;

use axum::{extract::State, response::Redirect};
use uuid::Uuid;

use super::{PAYMENT_CANCELLED_PATH, PAYMENT_SUCCESS_PATH};
use crate::auth::RequireUser;
use crate::billing::{CheckoutRequest, NewCustomer};
use crate::server::AppState;
use crate::server::response::{ActionResult, ApiError, StoreOptionExt, StoreResultExt};
use crate::store::Store;
use crate::types::User;

fn billing_unavailable(e: crate::error::Error) -> ApiError {
    tracing::error!("Billing provider call failed: {e}");
    ApiError::bad_gateway("Billing provider unavailable")
}

/// Returns the user's billing customer id, creating the customer first if
/// needed.
///
/// The idempotency key is claimed atomically before the provider is called and
/// reused until the customer id is stored. Concurrent or interrupted attempts
/// all send the same key, so the provider creates at most one customer.
async fn ensure_customer(
    state: &AppState,
    store: &dyn Store,
    user: &User,
) -> Result<String, ApiError> {
    if let Some(customer_id) = &user.customer_id {
        return Ok(customer_id.clone());
    }

    let claimed = store
        .claim_customer_pending_key(&user.id, &Uuid::new_v4().to_string())
        .api_err("Failed to record billing customer")?;
    if let Some(customer_id) = claimed.customer_id {
        return Ok(customer_id);
    }
    let key = claimed
        .customer_pending_key
        .ok_or_else(|| ApiError::internal("Failed to record billing customer"))?;

    let customer = state
        .billing
        .create_customer(&NewCustomer {
            email: &user.email,
            name: &user.name,
            idempotency_key: &key,
        })
        .await
        .map_err(billing_unavailable)?;

    let customer_id = store
        .set_customer_id(&user.id, &customer.id)
        .api_err("Failed to save billing customer")?;
    if customer_id == customer.id {
        tracing::info!(user_id = %user.id, customer_id = %customer_id, "Billing customer created");
    }

    Ok(customer_id)
}

pub async fn create_subscription(
    auth: RequireUser,
    State(state): State<Arc<AppState>>,
) -> ActionResult {
    let store = state.store().await?;
    let user = store
        .get_user(&auth.user.id)
        .api_err("Failed to load user")?
        .or_not_found("User not found")?;

    let customer_id = ensure_customer(&state, store.as_ref(), &user).await?;

    let success_url = format!("{}{PAYMENT_SUCCESS_PATH}", state.redirect_base_url);
    let cancel_url = format!("{}{PAYMENT_CANCELLED_PATH}", state.redirect_base_url);
    let session = state
        .billing
        .create_checkout_session(&CheckoutRequest {
            customer_id: &customer_id,
            price_id: &state.price_id,
            success_url: &success_url,
            cancel_url: &cancel_url,
        })
        .await
        .map_err(billing_unavailable)?;

    tracing::info!(user_id = %user.id, checkout_id = %session.id, "Checkout session opened");
    Ok(Redirect::to(&session.url))
}
