//! Reqwest-backed Stripe adapter.
//!
//! Requests are form-encoded with Stripe's bracketed keys; responses are decoded
//! into the handful of fields the actions use.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use super::{BillingProvider, CheckoutRequest, CheckoutSession, Customer, NewCustomer};
use crate::config::BillingConfig;
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct CustomerDto {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionDto {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDto,
}

#[derive(Debug, Deserialize)]
struct ErrorDto {
    message: Option<String>,
}

pub struct StripeClient {
    client: Client,
    api_base: String,
    secret_key: String,
}

impl StripeClient {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(config: &BillingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Billing(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            secret_key: config.secret_key.clone(),
        })
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T> {
        let mut request = self
            .client
            .post(format!("{}{path}", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(form);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Billing(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Billing(format!("reading {path} response failed: {e}")))?;

        if !status.is_success() {
            return Err(map_status_error(status, &body));
        }

        serde_json::from_slice(&body)
            .map_err(|e| Error::Billing(format!("invalid {path} response: {e}")))
    }
}

#[async_trait]
impl BillingProvider for StripeClient {
    async fn create_customer(&self, customer: &NewCustomer<'_>) -> Result<Customer> {
        tracing::debug!("Creating billing customer");
        let dto: CustomerDto = self
            .post(
                "/v1/customers",
                &customer_form(customer),
                Some(customer.idempotency_key),
            )
            .await?;
        Ok(Customer { id: dto.id })
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest<'_>,
    ) -> Result<CheckoutSession> {
        tracing::debug!(customer = request.customer_id, "Creating checkout session");
        let dto: CheckoutSessionDto = self
            .post("/v1/checkout/sessions", &checkout_form(request), None)
            .await?;

        let url = dto
            .url
            .ok_or_else(|| Error::Billing("checkout session has no url".to_string()))?;
        Ok(CheckoutSession { id: dto.id, url })
    }
}

fn customer_form(customer: &NewCustomer<'_>) -> Vec<(String, String)> {
    vec![
        ("email".to_string(), customer.email.to_string()),
        ("name".to_string(), customer.name.to_string()),
    ]
}

fn checkout_form(request: &CheckoutRequest<'_>) -> Vec<(String, String)> {
    [
        ("customer", request.customer_id),
        ("mode", "subscription"),
        ("billing_address_collection", "auto"),
        ("payment_method_types[0]", "card"),
        ("line_items[0][price]", request.price_id),
        ("line_items[0][quantity]", "1"),
        ("customer_update[address]", "auto"),
        ("customer_update[name]", "auto"),
        ("success_url", request.success_url),
        ("cancel_url", request.cancel_url),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn map_status_error(status: StatusCode, body: &[u8]) -> Error {
    let message = serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .unwrap_or_else(|| "no error message".to_string());
    Error::Billing(format!("provider returned {status}: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkout_form_uses_bracketed_keys() {
        let form = checkout_form(&CheckoutRequest {
            customer_id: "cus_1",
            price_id: "price_1",
            success_url: "http://localhost:3000/dashboard/payment/success",
            cancel_url: "http://localhost:3000/dashboard/payment/cancelled",
        });

        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("customer"), Some("cus_1"));
        assert_eq!(get("mode"), Some("subscription"));
        assert_eq!(get("line_items[0][price]"), Some("price_1"));
        assert_eq!(get("line_items[0][quantity]"), Some("1"));
        assert_eq!(get("payment_method_types[0]"), Some("card"));
        assert_eq!(
            get("cancel_url"),
            Some("http://localhost:3000/dashboard/payment/cancelled")
        );
    }

    #[test]
    fn test_customer_form() {
        let form = customer_form(&NewCustomer {
            email: "a@example.com",
            name: "Ada",
            idempotency_key: "key",
        });
        assert_eq!(
            form,
            vec![
                ("email".to_string(), "a@example.com".to_string()),
                ("name".to_string(), "Ada".to_string()),
            ]
        );
    }

    #[test]
    fn test_status_error_surfaces_provider_message() {
        let err = map_status_error(
            StatusCode::BAD_REQUEST,
            br#"{"error":{"message":"No such price"}}"#,
        );
        assert!(err.to_string().contains("No such price"));

        let err = map_status_error(StatusCode::BAD_GATEWAY, b"<html>");
        assert!(err.to_string().contains("502"));
    }
}
