//! Stripe payment gateway adapter.
//!
//! Renewals are charged as off-session, auto-confirmed PaymentIntents. The
//! cycle's idempotency key is sent as the `Idempotency-Key` header so Stripe
//! collapses repeated attempts into one charge.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeGatewayConfig::new(api_key).with_timeout(Duration::from_secs(30));
//! let gateway = StripeGateway::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use super::types::{
    StripeCustomer, StripeErrorResponse, StripePaymentIntent, StripePaymentMethodList,
};
use crate::ports::{
    select_default_method, ChargeRequest, GatewayCharge, GatewayError, GatewayErrorCode,
    PaymentGateway, PaymentMethodRef,
};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeGatewayConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    api_base_url: String,

    /// Per-request timeout.
    timeout: Duration,
}

impl StripeGatewayConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct StripeGateway {
    config: StripeGatewayConfig,
    http_client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(config: StripeGatewayConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::provider(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    async fn read<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
        operation: &str,
    ) -> Result<T, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(
                operation,
                http_status = status.as_u16(),
                error = %error_text,
                "Stripe request failed"
            );
            return Err(match serde_json::from_str::<StripeErrorResponse>(&error_text) {
                Ok(body) => body.error.into_gateway_error(status.as_u16()),
                Err(_) => GatewayError::provider(format!("Stripe API error: {}", error_text)),
            });
        }

        response.json().await.map_err(|e| {
            GatewayError::provider(format!("Failed to parse Stripe response: {}", e))
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        operation: &str,
    ) -> Result<T, GatewayError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        self.read(response, operation).await
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::timeout(e.to_string())
    } else {
        GatewayError::network(e.to_string())
    }
}

/// Form body of a renewal PaymentIntent.
fn charge_params(request: &ChargeRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("amount".to_string(), request.amount_minor.to_string()),
        ("currency".to_string(), request.currency.clone()),
        ("customer".to_string(), request.customer_id.clone()),
        ("payment_method".to_string(), request.payment_method_id.clone()),
        ("off_session".to_string(), "true".to_string()),
        ("confirm".to_string(), "true".to_string()),
        ("description".to_string(), request.description.clone()),
    ];
    for (key, value) in &request.metadata {
        params.push((format!("metadata[{}]", key), value.clone()));
    }
    params
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_charge(&self, request: ChargeRequest) -> Result<GatewayCharge, GatewayError> {
        let response = self
            .http_client
            .post(self.url("/v1/payment_intents"))
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .header("Idempotency-Key", request.idempotency_key.as_str())
            .form(&charge_params(&request))
            .send()
            .await
            .map_err(transport_error)?;

        let intent: StripePaymentIntent = self.read(response, "create_payment_intent").await?;
        let status = intent.charge_status();
        let (error_code, error_message) = match intent.last_payment_error {
            Some(err) => (err.best_code().map(str::to_string), err.message),
            None => (None, None),
        };

        Ok(GatewayCharge {
            transaction_id: intent.id,
            status,
            error_code,
            error_message,
        })
    }

    async fn resolve_default_method(
        &self,
        gateway_customer_id: &str,
        preferred: Option<&str>,
    ) -> Result<Option<PaymentMethodRef>, GatewayError> {
        let customer: StripeCustomer = match self
            .get(
                &format!("/v1/customers/{}", gateway_customer_id),
                &[],
                "get_customer",
            )
            .await
        {
            Ok(customer) => customer,
            Err(e) if e.code == GatewayErrorCode::InvalidRequest => return Ok(None),
            Err(e) => return Err(e),
        };
        if customer.deleted {
            return Ok(None);
        }

        let list: StripePaymentMethodList = self
            .get(
                "/v1/payment_methods",
                &[("customer", gateway_customer_id), ("type", "card")],
                "list_payment_methods",
            )
            .await?;

        let flagged = customer.default_payment_method();
        let methods = list
            .data
            .into_iter()
            .map(|m| PaymentMethodRef {
                is_default: flagged == Some(m.id.as_str()),
                id: m.id,
                updated_at: m.created,
            })
            .collect();

        Ok(select_default_method(preferred, methods))
    }
}
