use crate::errors::AppError;
use crate::models::{GatewayRequest, PaymentIntent, PaymentStatus};
use crate::poller::StatusSource;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

/// Client for the PIX payment gateway.
#[derive(Clone)]
pub struct PixGatewayClient {
    client: reqwest::Client,
    base_url: String,
    secret: String,
    status_token: String,
}

impl PixGatewayClient {
    /// Creates a new `PixGatewayClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the gateway API.
    /// * `secret` - Bearer token used to create charges.
    /// * `status_token` - Bearer token used to query charge status.
    pub fn new(base_url: String, secret: String, status_token: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Gateway(format!("Failed to create gateway client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
            status_token,
        })
    }

    /// Creates a PIX charge.
    ///
    /// A 200 response missing `id`, `pix.copypaste` or `pix.qrcode` still
    /// yields an intent; callers check [`PaymentIntent::is_usable`].
    ///
    /// # Returns
    ///
    /// * `Result<PaymentIntent, AppError>` - The issued charge, or `AppError::Gateway`
    ///   on transport failure, non-200 status, or a non-JSON body.
    pub async fn create_charge(&self, request: &GatewayRequest) -> Result<PaymentIntent, AppError> {
        let url = format!("{}/payments", self.base_url);
        tracing::info!("Creating PIX charge of {} cents: {}", request.amount, url);
        tracing::debug!(
            "Payload: {}",
            serde_json::to_string(request).unwrap_or_default()
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.secret))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Charge request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Gateway(format!(
                "Gateway returned {}: {}",
                status, error_text
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse charge response: {}", e)))?;
        tracing::debug!("Gateway response (HTTP {}): {}", status, data);

        let intent = intent_from_response(&data, request.amount);
        if intent.is_usable() {
            tracing::info!("✓ PIX charge created: {}", intent.id);
        } else {
            tracing::warn!(
                "Gateway response missing {:?}: {}",
                intent.missing_fields(),
                data
            );
        }

        Ok(intent)
    }

    /// Queries the settlement status of a charge.
    ///
    /// # Returns
    ///
    /// * `Result<PaymentStatus, AppError>` - `Unknown` when the field is absent or
    ///   unrecognized; `AppError::Gateway` on a non-success HTTP status.
    pub async fn fetch_status(&self, intent_id: &str) -> Result<PaymentStatus, AppError> {
        let url = format!("{}/payment-status/{}", self.base_url, intent_id);
        tracing::debug!("Fetching status for charge {}", intent_id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.status_token))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Status request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Gateway(format!(
                "Erro HTTP: {}",
                response.status().as_u16()
            )));
        }

        let data: Value = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("Failed to parse status response: {}", e)))?;

        Ok(PaymentStatus::from_wire(
            data.get("status").and_then(|s| s.as_str()),
        ))
    }
}

#[async_trait]
impl StatusSource for PixGatewayClient {
    async fn fetch_status(&self, intent_id: &str) -> Result<PaymentStatus, AppError> {
        PixGatewayClient::fetch_status(self, intent_id).await
    }
}

/// Builds an intent from a `{id, pix: {copypaste, qrcode}}` body, keeping whatever is present.
fn intent_from_response(data: &Value, amount_cents: i64) -> PaymentIntent {
    // Some gateway versions return numeric ids
    let id = match data.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let pix_field = |key: &str| {
        data.get("pix")
            .and_then(|pix| pix.get(key))
            .and_then(|v| v.as_str())
            .map(str::to_string)
    };

    PaymentIntent {
        id,
        amount_cents,
        pix_copy_paste: pix_field("copypaste"),
        qr_code_url: pix_field("qrcode"),
        status: PaymentStatus::Pending,
        created_at: Utc::now(),
    }
}
