use crate::config::Config;
use crate::errors::AppError;
use crate::models::{Address, IdentityRecord};
use crate::payment_builder::strip_non_digits;
use crate::poller::Notifier;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;

fn http_client() -> Result<Client, AppError> {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))
}

// ============ Identity Lookup ============

pub struct IdentityService {
    client: Client,
    base_url: String,
    api_token: String,
}

impl IdentityService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client()?,
            base_url: config.identity_api_url.clone(),
            api_token: config.identity_api_token.clone(),
        })
    }

    /// Look up a payer by CPF.
    ///
    /// `tax_id` must already be digit-only. Fails with `NotFound` when the
    /// payload carries `"success": false` and with `Upstream` on any non-200
    /// status, transport failure or non-JSON body.
    pub async fn resolve(&self, tax_id: &str) -> Result<IdentityRecord, AppError> {
        let url = format!("{}/cpf/{}", self.base_url, tax_id);
        tracing::info!("Identity lookup for CPF: {}", tax_id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Identity request failed: {}", e)))?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Identity API returned error {}: {}", status, error_text);
            return Err(AppError::Upstream(format!(
                "Identity API returned status {}: {}",
                status, error_text
            )));
        }

        let payload: Value = response.json().await.map_err(|e| {
            AppError::Upstream(format!("Failed to parse identity response: {}", e))
        })?;

        if payload.get("success").and_then(|s| s.as_bool()) == Some(false) {
            tracing::info!("Identity API reported CPF {} as not found", tax_id);
            return Err(AppError::NotFound("CPF não encontrado.".to_string()));
        }

        Ok(IdentityRecord::from_lookup(tax_id, &payload))
    }
}

// ============ Postal Code Lookup ============

pub struct PostalService {
    client: Client,
    base_url: String,
}

impl PostalService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client()?,
            base_url: config.postal_api_url.clone(),
        })
    }

    /// Best-effort address merge.
    ///
    /// Returns `record` unchanged when no postal code is given or when the
    /// lookup fails in any way (transport, HTTP status, body, `erro` marker).
    pub async fn enrich(&self, record: IdentityRecord, postal_code: Option<&str>) -> IdentityRecord {
        let Some(cep) = postal_code.map(strip_non_digits).filter(|c| !c.is_empty()) else {
            return record;
        };

        match self.lookup(&cep).await {
            Ok(Some(address)) => {
                tracing::info!("Address merged for CEP {}", cep);
                record.with_address(address)
            }
            Ok(None) => {
                tracing::info!("Postal API has no address for CEP {}", cep);
                record
            }
            Err(e) => {
                tracing::warn!("⚠️  Postal lookup failed for CEP {}: {}", cep, e);
                record
            }
        }
    }

    async fn lookup(&self, cep: &str) -> Result<Option<Address>, AppError> {
        let url = format!("{}/{}.json", self.base_url, cep);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Postal request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Postal API returned status {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Failed to parse postal response: {}", e)))?;

        if payload.get("erro").is_some() {
            return Ok(None);
        }

        Ok(Some(Address::from_lookup(&payload)))
    }
}

// ============ Payment Notifications ============

pub const PAID_NOTIFICATION_TITLE: &str = "Venda Aprovada!";
pub const PAID_NOTIFICATION_MESSAGE: &str = "Seu pagamento via Pix foi processado com sucesso.";

/// Push notification sender. Without a configured endpoint it only logs.
pub struct NotificationService {
    client: Client,
    endpoint: Option<String>,
}

impl NotificationService {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let endpoint = config.notification_url.as_ref().map(|base| {
            format!(
                "{}/notifications/{}",
                base.trim_end_matches('/'),
                config.notification_channel
            )
        });

        Ok(Self {
            client: http_client()?,
            endpoint,
        })
    }
}

#[async_trait]
impl Notifier for NotificationService {
    async fn notify(&self, title: &str, message: &str) -> Result<(), AppError> {
        let Some(ref endpoint) = self.endpoint else {
            tracing::info!("🔔 NOTIFICATION (log only): {} - {}", title, message);
            return Ok(());
        };

        let response = self
            .client
            .post(endpoint)
            .json(&json!({ "title": title, "message": message }))
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Notification request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "Notification endpoint returned status {}",
                response.status()
            )));
        }

        tracing::info!("📲 Notification sent: {}", title);
        Ok(())
    }
}
