use serde::Deserialize;

const DEFAULT_POSTAL_API_URL: &str = "https://opencep.com/v1";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub identity_api_url: String,
    pub identity_api_token: String,
    pub postal_api_url: String,
    pub gateway_url: String,
    pub gateway_secret: String,
    /// Bearer token for status queries; falls back to `gateway_secret`.
    pub gateway_status_token: String,
    pub notification_url: Option<String>, // Unset means notifications are only logged
    pub notification_channel: String,
    pub redirect_url: String,
    pub session_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let gateway_secret = required_secret("GATEWAY_SECRET")?;

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            identity_api_url: required_url("IDENTITY_API_URL")?,
            identity_api_token: required_secret("IDENTITY_API_TOKEN")?,
            postal_api_url: match std::env::var("POSTAL_API_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
            {
                Some(url) => check_url("POSTAL_API_URL", url)?,
                None => DEFAULT_POSTAL_API_URL.to_string(),
            },
            gateway_url: required_url("GATEWAY_URL")?,
            gateway_status_token: std::env::var("GATEWAY_STATUS_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| gateway_secret.clone()),
            gateway_secret,
            notification_url: match std::env::var("NOTIFICATION_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
            {
                Some(url) => Some(check_url("NOTIFICATION_URL", url)?),
                None => None,
            },
            notification_channel: std::env::var("NOTIFICATION_CHANNEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "pix".to_string()),
            redirect_url: required_url("REDIRECT_URL")?,
            session_ttl_secs: std::env::var("SESSION_TTL_SECS")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("SESSION_TTL_SECS must be a positive integer"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Identity API URL: {}", config.identity_api_url);
        tracing::debug!("Postal API URL: {}", config.postal_api_url);
        tracing::debug!("Gateway URL: {}", config.gateway_url);
        match config.notification_url {
            Some(_) => tracing::info!(
                "Payment notifications enabled on channel '{}'",
                config.notification_channel
            ),
            None => tracing::warn!("NOTIFICATION_URL not set, payment notifications are log-only"),
        }
        tracing::debug!("Redirect URL: {}", config.redirect_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn required_secret(name: &str) -> anyhow::Result<String> {
    std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))
        .and_then(|value| {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
            Ok(value)
        })
}

fn required_url(name: &str) -> anyhow::Result<String> {
    let url = required_secret(name)?;
    check_url(name, url)
}

fn check_url(name: &str, url: String) -> anyhow::Result<String> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_url_strips_trailing_slash() {
        let url = check_url("GATEWAY_URL", "https://gateway.test/api/".to_string()).unwrap();
        assert_eq!(url, "https://gateway.test/api");
    }

    #[test]
    fn check_url_rejects_missing_scheme() {
        assert!(check_url("GATEWAY_URL", "gateway.test".to_string()).is_err());
    }
}
