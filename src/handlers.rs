use crate::checkout::create_checkout;
use crate::config::Config;
use crate::enrichment::enrich_session;
use crate::errors::AppError;
use crate::gateway_client::PixGatewayClient;
use crate::models::{LookupQueryParams, LookupResponse, PaymentParams};
use crate::payment_builder::PaymentIntentBuilder;
use crate::poller::{PollRegistry, PollSnapshot, StatusPoller, TokioClock};
use crate::services::{IdentityService, NotificationService, PostalService};
use crate::session_store::SessionStore;
use axum::{
    extract::{Path, Query, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Cookie carrying the opaque session key.
pub const SESSION_COOKIE: &str = "pix_session";

/// Shared application state injected into handlers.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    pub identity: IdentityService,
    pub postal: PostalService,
    pub gateway: PixGatewayClient,
    pub builder: PaymentIntentBuilder,
    /// Identity records and cached charges per browser session.
    pub sessions: SessionStore,
    /// Background status polling, one task per rendered charge.
    pub poller: StatusPoller,
}

impl AppState {
    /// Builds every client from `config`. Session and poll data expire after
    /// `session_ttl_secs`.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let ttl = Duration::from_secs(config.session_ttl_secs);
        let sessions = SessionStore::new(ttl);
        let gateway = PixGatewayClient::new(
            config.gateway_url.clone(),
            config.gateway_secret.clone(),
            config.gateway_status_token.clone(),
        )?;
        let poller = StatusPoller::new(
            Arc::new(gateway.clone()),
            Arc::new(NotificationService::new(&config)?),
            Arc::new(TokioClock),
            sessions.clone(),
            PollRegistry::new(ttl),
        );

        Ok(Self {
            identity: IdentityService::new(&config)?,
            postal: PostalService::new(&config)?,
            gateway,
            builder: PaymentIntentBuilder::new(),
            sessions,
            poller,
            config,
        })
    }
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rust-pix-api",
            "version": "0.1.0"
        })),
    )
}

/// GET /api/v1/consulta
///
/// Looks the payer up by CPF (and optionally CEP) and stores the result in
/// the caller's session.
///
/// # Returns
///
/// * `Result<Response, AppError>` - `{"status": 200, "message": "Dados salvos."}`,
///   400 without `cpf`, 404 when the CPF is unknown, 500 on upstream failure.
pub async fn lookup_payer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<LookupQueryParams>,
) -> Result<Response, AppError> {
    tracing::info!(
        "GET /consulta - cep provided: {}",
        params.cep.as_deref().map_or(false, |c| !c.is_empty())
    );

    let raw_cpf = params
        .cpf
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::Validation("CPF é obrigatório.".to_string()))?;

    let (session_key, set_cookie) = session_key(&headers);
    enrich_session(
        &state.identity,
        &state.postal,
        &state.sessions,
        &session_key,
        raw_cpf,
        params.cep.as_deref(),
    )
    .await?;

    let body = Json(LookupResponse {
        status: 200,
        message: "Dados salvos.".to_string(),
    });
    Ok(with_cookie(body.into_response(), set_cookie))
}

/// GET /api/v1/pagamento
///
/// Creates the PIX charge, returns what the payment page renders and starts
/// polling its status in the background. Rendering a new charge stops the
/// polling of the session's previous one.
///
/// # Returns
///
/// * `Result<Response, AppError>` - The `PaymentView`, 400 on invalid CPF or amount,
///   500 when the gateway fails or returns no usable PIX data.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<PaymentParams>,
) -> Result<Response, AppError> {
    let (session_key, set_cookie) = session_key(&headers);

    let checkout = create_checkout(
        &state.builder,
        &state.gateway,
        &state.sessions,
        &session_key,
        params,
        &state.config.redirect_url,
    )
    .await?;

    // Visible to the status endpoint before the task gets scheduled
    state
        .poller
        .registry()
        .publish(PollSnapshot::from_session(&checkout.session))
        .await;

    // Replaces any poll still running for an earlier charge of this session
    state.poller.spawn(checkout.session).await;

    Ok(with_cookie(Json(checkout.view).into_response(), set_cookie))
}

/// GET /api/v1/pagamento/:id/status
///
/// Latest polling snapshot for a charge rendered by this service.
pub async fn payment_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PollSnapshot>, AppError> {
    state
        .poller
        .registry()
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Pagamento {} não encontrado", id)))
}

/// Reads the session key from the `pix_session` cookie, minting a new one
/// (and the `Set-Cookie` value to return) when absent.
pub fn session_key(headers: &HeaderMap) -> (String, Option<HeaderValue>) {
    let existing = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
        .next();

    match existing {
        Some(key) => (key, None),
        None => {
            let key = Uuid::new_v4().to_string();
            let cookie = HeaderValue::from_str(&format!(
                "{}={}; Path=/; HttpOnly; SameSite=Lax",
                SESSION_COOKIE, key
            ))
            .ok();
            (key, cookie)
        }
    }
}

fn with_cookie(mut response: Response, set_cookie: Option<HeaderValue>) -> Response {
    if let Some(cookie) = set_cookie {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}
