//! Payment page flow: turn query parameters into a rendered PIX charge and
//! the polling session that watches it.

use crate::errors::AppError;
use crate::gateway_client::PixGatewayClient;
use crate::models::{PaymentIntent, PaymentParams, PaymentView};
use crate::payment_builder::{format_cpf, strip_non_digits, PaymentIntentBuilder};
use crate::poller::{PollerSettings, PollingSession, RedirectTarget};
use crate::session_store::SessionStore;

#[derive(Debug, Clone)]
pub struct Checkout {
    pub intent: PaymentIntent,
    pub view: PaymentView,
    pub session: PollingSession,
}

/// Fills `cpf` and `nome` from the session's identity record when the query omits them.
///
/// The name is only taken from the record when the query's CPF (if any) is
/// the record's own, so a charge never pairs one payer's CPF with another's name.
pub async fn with_session_identity(
    sessions: &SessionStore,
    session_key: &str,
    mut params: PaymentParams,
) -> PaymentParams {
    let missing = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
    if !missing(&params.cpf) && !missing(&params.nome) {
        return params;
    }

    if let Some(record) = sessions.identity(session_key).await {
        let same_payer = params
            .cpf
            .as_deref()
            .filter(|cpf| !cpf.trim().is_empty())
            .map_or(true, |cpf| strip_non_digits(cpf) == record.tax_id);

        if missing(&params.cpf) {
            params.cpf = Some(record.tax_id.clone());
        }
        if missing(&params.nome) && same_payer {
            params.nome = record.known_name().map(str::to_string);
        }
    }
    params
}

/// Validates, creates the charge and prepares its polling session.
///
/// # Errors
///
/// * `AppError::Validation` before any gateway call.
/// * `AppError::Gateway` when the charge request fails.
/// * `AppError::UnusableIntent` when the gateway answered without id, code or QR.
pub async fn create_checkout(
    builder: &PaymentIntentBuilder,
    gateway: &PixGatewayClient,
    sessions: &SessionStore,
    session_key: &str,
    params: PaymentParams,
    redirect_url: &str,
) -> Result<Checkout, AppError> {
    let params = with_session_identity(sessions, session_key, params).await;
    let built = builder.build(&params)?;

    let intent = gateway.create_charge(&built.request).await?;
    let session = PollingSession::new(
        &intent,
        session_key,
        RedirectTarget {
            base_url: redirect_url.to_string(),
            tax_id: params.cpf.clone(),
            name: params.nome.clone(),
        },
        PollerSettings::default(),
    )?;

    sessions.cache_intent(session_key, intent.clone()).await;

    let view = PaymentView {
        id: intent.id.clone(),
        pix_copy_paste: intent.pix_copy_paste.clone().unwrap_or_default(),
        qr_code_url: intent.qr_code_url.clone().unwrap_or_default(),
        amount_cents: intent.amount_cents,
        customer_name: built.name,
        customer_document: format_cpf(&built.tax_id),
        status: intent.status,
        status_url: format!("/api/v1/pagamento/{}/status", intent.id),
    };

    Ok(Checkout {
        intent,
        view,
        session,
    })
}
