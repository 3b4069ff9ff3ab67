//! Payer lookup shared by the HTTP handlers
//!
//! 1. Resolve the CPF through the identity service
//! 2. Merge the address from the postal service (best effort)
//! 3. Store the record under the caller's session key

use crate::errors::{AppError, ResultExt};
use crate::models::IdentityRecord;
use crate::payment_builder::strip_non_digits;
use crate::services::{IdentityService, PostalService};
use crate::session_store::SessionStore;

/// Resolves and stores the payer identity for `session_key`.
///
/// Nothing is written when the identity lookup fails; an address failure
/// only leaves the address fields out.
pub async fn enrich_session(
    identity: &IdentityService,
    postal: &PostalService,
    sessions: &SessionStore,
    session_key: &str,
    raw_cpf: &str,
    raw_cep: Option<&str>,
) -> Result<IdentityRecord, AppError> {
    let cpf = strip_non_digits(raw_cpf);

    let record = identity
        .resolve(&cpf)
        .await
        .with_context(|| format!("Identity lookup for CPF {}", cpf))?;

    let record = postal.enrich(record, raw_cep).await;

    sessions.put_identity(session_key, record.clone()).await;
    tracing::info!(
        "Stored identity for session {} (address: {})",
        session_key,
        record.address.is_some()
    );

    Ok(record)
}
