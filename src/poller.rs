//! Charge status polling.
//!
//! [`transition`] is the whole state machine: it takes the current
//! [`PollingSession`] and the outcome of one status fetch and returns the next
//! session plus the side effects to perform. [`StatusPoller`] is the async
//! driver that fetches, sleeps and executes those effects through injected
//! [`StatusSource`], [`Notifier`] and [`Clock`] implementations, so the machine
//! can be exercised without real timers or a real gateway.
//!
//! ```text
//! IDLE -> POLLING -> PAID
//!                 -> EXHAUSTED     (budget spent on non-paid statuses)
//!                 -> ERRORED_STOP  (budget spent, last fetch failed)
//! ```

use crate::errors::AppError;
use crate::models::{PaymentIntent, PaymentStatus};
use crate::services::{PAID_NOTIFICATION_MESSAGE, PAID_NOTIFICATION_TITLE};
use crate::session_store::SessionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{AbortHandle, JoinHandle};

pub const MAX_ATTEMPTS: u32 = 200;
pub const POLL_INTERVAL: Duration = Duration::from_millis(3000);
pub const REDIRECT_DELAY: Duration = Duration::from_secs(2);

// ============ Seams ============

/// Anything that can report the settlement status of a charge.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, intent_id: &str) -> Result<PaymentStatus, AppError>;
}

/// One-shot external notification channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str) -> Result<(), AppError>;
}

#[async_trait]
pub trait Clock: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

// ============ State Machine ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PollState {
    Idle,
    Polling,
    Paid,
    Exhausted,
    ErroredStop,
}

impl PollState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Paid | PollState::Exhausted | PollState::ErroredStop
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    pub max_attempts: u32,
    pub interval: Duration,
    pub redirect_delay: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            interval: POLL_INTERVAL,
            redirect_delay: REDIRECT_DELAY,
        }
    }
}

/// Confirmation page the payer is sent to once the charge is paid.
///
/// `tax_id` and `name` are the `cpf`/`nome` the payment page was opened
/// with. When the query omitted them they come from the session identity,
/// the name only if that identity has the same CPF. The fixed defaults
/// substituted for the gateway request never end up here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget {
    pub base_url: String,
    pub tax_id: Option<String>,
    pub name: Option<String>,
}

impl RedirectTarget {
    /// Builds `<base>?cpf=..&nome=..`, or the reason the redirect cannot happen.
    pub fn url(&self) -> Result<String, String> {
        let present = |v: &Option<String>| v.clone().filter(|s| !s.trim().is_empty());
        let (Some(cpf), Some(nome)) = (present(&self.tax_id), present(&self.name)) else {
            return Err("CPF ou nome ausentes na URL".to_string());
        };

        url::Url::parse_with_params(&self.base_url, &[("cpf", cpf), ("nome", nome)])
            .map(String::from)
            .map_err(|e| format!("Invalid redirect URL {}: {}", self.base_url, e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingSession {
    pub intent_id: String,
    /// Session whose cached intent is cleared once the charge is paid.
    pub session_key: String,
    pub attempt_count: u32,
    pub notified: bool,
    pub state: PollState,
    pub settings: PollerSettings,
    pub redirect: RedirectTarget,
}

impl PollingSession {
    /// Creates an `IDLE` session for a usable intent.
    ///
    /// # Errors
    ///
    /// * `AppError::UnusableIntent` when the intent lacks id, copy-paste code or QR code.
    pub fn new(
        intent: &PaymentIntent,
        session_key: impl Into<String>,
        redirect: RedirectTarget,
        settings: PollerSettings,
    ) -> Result<Self, AppError> {
        if !intent.is_usable() {
            return Err(AppError::UnusableIntent(format!(
                "missing {}",
                intent.missing_fields().join(", ")
            )));
        }

        Ok(Self {
            intent_id: intent.id.clone(),
            session_key: session_key.into(),
            attempt_count: 0,
            notified: false,
            state: PollState::Idle,
            settings,
            redirect,
        })
    }

    /// `IDLE -> POLLING` with the first tick due immediately. No-op in any other state.
    pub fn start(&self) -> (PollingSession, Vec<Effect>) {
        let mut next = self.clone();
        if self.state != PollState::Idle {
            return (next, Vec::new());
        }
        next.state = PollState::Polling;
        next.attempt_count = 0;
        (next, vec![Effect::ScheduleTick(Duration::ZERO)])
    }
}

/// Result of one status fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Status(PaymentStatus),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Fetch again after the given delay.
    ScheduleTick(Duration),
    ClearCachedIntent {
        session_key: String,
        intent_id: String,
    },
    Notify,
    Redirect { url: String, after: Duration },
    RedirectAborted { reason: String },
}

/// Advances the machine by one fetch outcome.
///
/// Only `POLLING` reacts; any other state returns itself unchanged with no
/// effects. A failed fetch consumes budget exactly like a non-paid status.
pub fn transition(session: &PollingSession, outcome: &FetchOutcome) -> (PollingSession, Vec<Effect>) {
    let mut next = session.clone();
    if session.state != PollState::Polling {
        return (next, Vec::new());
    }

    next.attempt_count += 1;
    let budget_left = next.attempt_count < next.settings.max_attempts;

    match outcome {
        FetchOutcome::Status(PaymentStatus::Paid) => {
            next.state = PollState::Paid;
            let mut effects = vec![Effect::ClearCachedIntent {
                session_key: next.session_key.clone(),
                intent_id: next.intent_id.clone(),
            }];
            if !next.notified {
                next.notified = true;
                effects.push(Effect::Notify);
            }
            effects.push(match next.redirect.url() {
                Ok(url) => Effect::Redirect {
                    url,
                    after: next.settings.redirect_delay,
                },
                Err(reason) => Effect::RedirectAborted { reason },
            });
            (next, effects)
        }
        FetchOutcome::Status(_) if budget_left => {
            let effects = vec![Effect::ScheduleTick(next.settings.interval)];
            (next, effects)
        }
        FetchOutcome::Status(_) => {
            next.state = PollState::Exhausted;
            (next, Vec::new())
        }
        FetchOutcome::Failed(_) if budget_left => {
            let effects = vec![Effect::ScheduleTick(next.settings.interval)];
            (next, effects)
        }
        FetchOutcome::Failed(_) => {
            next.state = PollState::ErroredStop;
            (next, Vec::new())
        }
    }
}

// ============ Observation ============

/// What the payer's page can read about a running or finished poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollSnapshot {
    pub intent_id: String,
    pub state: PollState,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub notified: bool,
    pub last_status: Option<PaymentStatus>,
    pub redirect_url: Option<String>,
    pub redirect_error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl PollSnapshot {
    pub fn from_session(session: &PollingSession) -> Self {
        Self {
            intent_id: session.intent_id.clone(),
            state: session.state,
            attempt_count: session.attempt_count,
            max_attempts: session.settings.max_attempts,
            notified: session.notified,
            last_status: None,
            redirect_url: None,
            redirect_error: None,
            updated_at: Utc::now(),
        }
    }

    fn refresh(&mut self, session: &PollingSession) {
        self.state = session.state;
        self.attempt_count = session.attempt_count;
        self.notified = session.notified;
        self.updated_at = Utc::now();
    }
}

/// Latest snapshot per intent id.
#[derive(Clone)]
pub struct PollRegistry {
    snapshots: Cache<String, PollSnapshot>,
}

impl PollRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            snapshots: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(10_000)
                .build(),
        }
    }

    pub async fn publish(&self, snapshot: PollSnapshot) {
        self.snapshots
            .insert(snapshot.intent_id.clone(), snapshot)
            .await;
    }

    pub async fn get(&self, intent_id: &str) -> Option<PollSnapshot> {
        self.snapshots.get(intent_id).await
    }
}

// ============ Driver ============

/// Runs polling sessions: one sequential loop per session, each tick
/// scheduled after the previous one finished.
#[derive(Clone)]
pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    sessions: SessionStore,
    registry: PollRegistry,
    /// Running poll task per session key.
    tasks: Cache<String, AbortHandle>,
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn StatusSource>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        sessions: SessionStore,
        registry: PollRegistry,
    ) -> Self {
        let longest_run = POLL_INTERVAL * MAX_ATTEMPTS + REDIRECT_DELAY;
        Self {
            source,
            notifier,
            clock,
            sessions,
            registry,
            tasks: Cache::builder()
                .time_to_live(longest_run)
                .max_capacity(10_000)
                .build(),
        }
    }

    /// Runs `session` on its own task. A task still polling an earlier charge
    /// of the same browser session is aborted first.
    pub async fn spawn(&self, session: PollingSession) -> JoinHandle<PollSnapshot> {
        let session_key = session.session_key.clone();
        if let Some(previous) = self.tasks.get(&session_key).await {
            if !previous.is_finished() {
                tracing::info!("Superseded charge polling aborted for session {}", session_key);
                previous.abort();
            }
        }

        let poller = self.clone();
        let handle = tokio::spawn(async move { poller.run(session).await });
        self.tasks.insert(session_key, handle.abort_handle()).await;
        handle
    }

    pub fn registry(&self) -> &PollRegistry {
        &self.registry
    }

    /// Drives `session` from `IDLE` to a terminal state and returns the final snapshot.
    pub async fn run(&self, session: PollingSession) -> PollSnapshot {
        let (mut session, mut effects) = session.start();
        let mut snapshot = PollSnapshot::from_session(&session);
        let mut notification = None;
        tracing::info!("Polling status of charge {}", session.intent_id);

        loop {
            snapshot.refresh(&session);
            self.registry.publish(snapshot.clone()).await;

            let mut next_tick = None;
            for effect in effects.drain(..) {
                match effect {
                    Effect::ScheduleTick(delay) => next_tick = Some(delay),
                    Effect::ClearCachedIntent {
                        session_key,
                        intent_id,
                    } => {
                        if !self.sessions.clear_intent(&session_key, &intent_id).await {
                            tracing::debug!(
                                "Session {} already shows another charge, cache kept",
                                session_key
                            );
                        }
                    }
                    Effect::Notify => {
                        // The redirect delay never waits on delivery
                        let notifier = self.notifier.clone();
                        notification = Some(tokio::spawn(async move {
                            if let Err(e) = notifier
                                .notify(PAID_NOTIFICATION_TITLE, PAID_NOTIFICATION_MESSAGE)
                                .await
                            {
                                tracing::error!("❌ Failed to send payment notification: {}", e);
                            }
                        }));
                    }
                    Effect::Redirect { url, after } => {
                        self.clock.sleep(after).await;
                        tracing::info!("Redirecting payer of charge {}", session.intent_id);
                        snapshot.redirect_url = Some(url);
                    }
                    Effect::RedirectAborted { reason } => {
                        tracing::error!("⚠️  Redirect aborted for {}: {}", session.intent_id, reason);
                        snapshot.redirect_error = Some(reason);
                    }
                }
            }

            let Some(delay) = next_tick else {
                break;
            };
            if !delay.is_zero() {
                self.clock.sleep(delay).await;
            }

            let outcome = match self.source.fetch_status(&session.intent_id).await {
                Ok(status) => {
                    snapshot.last_status = Some(status);
                    FetchOutcome::Status(status)
                }
                Err(e) => {
                    tracing::warn!("❌ Status check failed for {}: {}", session.intent_id, e);
                    FetchOutcome::Failed(e.to_string())
                }
            };

            let (next, next_effects) = transition(&session, &outcome);
            tracing::debug!(
                "🔄 Attempt {}/{} for {}: {:?}",
                next.attempt_count,
                next.settings.max_attempts,
                next.intent_id,
                outcome
            );
            session = next;
            effects = next_effects;
        }

        snapshot.refresh(&session);
        self.registry.publish(snapshot.clone()).await;

        if let Some(handle) = notification {
            if let Err(e) = handle.await {
                tracing::error!("❌ Notification task for {} failed: {}", session.intent_id, e);
            }
        }

        match session.state {
            PollState::Paid => tracing::info!("✅ Charge {} confirmed as paid", session.intent_id),
            state => tracing::warn!(
                "⏳ Stopped polling {} after {} attempt(s): {:?}",
                session.intent_id,
                session.attempt_count,
                state
            ),
        }

        snapshot
    }
}
