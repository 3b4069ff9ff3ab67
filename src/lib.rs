//! PIX Checkout API Library
//!
//! This library provides the payment-session orchestration behind the PIX
//! checkout pages: payer lookup (identity and postal services), PIX charge
//! creation on the payment gateway, and the status polling state machine that
//! notifies and redirects once a charge is paid.
//!
//! # Modules
//!
//! - `api`: Route table and API-layer namespace.
//! - `core`: Core business logic namespace.
//! - `integrations`: External service integrations namespace.
//! - `checkout`: Payment page flow (charge creation + polling session).
//! - `config`: Configuration management.
//! - `enrichment`: Payer lookup and session storage.
//! - `errors`: Error handling types.
//! - `gateway_client`: PIX gateway client.
//! - `handlers`: HTTP request handlers.
//! - `models`: Core data models.
//! - `payment_builder`: Input validation and gateway payload construction.
//! - `poller`: Status polling state machine and driver.
//! - `services`: Identity, postal and notification clients.
//! - `session_store`: Per-session identity and charge cache.

pub mod api;
pub mod core;
pub mod integrations;

pub mod checkout;
pub mod config;
pub mod enrichment;
pub mod errors;
pub mod gateway_client;
pub mod handlers;
pub mod models;
pub mod payment_builder;
pub mod poller;
pub mod services;
pub mod session_store;
