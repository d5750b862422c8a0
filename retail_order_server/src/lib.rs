//! # Retail order server
//!
//! The HTTP face of the retail order engine. It is responsible for:
//! * accepting checkout submissions and turning them into pending orders,
//! * listening for incoming bank-transfer webhook calls from the payment gateway and feeding them to the
//!   reconciliation engine,
//! * exposing the admin read side (order lookups, search, statistics, the unattributed-payments bucket) and the
//!   admin override paths (status changes, manual settlement).
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: liveness check, returns 200 OK.
//! * `/checkout`: checkout submission for the buyer identified by the `X-Buyer-Id` header.
//! * `/orders/{id}/cancel`: buyer- or admin-initiated cancellation.
//! * `/webhook/payment`: the bank-transfer gateway webhook, HMAC-authenticated.
//! * `/api/...`: the admin surface, API-key-authenticated.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod webhook_routes;

#[cfg(test)]
mod endpoint_tests;
