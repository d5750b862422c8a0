//! Retail Order Engine
//!
//! The core of the retail order server: the path from cart snapshot, through order creation with discount
//! computation, to asynchronous content-based payment matching and the idempotent settlement transition. This
//! library is HTTP-free and provider-agnostic.
//!
//! The library is divided into two main sections:
//! 1. Database management and control ([`mod@sqlite`], [`mod@traits`]). SQLite is the supported backend. You should
//!    never need to access the database directly; use the public APIs instead. The exception is the data types used
//!    in the database, which are defined in [`mod@db_types`] and are public.
//! 2. The engine public API: [`CheckoutApi`] (cart → pending order), [`OrderFlowApi`] (payment reconciliation and
//!    explicit lifecycle transitions) and [`OrderQueryApi`] (read-side projections). Backends implement the traits
//!    in [`mod@traits`] to drive these APIs.
//!
//! The engine also emits events when orders are created, settled or annulled. A simple actor framework in
//! [`mod@events`] lets you hook into these and perform custom actions.
mod api;

pub mod db_types;
pub mod events;
pub mod helpers;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;

pub use api::{
    checkout_api::{CheckoutApi, CheckoutRequest},
    order_flow_api::OrderFlowApi,
    order_objects,
    order_query_api::OrderQueryApi,
    payment_objects,
};
