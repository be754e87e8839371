//! Order lifecycle coordination for the Souk storefront
//!
//! A customer's cart becomes a `pending` order; the owning shop is notified
//! once per new order and drives it through
//! `confirmed → preparing → out_for_delivery → delivered` (or `rejected`);
//! the customer watches the status change live.
//!
//! # Modules
//!
//! - [`cart`] - cart aggregation and per-device persistence
//! - [`orders`] - store, change feed, submission, state machine, expiry
//! - [`listeners`] - shop listener and customer tracker
//! - [`services`] - location and notification seams
//! - [`core`] - config, wiring, health, background tasks

pub mod auth;
pub mod cart;
pub mod core;
pub mod listeners;
pub mod order_money;
pub mod orders;
pub mod services;
pub mod utils;

pub use auth::{CustomerSession, ShopIdentity, ShopInfo};
pub use cart::CartAggregator;
pub use crate::core::{Config, OrderHub};
pub use listeners::{Connectivity, ReconnectPolicy};
pub use orders::{
    FeedError, LocalOrderStore, OrderStateMachine, OrderStore, OrderSubmissionService,
    StoreError, SubmissionError, TransitionError,
};
