//! Trolley
//!
//! Trolley is an optimistic cart engine: it prices a shopping cart, applies item mutations
//! immediately and reconciles them with the backend, rolling back anything the backend refuses.

pub mod boundary;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod coordinator;
pub mod delivery;
pub mod errors;
pub mod items;
pub mod money;
pub mod prelude;
pub mod pricing;
pub mod promo;
pub mod replay;
pub mod snapshot;
pub mod summary;
