//! Repair dispatch: web-form intake relayed to the on-call dispatcher.

pub mod config;
pub mod error;
pub mod format;
pub mod ledger;
pub mod notify;
pub mod order;
pub mod pipeline;
pub mod routes;
pub mod verify;
