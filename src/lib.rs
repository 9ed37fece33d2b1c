//! Oracle query bridge.
//!
//! Watches query events emitted by a simulated execution ledger, decodes
//! them against a fixed schema registry, dispatches them to an external
//! query-fulfillment service, polls for completion, and answers back
//! on-ledger through callback transactions.

pub mod abi;
pub mod bridge;
pub mod core;
pub mod ledger;
pub mod notify;
pub mod service;
