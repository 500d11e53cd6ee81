//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - Subscription, audit, action queue and ledger storage
//! - `stripe` - Card gateway, plus a deduplicating mock
//! - `memory` - In-memory storage for tests and dry runs
//! - `notify` - Customer notification delivery
//! - `runner` - The periodic renewal driver

pub mod memory;
pub mod notify;
pub mod postgres;
pub mod runner;
pub mod stripe;

pub use notify::TracingNotifier;
pub use runner::{RenewalRunner, RenewalRunnerConfig, RunReport};
