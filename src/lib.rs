//! Renewal Engine - Recurring subscription billing for the farm back office.
//!
//! Charges due subscriptions through a card gateway (or records renewals the
//! legacy commerce system collects itself), keeps the legacy action queue in
//! step with each subscription's billing date, and writes an audit entry for
//! every state change.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
