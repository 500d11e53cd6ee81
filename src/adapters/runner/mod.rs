//! Background services that drive the engine.

mod renewal_runner;

pub use renewal_runner::{RenewalRunner, RenewalRunnerConfig, RunReport};
