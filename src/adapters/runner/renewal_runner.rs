//! RenewalRunner - Background driver of due renewals.
//!
//! Each pass:
//! 1. Returns claims abandoned by a dead run to the pending set, then claims
//!    every overdue action in the legacy queue
//! 2. Adds on-hold subscriptions whose retry time has arrived
//! 3. Processes the distinct subscriptions with bounded concurrency
//! 4. Completes claimed actions, or releases them after a fatal error
//! 5. Optionally cancels subscriptions whose grace period has lapsed
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `poll_interval` | 60s | Time between passes |
//! | `max_concurrent` | 4 | Renewals in flight within one pass |
//! | `cancel_lapsed` | true | Run grace-expiry cancellation after each pass |
//! | `claim_timeout` | 15m | Age at which an unsettled claim is released |
//!
//! ## Graceful Shutdown
//!
//! The runner finishes the pass in progress and stops when the shutdown
//! channel flips to `true`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};

use crate::application::{
    CancelLapsedSubscriptionsCommand, CancelLapsedSubscriptionsHandler, ProcessRenewalCommand,
    ProcessRenewalHandler, RenewalOutcome, Scheduler,
};
use crate::config::RunnerConfig;
use crate::domain::foundation::{ActionId, SubscriptionId, Timestamp};
use crate::domain::subscription::SubscriptionError;
use crate::ports::SubscriptionRepository;

/// Configuration for the RenewalRunner.
#[derive(Debug, Clone)]
pub struct RenewalRunnerConfig {
    pub poll_interval: Duration,
    pub max_concurrent: usize,
    pub cancel_lapsed: bool,
    pub claim_timeout: Duration,
}

/// Upper bound on `claim_timeout`.
const MAX_CLAIM_TIMEOUT: Duration = Duration::from_secs(86_400);

impl Default for RenewalRunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            max_concurrent: 4,
            cancel_lapsed: true,
            claim_timeout: Duration::from_secs(900),
        }
    }
}

impl RenewalRunnerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_cancel_lapsed(mut self, cancel_lapsed: bool) -> Self {
        self.cancel_lapsed = cancel_lapsed;
        self
    }

    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout.min(MAX_CLAIM_TIMEOUT);
        self
    }
}

impl From<&RunnerConfig> for RenewalRunnerConfig {
    fn from(config: &RunnerConfig) -> Self {
        Self::default()
            .with_poll_interval(config.poll_interval())
            .with_max_concurrent(config.max_concurrent)
            .with_cancel_lapsed(config.cancel_lapsed)
            .with_claim_timeout(config.claim_timeout())
    }
}

/// Tally of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Charged (or recorded, for legacy billing) successfully.
    pub renewed: usize,
    /// Billing date was in the skip set.
    pub skipped: usize,
    /// Payment failed; the subscription is on hold.
    pub failed: usize,
    /// Refused without charging (paused, terminal, no billing target).
    pub refused: usize,
    /// Storage or queue failures; claimed actions were released.
    pub errors: usize,
    /// Cancelled after grace expiry.
    pub cancelled: usize,
    /// Abandoned claims returned to the pending set.
    pub recovered: usize,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.renewed + self.skipped + self.failed + self.refused + self.errors
    }

    fn tally(&mut self, result: &Result<RenewalOutcome, SubscriptionError>) {
        match result {
            Ok(outcome) if outcome.is_skipped() => self.skipped += 1,
            Ok(outcome) if outcome.success => self.renewed += 1,
            Ok(_) => self.failed += 1,
            Err(e) if e.is_fatal() => self.errors += 1,
            Err(_) => self.refused += 1,
        }
    }
}

/// Background service that drives due renewals.
pub struct RenewalRunner {
    scheduler: Arc<Scheduler>,
    repository: Arc<dyn SubscriptionRepository>,
    renewals: Arc<ProcessRenewalHandler>,
    lapsed: Arc<CancelLapsedSubscriptionsHandler>,
    config: RenewalRunnerConfig,
}

impl RenewalRunner {
    pub fn new(
        scheduler: Arc<Scheduler>,
        repository: Arc<dyn SubscriptionRepository>,
        renewals: Arc<ProcessRenewalHandler>,
        lapsed: Arc<CancelLapsedSubscriptionsHandler>,
    ) -> Self {
        Self::with_config(scheduler, repository, renewals, lapsed, RenewalRunnerConfig::default())
    }

    pub fn with_config(
        scheduler: Arc<Scheduler>,
        repository: Arc<dyn SubscriptionRepository>,
        renewals: Arc<ProcessRenewalHandler>,
        lapsed: Arc<CancelLapsedSubscriptionsHandler>,
        config: RenewalRunnerConfig,
    ) -> Self {
        Self {
            scheduler,
            repository,
            renewals,
            lapsed,
            config,
        }
    }

    /// Run passes on the poll interval until shutdown is signalled.
    ///
    /// A failed pass is logged and retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            max_concurrent = self.config.max_concurrent,
            "Renewal runner started"
        );

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Renewal runner stopping");
                        return;
                    }
                }

                _ = interval.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::error!(error = %e, "Renewal pass failed");
                    }
                }
            }
        }
    }

    /// Run exactly one pass.
    ///
    /// # Errors
    ///
    /// Only when the due set cannot be collected; failures of individual
    /// renewals are counted in the report.
    pub async fn run_once(&self) -> Result<RunReport, SubscriptionError> {
        let now = Timestamp::now();
        let mut report = RunReport::default();

        // 1. Recover abandoned claims, then claim overdue actions
        let timeout = self.config.claim_timeout.min(MAX_CLAIM_TIMEOUT);
        let cutoff = now.plus_secs(-(timeout.as_secs() as i64));
        report.recovered = self.scheduler.recover_stale_claims(cutoff).await?.len();

        let mut claimed: HashMap<SubscriptionId, Vec<ActionId>> = HashMap::new();
        let mut order: Vec<SubscriptionId> = Vec::new();
        for action in self.scheduler.list_pending().await? {
            if !action.overdue {
                continue;
            }
            if let Err(e) = self.scheduler.claim(action.action_id).await {
                self.release_all(&claimed).await;
                return Err(e.into());
            }
            let ids = claimed.entry(action.subscription_id).or_default();
            if ids.is_empty() {
                order.push(action.subscription_id);
            }
            ids.push(action.action_id);
        }

        // 2. Retries that have come due
        let retry_due = match self.repository.find_retry_due(now).await {
            Ok(due) => due,
            Err(e) => {
                self.release_all(&claimed).await;
                return Err(e.into());
            }
        };
        let policy = self.renewals.retry_policy().clone();
        for subscription in retry_due {
            if !policy.within_budget(subscription.failed_payment_count) {
                continue;
            }
            if !claimed.contains_key(&subscription.id) && !order.contains(&subscription.id) {
                order.push(subscription.id);
            }
        }

        // 3. Process
        let renewals = self.renewals.clone();
        let results: Vec<(SubscriptionId, Result<RenewalOutcome, SubscriptionError>)> =
            stream::iter(order)
                .map(|id| {
                    let renewals = renewals.clone();
                    async move { (id, renewals.handle(ProcessRenewalCommand::system(id)).await) }
                })
                .buffer_unordered(self.config.max_concurrent.max(1))
                .collect()
                .await;

        // 4. Settle claims
        for (id, result) in &results {
            report.tally(result);
            if let Err(e) = result {
                log_refusal(*id, e);
            }
            let fatal = matches!(result, Err(e) if e.is_fatal());
            for action_id in claimed.remove(id).unwrap_or_default() {
                let settled = if fatal {
                    self.scheduler.release(action_id).await
                } else {
                    self.scheduler.complete(action_id).await
                };
                if let Err(e) = settled {
                    tracing::error!(
                        subscription_id = %id,
                        action_id = %action_id,
                        error = %e,
                        "Failed to settle claimed renewal action"
                    );
                }
            }
        }

        // 5. Grace expiry
        if self.config.cancel_lapsed {
            match self
                .lapsed
                .handle(CancelLapsedSubscriptionsCommand::default())
                .await
            {
                Ok(result) => report.cancelled = result.cancelled.len(),
                Err(e) => {
                    report.errors += 1;
                    tracing::error!(error = %e, "Failed to cancel lapsed subscriptions");
                }
            }
        }

        if report.processed() > 0 || report.cancelled > 0 || report.recovered > 0 {
            tracing::info!(
                recovered = report.recovered,
                renewed = report.renewed,
                skipped = report.skipped,
                failed = report.failed,
                refused = report.refused,
                errors = report.errors,
                cancelled = report.cancelled,
                "Renewal pass complete"
            );
        }
        Ok(report)
    }

    /// Best-effort release of claims taken by a pass that cannot continue.
    /// Anything left claimed is recovered once the claim timeout passes.
    async fn release_all(&self, claimed: &HashMap<SubscriptionId, Vec<ActionId>>) {
        for (id, action_ids) in claimed {
            for action_id in action_ids {
                if let Err(e) = self.scheduler.release(*action_id).await {
                    tracing::error!(
                        subscription_id = %id,
                        action_id = %action_id,
                        error = %e,
                        "Failed to release claimed renewal action"
                    );
                }
            }
        }
    }
}

fn log_refusal(id: SubscriptionId, error: &SubscriptionError) {
    if error.is_fatal() {
        tracing::error!(subscription_id = %id, error = %error, "Renewal aborted");
    } else {
        tracing::info!(subscription_id = %id, error = %error, "Renewal refused");
    }
}
