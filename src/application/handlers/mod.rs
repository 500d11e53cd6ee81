//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod subscription;

pub use subscription::{
    CancelLapsedSubscriptionsCommand, CancelLapsedSubscriptionsHandler,
    CancelLapsedSubscriptionsResult, CancelSubscriptionCommand, CancelSubscriptionHandler,
    CancelSubscriptionResult, GetSubscriptionHistoryHandler, GetSubscriptionHistoryQuery,
    GetSubscriptionHistoryResult, PauseSubscriptionCommand, PauseSubscriptionHandler,
    PauseSubscriptionResult, ProcessRenewalCommand, ProcessRenewalHandler, RefundOutcome,
    RefundSubscriptionCommand, RefundSubscriptionHandler, RenewalOutcome,
    ResumeSubscriptionCommand, ResumeSubscriptionHandler, ResumeSubscriptionResult,
    SkipDateCommand, SkipDateHandler, SkipDateResult, UnskipDateHandler, DATE_SKIPPED,
    DEFAULT_REFUND_REASON,
};
