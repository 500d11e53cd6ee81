//! GetSubscriptionHistoryHandler - query handler for the audit trail.

use std::sync::Arc;

use crate::application::AuditLog;
use crate::domain::audit::AuditEntry;
use crate::domain::foundation::SubscriptionId;
use crate::domain::subscription::SubscriptionError;

#[derive(Debug, Clone)]
pub struct GetSubscriptionHistoryQuery {
    pub subscription_id: SubscriptionId,
}

#[derive(Debug, Clone)]
pub struct GetSubscriptionHistoryResult {
    pub subscription_id: SubscriptionId,
    /// Newest first.
    pub entries: Vec<AuditEntry>,
}

pub struct GetSubscriptionHistoryHandler {
    audit_log: Arc<AuditLog>,
}

impl GetSubscriptionHistoryHandler {
    pub fn new(audit_log: Arc<AuditLog>) -> Self {
        Self { audit_log }
    }

    pub async fn handle(
        &self,
        query: GetSubscriptionHistoryQuery,
    ) -> Result<GetSubscriptionHistoryResult, SubscriptionError> {
        let entries = self.audit_log.history(query.subscription_id).await?;
        Ok(GetSubscriptionHistoryResult {
            subscription_id: query.subscription_id,
            entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::handlers::subscription::test_support::{sub_id, Stack};
    use crate::application::handlers::subscription::{
        PauseSubscriptionCommand, PauseSubscriptionHandler, ResumeSubscriptionCommand,
        ResumeSubscriptionHandler,
    };
    use crate::domain::audit::{AuditAction, AuditContext};
    use crate::domain::foundation::Timestamp;

    #[tokio::test]
    async fn returns_mutations_newest_first() {
        let stack = Stack::with_native(1);
        PauseSubscriptionHandler::new(stack.repo.clone(), stack.scheduler.clone())
            .handle(PauseSubscriptionCommand {
                subscription_id: sub_id(1),
                until: Timestamp::now().add_days(9).date(),
                context: AuditContext::system(),
            })
            .await
            .unwrap();
        ResumeSubscriptionHandler::new(stack.repo.clone(), stack.scheduler.clone())
            .handle(ResumeSubscriptionCommand {
                subscription_id: sub_id(1),
                context: AuditContext::system().with_origin(
                    Some("203.0.113.9".to_string()),
                    Some("ops-console".to_string()),
                ),
            })
            .await
            .unwrap();

        let handler = GetSubscriptionHistoryHandler::new(Arc::new(AuditLog::new(stack.audit.clone())));
        let result = handler
            .handle(GetSubscriptionHistoryQuery { subscription_id: sub_id(1) })
            .await
            .unwrap();

        let actions: Vec<AuditAction> = result.entries.iter().map(|e| e.action).collect();
        assert_eq!(actions, vec![AuditAction::Resumed, AuditAction::Paused]);
        let origin = result.entries[0].origin.as_ref().unwrap();
        assert_eq!(origin.ip_address.as_deref(), Some("203.0.113.9"));
    }

    #[tokio::test]
    async fn audit_outage_is_fatal() {
        let stack = Stack::with_native(2);
        stack.audit.set_unavailable(true);
        let handler = GetSubscriptionHistoryHandler::new(Arc::new(AuditLog::new(stack.audit.clone())));

        let err = handler
            .handle(GetSubscriptionHistoryQuery { subscription_id: sub_id(2) })
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
