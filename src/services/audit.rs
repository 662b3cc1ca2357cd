use crate::database::AuditRepository;
use tracing::warn;

/// Append-only audit trail. Recording is best effort: a failed insert is
/// logged and swallowed so it can never fail the operation it describes.
#[derive(Clone)]
pub struct AuditRecorder {
    repository: AuditRepository,
}

impl AuditRecorder {
    pub fn new(repository: AuditRepository) -> Self {
        Self { repository }
    }

    pub async fn record(
        &self,
        actor: &str,
        action: &str,
        target_type: &str,
        target_id: &str,
        detail: serde_json::Value,
    ) {
        if let Err(err) = self
            .repository
            .record(actor, action, target_type, target_id, &detail)
            .await
        {
            warn!(
                %actor,
                %action,
                %target_type,
                %target_id,
                error = %err,
                "audit record dropped"
            );
        }
    }
}
