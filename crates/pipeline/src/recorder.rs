//! Resolution recording.
//!
//! Best-effort: every failure is logged and swallowed, and a slow log is cut
//! off after the configured timeout.

use std::time::Duration;

use phonefinder_backend::ConversationLog;
use phonefinder_model::{CanonicalQuery, ConversationId, ResolutionRecord};

/// Append the canonical query used for a search to the conversation log.
pub async fn record<L: ConversationLog>(
    log: &L,
    conversation_id: &ConversationId,
    query: &CanonicalQuery,
    user_message: Option<&str>,
    timeout: Duration,
) {
    let record = match ResolutionRecord::new(
        conversation_id.clone(),
        query,
        user_message.map(str::to_string),
    ) {
        Ok(record) => record,
        Err(err) => {
            tracing::warn!(
                conversation_id = %conversation_id,
                error = %err,
                "Failed to encode query resolution"
            );
            return;
        }
    };

    match tokio::time::timeout(timeout, log.append(&record)).await {
        Ok(Ok(())) => {
            tracing::debug!(conversation_id = %conversation_id, "Recorded query resolution");
        }
        Ok(Err(err)) => {
            tracing::warn!(
                conversation_id = %conversation_id,
                error = %err,
                "Failed to record query resolution"
            );
        }
        Err(_) => {
            tracing::warn!(
                conversation_id = %conversation_id,
                timeout_ms = timeout.as_millis() as u64,
                "Timed out recording query resolution"
            );
        }
    }
}
