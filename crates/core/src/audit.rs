//! Audit event emission
//!
//! Fire-and-forget: events go onto a bounded channel and a background task
//! delivers them. A full or closed channel is logged and otherwise ignored;
//! audit failure never fails or rolls back the primary operation.

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

const AUDIT_CHANNEL_CAPACITY: usize = 256;

/// Kinds of audit events produced by the subscription workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventKind {
    SubscriptionAdd,
    SubscriptionUpdate,
}

impl AuditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventKind::SubscriptionAdd => "subscription_add",
            AuditEventKind::SubscriptionUpdate => "subscription_update",
        }
    }
}

/// One audit record: who did what to which subject
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub kind: AuditEventKind,
    pub actor_id: String,
    pub message: String,
    pub subject_id: String,
    pub extra: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// Handle for emitting audit events. Cheap to clone; all clones feed the
/// same delivery task.
#[derive(Clone)]
pub struct AuditEmitter {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditEmitter {
    /// Creates an emitter and spawns its delivery task. With no endpoint
    /// configured, events are logged instead of delivered.
    pub fn new(endpoint: Option<String>) -> Self {
        let (tx, rx) = mpsc::channel(AUDIT_CHANNEL_CAPACITY);
        tokio::spawn(deliver(rx, endpoint));
        Self { tx }
    }

    /// Creates an emitter backed by a plain channel, handing the receiver to
    /// the caller. Used by tests to observe emitted events.
    pub fn channel() -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(AUDIT_CHANNEL_CAPACITY);
        (Self { tx }, rx)
    }

    /// Queues an event without waiting. Best effort.
    pub fn emit(
        &self,
        kind: AuditEventKind,
        actor_id: &str,
        message: &str,
        subject_id: &str,
        extra: Value,
    ) {
        let event = AuditEvent {
            id: Uuid::new_v4(),
            kind,
            actor_id: actor_id.to_string(),
            message: message.to_string(),
            subject_id: subject_id.to_string(),
            extra,
            recorded_at: OffsetDateTime::now_utc(),
        };
        if let Err(err) = self.tx.try_send(event) {
            tracing::warn!(kind = kind.as_str(), error = %err, "audit event dropped");
        }
    }
}

async fn deliver(mut rx: mpsc::Receiver<AuditEvent>, endpoint: Option<String>) {
    let client = reqwest::Client::new();
    while let Some(event) = rx.recv().await {
        match &endpoint {
            Some(url) => {
                let result = client.post(url).json(&event).send().await;
                match result.and_then(|r| r.error_for_status()) {
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(
                            kind = event.kind.as_str(),
                            subject_id = %event.subject_id,
                            error = %err,
                            "audit delivery failed"
                        );
                    }
                }
            }
            None => {
                tracing::info!(
                    kind = event.kind.as_str(),
                    actor_id = %event.actor_id,
                    subject_id = %event.subject_id,
                    extra = %event.extra,
                    "{}",
                    event.message
                );
            }
        }
    }
}
