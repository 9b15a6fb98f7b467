//! Audit trail for conversation activity.
//!
//! Components receive a sink at construction instead of writing to a global
//! log buffer. `TracingAudit` forwards to `tracing`, `MemoryAudit` keeps the
//! entries so a front-end can persist the trace of a run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::llm::Role;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    MessageAppended { role: Role, content: String },
    TokenCount { tokens: usize, available: usize },
    Truncated { removed: usize, tokens: usize },
    Summarized { tokens: usize },
    StagePrompt { stage: String, prompt: String },
    CompletionFailed { error: String },
    Reset,
    Transcript { messages: usize, dump: String },
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MessageAppended { role, content } => write!(f, "{}: {}", role, content),
            Self::TokenCount { tokens, available } => {
                write!(f, "Conversation tokens: {} (available {})", tokens, available)
            }
            Self::Truncated { removed, tokens } => {
                write!(f, "Truncated {} messages, new conversation tokens: {}", removed, tokens)
            }
            Self::Summarized { tokens } => {
                write!(f, "Summarized conversation, new conversation tokens: {}", tokens)
            }
            Self::StagePrompt { stage, prompt } => write!(f, "{} prompt: {}", stage, prompt),
            Self::CompletionFailed { error } => write!(f, "Completion failed: {}", error),
            Self::Reset => write!(f, "Conversation reset"),
            Self::Transcript { messages, dump } => {
                write!(f, "Full conversation ({} messages): {}", messages, dump)
            }
        }
    }
}

/// Receives audit events.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Emits every event through `tracing` under the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAudit;

impl AuditSink for TracingAudit {
    fn record(&self, event: AuditEvent) {
        match &event {
            AuditEvent::CompletionFailed { error } => {
                warn!(target: "audit", error = %error, "completion failed");
            }
            AuditEvent::MessageAppended { role, content } => {
                info!(target: "audit", role = %role, content = %content, "message appended");
            }
            AuditEvent::Transcript { .. } => debug!(target: "audit", "{}", event),
            _ => info!(target: "audit", "{}", event),
        }
    }
}

/// A timestamped audit entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub event: AuditEvent,
}

/// Keeps events in memory, in arrival order.
#[derive(Debug, Default)]
pub struct MemoryAudit {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.lock().clone()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.lock().iter().map(|e| e.event.clone()).collect()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// One line per entry, `timestamp - event`.
    pub fn render(&self) -> String {
        self.lock()
            .iter()
            .map(|e| format!("{} - {}", e.timestamp.format("%Y-%m-%d %H:%M:%S"), e.event))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<AuditEntry>> {
        // A poisoned trace is still a usable trace
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, event: AuditEvent) {
        self.lock().push(AuditEntry {
            timestamp: Utc::now(),
            event,
        });
    }
}

/// Forwards each event to every inner sink.
#[derive(Default, Clone)]
pub struct FanoutAudit {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAudit {
    pub fn new(sinks: Vec<Arc<dyn AuditSink>>) -> Self {
        Self { sinks }
    }
}

impl AuditSink for FanoutAudit {
    fn record(&self, event: AuditEvent) {
        for sink in &self.sinks {
            sink.record(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_audit_keeps_order() {
        let audit = MemoryAudit::new();
        audit.record(AuditEvent::Reset);
        audit.record(AuditEvent::MessageAppended {
            role: Role::User,
            content: "hi".into(),
        });

        let events = audit.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], AuditEvent::Reset);
        assert!(audit.render().ends_with("user: hi"));

        audit.clear();
        assert!(audit.events().is_empty());
    }

    #[test]
    fn test_entries_serialize_with_timestamp() {
        let audit = MemoryAudit::new();
        audit.record(AuditEvent::Reset);
        audit.record(AuditEvent::TokenCount {
            tokens: 7,
            available: 2996,
        });

        let entries = audit.entries();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].timestamp <= entries[1].timestamp);

        let json = serde_json::to_value(&entries).unwrap();
        assert!(json[0]["timestamp"].is_string());
        assert_eq!(json[0]["event"]["type"], "reset");
        assert_eq!(json[1]["event"]["type"], "token_count");
        assert_eq!(json[1]["event"]["available"], 2996);
    }

    #[test]
    fn test_fanout_reaches_all_sinks() {
        let a = Arc::new(MemoryAudit::new());
        let b = Arc::new(MemoryAudit::new());
        let sinks: Vec<Arc<dyn AuditSink>> = vec![a.clone(), b.clone(), Arc::new(TracingAudit)];
        let fanout = FanoutAudit::new(sinks);

        fanout.record(AuditEvent::Summarized { tokens: 12 });

        assert_eq!(a.events(), vec![AuditEvent::Summarized { tokens: 12 }]);
        assert_eq!(b.events(), a.events());
    }
}
