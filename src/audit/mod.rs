//! Per-turn audit trail
//!
//! Every answered turn leaves a record: what kind of outcome it produced,
//! how many generation attempts it spent, and a fingerprint of the last
//! prompt sent to the generator.

use crate::models::{IntentFlags, OutcomeKind, ProductCategory, TurnOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub audit_id: Uuid,
    pub session_id: Uuid,
    pub kind: OutcomeKind,
    pub attempts: u32,
    pub category: ProductCategory,
    pub intent: IntentFlags,
    /// Hex SHA-256 of the last composed prompt; None when no prompt was built
    pub prompt_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TurnRecord {
    pub fn from_outcome(session_id: Uuid, category: ProductCategory, outcome: &TurnOutcome) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            session_id,
            kind: outcome.kind,
            attempts: outcome.attempts,
            category,
            intent: outcome.intent,
            prompt_fingerprint: outcome.prompt.as_deref().map(prompt_fingerprint),
            created_at: Utc::now(),
        }
    }
}

/// Records kept before the oldest are evicted
pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

#[derive(Default)]
struct AuditEntries {
    by_id: HashMap<Uuid, TurnRecord>,
    order: VecDeque<Uuid>,
}

/// In-memory audit trail, bounded: once `capacity` records are held the
/// oldest is dropped for each new one.
#[derive(Clone)]
pub struct AuditLog {
    entries: Arc<RwLock<AuditEntries>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(AuditEntries::default())),
            capacity: capacity.max(1),
        }
    }

    pub async fn record(&self, record: TurnRecord) -> Uuid {
        let audit_id = record.audit_id;
        let mut entries = self.entries.write().await;

        while entries.order.len() >= self.capacity {
            match entries.order.pop_front() {
                Some(oldest) => {
                    entries.by_id.remove(&oldest);
                }
                None => break,
            }
        }

        entries.order.push_back(audit_id);
        entries.by_id.insert(audit_id, record);
        audit_id
    }

    pub async fn get(&self, audit_id: Uuid) -> Option<TurnRecord> {
        self.entries.read().await.by_id.get(&audit_id).cloned()
    }

    pub async fn record_count(&self) -> usize {
        self.entries.read().await.by_id.len()
    }

    /// Records of one session, oldest first
    pub async fn list_for_session(&self, session_id: Uuid) -> Vec<TurnRecord> {
        let entries = self.entries.read().await;
        let mut items: Vec<TurnRecord> = entries
            .by_id
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        items.sort_by_key(|r| r.created_at);
        items
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

pub fn prompt_fingerprint(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_hex() {
        let a = prompt_fingerprint("질문: 추천해줘");
        assert_eq!(a, prompt_fingerprint("질문: 추천해줘"));
        assert_ne!(a, prompt_fingerprint("질문: 추천해줘 "));
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_record_and_list_for_session() {
        let log = AuditLog::new();
        let session_id = Uuid::new_v4();

        let outcome = TurnOutcome::deterministic(
            "사용자 ID를 제공해 주세요.".to_string(),
            OutcomeKind::MissingIdentifier,
            IntentFlags::default(),
        );
        let id = log
            .record(TurnRecord::from_outcome(session_id, ProductCategory::Deposit, &outcome))
            .await;
        log.record(TurnRecord::from_outcome(Uuid::new_v4(), ProductCategory::Both, &outcome))
            .await;

        let record = log.get(id).await;
        assert!(record.as_ref().map_or(false, |r| r.prompt_fingerprint.is_none()));
        assert_eq!(log.list_for_session(session_id).await.len(), 1);
    }

    #[tokio::test]
    async fn test_oldest_record_evicted_at_capacity() {
        let log = AuditLog::with_capacity(2);
        let session_id = Uuid::new_v4();
        let outcome = TurnOutcome::deterministic(
            "사용자 ID를 제공해 주세요.".to_string(),
            OutcomeKind::MissingIdentifier,
            IntentFlags::default(),
        );

        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(
                log.record(TurnRecord::from_outcome(session_id, ProductCategory::Deposit, &outcome))
                    .await,
            );
        }

        assert_eq!(log.record_count().await, 2);
        assert!(log.get(ids[0]).await.is_none());
        assert!(log.get(ids[1]).await.is_some());
        assert!(log.get(ids[2]).await.is_some());
    }
}
