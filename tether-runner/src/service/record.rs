//! Workflow record service
//!
//! Keeps one record per correlation token for observability. Each
//! orchestration only ever writes its own token, while any number of readers
//! may inspect the store; a write is visible to every read that follows it.

use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tether_core::domain::{CorrelationToken, RecordState, RunHandle, RunStatus, WorkflowRecord};

/// Concurrent store of workflow records keyed by correlation token
pub trait WorkflowRecordStore: Send + Sync {
    /// Starts (or restarts) tracking a token as `pending`
    fn begin(&self, token: &CorrelationToken);

    /// Remembers the run a token was correlated with
    fn attach_run(&self, token: &CorrelationToken, run: RunHandle);

    /// Marks the token `completed` with the terminal status of its run
    fn complete(&self, token: &CorrelationToken, status: &RunStatus);

    /// Marks the token `failed`
    fn fail(&self, token: &CorrelationToken);

    fn get(&self, token: &CorrelationToken) -> Option<WorkflowRecord>;

    /// All records, ordered by token
    fn entries(&self) -> Vec<WorkflowRecord>;
}

/// In-memory implementation of WorkflowRecordStore
///
/// Uses Arc<RwLock<HashMap>> so clones share the same records across tasks.
#[derive(Clone, Default)]
pub struct InMemoryWorkflowRecord {
    records: Arc<RwLock<HashMap<CorrelationToken, WorkflowRecord>>>,
}

impl InMemoryWorkflowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<F>(&self, token: &CorrelationToken, apply: F)
    where
        F: FnOnce(&mut WorkflowRecord),
    {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .entry(token.clone())
            .or_insert_with(|| WorkflowRecord::pending(token.clone()));
        apply(&mut *record);
        record.updated_at = Utc::now();
    }
}

impl WorkflowRecordStore for InMemoryWorkflowRecord {
    fn begin(&self, token: &CorrelationToken) {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        records.insert(token.clone(), WorkflowRecord::pending(token.clone()));
    }

    fn attach_run(&self, token: &CorrelationToken, run: RunHandle) {
        self.update(token, |record| record.run_id = Some(run));
    }

    fn complete(&self, token: &CorrelationToken, status: &RunStatus) {
        self.update(token, |record| {
            record.state = RecordState::Completed;
            record.run_id = Some(status.id);
            record.conclusion = status.conclusion;
        });
    }

    fn fail(&self, token: &CorrelationToken) {
        self.update(token, |record| record.state = RecordState::Failed);
    }

    fn get(&self, token: &CorrelationToken) -> Option<WorkflowRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.get(token).cloned()
    }

    fn entries(&self) -> Vec<WorkflowRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<WorkflowRecord> = records.values().cloned().collect();
        entries.sort_by(|a, b| a.token.cmp(&b.token));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tether_core::domain::{Conclusion, LifecycleState};

    #[test]
    fn test_record_lifecycle() {
        let store = InMemoryWorkflowRecord::new();
        let token = CorrelationToken::new("abc");

        store.begin(&token);
        assert_eq!(store.get(&token).unwrap().state, RecordState::Pending);

        store.attach_run(&token, RunHandle(9));
        store.complete(
            &token,
            &RunStatus {
                id: RunHandle(9),
                state: LifecycleState::Completed,
                conclusion: Some(Conclusion::Failure),
            },
        );

        let record = store.get(&token).unwrap();
        assert_eq!(record.state, RecordState::Completed);
        assert_eq!(record.run_id, Some(RunHandle(9)));
        assert_eq!(record.conclusion, Some(Conclusion::Failure));
    }

    #[test]
    fn test_begin_resets_previous_record() {
        let store = InMemoryWorkflowRecord::new();
        let token = CorrelationToken::new("abc");

        store.begin(&token);
        store.attach_run(&token, RunHandle(1));
        store.fail(&token);
        store.begin(&token);

        let record = store.get(&token).unwrap();
        assert_eq!(record.state, RecordState::Pending);
        assert_eq!(record.run_id, None);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_not_lost() {
        let store = InMemoryWorkflowRecord::new();
        let mut handles = Vec::new();

        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let token = CorrelationToken::new(format!("token-{:02}", i));
                store.begin(&token);
                store.attach_run(&token, RunHandle(i));
                if i % 2 == 0 {
                    store.fail(&token);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let entries = store.entries();
        assert_eq!(entries.len(), 32);
        assert_eq!(
            entries
                .iter()
                .filter(|r| r.state == RecordState::Failed)
                .count(),
            16
        );
        assert!(entries.iter().all(|r| r.run_id.is_some()));
        assert_eq!(entries[0].token, CorrelationToken::new("token-00"));
    }
}
