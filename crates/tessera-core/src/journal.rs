//! The error journal.
//!
//! Failed expressions are recorded per process instance (sub-process errors
//! are filed under their top-level instance) until they are replayed,
//! removed, or purged. The journal listens to the `errors` topic of the event
//! bus and replays failures by re-emitting the original message on the work
//! queue.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tessera_types::error::JournalError;
use tessera_types::event::{EngineEvent, EventTopic};
use tessera_types::flow::{FlowExpressionId, parent_wfid_of};
use tessera_types::process_error::ProcessError;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::event::EventBus;
use crate::repository::{ExpressionFilter, ExpressionStorage};

type ErrorBuckets = HashMap<String, HashMap<FlowExpressionId, ProcessError>>;

/// Outcome of [`ErrorJournal::purge_processes`].
#[derive(Debug, Default)]
pub struct PurgeReport {
    /// Instances whose errors were dropped.
    pub purged: Vec<String>,
    /// Instances skipped because the storage lookup failed.
    pub failed: Vec<(String, JournalError)>,
}

/// In-memory journal of expression failures.
///
/// All bucket access goes through one lock, so `record`, `remove`, `replay`
/// and the purges are atomic with respect to each other.
pub struct ErrorJournal<S> {
    errors: RwLock<ErrorBuckets>,
    bus: EventBus,
    storage: S,
}

impl<S: ExpressionStorage> ErrorJournal<S> {
    pub fn new(bus: EventBus, storage: S) -> Self {
        Self {
            errors: RwLock::new(HashMap::new()),
            bus,
            storage,
        }
    }

    /// Handle one `errors` topic event.
    ///
    /// A failure event is recorded against the failing expression (taken from
    /// the message's `fei`, its expression, or its workitem); a removal event
    /// drops the matching record. Other events are ignored.
    pub async fn receive(&self, event: &EngineEvent) -> Result<(), JournalError> {
        match event {
            EngineEvent::ErrorRemoved { fei } => {
                self.remove(fei).await;
                Ok(())
            }
            EngineEvent::ExpressionFailed { message, fault } => {
                let fei = message
                    .payload
                    .target_fei()
                    .cloned()
                    .ok_or_else(|| JournalError::MissingFei(message.direction.to_string()))?;
                let error =
                    ProcessError::new(fei.clone(), message.clone(), fault.capture(), Utc::now());
                self.record(fei, error).await;
                Ok(())
            }
            EngineEvent::Dispatched(_) => Ok(()),
        }
    }

    /// Store `error` under `fei`, replacing any earlier record for the same
    /// expression.
    pub async fn record(&self, fei: FlowExpressionId, error: ProcessError) {
        let wfid = fei.parent_wfid().to_string();
        info!(%fei, kind = error.error_kind(), "recording process error");
        self.errors
            .write()
            .await
            .entry(wfid)
            .or_default()
            .insert(fei, error);
    }

    /// Drop the record for `fei`. Returns whether one existed.
    pub async fn remove(&self, fei: &FlowExpressionId) -> bool {
        let removed = remove_entry(&mut *self.errors.write().await, fei);
        if removed {
            debug!(%fei, "process error removed");
        }
        removed
    }

    /// Errors of the process instance `wfid` (sub-processes included).
    pub async fn process_errors(&self, wfid: &str) -> Vec<ProcessError> {
        self.errors
            .read()
            .await
            .get(parent_wfid_of(wfid))
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Ids of every process instance with a bucket in the journal.
    pub async fn tracked_processes(&self) -> Vec<String> {
        let mut wfids: Vec<String> = self.errors.read().await.keys().cloned().collect();
        wfids.sort();
        wfids
    }

    /// Remove `error` from the journal and re-emit its original message on
    /// the work queue, exactly once.
    pub async fn replay_at_error(&self, error: &ProcessError) {
        let mut errors = self.errors.write().await;
        remove_entry(&mut errors, error.fei());
        info!(fei = %error.fei(), direction = %error.direction(), "replaying process error");
        self.bus.emit(error.message().clone());
    }

    /// Drop the errors of `wfid`. Returns whether any were dropped.
    ///
    /// A top-level id drops its whole bucket, sub-processes included. A
    /// sub-process id only drops the entries recorded for that sub-process.
    pub async fn purge_process(&self, wfid: &str) -> bool {
        let parent = parent_wfid_of(wfid);
        let mut errors = self.errors.write().await;
        let purged = if parent == wfid {
            errors.remove(wfid).is_some()
        } else {
            let Some(bucket) = errors.get_mut(parent) else {
                return false;
            };
            let before = bucket.len();
            bucket.retain(|fei, _| fei.wfid != wfid);
            let purged = bucket.len() != before;
            if bucket.is_empty() {
                errors.remove(parent);
            }
            purged
        };
        if purged {
            info!(wfid, "purged process errors");
        }
        purged
    }

    /// Drop the errors of every instance that has no live expression left.
    ///
    /// The storage is queried without holding the journal lock. A failed
    /// lookup leaves that instance tracked and the sweep carries on.
    pub async fn purge_processes(&self) -> PurgeReport {
        let mut report = PurgeReport::default();
        for wfid in self.tracked_processes().await {
            match self
                .storage
                .find_expressions(&ExpressionFilter::wfid(wfid.clone()))
                .await
            {
                Ok(live) => {
                    if live.is_empty() && self.purge_process(&wfid).await {
                        report.purged.push(wfid);
                    }
                }
                Err(err) => {
                    warn!(wfid = %wfid, error = %err, "expression lookup failed while purging");
                    report.failed.push((wfid, JournalError::from(err)));
                }
            }
        }
        report
    }

    /// Drop everything.
    pub async fn purge_all(&self) {
        self.errors.write().await.clear();
        info!("purged all process errors");
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl<S: ExpressionStorage + 'static> ErrorJournal<S> {
    /// Feed `errors` topic events from the bus into the journal until
    /// `cancel` fires or the bus closes.
    ///
    /// The subscription is taken before this returns, so every event
    /// published afterwards is seen.
    pub fn spawn_listener(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) if event.topic() == EventTopic::Errors => {
                            if let Err(err) = self.receive(&event).await {
                                error!(error = %err, tag = event.tag(), "failed to journal event");
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "error journal lagged behind the event bus");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("error journal listener stopped");
        })
    }
}

fn remove_entry(errors: &mut ErrorBuckets, fei: &FlowExpressionId) -> bool {
    let wfid = fei.parent_wfid();
    let Some(bucket) = errors.get_mut(wfid) else {
        return false;
    };
    let removed = bucket.remove(fei).is_some();
    if bucket.is_empty() {
        errors.remove(wfid);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use tessera_types::error::RepositoryError;
    use tessera_types::event::{Fault, QueueMessage};
    use tessera_types::flow::{ExpressionHandle, Workitem};
    use tessera_types::process_error::ErrorInfo;
    use tessera_types::tree::Node;
    use tokio::sync::broadcast::error::TryRecvError;

    /// Storage whose live expressions are a set of wfids.
    #[derive(Default)]
    struct MockStorage {
        live: Mutex<HashSet<String>>,
        fail: bool,
    }

    impl MockStorage {
        fn with_live(wfids: &[&str]) -> Self {
            Self {
                live: Mutex::new(wfids.iter().map(|w| w.to_string()).collect()),
                fail: false,
            }
        }
    }

    impl ExpressionStorage for MockStorage {
        fn find_expressions(
            &self,
            filter: &ExpressionFilter,
        ) -> impl std::future::Future<Output = Result<Vec<ExpressionHandle>, RepositoryError>> + Send
        {
            let result = if self.fail {
                Err(RepositoryError::Connection)
            } else {
                let handles = self
                    .live
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|wfid| ExpressionHandle {
                        fei: FlowExpressionId::new("engine", wfid.clone(), "0"),
                        name: "sequence".to_string(),
                    })
                    .filter(|handle| filter.matches(handle))
                    .collect();
                Ok(handles)
            };
            async move { result }
        }
    }

    fn fei(wfid: &str, expid: &str) -> FlowExpressionId {
        FlowExpressionId::new("engine", wfid, expid)
    }

    fn failed_apply(fei: &FlowExpressionId) -> QueueMessage {
        QueueMessage::apply(
            fei.clone(),
            Node::new("participant").with_child("alice"),
            Workitem::new(fei.clone()),
        )
    }

    fn process_error(fei: &FlowExpressionId) -> ProcessError {
        ProcessError::new(
            fei.clone(),
            failed_apply(fei),
            ErrorInfo {
                kind: "ParticipantError".to_string(),
                message: "alice is not reachable".to_string(),
                trace: vec![],
            },
            Utc::now(),
        )
    }

    async fn record(j: &ErrorJournal<MockStorage>, fei: &FlowExpressionId) {
        j.record(fei.clone(), process_error(fei)).await;
    }

    fn journal(storage: MockStorage) -> ErrorJournal<MockStorage> {
        ErrorJournal::new(EventBus::new(16), storage)
    }

    #[tokio::test]
    async fn test_record_groups_subprocess_errors_under_parent() {
        let j = journal(MockStorage::default());
        record(&j, &fei("wf", "0.1")).await;
        record(&j, &fei("wf_1", "0.0")).await;
        record(&j, &fei("other", "0")).await;

        assert_eq!(j.process_errors("wf").await.len(), 2);
        assert_eq!(j.process_errors("wf_1").await.len(), 2);
        assert_eq!(j.process_errors("other").await.len(), 1);
        assert!(j.process_errors("unknown").await.is_empty());
        assert_eq!(j.tracked_processes().await, vec!["other", "wf"]);
    }

    #[tokio::test]
    async fn test_record_replaces_same_expression() {
        let j = journal(MockStorage::default());
        record(&j, &fei("wf", "0.1")).await;
        record(&j, &fei("wf", "0.1")).await;
        assert_eq!(j.process_errors("wf").await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let j = journal(MockStorage::default());
        let f = fei("wf", "0.1");
        record(&j, &f).await;

        assert!(j.remove(&f).await);
        assert!(!j.remove(&f).await);
        assert!(j.process_errors("wf").await.is_empty());
        assert!(j.tracked_processes().await.is_empty());
    }

    #[tokio::test]
    async fn test_receive_failed_event_records_with_fault_details() {
        let j = journal(MockStorage::default());
        let f = fei("wf", "0.2");
        let event = EngineEvent::ExpressionFailed {
            message: failed_apply(&f),
            fault: Fault::from_parts("ParticipantError", "alice is not reachable"),
        };
        j.receive(&event).await.unwrap();

        let errors = j.process_errors("wf").await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].fei(), &f);
        assert_eq!(errors[0].error_kind(), "ParticipantError");
        assert_eq!(errors[0].error_message(), "alice is not reachable");
    }

    #[tokio::test]
    async fn test_receive_takes_fei_from_workitem() {
        let j = journal(MockStorage::default());
        let f = fei("wf", "0.3");
        let event = EngineEvent::ExpressionFailed {
            message: QueueMessage::reply(Workitem::new(f.clone())),
            fault: Fault::from_parts("ReplyError", "boom"),
        };
        j.receive(&event).await.unwrap();
        assert_eq!(j.process_errors("wf").await[0].fei(), &f);
    }

    #[tokio::test]
    async fn test_receive_without_fei_fails() {
        let j = journal(MockStorage::default());
        let mut message = failed_apply(&fei("wf", "0"));
        message.payload = Default::default();
        let event = EngineEvent::ExpressionFailed {
            message,
            fault: Fault::from_parts("X", "y"),
        };
        assert!(matches!(j.receive(&event).await, Err(JournalError::MissingFei(_))));
    }

    #[tokio::test]
    async fn test_receive_remove_event() {
        let j = journal(MockStorage::default());
        let f = fei("wf", "0.1");
        record(&j, &f).await;
        j.receive(&EngineEvent::ErrorRemoved { fei: f }).await.unwrap();
        assert!(j.process_errors("wf").await.is_empty());
    }

    #[tokio::test]
    async fn test_replay_removes_then_emits_once() {
        let j = journal(MockStorage::default());
        let mut rx = j.bus.subscribe();
        let f = fei("wf", "0.1");
        let error = process_error(&f);
        j.record(f.clone(), error.clone()).await;

        j.replay_at_error(&error).await;

        assert!(j.process_errors("wf").await.is_empty());
        match rx.try_recv() {
            Ok(EngineEvent::Dispatched(message)) => assert_eq!(&message, error.message()),
            other => panic!("expected a dispatched message, got {other:?}"),
        }
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_replay_with_overridden_tree() {
        let j = journal(MockStorage::default());
        let mut rx = j.bus.subscribe();
        let mut error = process_error(&fei("wf", "0.1"));
        error.set_tree(Node::new("participant").with_child("bob")).unwrap();

        j.replay_at_error(&error).await;

        let Ok(EngineEvent::Dispatched(message)) = rx.try_recv() else {
            panic!("expected a dispatched message");
        };
        assert_eq!(message.payload.tree, Some(Node::new("participant").with_child("bob")));
    }

    #[tokio::test]
    async fn test_purge_process_and_all() {
        let j = journal(MockStorage::default());
        record(&j, &fei("a", "0")).await;
        record(&j, &fei("b", "0")).await;

        assert!(j.purge_process("a").await);
        assert!(!j.purge_process("a").await);
        assert_eq!(j.tracked_processes().await, vec!["b"]);

        j.purge_all().await;
        assert!(j.tracked_processes().await.is_empty());
    }

    #[tokio::test]
    async fn test_purge_subprocess_keeps_parent_errors() {
        let j = journal(MockStorage::default());
        record(&j, &fei("wf", "0.1")).await;
        record(&j, &fei("wf_1", "0")).await;
        record(&j, &fei("wf_2", "0")).await;

        assert!(j.purge_process("wf_1").await);
        assert!(!j.purge_process("wf_1").await);

        let mut left: Vec<String> = j
            .process_errors("wf")
            .await
            .iter()
            .map(|e| e.fei().wfid.clone())
            .collect();
        left.sort();
        assert_eq!(left, vec!["wf", "wf_2"]);
        assert!(!j.purge_process("unknown_1").await);
    }

    #[tokio::test]
    async fn test_purge_last_subprocess_drops_bucket() {
        let j = journal(MockStorage::default());
        record(&j, &fei("wf_3", "0")).await;
        assert!(j.purge_process("wf_3").await);
        assert!(j.tracked_processes().await.is_empty());
    }

    #[tokio::test]
    async fn test_purge_processes_keeps_live_instances() {
        let j = journal(MockStorage::with_live(&["live_1"]));
        record(&j, &fei("live", "0")).await;
        record(&j, &fei("dead", "0")).await;

        let report = j.purge_processes().await;
        assert_eq!(report.purged, vec!["dead"]);
        assert!(report.failed.is_empty());
        assert_eq!(j.tracked_processes().await, vec!["live"]);
    }

    #[tokio::test]
    async fn test_purge_processes_reports_storage_errors_and_continues() {
        let storage = MockStorage {
            fail: true,
            ..MockStorage::default()
        };
        let j = journal(storage);
        record(&j, &fei("a", "0")).await;
        record(&j, &fei("b", "0")).await;

        let report = j.purge_processes().await;
        assert!(report.purged.is_empty());
        let failed: Vec<&str> = report.failed.iter().map(|(w, _)| w.as_str()).collect();
        assert_eq!(failed, vec!["a", "b"]);
        assert!(matches!(
            report.failed[0].1,
            JournalError::Storage(RepositoryError::Connection)
        ));
        assert_eq!(j.tracked_processes().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_concurrent_records() {
        let j = Arc::new(journal(MockStorage::default()));
        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let j = Arc::clone(&j);
                tokio::spawn(async move {
                    record(&j, &fei(&format!("wf_{}", i % 4), &format!("0.{i}"))).await;
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(j.process_errors("wf").await.len(), 32);
    }

    async fn wait_for<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_listener_follows_error_events() {
        let bus = EventBus::new(16);
        let j = Arc::new(ErrorJournal::new(bus.clone(), MockStorage::default()));
        let cancel = CancellationToken::new();
        let handle = Arc::clone(&j).spawn_listener(cancel.clone());

        let f = fei("wf", "0.1");
        bus.emit(failed_apply(&f));
        bus.publish(EngineEvent::ExpressionFailed {
            message: failed_apply(&f),
            fault: Fault::from_parts("ParticipantError", "boom"),
        });
        wait_for(|| {
            let j = Arc::clone(&j);
            async move { j.process_errors("wf").await.len() == 1 }
        })
        .await;

        bus.publish(EngineEvent::ErrorRemoved { fei: f });
        wait_for(|| {
            let j = Arc::clone(&j);
            async move { j.process_errors("wf").await.is_empty() }
        })
        .await;

        cancel.cancel();
        handle.await.unwrap();
    }
}
