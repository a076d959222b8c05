//! Tokio driver connecting a [`GroupPredictionEditor`] to the save backend.
//!
//! The runner owns the editor behind a lock and is the only place a save is
//! awaited, so at most one request per editor is ever in flight. Edits go
//! through the [`EditorHandle`]; dropping every handle tears the runner down
//! and flushes unsaved edits best-effort.

use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::{
    select,
    sync::{Mutex, mpsc},
    time::{Instant as TokioInstant, sleep_until},
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::dto::predictions::PositionUpdateInput;

use super::{
    editor::{GroupPredictionEditor, TeamPositionEntry},
    machine::SaveState,
};

/// Failure reported back into the editor after a save attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SaveRejected {
    /// Human readable reason shown next to the retry affordance.
    pub message: String,
}

/// Sends one whole-group batch to the backend.
pub trait SavePredictions: Send + Sync {
    /// Persist the batch, resolving once the backend acknowledged it.
    fn save(
        &self,
        updates: Vec<PositionUpdateInput>,
    ) -> BoxFuture<'static, Result<(), SaveRejected>>;
}

enum WakeMessage {
    /// The debounce deadline moved or was created.
    DeadlineChanged,
    /// A batch was captured outside the timer path and must be sent.
    Execute(Vec<PositionUpdateInput>),
}

/// Cloneable entry point the UI layer uses to edit and inspect the group.
#[derive(Clone)]
pub struct EditorHandle {
    editor: Arc<Mutex<GroupPredictionEditor>>,
    wake: mpsc::UnboundedSender<WakeMessage>,
}

impl EditorHandle {
    /// Drag a team to a new slot. Returns whether the edit was applied.
    pub async fn update_position(&self, team_id: Uuid, position: u8) -> bool {
        let applied = {
            self.editor
                .lock()
                .await
                .update_position(team_id, position, now())
        };
        if applied {
            let _ = self.wake.send(WakeMessage::DeadlineChanged);
        }
        applied
    }

    /// Flip the third-place pick. Returns whether the edit was applied.
    pub async fn toggle_third_place(&self, team_id: Uuid) -> bool {
        let applied = {
            self.editor
                .lock()
                .await
                .toggle_third_place(team_id, now())
        };
        if applied {
            let _ = self.wake.send(WakeMessage::DeadlineChanged);
        }
        applied
    }

    /// Save immediately instead of waiting for the debounce.
    pub async fn save_now(&self) -> bool {
        let batch = { self.editor.lock().await.take_batch_now() };
        match batch {
            Some(batch) => {
                let _ = self.wake.send(WakeMessage::Execute(batch));
                true
            }
            None => false,
        }
    }

    /// Resubmit the batch that failed. Returns whether a save was started.
    pub async fn retry(&self) -> bool {
        let batch = { self.editor.lock().await.retry(now()) };
        match batch {
            Some(batch) => {
                let _ = self.wake.send(WakeMessage::Execute(batch));
                true
            }
            None => false,
        }
    }

    /// Dismiss the failure message without resubmitting.
    pub async fn clear_error(&self) -> bool {
        self.editor.lock().await.clear_error().is_ok()
    }

    /// Current save lifecycle state.
    pub async fn save_state(&self) -> SaveState {
        self.editor.lock().await.save_state().clone()
    }

    /// Visible slots ordered by position, as the UI renders them.
    pub async fn ordered_entries(&self) -> Vec<(Uuid, TeamPositionEntry)> {
        self.editor.lock().await.ordered_entries()
    }
}

/// Background task debouncing and performing the saves of one editor.
pub struct AutosaveRunner {
    editor: Arc<Mutex<GroupPredictionEditor>>,
    backend: Arc<dyn SavePredictions>,
    wake: mpsc::UnboundedReceiver<WakeMessage>,
}

impl AutosaveRunner {
    /// Wrap an editor, returning the edit handle and the runner to spawn.
    pub fn new(
        editor: GroupPredictionEditor,
        backend: Arc<dyn SavePredictions>,
    ) -> (EditorHandle, AutosaveRunner) {
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let editor = Arc::new(Mutex::new(editor));

        (
            EditorHandle {
                editor: editor.clone(),
                wake: wake_tx,
            },
            AutosaveRunner {
                editor,
                backend,
                wake: wake_rx,
            },
        )
    }

    /// Drive the editor until every handle is dropped, then flush unsaved
    /// edits best-effort.
    pub async fn run(mut self) {
        loop {
            let deadline = { self.editor.lock().await.next_deadline() };

            let message = match deadline {
                Some(deadline) => {
                    select! {
                        _ = sleep_until(TokioInstant::from_std(deadline)) => None,
                        message = self.wake.recv() => match message {
                            Some(message) => Some(message),
                            None => break,
                        },
                    }
                }
                None => match self.wake.recv().await {
                    Some(message) => Some(message),
                    None => break,
                },
            };

            match message {
                // Timer path: fire a due batch, or settle the confirmation.
                None => {
                    let moment = now();
                    let batch = {
                        let mut editor = self.editor.lock().await;
                        let batch = editor.take_due_batch(moment);
                        if batch.is_none() {
                            editor.settle(moment);
                        }
                        batch
                    };
                    if let Some(batch) = batch {
                        self.execute(batch).await;
                    }
                }
                Some(WakeMessage::DeadlineChanged) => continue,
                Some(WakeMessage::Execute(batch)) => self.execute(batch).await,
            }
        }

        self.flush().await;
    }

    async fn execute(&self, updates: Vec<PositionUpdateInput>) {
        let result = self.backend.save(updates).await;
        let moment = now();
        let mut editor = self.editor.lock().await;
        match result {
            Ok(()) => {
                if let Err(err) = editor.confirm_saved(moment) {
                    debug!(error = %err, "save confirmation arrived in an unexpected state");
                }
            }
            Err(err) => {
                warn!(error = %err, "autosave rejected; rolling back to the confirmed state");
                if let Err(invalid) = editor.reject_save(err.message) {
                    debug!(error = %invalid, "save rejection arrived in an unexpected state");
                }
            }
        }
    }

    async fn flush(self) {
        match Arc::try_unwrap(self.editor) {
            Ok(editor) => {
                if let Some(batch) = editor.into_inner().into_final_flush() {
                    debug!("flushing unsaved edits at teardown");
                    if let Err(err) = self.backend.save(batch).await {
                        debug!(error = %err, "teardown flush failed");
                    }
                }
            }
            Err(_) => debug!("editor still shared at teardown; skipping the final flush"),
        }
    }
}

/// Current instant on tokio's clock, so paused-time tests stay virtual.
fn now() -> Instant {
    TokioInstant::now().into_std()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::Semaphore;
    use tokio::time::advance;

    use crate::dto::predictions::{GroupPredictionResponse, TeamPositionDto};

    const DEBOUNCE: Duration = Duration::from_millis(800);
    const GRACE: Duration = Duration::from_millis(2_000);

    #[derive(Default)]
    struct RecordingBackend {
        payloads: StdMutex<Vec<Vec<PositionUpdateInput>>>,
        failures: AtomicUsize,
    }

    impl RecordingBackend {
        fn failing_once() -> Self {
            Self {
                payloads: StdMutex::new(Vec::new()),
                failures: AtomicUsize::new(1),
            }
        }

        fn call_count(&self) -> usize {
            self.payloads.lock().unwrap().len()
        }

        fn payload(&self, index: usize) -> Vec<PositionUpdateInput> {
            self.payloads.lock().unwrap()[index].clone()
        }
    }

    impl SavePredictions for RecordingBackend {
        fn save(
            &self,
            updates: Vec<PositionUpdateInput>,
        ) -> BoxFuture<'static, Result<(), SaveRejected>> {
            self.payloads.lock().unwrap().push(updates);
            let remaining = self.failures.load(Ordering::SeqCst);
            let fail = remaining > 0;
            if fail {
                self.failures.store(remaining - 1, Ordering::SeqCst);
            }
            Box::pin(async move {
                if fail {
                    Err(SaveRejected {
                        message: "backend offline".to_string(),
                    })
                } else {
                    Ok(())
                }
            })
        }
    }

    struct GatedBackend {
        gate: Arc<Semaphore>,
        calls: AtomicUsize,
    }

    impl GatedBackend {
        fn new() -> Self {
            Self {
                gate: Arc::new(Semaphore::new(0)),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SavePredictions for GatedBackend {
        fn save(
            &self,
            _updates: Vec<PositionUpdateInput>,
        ) -> BoxFuture<'static, Result<(), SaveRejected>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.clone();
            Box::pin(async move {
                let _permit = gate.acquire_owned().await;
                Ok(())
            })
        }
    }

    fn teams() -> [Uuid; 4] {
        [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()]
    }

    fn snapshot(teams: &[Uuid; 4]) -> GroupPredictionResponse {
        GroupPredictionResponse {
            user_id: "user-1".to_string(),
            tournament_id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            team_positions: teams
                .iter()
                .enumerate()
                .map(|(index, team_id)| TeamPositionDto {
                    team_id: *team_id,
                    predicted_position: (index + 1) as u8,
                    predicted_to_qualify: index < 2,
                })
                .collect(),
            updated_at: "2026-06-01T12:00:00Z".to_string(),
        }
    }

    fn editor(teams: &[Uuid; 4]) -> GroupPredictionEditor {
        GroupPredictionEditor::from_snapshot(&snapshot(teams), false, DEBOUNCE, GRACE)
    }

    async fn yield_to_driver() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_collapse_into_one_save_with_the_final_state() {
        let teams = teams();
        let backend = Arc::new(RecordingBackend::default());
        let (handle, runner) = AutosaveRunner::new(editor(&teams), backend.clone());
        let driver = tokio::spawn(runner.run());
        yield_to_driver().await;

        assert!(handle.update_position(teams[3], 1).await);
        advance(Duration::from_millis(300)).await;
        assert!(handle.toggle_third_place(teams[1]).await);
        yield_to_driver().await;

        // The second edit replaced the deadline, so nothing fires yet.
        advance(Duration::from_millis(799)).await;
        yield_to_driver().await;
        assert_eq!(backend.call_count(), 0);

        advance(Duration::from_millis(1)).await;
        yield_to_driver().await;
        assert_eq!(backend.call_count(), 1);

        let payload = backend.payload(0);
        assert_eq!(payload[0].team_id, teams[3]);
        assert!(payload[0].qualifies);
        // The old runner-up sits third with its toggled pick.
        assert_eq!(payload[2].team_id, teams[1]);
        assert!(payload[2].qualifies);
        assert!(matches!(handle.save_state().await, SaveState::Saved { .. }));

        // The confirmation settles back to idle on its own.
        advance(GRACE).await;
        yield_to_driver().await;
        assert!(matches!(handle.save_state().await, SaveState::Idle));

        drop(handle);
        driver.await.unwrap();
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_save_rolls_back_and_retry_resends_the_same_payload() {
        let teams = teams();
        let backend = Arc::new(RecordingBackend::failing_once());
        let (handle, runner) = AutosaveRunner::new(editor(&teams), backend.clone());
        let driver = tokio::spawn(runner.run());
        yield_to_driver().await;

        assert!(handle.update_position(teams[3], 1).await);
        advance(DEBOUNCE).await;
        yield_to_driver().await;

        assert_eq!(backend.call_count(), 1);
        match handle.save_state().await {
            SaveState::Error { message } => assert_eq!(message, "backend offline"),
            other => panic!("expected error state, got {other:?}"),
        }
        // The optimistic edit reverted visually.
        let entries = handle.ordered_entries().await;
        assert_eq!(entries[0].0, teams[0]);

        assert!(handle.retry().await);
        yield_to_driver().await;

        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.payload(0), backend.payload(1));
        assert!(matches!(handle.save_state().await, SaveState::Saved { .. }));
        let entries = handle.ordered_entries().await;
        assert_eq!(entries[0].0, teams[3]);

        drop(handle);
        driver.await.unwrap();
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_flushes_pending_edits_exactly_once() {
        let teams = teams();
        let backend = Arc::new(RecordingBackend::default());
        let (handle, runner) = AutosaveRunner::new(editor(&teams), backend.clone());
        let driver = tokio::spawn(runner.run());
        yield_to_driver().await;

        assert!(handle.update_position(teams[3], 1).await);
        // Tear down well before the debounce fires.
        drop(handle);
        driver.await.unwrap();

        assert_eq!(backend.call_count(), 1);
        let payload = backend.payload(0);
        assert_eq!(payload[0].team_id, teams[3]);
    }

    #[tokio::test(start_paused = true)]
    async fn clean_teardown_sends_nothing() {
        let teams = teams();
        let backend = Arc::new(RecordingBackend::default());
        let (handle, runner) = AutosaveRunner::new(editor(&teams), backend.clone());
        let driver = tokio::spawn(runner.run());
        yield_to_driver().await;

        drop(handle);
        driver.await.unwrap();
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn edits_during_an_in_flight_save_are_refused_not_queued() {
        let teams = teams();
        let backend = Arc::new(GatedBackend::new());
        let (handle, runner) = AutosaveRunner::new(editor(&teams), backend.clone());
        let driver = tokio::spawn(runner.run());
        yield_to_driver().await;

        assert!(handle.update_position(teams[3], 1).await);
        advance(DEBOUNCE).await;
        yield_to_driver().await;

        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(handle.save_state().await, SaveState::Saving));

        // Nothing is accepted or queued while the request is in flight.
        assert!(!handle.update_position(teams[2], 1).await);
        assert!(!handle.toggle_third_place(teams[1]).await);
        assert!(!handle.save_now().await);

        backend.gate.add_permits(1);
        yield_to_driver().await;
        assert!(matches!(handle.save_state().await, SaveState::Saved { .. }));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        drop(handle);
        driver.await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }
}
