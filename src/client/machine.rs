use std::time::{Duration, Instant};

use thiserror::Error;

/// Save lifecycle of a group prediction editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveState {
    /// Nothing to save and no edit pending.
    Idle,
    /// An edit is debouncing until the deadline.
    Pending {
        /// Moment the debounce expires and the save fires.
        deadline: Instant,
    },
    /// A save request is in flight; edits are refused.
    Saving,
    /// The last save succeeded; shown until the grace period elapses.
    Saved {
        /// Moment the confirmation arrived.
        since: Instant,
    },
    /// The last save was rejected or failed to reach the backend.
    Error {
        /// Human readable failure shown next to the retry affordance.
        message: String,
    },
}

/// Operations that can be applied to the save state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveEvent {
    /// An edit arrived and wants to (re)start the debounce.
    RecordEdit,
    /// The debounce deadline was reached.
    FireDue,
    /// An explicit save-now request skips the debounce.
    ForceFire,
    /// The in-flight save succeeded.
    Complete,
    /// The in-flight save failed.
    Fail,
    /// The saved confirmation is old enough to disappear.
    Settle,
    /// The failed payload is being resubmitted.
    Retry,
    /// The failure message is dismissed without resubmitting.
    ClearError,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The state the machine was in when the invalid event was received.
    pub from: SaveState,
    /// The event that cannot be applied from this state.
    pub event: SaveEvent,
}

/// Debounced autosave state machine. The clock is always injected so tests
/// can drive it with virtual instants.
#[derive(Debug, Clone)]
pub struct AutosaveMachine {
    state: SaveState,
    debounce: Duration,
    saved_grace: Duration,
}

impl AutosaveMachine {
    /// Create a machine in the idle state.
    pub fn new(debounce: Duration, saved_grace: Duration) -> Self {
        Self {
            state: SaveState::Idle,
            debounce,
            saved_grace,
        }
    }

    /// Inspect the current state.
    pub fn state(&self) -> &SaveState {
        &self.state
    }

    /// Whether a save is currently in flight.
    pub fn is_saving(&self) -> bool {
        matches!(self.state, SaveState::Saving)
    }

    /// Failure message of the current error state, if any.
    pub fn error_message(&self) -> Option<&str> {
        match &self.state {
            SaveState::Error { message } => Some(message),
            _ => None,
        }
    }

    /// Next moment the machine wants to be woken: the debounce deadline while
    /// pending, the settle deadline while showing the saved confirmation.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            SaveState::Pending { deadline } => Some(*deadline),
            SaveState::Saved { since } => Some(*since + self.saved_grace),
            _ => None,
        }
    }

    /// Start or restart the debounce for a new edit. A fresh edit replaces
    /// any earlier deadline and clears a lingering error. Refused while a
    /// save is in flight.
    pub fn record_edit(&mut self, now: Instant) -> Result<Instant, InvalidTransition> {
        if self.is_saving() {
            return Err(self.refuse(SaveEvent::RecordEdit));
        }

        let deadline = now + self.debounce;
        self.state = SaveState::Pending { deadline };
        Ok(deadline)
    }

    /// Fire the pending save once its deadline has elapsed. Returns whether
    /// the machine entered [`SaveState::Saving`].
    pub fn fire_due(&mut self, now: Instant) -> Result<bool, InvalidTransition> {
        match &self.state {
            SaveState::Pending { deadline } if *deadline <= now => {
                self.state = SaveState::Saving;
                Ok(true)
            }
            SaveState::Pending { .. } => Ok(false),
            _ => Err(self.refuse(SaveEvent::FireDue)),
        }
    }

    /// Fire the pending save immediately, skipping the remaining debounce.
    pub fn force_fire(&mut self) -> Result<(), InvalidTransition> {
        match &self.state {
            SaveState::Pending { .. } => {
                self.state = SaveState::Saving;
                Ok(())
            }
            _ => Err(self.refuse(SaveEvent::ForceFire)),
        }
    }

    /// Record a successful save.
    pub fn complete(&mut self, now: Instant) -> Result<(), InvalidTransition> {
        match &self.state {
            SaveState::Saving => {
                self.state = SaveState::Saved { since: now };
                Ok(())
            }
            _ => Err(self.refuse(SaveEvent::Complete)),
        }
    }

    /// Record a failed save.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), InvalidTransition> {
        match &self.state {
            SaveState::Saving => {
                self.state = SaveState::Error {
                    message: message.into(),
                };
                Ok(())
            }
            _ => Err(self.refuse(SaveEvent::Fail)),
        }
    }

    /// Drop the saved confirmation once it is older than the grace period.
    /// Returns whether the machine settled back to [`SaveState::Idle`].
    pub fn settle(&mut self, now: Instant) -> Result<bool, InvalidTransition> {
        match &self.state {
            SaveState::Saved { since } if *since + self.saved_grace <= now => {
                self.state = SaveState::Idle;
                Ok(true)
            }
            SaveState::Saved { .. } => Ok(false),
            _ => Err(self.refuse(SaveEvent::Settle)),
        }
    }

    /// Resubmit after a failure; the caller replays the retained payload.
    pub fn retry(&mut self) -> Result<(), InvalidTransition> {
        match &self.state {
            SaveState::Error { .. } => {
                self.state = SaveState::Saving;
                Ok(())
            }
            _ => Err(self.refuse(SaveEvent::Retry)),
        }
    }

    /// Dismiss the failure without resubmitting.
    pub fn clear_error(&mut self) -> Result<(), InvalidTransition> {
        match &self.state {
            SaveState::Error { .. } => {
                self.state = SaveState::Idle;
                Ok(())
            }
            _ => Err(self.refuse(SaveEvent::ClearError)),
        }
    }

    fn refuse(&self, event: SaveEvent) -> InvalidTransition {
        InvalidTransition {
            from: self.state.clone(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEBOUNCE: Duration = Duration::from_millis(800);
    const GRACE: Duration = Duration::from_millis(2_000);

    fn machine() -> AutosaveMachine {
        AutosaveMachine::new(DEBOUNCE, GRACE)
    }

    #[test]
    fn initial_state_is_idle() {
        assert_eq!(*machine().state(), SaveState::Idle);
    }

    #[test]
    fn debounce_fires_and_the_confirmation_settles() {
        let mut sm = machine();
        let t0 = Instant::now();

        let deadline = sm.record_edit(t0).unwrap();
        assert_eq!(deadline, t0 + DEBOUNCE);
        assert_eq!(sm.next_deadline(), Some(deadline));

        assert!(!sm.fire_due(t0 + DEBOUNCE - Duration::from_millis(1)).unwrap());
        assert!(sm.fire_due(t0 + DEBOUNCE).unwrap());
        assert!(sm.is_saving());

        let confirmed = t0 + DEBOUNCE + Duration::from_millis(40);
        sm.complete(confirmed).unwrap();
        assert_eq!(*sm.state(), SaveState::Saved { since: confirmed });
        assert_eq!(sm.next_deadline(), Some(confirmed + GRACE));

        assert!(!sm.settle(confirmed + GRACE - Duration::from_millis(1)).unwrap());
        assert!(sm.settle(confirmed + GRACE).unwrap());
        assert_eq!(*sm.state(), SaveState::Idle);
    }

    #[test]
    fn a_new_edit_replaces_the_deadline_instead_of_stacking() {
        let mut sm = machine();
        let t0 = Instant::now();

        sm.record_edit(t0).unwrap();
        let replaced = sm.record_edit(t0 + Duration::from_millis(300)).unwrap();
        assert_eq!(replaced, t0 + Duration::from_millis(300) + DEBOUNCE);

        // The original deadline no longer fires.
        assert!(!sm.fire_due(t0 + DEBOUNCE).unwrap());
        assert!(sm.fire_due(replaced).unwrap());
    }

    #[test]
    fn edits_are_refused_while_saving() {
        let mut sm = machine();
        let t0 = Instant::now();
        sm.record_edit(t0).unwrap();
        sm.force_fire().unwrap();

        let err = sm.record_edit(t0 + Duration::from_millis(10)).unwrap_err();
        assert_eq!(err.from, SaveState::Saving);
        assert_eq!(err.event, SaveEvent::RecordEdit);
    }

    #[test]
    fn an_edit_clears_a_lingering_error() {
        let mut sm = machine();
        let t0 = Instant::now();
        sm.record_edit(t0).unwrap();
        sm.force_fire().unwrap();
        sm.fail("backend offline").unwrap();
        assert_eq!(sm.error_message(), Some("backend offline"));

        sm.record_edit(t0 + Duration::from_millis(50)).unwrap();
        assert!(matches!(sm.state(), SaveState::Pending { .. }));
        assert_eq!(sm.error_message(), None);
    }

    #[test]
    fn retry_moves_from_error_back_to_saving() {
        let mut sm = machine();
        sm.record_edit(Instant::now()).unwrap();
        sm.force_fire().unwrap();
        sm.fail("rejected").unwrap();

        sm.retry().unwrap();
        assert!(sm.is_saving());
    }

    #[test]
    fn clear_error_returns_to_idle() {
        let mut sm = machine();
        sm.record_edit(Instant::now()).unwrap();
        sm.force_fire().unwrap();
        sm.fail("rejected").unwrap();

        sm.clear_error().unwrap();
        assert_eq!(*sm.state(), SaveState::Idle);
    }

    #[test]
    fn invalid_transition_names_state_and_event() {
        let mut sm = machine();
        let err = sm.complete(Instant::now()).unwrap_err();
        assert_eq!(err.from, SaveState::Idle);
        assert_eq!(err.event, SaveEvent::Complete);

        let err = sm.force_fire().unwrap_err();
        assert_eq!(err.event, SaveEvent::ForceFire);
    }
}
