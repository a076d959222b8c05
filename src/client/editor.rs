use std::time::{Duration, Instant};

use indexmap::IndexMap;
use uuid::Uuid;

use crate::{
    dto::predictions::{GroupPredictionResponse, PositionUpdateInput},
    services::validation::{DIRECT_QUALIFICATION_CUTOFF, THIRD_PLACE_POSITION},
};

use super::machine::{AutosaveMachine, InvalidTransition, SaveState};

/// One team's slot as the editor currently shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamPositionEntry {
    /// Predicted final position (1-based).
    pub position: u8,
    /// Whether the slot is marked as qualifying.
    pub qualifies: bool,
}

/// Optimistic editor for one group's prediction.
///
/// Edits apply to the visible snapshot immediately while the autosave
/// machine debounces the write. The last server-confirmed state is kept as
/// the baseline so a rejected save can revert wholesale.
#[derive(Debug, Clone)]
pub struct GroupPredictionEditor {
    entries: IndexMap<Uuid, TeamPositionEntry>,
    baseline: IndexMap<Uuid, TeamPositionEntry>,
    machine: AutosaveMachine,
    locked: bool,
    dirty: bool,
    retained: Option<IndexMap<Uuid, TeamPositionEntry>>,
    last_saved: Option<Instant>,
}

impl GroupPredictionEditor {
    /// Build an editor from the server-supplied prediction snapshot.
    pub fn from_snapshot(
        snapshot: &GroupPredictionResponse,
        locked: bool,
        debounce: Duration,
        saved_grace: Duration,
    ) -> Self {
        let entries: IndexMap<Uuid, TeamPositionEntry> = snapshot
            .team_positions
            .iter()
            .map(|team| {
                (
                    team.team_id,
                    TeamPositionEntry {
                        position: team.predicted_position,
                        qualifies: team.predicted_to_qualify,
                    },
                )
            })
            .collect();

        Self {
            baseline: entries.clone(),
            entries,
            machine: AutosaveMachine::new(debounce, saved_grace),
            locked,
            dirty: false,
            retained: None,
            last_saved: None,
        }
    }

    /// Current save lifecycle state.
    pub fn save_state(&self) -> &SaveState {
        self.machine.state()
    }

    /// Whether the visible snapshot differs from the confirmed baseline.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Whether the tournament refuses edits entirely.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// When the last successful save was confirmed.
    pub fn last_saved(&self) -> Option<Instant> {
        self.last_saved
    }

    /// Failure message of the current error state, if any.
    pub fn error_message(&self) -> Option<&str> {
        self.machine.error_message()
    }

    /// Next moment the driver should wake this editor.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.machine.next_deadline()
    }

    /// Visible slots ordered by position, as the UI renders them.
    pub fn ordered_entries(&self) -> Vec<(Uuid, TeamPositionEntry)> {
        let mut ordered: Vec<(Uuid, TeamPositionEntry)> = self
            .entries
            .iter()
            .map(|(team_id, entry)| (*team_id, entry.clone()))
            .collect();
        ordered.sort_by_key(|(_, entry)| entry.position);
        ordered
    }

    /// Drag a team to a new slot; teams in between shift by one.
    ///
    /// Every entry whose position changed gets its qualification flag
    /// renormalized: the top two qualify, the rest do not. Landing on third
    /// place clears the flag, picking it stays an explicit toggle. Returns
    /// whether the edit was applied.
    pub fn update_position(&mut self, team_id: Uuid, new_position: u8, now: Instant) -> bool {
        if self.locked || self.machine.is_saving() {
            return false;
        }
        if new_position == 0 || new_position as usize > self.entries.len() {
            return false;
        }
        let Some(entry) = self.entries.get(&team_id) else {
            return false;
        };
        let old_position = entry.position;
        if old_position == new_position {
            return false;
        }

        for (id, entry) in self.entries.iter_mut() {
            let position = entry.position;
            let moved = if *id == team_id {
                entry.position = new_position;
                true
            } else if old_position < new_position
                && position > old_position
                && position <= new_position
            {
                entry.position = position - 1;
                true
            } else if old_position > new_position
                && position >= new_position
                && position < old_position
            {
                entry.position = position + 1;
                true
            } else {
                false
            };

            if moved {
                entry.qualifies = entry.position <= DIRECT_QUALIFICATION_CUTOFF;
            }
        }

        self.mark_edited(now)
    }

    /// Flip the third-place pick of the team currently sitting third.
    /// Returns whether the edit was applied.
    pub fn toggle_third_place(&mut self, team_id: Uuid, now: Instant) -> bool {
        if self.locked || self.machine.is_saving() {
            return false;
        }
        let Some(entry) = self.entries.get_mut(&team_id) else {
            return false;
        };
        if entry.position != THIRD_PLACE_POSITION {
            return false;
        }

        entry.qualifies = !entry.qualifies;
        self.mark_edited(now)
    }

    fn mark_edited(&mut self, now: Instant) -> bool {
        self.dirty = true;
        // A fresh edit supersedes any batch retained for retry.
        self.retained = None;
        self.machine.record_edit(now).is_ok()
    }

    /// Capture the save payload once the debounce deadline has elapsed.
    pub fn take_due_batch(&mut self, now: Instant) -> Option<Vec<PositionUpdateInput>> {
        match self.machine.fire_due(now) {
            Ok(true) => Some(self.capture()),
            _ => None,
        }
    }

    /// Capture the save payload immediately, skipping the debounce.
    pub fn take_batch_now(&mut self) -> Option<Vec<PositionUpdateInput>> {
        match self.machine.force_fire() {
            Ok(()) => Some(self.capture()),
            Err(_) => None,
        }
    }

    fn capture(&mut self) -> Vec<PositionUpdateInput> {
        self.retained = Some(self.entries.clone());
        payload_of(&self.entries)
    }

    /// Record a successful save: the visible snapshot becomes the baseline.
    pub fn confirm_saved(&mut self, now: Instant) -> Result<(), InvalidTransition> {
        self.machine.complete(now)?;
        self.baseline = self.entries.clone();
        self.dirty = false;
        self.retained = None;
        self.last_saved = Some(now);
        Ok(())
    }

    /// Record a failed save: the optimistic edits revert to the baseline
    /// while the attempted batch stays retained for a retry.
    pub fn reject_save(&mut self, message: impl Into<String>) -> Result<(), InvalidTransition> {
        self.machine.fail(message)?;
        self.entries = self.baseline.clone();
        Ok(())
    }

    /// Resubmit the retained batch after a failure. With nothing retained the
    /// error is simply dismissed and `None` is returned.
    pub fn retry(&mut self, _now: Instant) -> Option<Vec<PositionUpdateInput>> {
        if !matches!(self.machine.state(), SaveState::Error { .. }) {
            return None;
        }

        match self.retained.clone() {
            Some(retained) => {
                if self.machine.retry().is_err() {
                    return None;
                }
                // Re-apply the attempted edits so a confirmation promotes
                // the right snapshot.
                self.entries = retained;
                Some(payload_of(&self.entries))
            }
            None => {
                let _ = self.machine.clear_error();
                None
            }
        }
    }

    /// Dismiss the failure message without resubmitting.
    pub fn clear_error(&mut self) -> Result<(), InvalidTransition> {
        self.machine.clear_error()
    }

    /// Let the saved confirmation settle back to idle once it is old enough.
    pub fn settle(&mut self, now: Instant) -> bool {
        matches!(self.machine.settle(now), Ok(true))
    }

    /// Tear the editor down, emitting one last payload when unsaved edits
    /// remain and the tournament still accepts them.
    pub fn into_final_flush(self) -> Option<Vec<PositionUpdateInput>> {
        if self.dirty && !self.locked {
            Some(payload_of(&self.entries))
        } else {
            None
        }
    }
}

fn payload_of(entries: &IndexMap<Uuid, TeamPositionEntry>) -> Vec<PositionUpdateInput> {
    let mut updates: Vec<PositionUpdateInput> = entries
        .iter()
        .map(|(team_id, entry)| PositionUpdateInput {
            team_id: *team_id,
            position: entry.position,
            qualifies: entry.qualifies,
        })
        .collect();
    updates.sort_by_key(|update| update.position);
    updates
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::dto::predictions::TeamPositionDto;

    const DEBOUNCE: Duration = Duration::from_millis(800);
    const GRACE: Duration = Duration::from_millis(2_000);

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

    fn positions(editor: &GroupPredictionEditor) -> Vec<(Uuid, u8, bool)> {
        editor
            .ordered_entries()
            .into_iter()
            .map(|(team_id, entry)| (team_id, entry.position, entry.qualifies))
            .collect()
    }

    #[test]
    fn dragging_the_last_team_to_the_top_shifts_everyone_down() {
        let teams = teams();
        let mut editor = editor(&teams);
        let t0 = Instant::now();

        assert!(editor.update_position(teams[3], 1, t0));

        assert_eq!(
            positions(&editor),
            vec![
                (teams[3], 1, true),
                (teams[0], 2, true),
                (teams[1], 3, false),
                (teams[2], 4, false),
            ]
        );
        assert!(editor.is_dirty());
        assert!(matches!(editor.save_state(), SaveState::Pending { .. }));
    }

    #[test]
    fn landing_on_third_place_clears_the_qualification_flag() {
        let teams = teams();
        let mut editor = editor(&teams);

        // The runner-up slides down to third; its flag resets.
        assert!(editor.update_position(teams[1], 3, Instant::now()));
        let entries = positions(&editor);
        assert_eq!(entries[2], (teams[1], 3, false));
        // The team promoted into second qualifies now.
        assert_eq!(entries[1], (teams[2], 2, true));
    }

    #[test]
    fn dragging_to_the_same_slot_changes_nothing() {
        let teams = teams();
        let mut editor = editor(&teams);
        assert!(!editor.update_position(teams[0], 1, Instant::now()));
        assert!(!editor.is_dirty());
        assert_eq!(*editor.save_state(), SaveState::Idle);
    }

    #[test]
    fn out_of_range_slots_are_ignored() {
        let teams = teams();
        let mut editor = editor(&teams);
        assert!(!editor.update_position(teams[0], 0, Instant::now()));
        assert!(!editor.update_position(teams[0], 5, Instant::now()));
        assert!(!editor.update_position(Uuid::new_v4(), 2, Instant::now()));
    }

    #[test]
    fn toggle_only_applies_to_the_third_slot() {
        let teams = teams();
        let mut editor = editor(&teams);
        let t0 = Instant::now();

        assert!(!editor.toggle_third_place(teams[0], t0));
        assert!(editor.toggle_third_place(teams[2], t0));
        assert_eq!(positions(&editor)[2], (teams[2], 3, true));

        assert!(editor.toggle_third_place(teams[2], t0));
        assert_eq!(positions(&editor)[2], (teams[2], 3, false));
    }

    #[test]
    fn locked_editor_ignores_every_edit() {
        let teams = teams();
        let mut editor =
            GroupPredictionEditor::from_snapshot(&snapshot(&teams), true, DEBOUNCE, GRACE);

        assert!(!editor.update_position(teams[3], 1, Instant::now()));
        assert!(!editor.toggle_third_place(teams[2], Instant::now()));
        assert!(!editor.is_dirty());
    }

    #[test]
    fn the_due_batch_contains_the_whole_group() {
        let teams = teams();
        let mut editor = editor(&teams);
        let t0 = Instant::now();

        editor.toggle_third_place(teams[2], t0);
        let batch = editor.take_due_batch(t0 + DEBOUNCE).unwrap();

        assert_eq!(batch.len(), 4);
        assert_eq!(batch[2].team_id, teams[2]);
        assert!(batch[2].qualifies);
        assert!(matches!(editor.save_state(), SaveState::Saving));
    }

    #[test]
    fn edits_are_refused_while_a_save_is_in_flight() {
        let teams = teams();
        let mut editor = editor(&teams);
        let t0 = Instant::now();

        editor.update_position(teams[3], 1, t0);
        editor.take_batch_now().unwrap();

        assert!(!editor.update_position(teams[2], 1, t0));
        assert!(!editor.toggle_third_place(teams[2], t0));
    }

    #[test]
    fn rejection_rolls_back_and_retry_resubmits_the_same_batch() {
        let teams = teams();
        let mut editor = editor(&teams);
        let t0 = Instant::now();

        editor.update_position(teams[3], 1, t0);
        let attempted = editor.take_batch_now().unwrap();
        editor.reject_save("backend offline").unwrap();

        // The optimistic edit reverted visually.
        assert_eq!(
            positions(&editor),
            vec![
                (teams[0], 1, true),
                (teams[1], 2, true),
                (teams[2], 3, false),
                (teams[3], 4, false),
            ]
        );
        assert!(editor.is_dirty());
        assert_eq!(editor.error_message(), Some("backend offline"));

        let resubmitted = editor.retry(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(resubmitted, attempted);
        // The optimistic state is shown again while the retry is in flight.
        assert_eq!(positions(&editor)[0], (teams[3], 1, true));

        let confirmed = t0 + Duration::from_secs(2);
        editor.confirm_saved(confirmed).unwrap();
        assert!(!editor.is_dirty());
        assert_eq!(editor.last_saved(), Some(confirmed));
        assert_eq!(*editor.save_state(), SaveState::Saved { since: confirmed });
    }

    #[test]
    fn a_new_edit_supersedes_the_retained_batch() {
        let teams = teams();
        let mut editor = editor(&teams);
        let t0 = Instant::now();

        editor.update_position(teams[3], 1, t0);
        editor.take_batch_now().unwrap();
        editor.reject_save("backend offline").unwrap();

        // Editing after the rollback replaces the failed attempt.
        assert!(editor.update_position(teams[2], 1, t0 + Duration::from_secs(1)));
        assert!(editor.retry(t0 + Duration::from_secs(1)).is_none());

        let batch = editor
            .take_due_batch(t0 + Duration::from_secs(1) + DEBOUNCE)
            .unwrap();
        assert_eq!(batch[0].team_id, teams[2]);
    }

    #[test]
    fn retry_without_a_retained_batch_just_clears_the_error() {
        let teams = teams();
        let mut editor = editor(&teams);
        let t0 = Instant::now();

        editor.update_position(teams[3], 1, t0);
        editor.take_batch_now().unwrap();
        editor.reject_save("backend offline").unwrap();
        editor.clear_error().unwrap();

        assert!(editor.retry(t0).is_none());
        assert_eq!(*editor.save_state(), SaveState::Idle);
    }

    #[test]
    fn saved_confirmation_settles_after_the_grace() {
        let teams = teams();
        let mut editor = editor(&teams);
        let t0 = Instant::now();

        editor.toggle_third_place(teams[2], t0);
        editor.take_batch_now().unwrap();
        editor.confirm_saved(t0).unwrap();

        assert!(!editor.settle(t0 + GRACE - Duration::from_millis(1)));
        assert!(editor.settle(t0 + GRACE));
        assert_eq!(*editor.save_state(), SaveState::Idle);
    }

    #[test]
    fn final_flush_emits_only_unsaved_edits() {
        let teams = teams();
        let t0 = Instant::now();

        let mut dirty = editor(&teams);
        dirty.update_position(teams[3], 1, t0);
        let flushed = dirty.into_final_flush().unwrap();
        assert_eq!(flushed[0].team_id, teams[3]);

        let clean = editor(&teams);
        assert!(clean.into_final_flush().is_none());

        let mut locked =
            GroupPredictionEditor::from_snapshot(&snapshot(&teams), true, DEBOUNCE, GRACE);
        locked.update_position(teams[3], 1, t0);
        assert!(locked.into_final_flush().is_none());
    }
}
