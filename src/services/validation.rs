//! Batch validation rules for group predictions.
//!
//! The rules run in a fixed order and the first failure wins. They are plain
//! functions over already-loaded data so the whole pipeline can be exercised
//! without a store.

use std::collections::HashSet;

use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{GroupEntity, TeamPositionEntity, TournamentEntity};

/// Highest position that always qualifies for the playoffs.
pub const DIRECT_QUALIFICATION_CUTOFF: u8 = 2;
/// Group position whose qualification is conditional.
pub const THIRD_PLACE_POSITION: u8 = 3;

/// One requested placement inside a batch update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    /// Team being placed.
    pub team_id: Uuid,
    /// Requested final position (1-based).
    pub position: u8,
    /// Requested qualification flag.
    pub qualifies: bool,
}

/// Why a batch was refused. Codes are part of the client contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    #[error("no signed-in user, predictions cannot be saved")]
    Unauthorized,
    #[error("tournament `{tournament_id}` does not exist")]
    TournamentNotFound { tournament_id: Uuid },
    #[error("tournament `{name}` is not accepting predictions")]
    TournamentLocked { name: String },
    #[error("team `{team_id}` does not belong to group `{group_name}`")]
    InvalidTeamGroup { team_id: Uuid, group_name: String },
    #[error("team `{team_id}` appears more than once in the batch")]
    DuplicateTeams { team_id: Uuid },
    #[error("position {position} is not a valid group position")]
    InvalidPosition { position: u8 },
    #[error("position {position} is assigned to more than one team")]
    DuplicatePositions { position: u8 },
    #[error("team `{team_id}` at position {position} carries an inconsistent qualification flag")]
    InvalidQualificationFlag { team_id: Uuid, position: u8 },
    #[error("third-place teams cannot qualify in this tournament")]
    ThirdPlaceNotAllowed,
    #[error("at most {max} third-place teams can qualify, {attempted} selected")]
    TooManyThirdPlace { max: u32, attempted: u32 },
}

impl ValidationFailure {
    /// Stable machine-readable code clients branch on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::TournamentNotFound { .. } => "tournament_not_found",
            Self::TournamentLocked { .. } => "tournament_locked",
            Self::InvalidTeamGroup { .. } => "invalid_team_group",
            Self::DuplicateTeams { .. } => "duplicate_teams",
            Self::InvalidPosition { .. } => "invalid_position",
            Self::DuplicatePositions { .. } => "duplicate_positions",
            Self::InvalidQualificationFlag { .. } => "invalid_qualification_flag",
            Self::ThirdPlaceNotAllowed => "third_place_not_allowed",
            Self::TooManyThirdPlace { .. } => "too_many_third_place",
        }
    }
}

/// Rule 1: the acting user id must be non-empty after trimming.
pub fn check_user(user_id: &str) -> Result<(), ValidationFailure> {
    if user_id.trim().is_empty() {
        return Err(ValidationFailure::Unauthorized);
    }
    Ok(())
}

/// Rule 3: the tournament must accept edits. Inactive tournaments only pass
/// when the staging override applies: the deployment allows dev editing, the
/// tournament is flagged dev-only, and the caller explicitly asked for edit
/// mode.
pub fn check_tournament_open(
    tournament: &TournamentEntity,
    dev_editing_allowed: bool,
    edit_mode: bool,
) -> Result<(), ValidationFailure> {
    if tournament.is_active {
        return Ok(());
    }

    if dev_editing_allowed && tournament.dev_only && edit_mode {
        return Ok(());
    }

    Err(ValidationFailure::TournamentLocked {
        name: tournament.name.clone(),
    })
}

/// Rules 4 through 8, in order: team membership, duplicate teams, position
/// bounds and uniqueness, qualification-flag consistency, third-place policy
/// and cap. `sibling_third_place` is the number of third-place qualifiers the
/// user already recorded in the tournament's other groups.
pub fn check_batch(
    updates: &[PositionUpdate],
    group: &GroupEntity,
    tournament: &TournamentEntity,
    sibling_third_place: u32,
) -> Result<(), ValidationFailure> {
    for update in updates {
        if !group.team_ids.contains(&update.team_id) {
            return Err(ValidationFailure::InvalidTeamGroup {
                team_id: update.team_id,
                group_name: group.name.clone(),
            });
        }
    }

    let mut seen_teams = HashSet::new();
    for update in updates {
        if !seen_teams.insert(update.team_id) {
            return Err(ValidationFailure::DuplicateTeams {
                team_id: update.team_id,
            });
        }
    }

    let mut seen_positions = HashSet::new();
    for update in updates {
        if update.position < 1 {
            return Err(ValidationFailure::InvalidPosition {
                position: update.position,
            });
        }
        if !seen_positions.insert(update.position) {
            return Err(ValidationFailure::DuplicatePositions {
                position: update.position,
            });
        }
    }

    for update in updates {
        let direct = update.position <= DIRECT_QUALIFICATION_CUTOFF;
        let eliminated = update.position > THIRD_PLACE_POSITION;
        if (direct && !update.qualifies) || (eliminated && update.qualifies) {
            return Err(ValidationFailure::InvalidQualificationFlag {
                team_id: update.team_id,
                position: update.position,
            });
        }
    }

    if !tournament.allows_third_place {
        if updates
            .iter()
            .any(|update| update.position >= THIRD_PLACE_POSITION && update.qualifies)
        {
            return Err(ValidationFailure::ThirdPlaceNotAllowed);
        }
    } else {
        let in_batch = updates
            .iter()
            .filter(|update| update.position == THIRD_PLACE_POSITION && update.qualifies)
            .count() as u32;
        let attempted = in_batch + sibling_third_place;
        if attempted > tournament.max_third_place_qualifiers {
            return Err(ValidationFailure::TooManyThirdPlace {
                max: tournament.max_third_place_qualifiers,
                attempted,
            });
        }
    }

    Ok(())
}

/// Number of third-place qualification picks inside a stored prediction.
pub fn count_third_place_picks(positions: &[TeamPositionEntity]) -> u32 {
    positions
        .iter()
        .filter(|entry| {
            entry.predicted_position == THIRD_PLACE_POSITION && entry.predicted_to_qualify
        })
        .count() as u32
}
