//! Scoring of qualification predictions against the progressive results
//! projection, plus the administrative tournament-wide recompute.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{GroupPredictionEntity, TeamPositionEntity, TeamResultEntity, UserScoreEntity},
    dao::prediction_store::PredictionStore,
    dto::scoring::{
        GroupScoreBreakdown, RecomputeResponse, RecomputeUserError, ScoreReason, TeamScoreDto,
        UserScoreResponse,
    },
    error::ServiceError,
    services::validation::{self, THIRD_PLACE_POSITION},
    state::SharedState,
};

/// Points for predicting a qualifier when the tournament leaves them unset.
pub const DEFAULT_BASE_POINTS: i64 = 1;
/// Extra points for the exact position when the tournament leaves them unset.
pub const DEFAULT_EXACT_BONUS: i64 = 1;

/// Score one user's predictions for a tournament.
///
/// Results arrive group by group, so the breakdown explains every team with a
/// reason tag instead of hiding unsettled groups. A user without predictions
/// gets an empty breakdown and a zero total.
pub async fn score_qualified_teams(
    state: &SharedState,
    user_id: &str,
    tournament_id: Uuid,
) -> Result<UserScoreResponse, ServiceError> {
    validation::check_user(user_id)?;

    let store = state.require_prediction_store().await?;

    let Some(tournament) = store.find_tournament(tournament_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "tournament `{tournament_id}` not found"
        )));
    };
    let base_points = tournament.base_points.unwrap_or(DEFAULT_BASE_POINTS);
    let exact_bonus = tournament.exact_bonus.unwrap_or(DEFAULT_EXACT_BONUS);

    let predictions = store
        .list_user_predictions(user_id.to_string(), tournament_id)
        .await?;
    if predictions.is_empty() {
        return Ok(UserScoreResponse {
            user_id: user_id.to_string(),
            tournament_id,
            total_score: 0,
            breakdown: Vec::new(),
        });
    }

    let results = store.list_team_results(tournament_id).await?;
    let result_by_team: HashMap<Uuid, &TeamResultEntity> = results
        .iter()
        .map(|result| (result.team_id, result))
        .collect();
    let groups_with_positions: HashSet<Uuid> = results
        .iter()
        .filter(|result| result.final_position.is_some())
        .map(|result| result.group_id)
        .collect();

    let groups = store.list_groups(tournament_id).await?;
    let mut prediction_by_group: HashMap<Uuid, &GroupPredictionEntity> = predictions
        .iter()
        .map(|prediction| (prediction.group_id, prediction))
        .collect();

    let mut breakdown = Vec::new();
    let mut total_score = 0;
    for group in &groups {
        let Some(prediction) = prediction_by_group.remove(&group.id) else {
            continue;
        };
        let entry = score_group(
            group.id,
            group.name.clone(),
            &prediction.team_positions,
            &result_by_team,
            groups_with_positions.contains(&group.id),
            base_points,
            exact_bonus,
        );
        total_score += entry.teams.iter().map(|team| team.points_awarded).sum::<i64>();
        breakdown.push(entry);
    }

    // Predictions whose group no longer resolves keep their points but only
    // carry the raw id as a label.
    let mut orphaned: Vec<_> = prediction_by_group.into_values().collect();
    orphaned.sort_by_key(|prediction| prediction.group_id);
    for prediction in orphaned {
        let entry = score_group(
            prediction.group_id,
            prediction.group_id.to_string(),
            &prediction.team_positions,
            &result_by_team,
            groups_with_positions.contains(&prediction.group_id),
            base_points,
            exact_bonus,
        );
        total_score += entry.teams.iter().map(|team| team.points_awarded).sum::<i64>();
        breakdown.push(entry);
    }

    Ok(UserScoreResponse {
        user_id: user_id.to_string(),
        tournament_id,
        total_score,
        breakdown,
    })
}

fn score_group(
    group_id: Uuid,
    group_name: String,
    team_positions: &[TeamPositionEntity],
    result_by_team: &HashMap<Uuid, &TeamResultEntity>,
    group_has_position_data: bool,
    base_points: i64,
    exact_bonus: i64,
) -> GroupScoreBreakdown {
    let teams = team_positions
        .iter()
        .map(|entry| {
            let result = result_by_team.get(&entry.team_id).copied();
            let (points_awarded, reason) = score_team(
                entry,
                result,
                group_has_position_data,
                base_points,
                exact_bonus,
            );
            TeamScoreDto {
                team_id: entry.team_id,
                predicted_position: entry.predicted_position,
                actual_position: result.and_then(|result| result.final_position),
                predicted_to_qualify: entry.predicted_to_qualify,
                actually_qualified: result.is_some_and(|result| result.qualified),
                points_awarded,
                reason,
            }
        })
        .collect();

    GroupScoreBreakdown {
        group_id,
        group_name,
        teams,
    }
}

/// Decision table for one predicted team, evaluated top to bottom.
fn score_team(
    entry: &TeamPositionEntity,
    result: Option<&TeamResultEntity>,
    group_has_position_data: bool,
    base_points: i64,
    exact_bonus: i64,
) -> (i64, ScoreReason) {
    let qualified = result.is_some_and(|result| result.qualified);

    if !qualified {
        return if group_has_position_data {
            (0, ScoreReason::NotQualified)
        } else {
            (0, ScoreReason::GroupNotComplete)
        };
    }

    let Some(actual_position) = result.and_then(|result| result.final_position) else {
        return (0, ScoreReason::QualifiedNoPositionData);
    };

    // A third-place slot explicitly marked as non-qualifying earns nothing,
    // even on a position match.
    if entry.predicted_position == THIRD_PLACE_POSITION && !entry.predicted_to_qualify {
        return (0, ScoreReason::QualifiedButNotPredicted);
    }

    if entry.predicted_position == actual_position {
        (base_points + exact_bonus, ScoreReason::ExactMatch)
    } else {
        (base_points, ScoreReason::WrongPosition)
    }
}

/// Recompute and persist the aggregate score of every predicting user.
///
/// Previously stored aggregates are cleared first so reruns are idempotent.
/// A failure for one user is recorded in the response and does not abort the
/// batch.
pub async fn recompute_tournament_scores(
    state: &SharedState,
    tournament_id: Uuid,
) -> Result<RecomputeResponse, ServiceError> {
    let store = state.require_prediction_store().await?;

    if store.find_tournament(tournament_id).await?.is_none() {
        return Err(ServiceError::NotFound(format!(
            "tournament `{tournament_id}` not found"
        )));
    }

    store.clear_user_scores(tournament_id).await?;

    let predictions = store.list_tournament_predictions(tournament_id).await?;
    let users: BTreeSet<String> = predictions
        .into_iter()
        .map(|prediction| prediction.user_id)
        .collect();

    let mut users_processed = 0;
    let mut total_score_sum = 0;
    let mut errors = Vec::new();
    for user_id in users {
        match score_and_store(state, &store, &user_id, tournament_id).await {
            Ok(total) => {
                users_processed += 1;
                total_score_sum += total;
            }
            Err(err) => {
                warn!(
                    error = %err,
                    user_id = %user_id,
                    tournament_id = %tournament_id,
                    "scoring failed for one user during the recompute"
                );
                errors.push(RecomputeUserError {
                    user_id,
                    message: err.to_string(),
                });
            }
        }
    }

    info!(
        tournament_id = %tournament_id,
        users_processed,
        total_score_sum,
        failed = errors.len(),
        "tournament scores recomputed"
    );

    Ok(RecomputeResponse {
        success: true,
        users_processed,
        total_score_sum,
        errors,
    })
}

async fn score_and_store(
    state: &SharedState,
    store: &Arc<dyn PredictionStore>,
    user_id: &str,
    tournament_id: Uuid,
) -> Result<i64, ServiceError> {
    let score = score_qualified_teams(state, user_id, tournament_id).await?;

    let teams = score
        .breakdown
        .iter()
        .flat_map(|group| group.teams.iter());
    let correct_count = teams
        .clone()
        .filter(|team| team.points_awarded > 0)
        .count() as u32;
    let exact_count = teams
        .filter(|team| team.reason == ScoreReason::ExactMatch)
        .count() as u32;

    store
        .save_user_score(UserScoreEntity {
            user_id: user_id.to_string(),
            tournament_id,
            total_score: score.total_score,
            correct_count,
            exact_count,
            computed_at: SystemTime::now(),
        })
        .await?;

    Ok(score.total_score)
}
