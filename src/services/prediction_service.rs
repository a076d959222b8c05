//! Business logic powering the prediction REST routes. These helpers load
//! the reference data, run the batch rules in order and persist whole
//! records, keeping rule outcomes as data instead of HTTP errors.

use std::time::SystemTime;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{GroupEntity, GroupPredictionEntity, TeamPositionEntity},
    dto::{
        predictions::{GroupPredictionResponse, SavePredictionsRequest, SaveOutcome},
        qualification::QualificationConfigResponse,
    },
    error::ServiceError,
    services::validation::{
        self, DIRECT_QUALIFICATION_CUTOFF, PositionUpdate, ValidationFailure,
    },
    state::SharedState,
};

/// Replace the caller's prediction for one group with the submitted batch.
///
/// Every outcome is carried in the returned envelope; failures below the
/// validation layer collapse into a generic retryable rejection.
pub async fn save_group_predictions(
    state: &SharedState,
    user_id: &str,
    tournament_id: Uuid,
    group_id: Uuid,
    request: SavePredictionsRequest,
) -> SaveOutcome {
    match try_save(state, user_id, tournament_id, group_id, request).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(
                error = %err,
                user_id = %user_id,
                tournament_id = %tournament_id,
                group_id = %group_id,
                "prediction save failed below the validation layer"
            );
            SaveOutcome::save_failed()
        }
    }
}

async fn try_save(
    state: &SharedState,
    user_id: &str,
    tournament_id: Uuid,
    group_id: Uuid,
    request: SavePredictionsRequest,
) -> Result<SaveOutcome, ServiceError> {
    if let Err(failure) = validation::check_user(user_id) {
        return Ok(SaveOutcome::rejected(&failure));
    }

    if request.updates.is_empty() {
        debug!(
            user_id = %user_id,
            group_id = %group_id,
            "empty batch accepted as a no-op"
        );
        return Ok(SaveOutcome::noop());
    }

    let store = state.require_prediction_store().await?;

    let Some(tournament) = store.find_tournament(tournament_id).await? else {
        let failure = ValidationFailure::TournamentNotFound { tournament_id };
        return Ok(SaveOutcome::rejected(&failure));
    };

    if let Err(failure) = validation::check_tournament_open(
        &tournament,
        state.config().dev_editing_allowed(),
        request.edit_mode,
    ) {
        return Ok(SaveOutcome::rejected(&failure));
    }

    let updates: Vec<PositionUpdate> = request.updates.into_iter().map(Into::into).collect();

    let group = match store.find_group(group_id).await? {
        Some(group) if group.tournament_id == tournament_id => group,
        // An unknown or foreign group cannot contain any of the batch teams.
        _ => {
            let failure = ValidationFailure::InvalidTeamGroup {
                team_id: updates[0].team_id,
                group_name: group_id.to_string(),
            };
            return Ok(SaveOutcome::rejected(&failure));
        }
    };

    // The cap is tournament-wide, so read the user's other groups first.
    // Concurrent saves to sibling groups can race this read; the last
    // writer wins, matching the storage model.
    let stored = store
        .list_user_predictions(user_id.to_string(), tournament_id)
        .await?;
    let sibling_third_place: u32 = stored
        .iter()
        .filter(|prediction| prediction.group_id != group_id)
        .map(|prediction| validation::count_third_place_picks(&prediction.team_positions))
        .sum();

    if let Err(failure) =
        validation::check_batch(&updates, &group, &tournament, sibling_third_place)
    {
        return Ok(SaveOutcome::rejected(&failure));
    }

    let now = SystemTime::now();
    let created_at = stored
        .iter()
        .find(|prediction| prediction.group_id == group_id)
        .map(|prediction| prediction.created_at)
        .unwrap_or(now);

    let entity = GroupPredictionEntity {
        user_id: user_id.to_string(),
        tournament_id,
        group_id,
        team_positions: updates
            .into_iter()
            .map(|update| TeamPositionEntity {
                team_id: update.team_id,
                predicted_position: update.position,
                predicted_to_qualify: update.qualifies,
            })
            .collect(),
        created_at,
        updated_at: now,
    };

    store.save_prediction(entity).await?;

    // The record is committed at this point, so a propagation failure only
    // gets logged.
    if let Err(err) = state
        .propagator()
        .propagate(user_id.to_string(), tournament_id)
        .await
    {
        warn!(
            error = %err,
            user_id = %user_id,
            tournament_id = %tournament_id,
            "playoff propagation failed after a committed save"
        );
    }

    info!(
        user_id = %user_id,
        tournament_id = %tournament_id,
        group_id = %group_id,
        "group prediction saved"
    );
    Ok(SaveOutcome::saved())
}

/// Return the caller's prediction for a group, seeding the default roster
/// ordering on first visit.
pub async fn get_group_predictions(
    state: &SharedState,
    user_id: &str,
    tournament_id: Uuid,
    group_id: Uuid,
) -> Result<GroupPredictionResponse, ServiceError> {
    validation::check_user(user_id)?;

    let store = state.require_prediction_store().await?;

    if let Some(existing) = store
        .find_prediction(user_id.to_string(), tournament_id, group_id)
        .await?
    {
        return Ok(existing.into());
    }

    let group = match store.find_group(group_id).await? {
        Some(group) if group.tournament_id == tournament_id => group,
        _ => {
            return Err(ServiceError::NotFound(format!(
                "group `{group_id}` not found in tournament `{tournament_id}`"
            )));
        }
    };

    let seeded = seed_prediction(user_id, tournament_id, &group);
    store.save_prediction(seeded.clone()).await?;
    info!(
        user_id = %user_id,
        group_id = %group_id,
        "seeded default prediction from the roster order"
    );

    Ok(seeded.into())
}

/// Default prediction for a first visit: roster order, the top two marked as
/// qualifying, no third-place pick.
fn seed_prediction(
    user_id: &str,
    tournament_id: Uuid,
    group: &GroupEntity,
) -> GroupPredictionEntity {
    let now = SystemTime::now();
    let team_positions = group
        .team_ids
        .iter()
        .enumerate()
        .map(|(index, team_id)| {
            let position = (index + 1) as u8;
            TeamPositionEntity {
                team_id: *team_id,
                predicted_position: position,
                predicted_to_qualify: position <= DIRECT_QUALIFICATION_CUTOFF,
            }
        })
        .collect();

    GroupPredictionEntity {
        user_id: user_id.to_string(),
        tournament_id,
        group_id: group.id,
        team_positions,
        created_at: now,
        updated_at: now,
    }
}

/// Qualification rules and lock status for the prediction UI.
pub async fn qualification_config(
    state: &SharedState,
    tournament_id: Uuid,
) -> Result<QualificationConfigResponse, ServiceError> {
    let store = state.require_prediction_store().await?;

    let Some(tournament) = store.find_tournament(tournament_id).await? else {
        return Err(ServiceError::NotFound(format!(
            "tournament `{tournament_id}` not found"
        )));
    };

    let lock_deadline = tournament.starts_at + state.config().prediction_lock_window();
    let is_locked = SystemTime::now() > lock_deadline;

    Ok(QualificationConfigResponse {
        allows_third_place: tournament.allows_third_place,
        max_third_place: tournament.max_third_place_qualifiers,
        is_locked,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::future::BoxFuture;

    use crate::{
        config::AppConfig,
        dao::models::{TeamResultEntity, TournamentEntity},
        dao::prediction_store::{PredictionStore, memory::MemoryPredictionStore},
        services::propagation::{PlayoffPropagator, PropagationError},
        state::AppState,
    };

    struct CountingPropagator(Arc<AtomicUsize>);

    impl PlayoffPropagator for CountingPropagator {
        fn propagate(
            &self,
            _user_id: String,
            _tournament_id: Uuid,
        ) -> BoxFuture<'static, Result<(), PropagationError>> {
            let counter = self.0.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }
    }

    struct Fixture {
        state: SharedState,
        store: MemoryPredictionStore,
        tournament_id: Uuid,
        group_a: Uuid,
        group_b: Uuid,
        teams_a: [Uuid; 4],
        teams_b: [Uuid; 4],
        propagations: Arc<AtomicUsize>,
    }

    async fn fixture() -> Fixture {
        fixture_with_config(AppConfig::default()).await
    }

    async fn fixture_with_config(config: AppConfig) -> Fixture {
        let propagations = Arc::new(AtomicUsize::new(0));
        let state = AppState::with_propagator(
            config,
            Arc::new(CountingPropagator(propagations.clone())),
        );

        let store = MemoryPredictionStore::new();
        let tournament_id = Uuid::new_v4();
        store.seed_tournament(TournamentEntity {
            id: tournament_id,
            name: "Continental Cup".to_string(),
            starts_at: SystemTime::now(),
            is_active: true,
            dev_only: false,
            allows_third_place: true,
            max_third_place_qualifiers: 1,
            base_points: None,
            exact_bonus: None,
        });

        let teams_a = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let teams_b = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let group_a = Uuid::new_v4();
        let group_b = Uuid::new_v4();
        store.seed_group(GroupEntity {
            id: group_a,
            tournament_id,
            name: "Group A".to_string(),
            team_ids: teams_a.to_vec(),
        });
        store.seed_group(GroupEntity {
            id: group_b,
            tournament_id,
            name: "Group B".to_string(),
            team_ids: teams_b.to_vec(),
        });

        state
            .install_prediction_store(Arc::new(store.clone()))
            .await;

        Fixture {
            state,
            store,
            tournament_id,
            group_a,
            group_b,
            teams_a,
            teams_b,
            propagations,
        }
    }

    fn batch(teams: &[Uuid; 4], third_qualifies: bool) -> SavePredictionsRequest {
        SavePredictionsRequest {
            updates: vec![
                update(teams[0], 1, true),
                update(teams[1], 2, true),
                update(teams[2], 3, third_qualifies),
                update(teams[3], 4, false),
            ],
            edit_mode: false,
        }
    }

    fn update(
        team_id: Uuid,
        position: u8,
        qualifies: bool,
    ) -> crate::dto::predictions::PositionUpdateInput {
        crate::dto::predictions::PositionUpdateInput {
            team_id,
            position,
            qualifies,
        }
    }

    #[tokio::test]
    async fn saved_batch_round_trips_through_the_store() {
        let fx = fixture().await;
        let outcome = save_group_predictions(
            &fx.state,
            "user-1",
            fx.tournament_id,
            fx.group_a,
            batch(&fx.teams_a, false),
        )
        .await;
        assert!(outcome.success);

        let reloaded =
            get_group_predictions(&fx.state, "user-1", fx.tournament_id, fx.group_a)
                .await
                .unwrap();
        let positions: Vec<(Uuid, u8, bool)> = reloaded
            .team_positions
            .iter()
            .map(|p| (p.team_id, p.predicted_position, p.predicted_to_qualify))
            .collect();
        assert_eq!(
            positions,
            vec![
                (fx.teams_a[0], 1, true),
                (fx.teams_a[1], 2, true),
                (fx.teams_a[2], 3, false),
                (fx.teams_a[3], 4, false),
            ]
        );
        assert_eq!(fx.propagations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blank_user_gets_the_unauthorized_code() {
        let fx = fixture().await;
        let outcome = save_group_predictions(
            &fx.state,
            "   ",
            fx.tournament_id,
            fx.group_a,
            batch(&fx.teams_a, false),
        )
        .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "unauthorized");
    }

    #[tokio::test]
    async fn empty_batch_is_a_successful_noop() {
        let fx = fixture().await;
        let outcome = save_group_predictions(
            &fx.state,
            "user-1",
            fx.tournament_id,
            fx.group_a,
            SavePredictionsRequest {
                updates: Vec::new(),
                edit_mode: false,
            },
        )
        .await;
        assert!(outcome.success);

        let stored = fx
            .store
            .find_prediction("user-1".into(), fx.tournament_id, fx.group_a)
            .await
            .unwrap();
        assert!(stored.is_none());
        assert_eq!(fx.propagations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_batch_leaves_the_stored_record_untouched() {
        let fx = fixture().await;
        let saved = save_group_predictions(
            &fx.state,
            "user-1",
            fx.tournament_id,
            fx.group_a,
            batch(&fx.teams_a, false),
        )
        .await;
        assert!(saved.success);

        // Runner-up demoted to non-qualifier: rule 7 violation.
        let mut bad = batch(&fx.teams_a, false);
        bad.updates[1].qualifies = false;
        let outcome =
            save_group_predictions(&fx.state, "user-1", fx.tournament_id, fx.group_a, bad)
                .await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.unwrap().code,
            "invalid_qualification_flag"
        );

        let stored = fx
            .store
            .find_prediction("user-1".into(), fx.tournament_id, fx.group_a)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.team_positions[1].predicted_to_qualify);
    }

    #[tokio::test]
    async fn duplicate_positions_fail_before_any_write() {
        let fx = fixture().await;
        let mut bad = batch(&fx.teams_a, false);
        bad.updates[1].position = 1;

        let outcome =
            save_group_predictions(&fx.state, "user-1", fx.tournament_id, fx.group_a, bad)
                .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "duplicate_positions");

        let stored = fx
            .store
            .find_prediction("user-1".into(), fx.tournament_id, fx.group_a)
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn third_place_cap_spans_sibling_groups() {
        let fx = fixture().await;

        // The tournament allows exactly one third-place qualifier.
        let first = save_group_predictions(
            &fx.state,
            "user-1",
            fx.tournament_id,
            fx.group_a,
            batch(&fx.teams_a, true),
        )
        .await;
        assert!(first.success);

        let over_cap = save_group_predictions(
            &fx.state,
            "user-1",
            fx.tournament_id,
            fx.group_b,
            batch(&fx.teams_b, true),
        )
        .await;
        assert!(!over_cap.success);
        assert_eq!(over_cap.error.unwrap().code, "too_many_third_place");

        // Without a third pick the sibling save is fine.
        let within_cap = save_group_predictions(
            &fx.state,
            "user-1",
            fx.tournament_id,
            fx.group_b,
            batch(&fx.teams_b, false),
        )
        .await;
        assert!(within_cap.success);
    }

    #[tokio::test]
    async fn replacing_the_own_third_pick_stays_within_the_cap() {
        let fx = fixture().await;

        let first = save_group_predictions(
            &fx.state,
            "user-1",
            fx.tournament_id,
            fx.group_a,
            batch(&fx.teams_a, true),
        )
        .await;
        assert!(first.success);

        // Resubmitting the same group keeps its own pick out of the sibling
        // count.
        let resubmit = save_group_predictions(
            &fx.state,
            "user-1",
            fx.tournament_id,
            fx.group_a,
            batch(&fx.teams_a, true),
        )
        .await;
        assert!(resubmit.success);
    }

    #[tokio::test]
    async fn inactive_tournament_rejects_unless_dev_override_applies() {
        let fx = fixture().await;
        let staging_id = Uuid::new_v4();
        fx.store.seed_tournament(TournamentEntity {
            id: staging_id,
            name: "Staging Cup".to_string(),
            starts_at: SystemTime::now(),
            is_active: false,
            dev_only: true,
            allows_third_place: true,
            max_third_place_qualifiers: 1,
            base_points: None,
            exact_bonus: None,
        });
        let group_id = Uuid::new_v4();
        fx.store.seed_group(GroupEntity {
            id: group_id,
            tournament_id: staging_id,
            name: "Group S".to_string(),
            team_ids: fx.teams_a.to_vec(),
        });

        let locked = save_group_predictions(
            &fx.state,
            "user-1",
            staging_id,
            group_id,
            batch(&fx.teams_a, false),
        )
        .await;
        assert_eq!(locked.error.unwrap().code, "tournament_locked");

        // Same store, but a deployment that allows dev editing and a request
        // that asks for it.
        let dev_fx = fixture_with_config(AppConfig::with_dev_editing()).await;
        dev_fx.store.seed_tournament(TournamentEntity {
            id: staging_id,
            name: "Staging Cup".to_string(),
            starts_at: SystemTime::now(),
            is_active: false,
            dev_only: true,
            allows_third_place: true,
            max_third_place_qualifiers: 1,
            base_points: None,
            exact_bonus: None,
        });
        dev_fx.store.seed_group(GroupEntity {
            id: group_id,
            tournament_id: staging_id,
            name: "Group S".to_string(),
            team_ids: dev_fx.teams_a.to_vec(),
        });

        let mut request = batch(&dev_fx.teams_a, false);
        request.edit_mode = true;
        let allowed =
            save_group_predictions(&dev_fx.state, "user-1", staging_id, group_id, request)
                .await;
        assert!(allowed.success);
    }

    #[tokio::test]
    async fn unknown_tournament_is_reported_with_its_code() {
        let fx = fixture().await;
        let outcome = save_group_predictions(
            &fx.state,
            "user-1",
            Uuid::new_v4(),
            fx.group_a,
            batch(&fx.teams_a, false),
        )
        .await;
        assert_eq!(outcome.error.unwrap().code, "tournament_not_found");
    }

    #[tokio::test]
    async fn first_read_seeds_the_roster_order() {
        let fx = fixture().await;
        let first = get_group_predictions(&fx.state, "user-9", fx.tournament_id, fx.group_a)
            .await
            .unwrap();

        let positions: Vec<(Uuid, u8, bool)> = first
            .team_positions
            .iter()
            .map(|p| (p.team_id, p.predicted_position, p.predicted_to_qualify))
            .collect();
        assert_eq!(
            positions,
            vec![
                (fx.teams_a[0], 1, true),
                (fx.teams_a[1], 2, true),
                (fx.teams_a[2], 3, false),
                (fx.teams_a[3], 4, false),
            ]
        );

        // The seed is persisted, not recomputed per read.
        let stored = fx
            .store
            .find_prediction("user-9".into(), fx.tournament_id, fx.group_a)
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn qualification_config_reflects_the_lock_window() {
        let fx = fixture().await;

        let open = qualification_config(&fx.state, fx.tournament_id)
            .await
            .unwrap();
        assert!(open.allows_third_place);
        assert_eq!(open.max_third_place, 1);
        assert!(!open.is_locked);

        let ancient_id = Uuid::new_v4();
        fx.store.seed_tournament(TournamentEntity {
            id: ancient_id,
            name: "Finished Cup".to_string(),
            starts_at: SystemTime::UNIX_EPOCH,
            is_active: false,
            dev_only: false,
            allows_third_place: false,
            max_third_place_qualifiers: 0,
            base_points: None,
            exact_bonus: None,
        });
        let closed = qualification_config(&fx.state, ancient_id).await.unwrap();
        assert!(closed.is_locked);
    }

    #[tokio::test]
    async fn degraded_state_turns_into_a_retryable_failure() {
        let state = AppState::new(AppConfig::default());
        let outcome = save_group_predictions(
            &state,
            "user-1",
            Uuid::new_v4(),
            Uuid::new_v4(),
            SavePredictionsRequest {
                updates: vec![update(Uuid::new_v4(), 1, true)],
                edit_mode: false,
            },
        )
        .await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.unwrap().code, "save_failed");
    }

    // Results seeded here only exercise the read path indirectly; scoring has
    // its own suite.
    #[tokio::test]
    async fn seeding_results_does_not_disturb_predictions() {
        let fx = fixture().await;
        fx.store.seed_team_result(TeamResultEntity {
            team_id: fx.teams_a[0],
            group_id: fx.group_a,
            final_position: Some(1),
            qualified: true,
        });

        let outcome = save_group_predictions(
            &fx.state,
            "user-1",
            fx.tournament_id,
            fx.group_a,
            batch(&fx.teams_a, false),
        )
        .await;
        assert!(outcome.success);
    }
}
