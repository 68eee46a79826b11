//! services/api/src/web/progress.rs
//!
//! Progress tracking, the intake assessment, and the admin summary.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use minimalism_coach_core::coaching;
use minimalism_coach_core::domain::Profile;

const MAX_ITEM_COUNT: i64 = 100_000;
const MAX_LABEL_CHARS: usize = 160;
const MAX_NOTES_CHARS: usize = 400;
const MAX_CHALLENGES: usize = 10;

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

//=========================================================================================
// Request Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneRequest {
    #[serde(default)]
    pub item_count: Option<i64>,
    #[serde(default)]
    pub milestone: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRequest {
    #[serde(default)]
    pub current_items: Option<i64>,
    #[serde(default)]
    pub lifestyle: Option<String>,
    #[serde(default)]
    pub motivation: Option<String>,
    #[serde(default)]
    pub challenges: Option<Vec<String>>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/progress - The caller's progress log
#[utoipa::path(
    get,
    path = "/api/progress",
    responses(
        (status = 200, description = "Progress log with milestones"),
        (status = 401, description = "Not authenticated or vault key not cached")
    )
)]
pub async fn get_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse, ApiError> {
    let (vault, _key) = state.vault_for_request(&user).await?;
    state.refresh_snapshots(user.id, &vault).await;
    Ok(Json(json!({ "progress": vault.progress })))
}

/// POST /api/progress - Record a milestone
#[utoipa::path(
    post,
    path = "/api/progress",
    request_body = MilestoneRequest,
    responses(
        (status = 200, description = "Milestone recorded; refreshed progress returned"),
        (status = 400, description = "itemCount missing or not a positive number"),
        (status = 401, description = "Not authenticated or vault key not cached")
    )
)]
pub async fn post_progress_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<MilestoneRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let item_count = match req.item_count {
        Some(count) if count > 0 && count <= MAX_ITEM_COUNT => count as u32,
        _ => {
            return Err(ApiError::Validation(
                "itemCount must be a positive number.".to_string(),
            ))
        }
    };

    let label = req
        .milestone
        .map(|label| truncate_chars(label.trim(), MAX_LABEL_CHARS))
        .unwrap_or_default();
    let notes = req
        .notes
        .map(|notes| truncate_chars(notes.trim(), MAX_NOTES_CHARS))
        .unwrap_or_default();

    let key = state
        .keys
        .resolve(user.id)
        .await
        .ok_or(ApiError::ReauthenticationRequired)?;

    let now = Utc::now();
    let mut recorded = None;
    let saved = state
        .vaults
        .mutate(user.id, &key, |vault| {
            recorded = Some(coaching::append_milestone(
                &mut vault.progress,
                item_count,
                &label,
                &notes,
                now,
            ));
        })
        .await?;
    state.refresh_snapshots(user.id, &saved).await;

    let milestone = recorded
        .ok_or_else(|| ApiError::Internal("milestone was not recorded".to_string()))?;
    let message = if milestone.improvement > 0 {
        format!(
            "Fantastic! You're down {} items since your last check-in.",
            milestone.improvement
        )
    } else {
        format!("Logged {} items. Keep going!", milestone.item_count)
    };

    Ok(Json(json!({
        "success": true,
        "progress": saved.progress,
        "latestMilestone": milestone,
        "message": message,
    })))
}

/// POST /api/assessment - Intake assessment; builds the profile
#[utoipa::path(
    post,
    path = "/api/assessment",
    request_body = AssessmentRequest,
    responses(
        (status = 200, description = "Profile, phase, and recommendations"),
        (status = 400, description = "currentItems missing or not a positive number"),
        (status = 401, description = "Not authenticated or vault key not cached")
    )
)]
pub async fn assessment_handler(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<AssessmentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current_items = match req.current_items {
        Some(count) if count > 0 && count <= MAX_ITEM_COUNT => count as u32,
        _ => {
            return Err(ApiError::Validation(
                "currentItems must be a positive number.".to_string(),
            ))
        }
    };

    let challenges: Vec<String> = req
        .challenges
        .unwrap_or_default()
        .into_iter()
        .map(|challenge| challenge.trim().to_string())
        .filter(|challenge| !challenge.is_empty())
        .take(MAX_CHALLENGES)
        .collect();

    let phase = coaching::phase_for_item_count(current_items);
    let target_items = coaching::target_item_count(phase, current_items);
    let now = Utc::now();

    let key = state
        .keys
        .resolve(user.id)
        .await
        .ok_or(ApiError::ReauthenticationRequired)?;

    let saved = state
        .vaults
        .mutate(user.id, &key, |vault| {
            let existing = vault.profile.take().unwrap_or_default();
            vault.profile = Some(Profile {
                user_id: Some(user.id),
                name: existing.name,
                current_items: Some(current_items),
                target_items: Some(target_items),
                lifestyle: req.lifestyle.clone(),
                motivation: req.motivation.clone(),
                challenges: challenges.clone(),
                phase: Some(phase),
                preferred_approach: existing.preferred_approach,
                assessment_date: Some(now),
                created_at: existing.created_at.or(Some(now)),
                updated_at: Some(now),
            });
            vault.progress.current_item_count = Some(current_items);
            vault.progress.target_item_count = target_items;
            vault.progress.current_phase = phase;
            vault.progress.last_update = Some(now);
        })
        .await?;
    state.refresh_snapshots(user.id, &saved).await;

    Ok(Json(json!({
        "profile": saved.profile,
        "phase": phase,
        "recommendations": coaching::recommendations_for_phase(phase),
        "nextSteps": coaching::recommendations_for_phase(phase).first(),
        "estimatedTimeframe": coaching::estimated_timeframe(phase),
    })))
}

/// GET /api/admin/progress-summary - Aggregate snapshot across live sessions
///
/// Built from the in-memory snapshot caches, so it only covers users who have
/// touched their vault since the last restart. Plaintext vault data never
/// leaves the per-user handlers; this reports aggregates only.
#[utoipa::path(
    get,
    path = "/api/admin/progress-summary",
    responses(
        (status = 200, description = "Aggregate progress summary"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn admin_summary_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let total_registered = state.users.count_users().await?;
    let progress_entries = state.progress.values().await;
    let profiles_tracked = state.profiles.len().await;

    let mut phase_counts: HashMap<String, usize> = HashMap::new();
    let mut total_milestones = 0usize;
    let mut total_items_reduced = 0i64;
    let mut active_last_30_days = 0usize;
    let mut item_counts: Vec<u32> = Vec::new();
    let cutoff = Utc::now() - chrono::Duration::days(30);

    for progress in &progress_entries {
        *phase_counts
            .entry(progress.current_phase.to_string())
            .or_default() += 1;
        total_milestones += progress.milestones.len();
        total_items_reduced += progress
            .milestones
            .iter()
            .map(|m| m.improvement.max(0))
            .sum::<i64>();
        if progress.last_update.is_some_and(|at| at > cutoff) {
            active_last_30_days += 1;
        }
        if let Some(count) = progress.current_item_count {
            item_counts.push(count);
        }
    }

    let average_item_count = if item_counts.is_empty() {
        None
    } else {
        Some(item_counts.iter().map(|c| *c as f64).sum::<f64>() / item_counts.len() as f64)
    };
    let at_goal = item_counts.iter().filter(|count| **count <= 50).count();

    Ok(Json(json!({
        "summary": {
            "totalRegisteredUsers": total_registered,
            "activeSessions": progress_entries.len(),
            "profilesTracked": profiles_tracked,
            "phaseBreakdown": phase_counts,
            "totalMilestones": total_milestones,
            "totalItemsReduced": total_items_reduced,
            "activeLast30Days": active_last_30_days,
            "averageItemCount": average_item_count,
            "usersAtGoal": at_goal,
            "generatedAt": Utc::now(),
        }
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use minimalism_coach_core::domain::Phase;

    #[test]
    fn phase_and_target_follow_the_assessment_inputs() {
        let phase = coaching::phase_for_item_count(320);
        assert_eq!(phase, Phase::Reduction);
        assert_eq!(coaching::target_item_count(phase, 320), 192);
    }

    #[test]
    fn label_and_notes_are_truncated_not_rejected() {
        assert_eq!(truncate_chars(&"x".repeat(500), MAX_LABEL_CHARS).len(), 160);
        assert_eq!(truncate_chars("short", MAX_NOTES_CHARS), "short");
    }
}
