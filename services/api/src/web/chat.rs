//! services/api/src/web/chat.rs
//!
//! The REST chat endpoint. Works for anonymous callers from the request
//! payload alone; signed-in callers with a cached vault key also get their
//! vault context folded in and the exchange appended to their history.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::AuthUser;
use crate::web::state::AppState;
use minimalism_coach_core::coaching::{
    self, CoachingMode,
};
use minimalism_coach_core::domain::{ChatEntry, Goal, Profile, Progress, VaultDocument};
use minimalism_coach_core::prompt::{self, ComputedContext, PromptContext};

const MAX_MESSAGE_CHARS: usize = 2_000;
const RECENT_HISTORY_ENTRIES: usize = 6;

/// Shown instead of an error when the model is unreachable, so a flaky
/// backend never breaks the conversation.
pub(crate) const MODEL_FALLBACK_REPLY: &str = "I'm having trouble reaching my coaching brain right now. \
    Take a breath, pick one small area, and remove three things you haven't used this month. \
    I'll be back with you shortly.";

//=========================================================================================
// Request Type
//=========================================================================================

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub profile: Option<Profile>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub progress: Option<Progress>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub goals: Vec<Goal>,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub recent_chat: Vec<ChatEntry>,
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub computed: Option<ComputedContext>,
    #[serde(default)]
    pub context: Option<String>,
    /// Client-chosen session key for anonymous callers.
    #[serde(default)]
    pub user_id: Option<String>,
}

//=========================================================================================
// Context Assembly
//=========================================================================================

/// Everything needed to drive one model exchange, resolved from the payload
/// and (when available) the caller's vault.
pub(crate) struct ExchangeContext {
    pub prompt: String,
    pub settings: coaching::GenerationSettings,
    pub used_session_context: bool,
}

/// Builds the prompt and generation settings for one message, preferring
/// payload context over vault context field by field.
pub(crate) fn build_exchange(
    message: &str,
    mode: CoachingMode,
    mut profile: Option<Profile>,
    mut progress: Option<Progress>,
    mut goals: Vec<Goal>,
    mut recent_chat: Vec<ChatEntry>,
    computed: Option<ComputedContext>,
    vault: Option<&VaultDocument>,
    session_context: Option<String>,
) -> ExchangeContext {
    if let Some(vault) = vault {
        if profile.is_none() {
            profile = vault.profile.clone();
        }
        if progress.is_none() {
            progress = Some(vault.progress.clone());
        }
        if goals.is_empty() {
            goals = vault.goals.clone();
        }
        if recent_chat.is_empty() {
            let history = &vault.conversation_history;
            let start = history.len().saturating_sub(RECENT_HISTORY_ENTRIES);
            recent_chat = history[start..].to_vec();
        }
    }

    let profile_preference = profile
        .as_ref()
        .and_then(|p| p.preferred_approach.clone());
    let computed_preference = computed
        .as_ref()
        .and_then(|c| c.preferred_approach.clone());

    let approach = coaching::determine_approach(
        message,
        mode,
        profile_preference.as_deref(),
        computed_preference.as_deref(),
    );
    let snapshot = coaching::detect_emotional_state(message);
    let settings = coaching::generation_settings(mode, approach, snapshot.state, snapshot.crisis);

    let used_session_context = session_context.as_deref().is_some_and(|c| !c.is_empty());
    let ctx = PromptContext {
        profile,
        progress,
        goals,
        recent_chat,
        computed,
        mode,
        approach: Some(approach),
        approach_directive: Some(coaching::approach_directive(approach, snapshot.state)),
        emotion: snapshot.state,
        emotion_directive: snapshot.directive,
        crisis: snapshot.crisis,
        session_context,
    };

    let prompt = prompt::build_prompt(prompt::template_for_mode(mode), message, &ctx);
    ExchangeContext {
        prompt,
        settings,
        used_session_context,
    }
}

//=========================================================================================
// Handler
//=========================================================================================

/// POST /api/chat - One coaching exchange
#[utoipa::path(
    post,
    path = "/api/chat",
    responses(
        (status = 200, description = "Coach reply (or a fallback when the model is unavailable)"),
        (status = 400, description = "Missing or oversized message"),
        (status = 429, description = "Rate limit exceeded")
    )
)]
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    user: Option<Extension<AuthUser>>,
    Json(req): Json<ChatRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = user.map(|Extension(user)| user);
    let session_key = user
        .as_ref()
        .map(|u| u.id.to_string())
        .or_else(|| req.user_id.clone())
        .unwrap_or_else(|| "anonymous".to_string());

    if !state.chat_limiter.check(&session_key) {
        return Err(ApiError::RateLimited);
    }

    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::Validation("Message is required.".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::Validation(format!(
            "Message is too long. Please keep it under {MAX_MESSAGE_CHARS} characters."
        )));
    }

    // Vault context is best effort here: a signed-in caller whose key fell
    // out of the cache still gets an answer from the payload alone.
    let vault_access = match &user {
        Some(user) => match state.keys.resolve(user.id).await {
            Some(key) => match state.vaults.load(user.id, &key).await {
                Ok(vault) => Some((key, vault)),
                Err(err) => {
                    warn!(user_id = %user.id, "vault unavailable for chat: {err}");
                    None
                }
            },
            None => None,
        },
        None => None,
    };

    let mode = CoachingMode::parse(req.mode.as_deref().unwrap_or_default());
    let session_context = match &req.context {
        Some(context) if !context.is_empty() => Some(context.clone()),
        _ => state.session_contexts.summary(&session_key).await,
    };

    let exchange = build_exchange(
        &message,
        mode,
        req.profile,
        req.progress,
        req.goals,
        req.recent_chat,
        req.computed,
        vault_access.as_ref().map(|(_, vault)| vault),
        session_context,
    );

    let reply = match state.coach.complete(&exchange.prompt, &exchange.settings).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => MODEL_FALLBACK_REPLY.to_string(),
        Err(err) => {
            warn!("coach model request failed: {err}");
            MODEL_FALLBACK_REPLY.to_string()
        }
    };

    state
        .session_contexts
        .update(&session_key, &message, &reply)
        .await;

    if let (Some(user), Some((key, _))) = (&user, &vault_access) {
        let now = Utc::now();
        let user_entry = ChatEntry {
            role: "user".to_string(),
            content: message.clone(),
            timestamp: Some(now),
        };
        let coach_entry = ChatEntry {
            role: "assistant".to_string(),
            content: reply.clone(),
            timestamp: Some(now),
        };
        if let Err(err) = state
            .vaults
            .mutate(user.id, key, |vault| {
                vault.conversation_history.push(user_entry);
                vault.conversation_history.push(coach_entry);
            })
            .await
        {
            warn!(user_id = %user.id, "failed to append chat exchange to vault: {err}");
        }
    }

    Ok(Json(json!({
        "response": reply,
        "userId": session_key,
        "timestamp": Utc::now(),
        "context": if exchange.used_session_context {
            "Used previous context"
        } else {
            "Fresh conversation"
        },
    })))
}

/// Derives a stable anonymous session key for callers without an account.
pub(crate) fn anonymous_session_key() -> String {
    format!("anon-{}", Uuid::new_v4())
}
