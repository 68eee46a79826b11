//! services/api/src/web/ws_handler.rs
//!
//! This is the main entry point and control loop for a WebSocket connection.
//! Each connection carries one chat session; a new `Chat` message cancels any
//! reply that is still streaming, and disconnecting cancels it too.

use crate::web::{
    chat::{anonymous_session_key, build_exchange, MODEL_FALLBACK_REPLY},
    middleware::AuthUser,
    protocol::{ClientMessage, ServerMessage},
    state::AppState,
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use chrono::Utc;
use futures::{
    stream::{SplitSink, StreamExt},
    SinkExt,
};
use minimalism_coach_core::coaching::CoachingMode;
use minimalism_coach_core::domain::{ChatEntry, Goal, Profile, Progress};
use minimalism_coach_core::prompt::ComputedContext;
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const EMPTY_MESSAGE_REPLY: &str =
    "Tell me what you're working on - a room, a category, or a decision you're stuck on.";

type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Sticky per-connection context, set by `Init` and overridable per `Chat`.
#[derive(Default)]
struct SessionDefaults {
    profile: Option<Profile>,
    progress: Option<Progress>,
    goals: Vec<Goal>,
    computed: Option<ComputedContext>,
    mode: CoachingMode,
}

/// The handler for upgrading HTTP requests to WebSocket connections. Works
/// for anonymous callers; a valid bearer token attaches the vault context.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<Arc<AppState>>,
    user: Option<Extension<AuthUser>>,
) -> Response {
    let user = user.map(|Extension(user)| user);
    ws.on_upgrade(move |socket| handle_socket(socket, app_state, user))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>, user: Option<AuthUser>) {
    let session_key = user
        .as_ref()
        .map(|u| u.id.to_string())
        .unwrap_or_else(anonymous_session_key);
    info!(%session_key, "new WebSocket chat connection");

    let (sender, mut receiver) = socket.split();
    let ws_sender: WsSender = Arc::new(Mutex::new(sender));

    let mut defaults = SessionDefaults::default();
    let mut reply_task: Option<JoinHandle<()>> = None;
    let mut cancellation_token = CancellationToken::new();

    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Init {
                    profile,
                    progress,
                    goals,
                    computed,
                    mode,
                }) => {
                    defaults = SessionDefaults {
                        profile,
                        progress,
                        goals,
                        computed,
                        mode: CoachingMode::parse(mode.as_deref().unwrap_or_default()),
                    };
                    send_message(&ws_sender, &ServerMessage::SessionReady).await;
                }
                Ok(ClientMessage::Chat {
                    message,
                    mode,
                    profile,
                    progress,
                    goals,
                    recent_chat,
                    computed,
                }) => {
                    // A new message supersedes any reply still streaming.
                    cancellation_token.cancel();
                    if let Some(handle) = reply_task.take() {
                        handle.abort();
                    }
                    cancellation_token = CancellationToken::new();

                    let exchange = ExchangeInput {
                        message,
                        mode: mode
                            .map(|raw| CoachingMode::parse(&raw))
                            .unwrap_or(defaults.mode),
                        profile: profile.or_else(|| defaults.profile.clone()),
                        progress: progress.or_else(|| defaults.progress.clone()),
                        goals: if goals.is_empty() {
                            defaults.goals.clone()
                        } else {
                            goals
                        },
                        recent_chat,
                        computed: computed.or_else(|| defaults.computed.clone()),
                    };

                    let task = tokio::spawn(stream_reply(
                        app_state.clone(),
                        ws_sender.clone(),
                        user.clone(),
                        session_key.clone(),
                        exchange,
                        cancellation_token.clone(),
                    ));
                    reply_task = Some(task);
                }
                Err(e) => {
                    warn!("failed to deserialize client message: {}", e);
                    send_message(
                        &ws_sender,
                        &ServerMessage::Error {
                            message: "Unrecognized message.".to_string(),
                        },
                    )
                    .await;
                }
            },
            Message::Close(_) => {
                info!(%session_key, "client sent close message");
                break;
            }
            _ => {}
        }
    }

    // Disconnect cancels any in-flight generation.
    cancellation_token.cancel();
    if let Some(handle) = reply_task {
        handle.abort();
    }
    if user.is_none() {
        app_state.session_contexts.clear(&session_key).await;
    }
    info!(%session_key, "WebSocket connection closed");
}

struct ExchangeInput {
    message: String,
    mode: CoachingMode,
    profile: Option<Profile>,
    progress: Option<Progress>,
    goals: Vec<Goal>,
    recent_chat: Vec<ChatEntry>,
    computed: Option<ComputedContext>,
}

/// Streams one reply to the client, honoring cancellation between chunks.
async fn stream_reply(
    app_state: Arc<AppState>,
    ws_sender: WsSender,
    user: Option<AuthUser>,
    session_key: String,
    input: ExchangeInput,
    token: CancellationToken,
) {
    let message = input.message.trim().to_string();
    if message.is_empty() {
        send_message(
            &ws_sender,
            &ServerMessage::ChatChunk {
                content: EMPTY_MESSAGE_REPLY.to_string(),
            },
        )
        .await;
        send_message(&ws_sender, &ServerMessage::ChatEnd).await;
        return;
    }

    // Vault context is best effort: a missing key or unreadable blob just
    // means the exchange runs from the payload alone.
    let vault_access = match &user {
        Some(user) => match app_state.keys.resolve(user.id).await {
            Some(key) => match app_state.vaults.load(user.id, &key).await {
                Ok(vault) => Some((key, vault)),
                Err(err) => {
                    warn!(user_id = %user.id, "vault unavailable for ws chat: {err}");
                    None
                }
            },
            None => None,
        },
        None => None,
    };

    let session_context = app_state.session_contexts.summary(&session_key).await;
    let exchange = build_exchange(
        &message,
        input.mode,
        input.profile,
        input.progress,
        input.goals,
        input.recent_chat,
        input.computed,
        vault_access.as_ref().map(|(_, vault)| vault),
        session_context,
    );

    let mut stream = match app_state
        .coach
        .complete_streaming(&exchange.prompt, &exchange.settings)
        .await
    {
        Ok(stream) => stream,
        Err(err) => {
            warn!("coach model stream failed to start: {err}");
            send_message(
                &ws_sender,
                &ServerMessage::ChatChunk {
                    content: MODEL_FALLBACK_REPLY.to_string(),
                },
            )
            .await;
            send_message(&ws_sender, &ServerMessage::ChatEnd).await;
            return;
        }
    };

    let mut full_reply = String::new();
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                info!(%session_key, "reply stream cancelled");
                return;
            }
            chunk = stream.next() => {
                match chunk {
                    Some(Ok(content)) => {
                        full_reply.push_str(&content);
                        send_message(&ws_sender, &ServerMessage::ChatChunk { content }).await;
                    }
                    Some(Err(err)) => {
                        warn!("coach model stream failed mid-reply: {err}");
                        if full_reply.is_empty() {
                            full_reply = MODEL_FALLBACK_REPLY.to_string();
                            send_message(
                                &ws_sender,
                                &ServerMessage::ChatChunk {
                                    content: MODEL_FALLBACK_REPLY.to_string(),
                                },
                            )
                            .await;
                        }
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    send_message(&ws_sender, &ServerMessage::ChatEnd).await;

    app_state
        .session_contexts
        .update(&session_key, &message, &full_reply)
        .await;

    if let (Some(user), Some((key, _))) = (&user, &vault_access) {
        let now = Utc::now();
        let user_entry = ChatEntry {
            role: "user".to_string(),
            content: message,
            timestamp: Some(now),
        };
        let coach_entry = ChatEntry {
            role: "assistant".to_string(),
            content: full_reply,
            timestamp: Some(now),
        };
        if let Err(err) = app_state
            .vaults
            .mutate(user.id, key, |vault| {
                vault.conversation_history.push(user_entry);
                vault.conversation_history.push(coach_entry);
            })
            .await
        {
            warn!(user_id = %user.id, "failed to append ws exchange to vault: {err}");
        }
    }
}

async fn send_message(ws_sender: &WsSender, message: &ServerMessage) {
    match serde_json::to_string(message) {
        Ok(json) => {
            if ws_sender
                .lock()
                .await
                .send(Message::Text(json.into()))
                .await
                .is_err()
            {
                warn!("failed to send WebSocket message; client likely gone");
            }
        }
        Err(e) => warn!("failed to serialize server message: {}", e),
    }
}
