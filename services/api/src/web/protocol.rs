//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the
//! API server for streaming coaching chat.

use serde::{Deserialize, Serialize};

use minimalism_coach_core::domain::{ChatEntry, Goal, Profile, Progress};
use minimalism_coach_core::prompt::ComputedContext;

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Establishes sticky context for the connection. Optional; a connection
    /// that starts with `Chat` simply has no defaults.
    #[serde(rename_all = "camelCase")]
    Init {
        #[serde(default)]
        profile: Option<Profile>,
        #[serde(default)]
        progress: Option<Progress>,
        #[serde(default)]
        goals: Vec<Goal>,
        #[serde(default)]
        computed: Option<ComputedContext>,
        #[serde(default)]
        mode: Option<String>,
    },

    /// One user message. Any context fields here override the sticky
    /// `Init` context for this exchange only.
    #[serde(rename_all = "camelCase")]
    Chat {
        message: String,
        #[serde(default)]
        mode: Option<String>,
        #[serde(default)]
        profile: Option<Profile>,
        #[serde(default)]
        progress: Option<Progress>,
        #[serde(default)]
        goals: Vec<Goal>,
        #[serde(default)]
        recent_chat: Vec<ChatEntry>,
        #[serde(default)]
        computed: Option<ComputedContext>,
    },
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirms the sticky context from `Init` was applied.
    SessionReady,

    /// One chunk of the coach's streamed reply.
    ChatChunk { content: String },

    /// The current reply is complete; the client can re-enable input.
    ChatEnd,

    /// Reports a fatal error to the client, which should display an error message.
    Error { message: String },
}
