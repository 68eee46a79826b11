//! crates/minimalism_coach_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application: user records,
//! the per-user vault document, and its sub-documents. Serde attributes match
//! the camelCase JSON layout used on the wire and at rest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Account role, assigned once at registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

/// Decluttering phase, keyed off the user's current item count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Initial,
    Reduction,
    Refinement,
    Optimization,
    Maintenance,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Phase::Initial => "initial",
            Phase::Reduction => "reduction",
            Phase::Refinement => "refinement",
            Phase::Optimization => "optimization",
            Phase::Maintenance => "maintenance",
        };
        write!(f, "{label}")
    }
}

/// A registered user as persisted in the credential store.
///
/// `password_hash` and `encryption_salt` must never leave the store layer;
/// use [`UserRecord::sanitized`] for anything user-facing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    /// Base64 salt used exclusively for vault key derivation. Never changes
    /// once assigned: rotating it would orphan the encrypted vault.
    pub encryption_salt: String,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl UserRecord {
    /// Strips credential material for responses and exports.
    pub fn sanitized(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
            last_login_at: self.last_login_at,
            display_name: self.display_name.clone(),
        }
    }
}

/// The safe-to-expose view of a user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// The single JSON document holding one user's coaching data.
///
/// This is the unit of encryption: it is always sealed and opened as a whole,
/// never partially.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VaultDocument {
    pub profile: Option<Profile>,
    pub progress: Progress,
    pub goals: Vec<Goal>,
    pub decisions: Vec<Decision>,
    pub stories: Vec<Story>,
    pub conversation_history: Vec<ChatEntry>,
}

impl VaultDocument {
    /// Builds the default empty document created at first login/registration.
    pub fn new(user_id: Uuid, display_name: Option<&str>) -> Self {
        let now = Utc::now();
        let profile = display_name
            .filter(|name| !name.is_empty())
            .map(|name| Profile {
                user_id: Some(user_id),
                name: Some(name.to_string()),
                phase: Some(Phase::Initial),
                motivation: Some("simplicity".to_string()),
                created_at: Some(now),
                updated_at: Some(now),
                ..Profile::default()
            });

        Self {
            profile,
            progress: Progress {
                user_id: Some(user_id),
                start_date: now,
                ..Progress::default()
            },
            ..Self::default()
        }
    }
}

/// Derived facts about the user's starting point and goal, created on first
/// assessment submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_items: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_items: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifestyle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub challenges: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_approach: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assessment_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Append-only progress log plus derived fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub current_phase: Phase,
    pub start_date: DateTime<Utc>,
    #[serde(default)]
    pub last_update: Option<DateTime<Utc>>,
    #[serde(default)]
    pub current_item_count: Option<u32>,
    #[serde(default = "default_target_item_count")]
    pub target_item_count: u32,
}

fn default_target_item_count() -> u32 {
    50
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            user_id: None,
            milestones: Vec::new(),
            current_phase: Phase::Initial,
            start_date: Utc::now(),
            last_update: None,
            current_item_count: None,
            target_item_count: default_target_item_count(),
        }
    }
}

/// One recorded progress snapshot.
///
/// `improvement` is the previous milestone's item count minus this one's; a
/// negative value records a regression and is not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub item_count: u32,
    pub date: DateTime<Utc>,
    #[serde(rename = "milestone")]
    pub label: String,
    #[serde(default)]
    pub notes: String,
    pub improvement: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Goal {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub completed: bool,
}

/// A keep-or-let-go decision recorded from a coaching session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Decision {
    pub item: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Story {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
}

/// One transcript entry in the conversation history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatEntry {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}
