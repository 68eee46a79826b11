pub mod coaching;
pub mod crypto;
pub mod domain;
pub mod ports;
pub mod prompt;

pub use domain::{
    ChatEntry, Decision, Goal, Milestone, Phase, Profile, Progress, PublicUser, Role, Story,
    UserRecord, VaultDocument,
};
pub use ports::{
    ChunkStream, CoachModelService, CredentialStore, PortError, PortResult, VaultStore,
};
