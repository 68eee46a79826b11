pub mod coach_llm;
pub mod user_store;
pub mod vault_store;

pub use coach_llm::OpenAiCoachAdapter;
pub use user_store::FileCredentialStore;
pub use vault_store::FileVaultStore;

use minimalism_coach_core::ports::{PortError, PortResult};
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Serializes `value` as pretty JSON and writes it to `path` via a temporary
/// file in the same directory, so readers only ever observe a complete file.
pub(crate) async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> PortResult<()> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| PortError::Unexpected(format!("failed to serialize {:?}: {e}", path)))?;

    let tmp_name = format!(".{}.tmp", Uuid::new_v4());
    let tmp_path = path.with_file_name(tmp_name);

    let io_err = |e: std::io::Error| PortError::Unexpected(format!("write {:?}: {e}", path));

    let mut file = tokio::fs::File::create(&tmp_path).await.map_err(io_err)?;
    file.write_all(&json).await.map_err(io_err)?;
    file.sync_all().await.map_err(io_err)?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_err(e));
    }
    Ok(())
}
