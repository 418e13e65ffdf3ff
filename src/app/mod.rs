mod manager;

pub use manager::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    ResolveClaudeDir(#[from] crate::infra::ResolveClaudeDirError),

    #[error(transparent)]
    ResolveStateDir(#[from] crate::infra::ResolveStateDirError),

    #[error(transparent)]
    LoadPreferences(#[from] crate::infra::LoadPreferencesError),
}
