//! The authoritative remote copy of a user's profile.

pub mod fetch;
pub mod memory;
pub mod profile;

use std::fmt::Debug;

pub use fetch::fetch_with_timeout;
pub use fetch::RemoteFetch;
pub use profile::ProfileRow;
pub use profile::ProfileUpdate;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteError {
    #[error("remote profile service is unavailable: {0}")]
    Unavailable(String),

    #[error("remote profile service did not answer within {0:?}")]
    Timeout(std::time::Duration),

    #[error("remote profile service rejected the request: {0}")]
    Rejected(String),

    #[error("remote profile is malformed: {0}")]
    Malformed(String),
}

/// Remote profile storage. Transport and authentication are up to the
/// implementation.
#[async_trait::async_trait]
pub trait RemoteProfileService: Send + Sync + Debug {
    /// The profile row of `user_id`, or `None` if the user has none yet.
    async fn get(&self, user_id: &str) -> Result<Option<ProfileRow>, RemoteError>;

    /// Apply the fields set in `update`, leaving the others untouched.
    async fn update(&self, user_id: &str, update: ProfileUpdate) -> Result<(), RemoteError>;
}
