use std::future::Future;
use std::time::Duration;

use tokio::time;

use super::ProfileRow;
use super::ProfileUpdate;
use super::RemoteError;
use super::RemoteProfileService;

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteFetch {
    Found(ProfileRow),
    Missing,
    Unavailable(RemoteError),
}

/// Race `call` against a timer; whichever finishes first wins.
pub async fn race_timeout<T>(
    call: impl Future<Output = Result<T, RemoteError>>,
    timeout: Duration,
) -> Result<T, RemoteError> {
    let deadline = time::sleep(timeout);
    tokio::pin!(deadline);
    tokio::select! {
        result = call => result,
        () = &mut deadline => Err(RemoteError::Timeout(timeout)),
    }
}

pub async fn fetch_with_timeout(
    service: &dyn RemoteProfileService,
    user_id: &str,
    timeout: Duration,
) -> RemoteFetch {
    match race_timeout(service.get(user_id), timeout).await {
        Ok(Some(row)) => RemoteFetch::Found(row),
        Ok(None) => RemoteFetch::Missing,
        Err(e) => RemoteFetch::Unavailable(e),
    }
}

pub async fn update_with_timeout(
    service: &dyn RemoteProfileService,
    user_id: &str,
    update: ProfileUpdate,
    timeout: Duration,
) -> Result<(), RemoteError> {
    race_timeout(service.update(user_id, update), timeout).await
}
