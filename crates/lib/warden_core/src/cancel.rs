//! Cancellation plumbing shared by every store operation.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::auth::AuthError;

/// Run `fut` unless `cancel` fires first.
///
/// The check is biased towards cancellation, so an already-cancelled token
/// never starts the storage call. A future dropped mid-flight releases its
/// transaction without committing.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T, AuthError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(AuthError::Canceled),
        res = fut => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_result_through() {
        let cancel = CancellationToken::new();
        let out = cancellable(&cancel, async { Ok::<_, AuthError>(42) }).await;
        assert_eq!(out.unwrap(), 42);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = cancellable(&cancel, async { Ok::<_, AuthError>(42) }).await;
        assert!(matches!(out, Err(AuthError::Canceled)));
    }

    #[tokio::test]
    async fn cancel_during_pending_future() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let out = cancellable(&cancel, std::future::pending::<Result<(), AuthError>>()).await;
        assert!(matches!(out, Err(AuthError::Canceled)));
    }
}
