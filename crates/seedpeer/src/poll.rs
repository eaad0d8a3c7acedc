//! Cache-completion polling.

use crate::client::{FolderStatus, SeedPeerClient};
use crate::error::{SeedPeerError, SeedPeerResult};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use urchin_core::config::ReplicationConfig;
use urchin_core::EndpointRecord;

/// Delays of the polling state machine.
#[derive(Debug, Clone, Copy)]
pub struct PollTimings {
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Backoff after the peer reports the pull still in progress.
    pub in_progress_backoff: Duration,
    /// Delay before the single status-check retry.
    pub check_retry_delay: Duration,
}

impl Default for PollTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            in_progress_backoff: Duration::from_secs(20),
            check_retry_delay: Duration::from_secs(2),
        }
    }
}

impl PollTimings {
    pub fn from_config(config: &ReplicationConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            in_progress_backoff: Duration::from_millis(config.in_progress_backoff_ms),
            check_retry_delay: Duration::from_millis(config.check_retry_delay_ms),
        }
    }
}

async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> SeedPeerResult<()> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SeedPeerError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

async fn with_cancel<T>(
    cancel: &CancellationToken,
    operation: impl Future<Output = SeedPeerResult<T>>,
) -> SeedPeerResult<T> {
    tokio::select! {
        _ = cancel.cancelled() => Err(SeedPeerError::Cancelled),
        result = operation => result,
    }
}

/// Start a pull of `<bucket>.<object_key>` onto `host` and poll until it
/// completes, returning the resulting cache endpoint.
///
/// After an accepted `cache_folder`, polls `check_folder` every
/// `poll_interval`. A failed check is retried once after
/// `check_retry_delay`; a second failure surfaces. An in-progress report
/// backs off `in_progress_backoff` before the next poll. There is no
/// overall deadline — callers bound the runtime through `cancel`.
pub async fn cache_and_poll(
    client: &dyn SeedPeerClient,
    host: &str,
    bucket: &str,
    object_key: &str,
    timings: PollTimings,
    cancel: &CancellationToken,
) -> SeedPeerResult<EndpointRecord> {
    with_cancel(cancel, client.cache_folder(host, bucket, object_key)).await?;

    loop {
        sleep_or_cancel(timings.poll_interval, cancel).await?;

        let status = match with_cancel(cancel, client.check_folder(host, bucket, object_key)).await
        {
            Ok(status) => status,
            Err(SeedPeerError::Cancelled) => return Err(SeedPeerError::Cancelled),
            Err(err) => {
                tracing::warn!(
                    host = %host,
                    bucket = %bucket,
                    object_key = %object_key,
                    error = %err,
                    "check_folder failed, retrying once"
                );
                sleep_or_cancel(timings.check_retry_delay, cancel).await?;
                with_cancel(cancel, client.check_folder(host, bucket, object_key)).await?
            }
        };

        match status.status_code {
            FolderStatus::DONE => return Ok(status.endpoint_record()),
            FolderStatus::IN_PROGRESS => {
                sleep_or_cancel(timings.in_progress_backoff, cancel).await?;
            }
            status_code => return Err(SeedPeerError::Remote { status_code }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn timings() -> PollTimings {
        PollTimings {
            poll_interval: Duration::from_millis(1),
            in_progress_backoff: Duration::from_millis(1),
            check_retry_delay: Duration::from_millis(1),
        }
    }

    fn done(root: &str, path: &str) -> SeedPeerResult<FolderStatus> {
        Ok(FolderStatus {
            status_code: FolderStatus::DONE,
            data_endpoint: "peer-a:8004".to_string(),
            data_root: root.to_string(),
            data_path: path.to_string(),
        })
    }

    fn in_progress() -> SeedPeerResult<FolderStatus> {
        Ok(FolderStatus {
            status_code: FolderStatus::IN_PROGRESS,
            data_endpoint: String::new(),
            data_root: String::new(),
            data_path: String::new(),
        })
    }

    fn check_error() -> SeedPeerResult<FolderStatus> {
        Err(SeedPeerError::BadStatus {
            host: "peer-a:8004".to_string(),
            operation: "check_folder",
            status: 503,
        })
    }

    /// Client replaying a script of check responses.
    struct ScriptedClient {
        checks: Mutex<VecDeque<SeedPeerResult<FolderStatus>>>,
        fail_cache: bool,
    }

    impl ScriptedClient {
        fn new(checks: Vec<SeedPeerResult<FolderStatus>>) -> Self {
            Self {
                checks: Mutex::new(checks.into()),
                fail_cache: false,
            }
        }
    }

    #[async_trait]
    impl SeedPeerClient for ScriptedClient {
        async fn cache_folder(&self, host: &str, _: &str, _: &str) -> SeedPeerResult<()> {
            if self.fail_cache {
                return Err(SeedPeerError::BadStatus {
                    host: host.to_string(),
                    operation: "cache_folder",
                    status: 500,
                });
            }
            Ok(())
        }

        async fn check_folder(&self, _: &str, _: &str, _: &str) -> SeedPeerResult<FolderStatus> {
            self.checks
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected check_folder call")
        }

        async fn destroy_folder(&self, _: &str, _: &str, _: &str) -> SeedPeerResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn polls_through_in_progress_to_done() {
        let client = ScriptedClient::new(vec![in_progress(), in_progress(), done("cache", "ds")]);
        let cancel = CancellationToken::new();
        let endpoint = cache_and_poll(&client, "peer-a:8004", "models", "ds", timings(), &cancel)
            .await
            .unwrap();
        assert_eq!(endpoint.endpoint, "peer-a:8004");
        assert_eq!(endpoint.endpoint_path, "cache.ds");
    }

    #[tokio::test]
    async fn check_failure_is_retried_once() {
        let client = ScriptedClient::new(vec![check_error(), done("cache", "ds")]);
        let cancel = CancellationToken::new();
        let endpoint = cache_and_poll(&client, "peer-a:8004", "models", "ds", timings(), &cancel)
            .await
            .unwrap();
        assert_eq!(endpoint.endpoint_path, "cache.ds");
    }

    #[tokio::test]
    async fn second_check_failure_surfaces() {
        let client = ScriptedClient::new(vec![check_error(), check_error()]);
        let cancel = CancellationToken::new();
        let result =
            cache_and_poll(&client, "peer-a:8004", "models", "ds", timings(), &cancel).await;
        assert!(matches!(result, Err(SeedPeerError::BadStatus { .. })));
    }

    #[tokio::test]
    async fn terminal_remote_status_surfaces() {
        let client = ScriptedClient::new(vec![Ok(FolderStatus {
            status_code: 7,
            data_endpoint: String::new(),
            data_root: String::new(),
            data_path: String::new(),
        })]);
        let cancel = CancellationToken::new();
        let result =
            cache_and_poll(&client, "peer-a:8004", "models", "ds", timings(), &cancel).await;
        assert!(matches!(
            result,
            Err(SeedPeerError::Remote { status_code: 7 })
        ));
    }

    #[tokio::test]
    async fn rejected_cache_request_surfaces() {
        let client = ScriptedClient {
            checks: Mutex::new(VecDeque::new()),
            fail_cache: true,
        };
        let cancel = CancellationToken::new();
        let result =
            cache_and_poll(&client, "peer-a:8004", "models", "ds", timings(), &cancel).await;
        assert!(matches!(result, Err(SeedPeerError::BadStatus { .. })));
    }

    #[tokio::test]
    async fn cancellation_stops_the_poll_loop() {
        // Endless in-progress script; cancellation is the only exit.
        let client = ScriptedClient::new((0..64).map(|_| in_progress()).collect());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result =
            cache_and_poll(&client, "peer-a:8004", "models", "ds", timings(), &cancel).await;
        assert!(matches!(result, Err(SeedPeerError::Cancelled)));
    }
}
