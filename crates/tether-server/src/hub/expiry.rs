//! Background expiry of pending requests nobody answered.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::router::MessageRouter;

/// Spawn a task that drops pending requests older than `ttl` every
/// `interval`, until `cancel` fires.
pub fn start_expiry_task(
    router: Arc<MessageRouter>,
    ttl: Duration,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // consume first immediate tick
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let _ = router.sweep_expired(ttl);
                }
                () = cancel.cancelled() => {
                    debug!("expiry task stopping");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SharedSecret;
    use serde_json::json;
    use tether_core::{Envelope, Inbound};
    use tokio::sync::mpsc;

    fn query(id: &str) -> Inbound {
        Inbound::from(
            Envelope::from_value(json!({"apiKey": "k", "action": "getSerialData", "requestId": id}))
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn sweeps_stale_requests() {
        let router = Arc::new(MessageRouter::new(SharedSecret::new("k")));
        let (tx, _rx) = mpsc::channel(8);
        let conn = router.connect("primary", tx);
        let _ = router.route(&conn, query("r1"));
        assert_eq!(router.pending_requests(), 1);

        let cancel = CancellationToken::new();
        let handle = start_expiry_task(
            Arc::clone(&router),
            Duration::ZERO,
            Duration::from_millis(10),
            cancel.clone(),
        );
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(router.pending_requests(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_on_cancel() {
        let router = Arc::new(MessageRouter::new(SharedSecret::new("k")));
        let cancel = CancellationToken::new();
        let handle = start_expiry_task(
            router,
            Duration::from_secs(60),
            Duration::from_secs(3600),
            cancel.clone(),
        );
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should stop")
            .unwrap();
    }
}
