//! Simulated worker transport over in-process channels.

use async_trait::async_trait;
use life_env::{EnvError, OutboundUpdate, TransportOp, WorkerId, WorkerTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Internal message to the runtime router.
#[derive(Debug)]
pub struct RoutedUpdate {
    pub from: WorkerId,
    pub update: OutboundUpdate,
}

/// Simulated transport for one worker.
///
/// Outbound updates go straight to the runtime's router channel; inbound
/// ops are pushed into `inbox` by the runtime once their latency elapses.
pub struct SimTransport {
    /// This worker's ID
    worker_id: WorkerId,

    /// Sender to the runtime router
    tx: mpsc::UnboundedSender<RoutedUpdate>,

    /// Receiver for delivered ops (behind tokio mutex for async)
    rx: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<TransportOp>>>,
}

impl SimTransport {
    pub fn new(
        worker_id: WorkerId,
        tx: mpsc::UnboundedSender<RoutedUpdate>,
        rx: mpsc::UnboundedReceiver<TransportOp>,
    ) -> Self {
        Self {
            worker_id,
            tx,
            rx: Arc::new(tokio::sync::Mutex::new(rx)),
        }
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<TransportOp>, ops: &mut Vec<TransportOp>) {
    while let Ok(op) = rx.try_recv() {
        ops.push(op);
    }
}

#[async_trait]
impl WorkerTransport for SimTransport {
    async fn poll_ops(&self, max_wait: Duration) -> Vec<TransportOp> {
        let mut rx = self.rx.lock().await;
        let mut ops = Vec::new();
        drain(&mut rx, &mut ops);

        if ops.is_empty() && !max_wait.is_zero() {
            if let Ok(Some(op)) = tokio::time::timeout(max_wait, rx.recv()).await {
                ops.push(op);
                drain(&mut rx, &mut ops);
            }
        }

        ops
    }

    async fn send(&self, update: OutboundUpdate) -> Result<(), EnvError> {
        let msg = RoutedUpdate {
            from: self.worker_id,
            update,
        };
        self.tx.send(msg).map_err(|_| EnvError::TransportClosed)
    }

    fn worker_id(&self) -> WorkerId {
        self.worker_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use life_env::{CellId, CellStatePatch, CellStatus, LogLevel};

    fn pair() -> (
        SimTransport,
        mpsc::UnboundedReceiver<RoutedUpdate>,
        mpsc::UnboundedSender<TransportOp>,
    ) {
        let (router_tx, router_rx) = mpsc::unbounded_channel();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let transport = SimTransport::new(WorkerId::from_seed(1), router_tx, inbox_rx);
        (transport, router_rx, inbox_tx)
    }

    #[tokio::test]
    async fn test_poll_drains_in_order() {
        let (transport, _router, inbox) = pair();
        for i in 0..3 {
            inbox
                .send(TransportOp::LogMessage {
                    level: LogLevel::Info,
                    message: format!("m{}", i),
                })
                .unwrap();
        }

        let ops = transport.poll_ops(Duration::ZERO).await;
        assert_eq!(ops.len(), 3);
        assert!(matches!(&ops[2], TransportOp::LogMessage { message, .. } if message == "m2"));
        assert!(transport.poll_ops(Duration::ZERO).await.is_empty());
    }

    #[tokio::test]
    async fn test_poll_times_out_when_idle() {
        let (transport, _router, _inbox) = pair();
        let ops = transport.poll_ops(Duration::from_millis(5)).await;
        assert!(ops.is_empty());
    }

    #[tokio::test]
    async fn test_send_tags_worker() {
        let (transport, mut router, _inbox) = pair();
        let update = OutboundUpdate::new(CellId(4), CellStatePatch::status(CellStatus::Dead));
        transport.send(update.clone()).await.unwrap();

        let routed = router.recv().await.unwrap();
        assert_eq!(routed.from, WorkerId::from_seed(1));
        assert_eq!(routed.update, update);
    }

    #[tokio::test]
    async fn test_send_after_router_gone() {
        let (transport, router, _inbox) = pair();
        drop(router);
        let err = transport
            .send(OutboundUpdate::new(CellId(1), CellStatePatch::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, EnvError::TransportClosed));
    }
}
