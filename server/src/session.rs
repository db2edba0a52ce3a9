//! Per-connection send side: a dedicated writer task fed by a bounded
//! queue, so one slow client cannot stall the tick loop or any other
//! player's traffic.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{mpsc, Notify};

/// Frames queued per client before the connection is considered dead.
pub const SEND_QUEUE_CAPACITY: usize = 100;

/// Handle to one client's outbound half. Cloning shares the same
/// underlying queue and liveness state.
#[derive(Clone)]
pub struct Session {
    pub player_id: u16,
    outbound: mpsc::Sender<Vec<u8>>,
    connected: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Session {
    /// Takes ownership of the write half and spawns the writer task.
    pub fn spawn(player_id: u16, mut writer: OwnedWriteHalf) -> Self {
        let (outbound, mut queue) = mpsc::channel::<Vec<u8>>(SEND_QUEUE_CAPACITY);
        let connected = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(Notify::new());

        let flag = Arc::clone(&connected);
        let notify = Arc::clone(&shutdown);
        tokio::spawn(async move {
            while let Some(frame) = queue.recv().await {
                if let Err(e) = writer.write_all(&frame).await {
                    debug!("Write to player {} failed: {}", player_id, e);
                    flag.store(false, Ordering::SeqCst);
                    notify.notify_one();
                    break;
                }
            }
        });

        Self {
            player_id,
            outbound,
            connected,
            shutdown,
        }
    }

    /// Queues a frame without blocking. A full queue means the client
    /// has stopped draining its socket; the session is torn down rather
    /// than letting the backlog grow.
    pub fn queue(&self, frame: Vec<u8>) {
        if !self.is_connected() {
            return;
        }
        if self.outbound.try_send(frame).is_err() {
            warn!(
                "Send queue overflow for player {}, dropping connection",
                self.player_id
            );
            self.disconnect();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Marks the session dead and wakes the receive loop.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Resolves once the session has been disconnected from either side.
    pub async fn closed(&self) {
        self.shutdown.notified().await;
    }
}
