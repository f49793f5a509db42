//! Outbound replication transport.

use tokio::sync::mpsc;
use tracing::debug;

use crate::protocol::ReplicationFrame;

/// Delivers replication frames toward mirrors.
///
/// `send` is called synchronously from inside tree notification and must not
/// block. Frames for one entity must be delivered in the order given.
pub trait ReplicationSink: Send + Sync {
    fn send(&self, frame: ReplicationFrame);
}

impl ReplicationSink for mpsc::UnboundedSender<ReplicationFrame> {
    fn send(&self, frame: ReplicationFrame) {
        if mpsc::UnboundedSender::send(self, frame).is_err() {
            debug!("replication receiver dropped; frame discarded");
        }
    }
}
