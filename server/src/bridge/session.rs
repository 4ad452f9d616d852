use crate::bridge::broadcaster::Broadcaster;
use crate::bridge::registry::{frame_slot, FrameReceiver, Registry, ViewerId};
use feedcore::telemetry::BroadcastMetrics;
use futures_util::{Sink, SinkExt, StreamExt};
use log::{debug, info, warn};
use std::fmt::Display;
use std::sync::Arc;
use warp::ws::{Message, WebSocket};

/// Drives one viewer connection until either side closes it.
pub async fn serve_viewer(socket: WebSocket, broadcaster: Broadcaster) {
    let (ws_tx, mut ws_rx) = socket.split();
    let (tx, rx) = frame_slot();

    let id = broadcaster.registry().register(tx.clone());
    broadcaster.metrics().record_viewer();
    info!(
        "viewer {} connected ({} open)",
        id,
        broadcaster.registry().len()
    );

    tokio::spawn(write_frames(
        id,
        rx,
        ws_tx,
        broadcaster.registry().clone(),
        Arc::clone(broadcaster.metrics()),
    ));

    if let Err(err) = broadcaster.greet(&tx).await {
        warn!("viewer {}: initial snapshot skipped: {}", id, err);
    }
    drop(tx);

    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(message) if message.is_close() => break,
            Ok(_) => {}
            Err(err) => {
                debug!("viewer {}: read failed: {}", id, err);
                break;
            }
        }
    }

    broadcaster.registry().remove(id);
    info!("viewer {} disconnected", id);
}

/// Writes each frame that lands in the viewer's slot to `sink`.
///
/// A failed write drops the viewer from the registry at once; the loop
/// ends normally once every sender for the slot is gone.
pub async fn write_frames<S>(
    id: ViewerId,
    mut frames: FrameReceiver,
    mut sink: S,
    registry: Registry,
    metrics: Arc<BroadcastMetrics>,
) where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while frames.changed().await.is_ok() {
        let pending = frames.borrow_and_update().clone();
        let Some(frame) = pending else {
            continue;
        };
        if let Err(err) = sink.send(Message::text(frame.body.as_ref())).await {
            warn!("send to viewer {} failed, dropping it: {}", id, err);
            registry.remove(id);
            metrics.record_send_failure();
            return;
        }
    }
    let _ = sink.close().await;
}
