use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::watch;

pub type ViewerId = usize;

/// One serialized snapshot queued for a viewer.
///
/// `seq` is taken when the snapshot's fetch starts, so a higher number
/// always means fresher data.
#[derive(Debug, Clone)]
pub struct Frame {
    pub seq: u64,
    pub body: Arc<str>,
}

/// Receiving side of a viewer's frame slot.
pub type FrameReceiver = watch::Receiver<Option<Frame>>;

/// Sending side of a viewer's frame slot.
///
/// The slot holds at most one pending frame. A newer frame replaces an
/// unwritten older one, so a viewer that falls behind skips straight to
/// the freshest snapshot.
#[derive(Debug, Clone)]
pub struct FrameSender {
    slot: Arc<watch::Sender<Option<Frame>>>,
}

pub fn frame_slot() -> (FrameSender, FrameReceiver) {
    let (tx, rx) = watch::channel(None);
    (FrameSender { slot: Arc::new(tx) }, rx)
}

impl FrameSender {
    /// True once the viewer's writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.slot.is_closed()
    }

    /// Puts `frame` in the slot unless the slot already holds a newer
    /// one. Hands the frame back if the writer has gone away.
    pub fn offer(&self, frame: Frame) -> Result<(), Frame> {
        if self.slot.is_closed() {
            return Err(frame);
        }
        self.slot.send_if_modified(|pending| match pending {
            Some(held) if held.seq >= frame.seq => false,
            _ => {
                *pending = Some(frame);
                true
            }
        });
        Ok(())
    }
}

/// Live set of viewer connections.
///
/// Each entry is the sending half of the viewer's outbound queue; the
/// socket itself is owned by the viewer's session task.
#[derive(Clone, Default)]
pub struct Registry {
    viewers: Arc<RwLock<HashMap<ViewerId, FrameSender>>>,
    next_id: Arc<AtomicUsize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, sender: FrameSender) -> ViewerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.viewers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, sender);
        id
    }

    /// Returns whether the viewer was still registered. Safe to call
    /// more than once.
    pub fn remove(&self, id: ViewerId) -> bool {
        self.viewers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Copy of the current members. The lock is released before the
    /// caller sends anything.
    pub fn members(&self) -> Vec<(ViewerId, FrameSender)> {
        self.viewers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.viewers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
