//! The engine's registry of live playback instances.
//!
//! Completion is reported by the audio thread through a channel rather than by
//! touching the registry: miniaudio does not allow a sound to be uninitialized
//! from inside its own callback. Finished ids are drained at the start of every
//! pool operation, so an instance is evicted at most one operation after it
//! ended. Removals requested from inside a completion handler go through the
//! same channel.
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;

use crate::sound::{
    instance::{InstanceId, PlaybackInstance},
    notifier::in_completion_handler,
    Sound,
};

pub(crate) struct InstancePool {
    active: Mutex<Vec<Arc<PlaybackInstance>>>,
    finished_tx: Sender<InstanceId>,
    finished_rx: Receiver<InstanceId>,
}

impl InstancePool {
    pub(crate) fn new() -> Self {
        let (finished_tx, finished_rx) = crossbeam_channel::unbounded();
        Self {
            active: Mutex::new(Vec::new()),
            finished_tx,
            finished_rx,
        }
    }

    /// Sender handed to completion handlers.
    pub(crate) fn finished_sender(&self) -> Sender<InstanceId> {
        self.finished_tx.clone()
    }

    /// Evicts every posted instance that is still retired. An id posted
    /// before its instance was restarted is skipped. Does nothing while a
    /// completion handler runs on this thread.
    pub(crate) fn reap(&self) {
        if in_completion_handler() {
            return;
        }
        for id in self.finished_rx.try_iter() {
            let Some(instance) = self.get(id) else {
                continue;
            };
            if instance.is_retired() && self.evict(id).is_some() {
                tracing::debug!(instance = %id, "evicted finished instance");
            }
        }
    }

    pub(crate) fn insert(&self, instance: Arc<PlaybackInstance>) {
        let mut active = self.active.lock();
        if !active.iter().any(|i| i.id() == instance.id()) {
            active.push(instance);
        }
    }

    /// Removes `id` if present. The instance is returned so the caller drops it
    /// outside the lock.
    pub(crate) fn evict(&self, id: InstanceId) -> Option<Arc<PlaybackInstance>> {
        let mut active = self.active.lock();
        let pos = active.iter().position(|i| i.id() == id)?;
        Some(active.remove(pos))
    }

    /// Like [`evict()`](Self::evict), but from inside a completion handler the
    /// removal is posted and left to the next [`reap()`](Self::reap).
    pub(crate) fn retire(&self, id: InstanceId) -> Option<Arc<PlaybackInstance>> {
        if in_completion_handler() {
            let _ = self.finished_tx.send(id);
            return None;
        }
        self.evict(id)
    }

    pub(crate) fn get(&self, id: InstanceId) -> Option<Arc<PlaybackInstance>> {
        self.active.lock().iter().find(|i| i.id() == id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.active.lock().len()
    }

    /// Checked under the lock.
    pub(crate) fn any_playing(&self) -> bool {
        self.active.lock().iter().any(|i| i.is_playing())
    }

    pub(crate) fn any_playing_from(&self, sound: &Sound) -> bool {
        self.active
            .lock()
            .iter()
            .any(|i| i.is_owned_by(sound) && i.is_playing())
    }

    pub(crate) fn snapshot_from(&self, sound: &Sound) -> Vec<Arc<PlaybackInstance>> {
        self.active
            .lock()
            .iter()
            .filter(|i| i.is_owned_by(sound))
            .cloned()
            .collect()
    }

    /// Stops every instance outside the lock, then clears the registry. From
    /// inside a completion handler the stopped instances are posted instead.
    pub(crate) fn stop_all(&self) {
        let snapshot: Vec<_> = self.active.lock().clone();
        for instance in &snapshot {
            instance.stop();
        }
        if in_completion_handler() {
            for instance in &snapshot {
                let _ = self.finished_tx.send(instance.id());
            }
            return;
        }
        let cleared = std::mem::take(&mut *self.active.lock());
        drop(cleared);
        drop(snapshot);
    }
}
