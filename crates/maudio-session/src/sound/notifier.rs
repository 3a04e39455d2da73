//! Bridge between miniaudio's "sound reached the end" callback and Rust.
//!
//! Each playback instance owns one [`EndSlot`] at a stable heap address. The
//! native callback receives a non-owning pointer to it as user data. The slot
//! is disarmed (native callback cleared, handler dropped) before the sound is
//! uninitialized, so no notification can reach a released instance.
use std::{
    cell::Cell,
    sync::atomic::{AtomicBool, Ordering},
};

use maudio_sys::ffi as sys;
use parking_lot::Mutex;

use crate::sound::instance::InstanceId;

/// Called on the audio thread when an instance finishes playing.
///
/// The handler must not block. It may stop instances through the
/// [`Engine`](crate::Engine) that owns it; their eviction is deferred until
/// the handler returns.
pub type CompletionHandler = Box<dyn Fn(InstanceId) + Send + Sync + 'static>;

thread_local! {
    static NOTIFYING: Cell<bool> = const { Cell::new(false) };
}

/// Whether a completion handler is running on this thread.
///
/// The notifying slot stays locked while its handler runs, so the instance
/// must not be released from here.
pub(crate) fn in_completion_handler() -> bool {
    NOTIFYING.with(Cell::get)
}

pub(crate) struct EndSlot {
    id: InstanceId,
    ended: AtomicBool,
    handler: Mutex<Option<CompletionHandler>>,
}

impl EndSlot {
    pub(crate) fn new(id: InstanceId) -> Self {
        Self {
            id,
            ended: AtomicBool::new(false),
            handler: Mutex::new(None),
        }
    }

    /// Replaces the handler. Returns whether one is installed afterwards.
    pub(crate) fn replace(&self, handler: Option<CompletionHandler>) -> bool {
        let mut slot = self.handler.lock();
        *slot = handler;
        slot.is_some()
    }

    pub(crate) fn disarm(&self) {
        // Dropped outside the lock.
        let old = self.handler.lock().take();
        drop(old);
    }

    /// Whether the end of the data was reached since the last [`reset()`](Self::reset).
    pub(crate) fn has_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.ended.store(false, Ordering::Release);
    }

    fn notify(&self) {
        self.ended.store(true, Ordering::Release);
        let guard = self.handler.lock();
        if let Some(handler) = guard.as_ref() {
            let outer = NOTIFYING.with(|n| n.replace(true));
            // A panic must not unwind into miniaudio.
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| handler(self.id)));
            NOTIFYING.with(|n| n.set(outer));
        }
    }

    pub(crate) fn as_user_data_ptr(&self) -> *mut core::ffi::c_void {
        self as *const EndSlot as *mut core::ffi::c_void
    }
}

pub(crate) unsafe extern "C" fn on_end_callback(
    user_data: *mut core::ffi::c_void,
    _sound: *mut sys::ma_sound,
) {
    if user_data.is_null() {
        return;
    }
    let slot = unsafe { &*(user_data as *const EndSlot) };
    slot.notify();
}
