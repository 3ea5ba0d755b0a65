//! Single-slot host callbacks.
//!
//! Each slot holds at most one callback; registering a new one replaces the
//! previous. Dispatch clones the callback out of its slot before invoking
//! it, so a callback may re-register itself or call back into the client.

use std::sync::{Arc, Mutex};

use catweb_core::{ModeFlags, RelayEvent, RigId, RigStatus};

use crate::lock;

pub(crate) type ConnectFn = dyn Fn() + Send + Sync;
pub(crate) type RigFn<T> = dyn Fn(RigId, T) + Send + Sync;

type Slot<F> = Mutex<Option<Arc<F>>>;

#[derive(Default)]
pub(crate) struct Callbacks {
    connect: Slot<ConnectFn>,
    disconnect: Slot<ConnectFn>,
    status: Slot<RigFn<Option<RigStatus>>>,
    frequency: Slot<RigFn<Option<u64>>>,
    mode: Slot<RigFn<Option<ModeFlags>>>,
    ptt: Slot<RigFn<bool>>,
}

impl Callbacks {
    pub fn set_connect(&self, f: Arc<ConnectFn>) {
        *lock(&self.connect) = Some(f);
    }

    pub fn set_disconnect(&self, f: Arc<ConnectFn>) {
        *lock(&self.disconnect) = Some(f);
    }

    pub fn set_status(&self, f: Arc<RigFn<Option<RigStatus>>>) {
        *lock(&self.status) = Some(f);
    }

    pub fn set_frequency(&self, f: Arc<RigFn<Option<u64>>>) {
        *lock(&self.frequency) = Some(f);
    }

    pub fn set_mode(&self, f: Arc<RigFn<Option<ModeFlags>>>) {
        *lock(&self.mode) = Some(f);
    }

    pub fn set_ptt(&self, f: Arc<RigFn<bool>>) {
        *lock(&self.ptt) = Some(f);
    }

    /// Invoke the callback matching `event`, if one is registered.
    pub fn dispatch(&self, event: &RelayEvent) {
        match *event {
            RelayEvent::Connected => {
                if let Some(f) = current(&self.connect) {
                    f();
                }
            }
            RelayEvent::Disconnected => {
                if let Some(f) = current(&self.disconnect) {
                    f();
                }
            }
            RelayEvent::Reconnecting { .. } => {}
            RelayEvent::StatusChanged { rig, status } => {
                if let Some(f) = current(&self.status) {
                    f(rig, status);
                }
            }
            RelayEvent::FrequencyChanged { rig, freq_hz } => {
                if let Some(f) = current(&self.frequency) {
                    f(rig, freq_hz);
                }
            }
            RelayEvent::ModeChanged { rig, mode } => {
                if let Some(f) = current(&self.mode) {
                    f(rig, mode);
                }
            }
            RelayEvent::PttChanged { rig, on } => {
                if let Some(f) = current(&self.ptt) {
                    f(rig, on);
                }
            }
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("connect", &lock(&self.connect).is_some())
            .field("disconnect", &lock(&self.disconnect).is_some())
            .field("status", &lock(&self.status).is_some())
            .field("frequency", &lock(&self.frequency).is_some())
            .field("mode", &lock(&self.mode).is_some())
            .field("ptt", &lock(&self.ptt).is_some())
            .finish()
    }
}

fn current<F: ?Sized>(slot: &Slot<F>) -> Option<Arc<F>> {
    lock(slot).clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn dispatch_without_callbacks_is_noop() {
        let callbacks = Callbacks::default();
        callbacks.dispatch(&RelayEvent::Connected);
        callbacks.dispatch(&RelayEvent::PttChanged {
            rig: RigId::new(1).unwrap(),
            on: true,
        });
    }

    #[test]
    fn registering_replaces_previous() {
        let callbacks = Callbacks::default();
        let first = Arc::new(AtomicU32::new(0));
        let second = Arc::new(AtomicU32::new(0));

        let c = Arc::clone(&first);
        callbacks.set_connect(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        let c = Arc::clone(&second);
        callbacks.set_connect(Arc::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        callbacks.dispatch(&RelayEvent::Connected);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rig_callbacks_receive_arguments() {
        let callbacks = Callbacks::default();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        callbacks.set_frequency(Arc::new(move |rig, freq| {
            s.lock().unwrap().push((rig.get(), freq));
        }));

        let rig = RigId::new(3).unwrap();
        callbacks.dispatch(&RelayEvent::FrequencyChanged {
            rig,
            freq_hz: Some(14_074_000),
        });
        callbacks.dispatch(&RelayEvent::FrequencyChanged { rig, freq_hz: None });
        // Other event kinds go to other slots.
        callbacks.dispatch(&RelayEvent::ModeChanged {
            rig,
            mode: Some(ModeFlags::AM),
        });

        assert_eq!(
            *seen.lock().unwrap(),
            vec![(3, Some(14_074_000)), (3, None)]
        );
    }

    #[test]
    fn callback_may_reregister_during_dispatch() {
        let callbacks = Arc::new(Callbacks::default());
        let inner = Arc::clone(&callbacks);
        callbacks.set_disconnect(Arc::new(move || {
            inner.set_disconnect(Arc::new(|| {}));
        }));
        callbacks.dispatch(&RelayEvent::Disconnected);
    }
}
