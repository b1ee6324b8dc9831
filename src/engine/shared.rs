//! Mailbox shared between threads.
//!
//! A DOE capability can only run one exchange at a time. `SharedMailbox`
//! wraps the engine in a mutex so whole exchanges (or whole CDAT walks) are
//! serialized across callers.

use std::sync::{Arc, Mutex, MutexGuard};

use super::mailbox::DoeMailbox;
use crate::error::{DoeError, Result};
use crate::port::RegisterPort;

/// Cloneable handle to a mutex-protected [`DoeMailbox`].
pub struct SharedMailbox<P> {
    inner: Arc<Mutex<DoeMailbox<P>>>,
}

impl<P> Clone for SharedMailbox<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: RegisterPort> SharedMailbox<P> {
    pub fn new(mailbox: DoeMailbox<P>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(mailbox)),
        }
    }

    /// Take exclusive ownership of the mailbox until the guard drops.
    pub fn lock(&self) -> Result<MutexGuard<'_, DoeMailbox<P>>> {
        self.inner.lock().map_err(|_| DoeError::LockPoisoned)
    }

    /// Run `f` with the mailbox held.
    pub fn with<R>(&self, f: impl FnOnce(&mut DoeMailbox<P>) -> Result<R>) -> Result<R> {
        let mut guard = self.lock()?;
        f(&mut guard)
    }
}

impl<P: RegisterPort> From<DoeMailbox<P>> for SharedMailbox<P> {
    fn from(mailbox: DoeMailbox<P>) -> Self {
        Self::new(mailbox)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::port::SimDevice;
    use crate::protocol::DoeRequest;

    /// Echoes the request payload back so each caller can check its own answer.
    fn echo_device() -> SimDevice {
        SimDevice::with_responder(|request| {
            let payload = &request[2..];
            let mut response = vec![request[0], payload.len() as u32 + 2];
            response.extend_from_slice(payload);
            Some(response)
        })
    }

    #[test]
    fn test_concurrent_exchanges_are_serialized() {
        let mailbox = DoeMailbox::builder(echo_device())
            .ready_poll_interval(Duration::ZERO)
            .build();
        let shared = SharedMailbox::new(mailbox);

        let handles: Vec<_> = (0..8u32)
            .map(|n| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for i in 0..16u32 {
                        let tag = n << 16 | i;
                        let response = shared
                            .with(|mb| mb.exchange(&DoeRequest::new(1, 0, vec![tag, !tag])))
                            .unwrap();
                        assert_eq!(response.payload, vec![tag, !tag]);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let guard = shared.lock().unwrap();
        assert_eq!(guard.port().requests().len(), 8 * 16);
    }

    #[test]
    fn test_poisoned_lock_reported() {
        let shared = SharedMailbox::new(DoeMailbox::new(SimDevice::new()));
        let clone = shared.clone();
        let _ = thread::spawn(move || {
            let _guard = clone.lock().unwrap();
            panic!("holder panicked");
        })
        .join();

        assert!(matches!(shared.lock(), Err(DoeError::LockPoisoned)));
    }
}
