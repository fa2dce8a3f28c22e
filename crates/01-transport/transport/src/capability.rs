//! Platform capability gate for the interactive exchange.
//!
//! Interactive question/answer needs memory visible to two threads and a
//! blocking wait. The decision is made once, before a worker starts; when
//! either piece is missing the run is forced into non-interactive mode.

use crate::{TransportError, TransportResult};

/// Capabilities relevant to the blocking exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Memory can be shared between the controller and the worker thread.
    pub shared_memory: bool,
    /// A worker thread can be parked until notified.
    pub blocking_wait: bool,
}

impl Capabilities {
    /// Detects what the current target supports.
    ///
    /// Native targets always qualify. `wasm32` qualifies only when built with
    /// the `atomics` target feature (shared linear memory plus `memory.atomic.wait32`).
    pub fn detect() -> Self {
        let threaded = !cfg!(target_arch = "wasm32") || cfg!(target_feature = "atomics");
        let caps = Self {
            shared_memory: threaded,
            blocking_wait: threaded,
        };
        if !caps.interactive_supported() {
            tracing::warn!(?caps, "interactive questions unavailable on this platform");
        }
        caps
    }

    /// Capabilities with nothing available.
    pub const fn none() -> Self {
        Self {
            shared_memory: false,
            blocking_wait: false,
        }
    }

    /// Returns true when both shared memory and blocking wait are available.
    pub fn interactive_supported(&self) -> bool {
        self.shared_memory && self.blocking_wait
    }

    /// Fails with [`TransportError::CapabilityUnavailable`] naming the missing piece.
    pub fn require_interactive(&self) -> TransportResult<()> {
        if !self.shared_memory {
            return Err(TransportError::CapabilityUnavailable(
                "cross-thread shared memory is not supported",
            ));
        }
        if !self.blocking_wait {
            return Err(TransportError::CapabilityUnavailable(
                "blocking wait is not supported",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_targets_support_interactive_exchange() {
        let caps = Capabilities::detect();
        assert_eq!(caps.interactive_supported(), !cfg!(target_arch = "wasm32"));
    }

    #[test]
    fn missing_wait_names_the_gap() {
        let caps = Capabilities {
            shared_memory: true,
            blocking_wait: false,
        };
        assert_eq!(
            caps.require_interactive().unwrap_err(),
            TransportError::CapabilityUnavailable("blocking wait is not supported")
        );
        assert!(Capabilities::none().require_interactive().is_err());
    }
}
