//! Capability checks with cached state.
//!
//! The platform prompt is the expensive part: it interrupts the user and
//! must not appear more often than necessary. The gate remembers what the
//! user answered per capability and only goes back to the platform when the
//! cached state is not Granted. A single prompt lock is held across the
//! platform request (one dialog at a time), so callers that pile up behind
//! an open dialog share its answer instead of queueing their own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::device::PermissionRequester;
use crate::models::{Capability, PermissionState};

#[derive(Debug, Clone, Copy)]
struct Slot {
    state: PermissionState,
    /// Bumped on every resolved prompt; lets a caller that waited behind a
    /// dialog tell the fresh answer from the stale state it saw on entry.
    generation: u64,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            state: PermissionState::Unknown,
            generation: 0,
        }
    }
}

/// Permission gate shared by every component that touches a capability
#[derive(Clone)]
pub struct PermissionGate {
    requester: Arc<dyn PermissionRequester>,
    states: Arc<Mutex<HashMap<Capability, Slot>>>,
    prompt: Arc<tokio::sync::Mutex<()>>,
}

impl PermissionGate {
    /// Create a new gate over a platform permission requester
    pub fn new(requester: Arc<dyn PermissionRequester>) -> Self {
        Self {
            requester,
            states: Arc::new(Mutex::new(HashMap::new())),
            prompt: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Ensures a capability, prompting the user when necessary.
    ///
    /// A cached Granted returns immediately without a prompt. Unknown and
    /// Denied both issue one platform request (every call reaching this
    /// point is user-driven, so re-asking after an earlier denial is
    /// intended). A platform failure counts as Denied and is logged, never
    /// propagated.
    pub async fn ensure(&self, capability: Capability) -> PermissionState {
        let before = self.slot(capability);
        if before.state == PermissionState::Granted {
            return PermissionState::Granted;
        }

        let _dialog = self.prompt.lock().await;

        let current = self.slot(capability);
        if current.state == PermissionState::Granted {
            return PermissionState::Granted;
        }
        if current.generation != before.generation {
            // A prompt resolved while we waited for the dialog; its answer is ours.
            return current.state;
        }

        log::debug!("Requesting {} permission", capability.as_str());
        let observed = match self.requester.request(capability).await {
            Ok(PermissionState::Unknown) => {
                // Only Granted and Denied may escape ensure.
                log::warn!(
                    "{} permission request resolved without an answer",
                    capability.as_str()
                );
                PermissionState::Denied
            }
            Ok(state) => state,
            Err(e) => {
                log::warn!("{} permission request failed: {}", capability.as_str(), e);
                PermissionState::Denied
            }
        };
        if observed == PermissionState::Denied {
            log::info!("{} permission denied", capability.as_str());
        }

        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                capability,
                Slot {
                    state: observed,
                    generation: current.generation + 1,
                },
            );
        observed
    }

    /// Reads the cached state without prompting
    pub fn state(&self, capability: Capability) -> PermissionState {
        self.slot(capability).state
    }

    fn slot(&self, capability: Capability) -> Slot {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&capability)
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockPermissions;

    #[tokio::test]
    async fn test_granted_is_cached() {
        let platform = Arc::new(MockPermissions::granting());
        let gate = PermissionGate::new(platform.clone());

        assert_eq!(
            gate.ensure(Capability::Camera).await,
            PermissionState::Granted
        );
        assert_eq!(
            gate.ensure(Capability::Camera).await,
            PermissionState::Granted
        );
        assert_eq!(platform.request_count(), 1);
    }

    #[tokio::test]
    async fn test_capabilities_are_cached_separately() {
        let platform = Arc::new(MockPermissions::granting());
        let gate = PermissionGate::new(platform.clone());

        gate.ensure(Capability::Camera).await;
        gate.ensure(Capability::LibraryWrite).await;
        gate.ensure(Capability::Camera).await;
        assert_eq!(platform.request_count(), 2);
    }

    #[tokio::test]
    async fn test_state_peeks_without_prompt() {
        let platform = Arc::new(MockPermissions::granting());
        let gate = PermissionGate::new(platform.clone());

        assert_eq!(
            gate.state(Capability::LibraryRead),
            PermissionState::Unknown
        );
        assert_eq!(platform.request_count(), 0);

        gate.ensure(Capability::LibraryRead).await;
        assert_eq!(
            gate.state(Capability::LibraryRead),
            PermissionState::Granted
        );
    }

    #[tokio::test]
    async fn test_denied_retries_on_next_call() {
        let platform = Arc::new(MockPermissions::denying());
        platform.script(Capability::Camera, PermissionState::Denied);
        platform.script(Capability::Camera, PermissionState::Granted);
        let gate = PermissionGate::new(platform.clone());

        assert_eq!(
            gate.ensure(Capability::Camera).await,
            PermissionState::Denied
        );
        assert_eq!(
            gate.ensure(Capability::Camera).await,
            PermissionState::Granted
        );
        assert_eq!(platform.request_count(), 2);

        // Granted now sticks.
        gate.ensure(Capability::Camera).await;
        assert_eq!(platform.request_count(), 2);
    }

    #[tokio::test]
    async fn test_platform_error_reads_as_denied() {
        let platform = Arc::new(MockPermissions::granting());
        platform.script_failure(Capability::Camera, "permission service crashed");
        let gate = PermissionGate::new(platform.clone());

        assert_eq!(
            gate.ensure(Capability::Camera).await,
            PermissionState::Denied
        );
        assert_eq!(gate.state(Capability::Camera), PermissionState::Denied);
    }

    #[tokio::test]
    async fn test_unresolved_prompt_reads_as_denied() {
        let platform = Arc::new(MockPermissions::granting());
        platform.script(Capability::Camera, PermissionState::Unknown);
        let gate = PermissionGate::new(platform.clone());

        assert_eq!(
            gate.ensure(Capability::Camera).await,
            PermissionState::Denied
        );
    }

    #[tokio::test]
    async fn test_concurrent_ensure_shares_one_prompt() {
        let platform = Arc::new(MockPermissions::granting());
        platform.set_latency(std::time::Duration::from_millis(30));
        let gate = PermissionGate::new(platform.clone());

        let (a, b, c) = tokio::join!(
            gate.ensure(Capability::LibraryWrite),
            gate.ensure(Capability::LibraryWrite),
            gate.ensure(Capability::LibraryWrite),
        );
        assert_eq!(a, PermissionState::Granted);
        assert_eq!(b, PermissionState::Granted);
        assert_eq!(c, PermissionState::Granted);
        assert_eq!(platform.request_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_shares_a_denial() {
        let platform = Arc::new(MockPermissions::denying());
        platform.set_latency(std::time::Duration::from_millis(30));
        let gate = PermissionGate::new(platform.clone());

        let (a, b) = tokio::join!(
            gate.ensure(Capability::LibraryWrite),
            gate.ensure(Capability::LibraryWrite),
        );
        assert_eq!(a, PermissionState::Denied);
        assert_eq!(b, PermissionState::Denied);
        assert_eq!(platform.request_count(), 1);
    }
}
