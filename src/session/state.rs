//! Lifecycle of one bridged connection.

use crate::error::BridgeError;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum::AsRefStr)]
pub enum LifecycleState {
    Unauthenticated,
    Authenticating,
    AwaitingResources,
    Spawning,
    Playing,
    /// Terminal.
    Disconnecting,
}

impl LifecycleState {
    /// Whether `self -> next` is a legal transition.
    pub fn can_advance_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Unauthenticated, Authenticating)
                | (Authenticating, AwaitingResources)
                | (AwaitingResources, Spawning)
                | (Spawning, Playing)
        ) || (next == Disconnecting && self != Disconnecting)
    }

    /// States in which unknown front packets are fatal.
    pub fn is_strict(self) -> bool {
        matches!(
            self,
            LifecycleState::Unauthenticated
                | LifecycleState::Authenticating
                | LifecycleState::AwaitingResources
        )
    }
}

/// States a handler may run in.
pub type Allowed = &'static [LifecycleState];

/// Out-of-band packets such as keep-alives.
pub const ANY_STATE: Allowed = &[
    LifecycleState::Unauthenticated,
    LifecycleState::Authenticating,
    LifecycleState::AwaitingResources,
    LifecycleState::Spawning,
    LifecycleState::Playing,
];
pub const UNAUTHENTICATED: Allowed = &[LifecycleState::Unauthenticated];
pub const AUTHENTICATING: Allowed = &[LifecycleState::Authenticating];
pub const AWAITING_RESOURCES: Allowed = &[LifecycleState::AwaitingResources];
/// Java packets that build the first world snapshot arrive while spawning.
pub const IN_WORLD: Allowed = &[LifecycleState::Spawning, LifecycleState::Playing];
pub const PLAYING: Allowed = &[LifecycleState::Playing];

/// Current lifecycle state with checked transitions.
#[derive(Debug)]
pub struct Lifecycle {
    state: LifecycleState,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: LifecycleState::Unauthenticated,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is(&self, state: LifecycleState) -> bool {
        self.state == state
    }

    pub fn advance(&mut self, next: LifecycleState) -> Result<(), BridgeError> {
        if !self.state.can_advance_to(next) {
            return Err(BridgeError::ProtocolState {
                packet: format!("transition to {}", next.as_ref()),
                state: self.state,
            });
        }
        tracing::debug!("Lifecycle {} -> {}", self.state.as_ref(), next.as_ref());
        self.state = next;
        Ok(())
    }

    /// Moves to `Disconnecting`. Returns `false` if already there.
    pub fn begin_disconnect(&mut self) -> bool {
        if self.state == LifecycleState::Disconnecting {
            return false;
        }
        tracing::debug!("Lifecycle {} -> Disconnecting", self.state.as_ref());
        self.state = LifecycleState::Disconnecting;
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
