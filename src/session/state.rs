//! Session state machine.

/// Status reported by the host session engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStatus {
    /// Sessions are switched off on the host.
    Disabled,
    /// Enabled, no session running.
    None,
    /// A session is running.
    Active,
}

/// Lifecycle of the coordinator's one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// Nothing opened yet.
    #[default]
    Uninitialized,
    /// Default driver opened, session not started.
    Open,
    /// Session started and bound to an id.
    Active,
    /// Persisted and released.
    Closed,
    /// Torn down through the host's destroy path.
    Destroyed,
}

impl LifecycleState {
    /// Check if transition to target state is valid.
    ///
    /// Valid transitions:
    /// - Uninitialized -> Open
    /// - Open -> Active
    /// - Uninitialized | Open | Active -> Closed
    /// - Active -> Destroyed
    pub fn can_transition_to(&self, target: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (*self, target),
            (Uninitialized, Open)
                | (Open, Active)
                | (Uninitialized, Closed)
                | (Open, Closed)
                | (Active, Closed)
                | (Active, Destroyed)
        )
    }

    /// Attempt to transition to a new state.
    ///
    /// Returns `Ok(())` if the transition is valid, or an error otherwise.
    pub fn transition_to(&mut self, target: LifecycleState) -> crate::Result<()> {
        if self.can_transition_to(target) {
            *self = target;
            Ok(())
        } else {
            Err(crate::error::SessionError::InvalidStateTransition {
                from: *self,
                to: target,
            })
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Closed | LifecycleState::Destroyed)
    }

    /// `start` is only accepted from these states.
    pub fn can_start(&self) -> bool {
        matches!(self, LifecycleState::Uninitialized | LifecycleState::Open)
    }
}
