//! Session finite-state machine (FSM) types.
//!
//! This module defines every state a [`crate::session::Session`] can occupy.
//! Transitions are not implemented here (they live in [`crate::session`]),
//! but [`SessionState::can_advance_to`] encodes which ones are legal so the
//! session can assert it never takes any other.
//!
//! ```text
//!  AUTHENTICATING ──REPLY OK──▶ OPEN
//!        │                       │
//!        │ fault                 │ fault          BYE / ERR / EOF
//!        ▼                       ▼                       │
//!     ERRORING ◀─────────────────┘                       │
//!        │                                               │
//!        │ ERR sent                                      │
//!        ▼                                               ▼
//!    TERMINATED ◀────────────────────────────────────────┘
//! ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for a successful `/auth`; initial state.
    #[default]
    Authenticating,
    /// Authenticated; chat traffic flows both ways.
    Open,
    /// A failure was observed; an `ERR` is being sent to the server.
    Erroring,
    /// The session is over. Absorbing.
    Terminated,
}

impl SessionState {
    /// `true` if moving from `self` to `next` is a legal transition.
    ///
    /// Staying in the same state is legal for every state except `Erroring`,
    /// which is one-shot.
    pub fn can_advance_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Authenticating, Authenticating | Open | Erroring | Terminated)
                | (Open, Open | Erroring | Terminated)
                | (Erroring, Terminated)
                | (Terminated, Terminated)
        )
    }

    /// `true` once no further input is accepted.
    pub fn is_finished(self) -> bool {
        matches!(self, SessionState::Erroring | SessionState::Terminated)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
