//! Per-role decision state machines.
//!
//! Each role keeps its own working state and two entry points: a per-advertisement handler fed
//! from the receive path, and an end-of-cycle handler that turns the cycle's observations into
//! LED, output and advertisement changes. The [`Node`] owns the current [`ModeState`] and
//! dispatches with a plain `match`. Exactly one variant is ever live, and switching roles
//! discards the old variant wholesale before the new one is initialized.
//!
//! [`Node`]: ../node/struct.Node.html
//! [`ModeState`]: enum.ModeState.html

pub mod aura;
pub mod device;
pub mod overseer;
pub mod token;

pub use self::aura::AuraState;
pub use self::device::DeviceState;
pub use self::overseer::OverseerState;
pub use self::token::TokenState;

/// Live state of the node's current role.
pub enum ModeState {
    /// Inert; only master frames matter, and those are handled before dispatch.
    None,
    Aura(AuraState),
    Device(DeviceState),
    LvlupToken(TokenState),
    Overseer(OverseerState),
}
