//! LED manager boundary.
//!
//! The core only decides *what* each LED (and the device output line) should do; the platform
//! owns the blink loop, GPIO polarity and PWM details. The driver's [`operate`] method doubles
//! as the cycle's delay primitive; the core never sleeps through any other interface.
//!
//! [`operate`]: trait.Leds.html#tymethod.operate

use crate::time::Duration;

/// Output channels driven by the mesh core.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Led {
    /// On-board indicator.
    Board = 0,
    /// Status LED, lit while the node's role is active.
    Green = 1,
    /// Warning LED for hostile surroundings and suppression.
    Red = 2,
    /// The switched output line of a device node.
    Output = 3,
}

/// Requested behaviour of a single channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum LedState {
    Off,
    On,
    /// Toggles at the blink interval passed to [`Leds::operate`].
    ///
    /// [`Leds::operate`]: trait.Leds.html#tymethod.operate
    BlinkFast,
    /// On at the start of each `operate` call, off for its remainder.
    BlinkOnce,
}

impl From<bool> for LedState {
    fn from(on: bool) -> Self {
        if on {
            LedState::On
        } else {
            LedState::Off
        }
    }
}

/// The LED driver the platform provides.
pub trait Leds {
    /// Requests a new state for one channel. Takes effect during the next `operate` call at
    /// the latest.
    fn set_state(&mut self, led: Led, state: LedState);

    /// Drives the configured states for `total`, toggling `BlinkFast` channels every `blink`,
    /// and returns once the interval has elapsed.
    fn operate(&mut self, total: Duration, blink: Duration);
}
