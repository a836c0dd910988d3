//! A proximity-sensing mesh for low-power radio nodes.
//!
//! Every node in the mesh continuously broadcasts a compact state frame and passively listens for
//! the frames of its neighbours. There is no routing and no connection setup: the entire protocol
//! lives in single-hop advertisements, and each node derives its local behaviour (LED indication,
//! an external output line, role changes) from the population it can hear.
//!
//! A node carries one of five roles:
//!
//! * **none**: inert placeholder, only reacts to remote configuration.
//! * **aura**: a pendant broadcasting an affinity and a level.
//! * **device**: switches a physical output depending on the auras around it.
//! * **lvlup token**: hands a one-shot level-up to a single qualifying aura.
//! * **overseer**: observes the whole field and broadcasts commanded states.
//!
//! # Using the crate
//!
//! The core is runtime and hardware-agnostic. The platform provides implementations of a few
//! small interfaces and pumps received advertising reports into the stack:
//!
//! * A [`Radio`] that can run a passive scan and broadcast a manufacturer-data payload.
//! * A [`Store`] for two tiny persistent records (identity address and configuration).
//! * A [`Leds`] driver, which is also the cycle's only delay primitive.
//! * A [`RngCore`] source for the identity address and cycle jitter.
//!
//! [`cycle::boot`] assembles a [`Node`] from persisted state and [`cycle::run`] drives the
//! scan/advertise cycle forever.
//!
//! [`Radio`]: radio/trait.Radio.html
//! [`Store`]: store/trait.Store.html
//! [`Leds`]: led/trait.Leds.html
//! [`RngCore`]: https://docs.rs/rand_core
//! [`Node`]: node/struct.Node.html
//! [`cycle::boot`]: cycle/fn.boot.html
//! [`cycle::run`]: cycle/fn.run.html

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;
#[macro_use]
mod utils;

pub mod bytes;
pub mod config;
pub mod cycle;
mod device_address;
mod error;
pub mod info;
pub mod led;
pub mod mode;
pub mod node;
pub mod peer;
pub mod radio;
pub mod store;
pub mod time;
pub mod wire;

pub use self::device_address::{AddressKind, DeviceAddress};
pub use self::error::Error;
pub use self::node::Node;
