//! Protocol tuning constants.
//!
//! Everything here is compile-time; the only runtime configuration a node carries is its
//! persisted [`DeviceInfo`] record. The values are tuned for dense fields (a hundred or more
//! nodes within radio range), where slow advertising cadences and long observation windows
//! matter more than latency.
//!
//! [`DeviceInfo`]: ../info/struct.DeviceInfo.html

use crate::time::Duration;

/// Capacity of the peer table.
pub const MAX_PEERS: usize = 255;

/// Linear-probe step of the peer table. Coprime to `MAX_PEERS`, so a full probe
/// sequence visits every slot exactly once.
pub const HASH_PROBE_STEP: usize = 7;

/// Global floor for incoming reports; anything weaker is never processed.
pub const RSSI_THRESHOLD: i8 = -70;

/// A level-up token only reacts to auras in close proximity.
pub const LVLUP_TOKEN_RSSI_THRESHOLD: i8 = -45;

/// Consecutive detections before a peer counts towards output decisions.
pub const PEER_DETECTION_THRESHOLD: i8 = 3;

/// Consecutive missed cycles before a peer is dropped from the table.
pub const PEER_MISS_THRESHOLD: i8 = 6;

/// Consecutive detections before a device obeys a tracked overseer.
pub const OVERSEER_DETECTION_THRESHOLD: i8 = 3;

/// Consecutive missed cycles before a device releases its overseer lock.
pub const OVERSEER_MISS_THRESHOLD: i8 = 6;

/// The aura level broadcast to declare a hostile environment. Only valid for aura nodes;
/// regular aura ranks stop at [`MAX_AURA_LEVEL`].
///
/// [`MAX_AURA_LEVEL`]: constant.MAX_AURA_LEVEL.html
pub const HOSTILE_ENVIRONMENT_LEVEL: u8 = 4;

/// Cycles of continuous hostile surroundings before an aura deactivates.
pub const HOSTILE_ENVIRONMENT_THRESHOLD: u8 = 20;

/// Highest regular aura rank.
pub const MAX_AURA_LEVEL: u8 = 3;

/// Length of the blink shown while a node re-initializes its mode.
pub const STARTUP_DELAY: Duration = Duration::from_millis(5000);

/// Length of one scan/advertise cycle, not counting the settle delay.
pub const CYCLE_DURATION: Duration = Duration::from_millis(3500);

/// Blink cadence used by fast-blinking LEDs.
pub const BLINK_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound of the random scan-only window at the start of each cycle. The jitter
/// desynchronizes neighbouring cycles and reduces collision clustering.
pub const PEER_DISCOVERY_JITTER: Duration = Duration::from_millis(120);

/// Pause between stopping the radio and running the end-of-cycle handler, giving pending
/// driver work time to finish.
pub const SETTLE_DELAY: Duration = Duration::from_millis(100);

/// Cycles a level-up token spends broadcasting its grant.
pub const LVLUP_TOKEN_BROADCAST_COUNTDOWN: u8 = 3;

/// Cycles between overseer payload rebuilds.
pub const OVERSEER_BROADCAST_COUNTDOWN: u8 = 10;
