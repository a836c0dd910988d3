//! Peer discovery table.
//!
//! A fixed-capacity, open-addressed table keyed by the peer's device address. The table does
//! two jobs at once: deduplicating the many copies of a frame received within one cycle, and
//! smoothing over the flakiness of a crowded band. A peer only influences output decisions
//! once it has been seen in [`PEER_DETECTION_THRESHOLD`] consecutive cycles, and it is only
//! forgotten after [`PEER_MISS_THRESHOLD`] consecutive silent cycles. Between those two
//! thresholds a single stability counter swings positive (detection streak) or negative
//! (miss streak).
//!
//! Deleted slots stay part of the probe chains until they are reused, so lookups keep working
//! after churn.
//!
//! [`PEER_DETECTION_THRESHOLD`]: ../config/constant.PEER_DETECTION_THRESHOLD.html
//! [`PEER_MISS_THRESHOLD`]: ../config/constant.PEER_MISS_THRESHOLD.html

use crate::config::{
    HASH_PROBE_STEP, HOSTILE_ENVIRONMENT_LEVEL, MAX_AURA_LEVEL, MAX_PEERS,
    PEER_DETECTION_THRESHOLD, PEER_MISS_THRESHOLD,
};
use crate::info::{split_unity_level, Affinity};
use bitflags::bitflags;

/// Number of tallied level columns, including the hostile broadcast level.
pub const LEVEL_SLOTS: usize = HOSTILE_ENVIRONMENT_LEVEL as usize + 1;

bitflags! {
    /// Per-slot bookkeeping bits.
    struct SlotFlags: u8 {
        /// A frame from this peer was observed since the last aging pass.
        const DETECTED_THIS_CYCLE = 0b01;
        /// The detection streak reached the threshold at some point.
        const ESTABLISHED         = 0b10;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SlotState {
    Empty,
    Occupied,
    Deleted,
}

/// One tracked peer.
#[derive(Copy, Clone)]
pub struct Peer {
    state: SlotState,
    mac: [u8; 6],
    affinity: Affinity,
    level: u8,
    /// Positive: consecutive detections. Negative: consecutive misses.
    stability: i8,
    flags: SlotFlags,
}

impl Peer {
    const EMPTY: Peer = Peer {
        state: SlotState::Empty,
        mac: [0; 6],
        affinity: Affinity::Unity,
        level: 0,
        stability: 0,
        flags: SlotFlags::empty(),
    };

    /// The affinity last observed on the air.
    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    /// The level last observed on the air (a packed rank pair for unity auras).
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Whether this peer's detection streak ever reached the threshold.
    pub fn is_established(&self) -> bool {
        self.flags.contains(SlotFlags::ESTABLISHED)
    }

    fn counts_for_calculation(&self) -> bool {
        self.state == SlotState::Occupied && self.is_established()
    }
}

/// The peer table.
pub struct PeerTable {
    slots: [Peer; MAX_PEERS],
    count: u8,
}

fn hash(mac: &[u8; 6]) -> u8 {
    let mut hash: u8 = 0;
    for &byte in mac {
        hash ^= byte;
        hash = hash.rotate_left(1);
    }
    hash
}

impl PeerTable {
    pub const fn new() -> Self {
        PeerTable {
            slots: [Peer::EMPTY; MAX_PEERS],
            count: 0,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        usize::from(self.count)
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Records one observation of `mac` during the current cycle.
    ///
    /// A peer already marked as detected keeps its first observation of the cycle; duplicate
    /// frames must not double-count. A full probe trip without a usable slot drops the
    /// observation; established peers keep aging normally, the newcomer waits for churn.
    pub fn observe(&mut self, mac: &[u8; 6], affinity: Affinity, level: u8) {
        let origin = usize::from(hash(mac)) % MAX_PEERS;
        let mut slot = origin;
        let mut first_deleted = None;

        loop {
            match self.slots[slot].state {
                SlotState::Empty => {
                    let target = first_deleted.unwrap_or(slot);
                    self.slots[target] = Peer {
                        state: SlotState::Occupied,
                        mac: *mac,
                        affinity,
                        level,
                        stability: 1,
                        flags: SlotFlags::DETECTED_THIS_CYCLE,
                    };
                    self.count += 1;
                    return;
                }
                SlotState::Deleted => {
                    if first_deleted.is_none() {
                        first_deleted = Some(slot);
                    }
                }
                SlotState::Occupied if self.slots[slot].mac == *mac => {
                    let peer = &mut self.slots[slot];
                    if !peer.flags.contains(SlotFlags::DETECTED_THIS_CYCLE) {
                        peer.affinity = affinity;
                        peer.level = level;
                        peer.flags.insert(SlotFlags::DETECTED_THIS_CYCLE);
                    }
                    return;
                }
                SlotState::Occupied => {}
            }

            slot = (slot + HASH_PROBE_STEP) % MAX_PEERS;
            if slot == origin {
                trace!("peer table full, observation dropped");
                return;
            }
        }
    }

    /// Whether `mac` currently occupies a slot.
    pub fn contains(&self, mac: &[u8; 6]) -> bool {
        let origin = usize::from(hash(mac)) % MAX_PEERS;
        let mut slot = origin;
        loop {
            match self.slots[slot].state {
                SlotState::Empty => return false,
                SlotState::Occupied if self.slots[slot].mac == *mac => return true,
                _ => {}
            }
            slot = (slot + HASH_PROBE_STEP) % MAX_PEERS;
            if slot == origin {
                return false;
            }
        }
    }

    /// End-of-cycle aging pass over every occupied slot.
    ///
    /// Detection streaks grow towards the detection threshold and set the established flag on
    /// arrival; miss streaks grow towards the miss threshold and delete the slot on arrival.
    /// Crossing from one streak into the other restarts the counter at ±1.
    pub fn age(&mut self) {
        let mut removed = 0;
        for peer in self.slots.iter_mut() {
            if peer.state != SlotState::Occupied {
                continue;
            }
            if peer.flags.contains(SlotFlags::DETECTED_THIS_CYCLE) {
                if peer.stability < 0 {
                    peer.stability = 1;
                } else if peer.stability < PEER_DETECTION_THRESHOLD {
                    peer.stability += 1;
                    if peer.stability >= PEER_DETECTION_THRESHOLD {
                        peer.flags.insert(SlotFlags::ESTABLISHED);
                    }
                }
                peer.flags.remove(SlotFlags::DETECTED_THIS_CYCLE);
            } else {
                if peer.stability > 0 {
                    peer.stability = -1;
                } else {
                    peer.stability -= 1;
                }
                if peer.stability <= -PEER_MISS_THRESHOLD {
                    peer.state = SlotState::Deleted;
                    removed += 1;
                }
            }
        }
        self.count -= removed;
    }

    /// Empties the table.
    pub fn clear(&mut self) {
        for peer in self.slots.iter_mut() {
            *peer = Peer::EMPTY;
        }
        self.count = 0;
    }

    /// Iterates over the peers that may influence output decisions.
    pub fn established(&self) -> impl Iterator<Item = &Peer> {
        self.slots.iter().filter(|peer| peer.counts_for_calculation())
    }

    /// Tallies established peers as friendly or hostile, from the point of view of a node
    /// with affinity `own`.
    ///
    /// Unity peers are friendly to everyone and contribute the rank relevant to `own`. A
    /// unity observer in turn has no hostiles at all. Peers of the own affinity only count
    /// while broadcasting a regular rank, which keeps hostile-environment broadcasts of the
    /// own side out of the friendly column.
    pub fn tally_for_device(&self, own: Affinity) -> DeviceTally {
        let mut tally = DeviceTally::default();
        for peer in self.established() {
            if peer.affinity == Affinity::Unity {
                let level = split_unity_level(peer.level, own);
                tally.friendly[usize::from(level)] += 1;
            } else if peer.affinity == own && peer.level <= MAX_AURA_LEVEL {
                tally.friendly[usize::from(peer.level)] += 1;
            } else if own != Affinity::Unity && usize::from(peer.level) < LEVEL_SLOTS {
                tally.hostile[usize::from(peer.level)] += 1;
            }
        }
        tally
    }

    /// Tallies established peers into pure magic and techno columns; unity peers contribute
    /// their respective rank to both sides.
    pub fn tally_by_affinity(&self) -> AffinityTally {
        let mut tally = AffinityTally::default();
        for peer in self.established() {
            match peer.affinity {
                Affinity::Magic if usize::from(peer.level) < LEVEL_SLOTS => {
                    tally.magic[usize::from(peer.level)] += 1;
                }
                Affinity::Techno if usize::from(peer.level) < LEVEL_SLOTS => {
                    tally.techno[usize::from(peer.level)] += 1;
                }
                Affinity::Unity => {
                    let magic = split_unity_level(peer.level, Affinity::Magic);
                    let techno = split_unity_level(peer.level, Affinity::Techno);
                    tally.magic[usize::from(magic)] += 1;
                    tally.techno[usize::from(techno)] += 1;
                }
                _ => {}
            }
        }
        tally
    }
}

/// Established-peer counts per level, partitioned into friends and foes.
#[derive(Debug, Default, Copy, Clone)]
pub struct DeviceTally {
    pub friendly: [u8; LEVEL_SLOTS],
    pub hostile: [u8; LEVEL_SLOTS],
}

/// Established-peer counts per level, partitioned by pure affinity.
#[derive(Debug, Default, Copy, Clone)]
pub struct AffinityTally {
    pub magic: [u8; LEVEL_SLOTS],
    pub techno: [u8; LEVEL_SLOTS],
}
