//! The overseer role.
//!
//! An overseer watches the whole field the way a device does, but instead of switching an
//! output it periodically rebroadcasts a complete commanded-state table: one on/off byte per
//! (affinity, level) pair. Devices that lock onto the overseer follow that table instead of
//! their own local majority, which keeps a contested area coherent.

use crate::config::{HOSTILE_ENVIRONMENT_LEVEL, OVERSEER_BROADCAST_COUNTDOWN};
use crate::info::Mode;
use crate::led::{Led, LedState, Leds};
use crate::node::Outbound;
use crate::peer::PeerTable;
use crate::radio::AdvInterval;
use crate::wire::{MeshAdv, OverseerAdv};

/// Working state of an overseer.
#[derive(Debug)]
pub struct OverseerState {
    broadcast_countdown: u8,
}

impl OverseerState {
    /// Enters overseer mode with a freshly derived (i.e. default) state table.
    pub fn init(peers: &PeerTable, out: &mut Outbound, leds: &mut impl Leds) -> OverseerState {
        out.set_overseer(&derive_states(peers));
        out.set_interval(AdvInterval::Slow);
        leds.set_state(Led::Green, LedState::BlinkOnce);
        OverseerState {
            broadcast_countdown: OVERSEER_BROADCAST_COUNTDOWN,
        }
    }

    /// Observes every active aura into the peer table, no RSSI gating.
    pub fn on_mesh(peers: &mut PeerTable, mac: &[u8; 6], adv: &MeshAdv) {
        if adv.info.mode != Mode::Aura || adv.state == 0 {
            return;
        }
        peers.observe(mac, adv.info.affinity, adv.info.level);
    }

    pub fn end_of_cycle(&mut self, peers: &mut PeerTable, out: &mut Outbound) {
        peers.age();
        if self.broadcast_countdown > 0 {
            self.broadcast_countdown -= 1;
            if self.broadcast_countdown == 0 {
                self.broadcast_countdown = OVERSEER_BROADCAST_COUNTDOWN;
                out.set_overseer(&derive_states(peers));
                trace!("state table rebroadcast");
            }
        }
    }
}

/// Derives the commanded state table from the stable field.
///
/// Rank-0 devices of both sides are on by default. The highest level with any presence
/// decides the rest: a hostile-environment broadcast suppresses the *other* side's rank-0
/// devices outright, while a regular deciding level switches every rank at or below it
/// towards whichever side holds the majority there (ties switch both sides on).
fn derive_states(peers: &PeerTable) -> OverseerAdv {
    let mut adv = OverseerAdv {
        magic: [1, 0, 0, 0],
        techno: [1, 0, 0, 0],
    };

    let tally = peers.tally_by_affinity();
    let mut deciding = usize::from(HOSTILE_ENVIRONMENT_LEVEL);
    while deciding > 0 {
        if tally.magic[deciding] != 0 || tally.techno[deciding] != 0 {
            break;
        }
        deciding -= 1;
    }
    if deciding == 0 {
        // nobody above the floor; keep the defaults
        return adv;
    }

    if deciding == usize::from(HOSTILE_ENVIRONMENT_LEVEL) {
        if tally.magic[deciding] != 0 {
            adv.techno[0] = 0;
        }
        if tally.techno[deciding] != 0 {
            adv.magic[0] = 0;
        }
        return adv;
    }

    let (magic, techno) = (tally.magic[deciding], tally.techno[deciding]);
    for at in (0..=deciding).rev() {
        let (magic_on, techno_on) = if magic > techno {
            (1, 0)
        } else if techno > magic {
            (0, 1)
        } else {
            (1, 1)
        };
        adv.magic[at] = magic_on;
        adv.techno[at] = techno_on;
    }
    adv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info::{pack_unity_level, Affinity, DeviceInfo};
    use crate::led::testing::RecordingLeds;
    use crate::wire::OVERSEER_ADV_LEN;

    fn aura(affinity: Affinity, level: u8) -> MeshAdv {
        MeshAdv::new(
            DeviceInfo {
                mode: Mode::Aura,
                affinity,
                level,
                dynamic_rssi_threshold: 0,
            },
            1,
        )
    }

    fn mac(n: u8) -> [u8; 6] {
        [n, 0, 0, 0, 0, 0x30]
    }

    fn field(peers: &[(u8, Affinity, u8)]) -> PeerTable {
        let mut table = PeerTable::new();
        for _ in 0..3 {
            for (n, affinity, level) in peers {
                OverseerState::on_mesh(&mut table, &mac(*n), &aura(*affinity, *level));
            }
            table.age();
        }
        table
    }

    #[test]
    fn empty_field_keeps_defaults() {
        let adv = derive_states(&PeerTable::new());
        assert_eq!(adv.magic, [1, 0, 0, 0]);
        assert_eq!(adv.techno, [1, 0, 0, 0]);
    }

    #[test]
    fn rank_zero_presence_changes_nothing() {
        let table = field(&[(1, Affinity::Magic, 0), (2, Affinity::Techno, 0)]);
        let adv = derive_states(&table);
        assert_eq!(adv.magic, [1, 0, 0, 0]);
        assert_eq!(adv.techno, [1, 0, 0, 0]);
    }

    #[test]
    fn majority_at_the_deciding_level_wins_all_ranks_below() {
        let table = field(&[
            (1, Affinity::Magic, 2),
            (2, Affinity::Magic, 2),
            (3, Affinity::Techno, 2),
            (4, Affinity::Techno, 1),
        ]);
        let adv = derive_states(&table);
        assert_eq!(adv.magic, [1, 1, 1, 0]);
        assert_eq!(adv.techno, [0, 0, 0, 0]);
    }

    #[test]
    fn ties_switch_both_sides_on() {
        let table = field(&[(1, Affinity::Magic, 1), (2, Affinity::Techno, 1)]);
        let adv = derive_states(&table);
        assert_eq!(adv.magic, [1, 1, 0, 0]);
        assert_eq!(adv.techno, [1, 1, 0, 0]);
    }

    #[test]
    fn unity_peers_count_for_both_sides() {
        let table = field(&[(1, Affinity::Unity, pack_unity_level(2, 2))]);
        let adv = derive_states(&table);
        assert_eq!(adv.magic, [1, 1, 1, 0]);
        assert_eq!(adv.techno, [1, 1, 1, 0]);
    }

    #[test]
    fn hostile_broadcast_suppresses_the_other_side() {
        let table = field(&[(1, Affinity::Magic, HOSTILE_ENVIRONMENT_LEVEL)]);
        let adv = derive_states(&table);
        assert_eq!(adv.magic, [1, 0, 0, 0]);
        assert_eq!(adv.techno, [0, 0, 0, 0]);

        let table = field(&[
            (1, Affinity::Magic, HOSTILE_ENVIRONMENT_LEVEL),
            (2, Affinity::Techno, HOSTILE_ENVIRONMENT_LEVEL),
        ]);
        let adv = derive_states(&table);
        assert_eq!(adv.magic, [0, 0, 0, 0]);
        assert_eq!(adv.techno, [0, 0, 0, 0]);
    }

    #[test]
    fn table_rebroadcasts_every_ten_cycles() {
        let mut peers = PeerTable::new();
        let mut out = Outbound::new();
        let mut leds = RecordingLeds::new();
        let mut state = OverseerState::init(&peers, &mut out, &mut leds);
        assert_eq!(out.data().len(), OVERSEER_ADV_LEN);

        // a magic majority builds up at level 1, but the table holds until
        // the countdown elapses
        for cycle in 1..=OVERSEER_BROADCAST_COUNTDOWN {
            OverseerState::on_mesh(&mut peers, &mac(1), &aura(Affinity::Magic, 1));
            state.end_of_cycle(&mut peers, &mut out);
            let rebroadcast = cycle == OVERSEER_BROADCAST_COUNTDOWN;
            assert_eq!(
                out.data()[2..6] == [1, 1, 0, 0],
                rebroadcast,
                "cycle {}",
                cycle
            );
        }
        assert_eq!(state.broadcast_countdown, OVERSEER_BROADCAST_COUNTDOWN);
    }
}
