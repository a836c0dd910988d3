//! The level-up token role.
//!
//! A charged token waits for a single qualifying aura in close range, one rank below the
//! token's own, latches onto it, and then spends a short countdown broadcasting a master
//! frame that raises the target's rank. Unity tokens are special: they convert a pure-affinity
//! aura into a unity aura instead, preserving its rank on the side it came from.
//!
//! Rank-1 tokens recharge after use; everything else discharges permanently.

use crate::config::{
    HOSTILE_ENVIRONMENT_LEVEL, LVLUP_TOKEN_BROADCAST_COUNTDOWN, LVLUP_TOKEN_RSSI_THRESHOLD,
};
use crate::info::{pack_unity_level, split_unity_level, Affinity, DeviceInfo, Mode};
use crate::led::{Led, LedState, Leds};
use crate::node::Outbound;
use crate::radio::AdvInterval;
use crate::utils::HexSlice;
use crate::wire::MeshAdv;

/// A latched level-up, waiting to be broadcast.
#[derive(Debug, Copy, Clone)]
struct Grant {
    mac: [u8; 6],
    info: DeviceInfo,
}

/// Working state of a level-up token.
#[derive(Debug)]
pub struct TokenState {
    grant: Option<Grant>,
    countdown: u8,
}

impl TokenState {
    /// Enters token mode: charged, green lit, slow cadence.
    pub fn init(info: &DeviceInfo, out: &mut Outbound, leds: &mut impl Leds) -> TokenState {
        out.set_mesh(info, 1);
        out.set_interval(AdvInterval::Slow);
        leds.set_state(Led::Green, LedState::On);
        TokenState {
            grant: None,
            countdown: 0,
        }
    }

    /// Considers an aura for the token's one grant.
    pub fn on_mesh(&mut self, info: &DeviceInfo, mac: &[u8; 6], rssi: i8, adv: &MeshAdv) {
        if rssi < LVLUP_TOKEN_RSSI_THRESHOLD {
            return;
        }
        if self.grant.is_some() {
            return;
        }
        if adv.info.mode != Mode::Aura {
            return;
        }

        // a unity token converts pure-affinity auras instead of ranking them up
        if info.affinity == Affinity::Unity && adv.info.affinity != Affinity::Unity {
            let mut level = adv.info.level;
            if level >= HOSTILE_ENVIRONMENT_LEVEL {
                // a unity aura cannot be hostile; settle for the top regular rank
                level = HOSTILE_ENVIRONMENT_LEVEL - 1;
            }
            let level = match adv.info.affinity {
                Affinity::Magic => pack_unity_level(level, 0),
                Affinity::Techno => pack_unity_level(0, level),
                _ => return,
            };
            self.accept(mac, unity_aura(level));
            return;
        }

        let current = if adv.info.affinity == Affinity::Unity {
            split_unity_level(adv.info.level, info.affinity)
        } else if adv.info.affinity == info.affinity {
            adv.info.level
        } else {
            return;
        };

        // only the rank directly below the token's qualifies
        if info.level == 0 || current != info.level - 1 {
            return;
        }

        let target = if adv.info.affinity == Affinity::Unity {
            let level = match info.affinity {
                Affinity::Magic => pack_unity_level(
                    info.level,
                    split_unity_level(adv.info.level, Affinity::Techno),
                ),
                Affinity::Techno => pack_unity_level(
                    split_unity_level(adv.info.level, Affinity::Magic),
                    info.level,
                ),
                _ => {
                    // unity token meeting a unity aura: raise the dominant side,
                    // keep the other
                    let magic = split_unity_level(adv.info.level, Affinity::Magic);
                    let techno = split_unity_level(adv.info.level, Affinity::Techno);
                    if magic >= techno {
                        pack_unity_level(info.level, techno)
                    } else {
                        pack_unity_level(magic, info.level)
                    }
                }
            };
            unity_aura(level)
        } else {
            DeviceInfo {
                mode: Mode::Aura,
                affinity: adv.info.affinity,
                level: info.level,
                dynamic_rssi_threshold: 0,
            }
        };
        self.accept(mac, target);
    }

    fn accept(&mut self, mac: &[u8; 6], target: DeviceInfo) {
        info!("level-up latched for {:?}", HexSlice(*mac));
        self.grant = Some(Grant { mac: *mac, info: target });
        self.countdown = LVLUP_TOKEN_BROADCAST_COUNTDOWN;
    }

    pub fn end_of_cycle(&mut self, info: &DeviceInfo, out: &mut Outbound, leds: &mut impl Leds) {
        let grant = match self.grant {
            Some(grant) => grant,
            None => return,
        };
        match self.countdown {
            3 => {
                out.set_master(&grant.mac, &grant.info);
                out.set_interval(AdvInterval::Fast);
                leds.set_state(Led::Green, LedState::BlinkFast);
                self.countdown = 2;
            }
            1 => {
                if info.level == 1 {
                    // rank-1 tokens recharge instead of expiring
                    out.set_mesh_with_target(info, 1, &grant.mac);
                    leds.set_state(Led::Green, LedState::On);
                    self.grant = None;
                } else {
                    out.set_mesh_with_target(info, 0, &grant.mac);
                    leds.set_state(Led::Green, LedState::Off);
                    leds.set_state(Led::Red, LedState::BlinkOnce);
                }
                out.set_interval(AdvInterval::Slow);
                self.countdown = 0;
            }
            0 => {}
            _ => self.countdown -= 1,
        }
    }
}

fn unity_aura(level: u8) -> DeviceInfo {
    DeviceInfo {
        mode: Mode::Aura,
        affinity: Affinity::Unity,
        level,
        dynamic_rssi_threshold: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::ByteReader;
    use crate::bytes::FromBytes;
    use crate::led::testing::RecordingLeds;
    use crate::wire::{MasterAdv, MESH_ADV_LEN};

    fn token(affinity: Affinity, level: u8) -> DeviceInfo {
        DeviceInfo {
            mode: Mode::LvlupToken,
            affinity,
            level,
            dynamic_rssi_threshold: 0,
        }
    }

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

    const PEER: [u8; 6] = [0xAA, 1, 2, 3, 4, 0xC5];

    struct Rig {
        info: DeviceInfo,
        out: Outbound,
        leds: RecordingLeds,
        state: TokenState,
    }

    impl Rig {
        fn new(info: DeviceInfo) -> Rig {
            let mut out = Outbound::new();
            let mut leds = RecordingLeds::new();
            let state = TokenState::init(&info, &mut out, &mut leds);
            Rig {
                info,
                out,
                leds,
                state,
            }
        }

        fn offer(&mut self, adv: &MeshAdv) {
            self.state.on_mesh(&self.info, &PEER, -30, adv);
        }

        fn end_of_cycle(&mut self) {
            self.state
                .end_of_cycle(&self.info, &mut self.out, &mut self.leds);
        }
    }

    #[test]
    fn grants_to_the_rank_below() {
        let mut rig = Rig::new(token(Affinity::Magic, 2));
        rig.offer(&aura(Affinity::Magic, 1));

        rig.end_of_cycle();
        let master = MasterAdv::from_bytes(&mut ByteReader::new(rig.out.data())).unwrap();
        assert_eq!(master.target, PEER);
        assert_eq!(
            master.info,
            DeviceInfo {
                mode: Mode::Aura,
                affinity: Affinity::Magic,
                level: 2,
                dynamic_rssi_threshold: 0,
            }
        );
        assert_eq!(rig.out.interval(), AdvInterval::Fast);
        assert_eq!(rig.leds.state(Led::Green), LedState::BlinkFast);
    }

    #[test]
    fn rejects_wrong_ranks_and_affinities() {
        let mut rig = Rig::new(token(Affinity::Magic, 2));
        rig.offer(&aura(Affinity::Magic, 2));
        rig.offer(&aura(Affinity::Magic, 0));
        rig.offer(&aura(Affinity::Techno, 1));
        assert!(rig.state.grant.is_none());

        // non-aura peers never qualify
        let mut device = aura(Affinity::Magic, 1);
        device.info.mode = Mode::Device;
        rig.offer(&device);
        assert!(rig.state.grant.is_none());
    }

    #[test]
    fn rejects_distant_auras() {
        let mut rig = Rig::new(token(Affinity::Magic, 2));
        rig.state
            .on_mesh(&rig.info, &PEER, LVLUP_TOKEN_RSSI_THRESHOLD - 1, &aura(Affinity::Magic, 1));
        assert!(rig.state.grant.is_none());
    }

    #[test]
    fn first_latch_wins() {
        let mut rig = Rig::new(token(Affinity::Magic, 2));
        rig.offer(&aura(Affinity::Magic, 1));
        let first = rig.state.grant.unwrap().mac;

        let other = [9; 6];
        rig.state
            .on_mesh(&rig.info, &other, -20, &aura(Affinity::Magic, 1));
        assert_eq!(rig.state.grant.unwrap().mac, first);
    }

    #[test]
    fn countdown_broadcasts_then_discharges() {
        let mut rig = Rig::new(token(Affinity::Magic, 2));
        rig.offer(&aura(Affinity::Magic, 1));

        // countdown 3: master broadcast at fast cadence
        rig.end_of_cycle();
        assert_eq!(rig.out.data()[..2], [0xAB, 0xAC]);

        // countdown 2: dwell, the master frame keeps broadcasting
        rig.end_of_cycle();
        assert_eq!(rig.out.data()[..2], [0xAB, 0xAC]);

        // countdown 1: discharge, mesh frame with the target appended
        rig.end_of_cycle();
        assert_eq!(rig.out.data().len(), MESH_ADV_LEN + 6);
        assert_eq!(rig.out.data()[..2], [0xCE, 0xFA]);
        assert_eq!(rig.out.data()[3] & 0x0F, 0);
        assert_eq!(&rig.out.data()[MESH_ADV_LEN..], &PEER);
        assert_eq!(rig.out.interval(), AdvInterval::Slow);
        assert_eq!(rig.leds.state(Led::Green), LedState::Off);

        // discharged for good: quiescent, no further latches
        rig.end_of_cycle();
        rig.offer(&aura(Affinity::Magic, 1));
        assert!(matches!(rig.state.grant, Some(_)));
        assert_eq!(rig.state.countdown, 0);
    }

    #[test]
    fn rank_one_tokens_recharge() {
        let mut rig = Rig::new(token(Affinity::Magic, 1));
        rig.offer(&aura(Affinity::Magic, 0));

        rig.end_of_cycle();
        rig.end_of_cycle();
        rig.end_of_cycle();
        assert_eq!(rig.out.data().len(), MESH_ADV_LEN + 6);
        assert_eq!(rig.out.data()[3] & 0x0F, 1, "recharged, not discharged");
        assert_eq!(rig.leds.state(Led::Green), LedState::On);

        // and it can latch again
        rig.offer(&aura(Affinity::Magic, 0));
        assert!(rig.state.grant.is_some());
        assert_eq!(rig.state.countdown, 3);
    }

    #[test]
    fn unity_token_converts_pure_auras() {
        let mut rig = Rig::new(token(Affinity::Unity, 2));
        rig.offer(&aura(Affinity::Techno, 2));
        let grant = rig.state.grant.unwrap();
        assert_eq!(
            grant.info,
            DeviceInfo {
                mode: Mode::Aura,
                affinity: Affinity::Unity,
                level: pack_unity_level(0, 2),
                dynamic_rssi_threshold: 0,
            }
        );
    }

    #[test]
    fn unity_conversion_clamps_hostile_broadcasters() {
        let mut rig = Rig::new(token(Affinity::Unity, 2));
        rig.offer(&aura(Affinity::Magic, HOSTILE_ENVIRONMENT_LEVEL));
        let grant = rig.state.grant.unwrap();
        assert_eq!(
            grant.info.level,
            pack_unity_level(HOSTILE_ENVIRONMENT_LEVEL - 1, 0)
        );
    }

    #[test]
    fn unity_aura_keeps_its_other_side() {
        // magic token at rank 3; unity aura with magic rank 2, techno rank 1
        let mut rig = Rig::new(token(Affinity::Magic, 3));
        rig.offer(&aura(Affinity::Unity, pack_unity_level(2, 1)));
        let grant = rig.state.grant.unwrap();
        assert_eq!(grant.info.affinity, Affinity::Unity);
        assert_eq!(grant.info.level, pack_unity_level(3, 1));
    }

    #[test]
    fn unity_token_raises_a_unity_auras_dominant_side() {
        let mut rig = Rig::new(token(Affinity::Unity, 3));
        rig.offer(&aura(Affinity::Unity, pack_unity_level(2, 1)));
        let grant = rig.state.grant.unwrap();
        assert_eq!(grant.info.level, pack_unity_level(3, 1));
    }
}
