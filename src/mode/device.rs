//! The switched-device role.
//!
//! A device derives its output from the stable auras around it. At end of cycle the
//! established peers are tallied into friendly and hostile columns per level, and the highest
//! populated level decides: friends hold the output on (ties included), foes force it off.
//! Devices of level 0 default to on when nobody is around; higher-level devices default off
//! and need friendly presence to switch on.
//!
//! An overseer in range takes precedence over all of that. The device locks onto the
//! strongest overseer it hears, and once the lock has survived its own detection hysteresis
//! the overseer's commanded state replaces the peer-derived one until the lock ages out.

use crate::config::{
    HOSTILE_ENVIRONMENT_LEVEL, OVERSEER_DETECTION_THRESHOLD, OVERSEER_MISS_THRESHOLD,
};
use crate::info::{DeviceInfo, Mode};
use crate::led::{Led, LedState, Leds};
use crate::node::Outbound;
use crate::peer::PeerTable;
use crate::radio::AdvInterval;
use crate::utils::HexSlice;
use crate::wire::MeshAdv;

/// Overseer lock tracked by a device.
///
/// Runs the same detect/miss hysteresis as the peer table, but for a single MAC-locked
/// overseer: the commanded state only takes effect after [`OVERSEER_DETECTION_THRESHOLD`]
/// consecutive cycles, and a lock survives up to [`OVERSEER_MISS_THRESHOLD`] silent cycles.
///
/// [`OVERSEER_DETECTION_THRESHOLD`]: ../../config/constant.OVERSEER_DETECTION_THRESHOLD.html
/// [`OVERSEER_MISS_THRESHOLD`]: ../../config/constant.OVERSEER_MISS_THRESHOLD.html
#[derive(Debug)]
pub struct OverseerTracker {
    /// Strongest overseer heard, by RSSI. Not reset between cycles, which dampens takeovers
    /// by briefly-louder newcomers.
    observed_mac: [u8; 6],
    rssi: i8,
    commanded: u8,
    detected_this_cycle: bool,
    tracked_mac: [u8; 6],
    stability: i8,
    in_use: bool,
}

impl OverseerTracker {
    fn new() -> Self {
        OverseerTracker {
            observed_mac: [0; 6],
            rssi: i8::MIN,
            commanded: 0,
            detected_this_cycle: false,
            tracked_mac: [0; 6],
            stability: 0,
            in_use: false,
        }
    }

    /// Whether the lock currently overrides peer-derived output.
    pub fn in_use(&self) -> bool {
        self.in_use
    }

    /// The commanded state cached from the last admitted frame.
    pub fn commanded(&self) -> u8 {
        self.commanded
    }

    /// Receive-path admission: keeps the strongest overseer seen and caches its command.
    pub fn observe(&mut self, mac: &[u8; 6], rssi: i8, commanded: u8) {
        if rssi > self.rssi || self.observed_mac == *mac {
            self.observed_mac = *mac;
            self.rssi = rssi;
            self.detected_this_cycle = true;
            self.commanded = commanded;
        }
    }

    fn age(&mut self) {
        if self.stability > 0 {
            self.stability = -1;
        } else {
            self.stability -= 1;
        }
        if self.stability <= -OVERSEER_MISS_THRESHOLD {
            if self.in_use {
                info!("overseer lock lost");
            }
            self.in_use = false;
            self.tracked_mac = [0; 6];
            self.rssi = i8::MIN;
        }
    }

    /// End-of-cycle bookkeeping for the lock.
    fn track(&mut self) {
        if !self.detected_this_cycle {
            self.age();
            return;
        }
        self.detected_this_cycle = false;

        if self.observed_mac == self.tracked_mac {
            if self.stability < 0 {
                self.stability = 1;
            } else if self.stability < OVERSEER_DETECTION_THRESHOLD {
                self.stability += 1;
                if self.stability >= OVERSEER_DETECTION_THRESHOLD {
                    info!("overseer lock on {:?}", HexSlice(self.tracked_mac));
                    self.in_use = true;
                }
            }
            return;
        }

        // a different overseer than the tracked one; age the lock, and if that
        // released it, start over on the newcomer
        self.age();
        if !self.in_use {
            self.tracked_mac = self.observed_mac;
            self.stability = 1;
        }
    }
}

/// Working state of a switched device.
#[derive(Debug)]
pub struct DeviceState {
    is_on: bool,
    pub overseer: OverseerTracker,
}

impl DeviceState {
    /// Enters device mode. Level-0 devices are default-on, everyone else default-off.
    pub fn init(info: &DeviceInfo, out: &mut Outbound, leds: &mut impl Leds) -> DeviceState {
        let on = info.level == 0;
        leds.set_state(
            Led::Green,
            if on { LedState::On } else { LedState::BlinkOnce },
        );
        leds.set_state(Led::Output, LedState::from(on));
        out.set_mesh(info, on as u8);
        out.set_interval(AdvInterval::Slow);
        DeviceState {
            is_on: on,
            overseer: OverseerTracker::new(),
        }
    }

    /// Whether the output line is currently driven.
    pub fn is_on(&self) -> bool {
        self.is_on
    }

    /// Observes active auras into the peer table, subject to the dynamic RSSI gate.
    pub fn on_mesh(
        info: &DeviceInfo,
        peers: &mut PeerTable,
        mac: &[u8; 6],
        rssi: i8,
        adv: &MeshAdv,
    ) {
        if adv.info.mode != Mode::Aura || adv.state == 0 {
            return;
        }
        if !info.passes_rssi_gate(rssi) {
            return;
        }
        peers.observe(mac, adv.info.affinity, adv.info.level);
    }

    pub fn end_of_cycle(
        &mut self,
        info: &DeviceInfo,
        peers: &mut PeerTable,
        out: &mut Outbound,
        leds: &mut impl Leds,
    ) {
        peers.age();
        self.overseer.track();

        let mut suppressed = false;
        let new_on = if self.overseer.in_use() {
            self.overseer.commanded() != 0
        } else {
            let tally = peers.tally_for_device(info.affinity);
            let mut on = info.level == 0;
            for level in (info.level..=HOSTILE_ENVIRONMENT_LEVEL).rev() {
                let at = usize::from(level);
                let (friendly, hostile) = (tally.friendly[at], tally.hostile[at]);
                if friendly == 0 && hostile == 0 {
                    continue;
                }
                if friendly >= hostile {
                    on = true;
                } else {
                    on = false;
                    suppressed = true;
                }
                break;
            }
            on
        };

        if new_on != self.is_on {
            debug!("output {} -> {}", self.is_on, new_on);
            self.is_on = new_on;
            leds.set_state(
                Led::Green,
                if new_on { LedState::On } else { LedState::BlinkOnce },
            );
            leds.set_state(Led::Output, LedState::from(new_on));
            leds.set_state(
                Led::Red,
                if suppressed { LedState::On } else { LedState::Off },
            );
            out.set_mesh(info, new_on as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RSSI_THRESHOLD;
    use crate::info::Affinity;
    use crate::led::testing::RecordingLeds;

    fn magic_device(level: u8) -> DeviceInfo {
        DeviceInfo {
            mode: Mode::Device,
            affinity: Affinity::Magic,
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

    fn mac(n: u8) -> [u8; 6] {
        [n, 0, 0, 0, 0, 0x20]
    }

    struct Rig {
        info: DeviceInfo,
        peers: PeerTable,
        out: Outbound,
        leds: RecordingLeds,
        state: DeviceState,
    }

    impl Rig {
        fn new(info: DeviceInfo) -> Rig {
            let mut out = Outbound::new();
            let mut leds = RecordingLeds::new();
            let state = DeviceState::init(&info, &mut out, &mut leds);
            Rig {
                info,
                peers: PeerTable::new(),
                out,
                leds,
                state,
            }
        }

        fn cycle(&mut self, observed: &[([u8; 6], MeshAdv)]) {
            for (mac, adv) in observed {
                DeviceState::on_mesh(&self.info, &mut self.peers, mac, RSSI_THRESHOLD, adv);
            }
            self.state
                .end_of_cycle(&self.info, &mut self.peers, &mut self.out, &mut self.leds);
        }
    }

    #[test]
    fn level_zero_defaults_on() {
        let mut rig = Rig::new(magic_device(0));
        assert!(rig.state.is_on());
        rig.cycle(&[]);
        assert!(rig.state.is_on());

        let rig = Rig::new(magic_device(2));
        assert!(!rig.state.is_on());
    }

    #[test]
    fn friendly_majority_keeps_the_output_on() {
        let mut rig = Rig::new(magic_device(0));
        let field = [
            (mac(1), aura(Affinity::Magic, 2)),
            (mac(2), aura(Affinity::Magic, 2)),
            (mac(3), aura(Affinity::Magic, 2)),
            (mac(4), aura(Affinity::Techno, 2)),
            (mac(5), aura(Affinity::Techno, 2)),
        ];
        for _ in 0..3 {
            rig.cycle(&field);
        }
        assert!(rig.state.is_on());
        assert_eq!(rig.out.data()[3] & 0x0F, 1);
    }

    #[test]
    fn hostile_majority_suppresses() {
        let mut rig = Rig::new(magic_device(0));
        let field = [
            (mac(1), aura(Affinity::Magic, 2)),
            (mac(4), aura(Affinity::Techno, 2)),
            (mac(5), aura(Affinity::Techno, 2)),
        ];
        for _ in 0..3 {
            rig.cycle(&field);
        }
        assert!(!rig.state.is_on());
        assert_eq!(rig.leds.state(Led::Red), LedState::On);
        assert_eq!(rig.leds.state(Led::Output), LedState::Off);
        assert_eq!(rig.out.data()[3] & 0x0F, 0);
    }

    #[test]
    fn highest_populated_level_decides() {
        // friends dominate level 1, but a lone hostile at level 3 outranks them
        let mut rig = Rig::new(magic_device(0));
        let field = [
            (mac(1), aura(Affinity::Magic, 1)),
            (mac(2), aura(Affinity::Magic, 1)),
            (mac(3), aura(Affinity::Techno, 3)),
        ];
        for _ in 0..3 {
            rig.cycle(&field);
        }
        assert!(!rig.state.is_on());
    }

    #[test]
    fn levels_below_own_are_invisible() {
        // a level-2 device ignores the squabble at level 1
        let mut rig = Rig::new(magic_device(2));
        let field = [
            (mac(1), aura(Affinity::Techno, 1)),
            (mac(2), aura(Affinity::Techno, 1)),
        ];
        for _ in 0..3 {
            rig.cycle(&field);
        }
        assert!(!rig.state.is_on());
        // but a friend at its own level switches it on
        let field = [(mac(3), aura(Affinity::Magic, 2))];
        for _ in 0..3 {
            rig.cycle(&field);
        }
        assert!(rig.state.is_on());
    }

    #[test]
    fn unestablished_peers_do_not_flip_the_output() {
        let mut rig = Rig::new(magic_device(0));
        rig.cycle(&[(mac(4), aura(Affinity::Techno, 2))]);
        assert!(rig.state.is_on(), "one sighting must not suppress");
    }

    #[test]
    fn dynamic_rssi_gate_filters_peers() {
        let mut rig = Rig::new(DeviceInfo {
            dynamic_rssi_threshold: -50,
            ..magic_device(0)
        });
        for _ in 0..3 {
            DeviceState::on_mesh(
                &rig.info,
                &mut rig.peers,
                &mac(1),
                -60,
                &aura(Affinity::Techno, 2),
            );
            rig.state
                .end_of_cycle(&rig.info, &mut rig.peers, &mut rig.out, &mut rig.leds);
        }
        assert!(rig.peers.is_empty());
        assert!(rig.state.is_on());
    }

    #[test]
    fn overseer_lock_engages_after_three_cycles() {
        let mut rig = Rig::new(magic_device(2));
        for cycle in 1..=3 {
            rig.state.overseer.observe(&mac(9), -40, 1);
            rig.cycle(&[]);
            assert_eq!(rig.state.overseer.in_use(), cycle >= 3, "cycle {}", cycle);
        }
        // commanded on overrides the default-off of a level-2 device
        assert!(rig.state.is_on());
    }

    #[test]
    fn overseer_command_overrides_peer_majority() {
        let mut rig = Rig::new(magic_device(0));
        let friends = [
            (mac(1), aura(Affinity::Magic, 2)),
            (mac(2), aura(Affinity::Magic, 2)),
        ];
        for _ in 0..3 {
            rig.state.overseer.observe(&mac(9), -40, 0);
            rig.cycle(&friends);
        }
        assert!(rig.state.overseer.in_use());
        assert!(!rig.state.is_on(), "commanded off beats friendly majority");
        // suppression indication is reserved for peer-derived decisions
        assert_eq!(rig.leds.state(Led::Red), LedState::Off);
    }

    #[test]
    fn overseer_lock_ages_out_after_six_quiet_cycles() {
        let mut rig = Rig::new(magic_device(0));
        for _ in 0..3 {
            rig.state.overseer.observe(&mac(9), -40, 0);
            rig.cycle(&[]);
        }
        assert!(!rig.state.is_on());

        for cycle in 1..=6 {
            rig.cycle(&[]);
            assert_eq!(rig.state.overseer.in_use(), cycle < 6, "cycle {}", cycle);
        }
        // with the lock gone, a level-0 device reverts to default-on
        assert!(rig.state.is_on());
    }

    #[test]
    fn weaker_overseers_cannot_steal_the_lock() {
        let mut rig = Rig::new(magic_device(0));
        for _ in 0..3 {
            rig.state.overseer.observe(&mac(9), -40, 0);
            rig.cycle(&[]);
        }
        assert!(rig.state.overseer.in_use());

        // a weaker overseer is not even admitted as the cycle's strongest
        rig.state.overseer.observe(&mac(8), -60, 1);
        rig.cycle(&[]);
        assert!(rig.state.overseer.in_use());
        assert_eq!(rig.state.overseer.commanded(), 0);
        assert_eq!(rig.state.overseer.tracked_mac, mac(9));
    }

    #[test]
    fn stronger_overseer_takes_over_once_the_lock_drops() {
        let mut rig = Rig::new(magic_device(0));
        for _ in 0..3 {
            rig.state.overseer.observe(&mac(9), -40, 0);
            rig.cycle(&[]);
        }

        // a louder newcomer displaces the old lock only after aging it out
        for _ in 0..6 {
            rig.state.overseer.observe(&mac(8), -30, 1);
            rig.cycle(&[]);
        }
        assert!(!rig.state.overseer.in_use());
        assert_eq!(rig.state.overseer.tracked_mac, mac(8));

        for _ in 0..2 {
            rig.state.overseer.observe(&mac(8), -30, 1);
            rig.cycle(&[]);
        }
        assert!(rig.state.overseer.in_use());
        assert_eq!(rig.state.overseer.commanded(), 1);
    }
}
