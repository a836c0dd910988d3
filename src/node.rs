//! The protocol engine.
//!
//! A [`Node`] bundles everything the protocol mutates (identity, configuration, peer table,
//! the current role's state and the outbound advertisement) into one value that the cycle
//! driver owns. Received frames enter through [`on_report`]; the cycle driver calls
//! [`end_of_cycle`] between scan windows and [`set_mode`] whenever a master command asked for
//! re-initialization.
//!
//! The receive path only does table lookups and bit arithmetic. In particular, a master
//! command is applied to the in-memory configuration immediately but persisted by the cycle
//! driver at the next cycle boundary, never from the receive path itself.
//!
//! [`Node`]: struct.Node.html
//! [`on_report`]: struct.Node.html#method.on_report
//! [`end_of_cycle`]: struct.Node.html#method.end_of_cycle
//! [`set_mode`]: struct.Node.html#method.set_mode

use crate::bytes::{ByteWriter, ToBytes};
use crate::config::{BLINK_INTERVAL, RSSI_THRESHOLD, STARTUP_DELAY};
use crate::info::{DeviceInfo, Mode};
use crate::led::{Led, LedState, Leds};
use crate::mode::{AuraState, DeviceState, ModeState, OverseerState, TokenState};
use crate::peer::PeerTable;
use crate::radio::{AdvInterval, Report};
use crate::wire::{self, MasterAdv, MeshAdv, OverseerAdv, Packet};
use crate::DeviceAddress;

/// The frame the node is currently broadcasting, plus its cadence.
pub struct Outbound {
    data: heapless::Vec<u8, 16>,
    interval: AdvInterval,
}

impl Outbound {
    pub(crate) fn new() -> Self {
        Outbound {
            data: heapless::Vec::new(),
            interval: AdvInterval::Slow,
        }
    }

    /// The manufacturer-data payload to broadcast.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The advertising cadence to broadcast at.
    pub fn interval(&self) -> AdvInterval {
        self.interval
    }

    pub(crate) fn set_interval(&mut self, interval: AdvInterval) {
        self.interval = interval;
    }

    pub(crate) fn set_mesh(&mut self, info: &DeviceInfo, state: u8) {
        self.encode(&MeshAdv::new(*info, state));
    }

    /// A mesh frame with a peer address appended; used by tokens to name the
    /// aura they just granted a level-up to.
    pub(crate) fn set_mesh_with_target(&mut self, info: &DeviceInfo, state: u8, mac: &[u8; 6]) {
        self.set_mesh(info, state);
        self.data
            .extend_from_slice(mac)
            .expect("advertisement buffer overflow");
    }

    pub(crate) fn set_master(&mut self, target: &[u8; 6], info: &DeviceInfo) {
        self.encode(&MasterAdv {
            target: *target,
            info: *info,
        });
    }

    pub(crate) fn set_overseer(&mut self, adv: &OverseerAdv) {
        self.encode(adv);
    }

    fn encode(&mut self, value: &impl ToBytes) {
        let mut buf = [0; 16];
        let mut writer = ByteWriter::new(&mut buf);
        value
            .to_bytes(&mut writer)
            .expect("advertisement buffer overflow");
        let used = writer.used();
        self.data.clear();
        self.data
            .extend_from_slice(&buf[..used])
            .expect("advertisement buffer overflow");
    }
}

/// All protocol state of one mesh node.
pub struct Node {
    info: DeviceInfo,
    addr: DeviceAddress,
    peers: PeerTable,
    state: ModeState,
    outbound: Outbound,
    mode_changed: bool,
}

impl Node {
    /// Creates a node that has not entered its mode yet; call [`set_mode`] before cycling.
    ///
    /// [`set_mode`]: #method.set_mode
    pub fn new(info: DeviceInfo, addr: DeviceAddress) -> Node {
        Node {
            info,
            addr,
            peers: PeerTable::new(),
            state: ModeState::None,
            outbound: Outbound::new(),
            mode_changed: false,
        }
    }

    /// The node's current configuration.
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// The node's identity address.
    pub fn addr(&self) -> &DeviceAddress {
        &self.addr
    }

    /// The frame currently being broadcast.
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Whether a master command requested re-initialization.
    ///
    /// The cycle driver persists the new configuration and calls [`set_mode`] when this is
    /// set after an end-of-cycle pass.
    ///
    /// [`set_mode`]: #method.set_mode
    pub fn mode_changed(&self) -> bool {
        self.mode_changed
    }

    /// (Re-)initializes the configured mode: startup blink, fresh peer table, fresh mode
    /// state, fresh outbound frame.
    ///
    /// Blocks for the startup blink, so this must only be called from the main loop.
    pub fn set_mode(&mut self, leds: &mut impl Leds) {
        info!("entering mode {:?}", self.info.mode);
        leds.set_state(Led::Board, LedState::BlinkFast);
        leds.set_state(Led::Green, LedState::BlinkFast);
        leds.set_state(Led::Red, LedState::BlinkFast);
        leds.operate(STARTUP_DELAY, BLINK_INTERVAL);
        leds.set_state(Led::Board, LedState::Off);
        leds.set_state(Led::Green, LedState::Off);
        leds.set_state(Led::Red, LedState::Off);

        self.peers.clear();
        self.state = match self.info.mode {
            Mode::Aura => ModeState::Aura(AuraState::init(&self.info, &mut self.outbound, leds)),
            Mode::Device => {
                ModeState::Device(DeviceState::init(&self.info, &mut self.outbound, leds))
            }
            Mode::LvlupToken => {
                ModeState::LvlupToken(TokenState::init(&self.info, &mut self.outbound, leds))
            }
            Mode::Overseer => {
                ModeState::Overseer(OverseerState::init(&self.peers, &mut self.outbound, leds))
            }
            Mode::None | Mode::Unknown(_) => {
                // idle heartbeat
                leds.set_state(Led::Green, LedState::BlinkOnce);
                leds.set_state(Led::Red, LedState::BlinkOnce);
                self.outbound.set_mesh(&self.info, 0);
                self.outbound.set_interval(AdvInterval::Slow);
                ModeState::None
            }
        };
        self.mode_changed = false;
    }

    /// Feeds one received advertising report into the protocol.
    ///
    /// Safe to call from the radio's delivery context: no I/O, no blocking.
    pub fn on_report(&mut self, report: &Report) {
        if report.rssi < RSSI_THRESHOLD {
            return;
        }
        let data = match wire::manufacturer_data(report.data()) {
            Some(data) => data,
            None => return,
        };
        let mac = *report.addr.raw();
        match Packet::decode(data) {
            Some(Packet::Mesh(adv)) => self.on_mesh(&mac, report.rssi, &adv),
            Some(Packet::Master(adv)) => self.on_master(&adv),
            Some(Packet::Overseer(adv)) => self.on_overseer(&mac, report.rssi, &adv),
            None => {}
        }
    }

    fn on_mesh(&mut self, mac: &[u8; 6], rssi: i8, adv: &MeshAdv) {
        let Node {
            state,
            info,
            peers,
            ..
        } = self;
        match state {
            ModeState::None => {}
            ModeState::Aura(aura) => aura.on_mesh(info, adv),
            ModeState::Device(_) => DeviceState::on_mesh(info, peers, mac, rssi, adv),
            ModeState::LvlupToken(token) => token.on_mesh(info, mac, rssi, adv),
            ModeState::Overseer(_) => OverseerState::on_mesh(peers, mac, adv),
        }
    }

    fn on_master(&mut self, adv: &MasterAdv) {
        if adv.target != *self.addr.raw() {
            return;
        }
        if adv.info.validate().is_err() {
            debug!("master command rejected: {:?}", adv.info);
            return;
        }
        if adv.info != self.info {
            info!("master command accepted: {:?}", adv.info);
            self.info = adv.info;
            self.mode_changed = true;
        }
    }

    fn on_overseer(&mut self, mac: &[u8; 6], rssi: i8, adv: &OverseerAdv) {
        // only devices obey overseers; everyone else watches the field themselves
        if let ModeState::Device(device) = &mut self.state {
            if !self.info.passes_rssi_gate(rssi) {
                return;
            }
            let commanded = adv.commanded(self.info.affinity, self.info.level);
            device.overseer.observe(mac, rssi, commanded);
        }
    }

    /// Runs the current mode's end-of-cycle pass.
    pub fn end_of_cycle(&mut self, leds: &mut impl Leds) {
        let Node {
            state,
            info,
            peers,
            outbound,
            ..
        } = self;
        match state {
            ModeState::None => {}
            ModeState::Aura(aura) => aura.end_of_cycle(info, outbound, leds),
            ModeState::Device(device) => device.end_of_cycle(info, peers, outbound, leds),
            ModeState::LvlupToken(token) => token.end_of_cycle(info, outbound, leds),
            ModeState::Overseer(overseer) => overseer.end_of_cycle(peers, outbound),
        }
    }

    #[cfg(test)]
    pub(crate) fn peers(&self) -> &PeerTable {
        &self.peers
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> &ModeState {
        &self.state
    }
}
