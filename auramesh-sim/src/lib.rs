//! In-memory drivers and a simulated RF field for running auramesh nodes on a host.
//!
//! Each simulated node owns real protocol state (the same [`Node`], driven by the same
//! [`cycle::run_cycle`] a device build would use) behind in-memory implementations of the
//! radio, store and LED interfaces. The [`Field`] steps all nodes through global cycles,
//! delivering every node's on-air frame to every receiver in range with a distance-derived
//! RSSI and optional per-link loss.
//!
//! Cycles are virtual: the LED driver returns immediately instead of sleeping, so thousands
//! of cycles run in milliseconds.
//!
//! [`Node`]: ../auramesh/node/struct.Node.html
//! [`cycle::run_cycle`]: ../auramesh/cycle/fn.run_cycle.html
//! [`Field`]: struct.Field.html

use std::collections::{HashMap, VecDeque};

use auramesh::cycle;
use auramesh::info::{DeviceInfo, Mode};
use auramesh::led::{Led, LedState, Leds};
use auramesh::radio::{AdvInterval, Radio, Report};
use auramesh::store::{Store, DEVICE_INFO_RECORD};
use auramesh::time::Duration;
use auramesh::{DeviceAddress, Error, Node};
use log::trace;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// A radio whose air interface is a queue filled by the [`Field`].
///
/// [`Field`]: struct.Field.html
#[derive(Default)]
pub struct SimRadio {
    queue: VecDeque<Report>,
    /// The payload most recently handed to `adv_start`; this is what the field
    /// delivers to neighbours.
    advertised: Option<(AdvInterval, Vec<u8>)>,
}

impl SimRadio {
    /// Queues a frame for delivery to this node's next scan window.
    pub fn inject(&mut self, report: Report) {
        self.queue.push_back(report);
    }

    /// The frame this node currently has on the air, if any.
    pub fn on_air(&self) -> Option<&[u8]> {
        self.advertised.as_ref().map(|(_, data)| data.as_slice())
    }
}

impl Radio for SimRadio {
    fn enable(&mut self, _identity: &DeviceAddress) -> Result<(), Error> {
        Ok(())
    }

    fn scan_start(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn scan_stop(&mut self) {}

    fn adv_start(&mut self, interval: AdvInterval, data: &[u8]) -> Result<(), Error> {
        self.advertised = Some((interval, data.to_vec()));
        Ok(())
    }

    fn adv_stop(&mut self) {}

    fn poll_report(&mut self) -> Option<Report> {
        self.queue.pop_front()
    }
}

/// A key-value store backed by a map.
#[derive(Default)]
pub struct SimStore {
    records: HashMap<u16, Vec<u8>>,
}

impl Store for SimStore {
    fn read(&mut self, id: u16, buf: &mut [u8]) -> Result<usize, Error> {
        let record = self.records.get(&id).ok_or(Error::NotFound)?;
        let len = record.len().min(buf.len());
        buf[..len].copy_from_slice(&record[..len]);
        Ok(len)
    }

    fn write(&mut self, id: u16, data: &[u8]) -> Result<(), Error> {
        self.records.insert(id, data.to_vec());
        Ok(())
    }
}

/// An LED driver that records states and treats all waits as instantaneous.
pub struct SimLeds {
    states: [LedState; 4],
}

impl SimLeds {
    fn new() -> Self {
        SimLeds {
            states: [LedState::Off; 4],
        }
    }

    pub fn state(&self, led: Led) -> LedState {
        self.states[led as usize]
    }
}

impl Leds for SimLeds {
    fn set_state(&mut self, led: Led, state: LedState) {
        self.states[led as usize] = state;
    }

    fn operate(&mut self, _total: Duration, _blink: Duration) {
        // virtual time; the field steps whole cycles
    }
}

/// One simulated node: protocol state plus its drivers and a position.
pub struct SimNode {
    pub node: Node,
    pub radio: SimRadio,
    pub store: SimStore,
    pub leds: SimLeds,
    rng: SmallRng,
    /// Position on the field, in metres.
    pub pos: (f64, f64),
}

impl SimNode {
    /// Whether the device output line is driven.
    pub fn output_on(&self) -> bool {
        self.leds.state(Led::Output) == LedState::On
    }

    /// The node's current role.
    pub fn mode(&self) -> Mode {
        self.node.info().mode
    }

    /// The state nibble of the node's current outbound mesh frame.
    pub fn advertised_state(&self) -> u8 {
        self.node.outbound().data()[3] & 0x0F
    }
}

/// Free-space-ish path loss: -40 dBm at one metre, minus 20 dB per decade.
fn path_rssi(dist: f64) -> i8 {
    let rssi = -40.0 - 20.0 * dist.max(0.1).log10();
    rssi.round().max(-127.0).min(0.0) as i8
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Wraps a manufacturer payload the way the radio driver would put it on the air.
fn advertising_data(payload: &[u8]) -> Vec<u8> {
    let mut adv = vec![0x02, 0x01, 0x06];
    adv.push(payload.len() as u8 + 1);
    adv.push(0xFF);
    adv.extend_from_slice(payload);
    adv
}

/// A population of simulated nodes sharing one band.
pub struct Field {
    pub nodes: Vec<SimNode>,
    rng: SmallRng,
    /// Per-link probability that a frame is lost in a given cycle.
    pub loss: f64,
}

/// Role counts and output states across a field, for per-cycle reporting.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Summary {
    pub auras: usize,
    pub auras_active: usize,
    pub devices: usize,
    pub devices_on: usize,
    pub tokens: usize,
    pub overseers: usize,
    pub idle: usize,
}

impl Field {
    pub fn new(seed: u64) -> Field {
        Field {
            nodes: Vec::new(),
            rng: SmallRng::seed_from_u64(seed),
            loss: 0.0,
        }
    }

    /// Boots a node with the given configuration at a position; returns its index.
    pub fn spawn(&mut self, info: DeviceInfo, pos: (f64, f64)) -> usize {
        let mut radio = SimRadio::default();
        let mut store = SimStore::default();
        store
            .write(DEVICE_INFO_RECORD, &info.to_record())
            .expect("sim store never fails");
        let mut rng = SmallRng::seed_from_u64(self.rng.gen());
        let mut node = cycle::boot(&mut radio, &mut store, &mut rng).expect("sim boot never fails");
        let mut leds = SimLeds::new();
        node.set_mode(&mut leds);
        self.nodes.push(SimNode {
            node,
            radio,
            store,
            leds,
            rng,
            pos,
        });
        self.nodes.len() - 1
    }

    /// Runs one global cycle: deliver every on-air frame to every receiver in range, then
    /// step each node through a full scan/advertise cycle.
    pub fn step(&mut self) {
        let Field { nodes, rng, loss } = self;

        let on_air: Vec<Option<(DeviceAddress, Vec<u8>, (f64, f64))>> = nodes
            .iter()
            .map(|sim| {
                sim.radio
                    .on_air()
                    .map(|payload| (*sim.node.addr(), advertising_data(payload), sim.pos))
            })
            .collect();

        for (to, sim) in nodes.iter_mut().enumerate() {
            for (from, frame) in on_air.iter().enumerate() {
                let (addr, adv, pos) = match frame {
                    Some(frame) if from != to => frame,
                    _ => continue,
                };
                let rssi = path_rssi(distance(sim.pos, *pos));
                if rssi < -90 {
                    continue;
                }
                if *loss > 0.0 && rng.gen_bool(*loss) {
                    continue;
                }
                trace!("{:?} -> node {} at {} dBm", addr, to, rssi);
                sim.radio.inject(Report::new(*addr, rssi, adv));
            }
        }

        for sim in nodes.iter_mut() {
            cycle::run_cycle(
                &mut sim.node,
                &mut sim.radio,
                &mut sim.store,
                &mut sim.leds,
                &mut sim.rng,
            );
        }
    }

    /// Counts roles and output states across the field.
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for sim in &self.nodes {
            match sim.mode() {
                Mode::Aura => {
                    summary.auras += 1;
                    if sim.advertised_state() != 0 {
                        summary.auras_active += 1;
                    }
                }
                Mode::Device => {
                    summary.devices += 1;
                    if sim.output_on() {
                        summary.devices_on += 1;
                    }
                }
                Mode::LvlupToken => summary.tokens += 1,
                Mode::Overseer => summary.overseers += 1,
                Mode::None | Mode::Unknown(_) => summary.idle += 1,
            }
        }
        summary
    }
}
