//! The scan/advertise cycle driver.
//!
//! One cycle looks like this:
//!
//! ```notrust
//! scan start
//!    |          random 0..120 ms scan-only window (jitter)
//! adv start
//!    |          rest of the 3.5 s cycle, scanning + advertising
//! scan stop, adv stop
//!    |          100 ms settle
//! end of cycle, mode change if one is pending
//! ```
//!
//! The jitter spreads neighbouring nodes' advertising starts apart; with a hundred nodes in
//! range, synchronized cycles would otherwise pile their frames onto the same few
//! milliseconds. All waits go through the LED driver, which keeps the indicators alive while
//! the node idles.
//!
//! Radio start failures are logged and the cycle carries on: the next cycle retries
//! implicitly, and there is nothing better to do on a node without a console. Failures during
//! [`boot`], by contrast, are fatal: a node without storage or radio cannot participate.
//!
//! [`boot`]: fn.boot.html

use crate::bytes::{ByteReader, ByteWriter, FromBytes, ToBytes};
use crate::config::{
    BLINK_INTERVAL, CYCLE_DURATION, PEER_DISCOVERY_JITTER, SETTLE_DELAY,
};
use crate::info::DeviceInfo;
use crate::led::Leds;
use crate::radio::Radio;
use crate::store::{Store, DEVICE_INFO_RECORD, STATIC_ADDR_RECORD};
use crate::time::Duration;
use crate::{DeviceAddress, Error, Node};
use rand_core::RngCore;

/// Loads (or creates) the node identity and configuration, and brings the radio up.
///
/// The static address is generated exactly once per device and persisted; every later boot
/// reuses it, so peers and overseers keep recognizing the node across power cycles.
pub fn boot<R, S, G>(radio: &mut R, store: &mut S, rng: &mut G) -> Result<Node, Error>
where
    R: Radio,
    S: Store,
    G: RngCore,
{
    let mut buf = [0; 7];
    let addr = match store.read(STATIC_ADDR_RECORD, &mut buf) {
        Ok(len) => {
            let addr = DeviceAddress::from_bytes(&mut ByteReader::new(&buf[..len]))?;
            info!("loaded identity {:?}", addr);
            addr
        }
        Err(Error::NotFound) => {
            let addr = DeviceAddress::generate_static(rng);
            let mut writer = ByteWriter::new(&mut buf);
            addr.to_bytes(&mut writer)?;
            store.write(STATIC_ADDR_RECORD, &buf)?;
            info!("generated identity {:?}", addr);
            addr
        }
        Err(e) => {
            error!("identity record unreadable: {}", e);
            return Err(e);
        }
    };

    if let Err(e) = radio.enable(&addr) {
        error!("radio bring-up failed: {}", e);
        return Err(e);
    }

    let mut record = [0; DeviceInfo::RECORD_LEN];
    let info = match store.read(DEVICE_INFO_RECORD, &mut record) {
        Ok(len) => match DeviceInfo::from_record(&record[..len]) {
            Ok(info) => {
                info!("loaded configuration {:?}", info);
                info
            }
            Err(_) => {
                warn!("corrupt configuration record, using defaults");
                DeviceInfo::default()
            }
        },
        Err(Error::NotFound) => {
            info!("no stored configuration, using defaults");
            DeviceInfo::default()
        }
        Err(e) => {
            error!("configuration record unreadable: {}", e);
            return Err(e);
        }
    };

    Ok(Node::new(info, addr))
}

/// Drives one full scan/advertise cycle.
pub fn run_cycle<R, S, L, G>(
    node: &mut Node,
    radio: &mut R,
    store: &mut S,
    leds: &mut L,
    rng: &mut G,
) where
    R: Radio,
    S: Store,
    L: Leds,
    G: RngCore,
{
    if let Err(e) = radio.scan_start() {
        warn!("scan start failed: {}", e);
    }

    // scan-only window before we add our own noise to the band
    let jitter = Duration::from_millis(rng.next_u32() % PEER_DISCOVERY_JITTER.as_millis());
    leds.operate(jitter, jitter);
    drain(node, radio);

    if let Err(e) = radio.adv_start(node.outbound().interval(), node.outbound().data()) {
        warn!("advertising start failed: {}", e);
    }
    leds.operate(CYCLE_DURATION - jitter, BLINK_INTERVAL);
    drain(node, radio);

    radio.scan_stop();
    radio.adv_stop();
    leds.operate(SETTLE_DELAY, BLINK_INTERVAL);
    drain(node, radio);

    node.end_of_cycle(leds);

    if node.mode_changed() {
        // persistence happens here, at the cycle boundary, never on the receive path
        if let Err(e) = store.write(DEVICE_INFO_RECORD, &node.info().to_record()) {
            warn!("configuration not persisted: {}", e);
        }
        node.set_mode(leds);
    }
}

fn drain<R: Radio>(node: &mut Node, radio: &mut R) {
    while let Some(report) = radio.poll_report() {
        node.on_report(&report);
    }
}

/// Enters the configured mode and cycles forever.
pub fn run<R, S, L, G>(
    node: &mut Node,
    radio: &mut R,
    store: &mut S,
    leds: &mut L,
    rng: &mut G,
) -> !
where
    R: Radio,
    S: Store,
    L: Leds,
    G: RngCore,
{
    node.set_mode(leds);
    loop {
        run_cycle(node, radio, store, leds, rng);
    }
}
