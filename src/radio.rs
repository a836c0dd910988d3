//! Radio driver interface.
//!
//! The core drives the radio in broad strokes (start and stop a passive scan, start and stop
//! a broadcast) and consumes received advertising frames as [`Report`]s. How frames get from
//! the air into [`poll_report`] is the driver's business: a cooperative platform buffers them
//! until the cycle driver drains the queue, a preemptive one may bypass the queue and feed
//! [`Node::on_report`] directly from its receive context under a lock.
//!
//! [`Report`]: struct.Report.html
//! [`poll_report`]: trait.Radio.html#tymethod.poll_report
//! [`Node::on_report`]: ../node/struct.Node.html#method.on_report

use crate::time::Duration;
use crate::{DeviceAddress, Error};

/// Longest advertising-data payload a report can carry.
pub const MAX_ADV_DATA: usize = 31;

/// A received advertising report.
#[derive(Debug, Copy, Clone)]
pub struct Report {
    /// Address the frame was sent from.
    pub addr: DeviceAddress,
    /// Received signal strength in dBm.
    pub rssi: i8,
    data: [u8; MAX_ADV_DATA],
    len: u8,
}

impl Report {
    /// Creates a report from a received advertising payload.
    ///
    /// Payloads longer than [`MAX_ADV_DATA`] are truncated; the protocol's elements all fit
    /// well within the limit.
    ///
    /// [`MAX_ADV_DATA`]: constant.MAX_ADV_DATA.html
    pub fn new(addr: DeviceAddress, rssi: i8, payload: &[u8]) -> Self {
        let len = payload.len().min(MAX_ADV_DATA);
        let mut data = [0; MAX_ADV_DATA];
        data[..len].copy_from_slice(&payload[..len]);
        Report {
            addr,
            rssi,
            data,
            len: len as u8,
        }
    }

    /// The advertising-data payload of the frame.
    pub fn data(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }
}

/// Advertising cadence presets.
///
/// The slow cadence keeps the band usable when a hundred nodes share it; the fast one is
/// reserved for the short window in which a level-up token broadcasts its grant.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AdvInterval {
    Slow,
    Fast,
}

impl AdvInterval {
    /// The `(min, max)` advertising interval of the preset.
    pub fn range(self) -> (Duration, Duration) {
        match self {
            AdvInterval::Slow => (Duration::from_millis(1000), Duration::from_millis(1200)),
            AdvInterval::Fast => (Duration::from_millis(100), Duration::from_millis(150)),
        }
    }
}

/// The radio driver the platform provides.
pub trait Radio {
    /// Brings the radio up and configures the identity address broadcasts are sent from.
    fn enable(&mut self, identity: &DeviceAddress) -> Result<(), Error>;

    /// Starts the passive scan.
    fn scan_start(&mut self) -> Result<(), Error>;

    /// Stops the passive scan.
    fn scan_stop(&mut self);

    /// Starts broadcasting `data` as a manufacturer-data element at the given cadence.
    fn adv_start(&mut self, interval: AdvInterval, data: &[u8]) -> Result<(), Error>;

    /// Stops broadcasting.
    fn adv_stop(&mut self);

    /// Hands out the next buffered advertising report, oldest first.
    fn poll_report(&mut self) -> Option<Report>;
}
