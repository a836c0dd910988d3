//! Non-volatile key-value store interface.
//!
//! The node persists exactly two tiny records, addressed by small integer IDs. The storage
//! backend (flash filesystem, EEPROM, a file on a host) is the platform's concern.

use crate::Error;

/// Record holding the persisted [`DeviceInfo`].
///
/// [`DeviceInfo`]: ../info/struct.DeviceInfo.html
pub const DEVICE_INFO_RECORD: u16 = 1;

/// Record holding the static device address.
pub const STATIC_ADDR_RECORD: u16 = 2;

/// The persistent store the platform provides.
pub trait Store {
    /// Reads record `id` into `buf` and returns the number of bytes read.
    ///
    /// Returns `Error::NotFound` for records that were never written.
    fn read(&mut self, id: u16, buf: &mut [u8]) -> Result<usize, Error>;

    /// Creates or replaces record `id`.
    fn write(&mut self, id: u16, data: &[u8]) -> Result<(), Error>;
}
