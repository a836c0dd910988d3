use crate::bytes::{ByteReader, ByteWriter, FromBytes, ToBytes};
use crate::Error;
use core::fmt;
use rand_core::RngCore;

/// Specifies whether a device address is vendor-assigned or randomly generated.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AddressKind {
    /// Publicly registered IEEE 802-2001 LAN MAC address.
    Public,
    /// Randomly generated address.
    Random,
}

/// A 48-bit device address, stored as it is sent over the air (LSB first).
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    bytes: [u8; 6],
    kind: AddressKind,
}

impl DeviceAddress {
    /// Creates a device address from 6 raw bytes and an address kind specifier.
    pub fn new(bytes: [u8; 6], kind: AddressKind) -> Self {
        DeviceAddress { bytes, kind }
    }

    /// Generates the node's once-per-device static random address.
    ///
    /// The static-random convention requires the two most significant bits to be `11`; the
    /// remaining 46 bits come from `rng`.
    pub fn generate_static<R: RngCore>(rng: &mut R) -> Self {
        let mut bytes = [0; 6];
        rng.fill_bytes(&mut bytes);
        bytes[5] |= 0xC0;
        DeviceAddress {
            bytes,
            kind: AddressKind::Random,
        }
    }

    /// Returns the address kind.
    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Returns the raw bytes making up this address (LSB first).
    pub fn raw(&self) -> &[u8; 6] {
        &self.bytes
    }
}

/// The persisted form: one kind byte followed by the 6 address bytes.
impl ToBytes for DeviceAddress {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_u8(match self.kind {
            AddressKind::Public => 0,
            AddressKind::Random => 1,
        })?;
        writer.write_slice(&self.bytes)
    }
}

impl<'a> FromBytes<'a> for DeviceAddress {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        let kind = match bytes.read_u8()? {
            0 => AddressKind::Public,
            1 => AddressKind::Random,
            _ => return Err(Error::InvalidValue),
        };
        Ok(DeviceAddress {
            bytes: bytes.read_array()?,
            kind,
        })
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Device addresses are conventionally displayed MSB first, so the OUI
        // prefix comes first.
        for (i, b) in self.bytes.iter().rev().enumerate() {
            if i != 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", b)?;
        }

        write!(f, "[{:?}]", self.kind)?;

        Ok(())
    }
}
