//! Advertisement wire formats.
//!
//! All protocol traffic rides in the manufacturer-data element (AD type `0xFF`) of ordinary
//! advertising frames. The element payload starts with a two-byte magic selecting one of three
//! formats:
//!
//! ```notrust
//! MESH (5 bytes)
//! +-------+-----------------+---------------+----------------+
//! | CE FA | mode | affinity | level | state | rssi threshold |
//! |       |  :4  |    :4    |  :4   |  :4   |  (signed byte) |
//! +-------+-----------------+---------------+----------------+
//!
//! MASTER (12 bytes)
//! +-------+----------------+--------------------------------------+
//! | AB AC | target mac (6) | mode, affinity, level, threshold (4) |
//! +-------+----------------+--------------------------------------+
//!
//! OVERSEER (10 bytes)
//! +-------+----------------------+-----------------------+
//! | DE AD | magic states (4)     | techno states (4)     |
//! |       | one on/off per level | one on/off per level  |
//! +-------+----------------------+-----------------------+
//! ```
//!
//! A unity aura splits the 4-bit level field of the mesh frame once more, into a 2-bit magic
//! rank and a 2-bit techno rank; everyone else sends their level as a plain nibble. The master
//! frame carries the configuration record in its persisted form, so a unity aura's rank pair
//! travels as the full packed byte there.
//!
//! Frames shorter than their format and unknown magics decode to nothing and are dropped by the
//! caller without further ceremony.

use crate::bytes::{ByteReader, ByteWriter, FromBytes, ToBytes};
use crate::config::MAX_AURA_LEVEL;
use crate::info::{pack_unity_level, split_unity_level, Affinity, DeviceInfo, Mode};
use crate::Error;

/// Magic prefix of the mesh format.
pub const MESH_MAGIC: [u8; 2] = [0xCE, 0xFA];
/// Magic prefix of the master format.
pub const MASTER_MAGIC: [u8; 2] = [0xAB, 0xAC];
/// Magic prefix of the overseer format.
pub const OVERSEER_MAGIC: [u8; 2] = [0xDE, 0xAD];

/// Length of an encoded mesh frame.
pub const MESH_ADV_LEN: usize = 5;
/// Length of an encoded master frame.
pub const MASTER_ADV_LEN: usize = 12;
/// Length of an encoded overseer frame.
pub const OVERSEER_ADV_LEN: usize = 10;

/// AD element type carrying manufacturer-specific data.
const MANUFACTURER_DATA: u8 = 0xFF;

/// Returns the first manufacturer-data element of an advertising payload.
///
/// Walks the standard `[length][type][data...]` element encoding; malformed trailers end the
/// walk silently.
pub fn manufacturer_data(adv: &[u8]) -> Option<&[u8]> {
    let mut bytes = ByteReader::new(adv);
    while bytes.bytes_left() > 1 {
        let len = bytes.read_u8().ok()?;
        if len == 0 {
            return None;
        }
        let ty = bytes.read_u8().ok()?;
        let data = bytes.read_slice(usize::from(len) - 1).ok()?;
        if ty == MANUFACTURER_DATA && data.len() >= 2 {
            return Some(data);
        }
    }
    None
}

/// A peer's periodic presence broadcast.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MeshAdv {
    /// What the peer claims to be.
    pub info: DeviceInfo,
    /// Role-dependent state: active/inactive for auras, on/off for devices,
    /// charged/discharged for tokens.
    pub state: u8,
}

impl MeshAdv {
    pub fn new(info: DeviceInfo, state: u8) -> Self {
        MeshAdv { info, state }
    }

    /// Whether the level nibble carries a packed unity rank pair.
    fn packs_rank_pair(mode: Mode, affinity: Affinity) -> bool {
        mode == Mode::Aura && affinity == Affinity::Unity
    }
}

impl ToBytes for MeshAdv {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_slice(&MESH_MAGIC)?;
        let mode: u8 = self.info.mode.into();
        let affinity: u8 = self.info.affinity.into();
        writer.write_u8((mode << 4) | (affinity & 0x0F))?;

        let level = if Self::packs_rank_pair(self.info.mode, self.info.affinity) {
            let magic = split_unity_level(self.info.level, Affinity::Magic);
            let techno = split_unity_level(self.info.level, Affinity::Techno);
            ((magic & 0x03) << 2) | (techno & 0x03)
        } else {
            self.info.level & 0x0F
        };
        writer.write_u8((level << 4) | (self.state & 0x0F))?;
        writer.write_u8(self.info.dynamic_rssi_threshold as u8)
    }
}

impl<'a> FromBytes<'a> for MeshAdv {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        if bytes.read_array::<2>()? != MESH_MAGIC {
            return Err(Error::InvalidValue);
        }
        let packed = bytes.read_u8()?;
        let mode = Mode::from(packed >> 4);
        let affinity = Affinity::from(packed & 0x0F);

        let packed = bytes.read_u8()?;
        let nibble = packed >> 4;
        let level = if Self::packs_rank_pair(mode, affinity) {
            pack_unity_level((nibble >> 2) & 0x03, nibble & 0x03)
        } else {
            nibble
        };

        Ok(MeshAdv {
            info: DeviceInfo {
                mode,
                affinity,
                level,
                dynamic_rssi_threshold: bytes.read_u8()? as i8,
            },
            state: packed & 0x0F,
        })
    }
}

/// A configuration command targeted at a single node.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MasterAdv {
    /// Address of the node that should apply the command.
    pub target: [u8; 6],
    /// The configuration to apply.
    pub info: DeviceInfo,
}

impl ToBytes for MasterAdv {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_slice(&MASTER_MAGIC)?;
        writer.write_slice(&self.target)?;
        self.info.to_bytes(writer)
    }
}

impl<'a> FromBytes<'a> for MasterAdv {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        if bytes.read_array::<2>()? != MASTER_MAGIC {
            return Err(Error::InvalidValue);
        }
        Ok(MasterAdv {
            target: bytes.read_array()?,
            info: DeviceInfo::from_bytes(bytes)?,
        })
    }
}

/// An overseer's commanded output table, one on/off byte per (affinity, level) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OverseerAdv {
    /// Commanded state for magic devices at levels 0 through 3.
    pub magic: [u8; 4],
    /// Commanded state for techno devices at levels 0 through 3.
    pub techno: [u8; 4],
}

impl OverseerAdv {
    /// Looks up the commanded output for a device of the given affinity and level.
    ///
    /// Unity devices obey the more permissive of the two sides. Out-of-range levels and
    /// unknown affinities are commanded off.
    pub fn commanded(&self, affinity: Affinity, level: u8) -> u8 {
        if level > MAX_AURA_LEVEL {
            return 0;
        }
        let at = usize::from(level);
        let on = match affinity {
            Affinity::Magic => self.magic[at] != 0,
            Affinity::Techno => self.techno[at] != 0,
            Affinity::Unity => self.magic[at] != 0 || self.techno[at] != 0,
            Affinity::Unknown(_) => false,
        };
        on as u8
    }
}

impl ToBytes for OverseerAdv {
    fn to_bytes(&self, writer: &mut ByteWriter<'_>) -> Result<(), Error> {
        writer.write_slice(&OVERSEER_MAGIC)?;
        writer.write_slice(&self.magic)?;
        writer.write_slice(&self.techno)
    }
}

impl<'a> FromBytes<'a> for OverseerAdv {
    fn from_bytes(bytes: &mut ByteReader<'a>) -> Result<Self, Error> {
        if bytes.read_array::<2>()? != OVERSEER_MAGIC {
            return Err(Error::InvalidValue);
        }
        Ok(OverseerAdv {
            magic: bytes.read_array()?,
            techno: bytes.read_array()?,
        })
    }
}

/// A decoded advertisement payload.
#[derive(Debug, Copy, Clone)]
pub enum Packet {
    Mesh(MeshAdv),
    Master(MasterAdv),
    Overseer(OverseerAdv),
}

impl Packet {
    /// Decodes a manufacturer-data payload.
    ///
    /// Unknown magics and short frames decode to `None`; peers running other protocols share
    /// the air with us and are none of our business.
    pub fn decode(data: &[u8]) -> Option<Packet> {
        if data.len() < 2 {
            return None;
        }
        let mut bytes = ByteReader::new(data);
        match [data[0], data[1]] {
            MESH_MAGIC => MeshAdv::from_bytes(&mut bytes).ok().map(Packet::Mesh),
            MASTER_MAGIC => MasterAdv::from_bytes(&mut bytes).ok().map(Packet::Master),
            OVERSEER_MAGIC => OverseerAdv::from_bytes(&mut bytes)
                .ok()
                .map(Packet::Overseer),
            _ => None,
        }
    }
}
