//! PSID/RSID container header reader.
//!
//! Parses the fixed-size header that wraps a C64 music-driver binary,
//! then slices out the raw payload the relocation core operates on. This
//! module is a thin collaborator: it has no opinion about relocation, it
//! only turns a file's bytes into a [`PsidHeader`] plus a payload slice,
//! handling the one format quirk the core's contract (§6.1) requires
//! collaborators to resolve before calling in: PSID v1's embedded
//! load-address prefix.

use crate::error::{RelocatorError, Result};
use byteorder::{BigEndian, ByteOrder};

/// Fixed PSID v1 header size in bytes.
pub const HEADER_SIZE_V1: usize = 0x76;
/// Fixed PSID v2+ header size in bytes (adds the flags/page/SID fields).
pub const HEADER_SIZE_V2: usize = 0x7C;

/// Parsed PSID/RSID fixed header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsidHeader {
    /// `true` for an `"RSID"` magic, `false` for `"PSID"`.
    pub is_rsid: bool,
    /// Format version, 1 through 4.
    pub version: u16,
    /// Byte offset of the C64 payload within the file.
    pub data_offset: u16,
    /// Address the payload is linked at. `0` means a PSID v1 payload
    /// carries its own little-endian load address as its first two
    /// bytes, which must be stripped before the core sees it.
    pub load_address: u16,
    /// Address of the tune's init routine.
    pub init_address: u16,
    /// Address of the tune's play routine, called once per frame.
    pub play_address: u16,
    /// Number of songs (sub-tunes) in the file.
    pub song_count: u16,
    /// 1-based index of the song to play by default.
    pub start_song: u16,
    /// Per-song speed flags bitmask.
    pub speed: u32,
    /// Tune name, trimmed of trailing NULs.
    pub name: String,
    /// Tune author, trimmed of trailing NULs.
    pub author: String,
    /// Release/copyright string, trimmed of trailing NULs.
    pub released: String,
    /// v2+ flags field; `0` for v1 files.
    pub flags: u16,
    /// v2+ second SID chip address byte (`0` if absent).
    pub second_sid_address: u8,
    /// v2+ third SID chip address byte (`0` if absent).
    pub third_sid_address: u8,
}

impl PsidHeader {
    /// Entry points a relocation job should seed the scanner with: the
    /// init routine always runs first, and the play routine is reachable
    /// indirectly through it but is included directly since nothing in
    /// the header's static data proves init always falls through to it.
    pub fn entry_points(&self) -> Vec<u16> {
        let mut points = vec![self.init_address];
        if self.play_address != 0 {
            points.push(self.play_address);
        }
        points
    }
}

/// Parse a PSID/RSID file's header and return it plus the raw C64
/// payload, with any PSID v1 embedded load-address prefix already
/// stripped.
pub fn parse(data: &[u8]) -> Result<(PsidHeader, Vec<u8>)> {
    if data.len() < HEADER_SIZE_V1 {
        return Err(RelocatorError::TruncatedContainer {
            expected: HEADER_SIZE_V1,
            actual: data.len(),
        });
    }

    let is_rsid = match &data[0..4] {
        b"PSID" => false,
        b"RSID" => true,
        other => {
            return Err(RelocatorError::InvalidContainer {
                message: format!("bad magic {:?}, expected PSID or RSID", other),
            });
        }
    };

    let version = be_u16(data, 4);
    if !(1..=4).contains(&version) {
        return Err(RelocatorError::UnsupportedPsidVersion { version });
    }

    let data_offset = be_u16(data, 6);
    let header_size = if version == 1 {
        HEADER_SIZE_V1
    } else {
        HEADER_SIZE_V2
    };
    if data.len() < header_size {
        return Err(RelocatorError::TruncatedContainer {
            expected: header_size,
            actual: data.len(),
        });
    }

    let load_address = be_u16(data, 8);
    let init_address = be_u16(data, 10);
    let play_address = be_u16(data, 12);
    let song_count = be_u16(data, 14);
    let start_song = be_u16(data, 16);
    let speed = be_u32(data, 18);
    let name = trimmed_string(&data[22..54]);
    let author = trimmed_string(&data[54..86]);
    let released = trimmed_string(&data[86..118]);

    let (flags, second_sid_address, third_sid_address) = if version >= 2 {
        (be_u16(data, 118), data[122], data[123])
    } else {
        (0, 0, 0)
    };

    let header = PsidHeader {
        is_rsid,
        version,
        data_offset,
        load_address,
        init_address,
        play_address,
        song_count,
        start_song,
        speed,
        name,
        author,
        released,
        flags,
        second_sid_address,
        third_sid_address,
    };

    let offset = data_offset as usize;
    if offset > data.len() {
        return Err(RelocatorError::TruncatedContainer {
            expected: offset,
            actual: data.len(),
        });
    }
    let mut payload = data[offset..].to_vec();

    let effective_load_address = if header.load_address == 0 {
        if payload.len() < 2 {
            return Err(RelocatorError::TruncatedContainer {
                expected: 2,
                actual: payload.len(),
            });
        }
        let embedded = u16::from_le_bytes([payload[0], payload[1]]);
        payload.drain(0..2);
        embedded
    } else {
        header.load_address
    };

    let mut header = header;
    header.load_address = effective_load_address;

    Ok((header, payload))
}

fn be_u16(data: &[u8], offset: usize) -> u16 {
    BigEndian::read_u16(&data[offset..offset + 2])
}

fn be_u32(data: &[u8], offset: usize) -> u32 {
    BigEndian::read_u32(&data[offset..offset + 4])
}

fn trimmed_string(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
