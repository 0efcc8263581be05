//! Stage B — data pointer table discovery.
//!
//! Identifies, by code-flow inspection rather than byte-content
//! scanning, which data bytes are hi-byte halves of pointers into the
//! tune's own address range. Runs only when the relocation delta is
//! non-zero; its output feeds Stage C, which does the actual rewriting.

use crate::decoder::{self, AddressingMode, ControlFlow};
use crate::types::{BinaryImage, ScanResult};
use std::collections::{HashMap, HashSet};

/// A confirmed split hi-byte table: the sole patch target of a
/// lo-byte/hi-byte array pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HiByteTable {
    /// Address of the table's first byte.
    pub base: u16,
    /// Table extent in bytes, per Phase 4's size inference.
    pub size: usize,
}

/// A confirmed interleaved pointer table: `[lo, hi, lo, hi, ...]`
/// starting at `lo_base`, whose odd bytes (starting at `hi_base =
/// lo_base + 1`) are patch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterleavedTable {
    /// Address of the lo-byte of the first pointer pair.
    pub lo_base: u16,
    /// Address of the hi-byte of the first pointer pair (`lo_base + 1`).
    pub hi_base: u16,
    /// Table extent in bytes, per Phase 4's size inference.
    pub size: usize,
}

/// A table access whose shape (split vs. interleaved) could not be
/// confirmed by Phase 2/3; Stage C decides, with its heuristic tests,
/// whether it is safe to touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnclassifiedTable {
    /// Address of the table's first byte.
    pub base: u16,
    /// Table extent in bytes, per Phase 4's generic size inference.
    pub size: usize,
}

/// Everything Stage B discovered about the data region's pointer
/// tables.
#[derive(Debug, Clone, Default)]
pub struct TableDiscovery {
    /// Confirmed split hi-byte tables (Phase 2).
    pub hi_tables: Vec<HiByteTable>,
    /// Confirmed interleaved pointer-pair tables (Phase 3).
    pub interleaved: Vec<InterleavedTable>,
    /// Table accesses Phase 2/3 could not classify; left to Stage C's
    /// heuristic fallback.
    pub unclassified: Vec<UnclassifiedTable>,
}

/// Run Stage B's four discovery phases over `image`, using `scan`'s
/// code/data classification to tell table accesses from code bytes.
pub fn discover(image: &BinaryImage, scan: &ScanResult) -> TableDiscovery {
    let access_dest = collect_table_accesses(image, scan);

    let mut bases: Vec<u16> = access_dest.keys().copied().collect();
    bases.sort_unstable();

    let (confirmed_hi, confirmed_lo) = confirm_split_tables(&access_dest);
    let interleaved_pairs = detect_interleaved_pairs(&bases, &confirmed_hi);

    let paired_bases: HashSet<u16> = interleaved_pairs
        .iter()
        .flat_map(|&(lo, hi)| [lo, hi])
        .collect();

    let mut confirmed_lo_sorted: Vec<u16> = confirmed_lo.iter().copied().collect();
    confirmed_lo_sorted.sort_unstable();

    let hi_tables = confirmed_hi
        .iter()
        .copied()
        .filter(|base| !paired_bases.contains(base))
        .map(|base| HiByteTable {
            base,
            size: hi_table_size(image, &bases, &confirmed_lo_sorted, base),
        })
        .collect();

    let interleaved = interleaved_pairs
        .iter()
        .map(|&(lo_base, hi_base)| InterleavedTable {
            lo_base,
            hi_base,
            size: interleaved_table_size(image, &bases, &paired_bases, lo_base, hi_base),
        })
        .collect();

    let unclassified = bases
        .iter()
        .copied()
        .filter(|base| !confirmed_hi.contains(base) && !paired_bases.contains(base))
        .map(|base| UnclassifiedTable {
            base,
            size: generic_size(image, &bases, base, 64),
        })
        .collect();

    TableDiscovery {
        hi_tables,
        interleaved,
        unclassified,
    }
}

/// Phase 1 — collect every `LDA/LDX/LDY addr,X`/`addr,Y` access whose
/// base address points into a data byte, paired with the destination
/// zero-page address of the store that (maybe) immediately follows it.
fn collect_table_accesses(image: &BinaryImage, scan: &ScanResult) -> HashMap<u16, Vec<Option<u8>>> {
    let mut access_dest: HashMap<u16, Vec<Option<u8>>> = HashMap::new();

    for &start in &scan.instruction_starts {
        let Some(opcode) = image.byte(start) else {
            continue;
        };
        let Some(info) = decoder::decode(opcode) else {
            continue;
        };
        if !matches!(info.mnemonic, "LDA" | "LDX" | "LDY") {
            continue;
        }
        if !info.mode.is_absolute_indexed() {
            continue;
        }
        let Some(addr) = image.word(start + 1) else {
            continue;
        };
        let Some(data_offset) = image.offset_of(addr) else {
            continue;
        };
        if scan.code_offsets.contains(&data_offset) {
            continue;
        }

        let dest_zp = forward_scan_dest_zp(image, start + info.len());
        access_dest.entry(addr).or_default().push(dest_zp);
    }

    access_dest
}

/// Scan forward at most three decoded instructions from `cursor` for an
/// immediately following `STA zp`. Any other store, any call/return/
/// jump, or a second load terminates the scan with "unknown" (`None`),
/// as does running past the image end or exhausting the budget.
fn forward_scan_dest_zp(image: &BinaryImage, mut cursor: usize) -> Option<u8> {
    for _ in 0..3 {
        let opcode = image.byte(cursor)?;
        let info = decoder::decode(opcode)?;

        if info.mnemonic == "STA" && info.mode == AddressingMode::ZeroPage {
            return image.byte(cursor + 1);
        }
        if matches!(info.mnemonic, "STA" | "STX" | "STY") {
            return None;
        }
        if matches!(
            decoder::control_flow(info),
            ControlFlow::AbsoluteJump
                | ControlFlow::IndirectJump
                | ControlFlow::AbsoluteCall
                | ControlFlow::Terminate
                | ControlFlow::RelativeBranch
        ) {
            return None;
        }
        if matches!(info.mnemonic, "LDA" | "LDX" | "LDY") {
            return None;
        }

        let len = info.len();
        if cursor + len > image.len() {
            return None;
        }
        cursor += len;
    }
    None
}

/// Phase 2 — a table base with any odd `dest_zp` is a confirmed
/// hi-byte table; one with any even `dest_zp` is a confirmed lo-byte
/// table. A base may be confirmed as both if different accesses
/// disagree.
fn confirm_split_tables(access_dest: &HashMap<u16, Vec<Option<u8>>>) -> (HashSet<u16>, HashSet<u16>) {
    let mut confirmed_hi = HashSet::new();
    let mut confirmed_lo = HashSet::new();
    for (&base, dests) in access_dest {
        if dests.iter().any(|d| matches!(d, Some(zp) if zp % 2 == 1)) {
            confirmed_hi.insert(base);
        }
        if dests.iter().any(|d| matches!(d, Some(zp) if zp % 2 == 0)) {
            confirmed_lo.insert(base);
        }
    }
    (confirmed_hi, confirmed_lo)
}

/// Phase 3 — pair up adjacent table bases `(b, b+1)` that both appear
/// in the access set. Each base belongs to at most one pair; bases are
/// considered in ascending order so the lowest-addressed pairing wins.
fn detect_interleaved_pairs(bases: &[u16], confirmed_hi: &HashSet<u16>) -> Vec<(u16, u16)> {
    let base_set: HashSet<u16> = bases.iter().copied().collect();
    let mut used: HashSet<u16> = HashSet::new();
    let mut pairs = Vec::new();

    for &b in bases {
        if used.contains(&b) {
            continue;
        }
        let hi = b.wrapping_add(1);
        if base_set.contains(&hi) && !used.contains(&hi) {
            pairs.push((b, hi));
            used.insert(b);
            used.insert(hi);
        }
    }

    // Confirmed hi-byte tables (Phase 2) take precedence over being
    // treated as one half of an interleaved pair (§9 tie-break).
    pairs
        .into_iter()
        .filter(|&(lo, hi)| !confirmed_hi.contains(&lo) && !confirmed_hi.contains(&hi))
        .collect()
}

fn next_base_after(bases: &[u16], after: u16, excluding: &HashSet<u16>) -> Option<u16> {
    bases
        .iter()
        .copied()
        .find(|&x| x > after && !excluding.contains(&x))
}

/// Phase 4, base case: gap to the next higher table base (capped), or
/// to image end.
fn generic_size(image: &BinaryImage, bases: &[u16], base: u16, cap: usize) -> usize {
    let base_off = image.offset_of(base).unwrap_or(image.len());
    match next_base_after(bases, base, &HashSet::new()) {
        Some(next) => {
            let next_off = image.offset_of(next).unwrap_or(image.len());
            next_off.saturating_sub(base_off).min(cap)
        }
        None => image.len().saturating_sub(base_off).min(cap),
    }
}

/// Phase 4, hi-byte table override: if a confirmed lo-byte table sits
/// at a lower address within 64 bytes, the gap between them replaces
/// the generic size.
fn hi_table_size(
    image: &BinaryImage,
    bases: &[u16],
    confirmed_lo_sorted: &[u16],
    base: u16,
) -> usize {
    let mut size = generic_size(image, bases, base, 64);
    if let Some(&lo) = confirmed_lo_sorted.iter().rev().find(|&&x| x < base) {
        let base_off = image.offset_of(base).unwrap_or(image.len());
        let lo_off = image.offset_of(lo).unwrap_or(0);
        if base_off > lo_off {
            let dist = base_off - lo_off;
            if (1..=64).contains(&dist) {
                size = dist;
            }
        }
    }
    size
}

/// Phase 4, interleaved-table extension: size runs from `lo_base` past
/// the paired `hi_base` to the next base not itself part of a pair,
/// capped at 128 bytes.
fn interleaved_table_size(
    image: &BinaryImage,
    bases: &[u16],
    paired_bases: &HashSet<u16>,
    lo_base: u16,
    hi_base: u16,
) -> usize {
    let lo_off = image.offset_of(lo_base).unwrap_or(image.len());
    match next_base_after(bases, hi_base, paired_bases) {
        Some(next) => {
            let next_off = image.offset_of(next).unwrap_or(image.len());
            next_off.saturating_sub(lo_off).min(128)
        }
        None => image.len().saturating_sub(lo_off).min(128),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner;

    /// Program: `LDA table,Y` then `STA $FF` (odd zp — confirms a
    /// hi-byte table), followed by an `RTS`. `table` sits right after
    /// the code, holding four bytes that look like a hi-byte table.
    fn split_hi_table_image() -> BinaryImage {
        let mut bytes = vec![
            0xB9, 0x08, 0x10, // LDA $1008,Y
            0x85, 0xFF, // STA $FF
            0x60, // RTS
            0x00, 0x00, // padding to reach offset 8 ($1008)
            0x10, 0x10, 0x10, 0x10, // table bytes
        ];
        bytes.resize(12, 0);
        BinaryImage::new(0x1000, bytes)
    }

    #[test]
    fn split_hi_table_confirmed() {
        let image = split_hi_table_image();
        let scan = scanner::scan(&image, &[0x1000]);
        let discovery = discover(&image, &scan);
        assert_eq!(discovery.hi_tables.len(), 1);
        assert_eq!(discovery.hi_tables[0].base, 0x1008);
        assert_eq!(discovery.hi_tables[0].size, 4);
    }

    #[test]
    fn even_zp_confirms_lo_table_not_hi() {
        let mut bytes = vec![
            0xB9, 0x08, 0x10, // LDA $1008,Y
            0x85, 0xFE, // STA $FE (even)
            0x60, // RTS
            0x00, 0x00,
            0x10, 0x10, 0x10, 0x10,
        ];
        bytes.resize(12, 0);
        let image = BinaryImage::new(0x1000, bytes);
        let scan = scanner::scan(&image, &[0x1000]);
        let discovery = discover(&image, &scan);
        assert!(discovery.hi_tables.is_empty());
    }

    #[test]
    fn interleaved_pair_detected() {
        // Two accesses into adjacent bases 0x100A and 0x100B with
        // unknown dest (no following store), so Phase 2 cannot confirm
        // either as split hi/lo, leaving them for Phase 3 pairing.
        let mut bytes = vec![
            0xBD, 0x0A, 0x10, // LDA $100A,X
            0xBC, 0x0B, 0x10, // LDY $100B,X
            0x60, // RTS
            0x00, 0x00, 0x00,
            0x10, 0x10,
        ];
        bytes.resize(12, 0);
        let image = BinaryImage::new(0x1000, bytes);
        let scan = scanner::scan(&image, &[0x1000]);
        let discovery = discover(&image, &scan);
        assert_eq!(discovery.interleaved.len(), 1);
        assert_eq!(discovery.interleaved[0].lo_base, 0x100A);
        assert_eq!(discovery.interleaved[0].hi_base, 0x100B);
    }

    #[test]
    fn no_accesses_yields_empty_discovery() {
        let image = BinaryImage::new(0x1000, vec![0x60, 0x00, 0x00, 0x00]);
        let scan = scanner::scan(&image, &[0x1000]);
        let discovery = discover(&image, &scan);
        assert!(discovery.hi_tables.is_empty());
        assert!(discovery.interleaved.is_empty());
        assert!(discovery.unclassified.is_empty());
    }
}
