//! Stage A — code operand rewriting.
//!
//! Walks the scanner's instruction-start set in ascending order and
//! rewrites the 16-bit absolute operand of any instruction whose
//! addressing mode carries one, per the SID-register / internal-address
//! / leave-unchanged rules. Opcode bytes are never touched; only the two
//! operand bytes of a three-byte instruction can change here.

use crate::decoder;
use crate::types::{
    BinaryImage, PatchCategory, PatchLogEntry, RelocationJob, RelocationStats, ScanResult,
    SID_BASE, SID_WINDOW_END,
};

/// Result of running Stage A over a job: the working byte buffer plus
/// the log entries and stats it contributed.
pub struct StageAOutput {
    /// Human-readable lines, one per operand rewritten.
    pub log: Vec<String>,
    /// Structured record of every operand this stage rewrote.
    pub patches: Vec<PatchLogEntry>,
}

/// Rewrite `buffer` in place according to Stage A's rules. `buffer` must
/// start as a copy of `image`'s bytes; `scan` is the output of the
/// recursive-descent scanner over the same image.
pub fn run(
    image: &BinaryImage,
    job: &RelocationJob,
    scan: &ScanResult,
    buffer: &mut [u8],
    stats: &mut RelocationStats,
) -> StageAOutput {
    let mut log = Vec::new();
    let mut patches = Vec::new();
    let delta = job.delta();

    for &start in &scan.instruction_starts {
        let Some(opcode) = image.byte(start) else {
            continue;
        };
        let Some(info) = decoder::decode(opcode) else {
            continue;
        };
        if !info.mode.has_absolute_operand() {
            continue;
        }

        let operand_offset = start + 1;
        let Some(operand) = image.word(operand_offset) else {
            continue;
        };

        if (SID_BASE..=SID_WINDOW_END).contains(&operand) && job.sid_offset != 0 {
            let new_operand = operand.wrapping_add(job.sid_offset as u16);
            write_operand(buffer, operand_offset, new_operand);
            stats.sid_patch_count += 1;
            *stats.sid_refs.entry(new_operand).or_insert(0) += 1;
            log.push(format!(
                "0x{:04X}: {} operand 0x{:04X} -> 0x{:04X} (SID register)",
                image.addr_of(start),
                info.mnemonic,
                operand,
                new_operand
            ));
            push_patch(
                &mut patches,
                operand_offset,
                PatchCategory::SidRegister,
                operand,
                new_operand,
            );
            continue;
        }

        if operand >= job.original_base && operand < job.data_end && delta != 0 {
            let new_operand = (operand as i32 + delta) as u16;
            write_operand(buffer, operand_offset, new_operand);
            stats.reloc_count += 1;
            log.push(format!(
                "0x{:04X}: {} operand 0x{:04X} -> 0x{:04X} (code relocation)",
                image.addr_of(start),
                info.mnemonic,
                operand,
                new_operand
            ));
            push_patch(
                &mut patches,
                operand_offset,
                PatchCategory::CodeRelocation,
                operand,
                new_operand,
            );
        }
    }

    StageAOutput { log, patches }
}

fn write_operand(buffer: &mut [u8], offset: usize, value: u16) {
    let [lo, hi] = value.to_le_bytes();
    buffer[offset] = lo;
    buffer[offset + 1] = hi;
}

fn push_patch(
    patches: &mut Vec<PatchLogEntry>,
    offset: usize,
    category: PatchCategory,
    before: u16,
    after: u16,
) {
    let [before_lo, before_hi] = before.to_le_bytes();
    let [after_lo, after_hi] = after.to_le_bytes();
    if before_lo != after_lo {
        patches.push(PatchLogEntry {
            offset,
            category,
            before: before_lo,
            after: after_lo,
        });
    }
    if before_hi != after_hi {
        patches.push(PatchLogEntry {
            offset: offset + 1,
            category,
            before: before_hi,
            after: after_hi,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner;
    use std::collections::BTreeSet;

    fn scenario_bytes() -> Vec<u8> {
        vec![
            0x4C, 0x05, 0x10, 0x00, 0x00, 0xA9, 0x00, 0x8D, 0x00, 0xD4, 0x60, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ]
    }

    #[test]
    fn scenario_1_code_only_relocation() {
        let image = BinaryImage::new(0x1000, scenario_bytes());
        let scan = scanner::scan(&image, &[0x1000]);
        let job = RelocationJob {
            original_base: 0x1000,
            data_end: 0x1010,
            new_base: 0x3000,
            sid_offset: 0,
            entry_points: BTreeSet::from([0x1000]),
            bytes: scenario_bytes(),
        };
        let mut buffer = scenario_bytes();
        let mut stats = RelocationStats::default();
        run(&image, &job, &scan, &mut buffer, &mut stats);

        assert_eq!(&buffer[1..3], &[0x05, 0x30]);
        assert_eq!(&buffer[7..10], &[0x8D, 0x00, 0xD4]); // sid_offset 0, untouched
        assert_eq!(stats.reloc_count, 1);
        assert_eq!(stats.sid_patch_count, 0);
    }

    #[test]
    fn scenario_2_sid_only_patch() {
        let image = BinaryImage::new(0x1000, scenario_bytes());
        let scan = scanner::scan(&image, &[0x1000]);
        let job = RelocationJob {
            original_base: 0x1000,
            data_end: 0x1010,
            new_base: 0x1000,
            sid_offset: 0x20,
            entry_points: BTreeSet::from([0x1000]),
            bytes: scenario_bytes(),
        };
        let mut buffer = scenario_bytes();
        let mut stats = RelocationStats::default();
        run(&image, &job, &scan, &mut buffer, &mut stats);

        assert_eq!(&buffer[8..10], &[0x20, 0xD4]);
        assert_eq!(&buffer[1..3], &[0x05, 0x10]); // delta 0, untouched
        assert_eq!(stats.reloc_count, 0);
        assert_eq!(stats.sid_patch_count, 1);
    }

    #[test]
    fn scenario_3_both() {
        let image = BinaryImage::new(0x1000, scenario_bytes());
        let scan = scanner::scan(&image, &[0x1000]);
        let job = RelocationJob {
            original_base: 0x1000,
            data_end: 0x1010,
            new_base: 0x3000,
            sid_offset: 0x40,
            entry_points: BTreeSet::from([0x1000]),
            bytes: scenario_bytes(),
        };
        let mut buffer = scenario_bytes();
        let mut stats = RelocationStats::default();
        run(&image, &job, &scan, &mut buffer, &mut stats);

        assert_eq!(&buffer[1..3], &[0x05, 0x30]);
        assert_eq!(&buffer[8..10], &[0x40, 0xD4]);
        assert_eq!(stats.reloc_count, 1);
        assert_eq!(stats.sid_patch_count, 1);
    }
}
