//! Recursive-descent scanner.
//!
//! From a seed set of entry-point addresses, walks static control flow
//! to produce the exact byte-set reachable as instructions. This is the
//! only component in the crate permitted to guess: the jump-table
//! discovery aid below is a heuristic, clearly marked as such, and
//! everything else is a direct consequence of decoding bytes the
//! decoder table already committed to.

use crate::decoder::{self, ControlFlow};
use crate::types::{BinaryImage, ScanResult};
use std::collections::{HashSet, VecDeque};

/// Scan `image` starting from `entry_points`, returning the code-offset
/// and instruction-start sets.
///
/// Entry points outside the image are silently dropped; an empty result
/// set is valid output, not an error — the caller is expected to have
/// already rejected jobs with no in-range entry points via
/// [`crate::types::RelocationJob::validate`].
pub fn scan(image: &BinaryImage, entry_points: &[u16]) -> ScanResult {
    let mut result = ScanResult::default();
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut queued: HashSet<usize> = HashSet::new();

    for &entry in entry_points {
        if let Some(offset) = image.offset_of(entry) {
            if queued.insert(offset) {
                queue.push_back(offset);
            }
        }
    }

    while let Some(start) = queue.pop_front() {
        walk_path(image, start, &mut result, &mut queue, &mut queued);
    }

    result
}

/// Walk one control-flow path linearly from `start`, enqueuing branch
/// targets as new paths, until the path merges with known code, reads
/// an undefined opcode, runs off the end of the image, or reaches a
/// path-terminating instruction.
fn walk_path(
    image: &BinaryImage,
    start: usize,
    result: &mut ScanResult,
    queue: &mut VecDeque<usize>,
    queued: &mut HashSet<usize>,
) {
    let mut cursor = start;

    loop {
        if result.is_instruction_start(cursor) {
            return;
        }

        let Some(opcode) = image.byte(cursor) else {
            return;
        };
        let Some(info) = decoder::decode(opcode) else {
            return;
        };
        let len = info.len();
        if cursor + len > image.len() {
            return;
        }

        for k in cursor..cursor + len {
            result.code_offsets.insert(k);
        }
        result.instruction_starts.insert(cursor);

        match decoder::control_flow(info) {
            ControlFlow::RelativeBranch => {
                let displacement = image.byte(cursor + 1).unwrap_or(0) as i8;
                let next = cursor + 2;
                let target = (next as i64) + (displacement as i64);
                if target >= 0 && (target as usize) < image.len() {
                    enqueue(target as usize, queue, queued);
                }
                cursor = next;
            }
            ControlFlow::AbsoluteJump => {
                if let Some(target_addr) = image.word(cursor + 1) {
                    if let Some(target) = image.offset_of(target_addr) {
                        enqueue(target, queue, queued);
                    }
                }
                return;
            }
            ControlFlow::IndirectJump => {
                return;
            }
            ControlFlow::AbsoluteCall => {
                if let Some(target_addr) = image.word(cursor + 1) {
                    if let Some(target) = image.offset_of(target_addr) {
                        enqueue(target, queue, queued);
                    }
                }
                cursor += len;
            }
            ControlFlow::Terminate => {
                return;
            }
            ControlFlow::Continue => {
                cursor += len;
            }
        }
    }
}

fn enqueue(offset: usize, queue: &mut VecDeque<usize>, queued: &mut HashSet<usize>) {
    if queued.insert(offset) {
        queue.push_back(offset);
    }
}

/// Inspect the image's first twelve bytes for a jump-table pattern —
/// three consecutive three-byte absolute `JMP` instructions — and
/// return their targets. This is the only heuristic the scanner stage
/// is permitted to apply; callers opt in via
/// [`crate::types::RelocatorOptions::discover_jump_table_entries`].
pub fn discover_jump_table_entries(image: &BinaryImage) -> Vec<u16> {
    const PREFIX_LEN: usize = 12;
    if image.len() < PREFIX_LEN {
        return Vec::new();
    }

    let mut targets = Vec::with_capacity(3);
    for slot in 0..3 {
        let offset = slot * 3;
        let Some(opcode) = image.byte(offset) else {
            return Vec::new();
        };
        let Some(info) = decoder::decode(opcode) else {
            return Vec::new();
        };
        if info.mnemonic != "JMP" || info.mode != decoder::AddressingMode::Absolute {
            return Vec::new();
        }
        match image.word(offset + 1) {
            Some(target) => targets.push(target),
            None => return Vec::new(),
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_bytes() -> Vec<u8> {
        vec![
            0x4C, 0x05, 0x10, 0x00, 0x00, 0xA9, 0x00, 0x8D, 0x00, 0xD4, 0x60, 0x00, 0x00, 0x00,
            0x00, 0x00,
        ]
    }

    #[test]
    fn linear_scan_with_jump_and_return() {
        let image = BinaryImage::new(0x1000, scenario_bytes());
        let result = scan(&image, &[0x1000]);

        // JMP $1005 at offset 0..3
        assert!(result.is_instruction_start(0));
        assert!(result.code_offsets.contains(&0));
        assert!(result.code_offsets.contains(&1));
        assert!(result.code_offsets.contains(&2));

        // bytes 3,4 are unreached data
        assert!(!result.code_offsets.contains(&3));
        assert!(!result.code_offsets.contains(&4));

        // LDA #$00 at offset 5..7
        assert!(result.is_instruction_start(5));
        // STA $D400 at offset 7..10
        assert!(result.is_instruction_start(7));
        assert!(result.code_offsets.contains(&7));
        assert!(result.code_offsets.contains(&8));
        assert!(result.code_offsets.contains(&9));
        // RTS at offset 10
        assert!(result.is_instruction_start(10));
        assert!(result.code_offsets.contains(&10));

        // trailing zero bytes are unreached data
        for offset in 11..16 {
            assert!(!result.code_offsets.contains(&offset));
        }
    }

    #[test]
    fn undefined_entry_point_yields_empty_result() {
        let image = BinaryImage::new(0x1000, scenario_bytes());
        let result = scan(&image, &[0x2000]);
        assert!(result.code_offsets.is_empty());
        assert!(result.instruction_starts.is_empty());
    }

    #[test]
    fn jam_terminates_the_path() {
        // NOP then JAM
        let image = BinaryImage::new(0x1000, vec![0xEA, 0x02, 0xEA]);
        let result = scan(&image, &[0x1000]);
        assert!(result.is_instruction_start(0));
        assert!(result.is_instruction_start(1));
        assert!(!result.code_offsets.contains(&2));
    }

    #[test]
    fn relative_branch_enqueues_target_and_continues() {
        // BEQ +2 (skips the following two-byte NOP-immediate-like illegal op),
        // then RTS at the fallthrough, RTS at the branch target.
        let image = BinaryImage::new(0x1000, vec![0xF0, 0x02, 0xEA, 0xEA, 0x60]);
        let result = scan(&image, &[0x1000]);
        assert!(result.is_instruction_start(0)); // BEQ
        assert!(result.is_instruction_start(2)); // fallthrough NOP
        assert!(result.is_instruction_start(3)); // fallthrough NOP
        assert!(result.is_instruction_start(4)); // branch target RTS
    }

    #[test]
    fn instruction_starts_are_subset_of_code_offsets() {
        let image = BinaryImage::new(0x1000, scenario_bytes());
        let result = scan(&image, &[0x1000]);
        for start in &result.instruction_starts {
            assert!(result.code_offsets.contains(start));
        }
    }

    #[test]
    fn jump_table_prefix_detected() {
        let mut bytes = vec![
            0x4C, 0x00, 0x20, // JMP $2000
            0x4C, 0x10, 0x20, // JMP $2010
            0x4C, 0x20, 0x20, // JMP $2020
        ];
        bytes.resize(12, 0);
        let image = BinaryImage::new(0x1000, bytes);
        let targets = discover_jump_table_entries(&image);
        assert_eq!(targets, vec![0x2000, 0x2010, 0x2020]);
    }

    #[test]
    fn jump_table_prefix_rejected_when_not_all_jmp() {
        let mut bytes = vec![0x4C, 0x00, 0x20, 0xEA, 0xEA, 0xEA, 0x4C, 0x20, 0x20];
        bytes.resize(12, 0);
        let image = BinaryImage::new(0x1000, bytes);
        assert!(discover_jump_table_entries(&image).is_empty());
    }
}
