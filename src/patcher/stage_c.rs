//! Stage C — data byte rewriting.
//!
//! Consumes Stage B's table discovery and rewrites the hi-bytes it
//! confirms (plus, when enabled, the tables it could only classify as
//! "unclassified") by the relocation's hi-byte delta. Every rewrite goes
//! through the same idempotence guard: a byte is only ever touched if its
//! current value still equals the original image's value at that offset.

use crate::patcher::stage_b::TableDiscovery;
use crate::types::{BinaryImage, PatchCategory, PatchLogEntry, RelocationJob, RelocationStats};
use std::collections::HashSet;

/// Output of Stage C: log lines and patch-log entries it contributed.
pub struct StageCOutput {
    /// Human-readable lines, one per data byte rewritten or table rejected.
    pub log: Vec<String>,
    /// Structured record of every data byte this stage rewrote.
    pub patches: Vec<PatchLogEntry>,
}

/// Rewrite `buffer` in place per Stage C's three categories, in order.
/// `code_offsets` is the scanner's code-offset set, used to keep Stage C
/// from ever touching an opcode or operand byte. `allow_heuristic_fallback`
/// gates category 3.
pub fn run(
    image: &BinaryImage,
    job: &RelocationJob,
    discovery: &TableDiscovery,
    code_offsets: &HashSet<usize>,
    allow_heuristic_fallback: bool,
    buffer: &mut [u8],
    stats: &mut RelocationStats,
) -> StageCOutput {
    let mut log = Vec::new();
    let mut patches = Vec::new();
    let hi_delta = job.hi_delta();

    if job.delta() == 0 {
        return StageCOutput { log, patches };
    }

    let orig_hi_lo = (job.original_base >> 8) as u8;
    let orig_hi_hi = ((job.data_end - 1) >> 8) as u8;
    let in_range = |hi: u8| hi >= orig_hi_lo && hi <= orig_hi_hi;

    let mut already_patched: HashSet<usize> = HashSet::new();

    // Category 1 — confirmed split hi-byte tables.
    for table in &discovery.hi_tables {
        let Some(base_off) = image.offset_of(table.base) else {
            continue;
        };
        for offset in base_off..(base_off + table.size).min(image.len()) {
            if code_offsets.contains(&offset) || already_patched.contains(&offset) {
                continue;
            }
            let Some(current) = image.byte(offset) else {
                continue;
            };
            if !in_range(current) {
                continue;
            }
            if patch_byte(
                image,
                buffer,
                offset,
                hi_delta,
                PatchCategory::SplitHiByteTable,
                &mut log,
                &mut patches,
                stats,
            ) {
                already_patched.insert(offset);
            }
        }
    }

    // Category 2 — interleaved tables, at least two valid pairs required.
    for table in &discovery.interleaved {
        let Some(lo_off) = image.offset_of(table.lo_base) else {
            continue;
        };
        let size = table.size.min(image.len().saturating_sub(lo_off));
        let mut valid_pairs = Vec::new();
        let mut pair_off = 0;
        while pair_off + 1 < size {
            let lo = lo_off + pair_off;
            let hi = lo + 1;
            if !code_offsets.contains(&lo) && !code_offsets.contains(&hi) {
                if let Some(word) = image.word(lo) {
                    if word >= job.original_base && word < job.data_end {
                        valid_pairs.push(hi);
                    }
                }
            }
            pair_off += 2;
        }

        if valid_pairs.len() < 2 {
            log.push(format!(
                "0x{:04X}: interleaved table rejected ({} valid pair(s), need 2)",
                table.lo_base,
                valid_pairs.len()
            ));
            continue;
        }

        for hi_offset in valid_pairs {
            if already_patched.contains(&hi_offset) {
                continue;
            }
            let Some(current) = image.byte(hi_offset) else {
                continue;
            };
            if !in_range(current) {
                continue;
            }
            if patch_byte(
                image,
                buffer,
                hi_offset,
                hi_delta,
                PatchCategory::InterleavedTable,
                &mut log,
                &mut patches,
                stats,
            ) {
                already_patched.insert(hi_offset);
            }
        }
    }

    // Category 3 — heuristic fallback over unclassified tables.
    if allow_heuristic_fallback {
        for table in &discovery.unclassified {
            let Some(base_off) = image.offset_of(table.base) else {
                continue;
            };
            let end = (base_off + table.size).min(image.len());
            let mut collected = Vec::new();
            for offset in base_off..end {
                if code_offsets.contains(&offset) {
                    break;
                }
                if let Some(byte) = image.byte(offset) {
                    collected.push((offset, byte));
                }
            }

            if !passes_heuristic(&collected, orig_hi_lo, orig_hi_hi) {
                log.push(format!(
                    "0x{:04X}: unclassified table rejected by heuristic",
                    table.base
                ));
                continue;
            }

            for (offset, current) in collected {
                if already_patched.contains(&offset) || !in_range(current) {
                    continue;
                }
                if patch_byte(
                    image,
                    buffer,
                    offset,
                    hi_delta,
                    PatchCategory::HeuristicFallback,
                    &mut log,
                    &mut patches,
                    stats,
                ) {
                    already_patched.insert(offset);
                }
            }
        }
    }

    StageCOutput { log, patches }
}

/// Apply the §4.3.3 heuristic fallback tests. All must pass.
fn passes_heuristic(collected: &[(usize, u8)], orig_hi_lo: u8, orig_hi_hi: u8) -> bool {
    if collected.len() < 3 {
        return false;
    }
    let in_range: Vec<u8> = collected
        .iter()
        .map(|&(_, b)| b)
        .filter(|&b| b >= orig_hi_lo && b <= orig_hi_hi)
        .collect();

    if in_range.len() < 3 {
        return false;
    }
    if (in_range.len() as f64) < 0.30 * collected.len() as f64 {
        return false;
    }

    let distinct: HashSet<u8> = in_range.iter().copied().collect();
    if distinct.len() < 2 {
        return false;
    }

    let non_decreasing = in_range.windows(2).all(|w| w[0] <= w[1]);
    let non_increasing = in_range.windows(2).all(|w| w[0] >= w[1]);
    if non_decreasing || non_increasing {
        return false;
    }

    true
}

/// Rewrite one byte by `hi_delta`, guarded by idempotence: only if the
/// buffer's current value still equals the original image's value there.
/// Returns whether a rewrite actually happened.
#[allow(clippy::too_many_arguments)]
fn patch_byte(
    image: &BinaryImage,
    buffer: &mut [u8],
    offset: usize,
    hi_delta: u8,
    category: PatchCategory,
    log: &mut Vec<String>,
    patches: &mut Vec<PatchLogEntry>,
    stats: &mut RelocationStats,
) -> bool {
    let Some(original) = image.byte(offset) else {
        return false;
    };
    if buffer[offset] != original {
        return false;
    }
    let new_value = original.wrapping_add(hi_delta);
    if new_value == original {
        return false;
    }

    buffer[offset] = new_value;
    stats.data_hib_patches += 1;
    log.push(format!(
        "0x{:04X}: data byte 0x{:02X} -> 0x{:02X} ({:?})",
        image.addr_of(offset),
        original,
        new_value,
        category
    ));
    patches.push(PatchLogEntry {
        offset,
        category,
        before: original,
        after: new_value,
    });
    true
}
