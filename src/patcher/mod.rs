//! The relocator/patcher: the three-stage pipeline that turns a
//! [`RelocationJob`] into a [`RelocationResult`].
//!
//! `relocate` is the single entry point collaborators call. It never
//! fails once a job has passed [`RelocationJob::validate`]; every
//! remaining ambiguity resolves to "leave unchanged" per §4.4.

pub mod stage_a;
pub mod stage_b;
pub mod stage_c;

use crate::error::Result;
use crate::scanner;
use crate::types::{RelocationJob, RelocationResult, RelocationStats, RelocatorOptions};

/// Relocate one tune according to `job` and `options`.
///
/// Runs the recursive-descent scanner once, then Stage A (code operand
/// rewriting), Stage B (data pointer table discovery, skipped when the
/// delta is zero), and Stage C (data byte rewriting) in that fixed
/// order. Returns the patched bytes, a combined human-readable log, and
/// run statistics.
pub fn relocate(job: &RelocationJob, options: &RelocatorOptions) -> Result<RelocationResult> {
    job.validate()?;

    let image = job.image();
    let mut entry_points: Vec<u16> = job.entry_points.iter().copied().collect();
    if options.discover_jump_table_entries {
        entry_points.extend(scanner::discover_jump_table_entries(&image));
    }

    let scan = scanner::scan(&image, &entry_points);

    let mut buffer = job.bytes.clone();
    let mut stats = RelocationStats {
        code_bytes: scan.code_offsets.len(),
        data_bytes: image.len() - scan.code_offsets.len(),
        ..RelocationStats::default()
    };

    let mut log = Vec::new();
    let mut patches = Vec::new();

    let a_out = stage_a::run(&image, job, &scan, &mut buffer, &mut stats);
    log.extend(a_out.log);
    patches.extend(a_out.patches);

    if job.delta() != 0 {
        let discovery = stage_b::discover(&image, &scan);
        let c_out = stage_c::run(
            &image,
            job,
            &discovery,
            &scan.code_offsets,
            options.allow_heuristic_fallback,
            &mut buffer,
            &mut stats,
        );
        log.extend(c_out.log);
        patches.extend(c_out.patches);
    }

    Ok(RelocationResult {
        bytes: buffer,
        log,
        patches,
        stats,
    })
}

/// Relocate every job in `jobs` with the same options, returning results
/// in the same order as the input.
///
/// Each invocation of [`relocate`] owns its own scanner sets and byte
/// buffer and shares no memory with any other, so batch-level
/// parallelism is always safe (§5). With the `parallel-batch` feature
/// enabled, this runs the batch across a `rayon` thread pool; without
/// it, jobs are relocated sequentially in order. Either way the result
/// vector is identical.
#[cfg(feature = "parallel-batch")]
pub fn relocate_all(jobs: &[RelocationJob], options: &RelocatorOptions) -> Vec<Result<RelocationResult>> {
    use rayon::prelude::*;
    jobs.par_iter().map(|job| relocate(job, options)).collect()
}

/// Sequential fallback used when the `parallel-batch` feature is off.
#[cfg(not(feature = "parallel-batch"))]
pub fn relocate_all(jobs: &[RelocationJob], options: &RelocatorOptions) -> Vec<Result<RelocationResult>> {
    jobs.iter().map(|job| relocate(job, options)).collect()
}
