//! Assembler include-file generator.
//!
//! Renders a KickAssembler-style `.asm` listing of named constants for a
//! batch of relocated tunes, so a hand-written player loop can `.import`
//! each relocated binary without hardcoding its addresses. Purely a
//! text-rendering concern; it reads [`RelocationJob`]/[`RelocationResult`]
//! fields and writes strings, nothing more.

use crate::plan::PlanEntry;
use crate::types::{RelocationJob, RelocationResult};
use std::fmt::Write as _;

/// One tune's worth of data the include-file renderer needs: its plan
/// entry (for the output path and SID offset), its job (for addresses),
/// and its result (for entry-point-adjacent statistics, if wanted).
pub struct IncludeEntry<'a> {
    /// Constant-name prefix for this tune, e.g. `"tune1"`.
    pub label: String,
    /// The plan record this tune was relocated from.
    pub entry: &'a PlanEntry,
    /// The job describing its addresses and relocation delta.
    pub job: &'a RelocationJob,
    /// The relocation outcome, for result-derived constants.
    pub result: &'a RelocationResult,
}

/// Render a batch of relocated tunes as a single `.asm` include file.
pub fn render(entries: &[IncludeEntry<'_>]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "// generated by sid-relocate; do not edit by hand");
    let _ = writeln!(out, "// {} tune(s)", entries.len());
    out.push('\n');

    for e in entries {
        let upper = e.label.to_ascii_uppercase();
        let _ = writeln!(out, ".const {upper}_BASE = ${:04x}", e.job.new_base);
        let _ = writeln!(
            out,
            ".const {upper}_SID_OFFSET = ${:02x}",
            e.entry.sid_offset
        );
        let init = e
            .job
            .entry_points
            .iter()
            .next()
            .copied()
            .unwrap_or(e.job.new_base);
        let init_reloc = (init as i32 + e.job.delta()) as u16;
        let _ = writeln!(out, ".const {upper}_INIT = ${:04x}", init_reloc);
        let _ = writeln!(
            out,
            ".const {upper}_RELOC_COUNT = {}",
            e.result.stats.reloc_count
        );
        let _ = writeln!(out, "// output: {}", e.entry.output.display());
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelocationStats;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    #[test]
    fn renders_one_tune() {
        let entry = PlanEntry {
            source: PathBuf::from("tune.sid"),
            new_base: 0x3000,
            sid_offset: 0x20,
            output: PathBuf::from("tune.bin"),
            data_end: None,
            extra_entry_points: vec![],
        };
        let job = RelocationJob {
            original_base: 0x1000,
            data_end: 0x1010,
            new_base: 0x3000,
            sid_offset: 0x20,
            entry_points: BTreeSet::from([0x1000]),
            bytes: vec![0u8; 0x10],
        };
        let result = RelocationResult {
            bytes: vec![0u8; 0x10],
            log: vec![],
            patches: vec![],
            stats: RelocationStats {
                reloc_count: 3,
                ..RelocationStats::default()
            },
        };
        let rendered = render(&[IncludeEntry {
            label: "tune1".to_string(),
            entry: &entry,
            job: &job,
            result: &result,
        }]);
        assert!(rendered.contains(".const TUNE1_BASE = $3000"));
        assert!(rendered.contains(".const TUNE1_SID_OFFSET = $20"));
        assert!(rendered.contains(".const TUNE1_INIT = $3000"));
        assert!(rendered.contains(".const TUNE1_RELOC_COUNT = 3"));
        assert!(rendered.contains("tune.bin"));
    }
}
