//! Output formatters for relocation results.
//!
//! Trait-based split between human-readable and JSON rendering, matching
//! the shape of a report over a [`RelocationResult`]: one method per
//! section, with a default `format_report` that concatenates them.

use crate::types::{PatchCategory, RelocationResult, RelocationStats};
use std::path::Path;

/// Formats a single tune's relocation outcome for display.
pub trait ReportFormatter {
    /// Format the source/destination file header line.
    fn format_header(&self, source: &Path, output: &Path) -> String;

    /// Format the statistics summary.
    fn format_stats(&self, stats: &RelocationStats) -> String;

    /// Format the patch log, or `None` if it should be omitted (e.g. a
    /// quiet human formatter).
    fn format_log(&self, log: &[String]) -> Option<String>;

    /// Format the complete report for one tune.
    ///
    /// Default implementation concatenates header, stats, and (if
    /// present) the log.
    fn format_report(&self, result: &RelocationResult, source: &Path, output: &Path) -> String {
        let mut parts = vec![
            self.format_header(source, output),
            self.format_stats(&result.stats),
        ];
        if let Some(log) = self.format_log(&result.log) {
            parts.push(log);
        }
        parts.join("\n")
    }
}

/// Verbose, human-oriented report.
#[derive(Debug, Clone, Copy, Default)]
pub struct HumanFormatter {
    /// Whether to include the full patch log.
    pub verbose: bool,
}

impl HumanFormatter {
    /// A formatter that only prints the summary, no per-patch log.
    pub fn quiet() -> Self {
        Self { verbose: false }
    }

    /// A formatter that also prints every log line.
    pub fn verbose() -> Self {
        Self { verbose: true }
    }
}

impl ReportFormatter for HumanFormatter {
    fn format_header(&self, source: &Path, output: &Path) -> String {
        format!("{} -> {}", source.display(), output.display())
    }

    fn format_stats(&self, stats: &RelocationStats) -> String {
        let mut lines = vec![
            format!("  code bytes:        {}", stats.code_bytes),
            format!("  data bytes:        {}", stats.data_bytes),
            format!("  code relocations:  {}", stats.reloc_count),
            format!("  SID patches:       {}", stats.sid_patch_count),
            format!("  data hi-byte fixes:{}", stats.data_hib_patches),
        ];
        if !stats.sid_refs.is_empty() {
            let mut refs: Vec<_> = stats.sid_refs.iter().collect();
            refs.sort_by_key(|(addr, _)| **addr);
            let rendered: Vec<String> = refs
                .iter()
                .map(|(addr, count)| format!("0x{addr:04X}={count}"))
                .collect();
            lines.push(format!("  SID refs:          {}", rendered.join(", ")));
        }
        lines.join("\n")
    }

    fn format_log(&self, log: &[String]) -> Option<String> {
        if !self.verbose || log.is_empty() {
            return None;
        }
        let mut lines = vec!["  log:".to_string()];
        lines.extend(log.iter().map(|line| format!("    {line}")));
        Some(lines.join("\n"))
    }
}

/// JSON report formatter, suitable for machine consumption.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter {
    /// Whether to include the full patch log in the JSON payload.
    pub include_log: bool,
}

#[derive(serde::Serialize)]
struct JsonReport<'a> {
    source: String,
    output: String,
    code_bytes: usize,
    data_bytes: usize,
    reloc_count: u32,
    sid_patch_count: u32,
    data_hib_patches: u32,
    sid_refs: Vec<(String, u32)>,
    category_counts: Vec<(&'static str, usize)>,
    log: Option<&'a [String]>,
}

impl JsonFormatter {
    /// Serialize one tune's report as pretty-printed JSON.
    pub fn render(
        &self,
        result: &RelocationResult,
        source: &Path,
        output: &Path,
    ) -> serde_json::Result<String> {
        let mut refs: Vec<(String, u32)> = result
            .stats
            .sid_refs
            .iter()
            .map(|(addr, count)| (format!("0x{addr:04X}"), *count))
            .collect();
        refs.sort();

        let report = JsonReport {
            source: source.display().to_string(),
            output: output.display().to_string(),
            code_bytes: result.stats.code_bytes,
            data_bytes: result.stats.data_bytes,
            reloc_count: result.stats.reloc_count,
            sid_patch_count: result.stats.sid_patch_count,
            data_hib_patches: result.stats.data_hib_patches,
            sid_refs: refs,
            category_counts: category_counts(result),
            log: self.include_log.then_some(result.log.as_slice()),
        };

        serde_json::to_string_pretty(&report)
    }
}

fn category_counts(result: &RelocationResult) -> Vec<(&'static str, usize)> {
    let categories = [
        PatchCategory::SidRegister,
        PatchCategory::CodeRelocation,
        PatchCategory::SplitHiByteTable,
        PatchCategory::InterleavedTable,
        PatchCategory::HeuristicFallback,
    ];
    categories
        .into_iter()
        .map(|category| {
            let count = result
                .patches
                .iter()
                .filter(|patch| patch.category == category)
                .count();
            (category_name(category), count)
        })
        .filter(|(_, count)| *count > 0)
        .collect()
}

fn category_name(category: PatchCategory) -> &'static str {
    match category {
        PatchCategory::SidRegister => "sid_register",
        PatchCategory::CodeRelocation => "code_relocation",
        PatchCategory::SplitHiByteTable => "split_hi_byte_table",
        PatchCategory::InterleavedTable => "interleaved_table",
        PatchCategory::HeuristicFallback => "heuristic_fallback",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PatchLogEntry, RelocationStats};
    use std::path::PathBuf;

    fn sample_result() -> RelocationResult {
        RelocationResult {
            bytes: vec![0u8; 4],
            log: vec!["0x1000: JMP operand 0x1005 -> 0x3005 (code relocation)".to_string()],
            patches: vec![PatchLogEntry {
                offset: 1,
                category: PatchCategory::CodeRelocation,
                before: 0x05,
                after: 0x05,
            }],
            stats: RelocationStats {
                code_bytes: 10,
                data_bytes: 6,
                reloc_count: 1,
                sid_patch_count: 0,
                data_hib_patches: 0,
                sid_refs: Default::default(),
            },
        }
    }

    #[test]
    fn human_quiet_omits_log() {
        let formatter = HumanFormatter::quiet();
        let report = formatter.format_report(
            &sample_result(),
            &PathBuf::from("in.sid"),
            &PathBuf::from("out.bin"),
        );
        assert!(report.contains("in.sid -> out.bin"));
        assert!(report.contains("code relocations:  1"));
        assert!(!report.contains("log:"));
    }

    #[test]
    fn human_verbose_includes_log() {
        let formatter = HumanFormatter::verbose();
        let report = formatter.format_report(
            &sample_result(),
            &PathBuf::from("in.sid"),
            &PathBuf::from("out.bin"),
        );
        assert!(report.contains("log:"));
        assert!(report.contains("code relocation"));
    }

    #[test]
    fn json_formatter_round_trips_through_serde() {
        let formatter = JsonFormatter { include_log: true };
        let json = formatter
            .render(&sample_result(), &PathBuf::from("in.sid"), &PathBuf::from("out.bin"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["reloc_count"], 1);
        assert_eq!(value["source"], "in.sid");
        assert!(value["log"].is_array());
    }

    #[test]
    fn json_formatter_omits_log_when_disabled() {
        let formatter = JsonFormatter { include_log: false };
        let json = formatter
            .render(&sample_result(), &PathBuf::from("in.sid"), &PathBuf::from("out.bin"))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["log"].is_null());
    }
}
