//! SID Tune Static Relocator
//!
//! Relocates C64 music-driver binaries packaged in the PSID/RSID
//! container format so multiple tunes can coexist in one memory image,
//! each driving a different SID sound chip instance at a distinct I/O
//! page. Given a tune originally linked at base address `B`, this crate
//! produces an equivalent binary linked at a new base `B'` with every
//! internal code reference, internal data pointer, and SID register
//! access rewritten to match the new layout.
//!
//! # The core
//!
//! The hard part is the **static relocator**: a recursive-descent 6502
//! disassembler ([`scanner`]) built on a total instruction decoder
//! ([`decoder`]), feeding a three-stage patcher ([`patcher`]) that
//! rewrites code operands, discovers data pointer tables by code-flow
//! inspection, and rewrites only the bytes it can prove are pointers.
//! The core never executes or emulates 6502 code, never resolves
//! indirect jumps, and never touches a byte it cannot classify with
//! certainty.
//!
//! # Quick Start
//!
//! ```rust
//! use sid_relocator::{relocate, RelocationJob, RelocatorOptions};
//! use std::collections::BTreeSet;
//!
//! let job = RelocationJob {
//!     original_base: 0x1000,
//!     data_end: 0x1010,
//!     new_base: 0x3000,
//!     sid_offset: 0x20,
//!     entry_points: BTreeSet::from([0x1000]),
//!     bytes: vec![
//!         0x4C, 0x05, 0x10, 0x00, 0x00, 0xA9, 0x00, 0x8D, 0x00, 0xD4, 0x60,
//!         0x00, 0x00, 0x00, 0x00, 0x00,
//!     ],
//! };
//! let result = relocate(&job, &RelocatorOptions::new())?;
//! assert_eq!(result.bytes.len(), job.bytes.len());
//! # Ok::<(), sid_relocator::RelocatorError>(())
//! ```
//!
//! # Collaborators
//!
//! [`container`] reads the PSID/RSID fixed header and strips the PSID v1
//! embedded load-address prefix; [`plan`] turns a batch document plus a
//! parsed header into [`RelocationJob`]s; [`incfile`] renders a
//! KickAssembler-style include listing of a batch's output addresses;
//! [`formatter`] renders a [`RelocationResult`] as human or JSON text.
//! None of these participate in the core's correctness invariants — they
//! exist so the crate is runnable end to end.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]

pub mod container;
pub mod decoder;
pub mod error;
pub mod formatter;
pub mod incfile;
pub mod patcher;
pub mod plan;
pub mod scanner;
pub mod types;

pub use error::{RelocatorError, Result};
pub use patcher::{relocate, relocate_all};
pub use types::{
    BinaryImage, PatchCategory, PatchLogEntry, RelocationJob, RelocationResult, RelocationStats,
    RelocatorOptions, ScanResult, LEGAL_SID_OFFSETS, SID_BASE, SID_WINDOW_END,
};

/// Get version information for this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_version() {
        let v = version();
        assert!(!v.is_empty());
    }

    #[test]
    fn quick_start_example_relocates() {
        let job = RelocationJob {
            original_base: 0x1000,
            data_end: 0x1010,
            new_base: 0x3000,
            sid_offset: 0x20,
            entry_points: BTreeSet::from([0x1000]),
            bytes: vec![
                0x4C, 0x05, 0x10, 0x00, 0x00, 0xA9, 0x00, 0x8D, 0x00, 0xD4, 0x60, 0x00, 0x00,
                0x00, 0x00, 0x00,
            ],
        };
        let result = relocate(&job, &RelocatorOptions::new()).unwrap();
        assert_eq!(result.bytes.len(), job.bytes.len());
        assert_eq!(result.stats.sid_patch_count, 1);
        assert_eq!(result.stats.reloc_count, 1);
    }
}
