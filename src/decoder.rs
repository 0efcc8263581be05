//! 6502 instruction decoder.
//!
//! Maps each of the 256 opcode byte values to a `(mnemonic, addressing
//! mode)` pair. The table is total: the NMOS 6502 used in the C64
//! decodes every byte as *some* instruction, including the documented
//! illegal/unofficial opcodes (SLO, RLA, SRE, RRA, SAX, LAX, DCP, ISC,
//! ANC, ALR, ARR, ANE, LXA, SBX, the unofficial SBC at 0xEB, SHA, SHY,
//! SHX, TAS, LAS), the many NOP variants, and the JAM/KIL halt family.
//! Lookup is a single array index — no branching, no allocation.

use serde::{Deserialize, Serialize};

/// Addressing mode tag. Closed set of 13; each has a fixed instruction
/// length in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressingMode {
    /// No operand (e.g. `CLC`).
    Implied,
    /// Operand is the accumulator (e.g. `ASL A`).
    Accumulator,
    /// 8-bit immediate operand.
    Immediate,
    /// 8-bit zero-page address.
    ZeroPage,
    /// 8-bit zero-page address, indexed by X.
    ZeroPageX,
    /// 8-bit zero-page address, indexed by Y.
    ZeroPageY,
    /// 16-bit absolute address.
    Absolute,
    /// 16-bit absolute address, indexed by X.
    AbsoluteX,
    /// 16-bit absolute address, indexed by Y.
    AbsoluteY,
    /// 16-bit absolute address, indirected through memory (`JMP ($addr)`).
    Indirect,
    /// 8-bit zero-page address, indexed by X before indirection.
    IndirectX,
    /// 8-bit zero-page address, indirected then indexed by Y.
    IndirectY,
    /// 8-bit signed displacement relative to the following instruction.
    Relative,
}

impl AddressingMode {
    /// Fixed instruction length in bytes for this addressing mode.
    pub const fn len(self) -> usize {
        match self {
            Self::Implied | Self::Accumulator => 1,
            Self::Immediate
            | Self::ZeroPage
            | Self::ZeroPageX
            | Self::ZeroPageY
            | Self::IndirectX
            | Self::IndirectY
            | Self::Relative => 2,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::Indirect => 3,
        }
    }

    /// Whether this mode's operand is a 16-bit absolute address and
    /// therefore a candidate for relocation rewriting.
    pub const fn has_absolute_operand(self) -> bool {
        matches!(
            self,
            Self::Absolute | Self::AbsoluteX | Self::AbsoluteY | Self::Indirect
        )
    }

    /// Whether this mode indexes a base address by X or Y
    /// (`LDA/LDX/LDY addr,X` / `addr,Y`), the access pattern Stage B
    /// looks for when discovering pointer tables.
    pub const fn is_absolute_indexed(self) -> bool {
        matches!(self, Self::AbsoluteX | Self::AbsoluteY)
    }
}

/// A decoded instruction record: mnemonic plus addressing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeInfo {
    /// Short mnemonic, e.g. `"LDA"`, `"SLO"`, `"JAM"`.
    pub mnemonic: &'static str,
    /// Addressing mode of this opcode variant.
    pub mode: AddressingMode,
}

impl OpcodeInfo {
    /// Instruction length in bytes, derived from the addressing mode.
    pub const fn len(self) -> usize {
        self.mode.len()
    }
}

/// Control-flow effect of a decoded instruction, per §4.2 of the
/// relocation spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlFlow {
    /// Falls through to the next instruction.
    Continue,
    /// Conditional relative branch (BPL, BMI, BVC, BVS, BCC, BCS, BNE, BEQ).
    RelativeBranch,
    /// Unconditional absolute jump (`JMP addr`).
    AbsoluteJump,
    /// Indirect jump (`JMP (addr)`) — target unknowable statically.
    IndirectJump,
    /// Subroutine call (`JSR addr`).
    AbsoluteCall,
    /// Path-terminating instruction: RTS, RTI, BRK, or JAM/KIL.
    Terminate,
}

/// Classify the control-flow effect of a decoded instruction.
///
/// Pure function of mnemonic and addressing mode — no table lookup by
/// opcode byte is needed since the classification only depends on
/// which instruction was decoded, not which byte encoded it.
pub const fn control_flow(info: OpcodeInfo) -> ControlFlow {
    match info.mode {
        AddressingMode::Relative => ControlFlow::RelativeBranch,
        _ => match info.mnemonic.as_bytes() {
            b"JMP" => {
                if matches!(info.mode, AddressingMode::Indirect) {
                    ControlFlow::IndirectJump
                } else {
                    ControlFlow::AbsoluteJump
                }
            }
            b"JSR" => ControlFlow::AbsoluteCall,
            b"RTS" | b"RTI" | b"BRK" | b"JAM" => ControlFlow::Terminate,
            _ => ControlFlow::Continue,
        },
    }
}

/// Decode an opcode byte into its instruction record.
///
/// The 6502 table this crate targets is total — every byte value
/// decodes to *some* instruction, including illegal opcodes and the
/// JAM/KIL halt family — so this never returns `None` in practice. The
/// `Option` return is kept because the decoder's contract (§4.1) is "a
/// record, or report undefined opcode": a future table that chose to
/// leave entries unmapped would still be expressible here, and callers
/// (the scanner in particular) are written against that contract rather
/// than the table's current totality.
pub fn decode(opcode: u8) -> Option<OpcodeInfo> {
    Some(OPCODES[opcode as usize])
}

macro_rules! op {
    ($mnemonic:literal, $mode:ident) => {
        OpcodeInfo {
            mnemonic: $mnemonic,
            mode: AddressingMode::$mode,
        }
    };
}

/// Dense 256-entry opcode table. Organized in 16-row blocks matching
/// the conventional opcode-matrix layout (high nibble = row).
#[rustfmt::skip]
pub const OPCODES: [OpcodeInfo; 256] = [
    // 0x00 - 0x0F
    op!("BRK", Implied),    op!("ORA", IndirectX),  op!("JAM", Implied),    op!("SLO", IndirectX),
    op!("NOP", ZeroPage),   op!("ORA", ZeroPage),   op!("ASL", ZeroPage),   op!("SLO", ZeroPage),
    op!("PHP", Implied),    op!("ORA", Immediate),  op!("ASL", Accumulator),op!("ANC", Immediate),
    op!("NOP", Absolute),   op!("ORA", Absolute),   op!("ASL", Absolute),   op!("SLO", Absolute),
    // 0x10 - 0x1F
    op!("BPL", Relative),   op!("ORA", IndirectY),  op!("JAM", Implied),    op!("SLO", IndirectY),
    op!("NOP", ZeroPageX),  op!("ORA", ZeroPageX),  op!("ASL", ZeroPageX),  op!("SLO", ZeroPageX),
    op!("CLC", Implied),    op!("ORA", AbsoluteY),  op!("NOP", Implied),    op!("SLO", AbsoluteY),
    op!("NOP", AbsoluteX),  op!("ORA", AbsoluteX),  op!("ASL", AbsoluteX),  op!("SLO", AbsoluteX),
    // 0x20 - 0x2F
    op!("JSR", Absolute),   op!("AND", IndirectX),  op!("JAM", Implied),    op!("RLA", IndirectX),
    op!("BIT", ZeroPage),   op!("AND", ZeroPage),   op!("ROL", ZeroPage),   op!("RLA", ZeroPage),
    op!("PLP", Implied),    op!("AND", Immediate),  op!("ROL", Accumulator),op!("ANC", Immediate),
    op!("BIT", Absolute),   op!("AND", Absolute),   op!("ROL", Absolute),   op!("RLA", Absolute),
    // 0x30 - 0x3F
    op!("BMI", Relative),   op!("AND", IndirectY),  op!("JAM", Implied),    op!("RLA", IndirectY),
    op!("NOP", ZeroPageX),  op!("AND", ZeroPageX),  op!("ROL", ZeroPageX),  op!("RLA", ZeroPageX),
    op!("SEC", Implied),    op!("AND", AbsoluteY),  op!("NOP", Implied),    op!("RLA", AbsoluteY),
    op!("NOP", AbsoluteX),  op!("AND", AbsoluteX),  op!("ROL", AbsoluteX),  op!("RLA", AbsoluteX),
    // 0x40 - 0x4F
    op!("RTI", Implied),    op!("EOR", IndirectX),  op!("JAM", Implied),    op!("SRE", IndirectX),
    op!("NOP", ZeroPage),   op!("EOR", ZeroPage),   op!("LSR", ZeroPage),   op!("SRE", ZeroPage),
    op!("PHA", Implied),    op!("EOR", Immediate),  op!("LSR", Accumulator),op!("ALR", Immediate),
    op!("JMP", Absolute),   op!("EOR", Absolute),   op!("LSR", Absolute),   op!("SRE", Absolute),
    // 0x50 - 0x5F
    op!("BVC", Relative),   op!("EOR", IndirectY),  op!("JAM", Implied),    op!("SRE", IndirectY),
    op!("NOP", ZeroPageX),  op!("EOR", ZeroPageX),  op!("LSR", ZeroPageX),  op!("SRE", ZeroPageX),
    op!("CLI", Implied),    op!("EOR", AbsoluteY),  op!("NOP", Implied),    op!("SRE", AbsoluteY),
    op!("NOP", AbsoluteX),  op!("EOR", AbsoluteX),  op!("LSR", AbsoluteX),  op!("SRE", AbsoluteX),
    // 0x60 - 0x6F
    op!("RTS", Implied),    op!("ADC", IndirectX),  op!("JAM", Implied),    op!("RRA", IndirectX),
    op!("NOP", ZeroPage),   op!("ADC", ZeroPage),   op!("ROR", ZeroPage),   op!("RRA", ZeroPage),
    op!("PLA", Implied),    op!("ADC", Immediate),  op!("ROR", Accumulator),op!("ARR", Immediate),
    op!("JMP", Indirect),   op!("ADC", Absolute),   op!("ROR", Absolute),   op!("RRA", Absolute),
    // 0x70 - 0x7F
    op!("BVS", Relative),   op!("ADC", IndirectY),  op!("JAM", Implied),    op!("RRA", IndirectY),
    op!("NOP", ZeroPageX),  op!("ADC", ZeroPageX),  op!("ROR", ZeroPageX),  op!("RRA", ZeroPageX),
    op!("SEI", Implied),    op!("ADC", AbsoluteY),  op!("NOP", Implied),    op!("RRA", AbsoluteY),
    op!("NOP", AbsoluteX),  op!("ADC", AbsoluteX),  op!("ROR", AbsoluteX),  op!("RRA", AbsoluteX),
    // 0x80 - 0x8F
    op!("NOP", Immediate),  op!("STA", IndirectX),  op!("NOP", Immediate),  op!("SAX", IndirectX),
    op!("STY", ZeroPage),   op!("STA", ZeroPage),   op!("STX", ZeroPage),   op!("SAX", ZeroPage),
    op!("DEY", Implied),    op!("NOP", Immediate),  op!("TXA", Implied),    op!("ANE", Immediate),
    op!("STY", Absolute),   op!("STA", Absolute),   op!("STX", Absolute),   op!("SAX", Absolute),
    // 0x90 - 0x9F
    op!("BCC", Relative),   op!("STA", IndirectY),  op!("JAM", Implied),    op!("SHA", IndirectY),
    op!("STY", ZeroPageX),  op!("STA", ZeroPageX),  op!("STX", ZeroPageY),  op!("SAX", ZeroPageY),
    op!("TYA", Implied),    op!("STA", AbsoluteY),  op!("TXS", Implied),    op!("TAS", AbsoluteY),
    op!("SHY", AbsoluteX),  op!("STA", AbsoluteX),  op!("SHX", AbsoluteY),  op!("SHA", AbsoluteY),
    // 0xA0 - 0xAF
    op!("LDY", Immediate),  op!("LDA", IndirectX),  op!("LDX", Immediate),  op!("LAX", IndirectX),
    op!("LDY", ZeroPage),   op!("LDA", ZeroPage),   op!("LDX", ZeroPage),   op!("LAX", ZeroPage),
    op!("TAY", Implied),    op!("LDA", Immediate),  op!("TAX", Implied),    op!("LXA", Immediate),
    op!("LDY", Absolute),   op!("LDA", Absolute),   op!("LDX", Absolute),   op!("LAX", Absolute),
    // 0xB0 - 0xBF
    op!("BCS", Relative),   op!("LDA", IndirectY),  op!("JAM", Implied),    op!("LAX", IndirectY),
    op!("LDY", ZeroPageX),  op!("LDA", ZeroPageX),  op!("LDX", ZeroPageY),  op!("LAX", ZeroPageY),
    op!("CLV", Implied),    op!("LDA", AbsoluteY),  op!("TSX", Implied),    op!("LAS", AbsoluteY),
    op!("LDY", AbsoluteX),  op!("LDA", AbsoluteX),  op!("LDX", AbsoluteY),  op!("LAX", AbsoluteY),
    // 0xC0 - 0xCF
    op!("CPY", Immediate),  op!("CMP", IndirectX),  op!("NOP", Immediate),  op!("DCP", IndirectX),
    op!("CPY", ZeroPage),   op!("CMP", ZeroPage),   op!("DEC", ZeroPage),   op!("DCP", ZeroPage),
    op!("INY", Implied),    op!("CMP", Immediate),  op!("DEX", Implied),    op!("SBX", Immediate),
    op!("CPY", Absolute),   op!("CMP", Absolute),   op!("DEC", Absolute),   op!("DCP", Absolute),
    // 0xD0 - 0xDF
    op!("BNE", Relative),   op!("CMP", IndirectY),  op!("JAM", Implied),    op!("DCP", IndirectY),
    op!("NOP", ZeroPageX),  op!("CMP", ZeroPageX),  op!("DEC", ZeroPageX),  op!("DCP", ZeroPageX),
    op!("CLD", Implied),    op!("CMP", AbsoluteY),  op!("NOP", Implied),    op!("DCP", AbsoluteY),
    op!("NOP", AbsoluteX),  op!("CMP", AbsoluteX),  op!("DEC", AbsoluteX),  op!("DCP", AbsoluteX),
    // 0xE0 - 0xEF
    op!("CPX", Immediate),  op!("SBC", IndirectX),  op!("NOP", Immediate),  op!("ISC", IndirectX),
    op!("CPX", ZeroPage),   op!("SBC", ZeroPage),   op!("INC", ZeroPage),   op!("ISC", ZeroPage),
    op!("INX", Implied),    op!("SBC", Immediate),  op!("NOP", Implied),    op!("USB", Immediate),
    op!("CPX", Absolute),   op!("SBC", Absolute),   op!("INC", Absolute),   op!("ISC", Absolute),
    // 0xF0 - 0xFF
    op!("BEQ", Relative),   op!("SBC", IndirectY),  op!("JAM", Implied),    op!("ISC", IndirectY),
    op!("NOP", ZeroPageX),  op!("SBC", ZeroPageX),  op!("INC", ZeroPageX),  op!("ISC", ZeroPageX),
    op!("SED", Implied),    op!("SBC", AbsoluteY),  op!("NOP", Implied),    op!("ISC", AbsoluteY),
    op!("NOP", AbsoluteX),  op!("SBC", AbsoluteX),  op!("INC", AbsoluteX),  op!("ISC", AbsoluteX),
];

/// The 12 JAM/KIL opcodes that halt the NMOS 6502.
pub const JAM_OPCODES: [u8; 12] = [
    0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_total() {
        for byte in 0u16..=255 {
            assert!(decode(byte as u8).is_some());
        }
    }

    #[test]
    fn legal_lengths() {
        assert_eq!(decode(0xA9).unwrap().len(), 2); // LDA #imm
        assert_eq!(decode(0xAD).unwrap().len(), 3); // LDA abs
        assert_eq!(decode(0xEA).unwrap().len(), 1); // NOP
        assert_eq!(decode(0x4C).unwrap().len(), 3); // JMP abs
    }

    #[test]
    fn jam_opcodes_are_tagged() {
        for &byte in &JAM_OPCODES {
            let info = decode(byte).unwrap();
            assert_eq!(info.mnemonic, "JAM");
            assert_eq!(control_flow(info), ControlFlow::Terminate);
        }
    }

    #[test]
    fn illegal_opcodes_present() {
        let illegal = [
            "SLO", "RLA", "SRE", "RRA", "SAX", "LAX", "DCP", "ISC", "ANC", "ALR", "ARR", "ANE",
            "LXA", "SBX", "USB", "SHA", "SHY", "SHX", "TAS", "LAS",
        ];
        let mnemonics: std::collections::HashSet<_> =
            OPCODES.iter().map(|o| o.mnemonic).collect();
        for name in illegal {
            assert!(mnemonics.contains(name), "missing illegal opcode {name}");
        }
    }

    #[test]
    fn control_flow_classification() {
        assert_eq!(
            control_flow(decode(0x4C).unwrap()),
            ControlFlow::AbsoluteJump
        );
        assert_eq!(
            control_flow(decode(0x6C).unwrap()),
            ControlFlow::IndirectJump
        );
        assert_eq!(
            control_flow(decode(0x20).unwrap()),
            ControlFlow::AbsoluteCall
        );
        assert_eq!(control_flow(decode(0x60).unwrap()), ControlFlow::Terminate); // RTS
        assert_eq!(control_flow(decode(0x40).unwrap()), ControlFlow::Terminate); // RTI
        assert_eq!(control_flow(decode(0x00).unwrap()), ControlFlow::Terminate); // BRK
        assert_eq!(
            control_flow(decode(0xD0).unwrap()),
            ControlFlow::RelativeBranch
        ); // BNE
        assert_eq!(control_flow(decode(0xEA).unwrap()), ControlFlow::Continue); // NOP
    }

    #[test]
    fn absolute_operand_modes() {
        assert!(AddressingMode::Absolute.has_absolute_operand());
        assert!(AddressingMode::AbsoluteX.has_absolute_operand());
        assert!(AddressingMode::AbsoluteY.has_absolute_operand());
        assert!(AddressingMode::Indirect.has_absolute_operand());
        assert!(!AddressingMode::ZeroPage.has_absolute_operand());
        assert!(!AddressingMode::Immediate.has_absolute_operand());
    }

    #[test]
    fn mode_lengths_match_spec() {
        let cases = [
            (AddressingMode::Implied, 1),
            (AddressingMode::Accumulator, 1),
            (AddressingMode::Immediate, 2),
            (AddressingMode::ZeroPage, 2),
            (AddressingMode::ZeroPageX, 2),
            (AddressingMode::ZeroPageY, 2),
            (AddressingMode::Absolute, 3),
            (AddressingMode::AbsoluteX, 3),
            (AddressingMode::AbsoluteY, 3),
            (AddressingMode::Indirect, 3),
            (AddressingMode::IndirectX, 2),
            (AddressingMode::IndirectY, 2),
            (AddressingMode::Relative, 2),
        ];
        for (mode, len) in cases {
            assert_eq!(mode.len(), len, "{mode:?}");
        }
    }
}
