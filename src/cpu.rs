//! CPU implementation for the Ricoh 2A03 (modified MOS 6502)
//!
//! The 2A03 is a MOS 6502 modified for the NES: decimal mode is wired in but
//! never produces BCD results on this chip, and the APU lives on the same
//! die. This module implements the 6502 side only; the APU is out of scope.

use log::{debug, trace};

use crate::bus::Bus;

/// Status register flag bits.
#[allow(dead_code)]
pub mod flags {
    pub const CARRY: u8 = 0x01;
    pub const ZERO: u8 = 0x02;
    pub const INTERRUPT_DISABLE: u8 = 0x04;
    pub const DECIMAL: u8 = 0x08; // settable, has no effect on the 2A03
    pub const BREAK: u8 = 0x10;
    pub const UNUSED: u8 = 0x20; // always 1 in the live register
    pub const OVERFLOW: u8 = 0x40;
    pub const NEGATIVE: u8 = 0x80;
}

/// Addressing modes for CPU instructions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Relative,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    Indirect,
    IndexedIndirect,
    IndirectIndexed,
}

/// Instruction mnemonics. Unofficial opcodes all decode to `Nop`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
enum Op {
    ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRK, BVC, BVS,
    CLC, CLD, CLI, CLV, CMP, CPX, CPY, DEC, DEX, DEY, EOR, INC, INX, INY,
    JMP, JSR, LDA, LDX, LDY, LSR, NOP, ORA, PHA, PHP, PLA, PLP, ROL, ROR,
    RTI, RTS, SBC, SEC, SED, SEI, STA, STX, STY, TAX, TAY, TSX, TXA, TXS, TYA,
}

/// One row of the instruction table: operation, addressing mode, base
/// cycle count, and whether a page cross adds a cycle for this opcode.
#[derive(Debug, Copy, Clone)]
struct OpEntry {
    op: Op,
    mode: Mode,
    cycles: u8,
    page_cross: bool,
}

const fn e(op: Op, mode: Mode, cycles: u8, page_cross: bool) -> OpEntry {
    OpEntry { op, mode, cycles, page_cross }
}

/// Decode an opcode byte into its instruction-table entry. Opcodes with no
/// official meaning decode as a two-cycle NOP, matching real hardware's
/// tolerance for stray data in the instruction stream.
fn decode(opcode: u8) -> OpEntry {
    use Mode::*;
    use Op::*;
    match opcode {
        0x69 => e(ADC, Immediate, 2, false),
        0x65 => e(ADC, ZeroPage, 3, false),
        0x75 => e(ADC, ZeroPageX, 4, false),
        0x6D => e(ADC, Absolute, 4, false),
        0x7D => e(ADC, AbsoluteX, 4, true),
        0x79 => e(ADC, AbsoluteY, 4, true),
        0x61 => e(ADC, IndexedIndirect, 6, false),
        0x71 => e(ADC, IndirectIndexed, 5, true),

        0x29 => e(AND, Immediate, 2, false),
        0x25 => e(AND, ZeroPage, 3, false),
        0x35 => e(AND, ZeroPageX, 4, false),
        0x2D => e(AND, Absolute, 4, false),
        0x3D => e(AND, AbsoluteX, 4, true),
        0x39 => e(AND, AbsoluteY, 4, true),
        0x21 => e(AND, IndexedIndirect, 6, false),
        0x31 => e(AND, IndirectIndexed, 5, true),

        0x0A => e(ASL, Accumulator, 2, false),
        0x06 => e(ASL, ZeroPage, 5, false),
        0x16 => e(ASL, ZeroPageX, 6, false),
        0x0E => e(ASL, Absolute, 6, false),
        0x1E => e(ASL, AbsoluteX, 7, false),

        0x90 => e(BCC, Relative, 2, false),
        0xB0 => e(BCS, Relative, 2, false),
        0xF0 => e(BEQ, Relative, 2, false),
        0x24 => e(BIT, ZeroPage, 3, false),
        0x2C => e(BIT, Absolute, 4, false),
        0x30 => e(BMI, Relative, 2, false),
        0xD0 => e(BNE, Relative, 2, false),
        0x10 => e(BPL, Relative, 2, false),
        0x00 => e(BRK, Implied, 7, false),
        0x50 => e(BVC, Relative, 2, false),
        0x70 => e(BVS, Relative, 2, false),

        0x18 => e(CLC, Implied, 2, false),
        0xD8 => e(CLD, Implied, 2, false),
        0x58 => e(CLI, Implied, 2, false),
        0xB8 => e(CLV, Implied, 2, false),

        0xC9 => e(CMP, Immediate, 2, false),
        0xC5 => e(CMP, ZeroPage, 3, false),
        0xD5 => e(CMP, ZeroPageX, 4, false),
        0xCD => e(CMP, Absolute, 4, false),
        0xDD => e(CMP, AbsoluteX, 4, true),
        0xD9 => e(CMP, AbsoluteY, 4, true),
        0xC1 => e(CMP, IndexedIndirect, 6, false),
        0xD1 => e(CMP, IndirectIndexed, 5, true),

        0xE0 => e(CPX, Immediate, 2, false),
        0xE4 => e(CPX, ZeroPage, 3, false),
        0xEC => e(CPX, Absolute, 4, false),

        0xC0 => e(CPY, Immediate, 2, false),
        0xC4 => e(CPY, ZeroPage, 3, false),
        0xCC => e(CPY, Absolute, 4, false),

        0xC6 => e(DEC, ZeroPage, 5, false),
        0xD6 => e(DEC, ZeroPageX, 6, false),
        0xCE => e(DEC, Absolute, 6, false),
        0xDE => e(DEC, AbsoluteX, 7, false),
        0xCA => e(DEX, Implied, 2, false),
        0x88 => e(DEY, Implied, 2, false),

        0x49 => e(EOR, Immediate, 2, false),
        0x45 => e(EOR, ZeroPage, 3, false),
        0x55 => e(EOR, ZeroPageX, 4, false),
        0x4D => e(EOR, Absolute, 4, false),
        0x5D => e(EOR, AbsoluteX, 4, true),
        0x59 => e(EOR, AbsoluteY, 4, true),
        0x41 => e(EOR, IndexedIndirect, 6, false),
        0x51 => e(EOR, IndirectIndexed, 5, true),

        0xE6 => e(INC, ZeroPage, 5, false),
        0xF6 => e(INC, ZeroPageX, 6, false),
        0xEE => e(INC, Absolute, 6, false),
        0xFE => e(INC, AbsoluteX, 7, false),
        0xE8 => e(INX, Implied, 2, false),
        0xC8 => e(INY, Implied, 2, false),

        0x4C => e(JMP, Absolute, 3, false),
        0x6C => e(JMP, Indirect, 5, false),
        0x20 => e(JSR, Absolute, 6, false),

        0xA9 => e(LDA, Immediate, 2, false),
        0xA5 => e(LDA, ZeroPage, 3, false),
        0xB5 => e(LDA, ZeroPageX, 4, false),
        0xAD => e(LDA, Absolute, 4, false),
        0xBD => e(LDA, AbsoluteX, 4, true),
        0xB9 => e(LDA, AbsoluteY, 4, true),
        0xA1 => e(LDA, IndexedIndirect, 6, false),
        0xB1 => e(LDA, IndirectIndexed, 5, true),

        0xA2 => e(LDX, Immediate, 2, false),
        0xA6 => e(LDX, ZeroPage, 3, false),
        0xB6 => e(LDX, ZeroPageY, 4, false),
        0xAE => e(LDX, Absolute, 4, false),
        0xBE => e(LDX, AbsoluteY, 4, true),

        0xA0 => e(LDY, Immediate, 2, false),
        0xA4 => e(LDY, ZeroPage, 3, false),
        0xB4 => e(LDY, ZeroPageX, 4, false),
        0xAC => e(LDY, Absolute, 4, false),
        0xBC => e(LDY, AbsoluteX, 4, true),

        0x4A => e(LSR, Accumulator, 2, false),
        0x46 => e(LSR, ZeroPage, 5, false),
        0x56 => e(LSR, ZeroPageX, 6, false),
        0x4E => e(LSR, Absolute, 6, false),
        0x5E => e(LSR, AbsoluteX, 7, false),

        0x09 => e(ORA, Immediate, 2, false),
        0x05 => e(ORA, ZeroPage, 3, false),
        0x15 => e(ORA, ZeroPageX, 4, false),
        0x0D => e(ORA, Absolute, 4, false),
        0x1D => e(ORA, AbsoluteX, 4, true),
        0x19 => e(ORA, AbsoluteY, 4, true),
        0x01 => e(ORA, IndexedIndirect, 6, false),
        0x11 => e(ORA, IndirectIndexed, 5, true),

        0x48 => e(PHA, Implied, 3, false),
        0x08 => e(PHP, Implied, 3, false),
        0x68 => e(PLA, Implied, 4, false),
        0x28 => e(PLP, Implied, 4, false),

        0x2A => e(ROL, Accumulator, 2, false),
        0x26 => e(ROL, ZeroPage, 5, false),
        0x36 => e(ROL, ZeroPageX, 6, false),
        0x2E => e(ROL, Absolute, 6, false),
        0x3E => e(ROL, AbsoluteX, 7, false),

        0x6A => e(ROR, Accumulator, 2, false),
        0x66 => e(ROR, ZeroPage, 5, false),
        0x76 => e(ROR, ZeroPageX, 6, false),
        0x6E => e(ROR, Absolute, 6, false),
        0x7E => e(ROR, AbsoluteX, 7, false),

        0x40 => e(RTI, Implied, 6, false),
        0x60 => e(RTS, Implied, 6, false),

        0xE9 => e(SBC, Immediate, 2, false),
        0xE5 => e(SBC, ZeroPage, 3, false),
        0xF5 => e(SBC, ZeroPageX, 4, false),
        0xED => e(SBC, Absolute, 4, false),
        0xFD => e(SBC, AbsoluteX, 4, true),
        0xF9 => e(SBC, AbsoluteY, 4, true),
        0xE1 => e(SBC, IndexedIndirect, 6, false),
        0xF1 => e(SBC, IndirectIndexed, 5, true),

        0x38 => e(SEC, Implied, 2, false),
        0xF8 => e(SED, Implied, 2, false),
        0x78 => e(SEI, Implied, 2, false),

        0x85 => e(STA, ZeroPage, 3, false),
        0x95 => e(STA, ZeroPageX, 4, false),
        0x8D => e(STA, Absolute, 4, false),
        0x9D => e(STA, AbsoluteX, 5, false),
        0x99 => e(STA, AbsoluteY, 5, false),
        0x81 => e(STA, IndexedIndirect, 6, false),
        0x91 => e(STA, IndirectIndexed, 6, false),

        0x86 => e(STX, ZeroPage, 3, false),
        0x96 => e(STX, ZeroPageY, 4, false),
        0x8E => e(STX, Absolute, 4, false),

        0x84 => e(STY, ZeroPage, 3, false),
        0x94 => e(STY, ZeroPageX, 4, false),
        0x8C => e(STY, Absolute, 4, false),

        0xAA => e(TAX, Implied, 2, false),
        0xA8 => e(TAY, Implied, 2, false),
        0xBA => e(TSX, Implied, 2, false),
        0x8A => e(TXA, Implied, 2, false),
        0x9A => e(TXS, Implied, 2, false),
        0x98 => e(TYA, Implied, 2, false),

        0xEA => e(NOP, Implied, 2, false),

        // Unofficial opcodes: tolerate as a two-cycle NOP rather than aborting.
        _ => e(NOP, Implied, 2, false),
    }
}

/// A resolved operand: either a memory address or the accumulator.
enum Operand {
    Address(u16),
    Accumulator,
    None,
}

/// The Ricoh 2A03 integer core.
pub struct Cpu {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: u8,
    pub total_cycles: u64,
    pub nmi_pending: bool,
    pub irq_pending: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            a: 0,
            x: 0,
            y: 0,
            sp: 0xFD,
            pc: 0,
            status: flags::UNUSED | flags::INTERRUPT_DISABLE,
            total_cycles: 0,
            nmi_pending: false,
            irq_pending: false,
        }
    }

    /// Power-on/reset: restores the documented reset state and reads the
    /// reset vector immediately, rather than lazily on first `step`.
    pub fn reset(&mut self, bus: &mut Bus<'_>) {
        self.a = 0;
        self.x = 0;
        self.y = 0;
        self.sp = 0xFD;
        self.status = flags::UNUSED | flags::INTERRUPT_DISABLE;
        self.pc = bus.read16(0xFFFC);
        self.total_cycles = 7;
        self.nmi_pending = false;
        self.irq_pending = false;
        debug!("cpu reset, pc=${:04X}", self.pc);
    }

    /// Execute one instruction (or interrupt sequence) and return the
    /// number of CPU cycles consumed.
    pub fn step(&mut self, bus: &mut Bus<'_>) -> u32 {
        if self.nmi_pending {
            self.nmi_pending = false;
            self.interrupt(bus, 0xFFFA, false);
            return 7;
        }
        if self.irq_pending && (self.status & flags::INTERRUPT_DISABLE) == 0 {
            self.irq_pending = false;
            self.interrupt(bus, 0xFFFE, false);
            return 7;
        }

        let instr_addr = self.pc;
        let opcode = bus.read(self.pc);
        let entry = decode(opcode);
        trace!(
            "${:04X}: {:02X} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X}",
            self.pc, opcode, self.a, self.x, self.y, self.status, self.sp
        );
        self.pc = self.pc.wrapping_add(1);

        let (operand, page_crossed) = self.resolve(entry.mode, bus, instr_addr);
        let extra_branch_cycles = self.execute(entry.op, operand, bus, page_crossed);

        let mut cycles = entry.cycles as u32;
        if entry.page_cross && page_crossed {
            cycles += 1;
        }
        cycles += extra_branch_cycles;

        self.total_cycles += cycles as u64;
        cycles
    }

    fn interrupt(&mut self, bus: &mut Bus<'_>, vector: u16, brk: bool) {
        self.push16(bus, self.pc);
        let pushed_status = if brk {
            self.status | flags::BREAK | flags::UNUSED
        } else {
            (self.status & !flags::BREAK) | flags::UNUSED
        };
        self.push8(bus, pushed_status);
        self.status |= flags::INTERRUPT_DISABLE;
        self.pc = bus.read16(vector);
    }

    fn push8(&mut self, bus: &mut Bus<'_>, value: u8) {
        bus.write(0x0100 + self.sp as u16, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn push16(&mut self, bus: &mut Bus<'_>, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.push8(bus, hi);
        self.push8(bus, lo);
    }

    fn pop8(&mut self, bus: &mut Bus<'_>) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        bus.read(0x0100 + self.sp as u16)
    }

    fn pop16(&mut self, bus: &mut Bus<'_>) -> u16 {
        let lo = self.pop8(bus);
        let hi = self.pop8(bus);
        u16::from_le_bytes([lo, hi])
    }

    /// Resolve the addressing mode into an operand and whether an indexed
    /// read crossed a page boundary (only meaningful for the read-category
    /// indexed modes; callers gate the cycle penalty on `entry.page_cross`).
    fn resolve(&mut self, mode: Mode, bus: &mut Bus<'_>, instr_addr: u16) -> (Operand, bool) {
        match mode {
            Mode::Implied => (Operand::None, false),
            Mode::Accumulator => (Operand::Accumulator, false),
            Mode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                (Operand::Address(addr), false)
            }
            Mode::ZeroPage => {
                let addr = bus.read(self.pc) as u16;
                self.pc = self.pc.wrapping_add(1);
                (Operand::Address(addr), false)
            }
            Mode::ZeroPageX => {
                let base = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                (Operand::Address(base.wrapping_add(self.x) as u16), false)
            }
            Mode::ZeroPageY => {
                let base = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                (Operand::Address(base.wrapping_add(self.y) as u16), false)
            }
            Mode::Relative => {
                let offset = bus.read(self.pc) as i8;
                self.pc = self.pc.wrapping_add(1);
                let target = (self.pc as i32 + offset as i32) as u16;
                // Page-cross cycle penalty compares the branch instruction's
                // own page to the target's page.
                let crossed = (instr_addr & 0xFF00) != (target & 0xFF00);
                (Operand::Address(target), crossed)
            }
            Mode::Absolute => {
                let addr = bus.read16(self.pc);
                self.pc = self.pc.wrapping_add(2);
                (Operand::Address(addr), false)
            }
            Mode::AbsoluteX => {
                let base = bus.read16(self.pc);
                self.pc = self.pc.wrapping_add(2);
                let addr = base.wrapping_add(self.x as u16);
                let crossed = (base & 0xFF00) != (addr & 0xFF00);
                (Operand::Address(addr), crossed)
            }
            Mode::AbsoluteY => {
                let base = bus.read16(self.pc);
                self.pc = self.pc.wrapping_add(2);
                let addr = base.wrapping_add(self.y as u16);
                let crossed = (base & 0xFF00) != (addr & 0xFF00);
                (Operand::Address(addr), crossed)
            }
            Mode::Indirect => {
                let ptr = bus.read16(self.pc);
                self.pc = self.pc.wrapping_add(2);
                // The classic 6502 bug: if the pointer's low byte is 0xFF,
                // the high byte is fetched from the start of the same page
                // instead of the next page.
                let lo = bus.read(ptr);
                let hi = if ptr & 0x00FF == 0x00FF {
                    bus.read(ptr & 0xFF00)
                } else {
                    bus.read(ptr.wrapping_add(1))
                };
                (Operand::Address(u16::from_le_bytes([lo, hi])), false)
            }
            Mode::IndexedIndirect => {
                let base = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                let ptr = base.wrapping_add(self.x);
                let lo = bus.read(ptr as u16);
                let hi = bus.read(ptr.wrapping_add(1) as u16);
                (Operand::Address(u16::from_le_bytes([lo, hi])), false)
            }
            Mode::IndirectIndexed => {
                let ptr = bus.read(self.pc);
                self.pc = self.pc.wrapping_add(1);
                let lo = bus.read(ptr as u16);
                let hi = bus.read(ptr.wrapping_add(1) as u16);
                let base = u16::from_le_bytes([lo, hi]);
                let addr = base.wrapping_add(self.y as u16);
                let crossed = (base & 0xFF00) != (addr & 0xFF00);
                (Operand::Address(addr), crossed)
            }
        }
    }

    fn load(&self, operand: &Operand, bus: &mut Bus<'_>) -> u8 {
        match operand {
            Operand::Address(addr) => bus.read(*addr),
            Operand::Accumulator => self.a,
            Operand::None => unreachable!("instruction requires an operand"),
        }
    }

    fn store(&mut self, operand: &Operand, bus: &mut Bus<'_>, value: u8) {
        match operand {
            Operand::Address(addr) => bus.write(*addr, value),
            Operand::Accumulator => self.a = value,
            Operand::None => unreachable!("instruction requires an operand"),
        }
    }

    fn set_zn(&mut self, value: u8) {
        self.status = (self.status & !(flags::ZERO | flags::NEGATIVE))
            | if value == 0 { flags::ZERO } else { 0 }
            | (value & flags::NEGATIVE);
    }

    fn branch_if(&mut self, taken: bool, target: u16, page_crossed: bool) -> u32 {
        if !taken {
            return 0;
        }
        self.pc = target;
        if page_crossed {
            2
        } else {
            1
        }
    }

    fn adc(&mut self, value: u8) {
        let carry_in = (self.status & flags::CARRY) as u16;
        let sum = self.a as u16 + value as u16 + carry_in;
        let result = sum as u8;
        let overflow = (!(self.a ^ value) & (self.a ^ result) & 0x80) != 0;
        self.status = (self.status & !(flags::CARRY | flags::OVERFLOW))
            | if sum > 0xFF { flags::CARRY } else { 0 }
            | if overflow { flags::OVERFLOW } else { 0 };
        self.a = result;
        self.set_zn(self.a);
    }

    /// Returns extra cycles contributed by branch instructions (the base
    /// table entry already accounts for the non-branch case).
    fn execute(&mut self, op: Op, operand: Operand, bus: &mut Bus<'_>, page_crossed: bool) -> u32 {
        match op {
            Op::ADC => {
                let v = self.load(&operand, bus);
                self.adc(v);
                0
            }
            Op::SBC => {
                let v = self.load(&operand, bus);
                self.adc(!v);
                0
            }
            Op::AND => {
                let v = self.load(&operand, bus);
                self.a &= v;
                self.set_zn(self.a);
                0
            }
            Op::ORA => {
                let v = self.load(&operand, bus);
                self.a |= v;
                self.set_zn(self.a);
                0
            }
            Op::EOR => {
                let v = self.load(&operand, bus);
                self.a ^= v;
                self.set_zn(self.a);
                0
            }
            Op::ASL => {
                let v = self.load(&operand, bus);
                let result = v << 1;
                self.status = (self.status & !flags::CARRY) | ((v >> 7) & flags::CARRY);
                self.set_zn(result);
                self.store(&operand, bus, result);
                0
            }
            Op::LSR => {
                let v = self.load(&operand, bus);
                let result = v >> 1;
                self.status = (self.status & !flags::CARRY) | (v & flags::CARRY);
                self.set_zn(result);
                self.store(&operand, bus, result);
                0
            }
            Op::ROL => {
                let v = self.load(&operand, bus);
                let carry_in = self.status & flags::CARRY;
                let result = (v << 1) | carry_in;
                self.status = (self.status & !flags::CARRY) | ((v >> 7) & flags::CARRY);
                self.set_zn(result);
                self.store(&operand, bus, result);
                0
            }
            Op::ROR => {
                let v = self.load(&operand, bus);
                let carry_in = (self.status & flags::CARRY) << 7;
                let result = (v >> 1) | carry_in;
                self.status = (self.status & !flags::CARRY) | (v & flags::CARRY);
                self.set_zn(result);
                self.store(&operand, bus, result);
                0
            }
            Op::BIT => {
                let v = self.load(&operand, bus);
                self.status = (self.status & !(flags::ZERO | flags::OVERFLOW | flags::NEGATIVE))
                    | if (self.a & v) == 0 { flags::ZERO } else { 0 }
                    | (v & (flags::OVERFLOW | flags::NEGATIVE));
                0
            }
            Op::CMP => {
                let v = self.load(&operand, bus);
                self.compare(self.a, v);
                0
            }
            Op::CPX => {
                let v = self.load(&operand, bus);
                self.compare(self.x, v);
                0
            }
            Op::CPY => {
                let v = self.load(&operand, bus);
                self.compare(self.y, v);
                0
            }
            Op::DEC => {
                let v = self.load(&operand, bus).wrapping_sub(1);
                self.set_zn(v);
                self.store(&operand, bus, v);
                0
            }
            Op::INC => {
                let v = self.load(&operand, bus).wrapping_add(1);
                self.set_zn(v);
                self.store(&operand, bus, v);
                0
            }
            Op::DEX => {
                self.x = self.x.wrapping_sub(1);
                self.set_zn(self.x);
                0
            }
            Op::DEY => {
                self.y = self.y.wrapping_sub(1);
                self.set_zn(self.y);
                0
            }
            Op::INX => {
                self.x = self.x.wrapping_add(1);
                self.set_zn(self.x);
                0
            }
            Op::INY => {
                self.y = self.y.wrapping_add(1);
                self.set_zn(self.y);
                0
            }
            Op::LDA => {
                self.a = self.load(&operand, bus);
                self.set_zn(self.a);
                0
            }
            Op::LDX => {
                self.x = self.load(&operand, bus);
                self.set_zn(self.x);
                0
            }
            Op::LDY => {
                self.y = self.load(&operand, bus);
                self.set_zn(self.y);
                0
            }
            Op::STA => {
                self.store(&operand, bus, self.a);
                0
            }
            Op::STX => {
                self.store(&operand, bus, self.x);
                0
            }
            Op::STY => {
                self.store(&operand, bus, self.y);
                0
            }
            Op::TAX => {
                self.x = self.a;
                self.set_zn(self.x);
                0
            }
            Op::TAY => {
                self.y = self.a;
                self.set_zn(self.y);
                0
            }
            Op::TXA => {
                self.a = self.x;
                self.set_zn(self.a);
                0
            }
            Op::TYA => {
                self.a = self.y;
                self.set_zn(self.a);
                0
            }
            Op::TSX => {
                self.x = self.sp;
                self.set_zn(self.x);
                0
            }
            Op::TXS => {
                self.sp = self.x;
                0
            }
            Op::PHA => {
                self.push8(bus, self.a);
                0
            }
            Op::PHP => {
                self.push8(bus, self.status | flags::BREAK | flags::UNUSED);
                0
            }
            Op::PLA => {
                self.a = self.pop8(bus);
                self.set_zn(self.a);
                0
            }
            Op::PLP => {
                self.status = (self.pop8(bus) & !flags::BREAK) | flags::UNUSED;
                0
            }
            Op::JMP => {
                if let Operand::Address(addr) = operand {
                    self.pc = addr;
                }
                0
            }
            Op::JSR => {
                if let Operand::Address(addr) = operand {
                    self.push16(bus, self.pc.wrapping_sub(1));
                    self.pc = addr;
                }
                0
            }
            Op::RTS => {
                self.pc = self.pop16(bus).wrapping_add(1);
                0
            }
            Op::RTI => {
                self.status = (self.pop8(bus) & !flags::BREAK) | flags::UNUSED;
                self.pc = self.pop16(bus);
                0
            }
            Op::BRK => {
                self.pc = self.pc.wrapping_add(1);
                self.interrupt(bus, 0xFFFE, true);
                0
            }
            Op::BCC => {
                if let Operand::Address(t) = operand {
                    self.branch_if(self.status & flags::CARRY == 0, t, page_crossed)
                } else {
                    0
                }
            }
            Op::BCS => {
                if let Operand::Address(t) = operand {
                    self.branch_if(self.status & flags::CARRY != 0, t, page_crossed)
                } else {
                    0
                }
            }
            Op::BEQ => {
                if let Operand::Address(t) = operand {
                    self.branch_if(self.status & flags::ZERO != 0, t, page_crossed)
                } else {
                    0
                }
            }
            Op::BNE => {
                if let Operand::Address(t) = operand {
                    self.branch_if(self.status & flags::ZERO == 0, t, page_crossed)
                } else {
                    0
                }
            }
            Op::BMI => {
                if let Operand::Address(t) = operand {
                    self.branch_if(self.status & flags::NEGATIVE != 0, t, page_crossed)
                } else {
                    0
                }
            }
            Op::BPL => {
                if let Operand::Address(t) = operand {
                    self.branch_if(self.status & flags::NEGATIVE == 0, t, page_crossed)
                } else {
                    0
                }
            }
            Op::BVC => {
                if let Operand::Address(t) = operand {
                    self.branch_if(self.status & flags::OVERFLOW == 0, t, page_crossed)
                } else {
                    0
                }
            }
            Op::BVS => {
                if let Operand::Address(t) = operand {
                    self.branch_if(self.status & flags::OVERFLOW != 0, t, page_crossed)
                } else {
                    0
                }
            }
            Op::CLC => {
                self.status &= !flags::CARRY;
                0
            }
            Op::SEC => {
                self.status |= flags::CARRY;
                0
            }
            Op::CLI => {
                self.status &= !flags::INTERRUPT_DISABLE;
                0
            }
            Op::SEI => {
                self.status |= flags::INTERRUPT_DISABLE;
                0
            }
            Op::CLD => {
                self.status &= !flags::DECIMAL;
                0
            }
            Op::SED => {
                self.status |= flags::DECIMAL;
                0
            }
            Op::CLV => {
                self.status &= !flags::OVERFLOW;
                0
            }
            Op::NOP => 0,
        }
    }

    fn compare(&mut self, register: u8, value: u8) {
        let result = register.wrapping_sub(value);
        self.status = (self.status & !(flags::CARRY | flags::ZERO | flags::NEGATIVE))
            | if register >= value { flags::CARRY } else { 0 }
            | if register == value { flags::ZERO } else { 0 }
            | (result & flags::NEGATIVE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cartridge::Cartridge;
    use crate::controller::Controller;
    use crate::ppu::Ppu;

    /// A blank 32KB-PRG/CHR-RAM iNES image. 32KB PRG maps directly into
    /// 0x8000-0xFFFF (`addr & 0x7FFF`), so PRG offsets below are trivial to
    /// compute.
    fn blank_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 16 + 32 * 1024];
        rom[0..4].copy_from_slice(&[0x4E, 0x45, 0x53, 0x1A]);
        rom[4] = 2; // 32KB PRG
        rom[5] = 0; // CHR RAM
        rom
    }

    struct Harness {
        cpu: Cpu,
        ppu: Ppu,
        rom: Vec<u8>,
        cart: Cartridge,
        ram: [u8; 0x800],
        c1: Controller,
        c2: Controller,
    }

    impl Harness {
        fn new() -> Self {
            let rom = blank_rom();
            let cart = Cartridge::from_bytes(&rom).unwrap();
            Harness {
                cpu: Cpu::new(),
                ppu: Ppu::new(),
                rom,
                cart,
                ram: [0; 0x800],
                c1: Controller::new(),
                c2: Controller::new(),
            }
        }

        fn bus(&mut self) -> Bus<'_> {
            Bus::new(&mut self.ram, &mut self.ppu, &mut self.cart, &mut self.c1, &mut self.c2)
        }

        /// Write bytes at `addr`. Below 0x8000 this writes through the live
        /// bus (work RAM); at 0x8000 and above it patches the backing ROM
        /// image and rebuilds the cartridge, since NROM's PRG is read-only
        /// on the bus just like a real cartridge (`Cartridge::write` is a
        /// no-op).
        fn load_at(&mut self, addr: u16, bytes: &[u8]) {
            if addr < 0x8000 {
                for (i, b) in bytes.iter().enumerate() {
                    self.bus().write(addr + i as u16, *b);
                }
            } else {
                let base = 16 + (addr & 0x7FFF) as usize;
                self.rom[base..base + bytes.len()].copy_from_slice(bytes);
                self.cart = Cartridge::from_bytes(&self.rom).unwrap();
            }
        }

        fn set_reset_vector(&mut self, addr: u16) {
            let [lo, hi] = addr.to_le_bytes();
            self.load_at(0xFFFC, &[lo, hi]);
        }

        fn reset(&mut self) {
            let mut bus = self.bus();
            self.cpu.reset(&mut bus);
        }

        fn step(&mut self) -> u32 {
            let mut bus = self.bus();
            self.cpu.step(&mut bus)
        }
    }

    #[test]
    fn reset_reads_vector_and_sets_state() {
        let mut h = Harness::new();
        h.set_reset_vector(0x8000);
        h.reset();
        assert_eq!(h.cpu.pc, 0x8000);
        assert_eq!(h.cpu.sp, 0xFD);
        assert_eq!(h.cpu.status, flags::UNUSED | flags::INTERRUPT_DISABLE);
        assert_eq!(h.cpu.total_cycles, 7);
    }

    #[test]
    fn lda_immediate() {
        let mut h = Harness::new();
        h.set_reset_vector(0x8000);
        h.reset();
        h.load_at(0x8000, &[0xA9, 0x42]);
        let cycles = h.step();
        assert_eq!(h.cpu.a, 0x42);
        assert_eq!(cycles, 2);
        assert_eq!(h.cpu.pc, 0x8002);
        assert_eq!(h.cpu.status & flags::ZERO, 0);
        assert_eq!(h.cpu.status & flags::NEGATIVE, 0);
    }

    #[test]
    fn zero_page_store_then_load() {
        let mut h = Harness::new();
        h.set_reset_vector(0x8000);
        h.reset();
        h.load_at(0x8000, &[0xA9, 0x37, 0x85, 0x10, 0xA5, 0x10]);
        let c1 = h.step();
        let c2 = h.step();
        let c3 = h.step();
        assert_eq!(c1 + c2 + c3, 8);
        assert_eq!(h.cpu.a, 0x37);
        assert_eq!(h.bus().read(0x10), 0x37);
    }

    #[test]
    fn branch_not_taken() {
        let mut h = Harness::new();
        h.set_reset_vector(0x8000);
        h.reset();
        h.load_at(0x8000, &[0xF0, 0x04]); // BEQ +4, Z=0
        let cycles = h.step();
        assert_eq!(cycles, 2);
        assert_eq!(h.cpu.pc, 0x8002);
    }

    #[test]
    fn branch_taken_with_page_cross() {
        let mut h = Harness::new();
        h.set_reset_vector(0x00FE);
        h.reset();
        h.cpu.status |= flags::ZERO;
        h.load_at(0x00FE, &[0xF0, 0x04]); // BEQ +4 from $0100 -> $0104
        let cycles = h.step();
        assert_eq!(h.cpu.pc, 0x0104);
        assert_eq!(cycles, 4);
    }

    #[test]
    fn adc_sets_overflow_and_carry() {
        let mut h = Harness::new();
        h.set_reset_vector(0x8000);
        h.reset();
        h.cpu.a = 0x7F;
        h.cpu.status &= !flags::CARRY;
        h.load_at(0x8000, &[0x69, 0x01]); // ADC #1
        h.step();
        assert_eq!(h.cpu.a, 0x80);
        assert_ne!(h.cpu.status & flags::OVERFLOW, 0);
        assert_ne!(h.cpu.status & flags::NEGATIVE, 0);
        assert_eq!(h.cpu.status & flags::CARRY, 0);

        h.cpu.a = 0xFF;
        h.cpu.status &= !flags::CARRY;
        h.cpu.pc = 0x8000;
        h.load_at(0x8000, &[0x69, 0x01]);
        h.step();
        assert_eq!(h.cpu.a, 0x00);
        assert_eq!(h.cpu.status & flags::OVERFLOW, 0);
        assert_ne!(h.cpu.status & flags::ZERO, 0);
        assert_ne!(h.cpu.status & flags::CARRY, 0);
    }

    #[test]
    fn indirect_jmp_page_wrap_bug() {
        let mut h = Harness::new();
        h.set_reset_vector(0x8000);
        h.reset();
        h.load_at(0x8000, &[0x6C, 0xFF, 0x10]); // JMP ($10FF)
        h.load_at(0x10FF, &[0x00]);
        h.load_at(0x1000, &[0x80]);
        h.step();
        assert_eq!(h.cpu.pc, 0x8000);
    }

    #[test]
    fn push_pop_round_trips() {
        let mut h = Harness::new();
        h.set_reset_vector(0x8000);
        h.reset();
        let sp_before = h.cpu.sp;
        {
            let mut bus = h.bus();
            h.cpu.push8(&mut bus, 0xAB);
        }
        let popped = {
            let mut bus = h.bus();
            h.cpu.pop8(&mut bus)
        };
        assert_eq!(popped, 0xAB);
        assert_eq!(h.cpu.sp, sp_before);
    }

    #[test]
    fn bit_does_not_change_accumulator() {
        let mut h = Harness::new();
        h.set_reset_vector(0x8000);
        h.reset();
        h.cpu.a = 0x0F;
        h.load_at(0x10, &[0xC0]);
        h.load_at(0x8000, &[0x24, 0x10]); // BIT $10
        h.step();
        assert_eq!(h.cpu.a, 0x0F);
        assert_ne!(h.cpu.status & flags::NEGATIVE, 0);
        assert_ne!(h.cpu.status & flags::OVERFLOW, 0);
        assert_ne!(h.cpu.status & flags::ZERO, 0);
    }
}
