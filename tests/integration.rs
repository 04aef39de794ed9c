//! End-to-end scenarios run through the assembled `Nes` struct rather than
//! against any single component in isolation, using hand-built PRG images
//! the way `itsakeyfut-nes-rs`'s `tests/` crate exercises its own `Nes`.

use nesling::Nes;

const NES_MAGIC: [u8; 4] = [0x4E, 0x45, 0x53, 0x1A];

/// Build a minimal iNES image: 32 KiB PRG (mapped 1:1 into 0x8000-0xFFFF),
/// CHR RAM, horizontal mirroring. `prg` is placed at the start of the PRG
/// bank; the reset and NMI vectors are patched in afterward.
fn rom_with(prg: &[u8], reset_vector: u16, nmi_vector: u16) -> Vec<u8> {
    let mut header = vec![0u8; 16];
    header[0..4].copy_from_slice(&NES_MAGIC);
    header[4] = 2; // 32KB PRG
    header[5] = 0; // CHR RAM

    let mut bank = vec![0xEAu8; 32 * 1024]; // NOP-filled
    bank[..prg.len()].copy_from_slice(prg);

    let patch = |bank: &mut [u8], vector_addr: u16, target: u16| {
        let offset = (vector_addr - 0x8000) as usize;
        let [lo, hi] = target.to_le_bytes();
        bank[offset] = lo;
        bank[offset + 1] = hi;
    };
    patch(&mut bank, 0xFFFC, reset_vector);
    patch(&mut bank, 0xFFFA, nmi_vector);

    let mut data = header;
    data.extend(bank);
    data
}

#[test]
fn reset_vector_lands_pc_at_declared_entry_point() {
    let rom = rom_with(&[], 0x8123, 0x9000);
    let mut nes = Nes::new();
    nes.load_cartridge(&rom).unwrap();
    assert_eq!(nes.cpu().pc, 0x8123);
    assert_eq!(nes.cpu().total_cycles, 7);
}

#[test]
fn vblank_nmi_fires_within_one_frame() {
    // Main program: enable NMI generation (PPUCTRL bit 7), then spin.
    let main = [
        0xA9, 0x80, // LDA #$80
        0x8D, 0x00, 0x20, // STA $2000
        0x4C, 0x05, 0x80, // JMP $8005
    ];
    // NMI handler: record a marker byte in RAM, then spin.
    let handler = [
        0xA9, 0x42, // LDA #$42
        0x85, 0x10, // STA $10
        0x4C, 0x04, 0x81, // JMP $8104
    ];

    let mut prg = vec![0xEAu8; 32 * 1024];
    prg[..main.len()].copy_from_slice(&main);
    prg[0x100..0x100 + handler.len()].copy_from_slice(&handler);

    let rom = rom_with(&prg, 0x8000, 0x8100);
    let mut nes = Nes::new();
    nes.load_cartridge(&rom).unwrap();
    nes.run_frame();

    assert_eq!(nes.peek(0x10), 0x42);
}

#[test]
fn oam_dma_copies_the_source_page_into_oam() {
    let main = [
        0xA9, 0xAB, // LDA #$AB
        0x8D, 0x00, 0x02, // STA $0200
        0xA9, 0x02, // LDA #$02
        0x8D, 0x14, 0x40, // STA $4014   (trigger OAM DMA from page 2)
        0xA9, 0x00, // LDA #$00
        0x8D, 0x03, 0x20, // STA $2003   (OAMADDR = 0)
        0xAD, 0x04, 0x20, // LDA $2004   (OAMDATA)
        0x85, 0x10, // STA $10
        0x4C, 0x14, 0x80, // JMP $8014
    ];
    let rom = rom_with(&main, 0x8000, 0x9000);
    let mut nes = Nes::new();
    nes.load_cartridge(&rom).unwrap();
    nes.run_frame();

    assert_eq!(nes.peek(0x10), 0xAB);
}

#[test]
fn controller_strobe_and_shift_round_trip_through_the_bus() {
    let main = [
        0xA9, 0x01, // LDA #$01
        0x8D, 0x16, 0x40, // STA $4016   (strobe high)
        0xA9, 0x00, // LDA #$00
        0x8D, 0x16, 0x40, // STA $4016   (strobe low: latches the mask)
        0xA2, 0x00, // LDX #$00
        // loop:
        0xAD, 0x16, 0x40, // LDA $4016
        0x29, 0x01, // AND #$01
        0x95, 0x20, // STA $20,X
        0xE8, // INX
        0xE0, 0x08, // CPX #$08
        0xD0, 0xF4, // BNE loop
        0x4C, 0x18, 0x80, // JMP $8018
    ];
    let rom = rom_with(&main, 0x8000, 0x9000);
    let mut nes = Nes::new();
    nes.load_cartridge(&rom).unwrap();

    // A (0x01) and Start (0x08) held down.
    nes.set_buttons(1, 0x01 | 0x08);
    nes.run_frame();

    let bits: Vec<u8> = (0..8).map(|i| nes.peek(0x20 + i)).collect();
    assert_eq!(bits, [1, 0, 0, 1, 0, 0, 0, 0]);
}

#[test]
fn frame_cycle_budget_holds_steady_across_frames() {
    let rom = rom_with(&[], 0x8000, 0x9000);
    let mut nes = Nes::new();
    nes.load_cartridge(&rom).unwrap();

    let start = nes.cpu().total_cycles;
    nes.run_frame();
    let after_one = nes.cpu().total_cycles;
    nes.run_frame();
    let after_two = nes.cpu().total_cycles;

    assert!((29780..=29782).contains(&(after_one - start)));
    assert!((29780..=29782).contains(&(after_two - after_one)));
}

