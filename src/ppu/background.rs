//! Background tile-fetch shift registers.
//!
//! This struct only holds the per-pixel shifting state. The fetch
//! sequencing (which byte to pull on which PPU cycle, and where from) lives
//! on [`super::Ppu`], since it needs simultaneous access to VRAM, the
//! cartridge's CHR, and this state — keeping it here would mean routing
//! every tile fetch back out through the CPU-facing bus, which is what an
//! earlier revision did and which this design avoids.

#[derive(Clone, Default)]
pub struct Background {
    pub next_tile_id: u8,
    pub next_tile_attr: u8,
    pub next_pattern_lo: u8,
    pub next_pattern_hi: u8,

    pub shifter_pattern_lo: u16,
    pub shifter_pattern_hi: u16,
    pub shifter_attr_lo: u16,
    pub shifter_attr_hi: u16,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn shift(&mut self) {
        self.shifter_pattern_lo <<= 1;
        self.shifter_pattern_hi <<= 1;
        self.shifter_attr_lo <<= 1;
        self.shifter_attr_hi <<= 1;
    }

    /// Load the low byte of each shifter from the latched "next tile" data.
    pub fn load_shifters(&mut self) {
        self.shifter_pattern_lo = (self.shifter_pattern_lo & 0xFF00) | self.next_pattern_lo as u16;
        self.shifter_pattern_hi = (self.shifter_pattern_hi & 0xFF00) | self.next_pattern_hi as u16;

        let lo_fill = if self.next_tile_attr & 0b01 != 0 { 0x00FF } else { 0x0000 };
        let hi_fill = if self.next_tile_attr & 0b10 != 0 { 0x00FF } else { 0x0000 };
        self.shifter_attr_lo = (self.shifter_attr_lo & 0xFF00) | lo_fill;
        self.shifter_attr_hi = (self.shifter_attr_hi & 0xFF00) | hi_fill;
    }

    /// Sample the current background pixel at the given fine-X offset.
    /// Returns (palette 0..=3, pixel value 0..=3); value 0 is transparent.
    pub fn pixel(&self, fine_x: u8) -> (u8, u8) {
        let mux = 0x8000 >> fine_x;
        let lo = ((self.shifter_pattern_lo & mux) != 0) as u8;
        let hi = ((self.shifter_pattern_hi & mux) != 0) as u8;
        let value = (hi << 1) | lo;

        let a_lo = ((self.shifter_attr_lo & mux) != 0) as u8;
        let a_hi = ((self.shifter_attr_hi & mux) != 0) as u8;
        let palette = (a_hi << 1) | a_lo;

        (palette, value)
    }
}
