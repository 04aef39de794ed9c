//! NES cartridge implementation (iNES, mapper 0 / NROM only).
//!
//! The NES cartridge format supports dozens of memory mappers; this core
//! implements NROM, the fixed-mapping board used by the large majority of
//! launch-window titles, and reports any other mapper number as an error
//! at load time rather than silently degrading to a wrong memory map.

use std::fmt;

use log::info;
use thiserror::Error;

/// Size of the iNES header, in bytes.
const INES_HEADER_SIZE: usize = 16;
/// Size of one PRG ROM bank.
const PRG_ROM_BANK_SIZE: usize = 16 * 1024;
/// Size of one CHR ROM bank.
const CHR_BANK_SIZE: usize = 8 * 1024;
/// Size of CHR RAM allocated when the cartridge declares zero CHR banks.
const CHR_RAM_SIZE: usize = 8 * 1024;

/// Errors that can occur while parsing a cartridge image.
#[derive(Error, Debug)]
pub enum CartridgeError {
    #[error("invalid iNES header")]
    InvalidHeader,
    #[error("unsupported mapper: {0}")]
    UnsupportedMapper(u8),
    #[error("rom data shorter than the header's declared PRG/CHR size")]
    RomTooShort,
    #[error("trainer present but not supported")]
    TrainerUnsupported,
}

/// Nametable mirroring mode, taken from the iNES header flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    FourScreen,
}

/// A loaded NES cartridge: PRG ROM, CHR ROM/RAM, and the NROM address
/// mapping for both.
pub struct Cartridge {
    prg_rom: Vec<u8>,
    chr: Vec<u8>,
    chr_is_ram: bool,
    mirroring: Mirroring,
    prg_mask: u16,
    mapper_number: u8,
}

impl Cartridge {
    /// Parse an iNES cartridge image.
    pub fn from_bytes(data: &[u8]) -> Result<Self, CartridgeError> {
        if data.len() < INES_HEADER_SIZE || data[0..4] != [0x4E, 0x45, 0x53, 0x1A] {
            return Err(CartridgeError::InvalidHeader);
        }

        let prg_rom_size = data[4] as usize * PRG_ROM_BANK_SIZE;
        let chr_rom_size = data[5] as usize * CHR_BANK_SIZE;

        let flags6 = data[6];
        let flags7 = data[7];

        let mirroring = if flags6 & 0x08 != 0 {
            Mirroring::FourScreen
        } else if flags6 & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        };

        let has_trainer = flags6 & 0x04 != 0;
        let mapper_low = (flags6 >> 4) & 0x0F;
        let mapper_high = flags7 & 0xF0;
        let mapper_number = mapper_high | mapper_low;

        if has_trainer {
            return Err(CartridgeError::TrainerUnsupported);
        }
        if mapper_number != 0 {
            return Err(CartridgeError::UnsupportedMapper(mapper_number));
        }

        let expected_size = INES_HEADER_SIZE + prg_rom_size + chr_rom_size;
        if data.len() < expected_size {
            return Err(CartridgeError::RomTooShort);
        }

        let prg_start = INES_HEADER_SIZE;
        let prg_end = prg_start + prg_rom_size;
        let prg_rom = data[prg_start..prg_end].to_vec();

        let (chr, chr_is_ram) = if chr_rom_size == 0 {
            (vec![0u8; CHR_RAM_SIZE], true)
        } else {
            (data[prg_end..prg_end + chr_rom_size].to_vec(), false)
        };

        // NROM mirrors a 16KB PRG image across the full 32KB CPU window.
        let prg_mask = if prg_rom.len() <= PRG_ROM_BANK_SIZE {
            0x3FFF
        } else {
            0x7FFF
        };

        info!(
            "loaded cartridge: mapper 0, PRG {}KB, CHR {} {}KB, mirroring {:?}",
            prg_rom_size / 1024,
            if chr_is_ram { "RAM" } else { "ROM" },
            chr.len() / 1024,
            mirroring,
        );

        Ok(Cartridge {
            prg_rom,
            chr,
            chr_is_ram,
            mirroring,
            prg_mask,
            mapper_number,
        })
    }

    /// Read a byte from PRG space (CPU address 0x8000-0xFFFF).
    pub fn read(&self, addr: u16) -> u8 {
        let mapped = (addr & self.prg_mask) as usize;
        self.prg_rom.get(mapped).copied().unwrap_or(0)
    }

    /// NROM has no writable PRG; this is a no-op.
    pub fn write(&mut self, _addr: u16, _value: u8) {}

    /// Read a byte from CHR space (PPU address 0x0000-0x1FFF).
    pub fn read_chr(&self, addr: u16) -> u8 {
        let mapped = (addr & 0x1FFF) as usize;
        self.chr.get(mapped).copied().unwrap_or(0)
    }

    /// Write a byte to CHR space; only takes effect when CHR is RAM.
    pub fn write_chr(&mut self, addr: u16, value: u8) {
        if self.chr_is_ram {
            let mapped = (addr & 0x1FFF) as usize;
            if let Some(slot) = self.chr.get_mut(mapped) {
                *slot = value;
            }
        }
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    pub fn mapper_number(&self) -> u8 {
        self.mapper_number
    }
}

impl fmt::Debug for Cartridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cartridge")
            .field("mapper", &self.mapper_number)
            .field("mirroring", &self.mirroring)
            .field("prg_len", &self.prg_rom.len())
            .field("chr_len", &self.chr.len())
            .field("chr_is_ram", &self.chr_is_ram)
            .finish()
    }
}
