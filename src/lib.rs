//! # nesling
//!
//! A Nintendo Entertainment System (NTSC) hardware emulator core: a 6502
//! interpreter, a picture-processing unit, cartridge memory mapping,
//! controller input, and the bus that ties them together.
//!
//! This crate is the simulation core only. It has no opinion on how frames
//! get on screen or how a ROM path gets chosen; see `main.rs` for a minimal
//! SDL2-backed demo harness built on top of it.

pub mod bus;
pub mod cartridge;
pub mod controller;
pub mod cpu;
pub mod nes;
pub mod ppu;

pub use cartridge::{Cartridge, CartridgeError, Mirroring};
pub use controller::Controller;
pub use cpu::Cpu;
pub use nes::Nes;
pub use ppu::{Ppu, NES_PALETTE};
