//! The NES system: owns every component and drives the frame scheduler.
//!
//! `Nes` is the sole owner of the CPU, PPU, work RAM, cartridge, and both
//! controller ports. Each `Cpu::step()` call gets a freshly constructed
//! [`crate::bus::Bus`] borrowing view over those components; nothing here
//! keeps a `Bus` around between steps, which is what lets CPU, PPU, and
//! cartridge reference each other without `Rc<RefCell<_>>`.

use log::{debug, info};

use crate::bus::Bus;
use crate::cartridge::{Cartridge, CartridgeError};
use crate::controller::Controller;
use crate::cpu::Cpu;
use crate::ppu::Ppu;

/// CPU cycles the scheduler runs per frame before handing the framebuffer
/// back to the presenter. NTSC runs roughly 29780.5 CPU cycles per frame;
/// the remainder is carried over rather than rounded away every frame.
const CYCLES_PER_FRAME: u32 = 29781;

pub struct Nes {
    cpu: Cpu,
    ppu: Ppu,
    ram: [u8; 0x0800],
    cartridge: Option<Cartridge>,
    controller1: Controller,
    controller2: Controller,
    cycle_carry: u32,
}

impl Nes {
    pub fn new() -> Self {
        Nes {
            cpu: Cpu::new(),
            ppu: Ppu::new(),
            ram: [0; 0x0800],
            cartridge: None,
            controller1: Controller::new(),
            controller2: Controller::new(),
            cycle_carry: 0,
        }
    }

    /// Parse and install a cartridge image, then reset the system.
    pub fn load_cartridge(&mut self, rom_data: &[u8]) -> Result<(), CartridgeError> {
        let cartridge = Cartridge::from_bytes(rom_data)?;
        self.cartridge = Some(cartridge);
        self.reset();
        info!("cartridge loaded");
        Ok(())
    }

    /// Power-on / reset: re-reads the reset vector and restores CPU/PPU
    /// state. A cartridge must already be loaded.
    pub fn reset(&mut self) {
        self.ram = [0; 0x0800];
        self.ppu.reset();
        self.controller1.reset();
        self.controller2.reset();
        self.cycle_carry = 0;

        if let Some(cartridge) = self.cartridge.as_mut() {
            let mut bus = Bus::new(
                &mut self.ram,
                &mut self.ppu,
                cartridge,
                &mut self.controller1,
                &mut self.controller2,
            );
            self.cpu.reset(&mut bus);
        }
    }

    /// Set the pressed/released state of every button on one controller
    /// port (1 or 2) from an 8-bit mask using `Controller::BUTTON_*`.
    pub fn set_buttons(&mut self, port: u8, mask: u8) {
        let controller = match port {
            1 => &mut self.controller1,
            2 => &mut self.controller2,
            _ => return,
        };
        for bit in [
            Controller::BUTTON_A,
            Controller::BUTTON_B,
            Controller::BUTTON_SELECT,
            Controller::BUTTON_START,
            Controller::BUTTON_UP,
            Controller::BUTTON_DOWN,
            Controller::BUTTON_LEFT,
            Controller::BUTTON_RIGHT,
        ] {
            controller.set_button_pressed(bit, mask & bit != 0);
        }
    }

    /// Borrow the CPU's register file. Intended for test harnesses and an
    /// external debugger console, never consulted by the scheduler itself.
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Read a single byte through the bus without otherwise advancing any
    /// state. Intended for test harnesses and an external debugger console.
    pub fn peek(&mut self, addr: u16) -> u8 {
        let cartridge = match self.cartridge.as_mut() {
            Some(c) => c,
            None => return 0,
        };
        let mut bus = Bus::new(
            &mut self.ram,
            &mut self.ppu,
            cartridge,
            &mut self.controller1,
            &mut self.controller2,
        );
        bus.read(addr)
    }

    /// Run the scheduler until one frame's worth of CPU cycles has been
    /// consumed, then return the completed indexed-color framebuffer.
    pub fn run_frame(&mut self) -> &[u8] {
        let cartridge = match self.cartridge.as_mut() {
            Some(c) => c,
            None => return self.ppu.framebuffer(),
        };

        let mut cycles_run = self.cycle_carry;
        while cycles_run < CYCLES_PER_FRAME {
            let odd = self.cpu.total_cycles % 2 != 0;
            let mut bus = Bus::new(
                &mut self.ram,
                &mut self.ppu,
                cartridge,
                &mut self.controller1,
                &mut self.controller2,
            )
            .with_cycle_parity(odd);

            let cpu_cycles = self.cpu.step(&mut bus);
            let dma_cycles = bus.dma_cycles;
            let total_cycles = cpu_cycles + dma_cycles;

            for _ in 0..total_cycles * 3 {
                self.ppu.tick(cartridge);
            }
            if self.ppu.take_nmi() {
                self.cpu.nmi_pending = true;
            }

            cycles_run += total_cycles;
        }
        self.cycle_carry = cycles_run - CYCLES_PER_FRAME;

        debug!("frame completed, {} cycles run", cycles_run);
        self.ppu.framebuffer()
    }
}

impl Default for Nes {
    fn default() -> Self {
        Self::new()
    }
}
