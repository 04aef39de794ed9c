//! # nesling
//!
//! Minimal SDL2-backed demo harness for the `nesling` emulator core. This
//! binary is the "external collaborator" the core itself stays agnostic of:
//! it owns the window, the keyboard-to-controller mapping, and the frame
//! presentation loop, and otherwise just calls `Nes::run_frame()` in a tight
//! loop and blits the result.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;

use nesling::{Controller, Nes, NES_PALETTE};

/// A Nintendo Entertainment System (NTSC) emulator.
#[derive(Parser, Debug)]
#[command(name = "nesling", version, about)]
struct Args {
    /// Path to an iNES (.nes) ROM image.
    rom: PathBuf,

    /// Integer scale factor for the presentation window.
    #[arg(short, long, default_value_t = 3)]
    scale: u32,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let rom_data = fs::read(&args.rom)
        .with_context(|| format!("failed to read ROM file {}", args.rom.display()))?;

    let mut nes = Nes::new();
    nes.load_cartridge(&rom_data)
        .with_context(|| format!("failed to load cartridge from {}", args.rom.display()))?;
    info!("loaded {}", args.rom.display());

    run(nes, args.scale)
}

fn run(mut nes: Nes, scale: u32) -> Result<()> {
    use nesling::ppu::{SCREEN_HEIGHT, SCREEN_WIDTH};

    let sdl_context = sdl2::init().map_err(|e| anyhow::anyhow!("failed to init SDL2: {e}"))?;
    let video = sdl_context
        .video()
        .map_err(|e| anyhow::anyhow!("failed to init SDL2 video subsystem: {e}"))?;

    let window = video
        .window("nesling", SCREEN_WIDTH * scale, SCREEN_HEIGHT * scale)
        .position_centered()
        .build()
        .context("failed to create window")?;

    let mut canvas = window
        .into_canvas()
        .accelerated()
        .present_vsync()
        .build()
        .context("failed to create canvas")?;
    canvas
        .set_scale(scale as f32, scale as f32)
        .map_err(|e| anyhow::anyhow!("failed to set canvas scale: {e}"))?;

    let texture_creator = canvas.texture_creator();
    let mut texture = texture_creator
        .create_texture_streaming(PixelFormatEnum::RGB24, SCREEN_WIDTH, SCREEN_HEIGHT)
        .context("failed to create frame texture")?;

    let mut event_pump = sdl_context
        .event_pump()
        .map_err(|e| anyhow::anyhow!("failed to acquire event pump: {e}"))?;

    let mut rgb_frame = vec![0u8; (SCREEN_WIDTH * SCREEN_HEIGHT) as usize * 3];
    let mut button_mask: u8 = 0;

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown { keycode: Some(Keycode::Escape), .. } => break 'running,
                Event::KeyDown { keycode: Some(key), .. } => {
                    if let Some(bit) = key_to_button(key) {
                        button_mask |= bit;
                    }
                }
                Event::KeyUp { keycode: Some(key), .. } => {
                    if let Some(bit) = key_to_button(key) {
                        button_mask &= !bit;
                    }
                }
                _ => {}
            }
        }
        nes.set_buttons(1, button_mask);

        let indexed = nes.run_frame();
        for (px, &index) in indexed.iter().enumerate() {
            let (r, g, b) = NES_PALETTE[(index & 0x3F) as usize];
            rgb_frame[px * 3] = r;
            rgb_frame[px * 3 + 1] = g;
            rgb_frame[px * 3 + 2] = b;
        }
        texture
            .update(None, &rgb_frame, SCREEN_WIDTH as usize * 3)
            .context("failed to upload frame texture")?;

        canvas.copy(&texture, None, None).map_err(|e| anyhow::anyhow!("failed to copy frame: {e}"))?;
        canvas.present();
    }

    Ok(())
}

fn key_to_button(key: Keycode) -> Option<u8> {
    Some(match key {
        Keycode::Z => Controller::BUTTON_A,
        Keycode::X => Controller::BUTTON_B,
        Keycode::RShift => Controller::BUTTON_SELECT,
        Keycode::Return => Controller::BUTTON_START,
        Keycode::Up => Controller::BUTTON_UP,
        Keycode::Down => Controller::BUTTON_DOWN,
        Keycode::Left => Controller::BUTTON_LEFT,
        Keycode::Right => Controller::BUTTON_RIGHT,
        _ => return None,
    })
}
