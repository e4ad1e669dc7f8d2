//! Combined PLC + laser stream simulator
//!
//! Generates a welding-aware laser profile at 25 Hz plus periodic PLC
//! status lines, in the station's wire format, on stdout:
//!
//! ```bash
//! simulate | weldwatch --stdin
//! ```
//!
//! The laser profile follows one pneumatic press: near-zero idle noise,
//! exponential rise to a random peak, progressive collapse with vibration
//! while welding, geometric fall on retract.

use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser, Debug)]
#[command(name = "simulate")]
#[command(about = "Welding station stream simulator")]
#[command(version)]
struct CliArgs {
    /// Laser sample rate in Hz
    #[arg(long, default_value = "25")]
    rate_hz: u64,

    /// Seconds between PLC status lines
    #[arg(long, default_value = "2.0")]
    plc_interval_secs: f64,

    /// Keep the PLC at ON,RUNNING instead of random excursions
    #[arg(long)]
    always_running: bool,

    /// Stop after this many weld cycles (0 = endless)
    #[arg(long, default_value = "0")]
    cycles: u64,

    /// RNG seed for reproducible streams
    #[arg(long)]
    seed: Option<u64>,
}

enum Phase {
    Idle,
    Rising,
    Welding,
    Falling,
}

/// Laser profile state machine.
struct SimCore {
    rng: StdRng,
    phase: Phase,
    value: f64,
    peak: f64,
    reference_height: f64,
    weld_progress: f64,
    hold_counter: u32,
    idle_counter: u32,
    cycles_emitted: u64,
}

impl SimCore {
    fn new(rng: StdRng) -> Self {
        let mut core = Self {
            rng,
            phase: Phase::Idle,
            value: 0.0,
            peak: 0.0,
            reference_height: 0.0,
            weld_progress: 0.0,
            hold_counter: 0,
            idle_counter: 0,
            cycles_emitted: 0,
        };
        core.idle_counter = core.rng.gen_range(150..400);
        core
    }

    /// Advance one sample.
    fn step(&mut self) -> f64 {
        match self.phase {
            Phase::Idle => {
                // No part: near-zero with tiny noise
                self.value = self.rng.gen_range(0.0..0.05);
                self.idle_counter = self.idle_counter.saturating_sub(1);
                if self.idle_counter == 0 {
                    self.peak = self.rng.gen_range(45.0..90.0);
                    self.phase = Phase::Rising;
                    self.idle_counter = self.rng.gen_range(150..400);
                }
            }
            Phase::Rising => {
                // Pneumatic cylinder pushing the part up
                self.value += (self.peak - self.value) * 0.28;
                if (self.value - self.peak).abs() < 1.0 {
                    self.value = self.peak;
                    self.reference_height = self.peak;
                    self.weld_progress = 0.0;
                    self.hold_counter = self.rng.gen_range(120..220);
                    self.phase = Phase::Welding;
                }
            }
            Phase::Welding => {
                // Material collapses slightly, plus vibration
                self.weld_progress += self.rng.gen_range(0.02..0.08);
                let upward = self.rng.gen_range(0.0..0.4);
                let downward = self.rng.gen_range(0.2..1.2);
                self.value = self.reference_height - self.weld_progress + upward - downward;

                self.hold_counter = self.hold_counter.saturating_sub(1);
                if self.hold_counter == 0 {
                    self.phase = Phase::Falling;
                }
            }
            Phase::Falling => {
                // Pneumatic retract: part drops away
                self.value *= 0.84;
                if self.value < 3.0 {
                    self.value = 0.0;
                    self.phase = Phase::Idle;
                    self.cycles_emitted += 1;
                }
            }
        }
        self.value
    }
}

/// Random PLC excursion: mostly powered and running.
fn random_plc_line(rng: &mut StdRng) -> String {
    if rng.gen_bool(0.92) {
        let state = match rng.gen_range(0..10) {
            0 => "IDLE",
            1 => "FAULT",
            _ => "RUNNING",
        };
        format!("PLC:ON,{state}")
    } else {
        "PLC:OFF,OFFLINE".to_string()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut core = SimCore::new(rng);
    let mut plc_rng = StdRng::seed_from_u64(args.seed.unwrap_or(0x9_1C).wrapping_add(1));

    let sample_period = Duration::from_secs_f64(1.0 / args.rate_hz.max(1) as f64);
    let plc_every = (args.plc_interval_secs / sample_period.as_secs_f64()).max(1.0) as u64;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut ticker = tokio::time::interval(sample_period);
    let mut samples: u64 = 0;

    // First PLC frame up front so the gate syncs immediately
    writeln!(out, "PLC:ON,RUNNING")?;

    loop {
        ticker.tick().await;
        samples += 1;

        if samples % plc_every == 0 {
            let line = if args.always_running {
                "PLC:ON,RUNNING".to_string()
            } else {
                random_plc_line(&mut plc_rng)
            };
            writeln!(out, "{line}")?;
        }

        let value = core.step();
        writeln!(out, "L{value:.2}")?;
        out.flush()?;

        if args.cycles > 0 && core.cycles_emitted >= args.cycles {
            break;
        }
    }

    Ok(())
}
