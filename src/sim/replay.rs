//! Input recording and replay
//!
//! A run is fully determined by its seed, its configuration and the
//! sequence of (delta, controls) frames fed to it. An [`InputTape`] stores
//! exactly that, so a recorded run can be replayed bit-for-bit.

use serde::{Deserialize, Serialize};

use super::tick::{Simulation, TickInput};
use crate::config::{ConfigError, SimConfig};

/// One frame of recorded input
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    pub delta_sec: f64,
    #[serde(default)]
    pub gas: bool,
    #[serde(default)]
    pub brake: bool,
    #[serde(default)]
    pub boost: bool,
}

impl InputFrame {
    pub fn new(delta_sec: f64, input: TickInput) -> Self {
        Self {
            delta_sec,
            gas: input.gas,
            brake: input.brake,
            boost: input.boost,
        }
    }

    pub fn input(&self) -> TickInput {
        TickInput {
            gas: self.gas,
            brake: self.brake,
            boost: self.boost,
        }
    }
}

/// Seed, configuration and every frame of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputTape {
    pub seed: u32,
    #[serde(default)]
    pub config: SimConfig,
    pub frames: Vec<InputFrame>,
}

impl InputTape {
    pub fn new(seed: u32, config: SimConfig) -> Self {
        Self {
            seed,
            config,
            frames: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn record(&mut self, delta_sec: f64, input: TickInput) {
        self.frames.push(InputFrame::new(delta_sec, input));
    }

    /// Feed one frame to `sim` and record it
    pub fn step(&mut self, sim: &mut Simulation, delta_sec: f64, input: TickInput) {
        sim.apply_input(&input);
        sim.step(delta_sec);
        self.record(delta_sec, input);
    }

    /// Rebuild the run from scratch and feed every frame
    pub fn play(&self) -> Simulation {
        let mut sim = Simulation::new(self.seed, self.config.clone());
        sim.start_run();
        for frame in &self.frames {
            sim.apply_input(&frame.input());
            sim.step(frame.delta_sec);
        }
        log::debug!("Replayed {} frames of seed {}", self.frames.len(), self.seed);
        sim
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut tape: InputTape = serde_json::from_str(json)?;
        tape.config.sanitize();
        Ok(tape)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string(self)?)
    }
}
