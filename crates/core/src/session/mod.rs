//! Session engine: rounds of scripted clips, pauses and effects, assembled
//! into one long buffer.

pub mod assembler;
pub mod config;
pub mod effect_chain;
pub mod energy;
pub mod phase;
pub mod round;
pub mod silence;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::audio::effects::seconds_to_samples;
use crate::types::SessionStats;

use self::config::SessionConfig;
use self::energy::EnergyModel;

/// Mutable state owned by one generation job.
#[derive(Debug)]
pub struct SessionState {
    /// Mono samples at `sample_rate`. Append-only until finalize.
    pub buffer: Vec<f64>,
    pub energy: EnergyModel,
    pub rng: StdRng,
    pub stats: SessionStats,
    pub sample_rate: u32,
}

impl SessionState {
    /// Fresh state; `seed` makes the whole job reproducible.
    pub fn new(config: &SessionConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self {
            buffer: Vec::new(),
            energy: EnergyModel::new(&config.energy),
            rng,
            stats: SessionStats::default(),
            sample_rate: config.sample_rate,
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        self.buffer.len() as f64 / self.sample_rate as f64
    }

    /// Append `floor(seconds * sr)` zero samples.
    pub fn append_silence(&mut self, seconds: f64) {
        let n = seconds_to_samples(seconds, self.sample_rate);
        self.buffer.resize(self.buffer.len() + n, 0.0);
        self.stats.silence_seconds += n as f64 / self.sample_rate as f64;
    }

    pub fn append_clip(&mut self, clip: &[f64]) {
        self.buffer.extend_from_slice(clip);
    }
}
