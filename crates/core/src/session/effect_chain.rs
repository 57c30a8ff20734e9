//! Randomized per-clip performance effects.
//!
//! Stage order: trailing trim, voice shaping, tail fade, energy-scaled gain,
//! mic colouring, optional limiter. Every probability gate draws its random
//! number whether or not the stage applies, so a seed yields the same stream
//! of decisions regardless of clip content.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::Rng;

use crate::audio::effects::{
    adjust_volume, fade_tail, hard_limit, pitch_shift, preemphasis, saturate, scale,
    truncate_to_fraction,
};
use crate::types::VoiceStyle;

use super::config::EffectConfig;
use super::energy::EnergyModel;

/// Fixed voice-character shaping for a style.
pub fn shape_voice(samples: Vec<f64>, style: VoiceStyle, sr: u32) -> Result<Vec<f64>> {
    let mut out = match style {
        VoiceStyle::Bright => pitch_shift(&samples, sr, 2.0)?,
        VoiceStyle::Deep => pitch_shift(&samples, sr, -2.0)?,
        _ => samples,
    };
    match style {
        VoiceStyle::Natural => {}
        VoiceStyle::Soft => {
            scale(&mut out, 0.9);
            preemphasis(&mut out, 0.85);
        }
        VoiceStyle::Hard => {
            scale(&mut out, 1.1);
            saturate(&mut out, 1.5);
        }
        VoiceStyle::Bright => preemphasis(&mut out, 0.97),
        VoiceStyle::Deep => scale(&mut out, 1.05),
    }
    Ok(out)
}

/// Applies the effect stages to freshly picked clips of one job.
#[derive(Debug, Clone, Copy)]
pub struct EffectChain<'a> {
    config: &'a EffectConfig,
    voice: VoiceStyle,
    sample_rate: u32,
}

impl<'a> EffectChain<'a> {
    pub fn new(config: &'a EffectConfig, voice: VoiceStyle, sample_rate: u32) -> Self {
        Self { config, voice, sample_rate }
    }

    /// Run every stage over `clip`. Updates `energy` with `intensity`.
    pub fn apply(
        &self,
        clip: Vec<f64>,
        intensity: f64,
        energy: &mut EnergyModel,
        rng: &mut StdRng,
    ) -> Result<Vec<f64>> {
        let cfg = self.config;
        let mut samples = clip;

        if rng.gen::<f64>() < cfg.trim_probability {
            let keep = cfg.trim_keep.sample(rng);
            if samples.len() >= 2 {
                truncate_to_fraction(&mut samples, keep);
            }
        }

        samples = shape_voice(samples, self.voice, self.sample_rate)?;

        if rng.gen::<f64>() < cfg.fade_probability {
            let floor = cfg.fade_floor.sample(rng);
            fade_tail(&mut samples, floor);
        }

        let level = energy.absorb(intensity);
        let gain_db = cfg.gain_db.sample(rng) * level;
        adjust_volume(&mut samples, gain_db);

        preemphasis(&mut samples, cfg.mic_color);

        if let Some(threshold) = cfg.limiter {
            hard_limit(&mut samples, threshold);
        }

        Ok(samples)
    }
}
