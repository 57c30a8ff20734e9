//! One round: walk the category script under the phase schedule.

use std::time::Instant;

use anyhow::Result;
use rand::Rng;

use crate::library::ClipSource;
use crate::types::VoiceStyle;

use super::config::{PhaseClock, SessionConfig};
use super::effect_chain::EffectChain;
use super::phase::PhaseScheduler;
use super::silence::{rng_hit, SilenceScheduler};
use super::SessionState;

/// Drives the per-round script for one job.
#[derive(Debug, Clone, Copy)]
pub struct RoundComposer<'a> {
    config: &'a SessionConfig,
    phases: PhaseScheduler<'a>,
    effects: EffectChain<'a>,
    silence: SilenceScheduler<'a>,
}

impl<'a> RoundComposer<'a> {
    pub fn new(config: &'a SessionConfig, voice: VoiceStyle) -> Self {
        Self {
            config,
            phases: PhaseScheduler::new(&config.phases),
            effects: EffectChain::new(&config.effects, voice, config.sample_rate),
            silence: SilenceScheduler::new(&config.pauses, &config.interrupter),
        }
    }

    /// Append one full round to `state.buffer`.
    pub fn compose(&self, state: &mut SessionState, source: &dyn ClipSource) -> Result<()> {
        let cfg = self.config;
        state.energy.start_round(&cfg.energy.round_reset, &mut state.rng);

        let started = Instant::now();
        let start_len = state.buffer.len();
        let elapsed = |state: &SessionState| match cfg.phase_clock {
            PhaseClock::WallClock => started.elapsed().as_secs_f64(),
            PhaseClock::AudioPosition => {
                (state.buffer.len() - start_len) as f64 / state.sample_rate as f64
            }
        };

        for &category in &cfg.script {
            if !self.phases.allows(elapsed(&*state), category) {
                continue;
            }
            let Some(policy) = cfg.policy(category) else {
                continue;
            };
            if state.rng.gen::<f64>() > policy.probability {
                continue;
            }

            if rng_hit(&mut state.rng, cfg.false_start.probability) {
                let pause = cfg.false_start.pause.sample(&mut state.rng);
                self.silence.append_pause(pause, state, source)?;
                state.stats.false_starts += 1;
                if cfg.false_start.skip_clip {
                    continue;
                }
            }

            match source.pick(category, &mut state.rng)? {
                Some(clip) => {
                    let clip = self.effects.apply(
                        clip,
                        policy.intensity,
                        &mut state.energy,
                        &mut state.rng,
                    )?;
                    state.append_clip(&clip);
                    state.stats.clips_played += 1;
                }
                None => state.stats.empty_picks += 1,
            }

            let pause = self.silence.draw_pause(&mut state.rng);
            self.silence.append_pause(pause, state, source)?;
        }

        let gap = cfg.inter_round_pause.sample(&mut state.rng);
        self.silence.append_pause(gap, state, source)?;
        state.stats.rounds += 1;

        log::debug!(
            "Round {}: {:.1}s of audio, energy {:.2}, session at {:.1}s",
            state.stats.rounds,
            (state.buffer.len() - start_len) as f64 / state.sample_rate as f64,
            state.energy.value(),
            state.duration_seconds()
        );
        Ok(())
    }
}
