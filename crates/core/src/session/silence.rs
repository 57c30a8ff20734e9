//! Tiered pauses between clips, with the occasional quiet interrupter.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::Rng;

use crate::audio::effects::scale;
use crate::library::ClipSource;
use crate::types::Category;

use super::config::{InterrupterConfig, PauseTiers};
use super::SessionState;

#[derive(Debug, Clone, Copy)]
pub struct SilenceScheduler<'a> {
    tiers: &'a PauseTiers,
    interrupter: &'a InterrupterConfig,
}

impl<'a> SilenceScheduler<'a> {
    pub fn new(tiers: &'a PauseTiers, interrupter: &'a InterrupterConfig) -> Self {
        Self { tiers, interrupter }
    }

    /// Length of a post-clip pause in seconds.
    pub fn draw_pause(&self, rng: &mut StdRng) -> f64 {
        self.tiers.draw(rng)
    }

    /// Append a pause of `seconds`, possibly preceded by an interrupter clip.
    ///
    /// Interrupters come from the `interrupts` pool at a fixed low gain and
    /// leave energy alone. An empty pool makes this a plain pause.
    pub fn append_pause(
        &self,
        seconds: f64,
        state: &mut SessionState,
        source: &dyn ClipSource,
    ) -> Result<()> {
        if rng_hit(&mut state.rng, self.interrupter.probability) {
            if let Some(mut clip) = source.pick(Category::Interrupts, &mut state.rng)? {
                scale(&mut clip, self.interrupter.gain);
                state.append_clip(&clip);
                state.stats.interrupters += 1;
            }
        }
        state.append_silence(seconds);
        Ok(())
    }
}

/// `true` with probability `p`. Always consumes one draw.
pub(crate) fn rng_hit(rng: &mut StdRng, p: f64) -> bool {
    rng.gen::<f64>() < p
}
