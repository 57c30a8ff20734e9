//! Elapsed-time → phase lookup over validated windows.

use crate::types::{Category, Phase};

use super::config::PhaseWindow;

/// Maps seconds into a round onto the configured phase windows.
#[derive(Debug, Clone, Copy)]
pub struct PhaseScheduler<'a> {
    windows: &'a [PhaseWindow],
}

impl<'a> PhaseScheduler<'a> {
    /// `windows` must have passed `SessionConfig::validate`.
    pub fn new(windows: &'a [PhaseWindow]) -> Self {
        Self { windows }
    }

    /// Index of the first window whose bound exceeds `elapsed`, else the last.
    pub fn index(&self, elapsed: f64) -> usize {
        self.windows
            .iter()
            .position(|w| w.until.map_or(true, |until| elapsed < until))
            .unwrap_or_else(|| self.windows.len().saturating_sub(1))
    }

    fn window(&self, elapsed: f64) -> Option<&'a PhaseWindow> {
        self.windows.get(self.index(elapsed))
    }

    pub fn phase(&self, elapsed: f64) -> Option<Phase> {
        self.window(elapsed).map(|w| w.phase)
    }

    /// Whether `category` may play at `elapsed` seconds into the round.
    pub fn allows(&self, elapsed: f64, category: Category) -> bool {
        self.window(elapsed)
            .map_or(false, |w| w.allowed.contains(&category))
    }
}
