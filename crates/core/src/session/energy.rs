//! Vocal-intensity state carried across clips and rounds.

use rand::rngs::StdRng;

use super::config::{EnergyConfig, EnergyReset};

/// Scalar energy in nominally `[0, 1]`. Not clamped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergyModel {
    value: f64,
    carry: f64,
}

impl EnergyModel {
    pub fn new(config: &EnergyConfig) -> Self {
        Self {
            value: config.initial,
            carry: config.carry,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Pull energy back at the top of a round.
    pub fn start_round(&mut self, reset: &EnergyReset, rng: &mut StdRng) {
        match reset {
            EnergyReset::Decay(span) => self.value *= span.sample(rng),
            EnergyReset::Reset(span) => self.value = span.sample(rng),
        }
    }

    /// Blend a clip's intensity into the running energy; returns the new value.
    pub fn absorb(&mut self, intensity: f64) -> f64 {
        self.value = self.value * self.carry + intensity * (1.0 - self.carry);
        self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::config::Span;
    use rand::SeedableRng;

    #[test]
    fn test_absorb_blends() {
        let mut energy = EnergyModel::new(&EnergyConfig::default());
        assert_eq!(energy.value(), 0.3);
        let v = energy.absorb(0.8);
        assert!((v - (0.3 * 0.7 + 0.8 * 0.3)).abs() < 1e-12);
    }

    #[test]
    fn test_absorb_converges_to_intensity() {
        let mut energy = EnergyModel::new(&EnergyConfig::default());
        for _ in 0..200 {
            energy.absorb(0.5);
        }
        assert!((energy.value() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_decay_shrinks() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut energy = EnergyModel::new(&EnergyConfig::default());
        energy.start_round(&EnergyReset::Decay(Span::new(0.6, 0.85)), &mut rng);
        assert!(energy.value() >= 0.3 * 0.6 && energy.value() < 0.3 * 0.85);
    }

    #[test]
    fn test_reset_replaces() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut energy = EnergyModel::new(&EnergyConfig::default());
        energy.absorb(1.0);
        energy.start_round(&EnergyReset::Reset(Span::new(0.5, 0.8)), &mut rng);
        assert!((0.5..0.8).contains(&energy.value()));
    }
}
