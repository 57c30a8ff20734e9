//! Session configuration: the round script, phase windows, play policies,
//! effect and pause parameters. Script variants are instances of this type.

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::{Category, Phase, VoiceStyle};

/// Intensity used for a category that has a play probability but no weight.
pub const DEFAULT_INTENSITY: f64 = 0.4;

/// Closed range `[min, max]` sampled uniformly. Serialized as `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64)", into = "(f64, f64)")]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: f64) -> Self {
        Self { min: value, max: value }
    }

    /// Draw a value. A collapsed range returns `min` without consuming
    /// randomness.
    pub fn sample(&self, rng: &mut StdRng) -> f64 {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..self.max)
    }

    pub(crate) fn check(&self, name: &str, lower_bound: f64) -> Result<(), ConfigError> {
        let ok = self.min.is_finite()
            && self.max.is_finite()
            && self.min <= self.max
            && self.min >= lower_bound;
        if ok {
            Ok(())
        } else {
            Err(ConfigError::Range { name: name.to_string(), min: self.min, max: self.max })
        }
    }
}

impl From<(f64, f64)> for Span {
    fn from((min, max): (f64, f64)) -> Self {
        Self { min, max }
    }
}

impl From<Span> for (f64, f64) {
    fn from(span: Span) -> Self {
        (span.min, span.max)
    }
}

/// Categories allowed while the round clock is below `until` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseWindow {
    pub phase: Phase,
    /// Exclusive upper bound; `None` extends to infinity (last window only).
    pub until: Option<f64>,
    pub allowed: Vec<Category>,
}

impl PhaseWindow {
    pub fn new(phase: Phase, until: Option<f64>, allowed: &[Category]) -> Self {
        Self { phase, until, allowed: allowed.to_vec() }
    }
}

/// What the phase clock measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseClock {
    /// Wall-clock seconds since the round started generating.
    #[default]
    WallClock,
    /// Seconds of audio appended since the round started.
    AudioPosition,
}

/// Per-category probability of playing when eligible, and intensity weight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayPolicy {
    pub probability: f64,
    #[serde(default = "PlayPolicy::default_intensity")]
    pub intensity: f64,
}

impl PlayPolicy {
    pub const fn new(probability: f64, intensity: f64) -> Self {
        Self { probability, intensity }
    }

    fn default_intensity() -> f64 {
        DEFAULT_INTENSITY
    }
}

/// How energy is pulled back at the start of each round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyReset {
    /// `energy *= U(min, max)`
    Decay(Span),
    /// `energy = U(min, max)`
    Reset(Span),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    pub initial: f64,
    /// Weight kept from the previous energy on every clip play.
    pub carry: f64,
    pub round_reset: EnergyReset,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            initial: 0.3,
            carry: 0.7,
            round_reset: EnergyReset::Decay(Span::new(0.6, 0.85)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    pub trim_probability: f64,
    /// Leading fraction kept when a clip is cut short.
    pub trim_keep: Span,
    pub fade_probability: f64,
    /// Gain reached at the last sample of a faded clip.
    pub fade_floor: Span,
    /// Scaled by the current energy before it is applied.
    pub gain_db: Span,
    /// Pre-emphasis coefficient of the fixed mic colouring.
    pub mic_color: f64,
    pub limiter: Option<f64>,
}

impl Default for EffectConfig {
    fn default() -> Self {
        Self {
            trim_probability: 0.2,
            trim_keep: Span::new(0.85, 0.95),
            fade_probability: 0.25,
            fade_floor: Span::new(0.7, 0.9),
            gain_db: Span::new(-1.0, 1.5),
            mic_color: 0.93,
            limiter: None,
        }
    }
}

/// Post-clip pause distribution: `r < short_below` short,
/// `r < medium_below` medium, otherwise long.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PauseTiers {
    pub short_below: f64,
    pub medium_below: f64,
    pub short: Span,
    pub medium: Span,
    pub long: Span,
}

impl Default for PauseTiers {
    fn default() -> Self {
        Self {
            short_below: 0.5,
            medium_below: 0.9,
            short: Span::new(0.05, 0.3),
            medium: Span::new(0.4, 1.2),
            long: Span::new(2.5, 5.0),
        }
    }
}

impl PauseTiers {
    /// Pick a tier with one uniform draw, then a length within it.
    pub fn draw(&self, rng: &mut StdRng) -> f64 {
        let r: f64 = rng.gen();
        let tier = if r < self.short_below {
            &self.short
        } else if r < self.medium_below {
            &self.medium
        } else {
            &self.long
        };
        tier.sample(rng)
    }

    pub(crate) fn check(&self) -> Result<(), ConfigError> {
        check_probability("short pause tier", self.short_below)?;
        check_probability("medium pause tier", self.medium_below)?;
        if self.medium_below < self.short_below {
            return Err(ConfigError::Range {
                name: "pause tier boundaries".into(),
                min: self.short_below,
                max: self.medium_below,
            });
        }
        self.short.check("short pause", 0.0)?;
        self.medium.check("medium pause", 0.0)?;
        self.long.check("long pause", 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FalseStartConfig {
    pub probability: f64,
    pub pause: Span,
    /// When false, the pause is a hesitation and the clip still plays.
    pub skip_clip: bool,
}

impl Default for FalseStartConfig {
    fn default() -> Self {
        Self {
            probability: 0.15,
            pause: Span::new(0.15, 0.6),
            skip_clip: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterrupterConfig {
    pub probability: f64,
    pub gain: f64,
}

impl Default for InterrupterConfig {
    fn default() -> Self {
        Self { probability: 0.05, gain: 0.15 }
    }
}

/// `target = base_seconds + U(extra_seconds)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DurationConfig {
    pub base_seconds: f64,
    pub extra_seconds: Span,
}

impl Default for DurationConfig {
    fn default() -> Self {
        Self {
            base_seconds: 80.0 * 60.0,
            extra_seconds: Span::new(5.0 * 60.0, 15.0 * 60.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeConfig {
    /// Peak after the speech-only normalize pass.
    pub speech_peak: f64,
    /// Peak after noise has been mixed in.
    pub final_peak: f64,
    pub noise_level: f64,
    /// When set, the noise level drifts linearly to `noise_level * U(min, max)`.
    pub noise_drift: Option<Span>,
}

impl Default for FinalizeConfig {
    fn default() -> Self {
        Self {
            speech_peak: 0.9,
            final_peak: 0.95,
            noise_level: 0.01,
            noise_drift: None,
        }
    }
}

/// Complete description of one session-generation variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub sample_rate: u32,
    pub script: Vec<Category>,
    pub phases: Vec<PhaseWindow>,
    pub phase_clock: PhaseClock,
    pub policies: BTreeMap<Category, PlayPolicy>,
    pub energy: EnergyConfig,
    pub effects: EffectConfig,
    /// Identity name → voice style, for callers that pass a user name.
    pub identities: BTreeMap<String, VoiceStyle>,
    pub pauses: PauseTiers,
    pub false_start: FalseStartConfig,
    pub inter_round_pause: Span,
    pub interrupter: InterrupterConfig,
    pub duration: DurationConfig,
    pub finalize: FinalizeConfig,
    /// Version used when the profile directory holds no numbered file.
    pub default_version: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::classic()
    }
}

impl SessionConfig {
    /// Baseline long-session generator: 30/90/135 s phases, no limiter.
    pub fn classic() -> Self {
        use Category::*;

        Self {
            sample_rate: 16000,
            script: vec![
                Greetings, Strategy, EnemyInfo, Random, Strategy, EnemyInfo, Random, EnemyInfo,
                Strategy, EnemyInfo, RoundResult,
            ],
            phases: vec![
                PhaseWindow::new(Phase::Early, Some(30.0), &[Greetings, Strategy, Random]),
                PhaseWindow::new(Phase::Mid, Some(90.0), &[Strategy, EnemyInfo, Random]),
                PhaseWindow::new(Phase::Late, Some(135.0), &[EnemyInfo, Strategy, Random]),
                PhaseWindow::new(Phase::End, None, &[RoundResult]),
            ],
            phase_clock: PhaseClock::WallClock,
            policies: BTreeMap::from([
                (Greetings, PlayPolicy::new(0.6, 0.2)),
                (Strategy, PlayPolicy::new(0.7, 0.4)),
                (EnemyInfo, PlayPolicy::new(0.8, 0.8)),
                (Random, PlayPolicy::new(0.4, 0.3)),
                (RoundResult, PlayPolicy::new(1.0, 0.5)),
            ]),
            energy: EnergyConfig::default(),
            effects: EffectConfig::default(),
            identities: BTreeMap::from([("g3ooorge".to_string(), VoiceStyle::Soft)]),
            pauses: PauseTiers::default(),
            false_start: FalseStartConfig::default(),
            inter_round_pause: Span::new(1.0, 3.0),
            interrupter: InterrupterConfig::default(),
            duration: DurationConfig::default(),
            finalize: FinalizeConfig::default(),
            default_version: 1,
        }
    }

    /// Variant tuned for synthetic voices: a `round_start` call-out, a
    /// shorter early phase, headset limiter and a drifting noise bed.
    pub fn ai_voices() -> Self {
        use Category::*;

        Self {
            script: vec![
                Greetings, RoundStart, Strategy, EnemyInfo, Random, Strategy, EnemyInfo, Random,
                EnemyInfo, Strategy, EnemyInfo, RoundResult,
            ],
            phases: vec![
                PhaseWindow::new(
                    Phase::Early,
                    Some(15.0),
                    &[Greetings, RoundStart, Strategy, Random],
                ),
                PhaseWindow::new(Phase::Mid, Some(80.0), &[Strategy, EnemyInfo, Random]),
                PhaseWindow::new(Phase::Late, Some(120.0), &[EnemyInfo, Strategy, Random]),
                PhaseWindow::new(Phase::End, None, &[RoundResult]),
            ],
            policies: BTreeMap::from([
                (Greetings, PlayPolicy::new(0.8, 0.7)),
                (RoundStart, PlayPolicy::new(0.95, 0.9)),
                (Strategy, PlayPolicy::new(0.7, 0.5)),
                (EnemyInfo, PlayPolicy::new(0.85, 0.9)),
                (Random, PlayPolicy::new(0.35, 0.3)),
                (RoundResult, PlayPolicy::new(1.0, 0.6)),
            ]),
            energy: EnergyConfig {
                initial: 0.5,
                carry: 0.7,
                round_reset: EnergyReset::Reset(Span::new(0.5, 0.8)),
            },
            effects: EffectConfig {
                trim_probability: 0.15,
                trim_keep: Span::new(0.90, 0.98),
                fade_probability: 0.20,
                fade_floor: Span::new(0.7, 0.9),
                gain_db: Span::new(-1.0, 2.0),
                mic_color: 0.95,
                limiter: Some(0.8),
            },
            pauses: PauseTiers {
                short_below: 0.5,
                medium_below: 0.85,
                short: Span::new(0.1, 0.4),
                medium: Span::new(0.5, 1.5),
                long: Span::new(3.0, 7.0),
            },
            false_start: FalseStartConfig {
                probability: 0.15,
                pause: Span::new(0.2, 0.8),
                skip_clip: false,
            },
            inter_round_pause: Span::new(2.0, 5.0),
            finalize: FinalizeConfig {
                speech_peak: 0.9,
                final_peak: 0.98,
                noise_level: 0.012,
                noise_drift: Some(Span::new(0.8, 1.2)),
            },
            ..Self::classic()
        }
    }

    /// Load a JSON config. Fields left out take the classic values.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: SessionConfig = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    /// Play policy for a category, if it may ever play.
    pub fn policy(&self, category: Category) -> Option<&PlayPolicy> {
        self.policies.get(&category)
    }

    /// Resolve an identity name to its voice style.
    pub fn voice_for(&self, identity: &str) -> VoiceStyle {
        self.identities.get(identity).copied().unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.script.is_empty() {
            return Err(ConfigError::EmptyScript);
        }
        validate_phases(&self.phases)?;

        for (category, policy) in &self.policies {
            check_probability(&format!("{} play", category), policy.probability)?;
        }
        check_probability("trim", self.effects.trim_probability)?;
        check_probability("fade", self.effects.fade_probability)?;
        check_probability("false start", self.false_start.probability)?;
        check_probability("interrupter", self.interrupter.probability)?;
        self.pauses.check()?;

        match self.energy.round_reset {
            EnergyReset::Decay(span) => span.check("energy decay", 0.0)?,
            EnergyReset::Reset(span) => span.check("energy reset", 0.0)?,
        }
        self.effects.trim_keep.check("trim keep", 0.0)?;
        if self.effects.trim_keep.max > 1.0 {
            return Err(ConfigError::Range {
                name: "trim keep".into(),
                min: self.effects.trim_keep.min,
                max: self.effects.trim_keep.max,
            });
        }
        self.effects.fade_floor.check("fade floor", 0.0)?;
        self.effects.gain_db.check("gain dB", f64::NEG_INFINITY)?;
        self.false_start.pause.check("false start pause", 0.0)?;
        self.inter_round_pause.check("inter-round pause", 0.0)?;
        self.duration.extra_seconds.check("extra duration", 0.0)?;
        if let Some(drift) = self.finalize.noise_drift {
            drift.check("noise drift", 0.0)?;
        }

        check_peak("speech", self.finalize.speech_peak)?;
        check_peak("final", self.finalize.final_peak)?;

        if self.inter_round_pause.min * (self.sample_rate as f64) < 1.0 {
            return Err(ConfigError::InterRoundTooShort);
        }

        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name: name.to_string(), value })
    }
}

pub(crate) fn check_peak(name: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Peak { name: name.to_string(), value })
    }
}

/// Windows must be contiguous, strictly increasing, and end with an
/// unbounded window so every elapsed time maps to exactly one phase.
fn validate_phases(phases: &[PhaseWindow]) -> Result<(), ConfigError> {
    let Some((last, bounded)) = phases.split_last() else {
        return Err(ConfigError::PhaseWindows("no windows configured".into()));
    };
    if last.until.is_some() {
        return Err(ConfigError::PhaseWindows(
            "last window must extend to infinity".into(),
        ));
    }

    let mut previous = 0.0;
    for window in bounded {
        let Some(until) = window.until else {
            return Err(ConfigError::PhaseWindows(format!(
                "only the last window may be unbounded ({} is not last)",
                window.phase
            )));
        };
        if !until.is_finite() || until <= previous {
            return Err(ConfigError::PhaseWindows(format!(
                "window {} ends at {} which does not follow {}",
                window.phase, until, previous
            )));
        }
        previous = until;
    }
    Ok(())
}

/// Named built-in configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Preset {
    #[default]
    Classic,
    AiVoices,
}

impl Preset {
    pub fn config(self) -> SessionConfig {
        match self {
            Preset::Classic => SessionConfig::classic(),
            Preset::AiVoices => SessionConfig::ai_voices(),
        }
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classic" => Ok(Preset::Classic),
            "ai-voices" | "ai_voices" => Ok(Preset::AiVoices),
            other => Err(format!("unknown preset '{}' (expected classic or ai-voices)", other)),
        }
    }
}
