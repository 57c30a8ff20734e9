use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A clip pool and a slot in the round script.
///
/// The set is fixed; the serialized name doubles as the storage folder name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Greetings,
    RoundStart,
    Strategy,
    EnemyInfo,
    Random,
    RoundResult,
    /// Quiet ambient sounds spliced in before pauses.
    Interrupts,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Greetings,
        Category::RoundStart,
        Category::Strategy,
        Category::EnemyInfo,
        Category::Random,
        Category::RoundResult,
        Category::Interrupts,
    ];

    /// Folder name under the clip library root.
    pub fn dir_name(self) -> &'static str {
        match self {
            Category::Greetings => "greetings",
            Category::RoundStart => "round_start",
            Category::Strategy => "strategy",
            Category::EnemyInfo => "enemy_info",
            Category::Random => "random",
            Category::RoundResult => "round_result",
            Category::Interrupts => "interrupts",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.dir_name() == s)
            .ok_or_else(|| format!("unknown category: {}", s))
    }
}

/// Coarse time bucket within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Early,
    Mid,
    Late,
    End,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Early => "early",
            Phase::Mid => "mid",
            Phase::Late => "late",
            Phase::End => "end",
        };
        f.write_str(name)
    }
}

/// Background ambience mixed under a finished session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NoiseProfile {
    None,
    Named(String),
}

impl NoiseProfile {
    /// Name used for the asset lookup and the output subdirectory.
    pub fn name(&self) -> &str {
        match self {
            NoiseProfile::None => "none",
            NoiseProfile::Named(name) => name,
        }
    }
}

impl fmt::Display for NoiseProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NoiseProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "none" {
            return Ok(NoiseProfile::None);
        }
        if s.contains(['/', '\\']) || s == "." || s == ".." {
            return Err(format!("invalid noise profile name: {}", s));
        }
        Ok(NoiseProfile::Named(s.to_string()))
    }
}

/// Fixed voice-character shaping applied to every clip of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceStyle {
    #[default]
    Natural,
    /// Quieter with a gentle high-frequency tilt.
    Soft,
    /// Louder with light saturation.
    Hard,
    /// Two semitones up, strong tilt.
    Bright,
    /// Two semitones down, slightly louder.
    Deep,
}

impl fmt::Display for VoiceStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoiceStyle::Natural => "natural",
            VoiceStyle::Soft => "soft",
            VoiceStyle::Hard => "hard",
            VoiceStyle::Bright => "bright",
            VoiceStyle::Deep => "deep",
        };
        f.write_str(name)
    }
}

impl FromStr for VoiceStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "natural" => Ok(VoiceStyle::Natural),
            "soft" => Ok(VoiceStyle::Soft),
            "hard" => Ok(VoiceStyle::Hard),
            "bright" => Ok(VoiceStyle::Bright),
            "deep" => Ok(VoiceStyle::Deep),
            other => Err(format!(
                "unknown voice style '{}' (expected natural, soft, hard, bright or deep)",
                other
            )),
        }
    }
}

/// Where a finished session is written.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputTarget {
    /// `<root>/<profile>/<next version>.wav`
    Versioned { root: PathBuf },
    /// Exactly this path; no version is allocated.
    Exact(PathBuf),
}

/// Everything an external caller supplies for one generation job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub output: OutputTarget,
    pub voice: VoiceStyle,
    pub noise: NoiseProfile,
    /// RNG seed for reproducible output
    pub seed: Option<u64>,
}

/// A written session file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputArtifact {
    pub profile: String,
    pub version: Option<u64>,
    pub path: PathBuf,
}

/// Counters collected while a session is generated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionStats {
    pub rounds: usize,
    pub clips_played: usize,
    /// Eligible slots whose pool had nothing to play.
    pub empty_picks: usize,
    pub false_starts: usize,
    pub interrupters: usize,
    pub silence_seconds: f64,
    pub duration_seconds: f64,
}
