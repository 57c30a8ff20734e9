//! Repeat rounds up to a randomized target length, then finalize and write.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use serde::Serialize;

use crate::audio::effects::{mix_noise_bed, normalize_peak};
use crate::library::{AmbienceSource, ClipSource};
use crate::output::OutputWriter;
use crate::types::{JobSpec, NoiseProfile, OutputArtifact, SessionStats, VoiceStyle};

use super::config::{FinalizeConfig, SessionConfig};
use super::round::RoundComposer;
use super::SessionState;

/// Result of a completed job.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub artifact: OutputArtifact,
    pub stats: SessionStats,
    pub target_seconds: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionAssembler<'a> {
    config: &'a SessionConfig,
}

impl<'a> SessionAssembler<'a> {
    pub fn new(config: &'a SessionConfig) -> Self {
        Self { config }
    }

    /// `base + U(extra)` seconds.
    pub fn target_duration(&self, rng: &mut StdRng) -> f64 {
        let duration = &self.config.duration;
        duration.base_seconds + duration.extra_seconds.sample(rng)
    }

    /// Append whole rounds until the buffer reaches `target_seconds`.
    pub fn fill(
        &self,
        state: &mut SessionState,
        source: &dyn ClipSource,
        voice: VoiceStyle,
        target_seconds: f64,
    ) -> Result<()> {
        let composer = RoundComposer::new(self.config, voice);
        while state.duration_seconds() < target_seconds {
            composer.compose(state, source)?;
        }
        Ok(())
    }

    /// Normalize speech, lay the ambience under it, normalize again.
    pub fn finalize(
        &self,
        mut buffer: Vec<f64>,
        noise: &NoiseProfile,
        ambience: &dyn AmbienceSource,
        rng: &mut StdRng,
    ) -> Result<Vec<f64>> {
        let finalize = &self.config.finalize;
        normalize_peak(&mut buffer, finalize.speech_peak);
        let mut mixed = mix_background_noise(buffer, noise, ambience, finalize, rng)?;
        normalize_peak(&mut mixed, finalize.final_peak);
        Ok(mixed)
    }
}

/// Add the ambience for `profile` under `speech`.
///
/// The noise is looped or cut to the speech length. A missing asset, an
/// empty asset, or running out of memory while loading it leaves the speech
/// unchanged with a warning; other load failures are errors.
pub fn mix_background_noise(
    mut speech: Vec<f64>,
    profile: &NoiseProfile,
    ambience: &dyn AmbienceSource,
    config: &FinalizeConfig,
    rng: &mut StdRng,
) -> Result<Vec<f64>> {
    if *profile == NoiseProfile::None || speech.is_empty() {
        return Ok(speech);
    }

    let noise = match ambience.load_ambience(profile) {
        Ok(noise) => noise,
        Err(e) if e.is_soft() => {
            log::warn!("Skipping background noise '{}': {}", profile, e);
            return Ok(speech);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to load background noise '{}'", profile))
        }
    };
    if noise.is_empty() {
        log::warn!("Background noise '{}' is empty, skipping", profile);
        return Ok(speech);
    }

    let start = config.noise_level;
    let end = match config.noise_drift {
        Some(drift) => start * drift.sample(rng),
        None => start,
    };
    log::debug!(
        "Mixing '{}' ({} samples) at level {:.4} -> {:.4}",
        profile,
        noise.len(),
        start,
        end
    );
    mix_noise_bed(&mut speech, &noise, start, end);
    Ok(speech)
}

/// Generate, finalize and write one session.
pub fn run_job<S>(config: &SessionConfig, source: &S, job: &JobSpec) -> Result<SessionReport>
where
    S: ClipSource + AmbienceSource,
{
    config.validate().context("Invalid session config")?;

    let mut state = SessionState::new(config, job.seed);
    let assembler = SessionAssembler::new(config);
    let target_seconds = assembler.target_duration(&mut state.rng);

    log::info!(
        "[job start] noise={} voice={} target={:.0}s",
        job.noise,
        job.voice,
        target_seconds
    );

    assembler.fill(&mut state, source, job.voice, target_seconds)?;

    let SessionState {
        buffer,
        mut rng,
        mut stats,
        sample_rate,
        ..
    } = state;
    let audio = assembler.finalize(buffer, &job.noise, source, &mut rng)?;
    stats.duration_seconds = audio.len() as f64 / sample_rate as f64;

    let artifact = OutputWriter::new(config.default_version)
        .write(&job.output, &job.noise, &audio, sample_rate)
        .context("Failed to write session")?;

    log::info!(
        "[job done] {} ({} rounds, {} clips, {:.1}s)",
        artifact.path.display(),
        stats.rounds,
        stats.clips_played,
        stats.duration_seconds
    );

    Ok(SessionReport {
        artifact,
        stats,
        target_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::effects::peak;
    use crate::audio::io::read_wav;
    use crate::error::AssetError;
    use crate::session::config::{
        DurationConfig, FalseStartConfig, InterrupterConfig, PauseTiers, PhaseWindow, PlayPolicy,
        Span,
    };
    use crate::session::testing::MemorySource;
    use crate::types::{Category, OutputTarget, Phase};
    use rand::SeedableRng;
    use std::collections::BTreeMap;

    /// Script [A, B] with no pauses, effects gates closed, 1-2 s between rounds.
    fn two_clip_config(target_seconds: f64) -> SessionConfig {
        let mut config = SessionConfig::classic();
        config.script = vec![Category::Greetings, Category::Strategy];
        config.phases = vec![PhaseWindow::new(
            Phase::Early,
            None,
            &[Category::Greetings, Category::Strategy],
        )];
        config.policies = BTreeMap::from([
            (Category::Greetings, PlayPolicy::new(1.0, 0.4)),
            (Category::Strategy, PlayPolicy::new(1.0, 0.4)),
        ]);
        config.effects.trim_probability = 0.0;
        config.effects.fade_probability = 0.0;
        config.pauses = PauseTiers {
            short: Span::fixed(0.0),
            medium: Span::fixed(0.0),
            long: Span::fixed(0.0),
            ..PauseTiers::default()
        };
        config.false_start = FalseStartConfig { probability: 0.0, ..Default::default() };
        config.interrupter = InterrupterConfig { probability: 0.0, gain: 0.15 };
        config.inter_round_pause = Span::new(1.0, 2.0);
        config.duration = DurationConfig {
            base_seconds: target_seconds,
            extra_seconds: Span::fixed(0.0),
        };
        config
    }

    fn source() -> MemorySource {
        MemorySource::default()
            .with_clip(Category::Greetings, vec![0.3; 16000])
            .with_clip(Category::Strategy, vec![-0.3; 16000])
    }

    #[test]
    fn test_single_round_scenario() {
        let config = two_clip_config(0.5);
        let dir = tempfile::tempdir().unwrap();
        let job = JobSpec {
            output: OutputTarget::Exact(dir.path().join("out.wav")),
            voice: VoiceStyle::Natural,
            noise: NoiseProfile::None,
            seed: Some(12),
        };

        let report = run_job(&config, &source(), &job).unwrap();
        assert_eq!(report.stats.rounds, 1);
        assert_eq!(report.stats.clips_played, 2);

        let (samples, sr) = read_wav(&report.artifact.path).unwrap();
        assert_eq!(sr, 16000);
        let seconds = samples.len() as f64 / 16000.0;
        assert!(seconds >= 3.0 && seconds < 4.0, "session lasted {}", seconds);
        // two seconds of clip audio, then silence
        assert!(samples[..32000].iter().all(|&s| s != 0.0));
        assert!(samples[32000..].iter().all(|&s| s == 0.0));
        assert!((peak(&samples) - 0.95).abs() < 0.001);
    }

    #[test]
    fn test_duration_bounds() {
        let config = two_clip_config(20.0);
        let assembler = SessionAssembler::new(&config);
        let mut state = SessionState::new(&config, Some(3));
        let target = assembler.target_duration(&mut state.rng);
        assert_eq!(target, 20.0);

        assembler
            .fill(&mut state, &source(), VoiceStyle::Natural, target)
            .unwrap();
        let seconds = state.duration_seconds();
        // one round is at most two clips plus a 2 s gap
        assert!(seconds >= target && seconds < target + 4.0, "got {}", seconds);
        assert!(state.stats.rounds >= 5);
    }

    #[test]
    fn test_target_duration_range() {
        let config = SessionConfig::classic();
        let assembler = SessionAssembler::new(&config);
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..100 {
            let t = assembler.target_duration(&mut rng);
            assert!((5100.0..5700.0).contains(&t));
        }
    }

    #[test]
    fn test_empty_library_terminates() {
        let mut config = SessionConfig::classic();
        config.duration = DurationConfig { base_seconds: 30.0, extra_seconds: Span::fixed(0.0) };
        let assembler = SessionAssembler::new(&config);
        let mut state = SessionState::new(&config, Some(8));

        assembler
            .fill(&mut state, &MemorySource::default(), VoiceStyle::Natural, 30.0)
            .unwrap();
        assert!(state.duration_seconds() >= 30.0);
        assert_eq!(state.stats.clips_played, 0);
        assert!(state.buffer.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_finalize_without_noise_hits_final_peak() {
        let config = SessionConfig::classic();
        let assembler = SessionAssembler::new(&config);
        let mut rng = StdRng::seed_from_u64(0);
        let out = assembler
            .finalize(vec![0.1, -0.2, 0.05], &NoiseProfile::None, &MemorySource::default(), &mut rng)
            .unwrap();
        assert!((peak(&out) - 0.95).abs() < 1e-12);
        assert!((out[1] + 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_finalize_silent_buffer_stays_silent() {
        let config = SessionConfig::classic();
        let assembler = SessionAssembler::new(&config);
        let mut rng = StdRng::seed_from_u64(0);
        let out = assembler
            .finalize(vec![0.0; 100], &NoiseProfile::None, &MemorySource::default(), &mut rng)
            .unwrap();
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mix_preserves_length_short_and_long_noise() {
        let config = FinalizeConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let fan = NoiseProfile::Named("fan".into());

        let short = MemorySource::default().with_ambience("fan", vec![1.0; 7]);
        let out = mix_background_noise(vec![0.0; 100], &fan, &short, &config, &mut rng).unwrap();
        assert_eq!(out.len(), 100);
        assert!(out.iter().all(|&s| (s - 0.01).abs() < 1e-12));

        let long = MemorySource::default().with_ambience("fan", vec![1.0; 1000]);
        let out = mix_background_noise(vec![0.0; 100], &fan, &long, &config, &mut rng).unwrap();
        assert_eq!(out.len(), 100);
    }

    #[test]
    fn test_mix_missing_asset_leaves_speech() {
        let config = FinalizeConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let speech = vec![0.1, 0.2, 0.3];
        let out = mix_background_noise(
            speech.clone(),
            &NoiseProfile::Named("rain".into()),
            &MemorySource::default(),
            &config,
            &mut rng,
        )
        .unwrap();
        assert_eq!(out, speech);
    }

    #[test]
    fn test_mix_drift_ends_within_range() {
        let config = FinalizeConfig {
            noise_level: 0.012,
            noise_drift: Some(Span::new(0.8, 1.2)),
            ..FinalizeConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        let source = MemorySource::default().with_ambience("fan", vec![1.0]);
        let out = mix_background_noise(
            vec![0.0; 1000],
            &NoiseProfile::Named("fan".into()),
            &source,
            &config,
            &mut rng,
        )
        .unwrap();
        assert!((out[0] - 0.012).abs() < 1e-12);
        assert!(out[999] >= 0.012 * 0.8 && out[999] <= 0.012 * 1.2);
    }

    struct BrokenAmbience;

    impl AmbienceSource for BrokenAmbience {
        fn load_ambience(&self, _profile: &NoiseProfile) -> Result<Vec<f64>, AssetError> {
            Err(AssetError::NoTrack { path: "bg_noise/fan.mp4".into() })
        }
    }

    #[test]
    fn test_mix_fatal_asset_error_propagates() {
        let config = FinalizeConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let result = mix_background_noise(
            vec![0.1; 10],
            &NoiseProfile::Named("fan".into()),
            &BrokenAmbience,
            &config,
            &mut rng,
        );
        assert!(result.is_err());
    }

    struct ExhaustedAmbience;

    impl AmbienceSource for ExhaustedAmbience {
        fn load_ambience(&self, _profile: &NoiseProfile) -> Result<Vec<f64>, AssetError> {
            let source = Vec::<f64>::new().try_reserve(usize::MAX).unwrap_err();
            Err(AssetError::Exhausted { path: "bg_noise/fan.mp3".into(), source })
        }
    }

    #[test]
    fn test_mix_out_of_memory_leaves_speech_unchanged() {
        let config = FinalizeConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let speech = vec![0.1, -0.2, 0.3];
        let out = mix_background_noise(
            speech.clone(),
            &NoiseProfile::Named("fan".into()),
            &ExhaustedAmbience,
            &config,
            &mut rng,
        )
        .unwrap();
        assert_eq!(out, speech);
    }

    #[test]
    fn test_run_job_versioned_with_noise() {
        let config = two_clip_config(0.5);
        let dir = tempfile::tempdir().unwrap();
        let source = source().with_ambience("fan", vec![0.5, -0.5]);
        let job = JobSpec {
            output: OutputTarget::Versioned { root: dir.path().to_path_buf() },
            voice: VoiceStyle::Soft,
            noise: NoiseProfile::Named("fan".into()),
            seed: Some(1),
        };

        let first = run_job(&config, &source, &job).unwrap();
        let second = run_job(&config, &source, &job).unwrap();
        assert_eq!(first.artifact.version, Some(1));
        assert_eq!(second.artifact.version, Some(2));
        assert_eq!(second.artifact.path, dir.path().join("fan").join("2.wav"));

        let (samples, _) = read_wav(&first.artifact.path).unwrap();
        // noise fills the inter-round gap
        assert!(samples[samples.len() - 10..].iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_run_job_rejects_invalid_config() {
        let mut config = two_clip_config(0.5);
        config.script.clear();
        let dir = tempfile::tempdir().unwrap();
        let job = JobSpec {
            output: OutputTarget::Exact(dir.path().join("out.wav")),
            voice: VoiceStyle::Natural,
            noise: NoiseProfile::None,
            seed: Some(1),
        };
        assert!(run_job(&config, &source(), &job).is_err());
        assert!(!dir.path().join("out.wav").exists());
    }
}
