//! Flat sentence stream: loudness-matched clips from a single folder joined
//! by noise-filled pauses, with no rounds, phases or voice effects.
//!
//! Every clip is brought to a common RMS level and given short edge fades.
//! Pauses are filled with faint Gaussian noise, and a second noise bed runs
//! under the whole stream so speech and gaps share one floor.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::audio::effects::{
    edge_fade, gaussian_noise, normalize_peak, rms_normalize, seconds_to_samples,
};
use crate::audio::io::{load_mono, write_wav};
use crate::error::ConfigError;
use crate::library::list_audio_files;
use crate::session::config::{check_peak, PauseTiers, Span};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub sample_rate: u32,
    /// Target length in seconds.
    pub duration: Span,
    /// RMS level every clip is scaled to.
    pub target_rms: f64,
    /// Standard deviation of the pause fill and the continuous bed.
    pub noise_level: f64,
    pub fade_ms: f64,
    pub final_peak: f64,
    pub pauses: PauseTiers,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            duration: Span::new(300.0, 600.0),
            target_rms: 0.035,
            noise_level: 0.002,
            fade_ms: 15.0,
            final_peak: 0.95,
            pauses: PauseTiers {
                short_below: 0.6,
                medium_below: 0.9,
                short: Span::new(0.2, 0.5),
                medium: Span::new(0.6, 1.8),
                long: Span::new(2.0, 5.0),
            },
        }
    }
}

impl StreamConfig {
    /// Load and validate a JSON config. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: StreamConfig = serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config: {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        self.duration.check("stream duration", f64::MIN_POSITIVE)?;
        self.pauses.check()?;
        // Every pause must add audio, or an empty clip could stall the loop.
        let sr = self.sample_rate as f64;
        for (name, span) in [
            ("short pause", &self.pauses.short),
            ("medium pause", &self.pauses.medium),
            ("long pause", &self.pauses.long),
        ] {
            if span.min * sr < 1.0 {
                return Err(ConfigError::Range {
                    name: name.to_string(),
                    min: span.min,
                    max: span.max,
                });
            }
        }
        let level_ok = |v: f64| v.is_finite() && v >= 0.0;
        if !level_ok(self.target_rms) || !level_ok(self.noise_level) || !level_ok(self.fade_ms) {
            return Err(ConfigError::Range {
                name: "stream levels".into(),
                min: self.target_rms.min(self.noise_level).min(self.fade_ms),
                max: self.target_rms.max(self.noise_level).max(self.fade_ms),
            });
        }
        check_peak("final", self.final_peak)
    }

    /// Fade length in samples.
    pub fn fade_len(&self) -> usize {
        seconds_to_samples(self.fade_ms / 1000.0, self.sample_rate)
    }
}

/// Indexed set of clips the stream draws from.
pub trait ClipPool {
    fn len(&self) -> usize;

    /// Decode clip `index` at the stream sample rate.
    fn load(&self, index: usize) -> Result<Vec<f64>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every supported audio file directly inside one folder.
#[derive(Debug, Clone)]
pub struct FolderPool {
    files: Vec<PathBuf>,
    sample_rate: u32,
}

impl FolderPool {
    pub fn open(dir: &Path, sample_rate: u32) -> Result<Self> {
        if !dir.is_dir() {
            bail!("Clip folder not found: {}", dir.display());
        }
        let files = list_audio_files(dir)?;
        log::info!("Loaded {} clips from {}", files.len(), dir.display());
        Ok(Self { files, sample_rate })
    }
}

impl ClipPool for FolderPool {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn load(&self, index: usize) -> Result<Vec<f64>> {
        let path = self
            .files
            .get(index)
            .with_context(|| format!("Clip index {} out of range", index))?;
        load_mono(path, self.sample_rate)
            .with_context(|| format!("Failed to load clip {}", path.display()))
    }
}

/// Where a finished stream is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutput {
    /// `<dir>/session_<target seconds>s.wav`
    Directory(PathBuf),
    Exact(PathBuf),
}

impl StreamOutput {
    fn resolve(&self, target_seconds: f64) -> PathBuf {
        match self {
            StreamOutput::Directory(dir) => {
                dir.join(format!("session_{}s.wav", target_seconds as u64))
            }
            StreamOutput::Exact(path) => path.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StreamReport {
    pub path: PathBuf,
    pub clips_played: usize,
    pub target_seconds: f64,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct StreamComposer<'a> {
    config: &'a StreamConfig,
}

impl<'a> StreamComposer<'a> {
    pub fn new(config: &'a StreamConfig) -> Self {
        Self { config }
    }

    /// Uniform pick that never repeats `last` while another clip exists.
    pub fn next_index(&self, len: usize, last: Option<usize>, rng: &mut StdRng) -> usize {
        match last {
            Some(last) if len > 1 && last < len => {
                let i = rng.gen_range(0..len - 1);
                if i >= last {
                    i + 1
                } else {
                    i
                }
            }
            _ => rng.gen_range(0..len),
        }
    }

    /// Clips and noise pauses until the buffer reaches `target_seconds`.
    ///
    /// Returns the buffer and the number of clips played.
    pub fn compose(
        &self,
        pool: &dyn ClipPool,
        target_seconds: f64,
        rng: &mut StdRng,
    ) -> Result<(Vec<f64>, usize)> {
        if pool.is_empty() {
            bail!("No clips to stream");
        }
        let sr = self.config.sample_rate as f64;
        let fade_len = self.config.fade_len();
        let mut buffer: Vec<f64> = Vec::new();
        let mut last = None;
        let mut played = 0;

        while (buffer.len() as f64 / sr) < target_seconds {
            let index = self.next_index(pool.len(), last, rng);
            let mut clip = pool.load(index)?;
            rms_normalize(&mut clip, self.config.target_rms);
            edge_fade(&mut clip, fade_len);
            buffer.extend_from_slice(&clip);
            last = Some(index);
            played += 1;

            let pause = self.config.pauses.draw(rng);
            let n = seconds_to_samples(pause, self.config.sample_rate);
            buffer.extend(gaussian_noise(n, self.config.noise_level, rng));
        }
        Ok((buffer, played))
    }

    /// Continuous noise bed under the whole stream, then peak normalization.
    pub fn finalize(&self, mut buffer: Vec<f64>, rng: &mut StdRng) -> Vec<f64> {
        let bed = gaussian_noise(buffer.len(), self.config.noise_level, rng);
        for (sample, noise) in buffer.iter_mut().zip(bed) {
            *sample += noise;
        }
        normalize_peak(&mut buffer, self.config.final_peak);
        buffer
    }
}

/// Generate one stream from `pool` and write it.
pub fn run_stream(
    config: &StreamConfig,
    pool: &dyn ClipPool,
    output: &StreamOutput,
    seed: Option<u64>,
) -> Result<StreamReport> {
    config.validate().context("Invalid stream config")?;
    let mut rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    };
    let target_seconds = config.duration.sample(&mut rng);
    log::info!("[stream start] target={:.2} minutes", target_seconds / 60.0);

    let composer = StreamComposer::new(config);
    let (buffer, clips_played) = composer.compose(pool, target_seconds, &mut rng)?;
    let audio = composer.finalize(buffer, &mut rng);

    let path = output.resolve(target_seconds);
    write_wav(&path, &audio, config.sample_rate).context("Failed to write stream")?;

    let duration_seconds = audio.len() as f64 / config.sample_rate as f64;
    log::info!(
        "[stream done] {} ({} clips, {:.2} minutes)",
        path.display(),
        clips_played,
        duration_seconds / 60.0
    );
    Ok(StreamReport {
        path,
        clips_played,
        target_seconds,
        duration_seconds,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::analysis::compute_rms;
    use crate::audio::io::read_wav;
    use std::cell::RefCell;

    /// In-memory pool that records the order clips were loaded in.
    struct MemoryPool {
        clips: Vec<Vec<f64>>,
        loaded: RefCell<Vec<usize>>,
    }

    impl MemoryPool {
        fn new(clips: Vec<Vec<f64>>) -> Self {
            Self { clips, loaded: RefCell::new(Vec::new()) }
        }
    }

    impl ClipPool for MemoryPool {
        fn len(&self) -> usize {
            self.clips.len()
        }

        fn load(&self, index: usize) -> Result<Vec<f64>> {
            self.loaded.borrow_mut().push(index);
            Ok(self.clips[index].clone())
        }
    }

    fn tone(n: usize, amp: f64) -> Vec<f64> {
        (0..n).map(|i| (i as f64 * 0.07).sin() * amp).collect()
    }

    fn short_config() -> StreamConfig {
        StreamConfig {
            sample_rate: 1000,
            duration: Span::fixed(30.0),
            ..StreamConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        StreamConfig::default().validate().unwrap();
        assert_eq!(StreamConfig::default().fade_len(), 330);
    }

    #[test]
    fn test_validate_rejects_sub_sample_pause() {
        let mut config = short_config();
        config.pauses.short = Span::new(0.0, 0.5);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Range { .. })
        ));
    }

    #[test]
    fn test_next_index_never_repeats() {
        let config = short_config();
        let composer = StreamComposer::new(&config);
        let mut rng = StdRng::seed_from_u64(1);
        let mut last = None;
        for _ in 0..500 {
            let i = composer.next_index(3, last, &mut rng);
            assert!(i < 3);
            assert_ne!(Some(i), last);
            last = Some(i);
        }
        assert_eq!(composer.next_index(1, Some(0), &mut rng), 0);
    }

    #[test]
    fn test_compose_reaches_target_without_back_to_back_repeats() {
        let config = short_config();
        let pool = MemoryPool::new(vec![tone(800, 0.3), tone(1200, 0.6), tone(500, 0.1)]);
        let mut rng = StdRng::seed_from_u64(7);
        let (buffer, played) = StreamComposer::new(&config)
            .compose(&pool, 30.0, &mut rng)
            .unwrap();

        assert!(buffer.len() >= 30_000);
        let loaded = pool.loaded.borrow();
        assert_eq!(loaded.len(), played);
        assert!(loaded.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_compose_matches_loudness_and_fades_edges() {
        let mut config = short_config();
        config.noise_level = 0.0;
        let pool = MemoryPool::new(vec![tone(2000, 0.8)]);
        let mut rng = StdRng::seed_from_u64(3);
        let (buffer, _) = StreamComposer::new(&config)
            .compose(&pool, 0.5, &mut rng)
            .unwrap();

        let clip = &buffer[..2000];
        assert_eq!(clip[0], 0.0);
        assert_eq!(clip[1999], 0.0);
        // Fades pull the overall level slightly under the target.
        let rms = compute_rms(&clip[15..1985]);
        assert!((rms - 0.035).abs() < 0.003, "rms {}", rms);
        assert!(buffer[2000..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_compose_empty_pool_fails() {
        let config = short_config();
        let pool = MemoryPool::new(vec![]);
        let mut rng = StdRng::seed_from_u64(0);
        let err = StreamComposer::new(&config)
            .compose(&pool, 10.0, &mut rng)
            .unwrap_err();
        assert!(err.to_string().contains("No clips"));
    }

    #[test]
    fn test_finalize_peak_normalizes() {
        let config = short_config();
        let mut rng = StdRng::seed_from_u64(5);
        let out = StreamComposer::new(&config).finalize(tone(3000, 0.2), &mut rng);
        assert_eq!(out.len(), 3000);
        let peak = out.iter().fold(0.0f64, |a, s| a.max(s.abs()));
        assert!((peak - 0.95).abs() < 1e-9);
    }

    #[test]
    fn test_run_stream_names_file_by_target() {
        let config = StreamConfig {
            duration: Span::fixed(4.0),
            ..short_config()
        };
        let dir = tempfile::tempdir().unwrap();
        let pool = MemoryPool::new(vec![tone(700, 0.4), tone(900, 0.2)]);
        let output = StreamOutput::Directory(dir.path().join("out"));

        let report = run_stream(&config, &pool, &output, Some(11)).unwrap();
        assert_eq!(report.path, dir.path().join("out").join("session_4s.wav"));
        assert!(report.duration_seconds >= 4.0);

        let (samples, sr) = read_wav(&report.path).unwrap();
        assert_eq!(sr, 1000);
        assert!(samples.len() >= 4000);
    }

    #[test]
    fn test_folder_pool_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        write_wav(&dir.path().join("a.wav"), &tone(500, 0.3), 1000).unwrap();
        write_wav(&dir.path().join("b.wav"), &tone(600, 0.3), 1000).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let pool = FolderPool::open(dir.path(), 1000).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.load(1).unwrap().len(), 600);
        assert!(pool.load(2).is_err());
        assert!(FolderPool::open(&dir.path().join("missing"), 1000).is_err());
    }
}
