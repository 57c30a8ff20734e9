//! Cut raw recordings into short voice clips for the library.
//!
//! Voiced regions are found by frame RMS relative to the loudest frame,
//! regions separated by short gaps are merged, and anything too short to be
//! a call-out is dropped.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::audio::analysis::voiced_intervals;
use crate::audio::io::{load_mono, write_wav};

/// Raw recordings accepted by the splitter.
pub const INPUT_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub sample_rate: u32,
    /// Frames quieter than this many dB below the loudest frame are silence.
    pub top_db: f64,
    /// Gaps up to this many seconds are bridged.
    pub merge_gap: f64,
    /// Shorter clips are discarded.
    pub min_duration: f64,
    pub frame_length: usize,
    pub hop_length: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            top_db: 20.0,
            merge_gap: 0.1,
            min_duration: 0.25,
            frame_length: 2048,
            hop_length: 512,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitSummary {
    pub files: usize,
    pub clips: Vec<PathBuf>,
}

/// Join intervals whose gap is at most `max_gap` samples.
pub fn merge_intervals(intervals: &[(usize, usize)], max_gap: usize) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::with_capacity(intervals.len());
    for &(start, end) in intervals {
        match merged.last_mut() {
            Some(last) if start.saturating_sub(last.1) <= max_gap => last.1 = end,
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Voiced clips of `samples` after merging and the minimum-length filter.
pub fn split_recording(samples: &[f64], config: &SplitConfig) -> Vec<(usize, usize)> {
    let sr = config.sample_rate as f64;
    let intervals = voiced_intervals(
        samples,
        config.top_db,
        config.frame_length,
        config.hop_length,
    );
    let max_gap = (config.merge_gap * sr) as usize;
    let min_len = config.min_duration * sr;

    merge_intervals(&intervals, max_gap)
        .into_iter()
        .filter(|(start, end)| (end - start) as f64 >= min_len)
        .collect()
}

fn recordings_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list input directory: {}", dir.display()))?
    {
        let path = entry?.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| INPUT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && supported {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Split every recording in `input` into `<stem>_clip_NNNN.wav` files in
/// `output`. Clip numbers run across all inputs.
pub fn split_directory(input: &Path, output: &Path, config: &SplitConfig) -> Result<SplitSummary> {
    let files = recordings_in(input)?;
    if files.is_empty() {
        bail!("No audio files found in {}", input.display());
    }
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create directory: {}", output.display()))?;

    let mut summary = SplitSummary::default();
    for path in &files {
        log::info!("Processing: {}", path.display());
        let samples = load_mono(path, config.sample_rate)
            .with_context(|| format!("Failed to load recording {}", path.display()))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "clip".to_string());

        let chunks = split_recording(&samples, config);
        log::info!("Detected {} voice chunks", chunks.len());

        for (start, end) in chunks {
            let name = format!("{}_clip_{:04}.wav", stem, summary.clips.len());
            let clip_path = output.join(name);
            write_wav(&clip_path, &samples[start..end], config.sample_rate)?;
            summary.clips.push(clip_path);
        }
        summary.files += 1;
    }

    log::info!(
        "Exported {} clips to {}",
        summary.clips.len(),
        output.display()
    );
    Ok(summary)
}
