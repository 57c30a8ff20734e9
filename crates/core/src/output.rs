//! Versioned output files: `<root>/<profile>/<version>.wav`.
//!
//! Versions are allocated by scanning the profile directory. There is no
//! locking, so two jobs writing into the same profile directory at the same
//! time may pick the same version.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::audio::io::write_wav;
use crate::types::{NoiseProfile, OutputArtifact, OutputTarget};

/// First run of ASCII digits in `name`. Runs too long for a `u64` saturate.
fn first_number(name: &str) -> Option<u64> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: &str = &name[start..];
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    Some(digits[..end].parse().unwrap_or(u64::MAX))
}

/// One more than the highest number found in any filename in `dir`.
///
/// Falls back to `default` when the directory is missing or no name holds
/// a number.
pub fn next_version(dir: &Path, default: u64) -> Result<u64> {
    if !dir.is_dir() {
        return Ok(default);
    }
    let mut highest: Option<u64> = None;
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list output directory: {}", dir.display()))?
    {
        let name = entry?.file_name();
        if let Some(n) = first_number(&name.to_string_lossy()) {
            highest = Some(highest.map_or(n, |h| h.max(n)));
        }
    }
    Ok(highest.map_or(default, |h| h.saturating_add(1)))
}

#[derive(Debug, Clone, Copy)]
pub struct OutputWriter {
    default_version: u64,
}

impl OutputWriter {
    pub fn new(default_version: u64) -> Self {
        Self { default_version }
    }

    /// Resolve the destination for `target` without writing anything.
    pub fn resolve(
        &self,
        target: &OutputTarget,
        profile: &NoiseProfile,
    ) -> Result<(PathBuf, Option<u64>)> {
        match target {
            OutputTarget::Exact(path) => Ok((path.clone(), None)),
            OutputTarget::Versioned { root } => {
                let dir = root.join(profile.name());
                let version = next_version(&dir, self.default_version)?;
                Ok((dir.join(format!("{}.wav", version)), Some(version)))
            }
        }
    }

    /// Write `samples` as 16-bit mono WAV and report where they went.
    pub fn write(
        &self,
        target: &OutputTarget,
        profile: &NoiseProfile,
        samples: &[f64],
        sample_rate: u32,
    ) -> Result<OutputArtifact> {
        if let OutputTarget::Versioned { root } = target {
            let dir = root.join(profile.name());
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        let (path, version) = self.resolve(target, profile)?;
        write_wav(&path, samples, sample_rate)?;

        Ok(OutputArtifact {
            profile: profile.name().to_string(),
            version,
            path,
        })
    }
}
