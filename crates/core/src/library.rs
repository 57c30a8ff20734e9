//! Clip library: category folders of voice clips and background ambience.
//!
//! Layout on disk:
//!
//! ```text
//! <root>/greetings/*.mp3
//! <root>/enemy_info/*.wav
//! ...
//! <root>/bg_noise/<profile>.<ext>
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::audio::io::load_mono;
use crate::error::AssetError;
use crate::types::{Category, NoiseProfile};

/// File extensions accepted as clips or ambience.
pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["mp3", "wav", "m4a", "aac", "mp4"];

/// Folder holding the background ambience files.
pub const NOISE_DIR: &str = "bg_noise";

/// Source of voice clips for the round composer.
pub trait ClipSource {
    /// Pick one clip of `category`, decoded to the session sample rate.
    ///
    /// `Ok(None)` when the category has nothing to play.
    fn pick(&self, category: Category, rng: &mut StdRng) -> Result<Option<Vec<f64>>>;
}

/// Source of background ambience for the finalize pass.
pub trait AmbienceSource {
    fn load_ambience(&self, profile: &NoiseProfile) -> std::result::Result<Vec<f64>, AssetError>;
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

/// Supported audio files directly inside `dir`, sorted by path.
///
/// A missing directory yields an empty list.
pub fn list_audio_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_file() && is_supported(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Clip pools resolved from a library root.
#[derive(Debug, Clone)]
pub struct ClipLibrary {
    root: PathBuf,
    sample_rate: u32,
    pools: HashMap<Category, Vec<PathBuf>>,
}

impl ClipLibrary {
    /// Scan every category folder once.
    ///
    /// Missing or empty folders are not an error: they are reported here and
    /// later picks from them return `None`.
    pub fn open(root: &Path, sample_rate: u32) -> Result<Self> {
        let mut pools = HashMap::new();
        for category in Category::ALL {
            let dir = root.join(category.dir_name());
            let files = list_audio_files(&dir)?;
            if files.is_empty() {
                if category == Category::Interrupts {
                    log::debug!("No interrupter clips in {}", dir.display());
                } else {
                    log::warn!("No clips for category {} in {}", category, dir.display());
                }
            } else {
                log::debug!("{}: {} clips", category, files.len());
            }
            pools.insert(category, files);
        }

        let total: usize = pools.values().map(|p| p.len()).sum();
        log::info!("Clip library {}: {} clips", root.display(), total);

        Ok(Self {
            root: root.to_path_buf(),
            sample_rate,
            pools,
        })
    }

    /// Files available for `category`.
    pub fn pool(&self, category: Category) -> &[PathBuf] {
        self.pools.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Locate the ambience file for a named profile.
    pub fn noise_asset(&self, profile: &NoiseProfile) -> std::result::Result<PathBuf, AssetError> {
        let dir = self.root.join(NOISE_DIR);
        let missing = || AssetError::Missing {
            path: dir.join(profile.name()),
        };
        let NoiseProfile::Named(name) = profile else {
            return Err(missing());
        };

        SUPPORTED_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("{}.{}", name, ext)))
            .find(|p| p.is_file())
            .ok_or_else(missing)
    }
}

impl ClipSource for ClipLibrary {
    fn pick(&self, category: Category, rng: &mut StdRng) -> Result<Option<Vec<f64>>> {
        let Some(path) = self.pool(category).choose(rng) else {
            return Ok(None);
        };
        let samples = load_mono(path, self.sample_rate)
            .with_context(|| format!("Failed to load {} clip", category))?;
        Ok(Some(samples))
    }
}

impl AmbienceSource for ClipLibrary {
    fn load_ambience(&self, profile: &NoiseProfile) -> std::result::Result<Vec<f64>, AssetError> {
        let path = self.noise_asset(profile)?;
        log::debug!("Loading ambience {}", path.display());
        load_mono(&path, self.sample_rate)
    }
}
