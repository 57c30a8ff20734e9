//! Audio effects: truncation, fades, gain, loudness matching, pre-emphasis,
//! limiting, pitch shift, peak normalization, noise generation and mixing.

use anyhow::Result;
use rand::Rng;
use rand_distr::StandardNormal;

use super::analysis::compute_rms;

/// Number of samples in `seconds` of audio, truncating toward zero.
pub fn seconds_to_samples(seconds: f64, sr: u32) -> usize {
    if seconds <= 0.0 {
        return 0;
    }
    (seconds * sr as f64) as usize
}

/// Keep the leading `fraction` of the clip.
///
/// Never shortens a non-empty clip below one sample.
pub fn truncate_to_fraction(samples: &mut Vec<f64>, fraction: f64) {
    if samples.is_empty() {
        return;
    }
    let keep = (samples.len() as f64 * fraction.clamp(0.0, 1.0)) as usize;
    samples.truncate(keep.max(1));
}

/// Linear gain ramp from 1.0 at the first sample to `floor` at the last.
pub fn fade_tail(samples: &mut [f64], floor: f64) {
    let len = samples.len();
    if len < 2 {
        return;
    }
    let step = (floor - 1.0) / (len - 1) as f64;
    for (i, sample) in samples.iter_mut().enumerate() {
        *sample *= 1.0 + step * i as f64;
    }
}

/// Multiply every sample by a linear factor.
pub fn scale(samples: &mut [f64], gain: f64) {
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
}

/// Scale so the RMS level equals `target`. Silence is left untouched.
pub fn rms_normalize(samples: &mut [f64], target: f64) {
    let rms = compute_rms(samples);
    if rms > 0.0 {
        scale(samples, target / rms);
    }
}

/// Linear fade-in over the first `fade_len` samples and fade-out over the
/// last `fade_len`. Clips no longer than two fades are left alone.
pub fn edge_fade(samples: &mut [f64], fade_len: usize) {
    let len = samples.len();
    if fade_len == 0 || len <= fade_len * 2 {
        return;
    }
    let step = if fade_len > 1 {
        1.0 / (fade_len - 1) as f64
    } else {
        0.0
    };
    for i in 0..fade_len {
        let gain = step * i as f64;
        samples[i] *= gain;
        samples[len - 1 - i] *= gain;
    }
}

/// `len` samples of zero-mean Gaussian noise with standard deviation `level`.
pub fn gaussian_noise<R: Rng + ?Sized>(len: usize, level: f64, rng: &mut R) -> Vec<f64> {
    (0..len)
        .map(|_| rng.sample::<f64, _>(StandardNormal) * level)
        .collect()
}

/// Adjust volume by dB amount. Modifies samples in place.
pub fn adjust_volume(samples: &mut [f64], db: f64) {
    if db.abs() < 1e-9 {
        return;
    }
    scale(samples, 10.0f64.powf(db / 20.0));
}

/// First-order pre-emphasis: `y[n] = x[n] - coef * x[n-1]`.
///
/// The sample before the first is extrapolated as `2*x[0] - x[1]`, which
/// keeps the first output sample from spiking on clips that start mid-wave.
pub fn preemphasis(samples: &mut [f64], coef: f64) {
    let len = samples.len();
    if len == 0 {
        return;
    }
    let initial = if len >= 2 {
        2.0 * samples[0] - samples[1]
    } else {
        samples[0]
    };
    // Walk backwards so each x[n-1] is still the unfiltered value.
    for n in (1..len).rev() {
        samples[n] -= coef * samples[n - 1];
    }
    samples[0] -= coef * initial;
}

/// Hard-clip to `[-threshold, threshold]`.
pub fn hard_limit(samples: &mut [f64], threshold: f64) {
    let t = threshold.abs();
    for sample in samples.iter_mut() {
        *sample = sample.clamp(-t, t);
    }
}

/// `tanh` saturation with the given input drive.
pub fn saturate(samples: &mut [f64], drive: f64) {
    for sample in samples.iter_mut() {
        *sample = (*sample * drive).tanh();
    }
}

/// Pitch-shift by semitones using Signalsmith Stretch (phase vocoder).
///
/// Preserves duration while shifting pitch.
pub fn pitch_shift(samples: &[f64], sr: u32, semitones: f64) -> Result<Vec<f64>> {
    if semitones.abs() < 0.01 || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut stretch = ssstretch::Stretch::new();
    stretch.preset_default(1, sr as f32);
    stretch.set_transpose_semitones(semitones as f32, None);

    let input_f32: Vec<f32> = samples.iter().map(|&s| s as f32).collect();
    let len = input_f32.len() as i32;

    let mut output_f32 = vec![vec![0.0f32; len as usize]; 1];
    stretch.process_vec(&[input_f32], len, &mut output_f32, len);

    Ok(output_f32[0].iter().map(|&s| s as f64).collect())
}

/// Largest absolute sample value.
pub fn peak(samples: &[f64]) -> f64 {
    samples.iter().fold(0.0f64, |acc, s| acc.max(s.abs()))
}

/// Scale so the largest absolute sample equals `target`.
///
/// Returns the peak before scaling. A silent buffer is left untouched.
pub fn normalize_peak(samples: &mut [f64], target: f64) -> f64 {
    let current = peak(samples);
    if current > 0.0 {
        scale(samples, target / current);
    }
    current
}

/// Add `noise` under `speech`, looping the noise to cover the whole buffer.
///
/// The noise gain ramps linearly from `start_level` at the first sample to
/// `end_level` at the last. Output length always equals the speech length.
pub fn mix_noise_bed(speech: &mut [f64], noise: &[f64], start_level: f64, end_level: f64) {
    let len = speech.len();
    if len == 0 || noise.is_empty() {
        return;
    }
    let step = if len > 1 {
        (end_level - start_level) / (len - 1) as f64
    } else {
        0.0
    };
    for (i, sample) in speech.iter_mut().enumerate() {
        let level = start_level + step * i as f64;
        *sample += noise[i % noise.len()] * level;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_rms_normalize_hits_target() {
        let mut samples: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.05).sin() * 0.8).collect();
        rms_normalize(&mut samples, 0.035);
        assert!((compute_rms(&samples) - 0.035).abs() < 1e-9);

        let mut silent = vec![0.0; 10];
        rms_normalize(&mut silent, 0.035);
        assert!(silent.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_edge_fade_ramps_both_ends() {
        let mut samples = vec![1.0; 100];
        edge_fade(&mut samples, 10);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[99], 0.0);
        assert!((samples[9] - 1.0).abs() < 1e-12);
        assert!((samples[90] - 1.0).abs() < 1e-12);
        assert!(samples[5] > 0.0 && samples[5] < 1.0);
        assert_eq!(samples[50], 1.0);
    }

    #[test]
    fn test_edge_fade_skips_short_clips() {
        let mut samples = vec![1.0; 20];
        edge_fade(&mut samples, 10);
        assert!(samples.iter().all(|&s| s == 1.0));
    }

    #[test]
    fn test_gaussian_noise_level() {
        let mut rng = StdRng::seed_from_u64(4);
        let noise = gaussian_noise(50_000, 0.002, &mut rng);
        assert_eq!(noise.len(), 50_000);
        let rms = compute_rms(&noise);
        assert!((rms - 0.002).abs() < 0.0002, "rms {}", rms);
    }

    #[test]
    fn test_seconds_to_samples_truncates() {
        assert_eq!(seconds_to_samples(0.99999, 10), 9);
        assert_eq!(seconds_to_samples(0.0, 16000), 0);
        assert_eq!(seconds_to_samples(-1.0, 16000), 0);
    }

    #[test]
    fn test_truncate_to_fraction() {
        let mut samples = vec![1.0; 1000];
        truncate_to_fraction(&mut samples, 0.9);
        assert_eq!(samples.len(), 900);
    }

    #[test]
    fn test_truncate_keeps_one_sample() {
        let mut samples = vec![1.0; 3];
        truncate_to_fraction(&mut samples, 0.1);
        assert_eq!(samples.len(), 1);

        let mut empty: Vec<f64> = vec![];
        truncate_to_fraction(&mut empty, 0.5);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_fade_tail_endpoints() {
        let mut samples = vec![1.0; 101];
        fade_tail(&mut samples, 0.8);
        assert!((samples[0] - 1.0).abs() < 1e-12);
        assert!((samples[50] - 0.9).abs() < 1e-12);
        assert!((samples[100] - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_fade_tail_degenerate() {
        let mut one = vec![0.5];
        fade_tail(&mut one, 0.7);
        assert_eq!(one, vec![0.5]);
    }

    #[test]
    fn test_adjust_volume() {
        let mut samples = vec![0.5; 100];
        adjust_volume(&mut samples, 6.0); // +6 dB ≈ 2x
        assert!((samples[0] - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_adjust_volume_zero() {
        let mut samples = vec![0.5; 100];
        adjust_volume(&mut samples, 0.0);
        assert_eq!(samples[0], 0.5);
    }

    #[test]
    fn test_preemphasis_matches_difference_equation() {
        let x = vec![0.1, 0.4, -0.2, 0.3];
        let mut y = x.clone();
        preemphasis(&mut y, 0.9);

        let initial = 2.0 * x[0] - x[1];
        assert!((y[0] - (x[0] - 0.9 * initial)).abs() < 1e-12);
        for n in 1..x.len() {
            assert!((y[n] - (x[n] - 0.9 * x[n - 1])).abs() < 1e-12);
        }
    }

    #[test]
    fn test_preemphasis_removes_dc() {
        let mut samples = vec![0.5; 64];
        preemphasis(&mut samples, 0.93);
        // Constant input settles to (1 - coef) * value
        assert!((samples[10] - 0.5 * 0.07).abs() < 1e-9);
    }

    #[test]
    fn test_preemphasis_empty_and_single() {
        let mut empty: Vec<f64> = vec![];
        preemphasis(&mut empty, 0.9);
        let mut single = vec![1.0];
        preemphasis(&mut single, 0.5);
        assert!((single[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_hard_limit() {
        let mut samples = vec![-1.5, -0.5, 0.0, 0.79, 0.81, 2.0];
        hard_limit(&mut samples, 0.8);
        assert_eq!(samples, vec![-0.8, -0.5, 0.0, 0.79, 0.8, 0.8]);
    }

    #[test]
    fn test_saturate_bounded() {
        let mut samples = vec![-10.0, 0.0, 10.0];
        saturate(&mut samples, 1.5);
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
        assert_eq!(samples[1], 0.0);
    }

    #[test]
    fn test_pitch_shift_no_change() {
        let samples = vec![1.0; 100];
        assert_eq!(pitch_shift(&samples, 16000, 0.0).unwrap(), samples);
    }

    #[test]
    fn test_pitch_shift_preserves_length() {
        let sr = 16000u32;
        let samples: Vec<f64> = (0..sr as usize)
            .map(|i| (2.0 * std::f64::consts::PI * 440.0 * i as f64 / sr as f64).sin())
            .collect();
        let result = pitch_shift(&samples, sr, 2.0).unwrap();
        assert_eq!(result.len(), samples.len());
    }

    #[test]
    fn test_normalize_peak_hits_target() {
        let mut samples = vec![0.1, -0.4, 0.2];
        let before = normalize_peak(&mut samples, 0.9);
        assert!((before - 0.4).abs() < 1e-12);
        assert!((peak(&samples) - 0.9).abs() < 1e-12);
        assert!((samples[1] + 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_peak_zero_is_identity() {
        let mut samples = vec![0.0; 32];
        assert_eq!(normalize_peak(&mut samples, 0.95), 0.0);
        assert!(samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mix_noise_bed_loops_short_noise() {
        let mut speech = vec![0.0; 250];
        let noise = vec![1.0, 2.0, 3.0];
        mix_noise_bed(&mut speech, &noise, 0.5, 0.5);
        assert_eq!(speech.len(), 250);
        assert!((speech[0] - 0.5).abs() < 1e-12);
        assert!((speech[4] - 1.0).abs() < 1e-12);
        assert!((speech[249] - 0.5).abs() < 1e-12); // 249 % 3 == 0
    }

    #[test]
    fn test_mix_noise_bed_truncates_long_noise() {
        let mut speech = vec![0.0; 10];
        let noise: Vec<f64> = (0..100).map(|i| i as f64).collect();
        mix_noise_bed(&mut speech, &noise, 1.0, 1.0);
        assert_eq!(speech.len(), 10);
        assert_eq!(speech[9], 9.0);
    }

    #[test]
    fn test_mix_noise_bed_ramps_level() {
        let mut speech = vec![0.0; 11];
        mix_noise_bed(&mut speech, &[1.0], 0.01, 0.02);
        assert!((speech[0] - 0.01).abs() < 1e-12);
        assert!((speech[10] - 0.02).abs() < 1e-12);
        assert!((speech[5] - 0.015).abs() < 1e-12);
    }
}
