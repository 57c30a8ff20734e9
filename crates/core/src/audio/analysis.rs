//! Audio analysis: RMS energy and voiced-region detection.

/// Compute RMS energy of the entire signal.
pub fn compute_rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f64).sqrt()
}

/// Compute RMS energy in sliding windows of `window` samples every `hop`
/// samples.
///
/// Returns one value per frame. A signal shorter than one window yields a
/// single frame covering the whole signal.
pub fn compute_rms_frames(samples: &[f64], window: usize, hop: usize) -> Vec<f64> {
    if samples.is_empty() || window == 0 || hop == 0 {
        return vec![];
    }
    if samples.len() < window {
        return vec![compute_rms(samples)];
    }

    let n_frames = (samples.len() - window) / hop + 1;
    (0..n_frames)
        .map(|i| compute_rms(&samples[i * hop..i * hop + window]))
        .collect()
}

/// Find regions whose frame energy is within `top_db` of the loudest frame.
///
/// Returns `(start_sample, end_sample)` pairs, end exclusive, in order.
pub fn voiced_intervals(
    samples: &[f64],
    top_db: f64,
    window: usize,
    hop: usize,
) -> Vec<(usize, usize)> {
    let rms = compute_rms_frames(samples, window, hop);
    let max_rms = rms.iter().cloned().fold(0.0f64, f64::max);
    if max_rms <= 0.0 {
        return vec![];
    }

    let voiced: Vec<bool> = rms
        .iter()
        .map(|&r| r > 0.0 && 20.0 * (r / max_rms).log10() > -top_db)
        .collect();

    let mut intervals = Vec::new();
    let mut run_start: Option<usize> = None;
    for (i, &v) in voiced.iter().enumerate() {
        match (v, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(start)) => {
                intervals.push(frames_to_span(start, i - 1, window, hop, samples.len()));
                run_start = None;
            }
            _ => {}
        }
    }
    // A run that reaches the last frame also owns the tail the frames miss.
    if let Some(start) = run_start {
        intervals.push(((start * hop).min(samples.len()), samples.len()));
    }

    intervals
}

fn frames_to_span(
    first: usize,
    last: usize,
    window: usize,
    hop: usize,
    len: usize,
) -> (usize, usize) {
    ((first * hop).min(len), (last * hop + window).min(len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_rms_constant() {
        assert!((compute_rms(&[0.5; 100]) - 0.5).abs() < 1e-12);
        assert_eq!(compute_rms(&[]), 0.0);
    }

    #[test]
    fn test_compute_rms_frames_count() {
        let samples = vec![0.1; 1000];
        let frames = compute_rms_frames(&samples, 100, 50);
        assert_eq!(frames.len(), 19);
        assert!(frames.iter().all(|r| (r - 0.1).abs() < 1e-12));
    }

    #[test]
    fn test_compute_rms_frames_short_signal() {
        let frames = compute_rms_frames(&[0.2; 10], 100, 50);
        assert_eq!(frames.len(), 1);
    }

    #[test]
    fn test_voiced_intervals_finds_bursts() {
        // loud, silent, loud
        let mut samples = vec![0.5; 4000];
        samples.extend(vec![0.0; 8000]);
        samples.extend(vec![0.5; 4000]);

        let intervals = voiced_intervals(&samples, 20.0, 512, 256);
        assert_eq!(intervals.len(), 2, "{:?}", intervals);
        assert_eq!(intervals[0].0, 0);
        assert!(intervals[0].1 >= 4000 && intervals[0].1 < 5000);
        assert!(intervals[1].0 > 11000 && intervals[1].0 <= 12000);
        assert_eq!(intervals[1].1, samples.len());
    }

    #[test]
    fn test_voiced_intervals_silence() {
        assert!(voiced_intervals(&[0.0; 5000], 20.0, 512, 256).is_empty());
    }
}
