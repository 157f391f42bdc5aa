//! Peak utilities for waveform display
//!
//! Peaks reach the renderer as a precomputed sequence of magnitudes. This
//! module holds the two transformations around that boundary:
//!
//! - [`extract_peaks`]: downsample a raw mono sample buffer into N peaks
//!   (the decoder-side contract; the renderer never calls it itself)
//! - [`normalize_peaks`]: scale a peak sequence so its largest magnitude is
//!   at most 1.0

use crate::error::{Result, WaveformError};

/// Downsample mono audio into `count` peak magnitudes
///
/// The buffer is partitioned into `count` contiguous windows of
/// `len / count` samples (floor division) and the maximum absolute value of
/// each window is taken. Trailing samples that do not fill a window are
/// ignored. When the buffer is shorter than `count`, each window holds a
/// single sample and windows past the end of the buffer are silent.
pub fn extract_peaks(samples: &[f32], count: usize) -> Vec<f32> {
    if count == 0 {
        return Vec::new();
    }

    let samples_per_window = (samples.len() / count).max(1);

    (0..count)
        .map(|window| {
            let start = window * samples_per_window;
            let end = (start + samples_per_window).min(samples.len());
            if start >= end {
                return 0.0;
            }
            samples[start..end]
                .iter()
                .fold(0.0f32, |max, s| max.max(s.abs()))
        })
        .collect()
}

/// Scale peaks by their largest magnitude
///
/// The divisor is `max(1.0, max |v|)`, so sequences already within -1.0..=1.0
/// come back unchanged and normalizing twice is harmless. Signs are kept;
/// the renderer discards them.
pub fn normalize_peaks(peaks: &[f32]) -> Vec<f32> {
    let max_abs = peaks
        .iter()
        .filter(|v| v.is_finite())
        .fold(0.0f32, |max, v| max.max(v.abs()));
    let divisor = max_abs.max(1.0);

    peaks.iter().map(|v| v / divisor).collect()
}

/// Validate and normalize a peak sequence supplied by the host
pub fn prepare_peaks(peaks: &[f32]) -> Result<Vec<f32>> {
    if peaks.is_empty() {
        return Err(WaveformError::EmptyPeaks);
    }
    Ok(normalize_peaks(peaks))
}

/// Magnitude of the peak backing bar `bar_index` out of `total_bars`
///
/// Picks index `floor(bar_index * len / total_bars)`; an empty sequence
/// samples as silence.
#[inline]
pub fn sample_peak(peaks: &[f32], bar_index: usize, total_bars: usize) -> f32 {
    if peaks.is_empty() || total_bars == 0 {
        return 0.0;
    }
    let idx = (bar_index * peaks.len() / total_bars).min(peaks.len() - 1);
    peaks[idx].abs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_scales_by_max() {
        let peaks = normalize_peaks(&[1000.0, 2000.0, 3000.0, 4000.0]);
        assert_eq!(peaks, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_normalize_is_idempotent_for_unit_range() {
        let input = vec![0.1, -0.5, 0.9, 0.0];
        assert_eq!(normalize_peaks(&input), input);
        assert_eq!(normalize_peaks(&normalize_peaks(&input)), input);
    }

    #[test]
    fn test_normalize_uses_magnitude() {
        let peaks = normalize_peaks(&[-4.0, 2.0]);
        assert_eq!(peaks, vec![-1.0, 0.5]);
    }

    #[test]
    fn test_prepare_rejects_empty() {
        assert_eq!(prepare_peaks(&[]), Err(WaveformError::EmptyPeaks));
        assert_eq!(prepare_peaks(&[2.0]).unwrap(), vec![1.0]);
    }

    #[test]
    fn test_extract_takes_window_max() {
        let samples = [0.1, -0.8, 0.3, 0.2, 0.5, -0.4, 0.9];
        // 7 samples / 3 windows = 2 per window, last sample ignored
        let peaks = extract_peaks(&samples, 3);
        assert_eq!(peaks, vec![0.8, 0.3, 0.5]);
    }

    #[test]
    fn test_extract_short_buffer() {
        let peaks = extract_peaks(&[0.5, -0.25], 4);
        assert_eq!(peaks, vec![0.5, 0.25, 0.0, 0.0]);
        assert!(extract_peaks(&[1.0], 0).is_empty());
    }

    #[test]
    fn test_sample_peak_index_mapping() {
        let peaks = [0.1, -0.2, 0.3, 0.4];
        assert_eq!(sample_peak(&peaks, 0, 2), 0.1);
        assert_eq!(sample_peak(&peaks, 1, 2), 0.3);
        assert_eq!(sample_peak(&peaks, 3, 8), 0.2);
        assert_eq!(sample_peak(&[], 3, 8), 0.0);
    }
}
