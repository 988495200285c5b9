//! Peak extraction for waveform display.
//!
//! Reduces a decoded multi-channel signal to a fixed number of normalized peak
//! magnitudes, one per display position.

use rand::Rng;
use std::f32::consts::PI;

/// Number of peaks generated when no `samples` option is given.
pub const DEFAULT_SAMPLES: usize = 200;

/// Windows are scanned with a stride of `window / SCAN_DIVISOR` samples.
const SCAN_DIVISOR: f64 = 10.0;

/// A decoded signal: one sample vector per channel, all of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            channels,
            sample_rate,
        }
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / f64::from(self.sample_rate)
    }

    /// Mono mixdown, used by the tempo estimator.
    pub fn mono(&self) -> Vec<f32> {
        let count = self.channels.len().max(1) as f32;
        (0..self.len())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / count)
            .collect()
    }
}

/// Normalized peak magnitudes in time order, each in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakSeries(Vec<f32>);

impl PeakSeries {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Wraps already-normalized values. Values are clamped into `[0, 1]`.
    pub fn from_values(values: Vec<f32>) -> Self {
        Self(values.into_iter().map(|v| v.clamp(0.0, 1.0)).collect())
    }

    pub fn values(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn max(&self) -> f32 {
        self.0.iter().copied().fold(0.0, f32::max)
    }
}

/// Extract `sample_count` normalized peaks from `signal`.
///
/// Each window is scanned with a stride of a tenth of its width, so very wide
/// windows give an approximate peak. Channels are folded by taking the larger
/// peak, which keeps transients in one channel visible.
pub fn extract_peaks(signal: &DecodedAudio, sample_count: usize) -> PeakSeries {
    let sample_count = sample_count.max(1);
    let len = signal.len();
    let window = len as f64 / sample_count as f64;
    let stride = ((window / SCAN_DIVISOR) as usize).max(1);

    let mut peaks = vec![0.0f32; sample_count];
    for channel in &signal.channels {
        for (i, peak) in peaks.iter_mut().enumerate() {
            let start = (i as f64 * window) as usize;
            // windows narrower than one frame still cover the frame they start in
            let end = ((start as f64 + window) as usize)
                .max(start + 1)
                .min(channel.len());

            let mut min = 0.0f32;
            let mut max = 0.0f32;
            for &value in channel[start.min(end)..end].iter().step_by(stride) {
                max = max.max(value);
                min = min.min(value);
            }

            *peak = peak.max(max.abs().max(min.abs()));
        }
    }

    normalize(&mut peaks);
    PeakSeries(peaks)
}

fn normalize(peaks: &mut [f32]) {
    let max = peaks.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        for peak in peaks.iter_mut() {
            *peak /= max;
        }
    }
}

/// A waveform-shaped stand-in used when the real audio can't be fetched or decoded.
///
/// Values are random around a slow sine envelope and always fall in `[0.1, 1.0]`.
pub fn placeholder_peaks<R: Rng + ?Sized>(sample_count: usize, rng: &mut R) -> PeakSeries {
    let n = sample_count.max(1);
    let values = (0..n)
        .map(|i| {
            let base = rng.random::<f32>() * 0.5 + 0.3;
            let variation = (i as f32 / n as f32 * PI * 4.0).sin() * 0.2;
            (base + variation).clamp(0.1, 1.0)
        })
        .collect();
    PeakSeries(values)
}

/// Parse externally supplied peak data.
///
/// Accepts a JSON array of numbers or a comma-separated list. Anything that
/// isn't a list of finite numbers yields an empty series.
pub fn parse_peaks(text: &str) -> PeakSeries {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return PeakSeries::empty();
    }

    let parsed: Option<Vec<f32>> = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Array(items)) => items
            .iter()
            .map(|item| item.as_f64().map(|v| v as f32))
            .collect(),
        Ok(_) => None,
        Err(_) => trimmed
            .split(',')
            .map(|part| part.trim().parse::<f32>().ok())
            .collect(),
    };

    match parsed {
        Some(values) if values.iter().all(|v| v.is_finite()) => PeakSeries::from_values(values),
        _ => {
            log::warn!("parse_peaks: invalid waveform data, using an empty series");
            PeakSeries::empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn sine(len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| (i as f32 * 0.05).sin() * amplitude)
            .collect()
    }

    #[test]
    fn test_non_silent_max_is_one() {
        let signal = DecodedAudio::new(vec![sine(44_100, 0.3)], 44_100);
        for n in [1, 7, 50, 200, 999] {
            let peaks = extract_peaks(&signal, n);
            assert_eq!(peaks.len(), n);
            assert!((peaks.max() - 1.0).abs() < 1e-6, "n={n} max={}", peaks.max());
        }
    }

    #[test]
    fn test_silence_is_all_zero() {
        let signal = DecodedAudio::new(vec![vec![0.0; 10_000], vec![0.0; 10_000]], 44_100);
        let peaks = extract_peaks(&signal, 50);
        assert_eq!(peaks.len(), 50);
        assert!(peaks.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_more_windows_than_samples() {
        let signal = DecodedAudio::new(vec![vec![0.5, -1.0, 0.25]], 8_000);
        let peaks = extract_peaks(&signal, 10);
        assert_eq!(peaks.len(), 10);
        assert!((peaks.max() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_signal() {
        let peaks = extract_peaks(&DecodedAudio::default(), 12);
        assert_eq!(peaks.len(), 12);
        assert!(peaks.values().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_zero_sample_count_treated_as_one() {
        let signal = DecodedAudio::new(vec![sine(1000, 0.8)], 44_100);
        assert_eq!(extract_peaks(&signal, 0).len(), 1);
    }

    #[test]
    fn test_channel_fold_uses_max() {
        let mut loud = vec![0.0f32; 1000];
        loud[420] = 0.5;
        loud[421] = -0.25;
        loud[800] = 0.1;
        let silent = vec![0.0f32; 1000];

        let stereo = DecodedAudio::new(vec![silent, loud.clone()], 44_100);
        let mono = DecodedAudio::new(vec![loud], 44_100);

        // one sample per window so the stride never skips
        assert_eq!(extract_peaks(&stereo, 1000), extract_peaks(&mono, 1000));
        assert_eq!(extract_peaks(&stereo, 100), extract_peaks(&mono, 100));
    }

    #[test]
    fn test_negative_peak_counts() {
        let mut samples = vec![0.0f32; 100];
        samples[10] = -0.8;
        samples[60] = 0.4;
        let peaks = extract_peaks(&DecodedAudio::new(vec![samples], 100), 2);
        assert_eq!(peaks.values(), &[1.0, 0.5]);
    }

    #[test]
    fn test_placeholder_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let peaks = placeholder_peaks(300, &mut rng);
        assert_eq!(peaks.len(), 300);
        assert!(peaks.values().iter().all(|&v| (0.1..=1.0).contains(&v)));
    }

    #[test]
    fn test_parse_json_and_csv() {
        assert_eq!(parse_peaks("[0.1, 0.5, 1]").values(), &[0.1, 0.5, 1.0]);
        assert_eq!(parse_peaks("0.2, 0.4,0.6").values(), &[0.2, 0.4, 0.6]);
    }

    #[test]
    fn test_parse_invalid_is_empty() {
        assert!(parse_peaks("0.1, nope, 0.3").is_empty());
        assert!(parse_peaks("{\"a\": 1}").is_empty());
        assert!(parse_peaks("[0.1, \"x\"]").is_empty());
        assert!(parse_peaks("").is_empty());
    }
}
