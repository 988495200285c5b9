//! Tempo estimation from an onset envelope.

/// Envelope hop in seconds.
const HOP_SECS: f64 = 0.01;
const MIN_BPM: f64 = 60.0;
const MAX_BPM: f64 = 180.0;
/// Shortest input worth analyzing, in seconds.
const MIN_ANALYSIS_SECS: f64 = 4.0;

/// Estimate the tempo of a mono signal in beats per minute.
///
/// Builds an RMS envelope in 10 ms hops, takes the rectified first difference as
/// onset strength and picks the autocorrelation peak between 60 and 180 BPM.
/// Returns `None` for silence or input shorter than a few seconds.
pub fn estimate_bpm(samples: &[f32], sample_rate: u32) -> Option<f32> {
    if sample_rate == 0 {
        return None;
    }
    let hop = ((f64::from(sample_rate) * HOP_SECS) as usize).max(1);
    if (samples.len() as f64 / f64::from(sample_rate)) < MIN_ANALYSIS_SECS {
        return None;
    }

    let envelope: Vec<f32> = samples
        .chunks(hop)
        .map(|chunk| (chunk.iter().map(|s| s * s).sum::<f32>() / chunk.len() as f32).sqrt())
        .collect();

    let onsets: Vec<f32> = envelope
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .collect();
    let mean = onsets.iter().sum::<f32>() / onsets.len().max(1) as f32;
    if mean <= f32::EPSILON {
        return None;
    }
    let centered: Vec<f32> = onsets.iter().map(|v| v - mean).collect();

    let frames_per_minute = 60.0 / HOP_SECS;
    let min_lag = (frames_per_minute / MAX_BPM).floor() as usize;
    let max_lag = ((frames_per_minute / MIN_BPM).ceil() as usize).min(centered.len() / 2);
    if min_lag == 0 || min_lag >= max_lag {
        return None;
    }

    let (best_lag, best_score) = (min_lag..=max_lag)
        .map(|lag| {
            let score: f32 = centered
                .iter()
                .zip(&centered[lag..])
                .map(|(a, b)| a * b)
                .sum::<f32>()
                / (centered.len() - lag) as f32;
            (lag, score)
        })
        .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

    if best_lag == 0 || best_score <= 0.0 {
        return None;
    }
    Some((frames_per_minute / best_lag as f64) as f32)
}
