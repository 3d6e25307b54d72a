//! R-peak detection and heart-rate-variability metrics
//!
//! Peak detection is a single fixed heuristic: every strict local maximum is
//! a candidate, and candidates closer than [`MIN_PEAK_DISTANCE_SAMPLES`] are
//! thinned out keeping the tallest one. No amplitude threshold is applied.

use crate::error::AnalyticsError;
use crate::SAMPLE_INTERVAL_MS;
use serde::{Deserialize, Serialize};

/// Minimum separation between two R peaks (50 samples = 500 ms).
pub const MIN_PEAK_DISTANCE_SAMPLES: usize = 50;

/// HRV parameters derived from one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    pub rr_intervals_ms: Vec<i64>,
    pub bpm: i64,
    pub sdnn_ms: f64,
    pub rmssd_ms: f64,
}

/// Derive HRV metrics from a raw waveform.
///
/// Fails with [`AnalyticsError::InsufficientPeaks`] when fewer than two
/// peaks are found, rather than producing NaN metrics.
///
/// `rmssd_ms` is the square root of the mean RR interval. This is not the
/// clinical RMSSD (which uses successive RR differences); it is kept as is
/// so stored readings stay comparable with the existing dataset.
pub fn compute_metrics(waveform: &[f64]) -> Result<HealthMetrics, AnalyticsError> {
    let peaks = detect_peaks(waveform, MIN_PEAK_DISTANCE_SAMPLES);
    if peaks.len() < 2 {
        return Err(AnalyticsError::InsufficientPeaks { found: peaks.len() });
    }

    let rr_intervals_ms: Vec<i64> = peaks
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as i64 * SAMPLE_INTERVAL_MS)
        .collect();

    let rr: Vec<f64> = rr_intervals_ms.iter().map(|&v| v as f64).collect();
    let mean_rr = mean(&rr);

    let bpm = finite("bpm", (60_000.0 / mean_rr).round())? as i64;
    let sdnn_ms = finite("sdnn", population_std_dev(&rr, mean_rr))?;
    let rmssd_ms = finite("rmssd", mean_rr.sqrt())?;

    Ok(HealthMetrics {
        rr_intervals_ms,
        bpm,
        sdnn_ms,
        rmssd_ms,
    })
}

/// Sample indices of R peaks, in ascending order.
pub fn detect_peaks(waveform: &[f64], min_distance: usize) -> Vec<usize> {
    let candidates = local_maxima(waveform);
    if min_distance <= 1 || candidates.len() < 2 {
        return candidates;
    }
    select_by_distance(waveform, &candidates, min_distance)
}

/// Strict local maxima. A flat top counts once, at its middle sample
/// (rounded down); samples at either edge are never peaks.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` samples to a taller peak.
///
/// Peaks are visited tallest first; on equal height the later peak wins.
fn select_by_distance(x: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut keep = vec![true; peaks.len()];

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[a]].total_cmp(&x[peaks[b]]));

    for &j in order.iter().rev() {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&peak, kept)| kept.then_some(peak))
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn finite(metric: &'static str, value: f64) -> Result<f64, AnalyticsError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalyticsError::NonFinite { metric })
    }
}
