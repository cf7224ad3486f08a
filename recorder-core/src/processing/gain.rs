//! Per-buffer gain stage and peak metering.
//!
//! Runs on the capture thread for every buffer before it reaches the encoder.

use std::sync::atomic::{AtomicU32, Ordering};

/// Lowest gain the recorder will apply.
pub const MIN_GAIN: f32 = 0.1;
/// Highest gain the recorder will apply.
pub const MAX_GAIN: f32 = 3.0;

/// Smallest normalized peak ratio before taking the logarithm.
pub const MIN_PEAK_RATIO: f32 = 1e-6;
/// Peak level reported for a silent buffer: `20 * log10(1e-6)`.
pub const PEAK_FLOOR_DB: f32 = -120.0;

const FULL_SCALE: f32 = i16::MAX as f32;

pub fn clamp_gain(value: f32) -> f32 {
    if value.is_nan() {
        return 1.0;
    }
    value.clamp(MIN_GAIN, MAX_GAIN)
}

/// Gain shared between the controller (writer) and the capture loop (reader).
#[derive(Debug)]
pub struct GainCell(AtomicU32);

impl GainCell {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(clamp_gain(value).to_bits()))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Acquire))
    }

    /// Stores the clamped value and returns it.
    pub fn set(&self, value: f32) -> f32 {
        let clamped = clamp_gain(value);
        self.0.store(clamped.to_bits(), Ordering::Release);
        clamped
    }
}

impl Default for GainCell {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Latest peak level in dBFS, published by the capture loop.
#[derive(Debug)]
pub struct PeakCell(AtomicU32);

impl PeakCell {
    pub fn new() -> Self {
        Self(AtomicU32::new(PEAK_FLOOR_DB.to_bits()))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, db: f32) {
        self.0.store(db.to_bits(), Ordering::Relaxed);
    }
}

impl Default for PeakCell {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale `samples` in place by `gain` and return the buffer's peak in dBFS.
///
/// Scaled samples saturate at the 16-bit range. A gain of exactly 1.0 leaves
/// the buffer untouched.
pub fn apply_gain(samples: &mut [i16], gain: f32) -> f32 {
    let mut max_abs: i32 = 0;

    if gain != 1.0 {
        for sample in samples.iter_mut() {
            let scaled = (*sample as f32 * gain).round();
            let clamped = scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            *sample = clamped;
            max_abs = max_abs.max((clamped as i32).abs());
        }
    } else {
        for &sample in samples.iter() {
            max_abs = max_abs.max((sample as i32).abs());
        }
    }

    peak_dbfs(max_abs)
}

/// Convert a maximum absolute sample magnitude to dBFS.
pub fn peak_dbfs(max_abs: i32) -> f32 {
    let normalized = (max_abs as f32 / FULL_SCALE).clamp(MIN_PEAK_RATIO, 1.0);
    20.0 * normalized.log10()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gain_is_clamped_to_range() {
        let cell = GainCell::default();
        assert_eq!(cell.set(5.0), MAX_GAIN);
        assert_eq!(cell.get(), MAX_GAIN);
        assert_eq!(cell.set(0.0), MIN_GAIN);
        assert_eq!(cell.set(-2.0), MIN_GAIN);
        assert_eq!(cell.set(1.5), 1.5);
        assert_eq!(GainCell::new(100.0).get(), MAX_GAIN);
    }

    #[test]
    fn nan_gain_falls_back_to_unity() {
        assert_eq!(clamp_gain(f32::NAN), 1.0);
    }

    #[test]
    fn silent_buffer_reports_floor() {
        let mut samples = vec![0i16; 160];
        let db = apply_gain(&mut samples, 1.0);
        assert_relative_eq!(db, 20.0 * MIN_PEAK_RATIO.log10(), epsilon = 1e-3);
        assert_relative_eq!(db, PEAK_FLOOR_DB, epsilon = 1e-3);
    }

    #[test]
    fn full_scale_buffer_is_near_zero_dbfs() {
        let mut samples = vec![i16::MAX; 160];
        let db = apply_gain(&mut samples, 1.0);
        assert_relative_eq!(db, 0.0, epsilon = 1e-4);

        let mut negative = vec![i16::MIN; 160];
        assert_relative_eq!(apply_gain(&mut negative, 1.0), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn half_scale_is_about_minus_six_db() {
        let mut samples = vec![0i16, 16384, -100];
        let db = apply_gain(&mut samples, 1.0);
        assert_relative_eq!(db, -6.02, epsilon = 0.01);
    }

    #[test]
    fn gain_scales_in_place_and_saturates() {
        let mut samples = vec![1000i16, -1000, 20000, -20000];
        apply_gain(&mut samples, 2.0);
        assert_eq!(samples, vec![2000, -2000, i16::MAX, i16::MIN]);
    }

    #[test]
    fn unity_gain_leaves_samples_untouched() {
        let mut samples = vec![1, -2, 3, 12345];
        apply_gain(&mut samples, 1.0);
        assert_eq!(samples, vec![1, -2, 3, 12345]);
    }

    #[test]
    fn peak_cell_starts_at_floor() {
        let cell = PeakCell::new();
        assert_eq!(cell.get(), PEAK_FLOOR_DB);
        cell.set(-3.5);
        assert_eq!(cell.get(), -3.5);
    }
}
