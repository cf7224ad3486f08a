//! Sample format and channel layout conversion for device callbacks.

/// Convert a normalized float sample to 16-bit PCM, saturating.
pub fn f32_to_i16(sample: f32) -> i16 {
    if sample.is_nan() {
        return 0;
    }
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Remap interleaved frames from `from` channels to `to` channels, appending to `out`.
///
/// Downmixing to mono averages all channels. Other layouts keep the leading
/// channels and repeat the last one when widening.
pub fn remix(samples: &[i16], from: usize, to: usize, out: &mut Vec<i16>) {
    if from == 0 || to == 0 {
        return;
    }
    if from == to {
        out.extend_from_slice(samples);
        return;
    }

    for frame in samples.chunks_exact(from) {
        if to == 1 {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            out.push((sum / from as i32) as i16);
        } else {
            out.extend((0..to).map(|ch| frame[ch.min(from - 1)]));
        }
    }
}
