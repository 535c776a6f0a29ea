//! Constants and CPU mirrors for the post-processing passes.

/// Rec. 709 luminance weights.
pub const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Centre weight followed by the four symmetric side weights of the 9-tap blur.
pub const BLUR_WEIGHTS: [f32; 5] = [0.2270270, 0.1945946, 0.1216216, 0.0540541, 0.0162162];

/// Knee of the `c / (c + k)` tone map used by the composite.
pub const TONE_MAP_KNEE: f32 = 0.5;

/// Viewport width at which the configured blur radius is used unscaled.
pub const REFERENCE_WIDTH: f32 = 1280.0;

/// Smallest width scale applied to the blur radius on narrow viewports.
pub const MIN_WIDTH_SCALE: f32 = 0.5;

pub fn luminance(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA_WEIGHTS[0] + rgb[1] * LUMA_WEIGHTS[1] + rgb[2] * LUMA_WEIGHTS[2]
}

/// Bright-pass extraction: colours above `threshold` luminance are kept,
/// rescaled so the threshold maps to zero.
pub fn bright_pass(rgb: [f32; 3], threshold: f32) -> [f32; 3] {
    let lum = luminance(rgb);
    if lum <= threshold {
        return [0.0; 3];
    }
    let weight = (lum - threshold) / (1.0 - threshold);
    rgb.map(|channel| channel * weight)
}

pub fn tone_map(rgb: [f32; 3]) -> [f32; 3] {
    rgb.map(|channel| channel / (channel + TONE_MAP_KNEE))
}

/// Tap spacing (in half-resolution texels) for the given blur iteration.
///
/// Iteration 0 uses the configured radius scaled to the viewport width; every
/// later iteration doubles it.
pub fn blur_spacing(radius: f32, full_width: u32, iteration: u32) -> f32 {
    let width_scale = (full_width as f32 / REFERENCE_WIDTH).max(MIN_WIDTH_SCALE);
    radius * width_scale * (1u32 << iteration.min(8)) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_weights_are_normalised() {
        let total = BLUR_WEIGHTS[0] + 2.0 * BLUR_WEIGHTS[1..].iter().sum::<f32>();
        assert!((total - 1.0).abs() < 1e-5, "total = {total}");
    }

    #[test]
    fn blur_weights_decay_outward() {
        assert!(BLUR_WEIGHTS.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn bright_pass_zeroes_dim_pixels() {
        assert_eq!(bright_pass([0.1, 0.1, 0.1], 0.35), [0.0; 3]);
    }

    #[test]
    fn bright_pass_rescales_bright_pixels() {
        let white = bright_pass([1.0, 1.0, 1.0], 0.35);
        for channel in white {
            assert!((channel - 1.0).abs() < 1e-5);
        }
        let mid = bright_pass([0.6, 0.6, 0.6], 0.35);
        let expected = 0.6 * (0.6 - 0.35) / 0.65;
        assert!((mid[1] - expected).abs() < 1e-5);
    }

    #[test]
    fn tone_map_stays_below_one() {
        for value in [0.0_f32, 0.5, 1.0, 10.0, 1e6] {
            let mapped = tone_map([value; 3])[0];
            assert!((0.0..1.0).contains(&mapped));
        }
        assert!((tone_map([0.5; 3])[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn blur_spacing_scales_with_width_and_iteration() {
        assert!((blur_spacing(1.5, 1280, 0) - 1.5).abs() < 1e-6);
        assert!((blur_spacing(1.5, 2560, 0) - 3.0).abs() < 1e-6);
        assert!((blur_spacing(1.5, 320, 0) - 0.75).abs() < 1e-6);
        assert!((blur_spacing(1.5, 1280, 1) - 3.0).abs() < 1e-6);
    }
}
