//! CPU versions of the per-pixel field program.
//!
//! Every function here has a GLSL twin in the renderer's field program; the
//! two must stay in lockstep so the unit tests below describe what ends up on
//! screen.

use lavaconfig::Surface;

use crate::Blob;

/// Keeps `r² / d²` finite at a blob's centre.
pub const FIELD_EPSILON: f32 = 1e-4;
/// Surface values below this skip shading and return the background.
pub const SURFACE_EPSILON: f32 = 1e-3;
/// Angular rate (radians per second) of the slow hue oscillation.
pub const HUE_DRIFT_RATE: f32 = 0.05;

/// Summed potential at `point`, in the same unit-square coordinates as blob
/// positions. `aspect` is width / height; x distances are stretched by it so
/// radii stay fractions of the viewport height.
pub fn field_value(point: [f32; 2], blobs: &[Blob], aspect: f32) -> f32 {
    blobs
        .iter()
        .map(|blob| {
            let dx = (point[0] - blob.x) * aspect;
            let dy = point[1] - blob.y;
            let r = blob.radius();
            r * r / (dx * dx + dy * dy + FIELD_EPSILON)
        })
        .sum()
}

/// Hermite ramp matching GLSL `smoothstep`; a degenerate edge pair acts as a step.
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    if edge1 <= edge0 {
        return if x < edge0 { 0.0 } else { 1.0 };
    }
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

pub fn isosurface(field: f32, threshold: f32, softness: f32) -> f32 {
    smoothstep(threshold - softness, threshold + softness, field)
}

/// How far inside the surface a sample sits, on a ramp wider than the edge.
pub fn depth(field: f32, threshold: f32, depth_range: f32) -> f32 {
    smoothstep(threshold, threshold + depth_range, field)
}

/// Thin band just inside the threshold that receives the glow boost.
pub fn rim(field: f32, threshold: f32, softness: f32, rim_width: f32) -> f32 {
    smoothstep(threshold - softness, threshold, field)
        * (1.0 - smoothstep(threshold, threshold + rim_width, field))
}

/// Converts HSL (hue in degrees, saturation and lightness in `[0, 1]`) to RGB.
pub fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [f32; 3] {
    let h = (hue / 360.0).rem_euclid(1.0) * 6.0;
    let chroma = saturation * (1.0 - (2.0 * lightness - 1.0).abs());
    let channel = |offset: f32| {
        let k = ((h + offset).rem_euclid(6.0) - 3.0).abs() - 1.0;
        lightness + chroma * (k.clamp(0.0, 1.0) - 0.5)
    };
    [channel(0.0), channel(4.0), channel(2.0)]
}

/// Per-frame shading inputs; the hue already includes the time-based drift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadeParams {
    pub threshold: f32,
    pub softness: f32,
    pub depth_range: f32,
    pub hue: f32,
    pub saturation: [f32; 2],
    pub lightness: [f32; 2],
    pub rim_width: f32,
    pub rim_boost: f32,
    pub opacity: f32,
    pub background: [f32; 3],
}

impl ShadeParams {
    pub fn from_surface(surface: &Surface, elapsed: f32) -> Self {
        Self {
            threshold: surface.threshold,
            softness: surface.softness,
            depth_range: surface.depth_range,
            hue: surface.hue + (elapsed * HUE_DRIFT_RATE).sin() * surface.hue_drift,
            saturation: surface.saturation,
            lightness: surface.lightness,
            rim_width: surface.rim_width,
            rim_boost: surface.rim_boost,
            opacity: surface.opacity,
            background: surface.background,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shade {
    pub rgb: [f32; 3],
    pub alpha: f32,
}

pub fn shade(field: f32, params: &ShadeParams) -> Shade {
    let surface = isosurface(field, params.threshold, params.softness);
    let d = depth(field, params.threshold, params.depth_range);
    let glow = rim(field, params.threshold, params.softness, params.rim_width);

    let [sat_min, sat_max] = params.saturation;
    let [light_min, light_max] = params.lightness;
    let saturation = lerp(sat_min, sat_max, d);
    let lightness = (lerp(light_max - params.rim_boost, light_min, d) + glow * params.rim_boost)
        .clamp(light_min, light_max);

    Shade {
        rgb: hsl_to_rgb(params.hue, saturation, lightness),
        alpha: surface * params.opacity,
    }
}

/// Final field-pass colour: the shade blended over the background by its alpha.
pub fn pixel_color(field: f32, params: &ShadeParams) -> [f32; 3] {
    if isosurface(field, params.threshold, params.softness) < SURFACE_EPSILON {
        return params.background;
    }
    let Shade { rgb, alpha } = shade(field, params);
    let bg = params.background;
    [
        lerp(bg[0], rgb[0], alpha),
        lerp(bg[1], rgb[1], alpha),
        lerp(bg[2], rgb[2], alpha),
    ]
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}
