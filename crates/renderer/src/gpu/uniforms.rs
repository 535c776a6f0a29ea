use blobsim::field::ShadeParams;
use blobsim::{PackedBlobs, MAX_BLOBS};
use bytemuck::{Pod, Zeroable};

/// CPU mirror of the `FieldParams` block in the field program.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct FieldUniforms {
    /// Target width, height, aspect (width / height).
    pub frame: [f32; 4],
    /// Threshold, softness, depth range, opacity.
    pub surface: [f32; 4],
    /// Drifted hue (degrees), saturation min, saturation max.
    pub shade: [f32; 4],
    /// Lightness min, lightness max, rim width, rim boost.
    pub lighting: [f32; 4],
    pub background: [f32; 4],
    /// `x` holds the live blob count.
    pub counts: [i32; 4],
    /// `(x, y, radius, mass)` per blob.
    pub blobs: [[f32; 4]; MAX_BLOBS],
}

unsafe impl Zeroable for FieldUniforms {}
unsafe impl Pod for FieldUniforms {}

impl FieldUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        let mut uniforms = Self::zeroed();
        uniforms.set_frame(width, height);
        uniforms
    }

    pub fn set_frame(&mut self, width: u32, height: u32) {
        let width = width.max(1) as f32;
        let height = height.max(1) as f32;
        self.frame = [width, height, width / height, 0.0];
    }

    pub fn set_shading(&mut self, shade: &ShadeParams) {
        self.surface = [
            shade.threshold,
            shade.softness,
            shade.depth_range,
            shade.opacity,
        ];
        self.shade = [shade.hue, shade.saturation[0], shade.saturation[1], 0.0];
        self.lighting = [
            shade.lightness[0],
            shade.lightness[1],
            shade.rim_width,
            shade.rim_boost,
        ];
        let [r, g, b] = shade.background;
        self.background = [r, g, b, 1.0];
    }

    pub fn set_blobs(&mut self, packed: &PackedBlobs) {
        self.blobs = packed.slots;
        self.counts = [packed.count.min(MAX_BLOBS) as i32, 0, 0, 0];
    }
}

/// CPU mirror of the `PostParams` block shared by bright, blur and composite.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct PostUniforms {
    /// Target width and height in pixels, then the input texel size.
    pub target: [f32; 4],
    /// Tap offset direction scaled by spacing, in input texels.
    pub blur: [f32; 4],
    /// Bloom threshold and intensity.
    pub bloom: [f32; 4],
}

unsafe impl Zeroable for PostUniforms {}
unsafe impl Pod for PostUniforms {}

impl PostUniforms {
    pub fn new(target: (u32, u32), input: (u32, u32), threshold: f32, intensity: f32) -> Self {
        Self {
            target: [
                target.0.max(1) as f32,
                target.1.max(1) as f32,
                1.0 / input.0.max(1) as f32,
                1.0 / input.1.max(1) as f32,
            ],
            blur: [0.0; 4],
            bloom: [threshold, intensity, 0.0, 0.0],
        }
    }

    pub fn with_blur(mut self, direction: [f32; 2], spacing: f32) -> Self {
        self.blur = [direction[0] * spacing, direction[1] * spacing, 0.0, 0.0];
        self
    }
}
