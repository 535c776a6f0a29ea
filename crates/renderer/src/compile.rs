use std::borrow::Cow;

use blobsim::field::{FIELD_EPSILON, SURFACE_EPSILON};
use blobsim::MAX_BLOBS;
use wgpu::naga::ShaderStage;

use crate::bloom::{BLUR_WEIGHTS, LUMA_WEIGHTS, TONE_MAP_KNEE};

/// The four fragment programs built at setup. The blur program is shared by
/// all four blur passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    Field,
    Bright,
    Blur,
    Composite,
}

impl Program {
    pub const ALL: [Program; 4] = [
        Program::Field,
        Program::Bright,
        Program::Blur,
        Program::Composite,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Program::Field => "field",
            Program::Bright => "bright",
            Program::Blur => "blur",
            Program::Composite => "composite",
        }
    }

    fn body(self) -> &'static str {
        match self {
            Program::Field => FIELD_BODY,
            Program::Bright => BRIGHT_BODY,
            Program::Blur => BLUR_BODY,
            Program::Composite => COMPOSITE_BODY,
        }
    }

    fn uniform_block(self) -> String {
        match self {
            Program::Field => field_block(),
            _ => POST_BLOCK.to_string(),
        }
    }
}

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn vertex_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen triangle vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

pub(crate) fn fragment_module(device: &wgpu::Device, program: Program) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(program.name()),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(fragment_source(program)),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Assembles a complete GLSL fragment shader for `program`.
///
/// Layout: [`prelude`] (version, output, shared constants and helpers), the
/// program's uniform block, then its body with `main`.
pub(crate) fn fragment_source(program: Program) -> String {
    format!(
        "{prelude}\n{block}\n{body}",
        prelude = prelude(),
        block = program.uniform_block(),
        body = program.body()
    )
}

fn prelude() -> String {
    let [w0, w1, w2, w3, w4] = BLUR_WEIGHTS;
    let [lr, lg, lb] = LUMA_WEIGHTS;
    format!(
        r"#version 450
layout(location = 0) out vec4 out_color;

const int MAX_BLOBS = {MAX_BLOBS};
const float FIELD_EPSILON = {field_eps:?};
const float SURFACE_EPSILON = {surface_eps:?};
const vec3 LUMA = vec3({lr:?}, {lg:?}, {lb:?});
const float BLUR_W0 = {w0:?};
const float BLUR_W1 = {w1:?};
const float BLUR_W2 = {w2:?};
const float BLUR_W3 = {w3:?};
const float BLUR_W4 = {w4:?};
const float TONE_MAP_KNEE = {knee:?};

// smoothstep with a step fallback when the edges collapse.
float ramp(float edge0, float edge1, float x) {{
    if (edge1 <= edge0) {{
        return x < edge0 ? 0.0 : 1.0;
    }}
    float t = clamp((x - edge0) / (edge1 - edge0), 0.0, 1.0);
    return t * t * (3.0 - 2.0 * t);
}}
",
        field_eps = FIELD_EPSILON,
        surface_eps = SURFACE_EPSILON,
        knee = TONE_MAP_KNEE,
    )
}

/// Must match `FieldUniforms` in `gpu/uniforms.rs`.
fn field_block() -> String {
    format!(
        r"layout(std140, set = 0, binding = 0) uniform FieldParams {{
    vec4 frame;
    vec4 surface;
    vec4 shade;
    vec4 lighting;
    vec4 background;
    ivec4 counts;
    vec4 blobs[{MAX_BLOBS}];
}} params;
"
    )
}

/// Must match `PostUniforms` in `gpu/uniforms.rs`.
const POST_BLOCK: &str = r"layout(std140, set = 0, binding = 0) uniform PostParams {
    vec4 target;
    vec4 blur;
    vec4 bloom;
} post;
";

const FIELD_BODY: &str = r"float field_value(vec2 p) {
    float total = 0.0;
    for (int i = 0; i < MAX_BLOBS; i++) {
        if (i >= params.counts.x) {
            break;
        }
        vec4 blob = params.blobs[i];
        vec2 d = vec2((p.x - blob.x) * params.frame.z, p.y - blob.y);
        total += blob.z * blob.z / (dot(d, d) + FIELD_EPSILON);
    }
    return total;
}

vec3 hsl_to_rgb(float hue, float saturation, float lightness) {
    float h = fract(hue / 360.0) * 6.0;
    vec3 k = abs(mod(vec3(h) + vec3(0.0, 4.0, 2.0), vec3(6.0)) - vec3(3.0)) - vec3(1.0);
    k = clamp(k, vec3(0.0), vec3(1.0));
    float chroma = saturation * (1.0 - abs(2.0 * lightness - 1.0));
    return vec3(lightness) + chroma * (k - vec3(0.5));
}

void main() {
    vec2 uv = gl_FragCoord.xy / params.frame.xy;
    float f = field_value(uv);

    float threshold = params.surface.x;
    float softness = params.surface.y;
    float surface = ramp(threshold - softness, threshold + softness, f);
    if (surface < SURFACE_EPSILON) {
        out_color = vec4(params.background.rgb, 1.0);
        return;
    }

    float depth = ramp(threshold, threshold + params.surface.z, f);
    float rim = ramp(threshold - softness, threshold, f)
        * (1.0 - ramp(threshold, threshold + params.lighting.z, f));

    float light_min = params.lighting.x;
    float light_max = params.lighting.y;
    float boost = params.lighting.w;
    float saturation = mix(params.shade.y, params.shade.z, depth);
    float lightness = clamp(mix(light_max - boost, light_min, depth) + rim * boost, light_min, light_max);

    vec3 rgb = hsl_to_rgb(params.shade.x, saturation, lightness);
    float alpha = surface * params.surface.w;
    out_color = vec4(mix(params.background.rgb, rgb, alpha), 1.0);
}
";

const BRIGHT_BODY: &str = r"layout(set = 1, binding = 0) uniform texture2D source_texture;
layout(set = 1, binding = 1) uniform sampler source_sampler;

void main() {
    vec2 uv = gl_FragCoord.xy / post.target.xy;
    vec3 color = texture(sampler2D(source_texture, source_sampler), uv).rgb;
    float lum = dot(color, LUMA);
    float threshold = post.bloom.x;
    float weight = lum > threshold ? (lum - threshold) / (1.0 - threshold) : 0.0;
    out_color = vec4(color * weight, 1.0);
}
";

const BLUR_BODY: &str = r"layout(set = 1, binding = 0) uniform texture2D source_texture;
layout(set = 1, binding = 1) uniform sampler source_sampler;

vec3 tap(vec2 uv) {
    return texture(sampler2D(source_texture, source_sampler), uv).rgb;
}

void main() {
    vec2 uv = gl_FragCoord.xy / post.target.xy;
    vec2 offset = post.target.zw * post.blur.xy;

    vec3 sum = tap(uv) * BLUR_W0;
    sum += (tap(uv + offset) + tap(uv - offset)) * BLUR_W1;
    sum += (tap(uv + 2.0 * offset) + tap(uv - 2.0 * offset)) * BLUR_W2;
    sum += (tap(uv + 3.0 * offset) + tap(uv - 3.0 * offset)) * BLUR_W3;
    sum += (tap(uv + 4.0 * offset) + tap(uv - 4.0 * offset)) * BLUR_W4;
    out_color = vec4(sum, 1.0);
}
";

const COMPOSITE_BODY: &str = r"layout(set = 1, binding = 0) uniform texture2D base_texture;
layout(set = 1, binding = 1) uniform sampler source_sampler;
layout(set = 1, binding = 2) uniform texture2D bloom_texture;

void main() {
    vec2 uv = gl_FragCoord.xy / post.target.xy;
    vec3 base = texture(sampler2D(base_texture, source_sampler), uv).rgb;
    vec3 bloom = texture(sampler2D(bloom_texture, source_sampler), uv).rgb;
    vec3 color = base + bloom * post.bloom.y;
    color = color / (color + vec3(TONE_MAP_KNEE));
    out_color = vec4(color, 1.0);
}
";

/// Minimal full-screen triangle vertex shader.
const VERTEX_SHADER_GLSL: &str = r"#version 450

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    gl_Position = vec4(positions[vertex_index], 0.0, 1.0);
}
";
