use std::fmt;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Upper bound on simultaneously simulated blobs; matches the GPU uniform array.
pub const MAX_BLOBS: usize = 32;

/// Accepted range for a frame-rate cap; `0` separately means uncapped.
pub const MIN_FPS: f32 = 0.1;
pub const MAX_FPS: f32 = 1000.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Every tunable of the lava lamp. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LavaConfig {
    pub version: u32,
    /// Seed for blob placement and wrap re-seeding; random when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub population: Population,
    pub motion: Motion,
    pub collision: Collision,
    pub surface: Surface,
    pub bloom: Bloom,
    pub display: Display,
}

impl Default for LavaConfig {
    fn default() -> Self {
        Self {
            version: 1,
            seed: None,
            population: Population::default(),
            motion: Motion::default(),
            collision: Collision::default(),
            surface: Surface::default(),
            bloom: Bloom::default(),
            display: Display::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Population {
    pub classes: Vec<SizeClass>,
}

impl Default for Population {
    fn default() -> Self {
        Self {
            classes: vec![
                SizeClass::new("large", 3, 0.12, 0.16),
                SizeClass::new("medium", 4, 0.08, 0.11),
                SizeClass::new("small", 5, 0.045, 0.07),
            ],
        }
    }
}

/// A group of blobs sharing a radius range. Radii are fractions of viewport height.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SizeClass {
    pub name: String,
    pub count: u32,
    pub min_radius: f32,
    pub max_radius: f32,
}

impl SizeClass {
    pub fn new(name: impl Into<String>, count: u32, min_radius: f32, max_radius: f32) -> Self {
        Self {
            name: name.into(),
            count,
            min_radius,
            max_radius,
        }
    }
}

/// Free motion coefficients, expressed per 60 Hz tick in unit-square space.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Motion {
    /// Base speed; velocities are clamped to three times this value.
    pub speed: f32,
    pub buoyancy: f32,
    pub wander: f32,
    /// Angular frequency (radians per second) of the wander sine waves.
    pub wander_frequency: f32,
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            speed: 0.0008,
            buoyancy: 0.00002,
            wander: 0.00003,
            wander_frequency: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Collision {
    /// Multiplier on the summed radii at which two blobs start pushing apart.
    pub range: f32,
    pub strength: f32,
    pub stickiness: f32,
    /// Per-tick velocity retention applied on top of the fixed 0.995 viscosity.
    pub damping: f32,
}

impl Default for Collision {
    fn default() -> Self {
        Self {
            range: 0.85,
            strength: 0.0005,
            stickiness: 0.00006,
            damping: 0.98,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Surface {
    pub threshold: f32,
    /// Half-width of the smooth ramp around `threshold`.
    pub softness: f32,
    /// Width of the interior ramp used for volumetric shading.
    pub depth_range: f32,
    /// Base hue in degrees.
    pub hue: f32,
    /// Slow hue oscillation amplitude in degrees, driven by wall-clock time.
    pub hue_drift: f32,
    /// `[min, max]` saturation; rises with depth.
    pub saturation: [f32; 2],
    /// `[min, max]` lightness; highest at the rim.
    pub lightness: [f32; 2],
    pub rim_width: f32,
    pub rim_boost: f32,
    pub opacity: f32,
    /// Linear RGB shown wherever the field is empty.
    pub background: [f32; 3],
}

impl Default for Surface {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            softness: 0.18,
            depth_range: 2.5,
            hue: 14.0,
            hue_drift: 6.0,
            saturation: [0.75, 0.95],
            lightness: [0.22, 0.62],
            rim_width: 0.35,
            rim_boost: 0.14,
            opacity: 0.92,
            background: [0.035, 0.02, 0.05],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Bloom {
    /// Luminance in `[0, 1)` above which pixels feed the glow.
    pub threshold: f32,
    pub intensity: f32,
    /// Blur tap spacing in half-resolution texels before viewport scaling.
    pub radius: f32,
}

impl Default for Bloom {
    fn default() -> Self {
        Self {
            threshold: 0.35,
            intensity: 0.8,
            radius: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Display {
    pub max_device_pixel_ratio: f32,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub resize_debounce: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f32>,
    pub reduced_motion: bool,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            max_device_pixel_ratio: 2.0,
            resize_debounce: default_resize_debounce(),
            fps: None,
            reduced_motion: false,
        }
    }
}

fn default_resize_debounce() -> Duration {
    Duration::from_millis(200)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

impl LavaConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: LavaConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Total number of blobs the population seeds.
    pub fn total_population(&self) -> usize {
        self.population
            .classes
            .iter()
            .map(|class| class.count as usize)
            .sum()
    }

    /// Largest radius any class can produce; blob mass is measured against it.
    pub fn max_radius(&self) -> f32 {
        self.population
            .classes
            .iter()
            .map(|class| class.max_radius)
            .fold(0.0, f32::max)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.population.classes.is_empty() {
            return Err(ConfigError::Invalid(
                "population must define at least one size class".into(),
            ));
        }

        for class in &self.population.classes {
            let name = &class.name;
            if class.count == 0 {
                return Err(ConfigError::Invalid(format!(
                    "size class '{name}' count must be greater than zero"
                )));
            }
            if !(class.min_radius > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "size class '{name}' min_radius must be positive"
                )));
            }
            if class.max_radius < class.min_radius {
                return Err(ConfigError::Invalid(format!(
                    "size class '{name}' max_radius must be >= min_radius"
                )));
            }
        }

        let total = self.total_population();
        if total > MAX_BLOBS {
            return Err(ConfigError::Invalid(format!(
                "population of {total} blobs exceeds capacity of {MAX_BLOBS}"
            )));
        }

        let motion = &self.motion;
        for (label, value) in [
            ("motion.speed", motion.speed),
            ("motion.buoyancy", motion.buoyancy),
            ("motion.wander", motion.wander),
            ("motion.wander_frequency", motion.wander_frequency),
            ("collision.range", self.collision.range),
            ("collision.strength", self.collision.strength),
            ("collision.stickiness", self.collision.stickiness),
            ("bloom.intensity", self.bloom.intensity),
            ("bloom.radius", self.bloom.radius),
            ("surface.rim_width", self.surface.rim_width),
            ("surface.rim_boost", self.surface.rim_boost),
            ("surface.depth_range", self.surface.depth_range),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::Invalid(format!("{label} must be >= 0")));
            }
        }

        if !(self.collision.damping > 0.0 && self.collision.damping <= 1.0) {
            return Err(ConfigError::Invalid(
                "collision.damping must be in (0, 1]".into(),
            ));
        }

        let surface = &self.surface;
        if !(surface.threshold > 0.0) {
            return Err(ConfigError::Invalid(
                "surface.threshold must be positive".into(),
            ));
        }
        if !(surface.softness > 0.0) {
            return Err(ConfigError::Invalid(
                "surface.softness must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&surface.opacity) {
            return Err(ConfigError::Invalid(
                "surface.opacity must be in [0, 1]".into(),
            ));
        }
        for (label, [low, high]) in [
            ("surface.saturation", surface.saturation),
            ("surface.lightness", surface.lightness),
        ] {
            if !(0.0..=1.0).contains(&low) || !(0.0..=1.0).contains(&high) || low > high {
                return Err(ConfigError::Invalid(format!(
                    "{label} must be an ordered [min, max] pair within [0, 1]"
                )));
            }
        }

        if !(0.0..1.0).contains(&self.bloom.threshold) {
            return Err(ConfigError::Invalid(
                "bloom.threshold must be in [0, 1)".into(),
            ));
        }

        if !(self.display.max_device_pixel_ratio > 0.0) {
            return Err(ConfigError::Invalid(
                "display.max_device_pixel_ratio must be positive".into(),
            ));
        }
        if let Some(fps) = self.display.fps {
            if fps != 0.0 && !(MIN_FPS..=MAX_FPS).contains(&fps) {
                return Err(ConfigError::Invalid(format!(
                    "display.fps must be 0 (uncapped) or within [{MIN_FPS}, {MAX_FPS}]"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1
seed = 42

[[population.classes]]
name = "large"
count = 2
min_radius = 0.1
max_radius = 0.2

[[population.classes]]
name = "small"
count = 6
min_radius = 0.04
max_radius = 0.06

[surface]
threshold = 0.6
hue = 200

[display]
resize_debounce = "350ms"
fps = 30
"#;

    #[test]
    fn parses_sample_config() {
        let config = LavaConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.total_population(), 8);
        assert!((config.max_radius() - 0.2).abs() < 1e-6);
        assert!((config.surface.threshold - 0.6).abs() < 1e-6);
        assert!((config.surface.softness - 0.18).abs() < 1e-6);
        assert_eq!(config.display.resize_debounce, Duration::from_millis(350));
        assert_eq!(config.display.fps, Some(30.0));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = LavaConfig::from_toml_str("").expect("defaults");
        assert_eq!(config, LavaConfig::default());
        assert_eq!(config.total_population(), 12);
        assert_eq!(config.population.classes.len(), 3);
        assert_eq!(config.display.resize_debounce, Duration::from_millis(200));
    }

    #[test]
    fn defaults_survive_a_toml_round_trip() {
        let rendered = LavaConfig::default().to_toml_string().expect("serialize");
        assert!(rendered.contains("resize_debounce = \"200ms\""));
        let parsed = LavaConfig::from_toml_str(&rendered).expect("reparse");
        assert_eq!(parsed, LavaConfig::default());
    }

    #[test]
    fn numeric_debounce_is_seconds() {
        let config = LavaConfig::from_toml_str("[display]\nresize_debounce = 1\n").unwrap();
        assert_eq!(config.display.resize_debounce, Duration::from_secs(1));
    }

    #[test]
    fn rejects_population_above_capacity() {
        let config = r#"
[[population.classes]]
name = "swarm"
count = 40
min_radius = 0.01
max_radius = 0.02
"#;
        let err = LavaConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn rejects_inverted_radius_range() {
        let config = r#"
[[population.classes]]
name = "odd"
count = 1
min_radius = 0.2
max_radius = 0.1
"#;
        let err = LavaConfig::from_toml_str(config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_bloom_threshold_of_one() {
        let err = LavaConfig::from_toml_str("[bloom]\nthreshold = 1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_fps_outside_the_cap_range() {
        for fps in ["1e-20", "-1", "5000"] {
            let err = LavaConfig::from_toml_str(&format!("[display]\nfps = {fps}\n")).unwrap_err();
            assert!(err.to_string().contains("display.fps"), "fps {fps}");
        }
        let uncapped = LavaConfig::from_toml_str("[display]\nfps = 0\n").expect("uncapped");
        assert_eq!(uncapped.display.fps, Some(0.0));
    }

    #[test]
    fn rejects_unknown_version() {
        let err = LavaConfig::from_toml_str("version = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_zero_softness() {
        let err = LavaConfig::from_toml_str("[surface]\nsoftness = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_negative_debounce() {
        let err = LavaConfig::from_toml_str("[display]\nresize_debounce = -1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
