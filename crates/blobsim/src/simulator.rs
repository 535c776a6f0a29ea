use std::time::Duration;

use lavaconfig::{Collision, LavaConfig, Motion};
use rand::prelude::*;
use tracing::trace;

use crate::{Blob, BlobSet};

/// One simulation step in ticks; velocities are expressed per tick.
pub const FIXED_DT: f32 = 1.0;
/// Wall-clock length of a tick (60 Hz).
pub const TICK: Duration = Duration::from_micros(16_667);
/// Floor applied to pair distances so coincident blobs stay finite.
pub const DISTANCE_EPSILON: f32 = 1e-5;

const VISCOSITY: f32 = 0.995;
const MAX_SPEED_FACTOR: f32 = 3.0;
const PUSH_MASS_FACTOR: f32 = 0.4;
const BUOYANCY_MASS_FACTOR: f32 = 0.6;

/// Forces produced by one overlapping pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairForce {
    pub on_a: [f32; 2],
    pub on_b: [f32; 2],
    /// Unit vector from `a` towards `b` before the step.
    pub normal: [f32; 2],
    pub overlap: f32,
}

/// Repulsion plus stickiness between two blobs, or `None` when they are at
/// least `min_dist` apart.
pub fn pair_force(a: &Blob, b: &Blob, collision: &Collision) -> Option<PairForce> {
    let min_dist = (a.radius() + b.radius()) * collision.range;
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let raw = (dx * dx + dy * dy).sqrt();
    if raw >= min_dist {
        return None;
    }

    let dist = raw.max(DISTANCE_EPSILON);
    let overlap = (min_dist - raw) / min_dist;
    let normal = [dx / dist, dy / dist];

    let push = overlap * overlap * collision.strength;
    let push_a = push * (1.0 - a.mass() * PUSH_MASS_FACTOR);
    let push_b = push * (1.0 - b.mass() * PUSH_MASS_FACTOR);
    let pull = overlap * collision.stickiness;

    let along = |magnitude: f32| [normal[0] * magnitude, normal[1] * magnitude];
    Some(PairForce {
        on_a: along(pull - push_a),
        on_b: along(push_b - pull),
        normal,
        overlap,
    })
}

/// Advances a [`BlobSet`] in fixed ticks.
///
/// The RNG is only consulted when a blob wraps vertically and needs a fresh
/// horizontal position.
pub struct Simulator {
    motion: Motion,
    collision: Collision,
    rng: StdRng,
}

impl Simulator {
    pub fn new(config: &LavaConfig, seed: u64) -> Self {
        Self {
            motion: config.motion.clone(),
            collision: config.collision.clone(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn max_speed(&self) -> f32 {
        self.motion.speed * MAX_SPEED_FACTOR
    }

    /// Upward (negative y) acceleration applied to `blob` every tick.
    pub fn buoyancy_acceleration(&self, blob: &Blob) -> f32 {
        self.motion.buoyancy * (1.0 - blob.mass() * BUOYANCY_MASS_FACTOR)
    }

    /// Advances every blob by `dt` ticks. `elapsed` is simulated seconds and
    /// only drives the wander sine waves.
    pub fn step(&mut self, blobs: &mut BlobSet, dt: f32, elapsed: f32) {
        let blobs = blobs.as_mut_slice();
        if blobs.is_empty() {
            return;
        }

        self.accumulate_collisions(blobs);

        let max_speed = self.max_speed();
        let damping = VISCOSITY * self.collision.damping;
        for (index, blob) in blobs.iter_mut().enumerate() {
            blob.vy -= self.buoyancy_acceleration(blob);

            let phase = elapsed * self.motion.wander_frequency * blob.wander_speed;
            blob.vx += (phase + blob.phase_x).sin() * self.motion.wander;
            blob.vy += (phase * 0.7 + blob.phase_y).cos() * self.motion.wander * 0.5;

            blob.vx += blob.ax;
            blob.vy += blob.ay;
            blob.ax = 0.0;
            blob.ay = 0.0;

            blob.vx *= damping;
            blob.vy *= damping;

            let speed = blob.speed();
            if speed > max_speed {
                let scale = max_speed / speed;
                blob.vx *= scale;
                blob.vy *= scale;
            }

            blob.x += blob.vx * dt;
            blob.y += blob.vy * dt;

            self.wrap(index, blob);
        }
    }

    fn accumulate_collisions(&self, blobs: &mut [Blob]) {
        for i in 0..blobs.len() {
            let (head, tail) = blobs.split_at_mut(i + 1);
            let a = &mut head[i];
            for b in tail.iter_mut() {
                if let Some(force) = pair_force(a, b, &self.collision) {
                    a.ax += force.on_a[0];
                    a.ay += force.on_a[1];
                    b.ax += force.on_b[0];
                    b.ay += force.on_b[1];
                }
            }
        }
    }

    // Vertical exits re-enter on the opposite edge at a fresh x; horizontal
    // exits only shift x.
    fn wrap(&mut self, index: usize, blob: &mut Blob) {
        let pad = blob.radius() * 2.0;
        if blob.y > 1.0 + pad {
            blob.y = -pad;
            blob.x = self.rng.gen();
            trace!(blob = index, x = blob.x, "blob wrapped to top");
        } else if blob.y < -pad {
            blob.y = 1.0 + pad;
            blob.x = self.rng.gen();
            trace!(blob = index, x = blob.x, "blob wrapped to bottom");
        }

        let span = 1.0 + pad * 2.0;
        if blob.x < -pad {
            blob.x += span;
        } else if blob.x > 1.0 + pad {
            blob.x -= span;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LavaConfig {
        LavaConfig::default()
    }

    fn still_config() -> LavaConfig {
        let mut config = LavaConfig::default();
        config.motion.wander = 0.0;
        config.motion.buoyancy = 0.0;
        config
    }

    fn set_of(blobs: impl IntoIterator<Item = Blob>) -> BlobSet {
        let mut set = BlobSet::with_capacity(crate::MAX_BLOBS);
        for blob in blobs {
            set.push(blob).unwrap();
        }
        set
    }

    fn cross(a: [f32; 2], b: [f32; 2]) -> f32 {
        a[0] * b[1] - a[1] * b[0]
    }

    fn dot(a: [f32; 2], b: [f32; 2]) -> f32 {
        a[0] * b[0] + a[1] * b[1]
    }

    #[test]
    fn overlapping_pair_pushes_along_normal() {
        let collision = config().collision;
        let a = Blob::new(0.40, 0.50, 0.12, 0.16);
        let b = Blob::new(0.45, 0.52, 0.08, 0.16);
        let force = pair_force(&a, &b, &collision).expect("overlap");

        assert!(cross(force.on_a, force.normal).abs() < 1e-9);
        assert!(cross(force.on_b, force.normal).abs() < 1e-9);
        assert!(dot(force.on_a, force.normal) < 0.0);
        assert!(dot(force.on_b, force.normal) > 0.0);
    }

    #[test]
    fn pair_force_is_symmetric_under_swap() {
        let collision = config().collision;
        let a = Blob::new(0.40, 0.50, 0.12, 0.16);
        let b = Blob::new(0.47, 0.46, 0.10, 0.16);
        let forward = pair_force(&a, &b, &collision).unwrap();
        let swapped = pair_force(&b, &a, &collision).unwrap();

        for axis in 0..2 {
            assert!((forward.on_a[axis] - swapped.on_b[axis]).abs() < 1e-9);
            assert!((forward.on_b[axis] - swapped.on_a[axis]).abs() < 1e-9);
            assert!((forward.normal[axis] + swapped.normal[axis]).abs() < 1e-6);
        }
    }

    #[test]
    fn equal_masses_receive_opposite_forces() {
        let collision = config().collision;
        let a = Blob::new(0.40, 0.50, 0.10, 0.16);
        let b = Blob::new(0.45, 0.50, 0.10, 0.16);
        let force = pair_force(&a, &b, &collision).unwrap();
        assert!((force.on_a[0] + force.on_b[0]).abs() < 1e-9);
        assert!((force.on_a[1] + force.on_b[1]).abs() < 1e-9);
    }

    #[test]
    fn touching_at_min_dist_applies_no_force() {
        let mut config = still_config();
        config.collision.range = 1.0;
        // Radii and positions are exact in binary, so dist == min_dist holds exactly.
        let a = Blob::new(0.25, 0.5, 0.125, 0.16);
        let b = Blob::new(0.5, 0.5, 0.125, 0.16);
        assert_eq!((a.radius() + b.radius()) * config.collision.range, b.x - a.x);
        assert!(pair_force(&a, &b, &config.collision).is_none());

        let mut sim = Simulator::new(&config, 1);
        let mut set = set_of([a, b]);
        sim.step(&mut set, FIXED_DT, 0.0);
        for blob in set.iter() {
            assert_eq!(blob.vx, 0.0);
            assert_eq!(blob.vy, 0.0);
        }
    }

    #[test]
    fn coincident_blobs_stay_finite() {
        let mut sim = Simulator::new(&config(), 3);
        let blob = Blob::new(0.5, 0.5, 0.1, 0.16);
        let mut set = set_of([blob, blob]);
        for tick in 0..10 {
            sim.step(&mut set, FIXED_DT, tick as f32 * TICK.as_secs_f32());
        }
        for blob in set.iter() {
            assert!(blob.x.is_finite() && blob.y.is_finite());
            assert!(blob.vx.is_finite() && blob.vy.is_finite());
        }
    }

    #[test]
    fn speed_is_clamped_from_any_start() {
        let config = config();
        let mut sim = Simulator::new(&config, 7);
        let mut set = set_of([
            Blob::new(0.2, 0.5, 0.1, 0.16).with_velocity(50.0, -80.0),
            Blob::new(0.7, 0.5, 0.05, 0.16).with_velocity(0.001, 0.0),
            Blob::new(0.5, 0.9, 0.14, 0.16).with_velocity(-1e6, 1e6),
        ]);
        sim.step(&mut set, FIXED_DT, 0.0);
        let cap = config.motion.speed * 3.0;
        for blob in set.iter() {
            assert!(blob.speed() <= cap * (1.0 + 1e-5), "speed {}", blob.speed());
        }
    }

    #[test]
    fn blob_below_bottom_wraps_to_top() {
        let mut sim = Simulator::new(&still_config(), 11);
        let mut set = set_of([Blob::new(0.9, 1.3, 0.1, 0.16)]);
        sim.step(&mut set, FIXED_DT, 0.0);
        let blob = set.as_slice()[0];
        assert!(blob.y <= 0.0);
        assert!((0.0..=1.0).contains(&blob.x));
    }

    #[test]
    fn blob_above_top_wraps_to_bottom() {
        let mut sim = Simulator::new(&still_config(), 12);
        let mut set = set_of([Blob::new(0.1, -0.25, 0.1, 0.16)]);
        sim.step(&mut set, FIXED_DT, 0.0);
        let blob = set.as_slice()[0];
        assert!(blob.y >= 1.0);
        assert!((0.0..=1.0).contains(&blob.x));
    }

    #[test]
    fn horizontal_wrap_keeps_height_and_velocity() {
        let mut sim = Simulator::new(&still_config(), 13);
        let start = Blob::new(-0.25, 0.4, 0.1, 0.16).with_velocity(-0.001, 0.0);
        let mut set = set_of([start]);
        sim.step(&mut set, FIXED_DT, 0.0);
        let blob = set.as_slice()[0];
        assert!(blob.x > 1.0);
        assert_eq!(blob.y, 0.4);
        assert!(blob.vx < 0.0);
    }

    #[test]
    fn lighter_blobs_rise_faster() {
        let config = config();
        let sim = Simulator::new(&config, 0);
        let heavy = Blob::new(0.5, 0.5, 0.16, 0.16);
        let light = Blob::new(0.5, 0.5, 0.05, 0.16);
        assert!(sim.buoyancy_acceleration(&light) > sim.buoyancy_acceleration(&heavy));

        let mut no_wander = config.clone();
        no_wander.motion.wander = 0.0;
        let mut sim = Simulator::new(&no_wander, 0);
        let mut heavy_set = set_of([heavy]);
        let mut light_set = set_of([light]);
        sim.step(&mut heavy_set, FIXED_DT, 0.0);
        sim.step(&mut light_set, FIXED_DT, 0.0);
        assert!(light_set.as_slice()[0].vy < heavy_set.as_slice()[0].vy);
        assert!(light_set.as_slice()[0].vy < 0.0);
    }

    #[test]
    fn empty_set_is_a_no_op() {
        let mut sim = Simulator::new(&config(), 0);
        let mut set = BlobSet::with_capacity(4);
        sim.step(&mut set, FIXED_DT, 1.0);
        assert!(set.is_empty());
    }

    #[test]
    fn stepping_is_deterministic_for_a_seed() {
        let config = config();
        let run = || {
            let mut rng = StdRng::seed_from_u64(21);
            let mut set = BlobSet::populate(&config, &mut rng).unwrap();
            let mut sim = Simulator::new(&config, 21);
            for tick in 0..600 {
                sim.step(&mut set, FIXED_DT, tick as f32 * TICK.as_secs_f32());
            }
            set
        };
        assert_eq!(run(), run());
    }
}
