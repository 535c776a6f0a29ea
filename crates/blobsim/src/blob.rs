use std::f32::consts::TAU;

use lavaconfig::{LavaConfig, MAX_BLOBS};
use rand::Rng;

use crate::SimError;

/// A disk-shaped field source in unit-square coordinates.
///
/// Radius (and therefore mass) is fixed at construction; everything else is
/// mutated in place by the simulator each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Collision force accumulated during the current tick.
    pub ax: f32,
    pub ay: f32,
    pub phase_x: f32,
    pub phase_y: f32,
    pub wander_speed: f32,
    radius: f32,
    mass: f32,
}

impl Blob {
    /// Creates a resting blob; `max_radius` is the population-wide radius ceiling.
    pub fn new(x: f32, y: f32, radius: f32, max_radius: f32) -> Self {
        let mass = if max_radius > 0.0 {
            (radius / max_radius).clamp(f32::MIN_POSITIVE, 1.0)
        } else {
            1.0
        };
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            ax: 0.0,
            ay: 0.0,
            phase_x: 0.0,
            phase_y: 0.0,
            wander_speed: 1.0,
            radius,
            mass,
        }
    }

    pub fn with_velocity(mut self, vx: f32, vy: f32) -> Self {
        self.vx = vx;
        self.vy = vy;
        self
    }

    pub fn with_wander(mut self, phase_x: f32, phase_y: f32, wander_speed: f32) -> Self {
        self.phase_x = phase_x;
        self.phase_y = phase_y;
        self.wander_speed = wander_speed;
        self
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// Blob snapshot laid out for the GPU: `(x, y, radius, mass)` per slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedBlobs {
    pub slots: [[f32; 4]; MAX_BLOBS],
    pub count: usize,
}

/// Fixed-capacity blob collection.
///
/// `len() <= capacity()` always holds; pushes beyond capacity are rejected
/// instead of silently truncated.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobSet {
    blobs: Vec<Blob>,
    capacity: usize,
}

impl BlobSet {
    /// Capacity is clamped to [`MAX_BLOBS`], the size of the GPU upload buffer.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(MAX_BLOBS);
        Self {
            blobs: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Seeds the configured population, class by class.
    pub fn populate<R: Rng>(config: &LavaConfig, rng: &mut R) -> Result<Self, SimError> {
        let requested = config.total_population();
        if requested > MAX_BLOBS {
            return Err(SimError::PopulationTooLarge {
                requested,
                capacity: MAX_BLOBS,
            });
        }

        let max_radius = config.max_radius();
        let speed = config.motion.speed;
        let mut set = Self::with_capacity(MAX_BLOBS);
        for class in &config.population.classes {
            for _ in 0..class.count {
                let radius = if class.max_radius > class.min_radius {
                    rng.gen_range(class.min_radius..=class.max_radius)
                } else {
                    class.min_radius
                };
                let heading = rng.gen_range(0.0..TAU);
                let initial_speed = speed * rng.gen_range(0.3..1.0);
                let blob = Blob::new(rng.gen(), rng.gen(), radius, max_radius)
                    .with_velocity(heading.cos() * initial_speed, heading.sin() * initial_speed)
                    .with_wander(
                        rng.gen_range(0.0..TAU),
                        rng.gen_range(0.0..TAU),
                        rng.gen_range(0.6..1.4),
                    );
                set.push(blob)?;
            }
        }
        Ok(set)
    }

    pub fn push(&mut self, blob: Blob) -> Result<(), SimError> {
        if self.blobs.len() >= self.capacity {
            return Err(SimError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.blobs.push(blob);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn as_slice(&self) -> &[Blob] {
        &self.blobs
    }

    pub fn iter(&self) -> impl Iterator<Item = &Blob> {
        self.blobs.iter()
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [Blob] {
        &mut self.blobs
    }

    pub fn pack(&self) -> PackedBlobs {
        let mut slots = [[0.0; 4]; MAX_BLOBS];
        for (slot, blob) in slots.iter_mut().zip(&self.blobs) {
            *slot = [blob.x, blob.y, blob.radius, blob.mass];
        }
        PackedBlobs {
            slots,
            count: self.blobs.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn mass_scales_with_radius() {
        let big = Blob::new(0.5, 0.5, 0.16, 0.16);
        let small = Blob::new(0.5, 0.5, 0.04, 0.16);
        assert!((big.mass() - 1.0).abs() < 1e-6);
        assert!((small.mass() - 0.25).abs() < 1e-6);
        assert!(small.mass() > 0.0);
    }

    #[test]
    fn push_rejects_beyond_capacity() {
        let mut set = BlobSet::with_capacity(2);
        set.push(Blob::new(0.1, 0.1, 0.1, 0.1)).unwrap();
        set.push(Blob::new(0.2, 0.2, 0.1, 0.1)).unwrap();
        let err = set.push(Blob::new(0.3, 0.3, 0.1, 0.1)).unwrap_err();
        assert_eq!(err, SimError::CapacityExceeded { capacity: 2 });
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn capacity_never_exceeds_upload_buffer() {
        let set = BlobSet::with_capacity(MAX_BLOBS * 4);
        assert_eq!(set.capacity(), MAX_BLOBS);
    }

    #[test]
    fn default_population_respects_class_ranges() {
        let config = LavaConfig::default();
        let mut rng = StdRng::seed_from_u64(9);
        let set = BlobSet::populate(&config, &mut rng).unwrap();
        assert_eq!(set.len(), 12);

        let mut offset = 0;
        for class in &config.population.classes {
            for blob in &set.as_slice()[offset..offset + class.count as usize] {
                assert!(blob.radius() >= class.min_radius && blob.radius() <= class.max_radius);
                assert!(blob.mass() > 0.0 && blob.mass() <= 1.0);
                assert!((0.0..=1.0).contains(&blob.x));
                assert!((0.0..=1.0).contains(&blob.y));
                assert!(blob.speed() <= config.motion.speed + 1e-9);
            }
            offset += class.count as usize;
        }
    }

    #[test]
    fn population_is_reproducible_from_seed() {
        let config = LavaConfig::default();
        let first = BlobSet::populate(&config, &mut StdRng::seed_from_u64(5)).unwrap();
        let second = BlobSet::populate(&config, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn pack_writes_count_and_slots() {
        let mut set = BlobSet::with_capacity(4);
        set.push(Blob::new(0.25, 0.75, 0.1, 0.2)).unwrap();
        let packed = set.pack();
        assert_eq!(packed.count, 1);
        assert_eq!(packed.slots[0], [0.25, 0.75, 0.1, 0.5]);
        assert_eq!(packed.slots[1], [0.0; 4]);
    }
}
