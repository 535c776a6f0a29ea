//! Off-screen render targets sized from the viewport.
//!
//! [`TargetLayout`] is the pure sizing rule; [`ResourceManager`] owns the base
//! and bloom targets and only goes back to its [`TargetAllocator`] when the
//! layout actually changes. Dropping the previous [`RenderTargets`] releases
//! the old textures.

use tracing::debug;

use crate::types::Viewport;

/// Format of every intermediate target.
pub const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetLayout {
    pub full: (u32, u32),
    pub half: (u32, u32),
    /// Device pixel ratio after applying the configured cap.
    pub device_pixel_ratio: f32,
}

impl TargetLayout {
    /// Physical size is converted back to CSS-style units and re-scaled by the
    /// capped pixel ratio; every dimension is at least one pixel.
    pub fn for_viewport(viewport: Viewport, max_device_pixel_ratio: f32) -> Self {
        let dpr = if viewport.device_pixel_ratio > 0.0 {
            viewport.device_pixel_ratio
        } else {
            1.0
        };
        let effective = dpr.min(max_device_pixel_ratio.max(f32::MIN_POSITIVE));

        let scale = |physical: u32| -> u32 {
            if effective >= dpr {
                return physical.max(1);
            }
            let css = physical as f64 / dpr as f64;
            ((css * effective as f64).floor() as u32).max(1)
        };
        let full = (scale(viewport.width), scale(viewport.height));
        let half = (
            ((full.0 as f32 * 0.5).floor() as u32).max(1),
            ((full.1 as f32 * 0.5).floor() as u32).max(1),
        );

        Self {
            full,
            half,
            device_pixel_ratio: effective,
        }
    }
}

/// Creates one render target of a given size.
pub trait TargetAllocator {
    type Target;

    fn allocate(&mut self, label: &'static str, size: (u32, u32)) -> Self::Target;
}

/// The full-resolution base target and the two half-resolution bloom targets.
#[derive(Debug)]
pub struct RenderTargets<T> {
    pub base: T,
    pub bloom_a: T,
    pub bloom_b: T,
}

pub struct ResourceManager<A: TargetAllocator> {
    allocator: A,
    max_device_pixel_ratio: f32,
    layout: Option<TargetLayout>,
    targets: Option<RenderTargets<A::Target>>,
}

impl<A: TargetAllocator> ResourceManager<A> {
    pub fn new(allocator: A, max_device_pixel_ratio: f32) -> Self {
        Self {
            allocator,
            max_device_pixel_ratio,
            layout: None,
            targets: None,
        }
    }

    /// Brings the targets in line with `viewport`. Returns `true` when they
    /// were (re)allocated and any bind groups referencing them are stale.
    pub fn ensure(&mut self, viewport: Viewport) -> bool {
        let layout = TargetLayout::for_viewport(viewport, self.max_device_pixel_ratio);
        if self.targets.is_some() && self.layout == Some(layout) {
            return false;
        }

        // Release the previous set before allocating its replacement.
        self.targets = None;
        let targets = RenderTargets {
            base: self.allocator.allocate("base target", layout.full),
            bloom_a: self.allocator.allocate("bloom target A", layout.half),
            bloom_b: self.allocator.allocate("bloom target B", layout.half),
        };
        debug!(
            full_width = layout.full.0,
            full_height = layout.full.1,
            half_width = layout.half.0,
            half_height = layout.half.1,
            dpr = layout.device_pixel_ratio,
            "allocated render targets"
        );
        self.targets = Some(targets);
        self.layout = Some(layout);
        true
    }

    pub fn layout(&self) -> Option<TargetLayout> {
        self.layout
    }

    pub fn targets(&self) -> Option<&RenderTargets<A::Target>> {
        self.targets.as_ref()
    }
}

pub(crate) struct RenderTarget {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub size: (u32, u32),
}

/// Allocates sampled, renderable `Rgba16Float` textures on a wgpu device.
pub(crate) struct GpuTargetAllocator {
    device: wgpu::Device,
}

impl GpuTargetAllocator {
    pub fn new(device: wgpu::Device) -> Self {
        Self { device }
    }
}

impl TargetAllocator for GpuTargetAllocator {
    type Target = RenderTarget;

    fn allocate(&mut self, label: &'static str, size: (u32, u32)) -> RenderTarget {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        RenderTarget {
            _texture: texture,
            view,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct Counters {
        allocated: Rc<Cell<usize>>,
        live: Rc<Cell<usize>>,
    }

    struct FakeTarget {
        size: (u32, u32),
        live: Rc<Cell<usize>>,
    }

    impl Drop for FakeTarget {
        fn drop(&mut self) {
            self.live.set(self.live.get() - 1);
        }
    }

    struct CountingAllocator {
        counters: Counters,
    }

    impl TargetAllocator for CountingAllocator {
        type Target = FakeTarget;

        fn allocate(&mut self, _label: &'static str, size: (u32, u32)) -> FakeTarget {
            self.counters.allocated.set(self.counters.allocated.get() + 1);
            self.counters.live.set(self.counters.live.get() + 1);
            FakeTarget {
                size,
                live: self.counters.live.clone(),
            }
        }
    }

    fn manager() -> (ResourceManager<CountingAllocator>, Counters) {
        let counters = Counters::default();
        let allocator = CountingAllocator {
            counters: counters.clone(),
        };
        (ResourceManager::new(allocator, 2.0), counters)
    }

    #[test]
    fn layout_halves_full_resolution() {
        let layout = TargetLayout::for_viewport(Viewport::new(1921, 1081, 1.0), 2.0);
        assert_eq!(layout.full, (1921, 1081));
        assert_eq!(layout.half, (960, 540));
    }

    #[test]
    fn layout_caps_device_pixel_ratio() {
        let layout = TargetLayout::for_viewport(Viewport::new(3000, 1500, 3.0), 2.0);
        assert_eq!(layout.full, (2000, 1000));
        assert_eq!(layout.half, (1000, 500));
        assert_eq!(layout.device_pixel_ratio, 2.0);
    }

    #[test]
    fn layout_never_reaches_zero() {
        let layout = TargetLayout::for_viewport(Viewport::new(1, 1, 1.0), 2.0);
        assert_eq!(layout.full, (1, 1));
        assert_eq!(layout.half, (1, 1));
    }

    #[test]
    fn resizing_twice_to_the_same_viewport_is_a_no_op() {
        let (mut manager, counters) = manager();
        let viewport = Viewport::new(1280, 720, 1.0);

        assert!(manager.ensure(viewport));
        let first = manager.layout();
        assert!(!manager.ensure(viewport));
        assert_eq!(manager.layout(), first);

        assert_eq!(counters.allocated.get(), 3);
        assert_eq!(counters.live.get(), 3);
        let targets = manager.targets().expect("targets");
        assert_eq!(targets.base.size, (1280, 720));
        assert_eq!(targets.bloom_a.size, (640, 360));
        assert_eq!(targets.bloom_b.size, (640, 360));
    }

    #[test]
    fn reallocation_releases_previous_targets() {
        let (mut manager, counters) = manager();
        assert!(manager.ensure(Viewport::new(800, 600, 1.0)));
        assert!(manager.ensure(Viewport::new(1024, 768, 1.0)));
        assert!(manager.ensure(Viewport::new(800, 600, 1.0)));

        assert_eq!(counters.allocated.get(), 9);
        assert_eq!(counters.live.get(), 3);
        drop(manager);
        assert_eq!(counters.live.get(), 0);
    }

    #[test]
    fn capped_scale_change_shrinks_targets() {
        let (mut manager, counters) = manager();
        assert!(manager.ensure(Viewport::new(1600, 1200, 1.0)));
        assert!(manager.ensure(Viewport::new(1600, 1200, 4.0)));
        assert_eq!(counters.allocated.get(), 6);
        assert_eq!(manager.layout().map(|layout| layout.full), Some((800, 600)));
    }
}
