// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wavefield::SoftwareBackend;
use wavefield::bindings::software::texture::Texel;
use wavefield::bindings::surface::{SurfaceConfig, SurfaceHandle, Target};
use wavefield::images::backend::RenderBackend;
use wavefield::images::disturb::{Disturbance, DisturbanceBatcher};
use wavefield::pixel_formats::{Float4, SurfaceFormat};

const GRID: u32 = 33;

/// A 33×33 full-float surface, so that the center texel sits exactly on uv 0.5.
fn exact_surface(backend: &mut SoftwareBackend, fill: Float4) -> SurfaceHandle {
    let surface = backend
        .allocate_surface(SurfaceConfig::new(GRID, GRID).with_format(SurfaceFormat::Rgba32Float))
        .unwrap();
    backend.write_texels(surface, |_| fill).unwrap();
    surface
}

fn texel(backend: &SoftwareBackend, surface: SurfaceHandle, x: u32, y: u32) -> Float4 {
    backend.texture(surface).unwrap()[Texel { x, y }]
}

#[test]
fn events_past_capacity_are_dropped() {
    let mut backend = SoftwareBackend::new(16, 16);
    let surface = exact_surface(&mut backend, Float4::ZERO);
    let mut batcher = DisturbanceBatcher::default();
    let event = Disturbance::new([0.5, 0.5], 0.05, Float4::ONE, Float4::splat(0.01));
    let accepted = (0..105).filter(|_| batcher.enqueue(event)).count();
    assert_eq!(accepted, 100);
    assert_eq!(batcher.dropped(), 5);

    batcher.flush(&mut backend, Target::Surface(surface)).unwrap();
    let stats = backend.stats();
    assert_eq!(stats.multiply_draws, 100);
    assert_eq!(stats.additive_draws, 100);
    assert_eq!(batcher.live(), 0);
}

#[test]
fn multiply_then_add_at_the_center() {
    let mut backend = SoftwareBackend::new(16, 16);
    let surface = exact_surface(&mut backend, Float4::splat(0.3));
    let additive = Float4::new(0.1, 0.2, 0.3, 0.4);
    let mut batcher = DisturbanceBatcher::new(4);
    assert!(batcher.enqueue(Disturbance::new([0.5, 0.5], 0.1, Float4::ZERO, additive)));
    batcher.flush(&mut backend, Target::Surface(surface)).unwrap();
    assert_eq!(texel(&backend, surface, GRID / 2, GRID / 2), additive);
}

#[test]
fn every_multiply_precedes_every_add() {
    let mut backend = SoftwareBackend::new(16, 16);
    let surface = exact_surface(&mut backend, Float4::splat(0.3));
    let mut batcher = DisturbanceBatcher::new(4);
    batcher.enqueue(Disturbance::new(
        [0.5, 0.5],
        0.1,
        Float4::ZERO,
        Float4::splat(0.25),
    ));
    batcher.enqueue(Disturbance::new(
        [0.5, 0.5],
        0.1,
        Float4::splat(0.5),
        Float4::splat(0.125),
    ));
    batcher.flush(&mut backend, Target::Surface(surface)).unwrap();
    //interleaving per event would give 0.25 * 0.5 + 0.125
    assert_eq!(
        texel(&backend, surface, GRID / 2, GRID / 2),
        Float4::splat(0.375)
    );
}

#[test]
fn texels_outside_the_radius_are_untouched() {
    let mut backend = SoftwareBackend::new(16, 16);
    let surface = exact_surface(&mut backend, Float4::splat(0.3));
    let mut batcher = DisturbanceBatcher::new(1);
    batcher.enqueue(Disturbance::new(
        [0.5, 0.5],
        0.1,
        Float4::ZERO,
        Float4::ONE,
    ));
    batcher.flush(&mut backend, Target::Surface(surface)).unwrap();

    let config = backend.surface_config(surface).unwrap().clone();
    let circle = Disturbance::new([0.5, 0.5], 0.1, Float4::ZERO, Float4::ONE);
    let mut touched = 0;
    for y in 0..GRID {
        for x in 0..GRID {
            let value = texel(&backend, surface, x, y);
            match circle.alpha_at(config.texel_center(x, y)) {
                None => assert_eq!(value, Float4::splat(0.3), "texel {x},{y}"),
                Some(alpha) => {
                    touched += 1;
                    let expected = 0.3 * (1.0 - alpha) + alpha;
                    assert!((value.r - expected).abs() < 1e-6, "texel {x},{y}");
                }
            }
        }
    }
    //the circle covers roughly pi * 3.3² texels
    assert!(touched > 20 && touched < 50, "{touched}");
}

#[test]
fn overlapping_multipliers_compose() {
    let mut backend = SoftwareBackend::new(16, 16);
    let surface = exact_surface(&mut backend, Float4::ONE);
    let mut batcher = DisturbanceBatcher::new(2);
    let halve = Disturbance::new([0.5, 0.5], 0.2, Float4::splat(0.5), Float4::ZERO);
    batcher.enqueue(halve);
    batcher.enqueue(halve);
    batcher.flush(&mut backend, Target::Surface(surface)).unwrap();
    assert_eq!(
        texel(&backend, surface, GRID / 2, GRID / 2),
        Float4::splat(0.25)
    );
}

#[test]
fn flush_restores_auto_clear() {
    let mut backend = SoftwareBackend::new(16, 16);
    let surface = exact_surface(&mut backend, Float4::splat(0.3));
    let mut batcher = DisturbanceBatcher::new(1);
    batcher.enqueue(Disturbance::new([0.1, 0.1], 0.05, Float4::ONE, Float4::ZERO));
    assert!(backend.auto_clear());
    batcher.flush(&mut backend, Target::Surface(surface)).unwrap();
    assert!(backend.auto_clear());
    //auto-clear was off during the flush, so the rest of the surface survived
    assert_eq!(texel(&backend, surface, GRID - 1, GRID - 1), Float4::splat(0.3));

    backend.set_auto_clear(false);
    batcher.enqueue(Disturbance::new([0.1, 0.1], 0.05, Float4::ONE, Float4::ZERO));
    batcher.flush(&mut backend, Target::Surface(surface)).unwrap();
    assert!(!backend.auto_clear());
}

#[test]
fn empty_flush_draws_nothing() {
    let mut backend = SoftwareBackend::new(16, 16);
    let surface = exact_surface(&mut backend, Float4::ONE);
    let mut batcher = DisturbanceBatcher::new(8);
    batcher.flush(&mut backend, Target::Surface(surface)).unwrap();
    let stats = backend.stats();
    assert_eq!(stats.multiply_draws, 0);
    assert_eq!(stats.additive_draws, 0);
    assert_eq!(texel(&backend, surface, 0, 0), Float4::ONE);
}

#[test]
fn flush_into_unknown_surface_still_empties_the_queue() {
    let mut backend = SoftwareBackend::new(16, 16);
    let surface = exact_surface(&mut backend, Float4::ONE);
    backend.release_surface(surface);
    let mut batcher = DisturbanceBatcher::new(2);
    batcher.enqueue(Disturbance::new([0.5, 0.5], 0.1, Float4::ONE, Float4::ONE));
    assert!(batcher.flush(&mut backend, Target::Surface(surface)).is_err());
    assert_eq!(batcher.live(), 0);
    assert!(backend.auto_clear());
}

#[test]
fn non_finite_positions_leave_the_surface_intact() {
    let mut backend = SoftwareBackend::new(16, 16);
    let surface = exact_surface(&mut backend, Float4::splat(0.5));
    let mut batcher = DisturbanceBatcher::new(4);
    assert!(!batcher.enqueue(Disturbance::new([f32::NAN, 0.5], 0.05, Float4::ONE, Float4::ZERO)));
    assert!(!batcher.enqueue(Disturbance::new(
        [0.5, f32::INFINITY],
        0.05,
        Float4::ONE,
        Float4::ZERO
    )));
    batcher.flush(&mut backend, Target::Surface(surface)).unwrap();
    let texture = backend.texture(surface).unwrap();
    assert!(texture.texels().iter().all(|t| *t == Float4::splat(0.5)));
    assert_eq!(backend.stats().multiply_draws, 0);
}
