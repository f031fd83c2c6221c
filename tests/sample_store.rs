// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
use wavefield::SoftwareBackend;
use wavefield::bindings::surface::{SurfaceConfig, SurfaceHandle};
use wavefield::images::backend::RenderBackend;
use wavefield::images::store::{DEFAULT_MAX_QUERIES, SampleStore};
use wavefield::pixel_formats::Float4;

const GRID: u32 = 32;
const QUANTUM: f32 = 1.0 / 255.0;

/// A wave surface whose texel `(x, y)` holds `(x / 32, y / 32, 0.5, 1)`.
fn ramp(backend: &mut SoftwareBackend) -> SurfaceHandle {
    let surface = backend
        .allocate_surface(SurfaceConfig::new(GRID, GRID))
        .unwrap();
    backend
        .write_texels(surface, |t| {
            Float4::new(t.x as f32 / GRID as f32, t.y as f32 / GRID as f32, 0.5, 1.0)
        })
        .unwrap();
    surface
}

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() <= QUANTUM
}

#[test]
fn samples_round_trip() {
    let mut backend = SoftwareBackend::new(16, 16);
    let wave = ramp(&mut backend);
    let mut store: SampleStore = SampleStore::new(&mut backend, GRID, DEFAULT_MAX_QUERIES).unwrap();
    assert!(store.store_pixel("A".to_string(), 5, 5));
    assert!(store.store_pixel("B".to_string(), 10, 10));
    store.gather(&mut backend, wave).unwrap();
    store.load(&mut backend).unwrap();

    let a = store.get("A").unwrap();
    assert!(close(a.vx, 5.0 / 32.0), "{a:?}");
    assert!(close(a.vy, 5.0 / 32.0), "{a:?}");
    assert!(close(a.h, 0.5), "{a:?}");
    assert_eq!(a.a, 1.0);
    let b = store.get("B").unwrap();
    assert!(close(b.vx, 10.0 / 32.0), "{b:?}");
    assert!(close(b.vy, 10.0 / 32.0), "{b:?}");
    assert_eq!(store.captured().count(), 2);

    let stats = backend.stats();
    assert_eq!(stats.replace_draws, 2);
    assert_eq!(stats.readbacks, 1);
    //two rows of the side surface, not the whole wave
    assert_eq!(stats.bytes_read, 8);
}

#[test]
fn registrations_past_capacity_fail() {
    let mut backend = SoftwareBackend::new(16, 16);
    let wave = ramp(&mut backend);
    let mut store: SampleStore<u32> = SampleStore::new(&mut backend, GRID, 128).unwrap();
    for id in 0..128 {
        assert!(store.store_pixel(id, (id % GRID) as i32, (id / GRID) as i32));
    }
    assert!(!store.store_pixel(128, 0, 0));
    assert_eq!(store.pending(), 128);

    store.gather(&mut backend, wave).unwrap();
    store.load(&mut backend).unwrap();
    assert!(store.get(&128).is_none());
    let last = store.get(&127).unwrap();
    assert!(close(last.vx, 31.0 / 32.0), "{last:?}");
    assert!(close(last.vy, 3.0 / 32.0), "{last:?}");
}

#[test]
fn load_clears_registrations_and_results() {
    let mut backend = SoftwareBackend::new(16, 16);
    let wave = ramp(&mut backend);
    let mut store: SampleStore = SampleStore::new(&mut backend, GRID, 4).unwrap();
    for id in ["a", "b", "c", "d"] {
        assert!(store.store_pixel(id.to_string(), 1, 1));
    }
    store.gather(&mut backend, wave).unwrap();
    store.load(&mut backend).unwrap();
    assert!(store.get("a").is_some());
    assert_eq!(store.pending(), 0);

    //every slot is free again
    assert!(store.store_pixel("e".to_string(), 2, 2));
    store.gather(&mut backend, wave).unwrap();
    store.load(&mut backend).unwrap();
    assert!(store.get("a").is_none());
    assert!(store.get("e").is_some());

    //a load with nothing registered reads nothing and forgets everything
    let readbacks = backend.stats().readbacks;
    store.load(&mut backend).unwrap();
    assert!(store.get("e").is_none());
    assert_eq!(backend.stats().readbacks, readbacks);
}

#[test]
fn out_of_range_cells_consume_no_slot() {
    let mut backend = SoftwareBackend::new(16, 16);
    let mut store: SampleStore = SampleStore::new(&mut backend, GRID, 2).unwrap();
    assert!(!store.store_pixel("x".to_string(), GRID as i32, 0));
    assert!(!store.store_pixel("y".to_string(), 0, GRID as i32));
    assert!(!store.store_pixel("z".to_string(), -1, 4));
    assert_eq!(store.pending(), 0);
    assert!(store.store_pixel("a".to_string(), 0, 0));
    assert!(store.store_pixel("b".to_string(), 31, 31));
}

#[test]
fn duplicate_identifier_takes_the_newer_cell() {
    let mut backend = SoftwareBackend::new(16, 16);
    let wave = ramp(&mut backend);
    let mut store: SampleStore = SampleStore::new(&mut backend, GRID, 8).unwrap();
    assert!(store.store_pixel("bobber".to_string(), 1, 1));
    assert!(store.store_pixel("bobber".to_string(), 20, 8));
    //the first slot is stranded until the load
    assert_eq!(store.pending(), 2);

    store.gather(&mut backend, wave).unwrap();
    store.load(&mut backend).unwrap();
    let sample = store.get("bobber").unwrap();
    assert!(close(sample.vx, 20.0 / 32.0), "{sample:?}");
    assert!(close(sample.vy, 8.0 / 32.0), "{sample:?}");
    assert_eq!(store.captured().count(), 1);
}

#[test]
fn values_are_clamped_to_unit_range() {
    let mut backend = SoftwareBackend::new(16, 16);
    let wave = backend
        .allocate_surface(SurfaceConfig::new(GRID, GRID))
        .unwrap();
    backend
        .write_texels(wave, |_| Float4::new(2.0, -1.0, 0.25, 0.0))
        .unwrap();
    let mut store: SampleStore = SampleStore::new(&mut backend, GRID, 1).unwrap();
    store.store_pixel("p".to_string(), 3, 3);
    store.gather(&mut backend, wave).unwrap();
    store.load(&mut backend).unwrap();
    let sample = store.get("p").unwrap();
    assert_eq!(sample.vx, 1.0);
    assert_eq!(sample.vy, 0.0);
    assert!(close(sample.h, 0.25));
}

#[test]
fn gather_with_no_registrations_draws_nothing() {
    let mut backend = SoftwareBackend::new(16, 16);
    let wave = ramp(&mut backend);
    let mut store: SampleStore = SampleStore::new(&mut backend, GRID, 4).unwrap();
    store.gather(&mut backend, wave).unwrap();
    assert_eq!(backend.stats().replace_draws, 0);
    assert!(backend.auto_clear());
}

#[test]
fn gather_from_unknown_surface_fails() {
    let mut backend = SoftwareBackend::new(16, 16);
    let wave = ramp(&mut backend);
    backend.release_surface(wave);
    let mut store: SampleStore = SampleStore::new(&mut backend, GRID, 4).unwrap();
    store.store_pixel("a".to_string(), 0, 0);
    assert!(matches!(
        store.gather(&mut backend, wave),
        Err(wavefield::Error::UnknownSurface(_))
    ));
}
