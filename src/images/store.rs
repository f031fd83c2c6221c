// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Point sampling of simulation state.

Reading a whole simulation surface back to the host every frame is far too slow.  A
[`SampleStore`] instead reads back only the texels callers asked for:

1. [`SampleStore::store_pixel`] registers a grid cell under an identifier and assigns it a slot.
2. [`SampleStore::gather`] copies the texel under each slot's cell into row `slot` of a
   `1 × capacity` side surface.
3. [`SampleStore::load`] reads the used rows back, **blocking** until the device has finished,
   and decodes them.
4. [`SampleStore::get`] returns the decoded sample for an identifier until the next load.

The transfer is proportional to the number of slots in use, not to the size of the surface.

The side surface stores 8 bits per channel, so values come back quantized to multiples of
1/255 and clamped to [0, 1].

```
use wavefield::SoftwareBackend;
use wavefield::bindings::surface::SurfaceConfig;
use wavefield::images::backend::RenderBackend;
use wavefield::images::store::SampleStore;

let mut backend = SoftwareBackend::new(16, 16);
let wave = backend.allocate_surface(SurfaceConfig::new(32, 32)).unwrap();
let mut store: SampleStore = SampleStore::new(&mut backend, 32, 128).unwrap();
assert!(store.store_pixel("buoy".to_string(), 5, 5));
assert!(!store.store_pixel("lost".to_string(), 32, 0));
store.gather(&mut backend, wave).unwrap();
store.load(&mut backend).unwrap();
let sample = store.get("buoy").unwrap();
assert_eq!(sample.h, 0.0);
assert!(store.get("lost").is_none());
```
*/
use crate::bindings::surface::{FilterMode, SurfaceConfig, SurfaceHandle, Target};
use crate::error::Error;
use crate::images::backend::{BlendMode, GatherSlot, GeometryBatch, RenderBackend};
use crate::images::render_pass::AutoClearGuard;
use crate::pixel_formats::{Float4, ReadFormat, SurfaceFormat, Unorm4};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

/// Default slot capacity of a [`SampleStore`].
pub const DEFAULT_MAX_QUERIES: u32 = 128;

/// One decoded sample.
///
/// The channel names follow the simulation's layout: velocity in `vx`/`vy`, height in `h`,
/// and a free channel `a`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CapturedSample {
    pub vx: f32,
    pub vy: f32,
    pub h: f32,
    pub a: f32,
}

impl CapturedSample {
    /// Decodes one RGBA8 texel as `channel / 255`.
    pub fn from_unorm(pixel: Unorm4) -> Self {
        Self::from(Float4::from_unorm(pixel))
    }
}

impl From<Float4> for CapturedSample {
    fn from(f: Float4) -> Self {
        CapturedSample {
            vx: f.r,
            vy: f.g,
            h: f.b,
            a: f.a,
        }
    }
}

impl From<CapturedSample> for Float4 {
    fn from(s: CapturedSample) -> Self {
        Float4::new(s.vx, s.vy, s.h, s.a)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    grid_x: u32,
    grid_y: u32,
}

/**
Batched point sampling with a blocking readback.

`K` is the identifier type callers sample under.

Registering the same identifier twice before a load points it at the newer slot; the older
slot is still gathered and read back but nothing maps to it.  It is reclaimed by the load.
*/
#[derive(Debug)]
pub struct SampleStore<K = String> {
    side: SurfaceHandle,
    grid_size: u32,
    capacity: u32,
    slots: Box<[Slot]>,
    //slots[..visible] are in use
    visible: u32,
    positions: HashMap<K, u32>,
    captured: HashMap<K, CapturedSample>,
}

impl<K: Eq + Hash> SampleStore<K> {
    /// Creates a store sampling a `grid_size × grid_size` grid with up to `capacity` slots per
    /// load, and allocates its side surface on `backend`.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidStoreConfig`] if `grid_size` or `capacity` is zero.
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        grid_size: u32,
        capacity: u32,
    ) -> Result<Self, Error> {
        if grid_size == 0 || capacity == 0 {
            return Err(Error::InvalidStoreConfig {
                grid_size,
                capacity,
            });
        }
        let side = backend.allocate_surface(
            SurfaceConfig::new(1, capacity)
                .with_filter(FilterMode::Nearest)
                .with_format(SurfaceFormat::Rgba8Unorm)
                .with_debug_name("sample store"),
        )?;
        logwise::info_sync!(
            "Created sample store for grid {grid_size} with {capacity} slots",
            grid_size = grid_size,
            capacity = capacity
        );
        Ok(SampleStore {
            side,
            grid_size,
            capacity,
            slots: vec![Slot::default(); capacity as usize].into_boxed_slice(),
            visible: 0,
            positions: HashMap::new(),
            captured: HashMap::new(),
        })
    }

    pub fn grid_size(&self) -> u32 {
        self.grid_size
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Slots registered since the last load.
    pub fn pending(&self) -> u32 {
        self.visible
    }

    /// The side surface the store gathers into.
    pub fn side_surface(&self) -> SurfaceHandle {
        self.side
    }

    /// Registers grid cell `(grid_x, grid_y)` under `id`.
    ///
    /// Returns `false`, consuming no slot, if the cell is outside the grid or every slot is
    /// in use.
    pub fn store_pixel(&mut self, id: K, grid_x: i32, grid_y: i32) -> bool {
        if self.visible == self.capacity {
            logwise::debuginternal_sync!(
                "Sample store is full at {capacity}",
                capacity = self.capacity
            );
            return false;
        }
        let in_grid = |c: i32| c >= 0 && (c as u32) < self.grid_size;
        if !in_grid(grid_x) || !in_grid(grid_y) {
            return false;
        }
        let index = self.visible;
        self.slots[index as usize] = Slot {
            grid_x: grid_x as u32,
            grid_y: grid_y as u32,
        };
        self.positions.insert(id, index);
        self.visible += 1;
        true
    }

    fn gather_slots(&self) -> Vec<GatherSlot> {
        let half_cell = 0.5 / self.grid_size as f32;
        self.slots[..self.visible as usize]
            .iter()
            .enumerate()
            .map(|(index, slot)| GatherSlot {
                position: [
                    slot.grid_x as f32 / self.grid_size as f32 + half_cell,
                    slot.grid_y as f32 / self.grid_size as f32 + half_cell,
                ],
                depth: index as f32 / self.capacity as f32,
            })
            .collect()
    }

    /// Copies the texel of `source` under each registered cell into the side surface.
    ///
    /// Does nothing when no slot is in use.
    pub fn gather<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        source: SurfaceHandle,
    ) -> Result<(), Error> {
        if self.visible == 0 {
            return Ok(());
        }
        let slots = self.gather_slots();
        let mut guard = AutoClearGuard::new(backend, true);
        guard.render_geometry(
            Target::Surface(self.side),
            &GeometryBatch::Gather {
                source,
                grid_size: self.grid_size,
                capacity: self.capacity,
                slots: &slots,
            },
            BlendMode::Replace,
        )
    }

    /**
    Reads the gathered samples back and makes them available through [`Self::get`].

    This blocks until the device has finished every pass writing the side surface.

    Afterwards every slot is free again and the previous results are gone, even when the
    readback fails.
    */
    pub fn load<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), Error> {
        let rows = self.visible;
        self.visible = 0;
        let positions = std::mem::take(&mut self.positions);
        self.captured.clear();
        if rows == 0 {
            return Ok(());
        }
        let bytes = backend.read_pixels(
            Target::Surface(self.side),
            0,
            0,
            1,
            rows,
            ReadFormat::Rgba8Unorm,
        )?;
        logwise::debuginternal_sync!(
            "Sample store read {rows} rows",
            rows = rows
        );
        for (id, index) in positions {
            let offset = index as usize * 4;
            if let Some(pixel) = bytes.get(offset..offset + 4) {
                let pixel = Unorm4::from_bytes([pixel[0], pixel[1], pixel[2], pixel[3]]);
                self.captured.insert(id, CapturedSample::from_unorm(pixel));
            }
        }
        Ok(())
    }

    /// The sample loaded for `id` by the last [`Self::load`].
    pub fn get<Q>(&self, id: &Q) -> Option<CapturedSample>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.captured.get(id).copied()
    }

    /// Every sample loaded by the last [`Self::load`].
    pub fn captured(&self) -> impl Iterator<Item = (&K, &CapturedSample)> {
        self.captured.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SoftwareBackend;

    #[test]
    fn zero_sizes_are_rejected() {
        let mut backend = SoftwareBackend::new(4, 4);
        assert!(matches!(
            SampleStore::<u32>::new(&mut backend, 0, 8),
            Err(Error::InvalidStoreConfig { grid_size: 0, capacity: 8 })
        ));
        assert!(matches!(
            SampleStore::<u32>::new(&mut backend, 8, 0),
            Err(Error::InvalidStoreConfig { .. })
        ));
    }

    #[test]
    fn gather_positions_hit_cell_centers() {
        let mut backend = SoftwareBackend::new(4, 4);
        let mut store = SampleStore::<u32>::new(&mut backend, 4, 8).unwrap();
        assert!(store.store_pixel(1, 0, 3));
        assert!(store.store_pixel(2, 2, 1));
        let slots = store.gather_slots();
        assert_eq!(slots[0].position, [0.125, 0.875]);
        assert_eq!(slots[0].depth, 0.0);
        assert_eq!(slots[1].position, [0.625, 0.375]);
        assert_eq!(slots[1].depth, 0.125);
    }

    #[test]
    fn negative_cells_are_rejected() {
        let mut backend = SoftwareBackend::new(4, 4);
        let mut store = SampleStore::<u32>::new(&mut backend, 4, 8).unwrap();
        assert!(!store.store_pixel(1, -1, 0));
        assert!(!store.store_pixel(1, 0, -1));
        assert_eq!(store.pending(), 0);
    }

    #[test]
    fn decode_is_channel_over_255() {
        let sample = CapturedSample::from_unorm(Unorm4::from_bytes([255, 0, 51, 128]));
        assert_eq!(sample.vx, 1.0);
        assert_eq!(sample.vy, 0.0);
        assert_eq!(sample.h, 0.2);
        assert_eq!(sample.a, 128.0 / 255.0);
    }
}
