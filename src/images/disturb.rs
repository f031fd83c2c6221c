// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Batched disturbances.

A disturbance is a round, localized perturbation of the simulation state: a ripple where
something hit the water.  Within `radius` of its center each texel is first scaled toward a
multiplier and then offset by an additive term, both weighted by the falloff

```text
r² = |uv - center|² / radius²
alpha = (1 - r²)²        for r² <= 1
```

Texels with `r² > 1` are untouched.

Disturbances are queued into a [`DisturbanceBatcher`] during the frame and drawn together by
[`DisturbanceBatcher::flush`].  The batcher has a fixed capacity; once it is full further
events are dropped and [`DisturbanceBatcher::enqueue`] returns `false`.

```
use wavefield::SoftwareBackend;
use wavefield::bindings::surface::{SurfaceConfig, Target};
use wavefield::images::backend::RenderBackend;
use wavefield::images::disturb::{Disturbance, DisturbanceBatcher};
use wavefield::pixel_formats::Float4;

let mut backend = SoftwareBackend::new(16, 16);
let wave = backend.allocate_surface(SurfaceConfig::new(32, 32)).unwrap();
let mut batcher = DisturbanceBatcher::new(4);
assert!(batcher.enqueue(Disturbance::new(
    [0.5, 0.5],
    0.1,
    Float4::ONE,
    Float4::new(0.0, 0.0, 1.0, 0.0),
)));
batcher.flush(&mut backend, Target::Surface(wave)).unwrap();
assert_eq!(batcher.live(), 0);
assert_eq!(backend.stats().multiply_draws, 1);
assert_eq!(backend.stats().additive_draws, 1);
```
*/
use crate::bindings::surface::Target;
use crate::error::Error;
use crate::images::backend::{BlendMode, DisturbPass, GeometryBatch, RenderBackend};
use crate::images::render_pass::AutoClearGuard;
use crate::pixel_formats::Float4;

/// Default capacity of a [`DisturbanceBatcher`].
pub const DEFAULT_MAX_DISTURBANCES: usize = 100;

/// One queued perturbation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disturbance {
    /// Center, in normalized surface coordinates.
    pub position: [f32; 2],
    /// Radius, in normalized surface coordinates.
    pub radius: f32,
    /// Each affected texel is scaled toward this, weighted by the falloff.
    pub multiplier: Float4,
    /// Added to each affected texel, weighted by the falloff.
    pub additive: Float4,
}

impl Disturbance {
    pub const fn new(position: [f32; 2], radius: f32, multiplier: Float4, additive: Float4) -> Self {
        Disturbance {
            position,
            radius,
            multiplier,
            additive,
        }
    }

    /// Falloff weight at normalized coordinate `uv`, or `None` outside the radius.
    pub fn alpha_at(&self, uv: [f32; 2]) -> Option<f32> {
        let dx = (uv[0] - self.position[0]) / self.radius;
        let dy = (uv[1] - self.position[1]) / self.radius;
        falloff(dx * dx + dy * dy)
    }
}

impl Default for Disturbance {
    fn default() -> Self {
        Disturbance::new([0.0, 0.0], 0.0, Float4::ONE, Float4::ZERO)
    }
}

/// `(1 - r²)²` for `r² <= 1`; `None` beyond.
#[inline]
pub fn falloff(r2: f32) -> Option<f32> {
    if r2 > 1.0 {
        None
    } else {
        let w = 1.0 - r2;
        Some(w * w)
    }
}

/// The value the multiply pass writes: `1 - alpha * (1 - multiplier)`.
#[inline]
pub fn multiply_factor(alpha: f32, multiplier: Float4) -> Float4 {
    multiplier.map(|m| 1.0 - alpha * (1.0 - m))
}

/// The value the add pass writes: `alpha * additive`.
#[inline]
pub fn additive_term(alpha: f32, additive: Float4) -> Float4 {
    additive.map(|a| alpha * a)
}

/**
A fixed-capacity queue of disturbances.

Events live in a preallocated arena; a cursor marks how many are live.  Flushing draws them
and resets the cursor, so the arena is reused every frame without allocating.
*/
#[derive(Debug, Clone)]
pub struct DisturbanceBatcher {
    events: Box<[Disturbance]>,
    live: usize,
    dropped: u64,
}

impl DisturbanceBatcher {
    pub fn new(capacity: usize) -> Self {
        DisturbanceBatcher {
            events: vec![Disturbance::default(); capacity].into_boxed_slice(),
            live: 0,
            dropped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.events.len()
    }

    /// Number of events waiting for the next flush.
    pub fn live(&self) -> usize {
        self.live
    }

    /// Events dropped since the batcher was created.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// The events waiting for the next flush, in submission order.
    pub fn events(&self) -> &[Disturbance] {
        &self.events[..self.live]
    }

    /// Queues `event` for the next flush.
    ///
    /// Returns `false` and drops the event if the batcher is full.  Events whose radius isn't
    /// a positive finite number, or whose position isn't finite, are dropped the same way.
    pub fn enqueue(&mut self, event: Disturbance) -> bool {
        if self.live == self.events.len() {
            self.dropped += 1;
            logwise::debuginternal_sync!(
                "Dropping disturbance, batcher is full at {capacity}",
                capacity = self.events.len()
            );
            return false;
        }
        if !(event.radius.is_finite() && event.radius > 0.0) {
            self.dropped += 1;
            logwise::debuginternal_sync!(
                "Dropping disturbance with radius {radius}",
                radius = logwise::privacy::LogIt(&event.radius)
            );
            return false;
        }
        if !event.position.iter().all(|c| c.is_finite()) {
            self.dropped += 1;
            logwise::debuginternal_sync!(
                "Dropping disturbance at {position}",
                position = logwise::privacy::LogIt(&event.position)
            );
            return false;
        }
        self.events[self.live] = event;
        self.live += 1;
        true
    }

    /// Draws every queued event into `target`, then empties the queue.
    ///
    /// All multiply draws are issued before any add draw.  Auto-clear is off for the duration
    /// and restored afterwards.  The queue is emptied even if the backend fails.
    pub fn flush<B: RenderBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        target: Target,
    ) -> Result<(), Error> {
        if self.live == 0 {
            return Ok(());
        }
        let events = &self.events[..self.live];
        logwise::debuginternal_sync!(
            "Flushing {count} disturbances",
            count = events.len()
        );
        let mut guard = AutoClearGuard::new(backend, false);
        let result = guard
            .render_geometry(
                target,
                &GeometryBatch::Disturbances {
                    pass: DisturbPass::Multiply,
                    events,
                },
                BlendMode::Multiply,
            )
            .and_then(|_| {
                guard.render_geometry(
                    target,
                    &GeometryBatch::Disturbances {
                        pass: DisturbPass::Add,
                        events,
                    },
                    BlendMode::Additive,
                )
            });
        drop(guard);
        self.live = 0;
        result
    }
}

impl Default for DisturbanceBatcher {
    fn default() -> Self {
        DisturbanceBatcher::new(DEFAULT_MAX_DISTURBANCES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falloff_profile() {
        assert_eq!(falloff(0.0), Some(1.0));
        assert_eq!(falloff(0.5), Some(0.25));
        assert_eq!(falloff(1.0), Some(0.0));
        assert_eq!(falloff(1.0001), None);
    }

    #[test]
    fn multiply_factor_blends_toward_multiplier() {
        let m = Float4::new(0.0, 0.5, 1.0, 2.0);
        assert_eq!(multiply_factor(1.0, m), m);
        assert_eq!(multiply_factor(0.0, m), Float4::ONE);
        assert_eq!(multiply_factor(0.5, m).r, 0.5);
    }

    #[test]
    fn enqueue_respects_capacity() {
        let mut batcher = DisturbanceBatcher::new(2);
        let event = Disturbance::new([0.5, 0.5], 0.1, Float4::ONE, Float4::ZERO);
        assert!(batcher.enqueue(event));
        assert!(batcher.enqueue(event));
        assert!(!batcher.enqueue(event));
        assert_eq!(batcher.live(), 2);
        assert_eq!(batcher.dropped(), 1);
    }

    #[test]
    fn degenerate_radius_is_dropped() {
        let mut batcher = DisturbanceBatcher::default();
        assert_eq!(batcher.capacity(), DEFAULT_MAX_DISTURBANCES);
        for radius in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(!batcher.enqueue(Disturbance::new([0.5, 0.5], radius, Float4::ONE, Float4::ONE)));
        }
        assert_eq!(batcher.live(), 0);
    }

    #[test]
    fn non_finite_position_is_dropped() {
        let mut batcher = DisturbanceBatcher::new(4);
        for position in [[f32::NAN, 0.5], [0.5, f32::INFINITY], [f32::NEG_INFINITY, f32::NAN]] {
            assert!(!batcher.enqueue(Disturbance::new(position, 0.05, Float4::ONE, Float4::ZERO)));
        }
        assert_eq!(batcher.live(), 0);
        assert_eq!(batcher.dropped(), 3);
    }

    #[test]
    fn alpha_is_none_outside_radius() {
        let event = Disturbance::new([0.5, 0.5], 0.25, Float4::ONE, Float4::ZERO);
        assert_eq!(event.alpha_at([0.5, 0.5]), Some(1.0));
        assert_eq!(event.alpha_at([0.5, 0.8]), None);
    }
}
