// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! CPU-resident texture storage.

This is the texel store behind [`crate::SoftwareBackend`].  It is also handy on its own for
building reference images in tests.

# Coordinate Systems

- Origin (0, 0) is at the top-left
- X increases to the right
- Y increases downward
- Normalized coordinates map [0, 1) to the full texture, wrapping outside that range

# Example

```
use wavefield::bindings::software::texture::{Texture, Texel};
use wavefield::pixel_formats::Float4;

let mut texture = Texture::new(4, 4, Float4::ZERO);
texture[Texel { x: 1, y: 2 }] = Float4::ONE;
assert_eq!(texture[Texel { x: 1, y: 2 }], Float4::ONE);
assert_eq!(texture.sample_nearest([0.3, 0.6]), Float4::ONE);
```
*/

use crate::pixel_formats::Float4;
use std::ops::{Index, IndexMut};

/// A 2D array of [`Float4`] texels, stored row-major (Y-major, X-minor).
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    data: Vec<Float4>,
    width: u32,
    height: u32,
}

/// Integer texture coordinates.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub struct Texel {
    pub x: u32,
    pub y: u32,
}

impl Texel {
    pub const ZERO: Texel = Texel { x: 0, y: 0 };

    const fn vec_offset(&self, width: u32) -> usize {
        width as usize * self.y as usize + self.x as usize
    }

    const fn from_vec_offset(width: u32, offset: usize) -> Texel {
        let y = offset / width as usize;
        let x = offset % width as usize;
        Texel {
            x: x as u32,
            y: y as u32,
        }
    }
}

impl Texture {
    /// Creates a texture with every texel set to `fill`.
    pub fn new(width: u32, height: u32, fill: Float4) -> Self {
        Texture {
            data: vec![fill; width as usize * height as usize],
            width,
            height,
        }
    }

    /// Creates a texture by evaluating `f` at every texel.
    ///
    /// ```
    /// use wavefield::bindings::software::texture::{Texture, Texel};
    /// use wavefield::pixel_formats::Float4;
    ///
    /// let ramp = Texture::new_with(8, 1, |texel| Float4::splat(texel.x as f32 / 8.0));
    /// assert_eq!(ramp[Texel { x: 4, y: 0 }].r, 0.5);
    /// ```
    pub fn new_with(width: u32, height: u32, f: impl Fn(Texel) -> Float4) -> Self {
        let data = (0..width as usize * height as usize)
            .map(|offset| f(Texel::from_vec_offset(width, offset)))
            .collect();
        Texture {
            data,
            width,
            height,
        }
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub fn texels(&self) -> &[Float4] {
        &self.data
    }

    /// Overwrites every texel with `value`.
    pub fn fill(&mut self, value: Float4) {
        self.data.fill(value);
    }

    fn wrapped(&self, x: i64, y: i64) -> Float4 {
        let x = x.rem_euclid(self.width as i64) as u32;
        let y = y.rem_euclid(self.height as i64) as u32;
        self[Texel { x, y }]
    }

    /// The texel covering normalized coordinate `uv`, with repeat wrapping.
    pub fn sample_nearest(&self, uv: [f32; 2]) -> Float4 {
        let x = (uv[0] * self.width as f32).floor() as i64;
        let y = (uv[1] * self.height as f32).floor() as i64;
        self.wrapped(x, y)
    }

    /// Bilinear sample between the four texel centers around `uv`, with repeat wrapping.
    pub fn sample_linear(&self, uv: [f32; 2]) -> Float4 {
        let fx = uv[0] * self.width as f32 - 0.5;
        let fy = uv[1] * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);
        let weights = [
            ((1.0 - tx) * (1.0 - ty), self.wrapped(x0, y0)),
            (tx * (1.0 - ty), self.wrapped(x0 + 1, y0)),
            ((1.0 - tx) * ty, self.wrapped(x0, y0 + 1)),
            (tx * ty, self.wrapped(x0 + 1, y0 + 1)),
        ];
        let mut avg = Float4::ZERO;
        for (weight, texel) in weights {
            avg.r += weight * texel.r;
            avg.g += weight * texel.g;
            avg.b += weight * texel.b;
            avg.a += weight * texel.a;
        }
        avg
    }
}

impl Index<Texel> for Texture {
    type Output = Float4;

    fn index(&self, index: Texel) -> &Self::Output {
        &self.data[index.vec_offset(self.width)]
    }
}

impl IndexMut<Texel> for Texture {
    fn index_mut(&mut self, index: Texel) -> &mut Self::Output {
        let offset = index.vec_offset(self.width);
        &mut self.data[offset]
    }
}
