// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Writing surfaces to disk for inspection.
use crate::bindings::surface::{SurfaceHandle, Target};
use crate::images::backend::RenderBackend;
use crate::pixel_formats::ReadFormat;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum DumpError {
    #[error("Can't read surface {0}")]
    Read(#[from] crate::Error),
    #[error("Can't write file {0}")]
    Io(#[from] std::io::Error),
    #[error("Can't encode png {0}")]
    Encode(#[from] png::EncodingError),
}

/// Encodes `pixels` (tightly packed RGBA8, top row first) as a PNG.
pub fn encode_png(
    writer: impl std::io::Write,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> Result<(), png::EncodingError> {
    let mut encoder = png::Encoder::new(writer, width, height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(pixels)?;
    writer.finish()
}

/**
Reads `surface` back and writes it to `path` as an 8-bit RGBA PNG.

Channels are clamped to [0, 1] on the way out.  This blocks like any readback.
*/
pub fn write_png<B: RenderBackend + ?Sized>(
    backend: &mut B,
    surface: SurfaceHandle,
    path: impl AsRef<Path>,
) -> Result<(), DumpError> {
    let (width, height) = backend
        .surface_config(surface)
        .map(|c| (c.width, c.height))
        .ok_or(crate::Error::UnknownSurface(surface))?;
    let pixels = backend.read_pixels(
        Target::Surface(surface),
        0,
        0,
        width,
        height,
        ReadFormat::Rgba8Unorm,
    )?;
    let file = File::create(path.as_ref())?;
    encode_png(BufWriter::new(file), width, height, &pixels)?;
    logwise::info_sync!(
        "Wrote surface {width}x{height} to {path}",
        width = width,
        height = height,
        path = path.as_ref().display().to_string()
    );
    Ok(())
}
