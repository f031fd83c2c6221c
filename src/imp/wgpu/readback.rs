// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Blocking texture readback.
use crate::imp::wgpu::Error;
use crate::imp::wgpu::texture::GpuSurface;
use wgpu::{Extent3d, Origin3d, TexelCopyBufferInfo, TexelCopyBufferLayout, TexelCopyTextureInfo};

/// Rows of a texture copy must be padded to this many bytes.
fn aligned_bytes_per_row(unpadded: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies a rectangle of `surface` to the host as tightly packed RGBA8, top row first.
///
/// Blocks until every previously submitted pass has finished.
pub(super) fn read_rgba8(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    surface: &GpuSurface,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
) -> Result<Vec<u8>, Error> {
    let format = surface.config.format;
    let texel_bytes = format.bytes_per_pixel();
    let unpadded = width * texel_bytes;
    let bytes_per_row = aligned_bytes_per_row(unpadded);
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("readback"),
        size: bytes_per_row as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("readback"),
    });
    encoder.copy_texture_to_buffer(
        TexelCopyTextureInfo {
            texture: &surface.texture,
            mip_level: 0,
            origin: Origin3d { x, y, z: 0 },
            aspect: wgpu::TextureAspect::All,
        },
        TexelCopyBufferInfo {
            buffer: &buffer,
            layout: TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: None,
            },
        },
        Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let (sender, mapped) = r#continue::continuation();
    buffer.map_async(wgpu::MapMode::Read, .., move |result| {
        sender.send(result);
    });
    let status = device.poll(wgpu::PollType::Wait)?;
    //an unfinished wait can leave the map callback pending
    if !status.wait_finished() {
        return Err(Error::MapCallbackDropped);
    }
    test_executors::spin_on(mapped)?;

    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    {
        let mapped = buffer.slice(..).get_mapped_range();
        for row in mapped.chunks(bytes_per_row as usize) {
            for texel in row[..unpadded as usize].chunks(texel_bytes as usize) {
                let pixel = format.decode_texel(texel);
                pixels.extend_from_slice(&[pixel.r, pixel.g, pixel.b, pixel.a]);
            }
        }
    }
    buffer.unmap();
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pad_to_copy_alignment() {
        assert_eq!(aligned_bytes_per_row(4), 256);
        assert_eq!(aligned_bytes_per_row(256), 256);
        assert_eq!(aligned_bytes_per_row(257), 512);
    }
}
