// ============================================================================
// MASK TEXTURE — single-channel GPU mirror of a CPU alpha raster
// ============================================================================

use image::GrayImage;

/// An `R8Unorm` texture holding one mask or SDF raster.
///
/// Rasters are produced on the CPU; `update` re-uploads the whole image via
/// `queue.write_texture` when the CPU copy changes.
pub struct MaskTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl MaskTexture {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, pixels: &GrayImage) -> Self {
        let (width, height) = pixels.dimensions();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let tex = Self { texture, view, width, height };
        tex.update(queue, pixels);
        tex
    }

    /// Full re-upload.  `pixels` must match the texture size.
    pub fn update(&self, queue: &wgpu::Queue, pixels: &GrayImage) {
        debug_assert_eq!(pixels.dimensions(), (self.width, self.height));
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels.as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(self.width),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Upload into `slot`, reusing the existing texture when the size still
    /// matches.
    pub fn sync(slot: &mut Option<MaskTexture>, device: &wgpu::Device, queue: &wgpu::Queue, label: &str, pixels: &GrayImage) {
        match slot {
            Some(tex) if (tex.width, tex.height) == pixels.dimensions() => tex.update(queue, pixels),
            _ => *slot = Some(MaskTexture::new(device, queue, label, pixels)),
        }
    }
}

/// Bytes per row of an `R8Unorm` copy padded to wgpu's copy alignment.
pub fn aligned_bytes_per_row(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    width.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_pad_to_copy_alignment() {
        assert_eq!(aligned_bytes_per_row(1), 256);
        assert_eq!(aligned_bytes_per_row(256), 256);
        assert_eq!(aligned_bytes_per_row(257), 512);
    }
}
