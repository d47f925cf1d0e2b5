use std::path::Path;
use std::rc::Rc;

use image::imageops::flip_vertical_in_place;
use image::GenericImageView;

use crate::context::RenderContext;
use crate::driver::{GlDriver, SamplerState, TextureFilter, TextureWrap};
use crate::error::RenderError;

/// Decoded image converted to tightly packed RGBA8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    /// Channel count of the source file before RGBA conversion.
    pub source_channels: u8,
    pub pixels: Vec<u8>,
}

impl ImageData {
    #[cfg(test)]
    pub(crate) fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self {
            width,
            height,
            source_channels: 4,
            pixels: rgba.repeat((width * height) as usize),
        }
    }

    /// Square checkerboard alternating `a` and `b` every `cell` pixels.
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity(size as usize * size as usize * 4);
        for y in 0..size {
            for x in 0..size {
                let color = if (x / cell + y / cell) % 2 == 0 { a } else { b };
                pixels.extend_from_slice(&color);
            }
        }
        Self {
            width: size,
            height: size,
            source_channels: 4,
            pixels,
        }
    }
}

/// How a texture is sampled and whether the source is flipped on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureOptions {
    pub wrap: TextureWrap,
    pub filter: TextureFilter,
    pub mipmaps: bool,
    /// Image rows are stored top-down while GL samples bottom-up.
    pub flip_vertically: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            wrap: TextureWrap::Repeat,
            filter: TextureFilter::Linear,
            mipmaps: true,
            flip_vertically: true,
        }
    }
}

/// Decodes `path` into RGBA8, optionally flipping rows so `v = 0` is the bottom.
pub fn load_image(path: &Path, flip_vertically: bool) -> Result<ImageData, RenderError> {
    let image = image::open(path).map_err(|source| {
        tracing::error!(path = %path.display(), error = %source, "failed to load texture image");
        RenderError::TextureLoad {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let (width, height) = image.dimensions();
    let source_channels = image.color().channel_count();
    let mut rgba = image.to_rgba8();
    if flip_vertically {
        flip_vertical_in_place(&mut rgba);
    }
    Ok(ImageData {
        width,
        height,
        source_channels,
        pixels: rgba.into_raw(),
    })
}

/// A 2D texture owned by the driver.
pub struct Texture<G: GlDriver> {
    gl: Rc<G>,
    handle: Option<G::Texture>,
    width: u32,
    height: u32,
}

impl<G: GlDriver> Texture<G> {
    /// Loads the image first; no driver texture is created if decoding fails.
    pub fn from_path(
        ctx: &RenderContext<G>,
        path: &Path,
        options: &TextureOptions,
    ) -> Result<Self, RenderError> {
        let image = load_image(path, options.flip_vertically)?;
        let texture = Self::from_image(ctx, &image, options)?;
        tracing::debug!(
            path = %path.display(),
            width = image.width,
            height = image.height,
            channels = image.source_channels,
            "loaded texture"
        );
        Ok(texture)
    }

    pub fn from_image(
        ctx: &RenderContext<G>,
        image: &ImageData,
        options: &TextureOptions,
    ) -> Result<Self, RenderError> {
        let expected = image.width as usize * image.height as usize * 4;
        if image.width == 0 || image.height == 0 || image.pixels.len() != expected {
            return Err(RenderError::Driver(format!(
                "texture data for {}x{} must hold {expected} bytes, got {}",
                image.width,
                image.height,
                image.pixels.len()
            )));
        }

        let gl = ctx.driver();
        let handle = gl.create_texture().map_err(RenderError::Driver)?;
        gl.bind_texture(0, Some(handle));
        gl.upload_rgba8(
            image.width,
            image.height,
            &image.pixels,
            SamplerState {
                wrap: options.wrap,
                filter: options.filter,
                mipmaps: options.mipmaps,
            },
        );
        gl.bind_texture(0, None);

        Ok(Self {
            gl,
            handle: Some(handle),
            width: image.width,
            height: image.height,
        })
    }

    pub fn handle(&self) -> Option<G::Texture> {
        self.handle
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub(crate) fn bind(&self, unit: u32) {
        match self.handle {
            Some(handle) => self.gl.bind_texture(unit, Some(handle)),
            None => tracing::warn!(unit, "ignoring bind of released texture"),
        }
    }

    /// Returns the texture to the driver. Further calls do nothing.
    pub fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.gl.delete_texture(handle);
        }
    }
}

impl<G: GlDriver> Drop for Texture<G> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    use super::*;
    use crate::testing::FakeGl;

    fn context() -> (Rc<FakeGl>, RenderContext<FakeGl>) {
        let gl = Rc::new(FakeGl::new());
        let ctx = RenderContext::new(gl.clone());
        (gl, ctx)
    }

    fn write_two_row_png(dir: &TempDir) -> std::path::PathBuf {
        let mut image = RgbImage::new(1, 2);
        image.put_pixel(0, 0, Rgb([255, 0, 0]));
        image.put_pixel(0, 1, Rgb([0, 0, 255]));
        let path = dir.path().join("rows.png");
        image.save(&path).unwrap();
        path
    }

    #[test]
    fn missing_image_creates_no_texture() {
        let (gl, ctx) = context();
        let dir = TempDir::new().unwrap();

        let err = Texture::from_path(&ctx, &dir.path().join("nope.png"), &TextureOptions::default())
            .err()
            .expect("missing file must fail");

        assert!(matches!(err, RenderError::TextureLoad { .. }));
        assert_eq!(gl.created_textures(), 0);
        assert_eq!(gl.uploads(), 0);
    }

    #[test]
    fn rgb_source_expands_to_rgba_and_flips() {
        let dir = TempDir::new().unwrap();
        let path = write_two_row_png(&dir);

        let flipped = load_image(&path, true).unwrap();
        assert_eq!(flipped.source_channels, 3);
        assert_eq!(flipped.pixels.len(), 8);
        assert_eq!(&flipped.pixels[..4], &[0, 0, 255, 255]);

        let upright = load_image(&path, false).unwrap();
        assert_eq!(&upright.pixels[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn upload_records_dimensions_and_sampler() {
        let (gl, ctx) = context();
        let dir = TempDir::new().unwrap();
        let path = write_two_row_png(&dir);
        let options = TextureOptions {
            wrap: TextureWrap::ClampToEdge,
            filter: TextureFilter::Nearest,
            mipmaps: false,
            flip_vertically: true,
        };

        let texture = Texture::from_path(&ctx, &path, &options).unwrap();

        assert_eq!(texture.size(), (1, 2));
        let upload = gl.texture_upload(texture.handle().unwrap()).unwrap();
        assert_eq!(upload.0, (1, 2));
        assert_eq!(upload.1.wrap, TextureWrap::ClampToEdge);
        assert!(!upload.1.mipmaps);
        assert_eq!(gl.take_error(), None);
    }

    #[test]
    fn mismatched_pixel_buffer_is_rejected() {
        let (gl, ctx) = context();
        let mut image = ImageData::solid(2, 2, [0, 0, 0, 255]);
        image.pixels.pop();
        assert!(Texture::from_image(&ctx, &image, &TextureOptions::default()).is_err());
        assert_eq!(gl.created_textures(), 0);
    }

    #[test]
    fn release_deletes_once() {
        let (gl, ctx) = context();
        let mut texture = Texture::from_image(
            &ctx,
            &ImageData::solid(1, 1, [1, 2, 3, 4]),
            &TextureOptions::default(),
        )
        .unwrap();
        texture.release();
        texture.release();
        drop(texture);
        assert_eq!(gl.live_textures(), 0);
        assert_eq!(gl.take_error(), None);
    }

    #[test]
    fn checkerboard_alternates_cells() {
        let image = ImageData::checkerboard(4, 2, [255, 255, 255, 255], [0, 0, 0, 255]);
        assert_eq!(image.pixels.len(), 4 * 4 * 4);
        let pixel = |x: usize, y: usize| &image.pixels[(y * 4 + x) * 4..(y * 4 + x) * 4 + 4];
        assert_eq!(pixel(0, 0), &[255, 255, 255, 255]);
        assert_eq!(pixel(1, 1), &[255, 255, 255, 255]);
        assert_eq!(pixel(2, 0), &[0, 0, 0, 255]);
        assert_eq!(pixel(2, 2), &[255, 255, 255, 255]);
    }
}
