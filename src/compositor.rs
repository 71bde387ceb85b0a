//! Core icon compositor.

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::blending;
use crate::error::{Error, Result};
use crate::geometry::MaskGeometry;

/// Cuts the notch out of square images and fills it with an overlay.
///
/// The compositor holds only its geometry, so one value can be shared by
/// every request. All intermediate buffers live for a single call.
#[derive(Debug, Clone, Copy, Default)]
pub struct Compositor {
    geometry: MaskGeometry,
}

impl Compositor {
    /// Create a compositor for the given notch geometry.
    #[must_use]
    pub fn new(geometry: MaskGeometry) -> Self {
        Self { geometry }
    }

    /// The geometry this compositor cuts.
    #[must_use]
    pub fn geometry(&self) -> &MaskGeometry {
        &self.geometry
    }

    /// Cut the notch out of `image` and composite `overlay` over the result.
    ///
    /// The notch is cut into a copy of the image with antialiased edges
    /// (see [`MaskGeometry::cut`]), and then the overlay (resized to match) is
    /// blended on top. Passing `None` returns the notched image with nothing
    /// in the notch. Besides the output and the resized overlay, no image
    /// buffer is allocated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the image is not square.
    pub fn composite(&self, image: &RgbaImage, overlay: Option<&RgbaImage>) -> Result<RgbaImage> {
        let (width, height) = image.dimensions();
        if width != height {
            return Err(Error::ShapeMismatch { width, height });
        }

        let mut notched = image.clone();
        self.geometry.cut(&mut notched);

        if let Some(asset) = overlay {
            let fitted = blending::fit(asset, width, height);
            blending::composite_over(&mut notched, &fitted);
        }

        tracing::debug!(width, height, factor = self.geometry.supersample, overlay = overlay.is_some(), "composited icon");
        Ok(notched)
    }

    /// Composite and encode the result as PNG.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] for non-square input, or
    /// [`Error::Image`] if encoding fails.
    pub fn render_png(&self, image: &RgbaImage, overlay: Option<&RgbaImage>) -> Result<Vec<u8>> {
        let icon = self.composite(image, overlay)?;
        encode_png(&icon)
    }
}

/// Encode an RGBA image as PNG into memory.
///
/// # Errors
///
/// Returns [`Error::Image`] if the encoder fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    PngEncoder::new(&mut out).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgba8,
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn opaque(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([40, 80, 120, 255]))
    }

    #[test]
    fn rejects_non_square_with_dimensions() {
        let err = Compositor::default()
            .composite(&opaque(300, 500), None)
            .unwrap_err();
        match err {
            Error::ShapeMismatch { width, height } => {
                assert_eq!((width, height), (300, 500));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn preserves_dimensions_for_square_input() {
        let compositor = Compositor::default();
        for size in [1, 2, 3, 17, 64, 129] {
            let out = compositor.composite(&opaque(size, size), None).unwrap();
            assert_eq!(out.dimensions(), (size, size));
        }
    }

    #[test]
    fn notch_edges_are_antialiased() {
        let out = Compositor::default()
            .composite(&opaque(128, 128), None)
            .unwrap();
        let partial = out.pixels().filter(|p| p[3] > 0 && p[3] < 255).count();
        assert!(partial > 0, "supersampled cut should leave fractional alpha");
    }

    #[test]
    fn classic_cut_is_hard_edged() {
        let out = Compositor::new(MaskGeometry::CLASSIC)
            .composite(&opaque(100, 100), None)
            .unwrap();
        assert!(out.pixels().all(|p| p[3] == 0 || p[3] == 255));
        assert_eq!(out.get_pixel(99, 99)[3], 0);
    }

    #[test]
    fn overlay_fills_the_notch() {
        let overlay = RgbaImage::from_fn(32, 32, |x, y| {
            if x >= 24 && y >= 24 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 0])
            }
        });
        let out = Compositor::default()
            .composite(&opaque(64, 64), Some(&overlay))
            .unwrap();
        assert_eq!(*out.get_pixel(63, 63), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(0, 0), Rgba([40, 80, 120, 255]));
    }

    #[test]
    fn png_output_decodes_to_same_size() {
        let png = Compositor::default()
            .render_png(&opaque(48, 48), None)
            .unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (48, 48));
    }
}
