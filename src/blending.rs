//! Overlay resizing and alpha blending.
//!
//! Overlays are merged with straight-alpha source-over:
//! `out_a = src_a + dst_a * (1 - src_a)`.

use std::borrow::Cow;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Return `asset` at exactly `width x height`, resizing with a bilinear
/// filter when needed. The asset itself is never modified.
#[must_use]
pub fn fit(asset: &RgbaImage, width: u32, height: u32) -> Cow<'_, RgbaImage> {
    if asset.dimensions() == (width, height) {
        Cow::Borrowed(asset)
    } else {
        Cow::Owned(imageops::resize(asset, width, height, FilterType::Triangle))
    }
}

/// Composite `src` over `dest` in place. Both images must be the same size;
/// pixels beyond the smaller of the two are ignored.
pub fn composite_over(dest: &mut RgbaImage, src: &RgbaImage) {
    let width = dest.width().min(src.width());
    let height = dest.height().min(src.height());

    for y in 0..height {
        for x in 0..width {
            let s = *src.get_pixel(x, y);
            match s[3] {
                0 => {}
                255 => dest.put_pixel(x, y, s),
                _ => {
                    let d = *dest.get_pixel(x, y);
                    dest.put_pixel(x, y, blend(s, d));
                }
            }
        }
    }
}

/// Source-over for a single pair of straight-alpha pixels.
fn blend(src: Rgba<u8>, dst: Rgba<u8>) -> Rgba<u8> {
    let sa = f32::from(src[3]) / 255.0;
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);

    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let channel = |s: u8, d: u8| -> u8 {
        let out = (f32::from(s) * sa + f32::from(d) * da * (1.0 - sa)) / out_a;
        out.round().clamp(0.0, 255.0) as u8
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let alpha = (out_a * 255.0).round().clamp(1.0, 255.0) as u8;

    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        alpha,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            let v = u8::try_from((x * 31 + y * 17) % 256).unwrap();
            Rgba([v, 255 - v, v / 2, 255])
        })
    }

    #[test]
    fn fit_borrows_when_size_matches() {
        let asset = checker(8);
        assert!(matches!(fit(&asset, 8, 8), Cow::Borrowed(_)));
        let resized = fit(&asset, 16, 16);
        assert_eq!(resized.dimensions(), (16, 16));
        assert_eq!(asset.dimensions(), (8, 8));
    }

    #[test]
    fn composite_over_transparent_takes_source() {
        let mut dest = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 0]));
        let src = RgbaImage::from_pixel(1, 1, Rgba([10, 200, 30, 128]));
        composite_over(&mut dest, &src);
        assert_eq!(*dest.get_pixel(0, 0), Rgba([10, 200, 30, 128]));
    }

    #[test]
    fn composite_over_keeps_faint_coverage_visible() {
        let mut dest = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0]));
        let src = RgbaImage::from_pixel(1, 1, Rgba([50, 50, 50, 1]));
        composite_over(&mut dest, &src);
        assert!(dest.get_pixel(0, 0)[3] > 0);
    }

    #[test]
    fn composite_over_leaves_dest_where_source_is_clear() {
        let mut dest = checker(4);
        let before = dest.clone();
        let src = RgbaImage::new(4, 4);
        composite_over(&mut dest, &src);
        assert_eq!(dest, before);
    }

    #[test]
    fn composite_over_blends_half_alpha_on_opaque() {
        let mut dest = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 255]));
        let src = RgbaImage::from_pixel(1, 1, Rgba([255, 255, 255, 128]));
        composite_over(&mut dest, &src);
        let px = dest.get_pixel(0, 0);
        assert_eq!(px[3], 255);
        assert!((127..=129).contains(&px[0]));
    }
}
