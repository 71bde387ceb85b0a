//! Proportional notch geometry.
//!
//! The notch is the union of an ellipse and a rectangle whose corners are
//! given in units of a reference canvas (1024 for the current artwork, 400
//! for the original single-overlay artwork). Coordinates are converted to
//! fractions of the reference before they touch real pixels, so the same
//! geometry applies to any image size.
//!
//! Both shapes deliberately overhang the bottom-right edge of the canvas
//! (`1036 / 1024`). The overlay art is drawn against that clipped shape.

use image::{Rgba, RgbaImage};

/// Value written to every pixel inside the notch.
pub const CLEARED: Rgba<u8> = Rgba([255, 255, 255, 0]);

/// Axis-aligned box in reference-canvas units, corners inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Left edge.
    pub x0: f64,
    /// Top edge.
    pub y0: f64,
    /// Right edge.
    pub x1: f64,
    /// Bottom edge.
    pub y1: f64,
}

impl Bounds {
    /// Create a box from its two corners.
    #[must_use]
    pub const fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

/// Notch shape definition plus the supersampling factor it is cut at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskGeometry {
    /// Side length of the reference canvas the bounds are expressed in.
    pub reference: f64,
    /// Bounding box of the ellipse cutout.
    pub ellipse: Bounds,
    /// Rectangle cutout.
    pub rect: Bounds,
    /// Sub-pixels per axis used to antialias the cut edge (1 = hard edge).
    pub supersample: u32,
}

impl MaskGeometry {
    /// Current notch: 1024-unit reference, cut at 4x.
    pub const NOTCH: Self = Self {
        reference: 1024.0,
        ellipse: Bounds::new(524.0, 524.0, 1036.0, 1036.0),
        rect: Bounds::new(780.0, 780.0, 1036.0, 1036.0),
        supersample: 4,
    };

    /// Original notch: 400-unit reference, cut directly with no supersampling.
    pub const CLASSIC: Self = Self {
        reference: 400.0,
        ellipse: Bounds::new(205.0, 205.0, 405.0, 405.0),
        rect: Bounds::new(305.0, 305.0, 405.0, 405.0),
        supersample: 1,
    };

    /// Whether the point `(u, v)`, given as fractions of width and height,
    /// lies inside the notch.
    #[must_use]
    pub fn contains(&self, u: f64, v: f64) -> bool {
        let x = u * self.reference;
        let y = v * self.reference;

        let e = self.ellipse;
        let rx = (e.x1 - e.x0) / 2.0;
        let ry = (e.y1 - e.y0) / 2.0;
        if rx > 0.0 && ry > 0.0 {
            let dx = (x - (e.x0 + rx)) / rx;
            let dy = (y - (e.y0 + ry)) / ry;
            if dx * dx + dy * dy <= 1.0 {
                return true;
            }
        }

        let r = self.rect;
        (r.x0..=r.x1).contains(&x) && (r.y0..=r.y1).contains(&y)
    }

    /// Cut the notch out of `image` in place.
    ///
    /// Each pixel is split into `supersample x supersample` sub-pixels whose
    /// centres are tested against the notch. A fully covered pixel becomes
    /// [`CLEARED`], a partly covered one keeps its colour and loses alpha in
    /// proportion to its coverage. Geometry is scaled to the image's own
    /// dimensions and clipped to the canvas; pixels outside the notch are
    /// left untouched.
    ///
    /// The result is the same as upsampling by nearest neighbour, clearing
    /// whole sub-pixels and box-filtering back down in premultiplied alpha,
    /// but no buffer larger than `image` is ever allocated.
    pub fn cut(&self, image: &mut RgbaImage) {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return;
        }
        let factor = self.supersample.max(1);
        let canvas_w = f64::from(w) * f64::from(factor);
        let canvas_h = f64::from(h) * f64::from(factor);

        // Nothing left of or above the shapes can be inside.
        let left = self.ellipse.x0.min(self.rect.x0) / self.reference;
        let top = self.ellipse.y0.min(self.rect.y0) / self.reference;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let (x_start, y_start) = (
            ((left * f64::from(w)).floor().max(0.0) as u32).min(w),
            ((top * f64::from(h)).floor().max(0.0) as u32).min(h),
        );

        let samples = factor * factor;
        for y in y_start..h {
            for x in x_start..w {
                let covered = self.coverage(x, y, factor, canvas_w, canvas_h);
                if covered > 0 {
                    let px = image.get_pixel_mut(x, y);
                    *px = clear_fraction(*px, covered, samples);
                }
            }
        }
    }

    /// Number of the `factor x factor` sub-pixel centres of pixel `(x, y)`
    /// that fall inside the notch.
    fn coverage(&self, x: u32, y: u32, factor: u32, canvas_w: f64, canvas_h: f64) -> u32 {
        let offsets = || (0..factor).map(f64::from);
        let row = f64::from(y) * f64::from(factor);
        let col = f64::from(x) * f64::from(factor);

        offsets()
            .flat_map(|j| offsets().map(move |i| (i, j)))
            .filter(|&(i, j)| {
                self.contains((col + i + 0.5) / canvas_w, (row + j + 0.5) / canvas_h)
            })
            .fold(0, |n, _| n + 1)
    }
}

/// Replace `covered` of `samples` equal parts of `px` with [`CLEARED`] and
/// average the parts in premultiplied alpha.
fn clear_fraction(px: Rgba<u8>, covered: u32, samples: u32) -> Rgba<u8> {
    if covered >= samples {
        return CLEARED;
    }
    let n = u64::from(samples);
    let cleared = u64::from(covered);
    let kept = n - cleared;
    let alpha = kept * u64::from(px[3]);

    // Weighted by alpha, cleared parts add nothing and the colour stays.
    let mut out = px;
    if alpha == 0 {
        for (channel, fill) in out.0.iter_mut().zip(CLEARED.0).take(3) {
            *channel = round_div(kept * u64::from(*channel) + cleared * u64::from(fill), n);
        }
    }
    out[3] = round_div(alpha, n);
    out
}

/// Integer division rounded to nearest, saturated to `u8`.
fn round_div(sum: u64, divisor: u64) -> u8 {
    u8::try_from((sum + divisor / 2) / divisor).unwrap_or(u8::MAX)
}

impl Default for MaskGeometry {
    fn default() -> Self {
        Self::NOTCH
    }
}
