//! Overlay asset library.
//!
//! Overlays are transparent PNGs holding the badge art for the notch, one per
//! index from 1 to 9. They are decoded once at startup and never modified;
//! share the library behind an `Arc` and read it from any thread.

use std::ops::RangeInclusive;
use std::path::Path;

use image::RgbaImage;

use crate::error::{Error, Result};

/// Overlay PNGs compiled into the binary, in index order.
const EMBEDDED: [&[u8]; 9] = [
    include_bytes!("../assets/overlays/1.png"),
    include_bytes!("../assets/overlays/2.png"),
    include_bytes!("../assets/overlays/3.png"),
    include_bytes!("../assets/overlays/4.png"),
    include_bytes!("../assets/overlays/5.png"),
    include_bytes!("../assets/overlays/6.png"),
    include_bytes!("../assets/overlays/7.png"),
    include_bytes!("../assets/overlays/8.png"),
    include_bytes!("../assets/overlays/9.png"),
];

/// Immutable set of decoded overlays addressed by index.
#[derive(Debug, Clone)]
pub struct OverlayLibrary {
    assets: Vec<RgbaImage>,
}

impl OverlayLibrary {
    /// Valid overlay indices.
    pub const INDICES: RangeInclusive<u8> = 1..=9;

    /// Index used when a request does not name one.
    pub const DEFAULT_INDEX: u8 = 1;

    /// Decode the overlays embedded in the binary.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OverlayDecode`] if an embedded PNG is corrupt.
    pub fn embedded() -> Result<Self> {
        let assets = Self::INDICES
            .zip(EMBEDDED)
            .map(|(index, bytes)| {
                image::load_from_memory(bytes)
                    .map(|img| img.to_rgba8())
                    .map_err(|source| Error::OverlayDecode { index, source })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { assets })
    }

    /// Load `{dir}/{index}.png` for every index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OverlayMissing`] if a file does not exist, or
    /// [`Error::OverlayDecode`] if one cannot be decoded.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut assets = Vec::with_capacity(Self::INDICES.len());
        for index in Self::INDICES {
            let path = dir.join(format!("{index}.png"));
            if !path.is_file() {
                return Err(Error::OverlayMissing(index));
            }
            let img = image::open(&path).map_err(|source| Error::OverlayDecode { index, source })?;
            tracing::debug!(index, path = %path.display(), "loaded overlay");
            assets.push(img.to_rgba8());
        }
        Ok(Self { assets })
    }

    /// Build a library from already-decoded images; the first image is
    /// index 1.
    #[must_use]
    pub fn from_images(assets: Vec<RgbaImage>) -> Self {
        Self { assets }
    }

    /// Look up an overlay by index.
    #[must_use]
    pub fn get(&self, index: u8) -> Option<&RgbaImage> {
        let slot = usize::from(index).checked_sub(1)?;
        self.assets.get(slot)
    }

    /// Number of loaded overlays.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// Whether the library holds no overlays.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Parse the `idx` form field.
///
/// Absent or blank selects [`OverlayLibrary::DEFAULT_INDEX`].
///
/// # Errors
///
/// Returns [`Error::InvalidIndex`] unless the value is an integer in
/// [`OverlayLibrary::INDICES`].
pub fn parse_index(raw: Option<&str>) -> Result<u8> {
    let Some(text) = raw.map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(OverlayLibrary::DEFAULT_INDEX);
    };
    text.parse::<u8>()
        .ok()
        .filter(|idx| OverlayLibrary::INDICES.contains(idx))
        .ok_or_else(|| Error::InvalidIndex(text.to_string()))
}
