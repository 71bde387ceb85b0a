//! Offline rendering of local files and directories.

use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbaImage};

use crate::acquire;
use crate::compositor::{encode_png, Compositor};
use crate::error::{Error, Result};
use crate::overlays::OverlayLibrary;

/// Result of rendering a single image file.
#[derive(Debug)]
pub struct RenderResult {
    /// Path of the input file.
    pub path: PathBuf,
    /// Whether rendering succeeded.
    pub success: bool,
    /// Human-readable status message.
    pub message: String,
}

/// Compositor plus overlays, for rendering files without a server.
#[derive(Debug)]
pub struct IconRenderer {
    compositor: Compositor,
    overlays: OverlayLibrary,
}

impl IconRenderer {
    /// Create a renderer.
    #[must_use]
    pub fn new(compositor: Compositor, overlays: OverlayLibrary) -> Self {
        Self {
            compositor,
            overlays,
        }
    }

    /// Composite an in-memory image with overlay `idx`, or no overlay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OverlayMissing`] for an unknown index, or
    /// [`Error::ShapeMismatch`] for a non-square image.
    pub fn render(&self, image: &RgbaImage, idx: Option<u8>) -> Result<RgbaImage> {
        let overlay = match idx {
            Some(i) => Some(self.overlays.get(i).ok_or(Error::OverlayMissing(i))?),
            None => None,
        };
        self.compositor.composite(image, overlay)
    }

    /// Load, composite and save a single file.
    #[must_use]
    pub fn render_file(&self, input: &Path, output: &Path, idx: Option<u8>) -> RenderResult {
        let mut result = RenderResult {
            path: input.to_path_buf(),
            success: false,
            message: String::new(),
        };

        let outcome = acquire::load_file(input)
            .and_then(|img| self.render(&img, idx))
            .and_then(|icon| {
                if let Some(parent) = output.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                save_png(&icon, output)
            });

        match outcome {
            Ok(()) => {
                result.success = true;
                result.message = format!("Saved {}", output.display());
            }
            Err(e) => result.message = e.to_string(),
        }
        result
    }

    /// Render every supported image in a directory into `output_dir`.
    ///
    /// Output names come from [`directory_output_name`], so `a.jpg` and
    /// `a.png` side by side never write to the same file.
    ///
    /// Uses parallel iteration when the `parallel` feature is enabled.
    #[must_use]
    pub fn render_directory(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        idx: Option<u8>,
    ) -> Vec<RenderResult> {
        let entries: Vec<PathBuf> = match std::fs::read_dir(input_dir) {
            Ok(rd) => rd
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().map(|ft| ft.is_file()).unwrap_or(false))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect(),
            Err(e) => {
                return vec![RenderResult {
                    path: input_dir.to_path_buf(),
                    success: false,
                    message: format!("Failed to read directory: {e}"),
                }];
            }
        };

        if let Err(e) = std::fs::create_dir_all(output_dir) {
            return vec![RenderResult {
                path: output_dir.to_path_buf(),
                success: false,
                message: format!("Failed to create output directory: {e}"),
            }];
        }

        let render_one = |input: &PathBuf| {
            let output = output_dir.join(directory_output_name(input));
            self.render_file(input, &output, idx)
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            entries.par_iter().map(render_one).collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            entries.iter().map(render_one).collect()
        }
    }
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "gif"
        ),
        None => false,
    }
}

/// Save an icon as PNG. The path must have a `.png` extension.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for any other extension, or an I/O
/// error if writing fails.
pub fn save_png(img: &RgbaImage, path: &Path) -> Result<()> {
    let format =
        ImageFormat::from_path(path).map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
    if format != ImageFormat::Png {
        return Err(Error::UnsupportedFormat(format!(
            "{format:?} (icons are always written as PNG)"
        )));
    }
    std::fs::write(path, encode_png(img)?)?;
    Ok(())
}

/// File name used for `input` when a whole directory is rendered.
///
/// The source extension is kept in the name: `"a.jpg"` becomes
/// `"a_jpg.png"` and `"a.png"` becomes `"a_png.png"`.
#[must_use]
pub fn directory_output_name(input: &Path) -> String {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    match input.extension() {
        Some(ext) => format!("{stem}_{}.png", ext.to_string_lossy().to_lowercase()),
        None => format!("{stem}.png"),
    }
}

/// Generate a default output path from an input path.
///
/// Example: `"photo.jpg"` becomes `"photo_afdicon.png"`.
#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input.file_stem().unwrap_or_default().to_string_lossy();
    let parent = input.parent().unwrap_or(Path::new("."));
    parent.join(format!("{stem}_afdicon.png"))
}
