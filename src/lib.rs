//! Cut an icon-shaped notch out of a square image and fill it with a badge.
//!
//! The notch is an ellipse plus a rectangle in the bottom-right corner,
//! defined as fractions of the image size. Edge pixels are sampled at 4x4
//! points each so the cut is anti-aliased, then one of nine
//! pre-rendered overlays is alpha-composited into it.
//!
//! # Quick Start
//!
//! ```no_run
//! use afdicon::{Compositor, OverlayLibrary};
//!
//! let overlays = OverlayLibrary::embedded().expect("embedded overlays decode");
//! let img = image::open("avatar.png").unwrap().to_rgba8();
//! let icon = Compositor::default()
//!     .composite(&img, overlays.get(1))
//!     .expect("image must be square");
//! icon.save("avatar_icon.png").unwrap();
//! ```
//!
//! # Server
//!
//! With the `server` feature, [`server::serve`] exposes the pipeline over
//! HTTP: `POST /image` takes a `url` or an uploaded `file` plus an overlay
//! `idx` and answers with the PNG. Image acquisition suspends only the
//! request; compositing runs on a bounded worker pool.

#![deny(missing_docs)]

pub mod acquire;
pub mod blending;
mod compositor;
pub mod error;
pub mod files;
pub mod geometry;
pub mod overlays;
#[cfg(feature = "server")]
pub mod pool;
#[cfg(feature = "server")]
pub mod server;

pub use compositor::{encode_png, Compositor};
pub use error::{Error, ErrorKind, Result};
pub use files::{
    default_output_path, directory_output_name, is_supported_image, save_png, IconRenderer,
    RenderResult,
};
pub use geometry::MaskGeometry;
pub use overlays::{parse_index, OverlayLibrary};
