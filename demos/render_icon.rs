//! Render an icon from a single square image.
//!
//! Usage:
//! ```sh
//! cargo run --example render_icon -- input.jpg output.png [idx]
//! ```

use std::env;
use std::process;

use afdicon::{Compositor, IconRenderer, OverlayLibrary};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <input> <output.png> [idx]", args[0]);
        process::exit(1);
    }

    let input = &args[1];
    let output = &args[2];
    let idx = match afdicon::parse_index(args.get(3).map(String::as_str)) {
        Ok(i) => i,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let overlays = OverlayLibrary::embedded().expect("failed to decode embedded overlays");
    let renderer = IconRenderer::new(Compositor::default(), overlays);
    let result = renderer.render_file(input.as_ref(), output.as_ref(), Some(idx));

    if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
