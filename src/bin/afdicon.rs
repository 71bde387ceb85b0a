use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use afdicon::server::{self, ServerConfig};
use afdicon::{
    default_output_path, Compositor, IconRenderer, MaskGeometry, OverlayLibrary, RenderResult,
};

#[derive(Parser)]
#[command(
    name = "afdicon",
    about = "Cut an icon notch out of square images and fill it with a badge",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: SocketAddr,

        /// Fetch remote images through this rewriting proxy
        /// (default: off, URLs are fetched directly)
        #[arg(long)]
        proxy: Option<url::Url>,

        /// Query parameter the proxy takes the target URL in
        #[arg(long, default_value = "url")]
        proxy_param: String,

        /// Directory with overlays 1.png .. 9.png (default: built-in art)
        #[arg(long)]
        overlay_dir: Option<PathBuf>,

        /// Compositing worker threads (0 = one per CPU)
        #[arg(long, default_value_t = 0)]
        workers: usize,

        /// Largest accepted upload or fetched remote image, in bytes
        #[arg(long, default_value_t = afdicon::acquire::DEFAULT_MAX_BYTES)]
        max_upload_bytes: usize,

        /// Notch geometry
        #[arg(long, value_enum, default_value_t = Geometry::Notch)]
        geometry: Geometry,
    },

    /// Render local files without starting a server
    Render {
        /// Input image file or directory
        input: PathBuf,

        /// Output file or directory (default: {name}_afdicon.png)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overlay index (1-9)
        #[arg(short, long, default_value = "1")]
        idx: String,

        /// Cut the notch but leave it empty
        #[arg(long)]
        no_overlay: bool,

        /// Directory with overlays 1.png .. 9.png (default: built-in art)
        #[arg(long)]
        overlay_dir: Option<PathBuf>,

        /// Notch geometry
        #[arg(long, value_enum, default_value_t = Geometry::Notch)]
        geometry: Geometry,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Geometry {
    /// 1024-unit notch cut at 4x
    Notch,
    /// 400-unit notch cut without supersampling
    Classic,
}

impl From<Geometry> for MaskGeometry {
    fn from(g: Geometry) -> Self {
        match g {
            Geometry::Notch => MaskGeometry::NOTCH,
            Geometry::Classic => MaskGeometry::CLASSIC,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let code = match cli.command {
        Command::Serve {
            bind,
            proxy,
            proxy_param,
            overlay_dir,
            workers,
            max_upload_bytes,
            geometry,
        } => serve(ServerConfig {
            bind,
            proxy,
            proxy_param,
            overlay_dir,
            workers,
            max_upload_bytes,
            geometry: geometry.into(),
        }),
        Command::Render {
            input,
            output,
            idx,
            no_overlay,
            overlay_dir,
            geometry,
        } => render(
            &input,
            output.as_deref(),
            &idx,
            no_overlay,
            overlay_dir.as_deref(),
            geometry.into(),
        ),
    };
    process::exit(code);
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("afdicon={default_level},{default_level}")));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn serve(config: ServerConfig) -> i32 {
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start runtime");
            return 1;
        }
    };
    match runtime.block_on(server::serve(config)) {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            1
        }
    }
}

fn render(
    input: &Path,
    output: Option<&Path>,
    idx: &str,
    no_overlay: bool,
    overlay_dir: Option<&Path>,
    geometry: MaskGeometry,
) -> i32 {
    let idx = if no_overlay {
        None
    } else {
        match afdicon::parse_index(Some(idx)) {
            Ok(i) => Some(i),
            Err(e) => {
                tracing::error!("{e}");
                return 1;
            }
        }
    };

    let overlays = match overlay_dir {
        Some(dir) => OverlayLibrary::from_dir(dir),
        None => OverlayLibrary::embedded(),
    };
    let overlays = match overlays {
        Ok(o) => o,
        Err(e) => {
            tracing::error!("Fatal: failed to load overlays: {e}");
            return 1;
        }
    };
    let renderer = IconRenderer::new(Compositor::new(geometry), overlays);

    if !input.exists() {
        tracing::error!("Input path does not exist: {}", input.display());
        return 1;
    }

    let results = if input.is_dir() {
        let Some(output_dir) = output else {
            tracing::error!("Output directory is required for batch rendering");
            return 1;
        };
        renderer.render_directory(input, output_dir, idx)
    } else {
        let output = output.map_or_else(|| default_output_path(input), Path::to_path_buf);
        vec![renderer.render_file(input, &output, idx)]
    };

    let failed = results.iter().filter(|r| !r.success).count();
    for r in &results {
        report(r);
    }
    if results.len() > 1 {
        tracing::info!(
            rendered = results.len() - failed,
            failed,
            total = results.len(),
            "summary"
        );
    }

    i32::from(failed > 0)
}

fn report(result: &RenderResult) {
    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );
    if result.success {
        tracing::info!("[OK] {filename}: {}", result.message);
    } else {
        tracing::error!("[FAIL] {filename}: {}", result.message);
    }
}
