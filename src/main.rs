//! LED Matrix Image Viewer
//!
//! Shows images and animations on the LED matrix with drift-free timing,
//! or pre-renders them into a `.stream` file for later replay.
//!
//! ## Flow
//! 1. Open the matrix (fatal if unavailable)
//! 2. Decode and scale every input once, into memory
//! 3. Install the Ctrl+C / SIGTERM handler
//! 4. Cycle through the sources until interrupted, then blank the panel
//!
//! ## Usage
//! ```sh
//! sudo ./target/release/led-image-viewer -w 3 -l 2 media/
//! ./target/release/led-image-viewer -O show.stream media/nyan.gif
//! sudo ./target/release/led-image-viewer show.stream
//! ```

use clap::Parser;
use led_image_viewer::PanelConfig;
use led_image_viewer::error::ViewerError;
use led_image_viewer::media::{expand_inputs, same_file};
use led_image_viewer::normalize::StoreOptions;
use led_image_viewer::params::{PlaybackParams, Playlist, RawParams};
use led_image_viewer::source::{LoadOptions, encode_into};
use led_image_viewer::stream::FrameStream;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Show images and animations on an RGB LED matrix
#[derive(Parser)]
#[command(name = "led-image-viewer")]
#[command(about = "Show images and animations on an RGB LED matrix")]
#[command(version)]
struct Args {
    /// Images, animations, `.stream` files, or directories of them
    #[arg(required_unless_present = "playlist")]
    inputs: Vec<PathBuf>,

    /// JSON playlist with per-source timing (played before positional inputs)
    #[arg(long)]
    playlist: Option<PathBuf>,

    /// Number of rows on the LED panel
    #[arg(long, default_value = "64")]
    rows: u32,

    /// Number of columns on the LED panel
    #[arg(long, default_value = "64")]
    cols: u32,

    /// Still images: seconds to show each image
    #[arg(short = 'w', long, default_value = "1.5")]
    wait: f32,

    /// Animations: stop after this many seconds (default: no limit)
    #[arg(short = 't', long)]
    duration: Option<f32>,

    /// Animations: number of full cycles, -1 for unlimited
    #[arg(short = 'l', long, default_value_t = -1, allow_negative_numbers = true)]
    loops: i64,

    /// Animations: fixed delay between frames in ms, -1 to use the file's delays
    #[arg(short = 'D', long = "anim-delay", default_value_t = -1, allow_negative_numbers = true)]
    anim_delay_ms: i64,

    /// Animations: only swap on every Nth panel refresh
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    vsync_multiple: u32,

    /// Center images on the panel
    #[arg(short = 'C', long)]
    center: bool,

    /// Keep aspect ratio and fit the panel width (for vertical scrolling)
    #[arg(long)]
    fill_width: bool,

    /// Keep aspect ratio and fit the panel height (for horizontal scrolling)
    #[arg(long)]
    fill_height: bool,

    /// Brightness (0-100) baked into the frames
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u8).range(0..=100))]
    brightness: u8,

    /// Write all frames to this stream file instead of the matrix (no root needed)
    #[arg(short = 'O', long)]
    output: Option<PathBuf>,

    /// Play the list once instead of cycling until interrupted
    #[arg(long)]
    once: bool,

    /// Hardware GPIO mapping
    #[arg(long, default_value = "adafruit-hat")]
    gpio_mapping: String,

    /// GPIO slowdown (Pi Zero 2 W needs 2)
    #[arg(long, default_value_t = 2)]
    gpio_slowdown: u32,
}

impl Args {
    fn raw_params(&self) -> RawParams {
        let seconds_to_ms = |s: f32| (s * 1000.0).round() as i64;
        RawParams {
            duration_ms: self.duration.map_or(-1, seconds_to_ms),
            wait_ms: seconds_to_ms(self.wait),
            anim_delay_ms: self.anim_delay_ms,
            loops: self.loops,
            vsync_multiple: self.vsync_multiple,
        }
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            fill_width: self.fill_width,
            fill_height: self.fill_height,
            store: StoreOptions {
                center: self.center,
                brightness: self.brightness,
            },
            ..LoadOptions::new(PanelConfig::new(self.rows, self.cols))
        }
    }

    /// Every input paired with the timing it plays with.
    fn resolve_inputs(&self) -> Result<Vec<(PathBuf, PlaybackParams)>, ViewerError> {
        let defaults = self.raw_params();
        let mut inputs = match &self.playlist {
            Some(path) => Playlist::from_file(path)?.resolve(defaults),
            None => Vec::new(),
        };
        let params: PlaybackParams = defaults.into();
        inputs.extend(
            expand_inputs(&self.inputs)
                .into_iter()
                .map(|path| (path, params)),
        );
        Ok(inputs)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_ansi(false) // Disable ANSI color codes for systemd/journald
        .compact()
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), ViewerError> {
    let options = args.load_options();
    tracing::info!("LED Image Viewer v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Panel: {}x{}", options.panel.cols, options.panel.rows);

    let inputs = args.resolve_inputs()?;
    if inputs.is_empty() {
        return Err(ViewerError::NoSources);
    }

    match &args.output {
        Some(output) => write_stream(output, &inputs, &options),
        None => display(args, &inputs, &options),
    }
}

/// Encode every input into one stream file.
fn write_stream(
    output: &Path,
    inputs: &[(PathBuf, PlaybackParams)],
    options: &LoadOptions,
) -> Result<(), ViewerError> {
    // Creating the output truncates it, so it must not be read back as input.
    if let Some((path, _)) = inputs.iter().find(|(path, _)| same_file(path, output)) {
        return Err(ViewerError::OutputIsInput(path.clone()));
    }

    let mut out = FrameStream::create_file(output, options.panel)?;
    let mut frames = 0;
    let mut written = 0;

    for (path, params) in inputs {
        match encode_into(path, params, options, &mut out) {
            Ok(0) => tracing::warn!("{} skipped: no frames", path.display()),
            Ok(n) => {
                tracing::info!("{}: {} frames", path.display(), n);
                frames += n;
                written += 1;
            }
            Err(e) => tracing::warn!("{} skipped: {}", path.display(), e),
        }
    }

    if written == 0 {
        return Err(ViewerError::NoSources);
    }
    tracing::info!(
        "Wrote {} frames from {} inputs to {}",
        frames,
        written,
        output.display()
    );
    Ok(())
}

#[cfg(feature = "hardware")]
fn display(
    args: &Args,
    inputs: &[(PathBuf, PlaybackParams)],
    options: &LoadOptions,
) -> Result<(), ViewerError> {
    use led_image_viewer::display::DisplaySurface;
    use led_image_viewer::matrix::{MatrixConfig, MatrixDisplay};
    use led_image_viewer::playback::{Player, SystemClock};
    use led_image_viewer::setup_signal_handler;
    use led_image_viewer::source::load_all;
    use std::time::Instant;

    let config = MatrixConfig {
        hardware_mapping: args.gpio_mapping.clone(),
        gpio_slowdown: args.gpio_slowdown,
        ..MatrixConfig::new(options.panel)
    };
    let mut matrix = MatrixDisplay::open(&config)?;

    // Decode everything up front: the Pi is too slow to do it between sources.
    let start_load = Instant::now();
    let mut sources = load_all(inputs, options);
    tracing::info!(
        "Loading took {:.3}s; now: Display.",
        start_load.elapsed().as_secs_f64()
    );

    if sources.is_empty() {
        return Err(ViewerError::NoSources);
    }

    let cancel = setup_signal_handler()?;
    Player::new(&mut matrix, SystemClock::new(), cancel.clone()).play_all(&mut sources, !args.once);

    if cancel.is_cancelled() {
        tracing::info!("Caught signal. Exiting.");
    }
    matrix.blank();
    Ok(())
}

#[cfg(not(feature = "hardware"))]
fn display(
    _args: &Args,
    _inputs: &[(PathBuf, PlaybackParams)],
    _options: &LoadOptions,
) -> Result<(), ViewerError> {
    Err(ViewerError::HardwareUnavailable(
        "built without the 'hardware' feature; use --output to write a stream file".to_string(),
    ))
}
