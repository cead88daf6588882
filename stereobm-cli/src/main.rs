use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use stereobm::io::{load_gray_image, save_disparity_image};
use stereobm::{
    filtered_value, DisparityFormat, KernelChoice, PreFilterKind, StereoConfig, StereoMatcher,
};
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "Stereo block matching CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum PreFilterConfig {
    NormalizedResponse,
    XSobel,
}

impl From<PreFilterConfig> for PreFilterKind {
    fn from(value: PreFilterConfig) -> Self {
        match value {
            PreFilterConfig::NormalizedResponse => PreFilterKind::NormalizedResponse,
            PreFilterConfig::XSobel => PreFilterKind::XSobel,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum KernelConfig {
    Auto,
    Scalar,
    Simd,
}

impl From<KernelConfig> for KernelChoice {
    fn from(value: KernelConfig) -> Self {
        match value {
            KernelConfig::Auto => KernelChoice::Auto,
            KernelConfig::Scalar => KernelChoice::Scalar,
            KernelConfig::Simd => KernelChoice::Simd,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct StereoConfigJson {
    prefilter: PreFilterConfig,
    prefilter_size: usize,
    prefilter_cap: u8,
    sad_window_size: usize,
    min_disparity: i32,
    num_disparities: usize,
    texture_threshold: i32,
    uniqueness_ratio: i32,
    speckle_window_size: usize,
    speckle_range: i32,
    try_smaller_windows: bool,
    kernel: KernelConfig,
    workers: usize,
}

impl Default for StereoConfigJson {
    fn default() -> Self {
        let cfg = StereoConfig::default();
        Self {
            prefilter: PreFilterConfig::XSobel,
            prefilter_size: cfg.prefilter_size,
            prefilter_cap: cfg.prefilter_cap,
            sad_window_size: cfg.sad_window_size,
            min_disparity: cfg.min_disparity,
            num_disparities: cfg.num_disparities,
            texture_threshold: cfg.texture_threshold,
            uniqueness_ratio: cfg.uniqueness_ratio,
            speckle_window_size: cfg.speckle_window_size,
            speckle_range: cfg.speckle_range,
            try_smaller_windows: cfg.try_smaller_windows,
            kernel: KernelConfig::Auto,
            workers: cfg.workers,
        }
    }
}

impl From<StereoConfigJson> for StereoConfig {
    fn from(value: StereoConfigJson) -> Self {
        Self {
            prefilter: value.prefilter.into(),
            prefilter_size: value.prefilter_size,
            prefilter_cap: value.prefilter_cap,
            sad_window_size: value.sad_window_size,
            min_disparity: value.min_disparity,
            num_disparities: value.num_disparities,
            texture_threshold: value.texture_threshold,
            uniqueness_ratio: value.uniqueness_ratio,
            speckle_window_size: value.speckle_window_size,
            speckle_range: value.speckle_range,
            try_smaller_windows: value.try_smaller_windows,
            kernel: value.kernel.into(),
            workers: value.workers,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    left_path: String,
    right_path: String,
    /// Optional 8-bit PNG visualization of the disparity map.
    output_path: Option<String>,
    stereo: StereoConfigJson,
}

#[derive(Debug, Serialize)]
struct Summary {
    width: usize,
    height: usize,
    valid_pixels: usize,
    min_disparity: Option<f32>,
    max_disparity: Option<f32>,
    elapsed_ms: f64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("stereobm=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.left_path.is_empty() || config.right_path.is_empty() {
        return Err("left_path and right_path must be set in the config".into());
    }

    let left = load_gray_image(&config.left_path)?;
    let right = load_gray_image(&config.right_path)?;
    let stereo: StereoConfig = config.stereo.into();
    let min_disparity = stereo.min_disparity;
    let num_disparities = stereo.num_disparities;
    let mut matcher = StereoMatcher::new(stereo)?;

    let start = Instant::now();
    let disp = matcher.compute(left.view(), right.view(), DisparityFormat::Fixed16)?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1e3;
    let disp = disp.as_fixed().ok_or("matcher returned a non-fixed map")?;

    let bad = filtered_value(min_disparity);
    let valid: Vec<i16> = disp.data().iter().copied().filter(|&v| v != bad).collect();
    let to_px = |v: i16| f32::from(v) / 16.0;
    let summary = Summary {
        width: disp.width(),
        height: disp.height(),
        valid_pixels: valid.len(),
        min_disparity: valid.iter().copied().min().map(to_px),
        max_disparity: valid.iter().copied().max().map(to_px),
        elapsed_ms,
    };

    if let Some(path) = &config.output_path {
        save_disparity_image(disp.view(), min_disparity, num_disparities, path)?;
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
