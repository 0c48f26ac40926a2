#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use segtool_inference::engine::inference_engine::ExecutionProvider;

mod app;
mod worker;

use app::SegToolApp;

/// Manually assisted segmentation of volumetric medical images with a
/// Segment-Anything backend.
#[derive(Parser, Debug)]
#[command(name = "segtool", version)]
struct Cli {
    /// Directory holding image_encoder.onnx and image_decoder.onnx
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Execution device: cpu, cuda or cuda:<id>
    #[arg(long, default_value = "cuda")]
    device: String,

    /// NIfTI volume to preload into the left (X-ray) panel
    #[arg(long)]
    left: Option<PathBuf>,

    /// NIfTI volume to preload into the right (MRI) panel
    #[arg(long)]
    right: Option<PathBuf>,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_device(device: &str) -> Result<ExecutionProvider> {
    match device {
        "cpu" => Ok(ExecutionProvider::Cpu),
        "cuda" => Ok(ExecutionProvider::Cuda(0)),
        other => {
            if let Some(id) = other.strip_prefix("cuda:") {
                let id = id
                    .parse::<i32>()
                    .map_err(|_| anyhow::anyhow!("invalid CUDA device id in `{other}`"))?;
                Ok(ExecutionProvider::Cuda(id))
            } else {
                bail!("unknown device `{other}`; expected cpu, cuda or cuda:<id>")
            }
        }
    }
}

/// A missing display server would otherwise surface as a winit panic deep
/// inside eframe; fail early with something actionable instead. Common
/// when launched over SSH.
#[cfg(target_os = "linux")]
fn preflight_display() -> Result<()> {
    let has_display = std::env::var_os("DISPLAY")
        .map(|v| !v.is_empty())
        .unwrap_or(false)
        || std::env::var_os("WAYLAND_DISPLAY")
            .map(|v| !v.is_empty())
            .unwrap_or(false);
    if !has_display {
        bail!(
            "no display environment (DISPLAY / WAYLAND_DISPLAY are empty).\n\
             Run segtool on a machine with a desktop session, or forward X11 \
             (ssh -X) when working remotely."
        );
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn preflight_display() -> Result<()> {
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .init();

    preflight_display()?;

    let executor = parse_device(&cli.device)?;
    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1400.0, 800.0])
            .with_title("segtool"),
        ..Default::default()
    };

    eframe::run_native(
        "segtool",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(SegToolApp::new(
                cli.model_dir,
                executor,
                cli.left,
                cli.right,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("failed to start GUI: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_strings_parse() {
        assert_eq!(parse_device("cpu").unwrap(), ExecutionProvider::Cpu);
        assert_eq!(parse_device("cuda").unwrap(), ExecutionProvider::Cuda(0));
        assert_eq!(parse_device("cuda:2").unwrap(), ExecutionProvider::Cuda(2));
        assert!(parse_device("tpu").is_err());
        assert!(parse_device("cuda:x").is_err());
    }
}
