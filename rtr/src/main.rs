//! # rtr
//!
//! Renders a scene file in a window, headless to a PNG, or exports its distance field.
//!
//! Window hotkeys: `R` render, `E` real time, `G` regenerate from disk, `X` export the
//! distance field, `C` cancel the export, `Esc` cancel the session.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use render::Viewport;
use rtr::app::{self, Options};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Scene file to render
    scene: PathBuf,

    /// Samples accumulated by an offline render
    #[arg(long)]
    samples: Option<u32>,

    /// Redraw continuously instead of accumulating
    #[arg(long)]
    realtime: bool,

    /// Verbose logging
    #[arg(long)]
    debug: bool,

    /// Render offscreen and save a PNG
    #[arg(long)]
    headless: bool,

    /// PNG file or directory for headless renders
    #[arg(long, short)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 960)]
    width: u32,

    #[arg(long, default_value_t = 540)]
    height: u32,

    /// Write the scene's distance field to this JSON file and exit
    #[arg(long, value_name = "PATH")]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::INFO })
        .init();

    app::run(&Options {
        scene: cli.scene,
        samples: cli.samples,
        real_time: cli.realtime,
        headless: cli.headless,
        output: cli.output,
        viewport: Viewport::new(cli.width.max(1), cli.height.max(1)),
        export: cli.export,
    })
}
