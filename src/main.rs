use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use easel::camera::Camera;
use easel::config::SurfaceConfig;
use easel::persist::{FsResourceLoader, load_scene};
use easel::{EaselError, Surface};

#[derive(Parser, Debug)]
#[command(name = "easel", about = "Scene engine tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a scene document to a PNG file.
    Render(RenderCommand),
}

#[derive(Args, Debug)]
struct RenderCommand {
    /// Scene document (JSON). Image sources resolve relative to its directory.
    scene: PathBuf,

    /// Output PNG path.
    #[arg(short, long, env = "EASEL_OUTPUT", default_value = "scene.png")]
    output: PathBuf,

    #[arg(long, env = "EASEL_WIDTH", default_value_t = 800)]
    width: u32,

    #[arg(long, env = "EASEL_HEIGHT", default_value_t = 600)]
    height: u32,

    #[arg(long, env = "EASEL_ZOOM", default_value_t = 1.0)]
    zoom: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pan_x: f64,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pan_y: f64,
}

#[tokio::main]
async fn main() -> Result<(), EaselError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Render(cmd) => run_render(cmd).await,
    }
}

async fn run_render(cmd: RenderCommand) -> Result<(), EaselError> {
    let root = cmd.scene.parent().map(PathBuf::from).unwrap_or_default();
    let scene = load_scene(&cmd.scene, &FsResourceLoader::new(root)).await?;
    tracing::info!(shapes = scene.len(), path = %cmd.scene.display(), "scene loaded");

    let mut surface = Surface::with_scene(scene, SurfaceConfig::from_env());
    surface.set_camera(Camera { pan_x: cmd.pan_x, pan_y: cmd.pan_y, zoom: cmd.zoom });
    let raster = surface.snapshot(cmd.width, cmd.height)?;
    tokio::fs::write(&cmd.output, raster.encode_png()?).await?;

    tracing::info!(width = cmd.width, height = cmd.height, output = %cmd.output.display(), "scene rendered");
    Ok(())
}
