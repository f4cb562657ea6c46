//! Command-line interface implementation

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::capture::{CaptureSession, ConsoleMessages};
use crate::export::resolve_output_dir;
use crate::scene::Scene;
use crate::texture::TextureStore;

const EXIT_SUCCESS: u8 = 0;
const EXIT_ERROR: u8 = 1;
const EXIT_INVALID_ARGS: u8 = 2;

/// thingshot - capture simulation-game entities as PNG images
#[derive(Parser)]
#[command(name = "thingshot")]
#[command(about = "Render the entities on a scene cell off-screen and export them as PNGs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture every entity occupying a scene cell
    Capture {
        /// Scene JSON file describing entities and their visual state
        scene: PathBuf,

        /// Target cell as X,Y
        #[arg(long, value_parser = parse_cell)]
        cell: (i32, i32),

        /// Output directory.
        /// If omitted: the desktop, falling back to ./captures
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Root directory for texture paths (default: the scene file's directory)
        #[arg(long)]
        assets: Option<PathBuf>,
    },
}

fn parse_cell(s: &str) -> Result<(i32, i32), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x = x.trim().parse().map_err(|_| format!("invalid X '{x}'"))?;
    let y = y.trim().parse().map_err(|_| format!("invalid Y '{y}'"))?;
    Ok((x, y))
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Capture {
            scene,
            cell,
            output,
            assets,
        } => run_capture(&scene, cell, output.as_deref(), assets.as_deref()),
    }
}

fn run_capture(
    scene_path: &Path,
    cell: (i32, i32),
    output: Option<&Path>,
    assets: Option<&Path>,
) -> ExitCode {
    let scene = match Scene::load(scene_path) {
        Ok(scene) => scene,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_INVALID_ARGS);
        }
    };

    let out_dir = resolve_output_dir(output);
    if let Err(e) = std::fs::create_dir_all(&out_dir) {
        eprintln!(
            "Error: cannot create output directory '{}': {e}",
            out_dir.display()
        );
        return ExitCode::from(EXIT_ERROR);
    }

    let assets_root = assets
        .map(Path::to_path_buf)
        .or_else(|| scene_path.parent().map(Path::to_path_buf))
        .unwrap_or_default();

    let cell = [cell.0, cell.1];
    let total = scene.entities_at(cell).count();
    if total == 0 {
        println!("No entities at cell {},{}", cell[0], cell[1]);
        return ExitCode::from(EXIT_SUCCESS);
    }

    let mut session = CaptureSession::new(TextureStore::new(assets_root));
    let mut sink = ConsoleMessages;
    let saved = session.capture_cell(&scene, cell, &out_dir, &mut sink);

    println!(
        "Captured {saved}/{total} entities at cell {},{} into {}",
        cell[0],
        cell[1],
        out_dir.display()
    );
    ExitCode::from(EXIT_SUCCESS)
}
