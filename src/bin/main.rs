use clap::{Parser, Subcommand};
use ink2tex::config::{EM_BASELINE_RATIO, EM_HEIGHT};
use ink2tex::{HeightGrid, Session, Store};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ink2tex", about = "Pen strokes to structured LaTeX math")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded session against a store and print the LaTeX
    Replay {
        /// Session file: a JSON array of shapes, each an array of [x, y]
        #[arg(short, long)]
        session: PathBuf,

        /// Reference store JSON
        #[arg(short = 'd', long)]
        store: PathBuf,

        /// Baseline of the writing area (defaults to the EM baseline)
        #[arg(long)]
        baseline: Option<f64>,

        /// Height of the writing area (defaults to one EM)
        #[arg(long)]
        height: Option<f64>,
    },

    /// Inspect a store: list its runes and what is still missing
    Store {
        /// Reference store JSON
        #[arg(short = 'd', long)]
        store: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Replay {
            session,
            store,
            baseline,
            height,
        } => {
            let store = Store::load(&store)?;
            let height = height.unwrap_or(EM_HEIGHT);
            let grid = HeightGrid {
                y_min: 0.0,
                y_max: height,
                baseline: baseline.unwrap_or(height * EM_BASELINE_RATIO),
            };
            let mut editor = Session::new(store, grid);

            let data = std::fs::read_to_string(&session)?;
            let shapes: Vec<Vec<[f64; 2]>> = serde_json::from_str(&data)?;
            eprintln!("  Session     {} shapes", shapes.len());

            for shape in &shapes {
                editor.start_shape();
                for &[x, y] in shape {
                    editor.add_point(x, y);
                }
                match editor.end_shape() {
                    Some(r) if r != '\0' => eprintln!("  Recognized  {r:?}"),
                    Some(_) => eprintln!("  Recognized  nothing"),
                    None => {}
                }
            }

            println!("{}", editor.latex());
        }

        Command::Store { store } => {
            let store = Store::load(&store)?;
            eprintln!("  Store       {} entries", store.len());
            for entry in store.entries() {
                let strokes = entry.footprint.strokes.len();
                let curves: usize = entry.footprint.strokes.iter().map(|s| s.curves.len()).sum();
                println!("{:?}  {} strokes, {} curves", entry.r, strokes, curves);
            }
            let missing = store.missing_runes();
            if !missing.is_empty() {
                eprintln!("  Missing     {}", missing.iter().collect::<String>());
            }
        }
    }

    Ok(())
}
