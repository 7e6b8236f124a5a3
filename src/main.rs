//! Pivot Rig CLI
//!
//! Usage:
//!   pivot-rig [OPTIONS] <SCENE>
//!
//! Options:
//!   -c, --config <FILE>  Rig configuration (TOML format)
//!   -v, --verbose        More log output (repeat for debug)
//!   --list               Print objects that own anchor markers and exit
//!   -h, --help           Print help

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use pivot_rig::script::{run_actions, summarize, ScriptFile};
use pivot_rig::{RigConfig, RigSession, SceneGraph};

#[derive(Parser)]
#[command(name = "pivot-rig")]
#[command(about = "Pivot offset neutralization and retargeting for rigged scenes")]
struct Cli {
    /// Scene file (TOML format)
    scene: PathBuf,

    /// Rig configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Print objects that own anchor markers and exit
    #[arg(long)]
    list: bool,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already set");
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => match RigConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => RigConfig::default(),
    };

    let script = match ScriptFile::from_file(&cli.scene) {
        Ok(script) => script,
        Err(e) => {
            eprintln!("Error reading scene '{}': {}", cli.scene.display(), e);
            std::process::exit(1);
        }
    };

    let mut scene = match script.build_scene() {
        Ok(scene) => scene,
        Err(e) => {
            eprintln!("Error building scene '{}': {}", cli.scene.display(), e);
            std::process::exit(1);
        }
    };

    let mut session = RigSession::attach(&scene, config);

    if cli.list {
        for object in session.tracked_objects(&scene) {
            if let Ok(name) = scene.name(object) {
                println!("{}", name);
            }
        }
        return;
    }

    for outcome in run_actions(&mut scene, &mut session, &script.actions) {
        println!("{}", outcome.line());
    }
    println!();
    println!("{}", summarize(&scene, &session));
}
