//! Layered Render CLI
//!
//! Usage:
//!   layered-render [OPTIONS] <DIR> [NAME]
//!
//! Without NAME, lists every template found below DIR. With NAME, renders
//! that template to stdout.
//!
//! Options:
//!   -d, --data <FILE>    JSON file used as render data
//!   -c, --config <FILE>  Loader configuration (TOML format)
//!   --skip-broken        Leave templates that fail to compose out of the registry
//!   --show-source        Print the composed source of NAME instead of rendering
//!   -v, --verbose        Log composition decisions to stderr
//!   -h, --help           Print help

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use layered_render::{
    execute_by_name, load_all_with_config, FailurePolicy, FuncMap, LoaderConfig,
    RenderError, TemplateRegistry,
};

#[derive(Parser)]
#[command(name = "layered-render")]
#[command(about = "Compose and render inheriting templates from a directory")]
struct Cli {
    /// Template directory
    dir: PathBuf,

    /// Logical name of the template to render (e.g. pages/home.html)
    name: Option<String>,

    /// JSON file used as render data
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Loader configuration file (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip templates that fail to compose instead of aborting
    #[arg(long)]
    skip_broken: bool,

    /// Print the composed source of each unit instead of rendering
    #[arg(long, requires = "name")]
    show_source: bool,

    /// Log composition decisions to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => match LoaderConfig::from_file(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => LoaderConfig::default(),
    };
    if cli.skip_broken {
        config = config.with_failure_policy(FailurePolicy::Skip);
    }

    let registry = match load_all_with_config(&cli.dir, &FuncMap::new(), &config) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {}", e.report());
            std::process::exit(1);
        }
    };

    let Some(name) = cli.name.as_deref() else {
        for name in registry.names() {
            println!("{}", name);
        }
        return;
    };

    if cli.show_source {
        show_source(&registry, name);
        return;
    }

    let data = match &cli.data {
        Some(path) => match read_data(path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Error reading data '{}': {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Value::Null,
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = execute_by_name(&registry, name, &data, &mut out)
        .and_then(|()| out.flush().map_err(RenderError::from));
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn read_data(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn show_source(registry: &TemplateRegistry, name: &str) {
    let Some(template) = registry.get(name) else {
        eprintln!("Error: template not found: {}", name);
        std::process::exit(1);
    };

    println!("# entry: {}", template.entry());
    for (block, id) in template.bindings().iter() {
        println!("# block {} -> {}", block, id);
    }
    for unit in template.units() {
        println!("==> {} <==", unit.name());
        println!("{}", unit.body);
    }
}
