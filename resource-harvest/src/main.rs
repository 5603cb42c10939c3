use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use clap::Parser;
use url::Url;

#[derive(Parser, Debug)]
#[command(
    name = "resource_harvest",
    version,
    about = "Print the src/href references of an HTML page as JSON"
)]
struct HarvestCli {
    /// Path to a saved HTML page, or '-' for stdin (default)
    input: Option<PathBuf>,

    /// URL the page was fetched from; relative references resolve against it
    #[arg(long)]
    base: Option<Url>,

    /// Print only the deduplicated path components
    #[arg(long, default_value_t = false)]
    paths: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{}: {err}", env!("CARGO_PKG_NAME"));
        process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let cli = HarvestCli::parse();

    let html = match cli.input.as_deref() {
        Some(path) if path.as_os_str() != "-" => read_file(path)?,
        _ => read_stdin()?,
    };

    let set = resource_harvest::extract_resources(&html, cli.base.as_ref());
    let json = if cli.paths {
        serde_json::to_string_pretty(&set.paths())
    } else {
        serde_json::to_string_pretty(&set)
    }
    .map_err(|err| format!("failed to serialize JSON: {err}"))?;
    println!("{json}");
    Ok(())
}

fn read_file(path: &std::path::Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|err| format!("failed to read '{}': {err}", path.display()))
}

fn read_stdin() -> Result<String, String> {
    let mut buf = String::new();
    io::stdin()
        .read_to_string(&mut buf)
        .map_err(|err| format!("failed to read stdin: {err}"))?;
    Ok(buf)
}
