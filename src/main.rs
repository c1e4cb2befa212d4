//! Rekindle CLI - Command-line tool for inspecting and rebuilding REFF files.
//!
//! This is the main entry point for the rekindle command-line application.

use std::fs::{self, File};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use memmap2::Mmap;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use rekindle::prelude::*;
use rekindle::reff::is_reff;

/// Rekindle - REFF particle-effect container tool
#[derive(Parser)]
#[command(name = "rekindle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a container summary
    Info {
        /// Input REFF file
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Print the full node tree with field values
    Tree {
        /// Input REFF file
        #[arg(short, long)]
        input: PathBuf,

        /// Emit JSON instead of an indented listing
        #[arg(long)]
        json: bool,
    },

    /// Parse a container and write it back out
    Rebuild {
        /// Input REFF file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Re-derive every node instead of copying untouched ones
        #[arg(long, env = "REKINDLE_FORCE")]
        force: bool,
    },

    /// Round-trip every REFF file found and report mismatches
    Verify {
        /// Files or directories to scan
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Only check file names matching this glob pattern
        #[arg(short, long)]
        filter: Option<String>,

        /// Re-derive every node instead of copying untouched ones
        #[arg(long, env = "REKINDLE_FORCE")]
        force: bool,
    },

    /// Set a field on the node at a child-index path
    Set {
        /// Input REFF file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Child indices from the root, e.g. `0.2.1` (empty for the root)
        #[arg(short, long, default_value = "")]
        path: String,

        /// Field name
        #[arg(long)]
        field: String,

        /// New value, parsed according to the field's current type
        #[arg(long)]
        value: String,
    },

    /// Rename the container or an entry
    Rename {
        /// Input REFF file
        #[arg(short, long)]
        input: PathBuf,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Child indices from the root (empty for the container)
        #[arg(short, long, default_value = "")]
        path: String,

        /// New name
        #[arg(short, long)]
        name: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { input } => {
            cmd_info(&input)?;
        }
        Commands::Tree { input, json } => {
            cmd_tree(&input, json)?;
        }
        Commands::Rebuild { input, output, force } => {
            cmd_rebuild(&input, &output, force)?;
        }
        Commands::Verify { paths, filter, force } => {
            cmd_verify(&paths, filter.as_deref(), force)?;
        }
        Commands::Set {
            input,
            output,
            path,
            field,
            value,
        } => {
            cmd_set(&input, &output, &path, &field, &value)?;
        }
        Commands::Rename {
            input,
            output,
            path,
            name,
        } => {
            cmd_rename(&input, &output, &path, &name)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_env("REKINDLE_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .compact()
        .init();
}

/// Map a file read-only.
fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    // SAFETY: the mapping is only read, and the tool never writes to its inputs.
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map {}", path.display()))?;
    Ok(mmap)
}

/// Parse a dotted child-index path such as `0.2.1`.
fn parse_path(path: &str) -> Result<Vec<usize>> {
    if path.trim().is_empty() {
        return Ok(Vec::new());
    }
    path.split('.')
        .map(|part| {
            part.trim()
                .parse()
                .with_context(|| format!("Invalid path component {:?}", part))
        })
        .collect()
}

fn progress_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
        .progress_chars("#>-"))
}

fn cmd_info(input: &Path) -> Result<()> {
    let data = map_file(input)?;
    let start = Instant::now();
    let reff = Reff::parse(&data).context("Failed to parse REFF container")?;

    println!("{}", input.display());
    println!("  Name:       {}", reff.name());
    println!("  Version:    {:#06x}", reff.version());
    println!("  Byte order: {:#06x}", reff.byte_order());
    println!("  Size:       {} bytes", data.len());
    println!(
        "  Table:      {} bytes at {:#x}",
        reff.table_length(),
        reff.table_offset()
    );
    if !reff.trailing().is_empty() {
        println!("  Trailing:   {} bytes", reff.trailing().len());
    }
    println!("  Entries:    {}", reff.entries().len());

    for entry in reff.entries() {
        let size = entry.state().source().map_or(0, |region| region.len());
        let tracks = entry.animations().map_or(0, |list| list.track_count());
        let textures: Vec<&str> = entry
            .particle()
            .map(|particle| (0..3).filter_map(|slot| particle.texture(slot)).collect())
            .unwrap_or_default();

        println!(
            "    {:<32} {:>8} bytes  {:>3} tracks  [{}]",
            entry.name(),
            size,
            tracks,
            textures.join(", ")
        );
    }

    debug!(elapsed = ?start.elapsed(), "parsed");
    Ok(())
}

fn print_node(node: &dyn TreeNode, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{}{} ({})", indent, node.name(), node.kind());
    for field in node.fields() {
        match field.offset {
            Some(offset) => println!(
                "{}  {:#06x} {:<32} = {}",
                indent, offset, field.name, field.value
            ),
            None => println!("{}         {:<32} = {}", indent, field.name, field.value),
        }
    }
    for child in node.children() {
        print_node(child, depth + 1);
    }
}

fn cmd_tree(input: &Path, json: bool) -> Result<()> {
    let data = map_file(input)?;
    let reff = Reff::parse(&data).context("Failed to parse REFF container")?;

    if json {
        let snapshot = Snapshot::capture(&reff);
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_node(&reff, 0);
    }

    Ok(())
}

fn write_output(reff: &mut Reff<'_>, output: &Path, force: bool) -> Result<usize> {
    let options = BuildOptions { force };
    let bytes = reff
        .to_bytes_with(&options)
        .context("Failed to rebuild REFF container")?;
    fs::write(output, &bytes).context("Failed to write output file")?;
    Ok(bytes.len())
}

fn cmd_rebuild(input: &Path, output: &Path, force: bool) -> Result<()> {
    println!("Rebuilding: {} -> {}", input.display(), output.display());

    let data = map_file(input)?;
    let mut reff = Reff::parse(&data).context("Failed to parse REFF container")?;
    let written = write_output(&mut reff, output, force)?;

    if written != data.len() {
        warn!(
            input = data.len(),
            output = written,
            "rebuilt size differs from input"
        );
    }
    println!("Wrote {} bytes", written);

    Ok(())
}

/// Result of round-tripping one file.
enum Outcome {
    Identical,
    Different { first: usize, input: usize, output: usize },
    Skipped,
}

fn verify_file(path: &Path, force: bool) -> Result<Outcome> {
    let data = map_file(path)?;
    if !is_reff(&data) {
        return Ok(Outcome::Skipped);
    }

    let mut reff = Reff::parse(&data)?;
    let rebuilt = reff.to_bytes_with(&BuildOptions { force })?;

    if rebuilt[..] == data[..] {
        return Ok(Outcome::Identical);
    }
    let first = rebuilt
        .iter()
        .zip(data.iter())
        .position(|(a, b)| a != b)
        .unwrap_or_else(|| rebuilt.len().min(data.len()));
    Ok(Outcome::Different {
        first,
        input: data.len(),
        output: rebuilt.len(),
    })
}

fn collect_files(paths: &[PathBuf], filter: Option<&str>) -> Result<Vec<PathBuf>> {
    let pattern = filter
        .map(glob::Pattern::new)
        .transpose()
        .context("Invalid filter pattern")?;

    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if pattern.as_ref().map_or(true, |p| p.matches(&name)) {
                files.push(entry.into_path());
            }
        }
    }
    Ok(files)
}

fn cmd_verify(paths: &[PathBuf], filter: Option<&str>, force: bool) -> Result<()> {
    let files = collect_files(paths, filter)?;
    println!("Verifying {} files...", files.len());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(progress_style()?);

    let start = Instant::now();
    let results: Vec<(PathBuf, Result<Outcome>)> = files
        .into_par_iter()
        .map(|path| {
            let outcome = verify_file(&path, force);
            pb.inc(1);
            (path, outcome)
        })
        .collect();
    pb.finish_with_message("Done");

    let mut identical = 0;
    let mut skipped = 0;
    let mut failures = 0;
    for (path, outcome) in &results {
        match outcome {
            Ok(Outcome::Identical) => identical += 1,
            Ok(Outcome::Skipped) => skipped += 1,
            Ok(Outcome::Different { first, input, output }) => {
                failures += 1;
                println!(
                    "MISMATCH {}: first difference at {:#x} ({} -> {} bytes)",
                    path.display(),
                    first,
                    input,
                    output
                );
            }
            Err(e) => {
                failures += 1;
                println!("ERROR    {}: {:#}", path.display(), e);
            }
        }
    }

    info!(elapsed = ?start.elapsed(), "verification finished");
    println!(
        "{} identical, {} failed, {} skipped in {:?}",
        identical,
        failures,
        skipped,
        start.elapsed()
    );

    if failures > 0 {
        bail!("{} files did not round-trip", failures);
    }
    Ok(())
}

fn cmd_set(input: &Path, output: &Path, path: &str, field: &str, value: &str) -> Result<()> {
    let indices = parse_path(path)?;
    let data = map_file(input)?;
    let mut reff = Reff::parse(&data).context("Failed to parse REFF container")?;

    let node = rekindle::node::node_at_mut(&mut reff, &indices)
        .with_context(|| format!("No node at path {:?}", path))?;
    let current = node
        .field(field)
        .with_context(|| format!("{} has no field {:?}", node.kind(), field))?;
    let parsed = current.parse_like(value)?;
    println!("{}.{}: {} -> {}", node.name(), field, current, parsed);
    node.set_field(field, parsed)?;

    let written = write_output(&mut reff, output, false)?;
    println!("Wrote {} bytes to {}", written, output.display());

    Ok(())
}

fn cmd_rename(input: &Path, output: &Path, path: &str, name: &str) -> Result<()> {
    let indices = parse_path(path)?;
    let data = map_file(input)?;
    let mut reff = Reff::parse(&data).context("Failed to parse REFF container")?;

    let node = rekindle::node::node_at_mut(&mut reff, &indices)
        .with_context(|| format!("No node at path {:?}", path))?;
    let old = node.name();
    node.rename(name)
        .with_context(|| format!("Cannot rename {}", node.kind()))?;
    println!("Renamed {:?} -> {:?}", old, name);

    let written = write_output(&mut reff, output, false)?;
    println!("Wrote {} bytes to {}", written, output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("").unwrap(), Vec::<usize>::new());
        assert_eq!(parse_path("0.2.1").unwrap(), vec![0, 2, 1]);
        assert!(parse_path("0.x").is_err());
    }
}
