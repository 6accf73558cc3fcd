use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use codec::CodecLimits;
use ghostsnap_tools::{
    build_plan, decode_packet_json, format_inspect, format_layout, inspect_packet, layout_report,
    load_descriptor,
};
use glob::Pattern;
use schema::RecordPlan;

#[derive(Parser)]
#[command(
    name = "ghostsnap-tools",
    version,
    about = "ghostsnap layout, inspection and decoding tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the change-mask layout a descriptor resolves to.
    Layout {
        /// Descriptor JSON.
        #[arg(long)]
        descriptor: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
    /// Inspect packet structure and sizes.
    Inspect {
        /// Path to the packet bytes, or a directory of packets.
        packet_path: PathBuf,
        /// Optional descriptor JSON for mask and element summaries.
        #[arg(long)]
        descriptor: Option<PathBuf>,
        /// Optional glob filter when inspecting a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Sort inspected packets.
        #[arg(long, value_enum)]
        sort: Option<InspectSort>,
        /// Limit the number of inspected packets (after sorting).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Decode a snapshot or command packet into JSON.
    Decode {
        /// Path to the packet bytes.
        packet_file: PathBuf,
        /// Descriptor JSON describing the packet contents.
        #[arg(long)]
        descriptor: PathBuf,
        /// Full snapshot packet a delta was encoded against.
        #[arg(long)]
        baseline: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum InspectSort {
    Size,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Command::Layout { descriptor, format } => {
            let plan = load_plan(&descriptor)?;
            let report = layout_report(&plan);
            match format {
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&report).context("serialize json")?;
                    println!("{json}");
                }
                OutputFormat::Pretty => print!("{}", format_layout(&report)),
            }
        }
        Command::Inspect {
            packet_path,
            descriptor,
            glob,
            sort,
            limit,
        } => {
            let plan = descriptor
                .as_deref()
                .map(load_plan)
                .transpose()
                .context("load descriptor")?;
            if packet_path.is_dir() {
                let entries = collect_packet_entries(&packet_path, glob.as_deref())?;
                let mut entries = maybe_sort_entries(entries, sort);
                let limit = limit.or(sort.map(|InspectSort::Size| 10));
                if let Some(limit) = limit {
                    entries.truncate(limit);
                }
                for entry in entries {
                    println!("== {} ({} bytes) ==", entry.path.display(), entry.size);
                    inspect_file(&entry.path, plan.as_ref())?;
                }
            } else {
                inspect_file(&packet_path, plan.as_ref())?;
            }
        }
        Command::Decode {
            packet_file,
            descriptor,
            baseline,
            format,
        } => {
            let bytes = fs::read(&packet_file)
                .with_context(|| format!("read packet {}", packet_file.display()))?;
            let baseline = baseline
                .map(|path| {
                    fs::read(&path).with_context(|| format!("read baseline {}", path.display()))
                })
                .transpose()?;
            let plan = load_plan(&descriptor)?;
            let output = decode_packet_json(
                &bytes,
                &plan,
                baseline.as_deref(),
                &wire::Limits::default(),
                &CodecLimits::default(),
            )?;
            let json = match format {
                OutputFormat::Json => serde_json::to_string(&output),
                OutputFormat::Pretty => serde_json::to_string_pretty(&output),
            }
            .context("serialize json")?;
            println!("{json}");
        }
    }
    Ok(())
}

fn load_plan(path: &Path) -> Result<RecordPlan> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read descriptor {}", path.display()))?;
    build_plan(&load_descriptor(&contents)?)
}

fn inspect_file(path: &Path, plan: Option<&RecordPlan>) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("read packet {}", path.display()))?;
    let report = inspect_packet(&bytes, plan, &wire::Limits::default())?;
    print!("{}", format_inspect(&report));
    Ok(())
}

struct PacketEntry {
    path: PathBuf,
    size: u64,
}

fn collect_packet_entries(dir: &Path, glob: Option<&str>) -> Result<Vec<PacketEntry>> {
    let mut entries = Vec::new();
    let pattern = match glob {
        Some(value) => Some(Pattern::new(value).context("invalid glob pattern")?),
        None => None,
    };

    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(pattern) = &pattern {
            let matches_path = pattern.matches_path(&path);
            let matches_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !matches_path && !matches_name {
                continue;
            }
        }
        let size = entry.metadata()?.len();
        entries.push(PacketEntry { path, size });
    }
    Ok(entries)
}

fn maybe_sort_entries(
    mut entries: Vec<PacketEntry>,
    sort: Option<InspectSort>,
) -> Vec<PacketEntry> {
    match sort {
        Some(InspectSort::Size) => {
            entries.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
        }
        None => {}
    }
    entries
}
