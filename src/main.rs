use std::{path::PathBuf, process::ExitCode, sync::mpsc, thread};

use adfpack::{
    disk::Geometry,
    fs::{
        format::{format, FormatOptions},
        root_block::DosFlags,
    },
    packaging::{config::Resources, progress, PackagingJob},
    utils::AmigaDate,
    Result,
};
use clap::{Parser, Subcommand};
use colored::*;
use tracing_subscriber::EnvFilter;

/// adfpack - package Amiga programs into ADF floppy images
#[derive(Parser)]
#[command(name = "adfpack")]
#[command(version)]
#[command(about = "Build Amiga Disk File images from a packaging description", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build every ADF target of a packaging description
    Build {
        /// Project directory
        #[arg(default_value = ".")]
        project: PathBuf,
        /// Path to packaging.json (default: <project>/packaging.json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Output directory (default: <project>/build)
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Directory holding templates, startup-sequence and libraries
        #[arg(short, long)]
        resources: Option<PathBuf>,
    },

    /// Write a freshly formatted template image
    Template {
        /// Output file
        output: PathBuf,
        /// Volume name
        #[arg(short, long, default_value = "Empty")]
        name: String,
        /// Install the boot block code
        #[arg(long)]
        boot: bool,
        /// Fast File System instead of OFS
        #[arg(long)]
        ffs: bool,
        /// International name hashing
        #[arg(long)]
        intl: bool,
        /// High-density geometry (1.76 MB)
        #[arg(long)]
        hd: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Build {
            project,
            config,
            out,
            resources,
        } => build(
            config.unwrap_or_else(|| project.join("packaging.json")),
            out,
            resources,
        ),
        Commands::Template {
            output,
            name,
            boot,
            ffs,
            intl,
            hd,
        } => {
            let mut dos_flags = DosFlags::empty();
            dos_flags.set(DosFlags::FFS, ffs);
            dos_flags.set(DosFlags::INTL, intl);
            let options = FormatOptions {
                geometry: if hd { Geometry::HD } else { Geometry::DD },
                dos_flags,
                volume_name: name,
                bootable: boot,
                date: AmigaDate::now(),
            };
            template(output, &options)
        }
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            println!("{} {}", "❌ Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn build(config: PathBuf, out: Option<PathBuf>, resources: Option<PathBuf>) -> Result<bool> {
    let job = PackagingJob::load(&config, out, Resources::locate(resources))?;
    println!("{}", "📦 Building ADF targets...".bright_cyan().bold());

    let (tx, rx) = mpsc::channel();
    let renderer = thread::spawn(move || progress::render(rx));
    let outcomes = job.run(&tx);
    drop(tx);
    let _ = renderer.join();

    if outcomes.is_empty() {
        println!("{}", "⚠️  No ADF target in packaging description.".yellow());
    }

    let mut all_ok = true;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => {
                println!(
                    "✅ {} → {} ({} blocks free)",
                    outcome.target.green().bold(),
                    report.output.display().to_string().cyan(),
                    report.free_blocks
                );
                for reason in &report.skipped {
                    println!("   {} {}", "skipped:".yellow(), reason.bright_black());
                }
            }
            Err(e) => {
                all_ok = false;
                println!("❌ {}: {}", outcome.target.red().bold(), e);
            }
        }
    }
    Ok(all_ok)
}

fn template(output: PathBuf, options: &FormatOptions) -> Result<bool> {
    let disk = format(options)?;
    std::fs::write(&output, disk.as_bytes())?;
    println!(
        "💾 {} {}",
        "Template written to".green(),
        output.display().to_string().cyan()
    );
    Ok(true)
}
