// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe Studio CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use polyframe_studio::builtins::Builtins;
use polyframe_studio::eval::evaluate_expression;
use polyframe_studio::kernel::{CompileStatus, Kernel, RenderPoll, RenderStatus};
use polyframe_studio::{Diagnostics, PipelineConfig};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "polyframe-studio")]
#[command(about = "Compile, preview and render OpenSCAD-style scripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to polyframe-studio.toml when present)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Extra library directory for include and use
    #[arg(short = 'L', long = "library", global = true, value_name = "DIR")]
    library_paths: Vec<PathBuf>,

    /// Stop a pass on the first warning
    #[arg(long, global = true)]
    hardwarnings: bool,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a file and build preview products
    Preview {
        input: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compile a file and evaluate its exact geometry
    Render { input: PathBuf },

    /// Print an intermediate form of a compiled file
    Dump {
        input: PathBuf,

        #[arg(short, long, value_enum, default_value = "products")]
        what: DumpKind,
    },

    /// Evaluate a single expression
    Eval { expression: String },

    /// Recompile a file whenever it or its dependencies change
    Watch {
        input: PathBuf,

        /// Polling interval in milliseconds
        #[arg(short, long, default_value = "200")]
        interval: u64,

        /// Stop after this many polls
        #[arg(long)]
        max_polls: Option<usize>,
    },

    /// Show version information
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum DumpKind {
    Ast,
    Csg,
    Products,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Preview { input, json } => preview_command(&cli, input, *json),
        Commands::Render { input } => render_command(&cli, input),
        Commands::Dump { input, what } => dump_command(&cli, input, *what),
        Commands::Eval { expression } => eval_command(expression),
        Commands::Watch {
            input,
            interval,
            max_polls,
        } => watch_command(&cli, input, Duration::from_millis(*interval), *max_polls),
        Commands::Version => {
            println!("Polyframe Studio v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::load()?,
    };
    config.library_paths.extend(cli.library_paths.iter().cloned());
    if cli.hardwarnings {
        config.hardwarnings = true;
    }
    Ok(config)
}

fn open_kernel(cli: &Cli, input: &Path) -> Result<Kernel> {
    if !input.exists() {
        eprintln!("{} Input file not found: {}", "Error:".red(), input.display());
        std::process::exit(1);
    }
    let mut kernel = Kernel::new(load_config(cli)?, Diagnostics::console());
    kernel
        .open(input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    Ok(kernel)
}

fn exit_unless_compiled(status: CompileStatus) {
    if !matches!(status, CompileStatus::Compiled | CompileStatus::Rendering) {
        eprintln!("{} compile ended with status {:?}", "Error:".red(), status);
        std::process::exit(1);
    }
}

fn preview_command(cli: &Cli, input: &Path, json: bool) -> Result<()> {
    let mut kernel = open_kernel(cli, input)?;
    let status = kernel.preview()?;
    exit_unless_compiled(status);

    if json {
        let products = kernel.products().cloned().unwrap_or_default();
        let summary = serde_json::json!({
            "file": input.display().to_string(),
            "root_products": products.root.len(),
            "root_leaves": products.root.size(),
            "highlight_products": products.highlights.len(),
            "background_products": products.background.len(),
            "preview_enabled": kernel.preview_enabled(),
            "warnings": kernel.diagnostics().warning_count(),
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    if let Some(products) = kernel.products() {
        println!(
            "{} {} root products, {} leaves, {} highlight products, {} background products",
            "Preview:".bold(),
            products.root.len().to_string().cyan(),
            products.root.size().to_string().cyan(),
            products.highlights.len(),
            products.background.len()
        );
    }
    if !kernel.preview_enabled() {
        println!("{}", "Preview rendering is disabled for this design".yellow());
    }
    Ok(())
}

fn render_command(cli: &Cli, input: &Path) -> Result<()> {
    let mut kernel = open_kernel(cli, input)?;
    let status = kernel.render()?;
    exit_unless_compiled(status);

    let pb = ProgressBar::new(1000);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}%")?
            .progress_chars("#>-"),
    );

    let status = loop {
        match kernel.poll_render() {
            RenderPoll::Done(status) => break status,
            RenderPoll::Running(progress) => {
                if let Some(progress) = progress {
                    pb.set_position(progress.permille() as u64);
                }
                thread::sleep(Duration::from_millis(50));
            }
            RenderPoll::NotRunning => break RenderStatus::Failed,
        }
    };
    pb.finish_and_clear();

    match status {
        RenderStatus::Finished => {
            if let Some(summary) = kernel.last_render() {
                println!(
                    "{} {} facets, {} vertices in {:.2?}",
                    "Rendered:".green().bold(),
                    summary.facets,
                    summary.vertices,
                    summary.elapsed
                );
                if summary.play_sound {
                    print!("\x07");
                }
            }
            Ok(())
        }
        RenderStatus::Empty => {
            println!("{}", "Rendered: empty result".yellow());
            Ok(())
        }
        RenderStatus::Cancelled | RenderStatus::Failed => {
            eprintln!("{} rendering did not finish", "Error:".red());
            std::process::exit(1);
        }
    }
}

fn dump_command(cli: &Cli, input: &Path, what: DumpKind) -> Result<()> {
    let mut kernel = open_kernel(cli, input)?;
    kernel.preview()?;

    let text = match what {
        DumpKind::Ast => kernel.dump_ast(),
        DumpKind::Csg => kernel.dump_csg_tree(),
        DumpKind::Products => kernel.dump_products(),
    };
    match text {
        Some(text) => {
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }
            Ok(())
        }
        None => {
            eprintln!("{} nothing to dump", "Error:".red());
            std::process::exit(1);
        }
    }
}

fn eval_command(expression: &str) -> Result<()> {
    let diagnostics = Diagnostics::console();
    let value = evaluate_expression(expression, &Builtins::standard(), &diagnostics)
        .with_context(|| format!("Failed to parse expression: {}", expression))?;
    println!("{}", value.to_echo_string());
    Ok(())
}

fn watch_command(cli: &Cli, input: &Path, interval: Duration, max_polls: Option<usize>) -> Result<()> {
    let mut kernel = open_kernel(cli, input)?;
    println!(
        "{} {} (every {:?})",
        "Watching".bold(),
        input.display().to_string().cyan(),
        interval
    );

    let mut polls = 0;
    loop {
        let status = kernel.reload_preview()?;
        if status != CompileStatus::Unchanged {
            println!(
                "{} {:?}",
                format!("[{}]", chrono::Local::now().format("%H:%M:%S")).bright_black(),
                status
            );
        }

        polls += 1;
        if max_polls.is_some_and(|max| polls >= max) {
            return Ok(());
        }
        thread::sleep(interval);
    }
}
