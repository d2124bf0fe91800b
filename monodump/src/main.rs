//! # monodump - Main Entry Point
//!
//! Two commands:
//! - **convert**: rebuild the object graph from a previously captured
//!   event file.
//! - **collect**: attach to a live runtime's diagnostic socket, capture a
//!   heap dump (optionally repeatedly in interactive mode), and write the
//!   graph.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use monodump::capture::{
    self, CaptureConfig, CaptureCoordinator, CaptureOutcome, FileChannel, SocketChannel,
};
use monodump::cli::{Args, Command};
use monodump::domain::TargetError;
use monodump::export::GraphExporter;
use monodump::graph::{MemoryGraph, ModuleMap};
use monodump::parser::RefStride;
use monodump::roots::RootRangeTracker;
use monodump::target::resolve_diagnostic_socket;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<TargetError>().is_some() {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn stride_for(legacy: bool) -> RefStride {
    if legacy {
        RefStride::Packed8
    } else {
        RefStride::Full12
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();
    match args.command {
        Command::Convert { input, output, legacy_stride } => {
            run_convert(&input, output, legacy_stride, args.quiet).await
        }
        Command::Collect { pid, diagnostic_port, output, interactive, legacy_stride } => {
            run_collect(
                pid,
                diagnostic_port.as_deref(),
                output,
                interactive,
                legacy_stride,
                args.quiet,
            )
            .await
        }
    }
}

async fn run_convert(
    input: &Path,
    output: Option<PathBuf>,
    legacy_stride: bool,
    quiet: bool,
) -> Result<()> {
    let output = output.unwrap_or_else(|| input.with_extension("heapgraph.json"));
    let channel = FileChannel::open(input)
        .await
        .with_context(|| format!("failed to open capture file {}", input.display()))?;

    let config = CaptureConfig { stride: stride_for(legacy_stride), ..CaptureConfig::default() };
    let outcome =
        capture::capture(channel, RootRangeTracker::new(), &ModuleMap::new(), config).await?;

    write_graph(&outcome.graph, &output)?;
    if !quiet {
        print_summary(&outcome.graph, &output);
    }
    Ok(())
}

async fn run_collect(
    pid: Option<i32>,
    diagnostic_port: Option<&str>,
    output: Option<PathBuf>,
    interactive: bool,
    legacy_stride: bool,
    quiet: bool,
) -> Result<()> {
    // Validate the target before any session resource is touched.
    let socket = resolve_diagnostic_socket(pid, diagnostic_port)?;
    let output = output.unwrap_or_else(|| PathBuf::from("heap.heapgraph.json"));
    let config = CaptureConfig { stride: stride_for(legacy_stride), ..CaptureConfig::default() };

    if !quiet {
        println!("monodump v{}", env!("CARGO_PKG_VERSION"));
        println!("diagnostic socket: {}", socket.display());
    }

    if interactive {
        return run_interactive(&socket, &output, config, quiet).await;
    }

    let channel = SocketChannel::connect(&socket)
        .await
        .with_context(|| format!("failed to connect to {}", socket.display()))?;
    let coordinator = CaptureCoordinator::start(channel, RootRangeTracker::new(), config);
    let outcome = wait_with_ctrl_c(coordinator, &ModuleMap::new()).await?;

    write_graph(&outcome.graph, &output)?;
    if !quiet {
        print_summary(&outcome.graph, &output);
    }
    Ok(())
}

/// Interactive multi-capture loop: Enter triggers a dump, `q` quits. The
/// root range tracker is carried across captures so root identity stays
/// accurate without re-learning every registration.
async fn run_interactive(
    socket: &Path,
    output: &Path,
    config: CaptureConfig,
    quiet: bool,
) -> Result<()> {
    let modules = ModuleMap::new();
    let mut tracker = RootRangeTracker::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut capture_index = 0u32;

    loop {
        if !quiet {
            println!("press Enter to capture a dump, q + Enter to quit");
        }
        let Some(line) = lines.next_line().await? else { break };
        if line.trim().eq_ignore_ascii_case("q") {
            break;
        }

        capture_index += 1;
        let channel = SocketChannel::connect(socket)
            .await
            .with_context(|| format!("failed to connect to {}", socket.display()))?;
        let coordinator = CaptureCoordinator::start(channel, std::mem::take(&mut tracker), config);
        let outcome = wait_with_ctrl_c(coordinator, &modules).await?;
        tracker = outcome.tracker;

        let path = numbered_output(output, capture_index);
        write_graph(&outcome.graph, &path)?;
        if !quiet {
            print_summary(&outcome.graph, &path);
        }
    }
    Ok(())
}

/// Wait for the capture while treating Ctrl+C as an external stop request:
/// the session is asked to stop and the stream drains before assembly.
async fn wait_with_ctrl_c(
    coordinator: CaptureCoordinator,
    modules: &ModuleMap,
) -> Result<CaptureOutcome, monodump::domain::CaptureError> {
    let stop = coordinator.stop_handle();
    let wait = coordinator.wait(modules);
    tokio::pin!(wait);
    loop {
        tokio::select! {
            outcome = &mut wait => return outcome,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received; stopping capture");
                stop.request_stop();
            }
        }
    }
}

fn numbered_output(base: &Path, index: u32) -> PathBuf {
    if index <= 1 {
        return base.to_path_buf();
    }
    let stem = base.file_stem().map_or_else(|| "heap".to_string(), |s| s.to_string_lossy().into_owned());
    let ext = base.extension().map_or_else(String::new, |e| format!(".{}", e.to_string_lossy()));
    base.with_file_name(format!("{stem}-{index}{ext}"))
}

fn write_graph(graph: &MemoryGraph, path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    GraphExporter::export(graph, BufWriter::new(file))
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn print_summary(graph: &MemoryGraph, path: &Path) {
    println!("saved: {} ({} nodes, {} types)", path.display(), graph.node_count(), graph.type_count());
}
