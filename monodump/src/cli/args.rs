//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "monodump",
    about = "Capture Mono GC heap dumps and rebuild the object-reference graph",
    after_help = "\
EXAMPLES:
    monodump collect --pid 1234                  Dump a running process
    monodump collect --pid 1234 -o app.json      Explicit output path
    monodump collect --pid 1234 --interactive    Repeated dumps, Enter to trigger
    monodump convert capture.monoevt             Rebuild graph from a capture file"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Rebuild the graph from a previously captured event file
    Convert {
        /// Capture file to read
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Where to write the graph (default: INPUT with .heapgraph.json)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Decode object references with the legacy 8-byte entry stride
        #[arg(long)]
        legacy_stride: bool,
    },

    /// Attach to a live runtime and capture a heap dump
    Collect {
        /// Process id (diagnostic socket auto-resolved)
        #[arg(short, long)]
        pid: Option<i32>,

        /// Explicit diagnostic socket path (instead of --pid)
        #[arg(long, value_name = "PATH")]
        diagnostic_port: Option<String>,

        /// Where to write the graph (default: heap.heapgraph.json)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Keep the session open and trigger dumps interactively
        #[arg(short, long)]
        interactive: bool,

        /// Decode object references with the legacy 8-byte entry stride
        #[arg(long)]
        legacy_stride: bool,
    },
}
