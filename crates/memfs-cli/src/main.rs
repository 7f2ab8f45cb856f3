//! memfs console.
//!
//! Drives an in-memory filesystem from a line-oriented command stream, one
//! command per line, with a caller identity per session. Useful for poking
//! at the engine by hand and for scripted smoke runs.
//!
//! Usage:
//!   # Interactive, as the current user
//!   memfs
//!
//!   # Scripted, as an unprivileged caller with a restrictive umask
//!   memfs --uid 1000 --gid 1000 --umask 077 --script smoke.memfs

mod console;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt};

use memfs_kernel::{CallerContext, FsConfig, MemFs};

use crate::console::{Console, Reply, errno_of, parse_mode};

/// Line-oriented console for the memfs engine.
#[derive(Parser, Debug)]
#[command(name = "memfs")]
#[command(about = "Drive an in-memory POSIX-style filesystem from the command line")]
struct Args {
    /// Engine config file (TOML). Defaults to ~/.config/memfs/config.toml
    /// when that exists.
    #[arg(short, long)]
    config: Option<String>,

    /// Caller uid (default: the current process's)
    #[arg(long)]
    uid: Option<u32>,

    /// Caller gid (default: the current process's)
    #[arg(long)]
    gid: Option<u32>,

    /// Octal umask applied to created nodes
    #[arg(long, default_value = "022", value_parser = parse_umask)]
    umask: u32,

    /// Read commands from this file instead of stdin
    #[arg(short, long)]
    script: Option<PathBuf>,
}

fn parse_umask(s: &str) -> Result<u32, String> {
    parse_mode(s).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout carries command output.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let (process_uid, process_gid) = process_ids();

    let config = load_config(args.config.as_deref(), process_uid, process_gid)?;
    let ctx = CallerContext::new(
        args.uid.unwrap_or(process_uid),
        args.gid.unwrap_or(process_gid),
    )
    .with_umask(args.umask);
    let (root_uid, root_gid) = (config.root_uid, config.root_gid);
    let mut console = Console::new(MemFs::new(config), ctx);
    info!(
        root_uid,
        root_gid,
        uid = console.ctx().uid,
        gid = console.ctx().gid,
        "starting memfs console"
    );

    let reader: Box<dyn AsyncBufRead + Unpin> = match &args.script {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open script {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    run(&mut console, reader).await
}

/// Feed every line to the console until input ends or `quit`.
async fn run(console: &mut Console, reader: impl AsyncBufRead + Unpin) -> Result<()> {
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        match console.execute(&line) {
            Ok(Reply::Output(out)) => print!("{out}"),
            Ok(Reply::Quit) => break,
            Err(e) => match errno_of(&e) {
                Some(errno) => println!("error: {e} (errno {errno})"),
                None => println!("error: {e}"),
            },
        }
    }
    debug!("input finished");
    Ok(())
}

/// Explicit `--config` must exist; the default location is optional.
/// Without a config file the root directory belongs to the process owner.
fn load_config(explicit: Option<&str>, uid: u32, gid: u32) -> Result<FsConfig> {
    if let Some(path) = explicit {
        let path = PathBuf::from(shellexpand::tilde(path).as_ref());
        return FsConfig::load(&path)
            .with_context(|| format!("loading config {}", path.display()));
    }
    match default_config_path() {
        Some(path) if path.exists() => {
            debug!(path = %path.display(), "using default config");
            Ok(FsConfig::load(&path)?)
        }
        _ => Ok(FsConfig::default().with_root_owner(uid, gid)),
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("memfs").join("config.toml"))
}

#[cfg(unix)]
fn process_ids() -> (u32, u32) {
    (
        rustix::process::getuid().as_raw(),
        rustix::process::getgid().as_raw(),
    )
}

#[cfg(not(unix))]
fn process_ids() -> (u32, u32) {
    (0, 0)
}
