//! Command-line driver for the shared-memory frame protocol.
//!
//! `layout` prints the section table of this build, `run` plays both sides in
//! one process, and `serve`/`host` split the two sides across processes that
//! share a mapped file.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use frame_loop::{
    render_dump, DumpWindow, FrameCounterOwner, FrameLoop, HostDriver, LoopConfig, RunSummary,
    JOY_CENTRE,
};
use memmap2::MmapMut;
use services_kernel::PatternKernel;
use shmem_transport::{InputRecord, PollPolicy, SharedRegion, WaitResult, LAYOUT, TOTAL_SIZE};
use std::fs::{File, OpenOptions};
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive the frame-synchronous shared-memory protocol")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the region layout of this build.
    Layout,
    /// Run host and emulation loop in one process and dump the last frame.
    Run {
        /// Frames to emulate before requesting exit.
        #[arg(long, default_value_t = 120)]
        frames: u32,
        /// Text typed by the host, one key press every other frame.
        #[arg(long, default_value = "")]
        text: String,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Run the emulation loop over a mapped file until a host requests exit.
    Serve {
        /// Shared file; created or grown to the region size.
        #[arg(long = "map", value_name = "FILE")]
        map: PathBuf,
        #[command(flatten)]
        tuning: Tuning,
    },
    /// Drive a `serve` process through a mapped file, then request exit.
    Host {
        #[arg(long = "map", value_name = "FILE")]
        map: PathBuf,
        #[arg(long, default_value_t = 120)]
        frames: u32,
        #[arg(long, default_value = "")]
        text: String,
        /// Give up when a frame takes longer than this.
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
        #[command(flatten)]
        tuning: Tuning,
    },
}

/// Options shared by every subcommand that touches the handshake.
#[derive(Args, Debug, Clone, Copy)]
struct Tuning {
    /// Poll interval while waiting for the other side, in milliseconds.
    #[arg(long, default_value_t = 1)]
    poll_ms: u64,
    /// Log a checkpoint every N frames; 0 disables it.
    #[arg(long, default_value_t = 100)]
    checkpoint_every: u32,
    /// The host writes the frame counter instead of the emulation loop.
    #[arg(long)]
    host_owns_frame_counter: bool,
}

impl Tuning {
    fn poll(&self) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(self.poll_ms))
    }

    fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            poll: self.poll(),
            checkpoint_interval: NonZeroU32::new(self.checkpoint_every),
            frame_counter: if self.host_owns_frame_counter {
                FrameCounterOwner::Host
            } else {
                FrameCounterOwner::Emulator
            },
        }
    }

    fn host<'r>(&self, region: &'r SharedRegion<'r>) -> HostDriver<'r> {
        HostDriver::new(region)
            .with_poll(self.poll())
            .writing_frame_count(self.host_owns_frame_counter)
    }
}

fn main() -> Result<()> {
    init_tracing();

    match Cli::parse().command {
        Command::Layout => print_layout(),
        Command::Run {
            frames,
            text,
            tuning,
        } => run_in_process(frames, &text, tuning)?,
        Command::Serve { map, tuning } => {
            serve(&map, tuning)?;
        }
        Command::Host {
            map,
            frames,
            text,
            timeout_ms,
            tuning,
        } => host(&map, frames, &text, Duration::from_millis(timeout_ms), tuning)?,
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Also routes `log` records from the library crates.
    let _ = fmt().with_env_filter(env_filter).try_init();
}

fn print_layout() {
    let geometry = LAYOUT.geometry;
    println!(
        "framebuffer {}x{}, visible {}x{}",
        geometry.framebuffer_width,
        geometry.framebuffer_height,
        geometry.usable_width,
        geometry.usable_height
    );
    for (name, span) in LAYOUT.spans() {
        println!("{name:<6} {:>7} {:>7} {:>7}", span.offset, span.len, span.end());
    }
    println!("total  {TOTAL_SIZE:>7}");
}

/// Input for host frame `index` (zero based): a press of the next character
/// of `text` on even frames, a release on odd ones.
fn scripted_input(index: u32, text: &[u8], host_counts: bool) -> InputRecord {
    let mut record = InputRecord::default();
    for port in 0..4 {
        record.set_joystick(port, JOY_CENTRE, false);
    }
    if index % 2 == 0 {
        if let Some(&key) = text.get((index / 2) as usize) {
            record.keychar = key;
        }
    }
    if host_counts {
        record.frame_count = index + 1;
    }
    record
}

/// Runs `frames` host turns. Returns the frame counter seen last.
fn drive_host(
    driver: &HostDriver<'_>,
    frames: u32,
    text: &str,
    timeout: Duration,
    host_counts: bool,
) -> Result<u32> {
    let text = text.as_bytes();
    for index in 0..frames {
        if driver.wait_for_screen(Some(Instant::now() + timeout)) == WaitResult::TimedOut {
            bail!("no frame after {timeout:?} (host turn {index})");
        }
        debug!(index, frame_count = driver.frame_count(), "screen ready");
        driver.submit(&scripted_input(index, text, host_counts));
    }
    if driver.wait_for_screen(Some(Instant::now() + timeout)) == WaitResult::TimedOut {
        bail!("no final frame after {timeout:?}");
    }
    Ok(driver.frame_count())
}

fn print_summary(summary: &RunSummary) {
    info!(
        frames = summary.frames,
        desync_polls = summary.desync_polls,
        exit_value = ?summary.exit_value,
        "emulation loop finished"
    );
}

fn run_in_process(frames: u32, text: &str, tuning: Tuning) -> Result<()> {
    let region = SharedRegion::acquire_self_owned().context("failed to allocate region")?;
    info!(bytes = region.len(), ownership = ?region.ownership(), "region ready");
    // The host speaks first so frame 1 already carries scripted input.
    region.handshake().publish_screen_ready();

    let (summary, frame_count) = thread::scope(|scope| -> Result<_> {
        let emulator = scope.spawn(|| {
            let mut kernel = PatternKernel::default();
            FrameLoop::new(&region, tuning.loop_config())
                .with_checkpoint(|frame, region| {
                    info!(frame, frame_count = region.input().frame_count(), "checkpoint");
                })
                .run(&mut kernel)
        });

        let driver = tuning.host(&region);
        let hosted = drive_host(
            &driver,
            frames,
            text,
            Duration::from_secs(5),
            tuning.host_owns_frame_counter,
        );
        driver.request_exit();

        let summary = match emulator.join() {
            Ok(result) => result.context("emulation loop failed")?,
            Err(_) => bail!("emulation thread panicked"),
        };
        Ok((summary, hosted?))
    })?;

    print_summary(&summary);
    println!("frame counter {frame_count}");
    print!("{}", render_dump(&region.video().to_vec(), &DumpWindow::default()));
    Ok(())
}

/// Opens `path` for sharing, growing it to the region size when `create` is set.
fn open_map(path: &Path, create: bool) -> Result<MmapMut> {
    let file: File = OpenOptions::new()
        .read(true)
        .write(true)
        .create(create)
        .truncate(false)
        .open(path)
        .with_context(|| format!("failed to open {path:?}"))?;
    let len = file
        .metadata()
        .with_context(|| format!("failed to stat {path:?}"))?
        .len();
    if len < TOTAL_SIZE as u64 {
        if !create {
            bail!("{path:?} holds {len} bytes, the region needs {TOTAL_SIZE}");
        }
        file.set_len(TOTAL_SIZE as u64)
            .with_context(|| format!("failed to size {path:?}"))?;
    }
    // SAFETY: the file is only shared with the peer process, which follows the
    // same turn discipline; truncation by a third party is not supported.
    let map = unsafe { MmapMut::map_mut(&file) }.with_context(|| format!("failed to map {path:?}"))?;
    Ok(map)
}

fn serve(path: &Path, tuning: Tuning) -> Result<RunSummary> {
    let map = open_map(path, true)?;
    let region = SharedRegion::bind_mapped(map).context("mapped file does not fit the layout")?;
    // A previous session leaves its exit value behind; every session starts
    // from a zeroed region, which reads as input-ready.
    region.zero();
    info!(path = %path.display(), bytes = region.len(), "serving");

    let mut kernel = PatternKernel::default();
    let summary = FrameLoop::new(&region, tuning.loop_config())
        .with_checkpoint(|frame, region| {
            info!(frame, frame_count = region.input().frame_count(), "checkpoint");
        })
        .run(&mut kernel)?;
    print_summary(&summary);
    Ok(summary)
}

fn host(path: &Path, frames: u32, text: &str, timeout: Duration, tuning: Tuning) -> Result<()> {
    let map = open_map(path, false)?;
    let region = SharedRegion::bind_mapped(map).context("mapped file does not fit the layout")?;
    let driver = tuning.host(&region);

    let result = drive_host(&driver, frames, text, timeout, tuning.host_owns_frame_counter);
    driver.request_exit();
    let frame_count = result?;
    if frame_count == 0 && !tuning.host_owns_frame_counter {
        warn!("frame counter still zero; is the server counting frames?");
    }

    println!("frame counter {frame_count}");
    print!("{}", render_dump(&region.video().to_vec(), &DumpWindow::default()));
    Ok(())
}
