use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use dvbtune_core::{
    Modulation, ResourceProvider, StreamType, TuneOutcome, TuneRequest, TunerConfig, TunerSession,
    PAT_PID,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "DVB tuner control tool", long_about = None)]
struct Args {
    /// Path to a TOML tuner configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Tune and stream transport-stream bytes to a file or stdout
    Tune {
        /// Frequency in Hz
        #[arg(long)]
        frequency: u32,

        /// Modulation name (8VSB, QAM16, QAM64, QAM256, QAM-AUTO, QPSK)
        #[arg(long, value_parser = parse_modulation)]
        modulation: Modulation,

        /// Lock timeout in milliseconds
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,

        /// Output file (stdout when omitted)
        #[arg(long)]
        out: Option<PathBuf>,

        /// How long to stream before exiting, in seconds
        #[arg(long, default_value_t = 10)]
        duration_secs: u64,
    },
    /// Print the delivery system type of the frontend
    Info,
}

fn parse_modulation(s: &str) -> Result<Modulation, dvbtune_core::device::UnknownModulation> {
    s.parse()
}

#[cfg(target_os = "linux")]
fn open_provider(config: &TunerConfig) -> Result<Box<dyn ResourceProvider>> {
    Ok(Box::new(
        dvbtune_core::device::ChardevProvider::from_config(config),
    ))
}

#[cfg(not(target_os = "linux"))]
fn open_provider(_config: &TunerConfig) -> Result<Box<dyn ResourceProvider>> {
    anyhow::bail!("no DVB device backend is available on this platform")
}

fn main() {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    if let Err(e) = run(args) {
        error!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => TunerConfig::load_from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TunerConfig::default(),
    };

    let provider = open_provider(&config)?;
    let mut session = TunerSession::new(provider, config);

    match args.command {
        Command::Tune {
            frequency,
            modulation,
            timeout_ms,
            out,
            duration_secs,
        } => {
            let outcome = session.tune(TuneRequest {
                frequency_hz: frequency,
                modulation,
                timeout: Duration::from_millis(timeout_ms),
            })?;
            if outcome == TuneOutcome::Cancelled {
                info!("tune cancelled before lock");
                return Ok(());
            }

            session.start_pid_filter(PAT_PID, StreamType::Other)?;
            stream_ts(
                &mut session,
                out.as_deref(),
                Duration::from_secs(duration_secs),
            )?;
            session.stop_tune();
        }
        Command::Info => {
            println!("{}", session.delivery_system_type());
        }
    }

    Ok(())
}

fn stream_ts(
    session: &mut TunerSession<dvbtune_core::TracingObserver>,
    out: Option<&std::path::Path>,
    duration: Duration,
) -> Result<()> {
    let mut sink: Box<dyn Write> = match out {
        Some(path) => {
            Box::new(File::create(path).with_context(|| format!("creating {}", path.display()))?)
        }
        None => Box::new(std::io::stdout().lock()),
    };

    let deadline = Instant::now() + duration;
    let mut buf = vec![0u8; 64 * 1024];
    let mut total: u64 = 0;

    while Instant::now() < deadline {
        let n = session.read_ts_stream(&mut buf, Duration::from_millis(500))?;
        if n == 0 {
            continue;
        }
        sink.write_all(&buf[..n])?;
        total += n as u64;
    }
    sink.flush()?;
    info!(total_bytes = total, "streaming finished");
    Ok(())
}
