//! Moodlab CLI
//!
//! Usage:
//!   moodlab                                   # Simulated session, 10 ticks
//!   moodlab --ab --ticks 30 --interval-ms 200 # A/B experiment, faster cadence
//!   moodlab --json --export ./exports         # JSON lines + export file
//!   moodlab --serve                           # HTTP API server

use clap::Parser;
use colored::Colorize;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use moodlab::core::{init_tracing, run_server, Classifier, SessionHandle, DEFAULT_LOG_LEVEL};
use moodlab::types::{
    ClassifierError, ExperimentConfig, ExportRecord, SessionConfig, SessionState, TickNotification,
};
use moodlab::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "moodlab",
    version = VERSION,
    about = "Moodlab - emotion-driven ad experiment engine",
    long_about = "Moodlab turns a noisy stream of per-frame emotion readings into a\n\
                  stable label, serves an ad for it, and measures clicks.\n\n\
                  Without a camera the session runs on the simulation generator.\n\n\
                  Arms:\n  \
                  moodBased - ad follows the detected emotion\n  \
                  random    - ad drawn uniformly (only with --ab)"
)]
struct Args {
    /// Enable the A/B experiment (half the ticks serve a random ad)
    #[arg(long)]
    ab: bool,

    /// Confidence a reading must exceed to move the label
    #[arg(long, default_value_t = moodlab::DEFAULT_CONFIDENCE_THRESHOLD)]
    threshold: f64,

    /// Number of readings the smoother votes over
    #[arg(long, default_value_t = moodlab::DEFAULT_SMOOTHING_WINDOW)]
    window: usize,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = moodlab::DEFAULT_TICK_INTERVAL_MS)]
    interval_ms: u64,

    /// Milliseconds allowed for classifier setup
    #[arg(long, default_value_t = moodlab::DEFAULT_LOAD_TIMEOUT_MS)]
    load_timeout_ms: u64,

    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Ticks to run before exporting
    #[arg(short, long, default_value_t = 10)]
    ticks: u64,

    /// Probability that the simulated viewer clicks after a tick
    #[arg(long, default_value_t = 0.1)]
    click_prob: f64,

    /// Output as JSON lines
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,

    /// Show debug logs
    #[arg(short, long)]
    verbose: bool,

    /// Directory to write the export record into
    #[arg(long)]
    export: Option<String>,

    /// Run as HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address (default: 127.0.0.1:3000)
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,
}

impl Args {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            experiment: ExperimentConfig {
                ab_testing_enabled: self.ab,
                confidence_threshold: self.threshold,
                smoothing_window: self.window,
            },
            tick_interval: Duration::from_millis(self.interval_ms),
            load_timeout: Duration::from_millis(self.load_timeout_ms),
            fallback_to_simulation: true,
            seed: self.seed,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    if let Err(e) = init_tracing(if args.verbose { "debug" } else { DEFAULT_LOG_LEVEL }) {
        eprintln!("logging disabled: {}", e);
    }
    if args.no_color {
        colored::control::set_override(false);
    }

    let config = args.session_config();
    let result = if args.serve {
        run_serve(&args, config).await
    } else {
        run_demo(&args, config).await
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Run a simulated session in the terminal
async fn run_demo(args: &Args, config: SessionConfig) -> Result<(), Box<dyn Error>> {
    let mut viewer = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(2)),
        None => StdRng::from_entropy(),
    };

    // No camera in a terminal: the loader fails and the session falls back
    let session = SessionHandle::launch(config, async {
        Err::<Box<dyn Classifier>, _>(ClassifierError::AdapterUnavailable(
            "no camera in terminal mode".into(),
        ))
    })
    .await?;
    let (mut rx, state) = {
        let c = session.controller.lock().await;
        (c.subscribe(), c.state())
    };

    if !args.json {
        print_header(args, state);
    }

    let mut seen = 0;
    while seen < args.ticks {
        let notification = match rx.recv().await {
            Ok(n) => n,
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        };
        seen += 1;
        print_tick(&notification, args);

        if viewer.gen::<f64>() < args.click_prob {
            let outcome = session.controller.lock().await.record_click()?;
            if args.json {
                println!("{}", serde_json::to_string(&outcome)?);
            } else {
                let arm = outcome
                    .attributed_to
                    .map(|a| a.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {} credited to {}", "CLICK".green().bold(), arm);
            }
        }
    }

    let (record, path) = {
        let c = session.controller.lock().await;
        let path = match &args.export {
            Some(dir) => Some(c.export_to_dir(dir)?),
            None => None,
        };
        (c.export(), path)
    };
    session.shutdown().await;

    if args.json {
        println!("{}", serde_json::to_string(&record)?);
    } else {
        print_summary(&record);
    }
    if let Some(path) = path {
        println!("{} {}", "Export saved:".cyan(), path.display());
    }
    Ok(())
}

/// Run HTTP API server
async fn run_serve(args: &Args, config: SessionConfig) -> Result<(), Box<dyn Error>> {
    println!();
    println!("{}", format!("Moodlab API Server v{}", VERSION).bold());
    println!();
    run_server(&args.addr, config).await
}

fn print_header(args: &Args, state: SessionState) {
    println!("{}", format!("Moodlab v{} - simulated session", VERSION).bold());
    if args.no_color {
        println!("State: {}", state);
    } else {
        println!("State: {}{}{}", state.color_code(), state, SessionState::color_reset());
    }
    println!(
        "A/B testing: {} | threshold: {} | window: {} | interval: {}ms",
        if args.ab { "on" } else { "off" },
        args.threshold,
        args.window,
        args.interval_ms
    );
    println!();
}

fn print_tick(n: &TickNotification, args: &Args) {
    if args.json {
        match serde_json::to_string(n) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("failed to encode tick: {}", e),
        }
    } else if args.no_color {
        println!("{}", n.to_parseable_string());
    } else {
        println!("{}", n.to_terminal_string());
        println!("  {}", n.ad.text.dimmed());
    }
}

fn print_summary(record: &ExportRecord) {
    println!();
    println!("{}", "Session summary".bold());
    println!(
        "  views={} clicks={} rate={}",
        record.total_views, record.total_clicks, record.click_rate
    );
    let counts: Vec<String> = record
        .emotion_counts
        .iter()
        .map(|(label, n)| format!("{}={}", label, n))
        .collect();
    println!("  emotions: {}", counts.join(" "));
    if let Some(ab) = &record.ab_testing {
        println!(
            "  moodBased: {}/{} ({}) | random: {}/{} ({})",
            ab.mood_based.clicks,
            ab.mood_based.views,
            ab.mood_based.rate,
            ab.random.clicks,
            ab.random.views,
            ab.random.rate
        );
    }
}
