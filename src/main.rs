//! Sign Trainer - recognition practice sessions from the terminal
//!
//! Drives the session engine against a replayed backend script, so the
//! full practice flow runs without a camera or a model server.

mod cli;

use clap::Parser;
use cli::display::{Display, TerminalObserver};
use cli::replay::{ReplayPredictor, SyntheticCamera};
use sign_trainer::session::{
    ConfusionTracker, RecognitionEngine, SessionConfig, SessionMode, TargetPlan,
};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sign-trainer")]
#[command(about = "Sign recognition practice sessions against a replayed backend")]
struct Args {
    /// Practice surface: realtime, finger-spelling or module-test
    #[arg(short, long, default_value = "realtime")]
    mode: SessionMode,

    /// Sign to practice in realtime mode
    #[arg(short, long, default_value = "A")]
    sign: String,

    /// Word to finger-spell
    #[arg(short, long)]
    word: Option<String>,

    /// Explicit comma-separated targets, replacing the mode's plan
    #[arg(short, long, value_delimiter = ',')]
    targets: Vec<String>,

    /// JSON-lines file of recorded backend responses
    #[arg(long)]
    script: PathBuf,

    /// JSON file overriding the mode's defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Capture cadence in milliseconds
    #[arg(long)]
    capture_ms: Option<u64>,

    /// Per-sign timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Pause after a correct sign in milliseconds
    #[arg(long)]
    cooldown_ms: Option<u64>,

    /// End the session after this many misses
    #[arg(long)]
    lives: Option<u32>,

    /// Simulated backend latency in milliseconds
    #[arg(long, default_value = "150")]
    latency_ms: u64,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn init_tracing(debug: bool) {
    let default = if debug {
        "sign_trainer=debug"
    } else {
        "sign_trainer=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

/// Mode defaults, then the config file, then flags
fn build_config(args: &Args) -> Result<SessionConfig, Box<dyn Error>> {
    let mut config = SessionConfig::for_mode(args.mode);
    if let Some(path) = &args.config {
        config = config.apply_file(path)?;
    }

    if let Some(ms) = args.capture_ms {
        config.capture_interval = Duration::from_millis(ms);
    }
    if let Some(ms) = args.timeout_ms {
        config.item_timeout = Duration::from_millis(ms);
    }
    if let Some(ms) = args.cooldown_ms {
        config.match_cooldown = Duration::from_millis(ms);
    }
    if args.lives.is_some() {
        config.lives = args.lives;
    }

    config.validate()?;
    Ok(config)
}

fn build_plan(args: &Args) -> Result<TargetPlan, Box<dyn Error>> {
    if !args.targets.is_empty() {
        return Ok(TargetPlan::Fixed(args.targets.clone()));
    }

    match args.mode {
        SessionMode::Realtime => Ok(TargetPlan::Single(args.sign.clone())),
        SessionMode::FingerSpelling => match &args.word {
            Some(word) if !word.trim().is_empty() => Ok(TargetPlan::Word(word.clone())),
            _ => Err("finger-spelling needs a word (--word)".into()),
        },
        SessionMode::ModuleTest => Ok(TargetPlan::module_test()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.debug);

    let config = build_config(&args)?;
    let plan = build_plan(&args)?;
    let predictor = ReplayPredictor::from_file(&args.script, Duration::from_millis(args.latency_ms))?;
    info!(script = %args.script.display(), predictions = predictor.remaining(), "backend script ready");

    let display = Display::new(config.thresholds);
    display.clear()?;
    display.show_banner(config.mode, plan.len())?;

    let observer = TerminalObserver::new(Display::new(config.thresholds), plan.len());
    let thresholds = config.thresholds;
    let engine = RecognitionEngine::new(
        config,
        plan,
        Arc::new(SyntheticCamera::default()),
        Arc::new(predictor),
        Box::new(observer),
    )?;

    let handle = engine.spawn();
    let commands = handle.commands().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            commands.stop();
        }
    });

    let outcome = handle.join().await?;

    let mut confusion = ConfusionTracker::new();
    confusion.record_mistakes(&outcome.stats().mistakes);
    Display::new(thresholds).show_summary(&outcome, &confusion)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        let mut argv = vec!["sign-trainer", "--script", "responses.jsonl"];
        argv.extend_from_slice(args);
        Args::parse_from(argv)
    }

    #[test]
    fn test_flags_override_mode_defaults() {
        let args = parse(&["--mode", "module-test", "--timeout-ms", "3000", "--lives", "3"]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.mode, SessionMode::ModuleTest);
        assert_eq!(config.item_timeout, Duration::from_secs(3));
        assert_eq!(config.lives, Some(3));
        assert_eq!(config.capture_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_plan_selection() {
        assert_eq!(build_plan(&parse(&[])).unwrap(), TargetPlan::Single("A".into()));
        assert_eq!(
            build_plan(&parse(&["--targets", "A,B,7"])).unwrap(),
            TargetPlan::Fixed(vec!["A".into(), "B".into(), "7".into()])
        );
        assert!(build_plan(&parse(&["--mode", "finger-spelling"])).is_err());
        assert_eq!(
            build_plan(&parse(&["-m", "finger-spelling", "-w", "cab"])).unwrap(),
            TargetPlan::Word("cab".into())
        );
    }
}
