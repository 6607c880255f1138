//! ids-agent entrypoint.
//!
//! `ids-agent train` fits a model bundle from the configured KDD corpus.
//! `ids-agent detect [path|-]` replays ndjson packets (stdin by default) through the
//! trained pipeline until EOF or Ctrl+C, printing one verdict line per packet.
//! A `.env` file in the working directory is read before the config overlay.

use clap::{Parser, Subcommand};
use ids_agent::{
    alert::{AlertDispatcher, SeverityEngine},
    capture::NdjsonReplay,
    config::IdsConfig,
    corpus::load_kdd,
    logging::StructuredLogger,
    model::ModelBundle,
    pipeline::{evaluate, train, DetectionPipeline},
};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

static STOP: AtomicBool = AtomicBool::new(false);

#[derive(Parser)]
#[command(name = "ids-agent", about = "Network intrusion detection agent", version)]
struct Cli {
    /// JSON config file
    #[arg(long, env = "IDS_CONFIG_PATH", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Fit the pipeline on the training corpus and write the model bundle
    Train,
    /// Classify ndjson packets until EOF or Ctrl+C
    Detect {
        /// Packet file; `-` or omitted reads stdin
        input: Option<PathBuf>,
    },
}

fn run_train(config: &IdsConfig) -> Result<(), BoxError> {
    let records = load_kdd(&config.corpus.train_path)?;
    let (bundle, report) = train(&records, &config.pipeline)?;
    info!(
        input_dim = report.input_dim,
        components = report.components,
        retained_variance = report.retained_variance,
        "pipeline fitted"
    );

    if let Some(test_path) = &config.corpus.test_path {
        if test_path.exists() {
            let held_out = load_kdd(test_path)?;
            let eval = evaluate(&bundle, &held_out)?;
            info!(accuracy = eval.accuracy, "held-out accuracy");
        } else {
            warn!(path = %test_path.display(), "test corpus not found; skipping evaluation");
        }
    }

    bundle.save(&config.model_path)?;
    Ok(())
}

fn run_detect(config: &IdsConfig, input: Option<&Path>) -> Result<(), BoxError> {
    let bundle = match ModelBundle::load(&config.model_path) {
        Ok(b) => Arc::new(b),
        Err(e) => {
            error!(error = %e, "cannot start detection without a trained model; run `ids-agent train`");
            return Err(e.into());
        }
    };

    let dispatcher = AlertDispatcher::from_config(&config.alerts, &config.audit_path())?;
    let pipeline = DetectionPipeline::new(bundle, dispatcher, SeverityEngine::new(&config.alerts))?;

    if let Err(e) = ctrlc::set_handler(|| STOP.store(true, Ordering::Relaxed)) {
        warn!(error = %e, "ctrl+c handler not installed");
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let stats = match input.filter(|p| *p != Path::new("-")) {
        None => {
            let mut source = NdjsonReplay::new(std::io::stdin().lock());
            pipeline.run(&mut source, &STOP, &mut out)?
        }
        Some(path) => {
            let file = std::fs::File::open(path)?;
            let mut source = NdjsonReplay::new(BufReader::new(file));
            pipeline.run(&mut source, &STOP, &mut out)?
        }
    };
    info!(
        received = stats.received,
        attacks = stats.attacks,
        skipped = stats.skipped,
        "ids-agent stopping"
    );
    Ok(())
}

fn main() -> Result<(), BoxError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let loaded = IdsConfig::try_load(&cli.config);
    let mut config = loaded.as_ref().ok().cloned().unwrap_or_default();
    config.apply_env();

    StructuredLogger::init(config.log.json, &config.log.level);
    if let Err(e) = &loaded {
        warn!(path = %cli.config.display(), error = %e, "config file rejected; using defaults");
    }
    info!(data_dir = ?config.data_dir, model = ?config.model_path, "ids-agent starting");

    match &cli.command {
        Command::Train => run_train(&config),
        Command::Detect { input } => run_detect(&config, input.as_deref()),
    }
}
