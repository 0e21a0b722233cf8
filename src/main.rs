use std::path::PathBuf;

use anyhow::anyhow;
use clap::{Parser, Subcommand};

use voicepipe::{
    AppConfig, RunConfig, init,
    pipeline::{list_runs, run_pipeline},
};

/// voicepipe - Resumable voice-note transcription pipeline
#[derive(Parser, Debug)]
#[command(name = "voicepipe")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the transcription pipeline over a chat export
    Run {
        /// Chat export root directory (media paths resolve against it)
        root: PathBuf,

        /// Run identifier; defaults to a slug of the root directory name
        #[arg(long = "run-id")]
        run_id: Option<String>,

        /// Message JSONL to ingest; defaults to <root>/messages.jsonl
        #[arg(long = "source")]
        source: Option<PathBuf>,

        /// Concurrent transcription workers
        #[arg(short = 'w', long = "workers")]
        workers: Option<usize>,

        /// ASR provider override
        #[arg(long = "provider")]
        provider: Option<String>,

        /// ASR model override
        #[arg(long = "model")]
        model: Option<String>,

        /// Language hint override (e.g. "en", "auto")
        #[arg(long = "language")]
        language: Option<String>,

        /// Provider API version override
        #[arg(long = "api-version")]
        api_version: Option<String>,

        /// Keep only every Nth message
        #[arg(long = "sample-every")]
        sample_every: Option<usize>,

        /// Keep at most N messages
        #[arg(long = "sample-limit")]
        sample_limit: Option<usize>,

        /// Start fresh instead of resuming a previous run in the same run dir
        #[arg(long = "no-resume")]
        no_resume: bool,
    },

    /// List runs under a root with their progress and metrics
    Status {
        /// Directory containing runs (or a chat export root with runs/)
        root: PathBuf,
    },

    /// List ASR providers, their models, and backend selection
    Providers,

    /// Verify ffmpeg availability and prepare the cache directory
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    // Load configuration from file or environment
    let config = if let Some(ref config_path) = cli.config {
        AppConfig::from_file(config_path).map_err(|e| anyhow!(e.to_string()))?
    } else {
        AppConfig::from_env().map_err(|e| anyhow!(e.to_string()))?
    };

    match cli.command {
        Commands::Run {
            root,
            run_id,
            source,
            workers,
            provider,
            model,
            language,
            api_version,
            sample_every,
            sample_limit,
            no_resume,
        } => {
            let mut config = config;
            let audio = &mut config.audio;
            if let Some(provider) = provider {
                audio.asr_provider = provider;
            }
            if model.is_some() {
                audio.asr_model = model;
            }
            if language.is_some() {
                audio.asr_language = language;
            }
            if api_version.is_some() {
                audio.asr_api_version = api_version;
            }
            audio.validate().map_err(|e| anyhow!(e))?;

            let mut run = RunConfig::new(root, run_id.as_deref());
            if let Some(source) = source {
                run.source_file = source;
            }
            if let Some(workers) = workers.or(config.max_workers) {
                run.max_workers = workers;
            }
            run.sample_every = sample_every;
            run.sample_limit = sample_limit;
            run.resume = !no_resume;

            let report = run_pipeline(&config, &run).await?;
            println!(
                "run {} complete: {} messages ({} voice), artifacts in {}",
                report.run_id,
                report.messages_total,
                report.voice_total,
                report.run_dir.display()
            );
        }

        Commands::Status { root } => {
            let runs = list_runs(&root);
            if runs.is_empty() {
                println!("no runs found under {}", root.display());
                return Ok(());
            }
            for run in runs {
                println!(
                    "{}  {}  messages={} voice={} (ok={} failed={}) audio={:.1}s cost=${:.4}",
                    run.run_id,
                    run.status,
                    run.messages_total,
                    run.voice_total,
                    run.voice_ok,
                    run.voice_failed,
                    run.audio_seconds,
                    run.asr_cost_usd
                );
                for step in &run.steps {
                    println!("    {:<12} {:<8} {}/{}", step.name, step.status, step.done, step.total);
                }
                if let Some(error) = &run.error {
                    println!("    error: {error}");
                }
            }
        }

        Commands::Providers => {
            for info in voicepipe::core::asr::list_providers(&config) {
                let credential = match info.env_key {
                    Some(key) if info.credential_present => format!("{key} (set)"),
                    Some(key) => format!("{key} (not set)"),
                    None => "none required".to_string(),
                };
                println!("{} ({})", info.name, info.display_name);
                println!("    backend:    {}", info.active_backend);
                println!("    credential: {credential}");
                println!(
                    "    models:     {} (default {})",
                    info.available_models.join(", "),
                    info.default_model
                );
                println!(
                    "    languages:  {} (default {})",
                    info.languages.join(", "),
                    info.default_language
                );
                if !info.api_versions.is_empty() {
                    println!("    api:        {}", info.api_versions.join(", "));
                }
            }
        }

        Commands::Init => {
            init::run(&config).await?;
            println!("voicepipe is ready");
        }
    }

    Ok(())
}
