//! blogcast: blog post → spoken podcast clip.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use blogcast::api::{self, AppState};
use blogcast::config::{Config, CondenserKind, SynthesizerKind};
use blogcast::history::RunHistory;
use blogcast::notifier::Notifier;
use blogcast::speech::EspeakEngine;
use blogcast::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "blogcast", about = "Turn blog posts into short podcast clips")]
struct Args {
    /// Path to config.yaml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one podcast from a blog URL
    Generate {
        url: String,

        /// Condensing strategy: truncate or ollama
        #[arg(long)]
        condenser: Option<String>,

        /// Speech backend: network or offline
        #[arg(long)]
        synthesizer: Option<String>,

        /// Output directory (overrides store.root)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start the web UI
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List voices available to the offline engine
    Voices {
        /// Only show voices for this language
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Show the run report for a date (today, list, or YYYY-MM-DD)
    Report {
        #[arg(default_value = "today")]
        date: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info,html5ever=info,selectors=info")
    } else {
        EnvFilter::new("info,hyper=warn,reqwest=warn,html5ever=warn,selectors=warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = Config::load(args.config.as_deref());

    match args.command {
        Command::Generate {
            url,
            condenser,
            synthesizer,
            output,
        } => {
            if let Some(name) = condenser {
                config.condenser.strategy = CondenserKind::from_str(&name)
                    .ok_or_else(|| format!("Unknown condenser '{name}' (expected truncate or ollama)"))?;
            }
            if let Some(name) = synthesizer {
                config.synthesizer.backend = SynthesizerKind::from_str(&name)
                    .ok_or_else(|| format!("Unknown synthesizer '{name}' (expected network or offline)"))?;
            }
            if let Some(dir) = output {
                config.store.root = dir;
            }
            generate(&config, &url).await
        }
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let pipeline = Pipeline::from_config(&config)?;
            info!(
                "Pipeline ready (condenser: {}, synthesizer: {}, output: {})",
                pipeline.condenser_kind().as_str(),
                pipeline.synthesizer_kind().as_str(),
                pipeline.store().root().display()
            );
            let state = AppState {
                pipeline: Arc::new(pipeline),
            };
            api::serve(state, &host, port).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Voices { language } => {
            let engine = EspeakEngine::new(&config.synthesizer.offline);
            for voice in engine.list_voices(language.as_deref()).await? {
                println!("{:<12} {:<2} {}", voice.language, voice.gender, voice.name);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Report { date } => {
            let history = RunHistory::new(&config.history);
            if date == "list" {
                let dates = history.list_dates();
                if dates.is_empty() {
                    println!("No run history yet.");
                }
                for date in dates {
                    println!("{date}");
                }
            } else {
                println!("{}", history.report(&date));
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn generate(config: &Config, url: &str) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if url.trim().is_empty() {
        eprintln!("⚠️  Please enter a valid URL.");
        return Ok(ExitCode::from(2));
    }

    let pipeline = Pipeline::from_config(config)?;
    let notifier = Notifier::new(config.feedback.notifications);

    let result = pipeline.run(url).await;
    notifier.run_finished(&result);

    match result {
        Ok(outcome) => {
            println!("🔍 Summary\n\n{}\n", outcome.script);
            println!("✅ Podcast generated and saved!");
            println!("   text:     {}", outcome.record.text_path.display());
            println!("   audio:    {}", outcome.record.audio_path.display());
            println!("   metadata: {}", outcome.record.metadata_path.display());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("❌ An error occurred: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
