use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use std::path::PathBuf;
use std::sync::Arc;

use intentd::ModelBundle;

#[derive(Parser)]
#[command(
    name = "intentd",
    about = "HTTP service for text intent classification backed by a pretrained linear model."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP classification service
    Serve {
        /// Address to bind to
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: String,

        /// Directory holding the model artifact files
        #[arg(long, default_value = "models")]
        model_dir: PathBuf,

        /// Rate limit in requests per minute per IP (0 = no limit)
        #[arg(long, default_value_t = 60)]
        rate_limit: u32,

        /// Path for JSONL access log
        #[arg(long, default_value = "intentd-access.jsonl")]
        access_log: String,
    },

    /// Classify a single text locally without starting the server
    Classify {
        /// The text to classify
        text: String,

        /// Directory holding the model artifact files
        #[arg(long, default_value = "models")]
        model_dir: PathBuf,

        /// Output format: json or summary
        #[arg(long, default_value = "summary")]
        format: String,
    },
}

fn cmd_serve(bind: String, model_dir: PathBuf, rate_limit: u32, access_log: String) -> Result<()> {
    use intentd::server::{run_server, ServerConfig};

    let bind_addr = bind
        .parse()
        .wrap_err_with(|| format!("Invalid bind address: {}", bind))?;

    // Load artifacts before binding the listener: a missing or malformed
    // model is a startup-fatal error, not a per-request one.
    let bundle = Arc::new(ModelBundle::load(&model_dir)?);

    let config = ServerConfig {
        bind_addr,
        rate_limit_rpm: rate_limit,
        access_log_path: access_log,
        ..Default::default()
    };

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_server(config, bundle))?;

    Ok(())
}

fn cmd_classify(text: String, model_dir: PathBuf, format: String) -> Result<()> {
    let bundle = ModelBundle::load(&model_dir)?;
    let prediction = bundle.classify(&text);

    match format.as_str() {
        "json" => {
            let result = serde_json::json!({
                "text": text,
                "intent": prediction.intent,
                "confidence": prediction.confidence,
                "model_name": bundle.model_name(),
                "digest": bundle.digest(),
            });
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            println!("Intent Classification");
            println!("=====================");
            println!("Text:       {}", text);
            println!("Intent:     {}", prediction.intent);
            println!("Confidence: {:.1}%", prediction.confidence * 100.0);
            println!();
            println!("Model:  {}", bundle.model_name());
            println!("Digest: {}", bundle.digest());
        }
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            bind,
            model_dir,
            rate_limit,
            access_log,
        } => cmd_serve(bind, model_dir, rate_limit, access_log),
        Commands::Classify {
            text,
            model_dir,
            format,
        } => cmd_classify(text, model_dir, format),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}
