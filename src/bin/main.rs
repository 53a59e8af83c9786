//! Payment agent CLI - run the agent on text, bill images or recordings

use clap::{Parser, Subcommand};
use payment_agent::{
    agent::{bill_image_request, PaymentAgent},
    config::AgentConfig,
    speech::{save_speech, OpenAiSpeech, OpenAiTranscriber, Transcriber},
    AgentRun,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "payment-agent")]
#[command(version)]
#[command(about = "Turn bill photos and spoken transfer requests into payment messages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Save the final answer as spoken mp3 to this path
    #[arg(long, global = true)]
    speak_to: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent on a typed request
    Text {
        /// Request, e.g. "Przelej 1000 zł Damianowi Hujcikowi"
        request: String,
    },

    /// Extract a payment from a bill image
    Image {
        /// Path to the bill image (jpg, png, ...)
        path: PathBuf,
    },

    /// Transcribe a recording and run the agent on the transcript
    Audio {
        /// Path to audio file (WAV preferred)
        path: PathBuf,
    },

    /// Print the transcript of a recording
    Transcribe {
        path: PathBuf,
    },

    /// Synthesize text to an mp3 file
    Speak {
        text: String,

        /// Output file
        #[arg(short, long, default_value = "speech.mp3")]
        out: PathBuf,
    },

    /// List the registered capabilities
    Tools,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = AgentConfig::from_env()?;

    if config.api_key.is_empty() {
        warn!("OPENAI_API_KEY not set");
    }

    match cli.command {
        Commands::Text { request } => {
            let agent = PaymentAgent::from_config(&config)?;
            let run = agent.process_request(&request).await;
            report(&config, &run, cli.speak_to.as_deref()).await?;
        }
        Commands::Image { path } => {
            let path = std::fs::canonicalize(&path)?;
            let agent = PaymentAgent::from_config(&config)?;
            let run = agent
                .process_request(&bill_image_request(&path.display().to_string()))
                .await;
            report(&config, &run, cli.speak_to.as_deref()).await?;
        }
        Commands::Audio { path } => {
            let text = transcribe_file(&config, &path).await?;
            info!(transcript = %text, "Recording transcribed");
            let agent = PaymentAgent::from_config(&config)?;
            let run = agent.process_request(&text).await;
            report(&config, &run, cli.speak_to.as_deref()).await?;
        }
        Commands::Transcribe { path } => {
            println!("{}", transcribe_file(&config, &path).await?);
        }
        Commands::Speak { text, out } => {
            let speech = OpenAiSpeech::from_config(&config)?;
            save_speech(&speech, &text, &out).await?;
            println!("{}", out.display());
        }
        Commands::Tools => {
            let agent = PaymentAgent::from_config(&config)?;
            for (name, description) in agent.tools_info() {
                println!("{:<26} {}", name, description);
            }
        }
    }

    Ok(())
}

async fn transcribe_file(config: &AgentConfig, path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    let audio = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.wav".to_string());
    let transcriber = OpenAiTranscriber::from_config(config)?;
    Ok(transcriber.transcribe(audio, &file_name).await?)
}

async fn report(
    config: &AgentConfig,
    run: &AgentRun,
    speak_to: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(run)?);

    if let (Some(path), Some(answer)) = (speak_to, run.final_answer.as_deref()) {
        let speech = OpenAiSpeech::from_config(config)?;
        save_speech(&speech, answer, path).await?;
        info!(path = %path.display(), "Answer saved as speech");
    }

    Ok(())
}
