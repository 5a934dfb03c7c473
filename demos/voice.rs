use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;
use voice_session::media::{NativeAudioOutput, NativeMediaDevices};
use voice_session::transport::webrtc::WebRtcTransportFactory;
use voice_session::types::settings::DEFAULT_INSTRUCTIONS;
use voice_session::types::{Model, SessionConfig, Voice};
use voice_session::{Config, SessionCallbacks, SessionManager, SettingsStore};

#[derive(Parser, Debug)]
#[command(version, about = "Talk to the realtime voice service from the terminal")]
struct Args {
    #[arg(long, default_value = "nova")]
    voice: String,

    #[arg(long, default_value = "tts-1")]
    model: String,

    #[arg(long)]
    instructions: Option<String>,

    /// Input device name, see the `devices` example
    #[arg(long)]
    input: Option<String>,

    #[arg(long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv_override().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Args::parse();
    let settings = SettingsStore::new(SessionConfig::new(
        Voice::from(args.voice.as_str()),
        Model::from(args.model.as_str()),
        args.instructions.as_deref().unwrap_or(DEFAULT_INSTRUCTIONS),
    ));

    let callbacks = SessionCallbacks::new()
        .on_stream_start(|| println!("** streaming"))
        .on_stream_end(|| println!("** stopped"))
        .on_error(|e| eprintln!("** error: {e}"))
        .on_message_received(|m| {
            if let Some(text) = m.transcript() {
                println!("{}: {}", m.role().as_str(), text);
            }
        });

    let manager = SessionManager::builder(Config::new())
        .with_settings(Arc::new(settings.clone()))
        .with_media(Arc::new(NativeMediaDevices::new(args.input)))
        .with_output(Arc::new(NativeAudioOutput::new(args.output)))
        .with_transport(Arc::new(WebRtcTransportFactory))
        .with_callbacks(callbacks)
        .build()?;

    manager.connect().await?;
    println!("commands: voice <name> | model <name> | say <instructions> | diag | toggle | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let (command, rest) = line.trim().split_once(' ').unwrap_or((line.trim(), ""));
                match command {
                    "voice" => settings.set_voice(Voice::from(rest)),
                    "model" => settings.set_model(Model::from(rest)),
                    "say" => settings.set_instructions(rest),
                    "diag" => match manager.run_diagnostics().await {
                        Some(issues) if issues.is_empty() => println!("no issues"),
                        Some(issues) => issues.iter().for_each(|i| println!("issue: {i}")),
                        None => println!("diagnostics already ran for this session"),
                    },
                    "toggle" => {
                        if let Err(e) = manager.connect().await {
                            eprintln!("connect failed: {e}");
                        }
                    }
                    "quit" | "q" => break,
                    "" => {}
                    other => println!("unknown command: {other}"),
                }
                println!("status: {:?}", manager.status());
            }
        }
    }

    manager.disconnect();
    Ok(())
}
