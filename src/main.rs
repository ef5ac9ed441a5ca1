use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use cueplay::core::format_timecode;
use cueplay::{input, PlaybackEvent, Player, Settings};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Play a subtitle file in real time on the terminal
#[derive(Debug, Parser)]
#[command(name = "cueplay", version, about)]
struct Cli {
    /// Subtitle file (numbered blocks with `HH:MM:SS,mmm --> HH:MM:SS,mmm` timing)
    file: PathBuf,

    /// Start position in milliseconds
    #[arg(long, value_name = "MS")]
    start: Option<i64>,

    /// Rewind/forward distance in milliseconds
    #[arg(long, value_name = "MS")]
    skip_ms: Option<u64>,

    /// Print position ticks
    #[arg(long)]
    positions: bool,

    /// Print one JSON object per line instead of plain text
    #[arg(long)]
    json: bool,

    /// Remember --skip-ms and --positions for later runs
    #[arg(long)]
    save: bool,
}

/// One line of output
#[derive(Debug, Serialize)]
#[serde(tag = "channel", rename_all = "lowercase")]
enum Output {
    Content { text: String },
    Position { ms: u64 },
    Event { event: PlaybackEvent },
}

impl Output {
    fn print(&self, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string(self)?);
            return Ok(());
        }

        let now = Local::now().format("%H:%M:%S%.3f");
        match self {
            Output::Content { text } if text.is_empty() => println!("[{}] --", now),
            Output::Content { text } => {
                for line in text.lines() {
                    println!("[{}] {}", now, line);
                }
            }
            Output::Position { ms } => println!("[{}] @ {}", now, format_timecode(*ms)),
            Output::Event { event } => println!("[{}] <{}>", now, event),
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cueplay=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::load();
    if let Some(skip_ms) = cli.skip_ms {
        settings.player.skip_ms = skip_ms;
    }
    let show_positions = cli.positions || settings.show_positions;
    if cli.save {
        settings.show_positions = show_positions;
        settings.save()?;
        info!("Saved settings");
    }

    let raw = input::load_file(&cli.file)?;
    let player = Player::new(settings.player.clone()).context("Failed to create player")?;
    player.load(&raw);
    info!(
        "{}: {} cues, ends at {}",
        cli.file.display(),
        player.cues().len(),
        format_timecode(player.end_time_ms())
    );

    if let Some(start) = cli.start {
        player.seek(start);
    }

    let mut content = player.subscribe_content();
    let mut position = player.subscribe_position();
    let mut events = player.subscribe_events();

    player.play();
    if !player.is_playing() {
        warn!("Nothing to play");
        return Ok(());
    }

    loop {
        tokio::select! {
            item = content.recv() => match item {
                Ok(text) => Output::Content { text }.print(cli.json)?,
                Err(RecvError::Lagged(n)) => warn!("Dropped {} subtitle updates", n),
                Err(RecvError::Closed) => break,
            },
            item = position.recv() => match item {
                Ok(ms) if show_positions => Output::Position { ms }.print(cli.json)?,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            item = events.recv() => match item {
                Ok(event) => {
                    Output::Event { event }.print(cli.json)?;
                    if event == PlaybackEvent::Stop {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted at {}", format_timecode(player.position_ms()));
                player.stop();
            }
        }
    }

    Ok(())
}
