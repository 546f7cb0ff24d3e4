use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use client::connection::{self, Command as SessionCommand};
use client::{ClientError, HeadlessPlayer, SessionConfig, SyncEvent, SyncSession};
use serde_json::{Value, json};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned HTTP {status}: {message}")]
    ServerError { status: u16, message: String },
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("session task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Parser, Debug)]
#[command(name = "room-cli", about = "Booth room server REST and websocket CLI")]
struct Cli {
    #[arg(long, env = "ROOM_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Ping,
    Rooms(RoomsCommand),
    /// Join a room and log what the sync layer sees.
    Join(JoinArgs),
}

#[derive(Args, Debug)]
struct RoomsCommand {
    #[command(subcommand)]
    command: RoomsSubcommand,
}

#[derive(Subcommand, Debug)]
enum RoomsSubcommand {
    List,
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, env = "ROOM_PASSWORD")]
        password: Option<String>,
    },
}

#[derive(Args, Debug)]
struct JoinArgs {
    #[arg(default_value = "public")]
    room_id: String,

    #[arg(long, default_value = "cli")]
    name: String,

    #[arg(long, env = "ROOM_PASSWORD")]
    password: Option<String>,

    #[arg(long, help = "Send one chat message after joining")]
    say: Option<String>,

    #[arg(long, help = "Leave after this many seconds")]
    seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    let base_url = cli.base_url.trim_end_matches('/').to_owned();

    match cli.command {
        Command::Ping => run_ping(&base_url).await,
        Command::Rooms(rooms) => run_rooms(&base_url, rooms).await,
        Command::Join(args) => run_join(&base_url, args).await,
    }
}

async fn run_ping(base_url: &str) -> Result<(), CliError> {
    let response = reqwest::get(format!("{base_url}/healthz")).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16(), message: "health check failed".to_owned() });
    }
    println!("ok");
    Ok(())
}

async fn run_rooms(base_url: &str, rooms: RoomsCommand) -> Result<(), CliError> {
    let json = match rooms.command {
        RoomsSubcommand::List => api_request(base_url, reqwest::Method::GET, "/api/rooms", None).await?,
        RoomsSubcommand::Create { name, description, password } => {
            let body = json!({ "name": name, "description": description, "password": password });
            api_request(base_url, reqwest::Method::POST, "/api/rooms", Some(body)).await?
        }
    };
    print_json(&json)
}

async fn run_join(base_url: &str, args: JoinArgs) -> Result<(), CliError> {
    let url = connection::join_url(base_url, &args.room_id, &args.name, args.password.as_deref())?;
    let socket = connection::connect(&url).await?;
    tracing::info!(room_id = %args.room_id, "joined");

    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let (event_tx, mut event_rx) = mpsc::channel(256);
    let runner = tokio::spawn(async move {
        let mut session = SyncSession::new(HeadlessPlayer::new(), SessionConfig::default());
        connection::run(socket, &mut session, cmd_rx, event_tx).await
    });

    let deadline = async {
        match args.seconds {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut say = args.say;
    loop {
        tokio::select! {
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                if matches!(event, SyncEvent::Connected { .. }) {
                    if let Some(text) = say.take() {
                        let data = json!({ "content": text });
                        let _ = cmd_tx.send(SessionCommand::Send { syscall: "chat:message".into(), data }).await;
                    }
                }
                log_event(&event);
            }
            () = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let _ = cmd_tx.send(SessionCommand::Close).await;
    runner.await??;
    Ok(())
}

fn log_event(event: &SyncEvent) {
    match event {
        SyncEvent::Connected { client_id } => tracing::info!(%client_id, "session connected"),
        SyncEvent::RoomData(room) => tracing::info!(name = %room.name, seed = room.background_seed, "room data"),
        SyncEvent::TrackStarted { stream_id, link, title, position_secs, ambient } => tracing::info!(
            stream_id,
            %link,
            title = title.as_deref().unwrap_or("-"),
            position_secs,
            ambient,
            "track started"
        ),
        SyncEvent::TrackStopped => tracing::info!("track stopped"),
        SyncEvent::ClockSynced { offset_ms, rtt_ms } => tracing::info!(offset_ms, rtt_ms, "clock synced"),
        SyncEvent::Resync { expected, got } => tracing::warn!(expected, got, "patch gap, resyncing"),
        SyncEvent::MissedTrack { stream_id } => tracing::warn!(stream_id, "missed track start, resyncing"),
        SyncEvent::ServerError { syscall, code, message } => {
            tracing::warn!(%syscall, code = code.as_deref().unwrap_or("-"), %message, "server error");
        }
        other => tracing::debug!(event = ?other, "sync event"),
    }
}

async fn api_request(
    base_url: &str,
    method: reqwest::Method,
    path: &str,
    body: Option<Value>,
) -> Result<Value, CliError> {
    let client = reqwest::Client::new();
    let request = client.request(method, format!("{base_url}{path}"));
    let request = if let Some(json) = body { request.json(&json) } else { request };

    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(CliError::ServerError { status: status.as_u16(), message: text });
    }
    Ok(serde_json::from_str(&text)?)
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
