use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::time::Duration;

use clap::{Parser, Subcommand};
use cli::{ClientError, RoomClient};
use frames::{Element, ServerEvent};
use serde_json::{Value, json};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "whiteboard-cli", about = "Whiteboard room REST and websocket CLI")]
struct Cli {
    #[arg(long, env = "WHITEBOARD_BASE_URL", default_value = "http://127.0.0.1:5001")]
    base_url: String,

    /// Seconds to wait for each request's reply.
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the room's persisted element log.
    Replay { room_id: String },
    /// Print the room's chat history, oldest first.
    Messages {
        room_id: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Join the room and print every notification as a JSON line.
    Watch {
        room_id: String,
        /// Print the replayed log before live events.
        #[arg(long, default_value_t = false)]
        replay: bool,
    },
    /// Commit elements read as JSON lines. A missing `id` is generated.
    Commit {
        room_id: String,
        #[arg(long, default_value = "-", help = "Input file path, or - for stdin")]
        input: String,
    },
    /// Clear every element in the room.
    Clear { room_id: String },
    /// Post one chat line.
    Chat { room_id: String, content: String },
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout_secs.max(1));
    let base_url = cli.base_url.as_str();

    match cli.command {
        Command::Replay { room_id } => {
            let elements = cli::fetch_elements(&reqwest::Client::new(), base_url, &room_id).await?;
            print_json(&serde_json::to_value(elements)?)
        }
        Command::Messages { room_id, limit } => {
            let messages = cli::fetch_messages(&reqwest::Client::new(), base_url, &room_id, limit).await?;
            print_json(&serde_json::to_value(messages)?)
        }
        Command::Watch { room_id, replay } => run_watch(base_url, &room_id, replay).await,
        Command::Commit { room_id, input } => run_commit(base_url, &room_id, &input, timeout).await,
        Command::Clear { room_id } => {
            let mut client = RoomClient::connect(base_url, &room_id).await?.with_reply_timeout(timeout);
            let removed = client.clear().await?;
            eprintln!("cleared room {room_id}: removed={removed}");
            client.close().await
        }
        Command::Chat { room_id, content } => {
            let mut client = RoomClient::connect(base_url, &room_id).await?.with_reply_timeout(timeout);
            let created_at = client.chat(&content).await?;
            eprintln!("sent message to {room_id}: created_at={created_at}");
            client.close().await
        }
    }
}

async fn run_watch(base_url: &str, room_id: &str, replay: bool) -> Result<(), ClientError> {
    let (mut client, snapshot) = RoomClient::enter(base_url, room_id).await?;
    if replay {
        for element in snapshot {
            print_line(&json!({ "event": "replay", "element": element }))?;
        }
    }
    eprintln!("watching room {room_id} as {}", client.client_id());

    loop {
        let event = match client.next_event().await {
            Ok(event) => event,
            Err(ClientError::Closed) => {
                eprintln!("server closed the connection");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        print_line(&event_json(&event))?;
    }
}

async fn run_commit(base_url: &str, room_id: &str, input: &str, timeout: Duration) -> Result<(), ClientError> {
    let mut reader: Box<dyn BufRead> = if input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(input).map_err(|error| ClientError::InvalidInput(format!("open {input}: {error}")))?;
        Box::new(BufReader::new(file))
    };

    let mut client = RoomClient::connect(base_url, room_id).await?.with_reply_timeout(timeout);
    let mut sent = 0_usize;
    let mut skipped = 0_usize;
    let mut line = String::new();
    loop {
        line.clear();
        let bytes = reader
            .read_line(&mut line)
            .map_err(|error| ClientError::InvalidInput(format!("read {input}: {error}")))?;
        if bytes == 0 {
            break;
        }

        let Some(element) = parse_element_line(&line)? else {
            skipped = skipped.saturating_add(1);
            continue;
        };
        client.commit(&element).await?;
        sent = sent.saturating_add(1);
    }

    eprintln!("commit complete: room_id={room_id} committed={sent} skipped={skipped}");
    client.close().await
}

/// Parse one JSON line into an element, generating an id when absent.
///
/// Blank lines yield `None`.
fn parse_element_line(line: &str) -> Result<Option<Element>, ClientError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let mut value = serde_json::from_str::<Value>(trimmed)?;
    let Some(map) = value.as_object_mut() else {
        return Err(ClientError::InvalidInput(format!("expected a JSON object: {trimmed}")));
    };
    map.remove("room_id");
    map.entry("id").or_insert_with(|| Value::String(Uuid::new_v4().to_string()));

    let element = serde_json::from_value::<Element>(value)?;
    element
        .validate()
        .map_err(|error| ClientError::InvalidInput(error.to_string()))?;
    Ok(Some(element))
}

fn event_json(event: &ServerEvent) -> Value {
    match event {
        ServerEvent::Connected { client_id } => json!({ "event": "connected", "client_id": client_id }),
        ServerEvent::ElementCommitted { element } => json!({ "event": "element", "element": element }),
        ServerEvent::Cleared { room_id } => json!({ "event": "cleared", "room_id": room_id }),
        ServerEvent::Message(message) => json!({ "event": "message", "message": message }),
        ServerEvent::Ack { parent_id, syscall } => json!({ "event": "ack", "parent_id": parent_id, "syscall": syscall }),
        ServerEvent::Failed { syscall, code, message, retryable, .. } => json!({
            "event": "error",
            "syscall": syscall,
            "code": code,
            "message": message,
            "retryable": retryable,
        }),
    }
}

fn print_json(value: &Value) -> Result<(), ClientError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn print_line(value: &Value) -> Result<(), ClientError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
