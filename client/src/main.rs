use clap::Parser;
use client::config::{DEFAULT_MAP, DEFAULT_SERVER_URL};
use client::{Client, ConnectionConfig, Intent, MoveInput, SessionEnd, SyncConfig};
use log::{info, warn};
use shared::Vec2;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket endpoint of the game server
    #[arg(short = 's', long, default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Player identity, also sent as the connection token
    #[arg(short = 'u', long)]
    username: String,

    /// Map (room) to join
    #[arg(short = 'm', long, default_value = DEFAULT_MAP)]
    map: String,

    /// Reconnect attempts before giving up
    #[arg(long, default_value = "5")]
    max_reconnect_attempts: u32,

    /// Delay between reconnect attempts in milliseconds
    #[arg(long, default_value = "3000")]
    reconnect_delay_ms: u64,

    /// Heartbeat interval in milliseconds
    #[arg(long, default_value = "30000")]
    heartbeat_ms: u64,

    /// Frame tick in milliseconds
    #[arg(long, default_value = "16")]
    tick_ms: u64,
}

impl Args {
    fn sync_config(&self) -> SyncConfig {
        let connection = ConnectionConfig::default()
            .with_server_url(self.server.as_str())
            .with_max_reconnect_attempts(self.max_reconnect_attempts)
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .with_heartbeat_interval(Duration::from_millis(self.heartbeat_ms));
        SyncConfig::default().with_connection(connection)
    }
}

/// Parses one console line into an intent. Anything that is not a command is chat.
fn parse_command(line: &str) -> Option<Intent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    if !line.starts_with('/') {
        return Some(Intent::Chat(line.to_string()));
    }

    let mut parts = line.split_whitespace();
    let command = parts.next()?;
    let mut vector = || -> Option<Vec2> {
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        Some(Vec2::new(x, y))
    };

    match command {
        "/ready" => Some(Intent::ReadyToggle),
        "/quit" => Some(Intent::Quit),
        "/hide" => Some(Intent::Visibility(false)),
        "/show" => Some(Intent::Visibility(true)),
        "/attack" => vector().map(Intent::Attack),
        "/move" => vector().map(|direction| {
            Intent::Move(MoveInput {
                direction,
                facing_left: (direction.x != 0.0).then_some(direction.x < 0.0),
            })
        }),
        _ => None,
    }
}

async fn read_console(intents: mpsc::UnboundedSender<Intent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_command(&line) {
            Some(intent) => {
                if intents.send(intent).is_err() {
                    break;
                }
            }
            None if line.trim().is_empty() => {}
            None => warn!("Unknown command: {}", line.trim()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {} as {} (map {})", args.server, args.username, args.map);
    info!("Commands: /ready, /move X Y, /attack X Y, /hide, /show, /quit; anything else is chat");

    let mut client = Client::new(args.sync_config(), &args.username, &args.map)
        .with_frame_interval(Duration::from_millis(args.tick_ms));

    tokio::spawn(read_console(client.intents()));

    match client.run().await? {
        SessionEnd::Quit => info!("Session closed"),
        SessionEnd::RoomShutdown { reason } => info!("Room closed: {}", reason),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("/ready"), Some(Intent::ReadyToggle));
        assert_eq!(parse_command("  /quit "), Some(Intent::Quit));
        assert_eq!(parse_command("/attack 1 0"), Some(Intent::Attack(Vec2::new(1.0, 0.0))));
        assert_eq!(parse_command("hello there"), Some(Intent::Chat("hello there".into())));
        assert_eq!(parse_command("/attack left"), None);
        assert_eq!(parse_command("/dance"), None);
        assert_eq!(parse_command("   "), None);
    }

    #[test]
    fn test_move_sets_facing() {
        match parse_command("/move -1 0") {
            Some(Intent::Move(input)) => {
                assert_eq!(input.direction, Vec2::new(-1.0, 0.0));
                assert_eq!(input.facing_left, Some(true));
            }
            other => panic!("unexpected {:?}", other),
        }
        match parse_command("/move 0 1") {
            Some(Intent::Move(input)) => assert_eq!(input.facing_left, None),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_args_map_into_config() {
        let args = Args::parse_from([
            "client",
            "--username",
            "alice",
            "--max-reconnect-attempts",
            "2",
            "--heartbeat-ms",
            "1000",
        ]);
        let config = args.sync_config();
        assert_eq!(config.connection.max_reconnect_attempts, 2);
        assert_eq!(config.connection.heartbeat_interval, Duration::from_millis(1000));
        assert_eq!(config.connection.server_url, DEFAULT_SERVER_URL);
        assert_eq!(args.map, DEFAULT_MAP);
    }
}
