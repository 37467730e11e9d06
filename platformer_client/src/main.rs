//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p platformer_client -- [--config client.json] [--addr 127.0.0.1:40000]
//!                                     [--name alice] [--singleplayer]
//!
//! Runs the paced frame loop without a window. Movement comes from console
//! commands:
//!   left | right  - Start walking that way
//!   stop          - Stop walking
//!   jump          - Jump once
//!   status        - Log the held input
//!   quit          - Exit client

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use platformer_client::client::{GameClient, RunEnd};
use platformer_client::input::{InputSource, InputState};
use platformer_shared::config::ClientConfig;
use platformer_shared::render::NullRenderer;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Left,
    Right,
    Stop,
    Jump,
    Status,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        match line {
            "left" | "a" => Some(Self::Left),
            "right" | "d" => Some(Self::Right),
            "stop" | "s" => Some(Self::Stop),
            "jump" | "w" => Some(Self::Jump),
            "status" => Some(Self::Status),
            "quit" | "exit" => Some(Self::Quit),
            _ => None,
        }
    }
}

/// Turns console commands into held key state.
struct ConsoleInput {
    rx: mpsc::Receiver<Command>,
    held: InputState,
    status_requested: bool,
}

impl InputSource for ConsoleInput {
    fn poll(&mut self) -> Option<InputState> {
        // Jump is a press, not a hold.
        self.held.jump = false;
        loop {
            match self.rx.try_recv() {
                Ok(Command::Left) => {
                    self.held.left = true;
                    self.held.right = false;
                }
                Ok(Command::Right) => {
                    self.held.right = true;
                    self.held.left = false;
                }
                Ok(Command::Stop) => {
                    self.held.left = false;
                    self.held.right = false;
                }
                Ok(Command::Jump) => self.held.jump = true,
                Ok(Command::Status) => self.status_requested = true,
                Ok(Command::Quit) => return None,
                Err(mpsc::error::TryRecvError::Empty) => break,
                // Stdin closed.
                Err(mpsc::error::TryRecvError::Disconnected) => return None,
            }
        }
        if std::mem::take(&mut self.status_requested) {
            info!(held = ?self.held, "Input status");
        }
        Some(self.held)
    }
}

fn parse_args() -> anyhow::Result<ClientConfig> {
    let args: Vec<String> = env::args().collect();

    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) => {
            let path = args.get(i + 1).context("--config needs a path")?;
            ClientConfig::from_json_file(path)?
        }
        None => ClientConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            "--singleplayer" => {
                cfg.multiplayer = false;
                i += 1;
            }
            _ => i += 1,
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    let mut client = GameClient::new(cfg).context("build client")?;
    client.start().context("start transport")?;

    let (console_tx, console_rx) = mpsc::channel::<Command>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match Command::parse(line) {
                Some(cmd) => {
                    if console_tx.blocking_send(cmd).is_err() {
                        break;
                    }
                }
                None => println!("Unknown command: {line}"),
            }
        }
    });

    println!("Type left/right/stop/jump to move, 'quit' to exit.");
    println!();

    let mut input = ConsoleInput {
        rx: console_rx,
        held: InputState::default(),
        status_requested: false,
    };
    let mut renderer = NullRenderer;

    let end = client.run(&mut input, &mut renderer);
    match end {
        RunEnd::Completed => println!("All levels complete. Score: {}", client.player().score),
        RunEnd::Quit => println!("Bye."),
    }
    Ok(())
}
