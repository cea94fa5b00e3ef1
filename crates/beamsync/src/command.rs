//! Operator commands read line by line from stdin

use beamsync_core::ControlState;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::BufRead;
use std::str::FromStr;
use std::thread;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch between listen, record and play
    State(ControlState),
    /// Re-map every channel of every known universe
    Refresh,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        match line.trim().to_ascii_lowercase().as_str() {
            "listen" => Ok(Command::State(ControlState::Listen)),
            "record" => Ok(Command::State(ControlState::Record)),
            "play" => Ok(Command::State(ControlState::Play)),
            "refresh" => Ok(Command::Refresh),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

fn forward<R: BufRead>(input: R, tx: &Sender<Command>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read command input: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                if tx.send(command).is_err() {
                    return;
                }
            }
            Err(e) => warn!("{}", e),
        }
    }
    // End of input stops the bridge
    let _ = tx.send(Command::Quit);
}

/// Read commands from stdin on a background thread.
///
/// The thread is left detached: it blocks on stdin and ends with the process.
pub fn spawn_stdin_reader() -> std::io::Result<Receiver<Command>> {
    let (tx, rx) = unbounded();
    thread::Builder::new()
        .name("command-reader".to_string())
        .spawn(move || {
            info!("Reading commands from stdin (listen, record, play, refresh, quit)");
            forward(std::io::stdin().lock(), &tx);
        })?;
    Ok(rx)
}
