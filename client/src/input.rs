//! Console input mapping.
//!
//! The headless client reads one line per keystroke burst from stdin. Short
//! aliases mirror the usual keyboard layout (`w`/`s` or `up`/`down`).

use shared::PlayerCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleAction {
    Send(PlayerCommand),
    Quit,
}

/// Maps a console line to an action. Unknown input yields `None`.
pub fn parse_console_line(line: &str) -> Option<ConsoleAction> {
    let action = match line.trim().to_ascii_lowercase().as_str() {
        "w" | "k" | "up" => ConsoleAction::Send(PlayerCommand::Up),
        "s" | "j" | "down" => ConsoleAction::Send(PlayerCommand::Down),
        "" | "x" | "stay" | "stop" => ConsoleAction::Send(PlayerCommand::Stay),
        "r" | "ready" => ConsoleAction::Send(PlayerCommand::Ready),
        "q" | "quit" | "exit" => ConsoleAction::Quit,
        _ => return None,
    };
    Some(action)
}

pub const HELP: &str = "commands: w/up, s/down, <enter>/stay, r/ready, q/quit";
