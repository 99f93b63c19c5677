use std::path::PathBuf;

/// A line typed in the interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Prompt(String),
    History,
    Branch(usize),
    Edit(String),
    Send,
    Cancel,
    Upload(PathBuf),
    /// Show the log filter, or replace it when a level is given
    LogLevel(Option<String>),
    Help,
    Quit,
    Empty,
    Invalid(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return ChatCommand::Empty;
        }
        if !trimmed.starts_with('/') {
            return ChatCommand::Prompt(line.trim_end_matches(['\r', '\n']).to_string());
        }

        let (name, arg) = match trimmed.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (trimmed, ""),
        };

        match name {
            "/history" | "/h" => ChatCommand::History,
            "/branch" | "/b" => match arg.parse() {
                Ok(index) => ChatCommand::Branch(index),
                Err(_) => ChatCommand::Invalid("usage: /branch <index>".to_string()),
            },
            "/edit" | "/e" => ChatCommand::Edit(arg.to_string()),
            "/send" | "/s" => ChatCommand::Send,
            "/cancel" | "/c" => ChatCommand::Cancel,
            "/upload" | "/u" if !arg.is_empty() => ChatCommand::Upload(PathBuf::from(arg)),
            "/upload" | "/u" => ChatCommand::Invalid("usage: /upload <path>".to_string()),
            "/log" if arg.is_empty() => ChatCommand::LogLevel(None),
            "/log" => ChatCommand::LogLevel(Some(arg.to_string())),
            "/help" | "/?" => ChatCommand::Help,
            "/quit" | "/exit" | "/q" => ChatCommand::Quit,
            other => ChatCommand::Invalid(format!("unknown command: {}", other)),
        }
    }
}

pub const HELP: &str = "\
/history          list messages with their index and id
/branch <index>   resume from a confirmed message, pre-filling the draft
/edit <text>      replace the draft
/send             submit the draft
/cancel           leave branching mode
/upload <path>    add a .txt or .pdf file to the knowledge base
/log [level]      show or change the log filter, e.g. /log jules_session=debug
/quit             leave";
