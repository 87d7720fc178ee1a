//! Chat command parsing
//!
//! Commands may use any configured prefix (`/play`, `!play`, `.play`), an
//! optional `@botname` suffix, and whitespace separated arguments.

/// Commands the bot answers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Play,
    VPlay,
    Seek,
    Skip,
    Pause,
    Resume,
    Stop,
    Queue,
}

impl Command {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "play" => Some(Command::Play),
            "vplay" => Some(Command::VPlay),
            "seek" => Some(Command::Seek),
            "skip" | "next" => Some(Command::Skip),
            "pause" => Some(Command::Pause),
            "resume" => Some(Command::Resume),
            "stop" | "end" => Some(Command::Stop),
            "queue" => Some(Command::Queue),
            _ => None,
        }
    }

    /// Commands that change playback for everyone in the chat
    pub fn is_admin_only(&self) -> bool {
        matches!(
            self,
            Command::Seek | Command::Skip | Command::Pause | Command::Resume | Command::Stop
        )
    }
}

/// A recognised command with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: Command,
    /// Lower-cased command name as typed, without prefix
    pub name: String,
    pub args: Vec<String>,
}

impl ParsedCommand {
    /// Parse `text` as a command.
    ///
    /// Returns `None` for ordinary messages, unknown commands, and commands
    /// addressed to another bot.
    pub fn parse(text: &str, prefixes: &[String], bot_username: &str) -> Option<Self> {
        let text = text.trim_start();

        // Longest prefix first so "!!" beats "!"
        let mut sorted: Vec<&String> = prefixes.iter().filter(|p| !p.is_empty()).collect();
        sorted.sort_by_key(|p| std::cmp::Reverse(p.len()));
        let rest = sorted.iter().find_map(|p| text.strip_prefix(p.as_str()))?;

        let mut tokens = rest.split_whitespace();
        let head = tokens.next()?;

        let name = match head.split_once('@') {
            Some((name, target)) => {
                if !target.eq_ignore_ascii_case(bot_username) {
                    return None;
                }
                name
            }
            None => head,
        }
        .to_lowercase();

        let command = Command::from_name(&name)?;

        Some(Self {
            command,
            name,
            args: tokens.map(str::to_string).collect(),
        })
    }

    /// Arguments joined back into one query string
    pub fn query(&self) -> String {
        self.args.join(" ")
    }
}
