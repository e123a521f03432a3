use std::fmt;
use std::str::FromStr;

pub const HELP: &str = "\
Commands:
  ports              list serial ports and their state
  open <port>        open a port and start streaming telemetry
  close              close the open port
  start              start the launch sequence
  abort              abort the running launch sequence
  status             print the status bar
  parsed on|off      show or hide every decoded telemetry record
  help               this text
  quit               exit the console";

/// One operator command typed on stdin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ports,
    Open(String),
    Close,
    Start,
    Abort,
    Status,
    Parsed(bool),
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError(String);

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (type 'help' for commands)", self.0)
    }
}

impl std::error::Error for CommandError {}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(verb) = words.next() else {
            return Err(CommandError("empty command".into()));
        };
        let arg = words.next();
        if words.next().is_some() {
            return Err(CommandError(format!("too many arguments for '{verb}'")));
        }

        let no_arg = |command: Command| match arg {
            None => Ok(command),
            Some(extra) => Err(CommandError(format!("'{verb}' takes no argument, got '{extra}'"))),
        };

        match verb.to_ascii_lowercase().as_str() {
            "ports" | "ls" => no_arg(Command::Ports),
            "open" => arg
                .map(|port| Command::Open(port.to_string()))
                .ok_or_else(|| CommandError("usage: open <port>".into())),
            "close" => no_arg(Command::Close),
            "start" | "launch" => no_arg(Command::Start),
            "abort" => no_arg(Command::Abort),
            "status" => no_arg(Command::Status),
            "parsed" => match arg.map(str::to_ascii_lowercase).as_deref() {
                Some("on") => Ok(Command::Parsed(true)),
                Some("off") => Ok(Command::Parsed(false)),
                _ => Err(CommandError("usage: parsed on|off".into())),
            },
            "help" | "?" => no_arg(Command::Help),
            "quit" | "exit" => no_arg(Command::Quit),
            other => Err(CommandError(format!("unknown command '{other}'"))),
        }
    }
}
