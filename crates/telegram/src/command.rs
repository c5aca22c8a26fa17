use homegate_common::StreamState;

/// Bot commands the relay understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Enable,
    Disable,
}

/// How a message's text was understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// A slash command this bot does not handle.
    Unknown,
    /// Ordinary text.
    Text,
}

impl Command {
    /// `(command, description)` pairs registered with `setMyCommands`.
    pub const ALL: [(&'static str, &'static str); 3] = [
        ("start", "Show the welcome message"),
        ("enable", "Enable the stream"),
        ("disable", "Disable the stream"),
    ];

    #[must_use]
    pub fn desired_state(self) -> Option<StreamState> {
        match self {
            Self::Start => None,
            Self::Enable => Some(StreamState::Enabled),
            Self::Disable => Some(StreamState::Disabled),
        }
    }
}

/// Parse message text. Commands may carry a `@botname` suffix and trailing
/// arguments, both ignored.
#[must_use]
pub fn parse(text: &str) -> Parsed {
    let Some(rest) = text.trim_start().strip_prefix('/') else {
        return Parsed::Text;
    };
    let word = rest.split_whitespace().next().unwrap_or_default();
    let name = word.split('@').next().unwrap_or_default();
    match name.to_ascii_lowercase().as_str() {
        "start" => Parsed::Command(Command::Start),
        "enable" => Parsed::Command(Command::Enable),
        "disable" => Parsed::Command(Command::Disable),
        _ => Parsed::Unknown,
    }
}
