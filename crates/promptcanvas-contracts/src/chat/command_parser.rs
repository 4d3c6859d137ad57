use super::command_registry::{
    CommandAction, CommandSpec, NO_ARG_COMMANDS, OPTIONAL_PATH_COMMANDS, RAW_ARG_COMMANDS,
};

/// One line of chat input, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Noop,
    Generate(String),
    SetStyle(String),
    SetQuality(String),
    SetAspect(String),
    SetProvider(String),
    SetKey(String),
    /// `None` clears the pending input image.
    Edit(Option<String>),
    /// `None` means "pick a default file name".
    Save(Option<String>),
    Check,
    Clear,
    History,
    Help,
    Unknown { command: String, arg: String },
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<CommandAction> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn parse_path_arg(arg: &str) -> Option<String> {
    if arg.trim().is_empty() {
        return None;
    }
    let parts = match shell_words::split(arg) {
        Ok(parts) => parts,
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    };
    let joined = parts
        .into_iter()
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>()
        .join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

pub fn parse_command(text: &str) -> ChatCommand {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ChatCommand::Noop;
    }

    let Some(slash_tail) = trimmed.strip_prefix('/') else {
        return ChatCommand::Generate(trimmed.to_string());
    };
    let command_len = slash_tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return ChatCommand::Generate(trimmed.to_string());
    }
    let command = slash_tail[..command_len].to_ascii_lowercase();
    let arg = slash_tail[command_len..].trim();

    if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
        let arg = arg.to_string();
        return match action {
            CommandAction::SetStyle => ChatCommand::SetStyle(arg),
            CommandAction::SetQuality => ChatCommand::SetQuality(arg),
            CommandAction::SetAspect => ChatCommand::SetAspect(arg),
            CommandAction::SetProvider => ChatCommand::SetProvider(arg),
            _ => ChatCommand::SetKey(arg),
        };
    }

    if let Some(action) = find_action(&command, OPTIONAL_PATH_COMMANDS) {
        let path = parse_path_arg(arg);
        return match action {
            CommandAction::Edit => ChatCommand::Edit(path),
            _ => ChatCommand::Save(path),
        };
    }

    if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
        return match action {
            CommandAction::Check => ChatCommand::Check,
            CommandAction::Clear => ChatCommand::Clear,
            CommandAction::History => ChatCommand::History,
            _ => ChatCommand::Help,
        };
    }

    ChatCommand::Unknown {
        command,
        arg: arg.to_string(),
    }
}
