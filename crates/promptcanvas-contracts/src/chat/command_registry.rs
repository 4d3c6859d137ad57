#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CommandAction {
    SetStyle,
    SetQuality,
    SetAspect,
    SetProvider,
    SetKey,
    Edit,
    Save,
    Check,
    Clear,
    History,
    Help,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: CommandAction,
}

/// Commands whose argument is taken verbatim.
pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "style",
        action: CommandAction::SetStyle,
    },
    CommandSpec {
        command: "quality",
        action: CommandAction::SetQuality,
    },
    CommandSpec {
        command: "aspect",
        action: CommandAction::SetAspect,
    },
    CommandSpec {
        command: "provider",
        action: CommandAction::SetProvider,
    },
    CommandSpec {
        command: "key",
        action: CommandAction::SetKey,
    },
];

/// Commands taking an optional, possibly quoted, path.
pub(crate) const OPTIONAL_PATH_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "edit",
        action: CommandAction::Edit,
    },
    CommandSpec {
        command: "save",
        action: CommandAction::Save,
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "check",
        action: CommandAction::Check,
    },
    CommandSpec {
        command: "clear",
        action: CommandAction::Clear,
    },
    CommandSpec {
        command: "history",
        action: CommandAction::History,
    },
    CommandSpec {
        command: "help",
        action: CommandAction::Help,
    },
];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/style <name>",
    "/quality <tier>",
    "/aspect <ratio>",
    "/provider <id>",
    "/key <api-key>",
    "/edit [path]",
    "/save [path]",
    "/check",
    "/history",
    "/clear",
    "/help",
];
