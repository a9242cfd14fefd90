#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

pub(crate) const RAW_ARG_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "model",
    action: "set_model",
}];

pub(crate) const SINGLE_PATH_COMMANDS: &[CommandSpec] = &[CommandSpec {
    command: "export",
    action: "export",
}];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "apply",
        action: "apply_refinement",
    },
    CommandSpec {
        command: "creative",
        action: "creative_director",
    },
    CommandSpec {
        command: "disrupt",
        action: "disruptive_device",
    },
    CommandSpec {
        command: "save",
        action: "save",
    },
    CommandSpec {
        command: "show",
        action: "show",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
    CommandSpec {
        command: "exit",
        action: "quit",
    },
];

pub(crate) const RATE_COMMAND: CommandSpec = CommandSpec {
    command: "rate",
    action: "rate",
};

pub(crate) const RATED_ELEMENTS: &[&str] = &["name", "message", "strategy", "execution"];

pub const CHAT_HELP_COMMANDS: &[&str] = &[
    "/apply",
    "/rate <1-5> [name|message|strategy|execution=up|flat|down ...] [comment]",
    "/creative",
    "/disrupt",
    "/save",
    "/show",
    "/export <path>",
    "/model <name>",
    "/help",
    "/quit",
];
