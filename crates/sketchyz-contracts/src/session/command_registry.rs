#[derive(Clone, Copy, Debug)]
pub(crate) struct CommandSpec {
    pub command: &'static str,
    pub action: &'static str,
}

/// Commands whose whole remainder is free text.
pub(crate) const TEXT_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "context",
        action: "set_context",
    },
    CommandSpec {
        command: "prompt",
        action: "set_prompt",
    },
];

pub(crate) const PATH_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "upload",
        action: "upload_image",
    },
    CommandSpec {
        command: "download",
        action: "download",
    },
];

pub(crate) const ID_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "style",
        action: "select_style",
    },
    CommandSpec {
        command: "switch",
        action: "switch_style",
    },
    CommandSpec {
        command: "resume",
        action: "resume",
    },
    CommandSpec {
        command: "delete",
        action: "delete_item",
    },
];

pub(crate) const NO_ARG_COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        command: "key",
        action: "select_key",
    },
    CommandSpec {
        command: "start",
        action: "start",
    },
    CommandSpec {
        command: "live",
        action: "start_live_camera",
    },
    CommandSpec {
        command: "flip",
        action: "toggle_camera",
    },
    CommandSpec {
        command: "snap",
        action: "capture_photo",
    },
    CommandSpec {
        command: "go",
        action: "accept_context",
    },
    CommandSpec {
        command: "analyze",
        action: "analyze",
    },
    CommandSpec {
        command: "regen",
        action: "regenerate",
    },
    CommandSpec {
        command: "save",
        action: "save",
    },
    CommandSpec {
        command: "gallery",
        action: "open_gallery",
    },
    CommandSpec {
        command: "share",
        action: "share",
    },
    CommandSpec {
        command: "back",
        action: "back",
    },
    CommandSpec {
        command: "reset",
        action: "reset",
    },
    CommandSpec {
        command: "refill",
        action: "refill_credits",
    },
    CommandSpec {
        command: "status",
        action: "status",
    },
    CommandSpec {
        command: "styles",
        action: "list_styles",
    },
    CommandSpec {
        command: "help",
        action: "help",
    },
    CommandSpec {
        command: "quit",
        action: "quit",
    },
];

pub(crate) const ITERATE_COMMAND: CommandSpec = CommandSpec {
    command: "iterate",
    action: "set_iterate",
};

pub const SESSION_HELP_COMMANDS: &[&str] = &[
    "/key",
    "/start",
    "/live",
    "/flip",
    "/snap",
    "/upload <path>",
    "/context <text>",
    "/go",
    "/analyze",
    "/style <id>",
    "/regen",
    "/prompt <text>",
    "/switch <id>",
    "/iterate on|off",
    "/save",
    "/gallery",
    "/resume [id]",
    "/delete <id>",
    "/download [dir]",
    "/share",
    "/back",
    "/reset",
    "/refill",
    "/status",
    "/styles",
    "/help",
    "/quit",
];
