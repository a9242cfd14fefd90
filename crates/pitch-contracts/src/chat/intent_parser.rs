use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::command_registry::{
    CommandSpec, NO_ARG_COMMANDS, RATED_ELEMENTS, RATE_COMMAND, RAW_ARG_COMMANDS,
    SINGLE_PATH_COMMANDS,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub action: String,
    pub raw: String,
    pub message: Option<String>,
    pub command_args: BTreeMap<String, Value>,
}

impl Intent {
    fn new(action: &str, raw: &str) -> Self {
        Self {
            action: action.to_string(),
            raw: raw.to_string(),
            message: None,
            command_args: BTreeMap::new(),
        }
    }

    fn invalid(raw: &str, reason: String) -> Self {
        let mut intent = Self::new("invalid", raw);
        intent
            .command_args
            .insert("reason".to_string(), Value::String(reason));
        intent
    }
}

fn find_action(command: &str, specs: &[CommandSpec]) -> Option<&'static str> {
    specs
        .iter()
        .find(|spec| spec.command == command)
        .map(|spec| spec.action)
}

fn split_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = split_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

fn rating_word(raw: &str) -> Option<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "up" | "+" | "good" | "positive" | "like" => Some("positive"),
        "flat" | "=" | "ok" | "neutral" => Some("neutral"),
        "down" | "-" | "bad" | "negative" | "dislike" => Some("negative"),
        _ => None,
    }
}

// `/rate 4 name=up strategy=down "needs more humour"`
fn parse_rate_args(raw: &str, arg: &str) -> Intent {
    let parts = split_args(arg);
    let Some(head) = parts.first() else {
        return Intent::invalid(raw, "usage: /rate <1-5> [element=up|flat|down] [comment]".to_string());
    };
    let overall = match head.parse::<u8>() {
        Ok(value) if (1..=5).contains(&value) => value,
        _ => return Intent::invalid(raw, format!("overall rating must be 1-5, got '{head}'")),
    };

    let mut ratings = Map::new();
    let mut comment_parts: Vec<&str> = Vec::new();
    for part in &parts[1..] {
        if let Some((key, value)) = part.split_once('=') {
            let key = key.trim().to_ascii_lowercase();
            if RATED_ELEMENTS.contains(&key.as_str()) {
                let Some(rating) = rating_word(value) else {
                    return Intent::invalid(raw, format!("unknown rating '{value}' for {key}"));
                };
                ratings.insert(key, Value::String(rating.to_string()));
                continue;
            }
        }
        comment_parts.push(part.as_str());
    }

    let mut intent = Intent::new(RATE_COMMAND.action, raw);
    intent
        .command_args
        .insert("overall".to_string(), Value::Number(overall.into()));
    intent
        .command_args
        .insert("ratings".to_string(), Value::Object(ratings));
    intent.command_args.insert(
        "comment".to_string(),
        Value::String(comment_parts.join(" ")),
    );
    intent
}

pub fn parse_intent(text: &str) -> Intent {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return Intent::new("noop", text);
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, RAW_ARG_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent
                    .command_args
                    .insert("model".to_string(), Value::String(arg.to_string()));
                return intent;
            }

            if let Some(action) = find_action(&command, SINGLE_PATH_COMMANDS) {
                let mut intent = Intent::new(action, text);
                intent.command_args.insert(
                    "path".to_string(),
                    Value::String(parse_single_path_arg(arg)),
                );
                return intent;
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return Intent::new(action, text);
            }

            if command == RATE_COMMAND.command {
                return parse_rate_args(text, arg);
            }

            let mut intent = Intent::new("unknown", text);
            intent
                .command_args
                .insert("command".to_string(), Value::String(command));
            intent
                .command_args
                .insert("arg".to_string(), Value::String(arg.to_string()));
            return intent;
        }
    }

    let mut intent = Intent::new("message", text);
    intent.message = Some(raw_trimmed.to_string());
    intent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse_intent;

    #[test]
    fn plain_text_is_a_chat_message() {
        let intent = parse_intent("  Can the name be shorter?  ");
        assert_eq!(intent.action, "message");
        assert_eq!(intent.message.as_deref(), Some("Can the name be shorter?"));
    }

    #[test]
    fn blank_line_is_noop() {
        assert_eq!(parse_intent("   ").action, "noop");
    }

    #[test]
    fn parse_no_arg_commands() {
        assert_eq!(parse_intent("/apply").action, "apply_refinement");
        assert_eq!(parse_intent("/creative").action, "creative_director");
        assert_eq!(parse_intent("/disrupt").action, "disruptive_device");
        assert_eq!(parse_intent("/SAVE").action, "save");
        assert_eq!(parse_intent("/exit").action, "quit");
    }

    #[test]
    fn parse_export_quoted_path() {
        let intent = parse_intent("/export \"/tmp/my campaign.json\"");
        assert_eq!(intent.action, "export");
        assert_eq!(intent.command_args["path"], json!("/tmp/my campaign.json"));
    }

    #[test]
    fn parse_model_command() {
        let intent = parse_intent("/model gpt-4o");
        assert_eq!(intent.action, "set_model");
        assert_eq!(intent.command_args["model"], json!("gpt-4o"));
    }

    #[test]
    fn parse_rate_with_elements_and_comment() {
        let intent = parse_intent("/rate 2 name=up strategy=down \"needs more humour\" please");
        assert_eq!(intent.action, "rate");
        assert_eq!(intent.command_args["overall"], json!(2));
        assert_eq!(
            intent.command_args["ratings"],
            json!({"name": "positive", "strategy": "negative"})
        );
        assert_eq!(intent.command_args["comment"], json!("needs more humour please"));
    }

    #[test]
    fn parse_rate_rejects_out_of_range_overall() {
        let intent = parse_intent("/rate 9");
        assert_eq!(intent.action, "invalid");
        assert_eq!(
            intent.command_args["reason"],
            json!("overall rating must be 1-5, got '9'")
        );
    }

    #[test]
    fn parse_rate_rejects_unknown_rating_word() {
        let intent = parse_intent("/rate 3 message=meh");
        assert_eq!(intent.action, "invalid");
    }

    #[test]
    fn parse_unknown_command() {
        let intent = parse_intent("/magic foo bar");
        assert_eq!(intent.action, "unknown");
        assert_eq!(intent.command_args["command"], json!("magic"));
        assert_eq!(intent.command_args["arg"], json!("foo bar"));
    }
}
