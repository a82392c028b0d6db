use deskpilot_agent::router::{IntentRouter, RouterSettings};
use deskpilot_core::config::{AppConfig, LoadOptions};

use super::{to_data, CommandResult};

const COMMAND: &str = "route";

/// Routes one message through the keyword layers without calling a classifier.
pub fn run(text: &str) -> CommandResult {
    if text.trim().is_empty() {
        return CommandResult::failure(COMMAND, "invalid_argument", "message text is empty", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config", error.to_string(), 3);
        }
    };

    let router = IntentRouter::new(RouterSettings::from(&config.routing), None);
    let decision = router.route_offline(text);
    let message = match decision.matched_keyword.as_deref() {
        Some(keyword) => {
            format!("routed to {} via `{keyword}` ({})", decision.handler, decision.intent)
        }
        None => format!("routed to {} ({})", decision.handler, decision.intent),
    };

    CommandResult::success_with_data(COMMAND, message, to_data(&decision))
}
