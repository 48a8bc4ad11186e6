// src/formatting.rs

use crate::core::{AlertContext, AlertType, PRODUCT_NAME};
use serde_json::{json, Value};

/// A rendered email, ready to be addressed and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub body: String,
}

/// Builds the Block Kit payload posted to the chat webhook.
///
/// The payload carries a warning header, one labeled line for each context
/// field that is present (app, environment, server, in that order), and the
/// raw message in a preformatted block.
pub fn render_chat_payload(message: &str, alert_type: &AlertType, context: &AlertContext) -> Value {
    let mut blocks = vec![json!({
        "type": "section",
        "text": {
            "type": "mrkdwn",
            "text": format!(" :warning: *{}: {}*", PRODUCT_NAME, alert_type),
        }
    })];

    if let Some(app) = context.app() {
        blocks.push(labeled_line("App Name: ", &format!("{} app", app)));
    }
    if let Some(env) = context.environment() {
        blocks.push(labeled_line("Environment Name: ", &format!("{} environment", env)));
    }
    if let Some(server) = context.server() {
        blocks.push(labeled_line("Server Name: ", server));
    }

    blocks.push(json!({
        "type": "rich_text",
        "elements": [{
            "type": "rich_text_preformatted",
            "elements": [{ "type": "text", "text": message }]
        }]
    }));

    json!({ "blocks": blocks })
}

fn labeled_line(label: &str, value: &str) -> Value {
    json!({
        "type": "rich_text",
        "elements": [{
            "type": "rich_text_section",
            "elements": [
                { "type": "text", "text": label, "style": { "bold": true } },
                { "type": "text", "text": value }
            ]
        }]
    })
}

/// Builds the subject line and plain-text body of an alert email.
pub fn render_email(message: &str, alert_type: &AlertType, context: &AlertContext) -> EmailContent {
    let subject = match (context.app(), context.environment()) {
        (Some(app), Some(env)) => format!(
            "{}: {} ({} app, {} environment)",
            PRODUCT_NAME, alert_type, app, env
        ),
        (Some(app), None) => format!("{}: {} ({} app)", PRODUCT_NAME, alert_type, app),
        (None, Some(env)) => format!("{}: {} ({} environment)", PRODUCT_NAME, alert_type, env),
        (None, None) => format!("{}: {}", PRODUCT_NAME, alert_type),
    };

    let metadata: Vec<String> = [
        ("App Name", context.app()),
        ("Environment Name", context.environment()),
        ("Server Name", context.server()),
    ]
    .into_iter()
    .filter_map(|(label, value)| value.map(|v| format!("{}: {}", label, v)))
    .collect();

    let body = if metadata.is_empty() {
        message.to_string()
    } else {
        format!("{}\n\n{}", metadata.join("\n"), message)
    };

    EmailContent { subject, body }
}
