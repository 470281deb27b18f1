//! Email subjects and HTML bodies per notification type.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap());

const DEFAULT_USER_NAME: &str = "User";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailTemplate {
    pub subject: &'static str,
    pub body: &'static str,
}

const LAYOUT_OPEN: &str = r#"<!DOCTYPE html><html><body style="font-family:Arial,sans-serif;color:#222">"#;
const LAYOUT_CLOSE: &str = "</body></html>";

/// Subject and body for a notification type. `{product}` in the subject is
/// replaced by the configured product name.
pub fn email_template(notification_type: &str) -> EmailTemplate {
    match notification_type {
        "new_follower" => EmailTemplate {
            subject: "New Follower on {product}",
            body: "<h2>{{title}}</h2><p>Hi {{userName}},</p><p>{{message}}</p>",
        },
        "track_like" => EmailTemplate {
            subject: "Someone liked your track",
            body: "<h2>{{title}}</h2><p>Hi {{userName}},</p><p>{{message}}</p><p>Track: {{trackTitle}}</p>",
        },
        "track_comment" => EmailTemplate {
            subject: "New comment on your track",
            body: "<h2>{{title}}</h2><p>Hi {{userName}},</p><p>{{message}}</p><blockquote>{{comment}}</blockquote>",
        },
        "playlist_follow" => EmailTemplate {
            subject: "Someone followed your playlist",
            body: "<h2>{{title}}</h2><p>Hi {{userName}},</p><p>{{message}}</p><p>Playlist: {{playlistName}}</p>",
        },
        "artist_update" => EmailTemplate {
            subject: "New update from an artist you follow",
            body: "<h2>{{title}}</h2><p>Hi {{userName}},</p><p>{{message}}</p>",
        },
        "system_alert" => EmailTemplate {
            subject: "Important {product} Alert",
            body: "<h2>{{title}}</h2><p>Hi {{userName}},</p><p><strong>{{message}}</strong></p>",
        },
        _ => EmailTemplate {
            subject: "{product} Notification",
            body: "<h2>{{title}}</h2><p>Hi {{userName}},</p><p>{{message}}</p>",
        },
    }
}

pub fn render_subject(template: &EmailTemplate, product_name: &str) -> String {
    template.subject.replace("{product}", product_name)
}

/// Variables visible to a body template. `data` keys are overridden by
/// `title`, `message` and `userName`.
pub fn template_context(
    title: &str,
    message: &str,
    data: &Map<String, Value>,
    user_name: Option<&str>,
) -> Map<String, Value> {
    let mut context = data.clone();
    context.insert("title".to_string(), Value::String(title.to_string()));
    context.insert("message".to_string(), Value::String(message.to_string()));
    context.insert(
        "userName".to_string(),
        Value::String(user_name.unwrap_or(DEFAULT_USER_NAME).to_string()),
    );
    context
}

/// Substitutes `{{key}}` placeholders with HTML-escaped context values.
/// Unknown keys render as empty strings.
pub fn render_body(template: &EmailTemplate, context: &Map<String, Value>) -> String {
    let body = PLACEHOLDER.replace_all(template.body, |caps: &regex::Captures| {
        match context.get(&caps[1]) {
            Some(Value::String(s)) => escape_html(s),
            Some(Value::Null) | None => String::new(),
            Some(other) => escape_html(&other.to_string()),
        }
    });
    format!("{LAYOUT_OPEN}{body}{LAYOUT_CLOSE}")
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn known_types_have_specific_subjects() {
        assert_eq!(
            render_subject(&email_template("new_follower"), "SoundScape-AI"),
            "New Follower on SoundScape-AI"
        );
        assert_eq!(
            render_subject(&email_template("track_like"), "SoundScape-AI"),
            "Someone liked your track"
        );
        assert_eq!(
            render_subject(&email_template("system_alert"), "Acme"),
            "Important Acme Alert"
        );
    }

    #[test]
    fn unknown_type_gets_generic_subject() {
        assert_eq!(
            render_subject(&email_template("mystery"), "SoundScape-AI"),
            "SoundScape-AI Notification"
        );
    }

    #[test]
    fn body_merges_data_and_defaults_user_name() {
        let mut data = Map::new();
        data.insert("trackTitle".to_string(), json!("Night Drive"));
        let context = template_context("Liked", "Bo liked your track", &data, None);
        let html = render_body(&email_template("track_like"), &context);

        assert!(html.contains("Hi User,"));
        assert!(html.contains("Track: Night Drive"));
        assert!(html.contains("<h2>Liked</h2>"));
    }

    #[test]
    fn values_are_escaped_and_missing_keys_are_blank() {
        let context = template_context("<b>t</b>", "m & m", &Map::new(), Some("Ada"));
        let html = render_body(&email_template("track_comment"), &context);

        assert!(html.contains("&lt;b&gt;t&lt;/b&gt;"));
        assert!(html.contains("m &amp; m"));
        assert!(html.contains("<blockquote></blockquote>"));
        assert!(html.contains("Hi Ada,"));
    }

    #[test]
    fn reserved_keys_win_over_data() {
        let mut data = Map::new();
        data.insert("title".to_string(), json!("spoofed"));
        let context = template_context("real", "m", &data, None);
        assert_eq!(context["title"], json!("real"));
    }
}
