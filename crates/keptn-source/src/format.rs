//! Event-to-message formatting.
//!
//! Output targets Slack-style markdown (`*bold*`, `:emoji:` shortcodes).
//! Event values are inserted verbatim, without escaping.

use crate::event::Event;
use crate::message::{Body, Message, Section};

const EMOJI_FOR_STATUS: [(&str, &str); 3] = [
    ("succeeded", ":large_green_circle:"),
    ("errored", ":x:"),
    ("aborted", ":warning:"),
];

/// Fallback for empty or unrecognised statuses.
pub const DEFAULT_EMOJI: &str = ":email:";

const LABELS_TITLE: &str = "Labels";
const BULLET: &str = "• ";

/// Returns the emoji shortcode for a terminal event status.
pub fn emoji_for_status(status: &str) -> &'static str {
    EMOJI_FOR_STATUS
        .iter()
        .find(|(known, _)| *known == status)
        .map(|(_, emoji)| *emoji)
        .unwrap_or(DEFAULT_EMOJI)
}

/// Builds the display message for a single event.
///
/// The header carries an emoji only when the payload has a `status` field.
/// An absent status (`None`) gives a bare event type, while an empty or
/// unknown status (`Some("")`) still maps to `:email:`.
pub fn format_message(event: &Event) -> Message {
    let header = match event.data.status.as_deref() {
        Some(status) => format!("{} {}", emoji_for_status(status), event.event_type),
        None => event.event_type.clone(),
    };
    Message {
        sections: vec![Section {
            header,
            body: Body {
                plaintext: bullet_point_labels(event),
            },
        }],
    }
}

fn bullet_point_labels(event: &Event) -> String {
    let mut labels = Vec::with_capacity(3);
    push_if_not_empty(&mut labels, "ID", &event.id);
    push_if_not_empty(&mut labels, "Source", &event.source);
    push_if_not_empty(&mut labels, "Message", &event.data.message);

    let list = join_with_prefix(&labels, BULLET);
    if list.is_empty() {
        return String::new();
    }
    format!("*{LABELS_TITLE}:*\n{list}")
}

fn push_if_not_empty(labels: &mut Vec<String>, title: &str, value: &str) {
    if value.is_empty() {
        return;
    }
    labels.push(format!("{title}: {value}"));
}

fn join_with_prefix(lines: &[String], prefix: &str) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(prefix);
        out.push_str(line);
        out.push('\n');
    }
    out
}
