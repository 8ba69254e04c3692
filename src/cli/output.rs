//! Result rendering for `meshc2-controller` (text/json), per
//! `--format`.

use crate::controller_engine::ControllerResult;

/// Renders a [`ControllerResult`] as plain text: the assembled output,
/// followed by a summary line when nothing was received.
#[must_use]
pub fn render_text(result: &ControllerResult) -> String {
    if result.received {
        result.output.clone()
    } else {
        format!(
            "[controller] max wait {:.0}s reached; no Output received",
            result.duration.as_secs_f64()
        )
    }
}

/// Renders a [`ControllerResult`] as a single-line JSON object.
#[must_use]
pub fn render_json(result: &ControllerResult) -> String {
    serde_json::json!({
        "received": result.received,
        "output": result.output,
        "duration_secs": result.duration.as_secs_f64(),
        "raw_message_count": result.raw_messages.len(),
    })
    .to_string()
}
