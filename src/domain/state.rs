//! State blobs: the keyed outputs produced by task invocations.
//!
//! A state blob is an ordered JSON object. Stage outputs are merged into
//! an accumulating context that later stages can reference by key.

use serde_json::{Map, Value};
use tracing::debug;

/// Keyed output of one invocation, or the keyed merge of several
pub type StateBlob = Map<String, Value>;

/// Merge every key of `source` into `target`.
///
/// Later values win on a name collision. Collisions are a configuration
/// problem, so they are only logged here.
pub fn merge_into(target: &mut StateBlob, source: StateBlob) {
    for (key, value) in source {
        if target.contains_key(&key) {
            debug!(%key, "State key overwritten by later stage");
        }
        target.insert(key, value);
    }
}

/// Pick the value a parallel member contributes under its declared key.
///
/// Uses the member's own entry for `output_key` when the backend produced
/// one; otherwise the whole fetched state becomes the value.
pub fn take_output(mut state: StateBlob, output_key: &str) -> Value {
    match state.remove(output_key) {
        Some(value) => value,
        None => Value::Object(state),
    }
}

/// Value a task contributes under `output_key`.
///
/// Entries the session was seeded with are not part of the task's output,
/// so they are dropped before falling back to the whole state.
pub fn extract_output(mut state: StateBlob, output_key: &str, seed: &StateBlob) -> Value {
    if !state.contains_key(output_key) {
        state.retain(|k, v| seed.get(k) != Some(v));
    }
    take_output(state, output_key)
}

/// Restrict a blob to the given keys, filling absent ones with `null`.
pub fn project(state: &StateBlob, keys: &[String]) -> StateBlob {
    keys.iter()
        .map(|key| (key.clone(), state.get(key).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// Render the input text with the accumulated context appended.
///
/// Used when a pipeline passes prior results through the prompt instead
/// of the session's initial state.
pub fn render_prompt(input: &str, context: &StateBlob) -> String {
    if context.is_empty() {
        return input.to_string();
    }

    let rendered = serde_json::to_string_pretty(context).unwrap_or_default();
    format!("{}\n\n## Prior results\n```json\n{}\n```", input, rendered)
}
