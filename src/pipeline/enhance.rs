//! Retrieval query enhancement. Pure string work, no external calls.

use std::collections::HashMap;

/// Slots whose values bias retrieval, appended in this order.
const ENHANCE_SLOTS: [&str; 3] = ["topic", "term", "section"];

/// Append extracted slot values to the raw query so retrieval leans toward
/// slot-relevant passages. Slots that are absent or blank are skipped; with
/// no usable slots the query comes back unchanged.
pub fn enhance_for_retrieval(query: &str, slots: &HashMap<String, String>) -> String {
    let mut enhanced = query.to_string();
    for name in ENHANCE_SLOTS {
        if let Some(value) = slots.get(name) {
            if !value.trim().is_empty() {
                enhanced.push(' ');
                enhanced.push_str(value);
            }
        }
    }
    enhanced
}
