//! Recovers an order id from free-text bank-transfer narration.
//!
//! The merchant-supplied transfer instructions embed the order id after a fixed marker token, e.g.
//! `ORD-018f6a5e-93d2-4b8a-a8e1-55c3a9d0f1b2`. Banks and SMS gateways routinely sanitize narration fields by
//! stripping separator characters while preserving alphanumerics, so the same reference can arrive as
//! `ORD018f6a5e93d24b8aa8e155c3a9d0f1b2`. Both forms must resolve to the same order.
use regex::Regex;

use crate::db_types::OrderId;

/// The marker token that precedes the order id in payment narration text.
pub const REFERENCE_MARKER: &str = "ORD";

/// The shortest contiguous alphanumeric run that is considered a candidate stripped reference. Anything shorter is
/// far more likely to be ordinary narration text than a mangled order id.
pub const DEFAULT_MIN_REFERENCE_RUN: usize = 30;

/// Length of a canonical order id with its separators removed.
const UNSEPARATED_LEN: usize = 32;

/// Hyphen positions of the canonical 8-4-4-4-12 layout, as offsets into the unseparated form.
const SEPARATOR_OFFSETS: [usize; 4] = [8, 12, 16, 20];

/// The narration text a buyer is instructed to attach to their transfer for `order_id`.
pub fn payment_reference(order_id: &OrderId) -> String {
    format!("{REFERENCE_MARKER}-{}", order_id.as_str())
}

/// Extracts a candidate order id from narration text.
///
/// Two passes, first match wins:
/// 1. The marker followed by an id in its canonical, separator-containing form. The capture is returned verbatim.
/// 2. The marker followed by a contiguous alphanumeric run of at least `min_run` characters. If the run is exactly
///    as long as an unseparated canonical id, the separators are re-inserted at the canonical positions. Runs of any
///    other length are returned raw rather than guessing at a layout.
///
/// `None` is the ordinary outcome for the many transfers that have nothing to do with an order; this function never
/// fails on malformed input.
pub fn extract_order_id(narration: &str, min_run: usize) -> Option<OrderId> {
    let canonical = Regex::new(
        r"ORD[-_ ]?([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})",
    )
    .unwrap();
    if let Some(id) = canonical.captures(narration).and_then(|c| c.get(1)) {
        return Some(OrderId(id.as_str().to_string()));
    }
    let stripped = Regex::new(&format!(r"ORD[-_ ]?([0-9a-zA-Z]{{{min_run},}})")).unwrap();
    let run = stripped.captures(narration).and_then(|c| c.get(1))?.as_str();
    if run.len() == UNSEPARATED_LEN {
        Some(OrderId(reinsert_separators(run)))
    } else {
        Some(OrderId(run.to_string()))
    }
}

fn reinsert_separators(run: &str) -> String {
    let mut result = String::with_capacity(UNSEPARATED_LEN + SEPARATOR_OFFSETS.len());
    let mut last = 0;
    for offset in SEPARATOR_OFFSETS {
        result.push_str(&run[last..offset]);
        result.push('-');
        last = offset;
    }
    result.push_str(&run[last..]);
    result
}
