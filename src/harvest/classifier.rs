use std::collections::HashSet;

use chrono::Utc;

use crate::harvest::types::{Completeness, History, Item, Novelty};

/// Tag freshly extracted items with their novelty relative to everything
/// already recorded, without mutating the history (the loop appends).
///
/// A complete item is `Repeated` iff its text matches the text of any
/// complete item from a prior interaction, no matter how far back --
/// first-seen wins. Incomplete items are always `New`: their text is
/// untrusted and the overlapping next capture re-evaluates them.
///
/// The match is exact text equality after per-line trimming. Recognition
/// noise (character misreads) defeats it and can duplicate or drop
/// entries; that is a known limitation of the approach, kept deliberately
/// instead of guessing at fuzzy matching.
pub fn classify(
    history: &History,
    new_items: &[(String, Completeness)],
    interaction_index: u32,
) -> Vec<Item> {
    let seen: HashSet<&str> = history
        .iter()
        .filter(|item| item.completeness == Completeness::Complete)
        .map(|item| item.text.as_str())
        .collect();

    let captured_at = Utc::now();

    new_items
        .iter()
        .map(|(text, completeness)| {
            let novelty = if *completeness == Completeness::Complete
                && seen.contains(text.as_str())
            {
                Novelty::Repeated
            } else {
                Novelty::New
            };

            Item {
                interaction_index,
                text: text.clone(),
                completeness: *completeness,
                novelty,
                captured_at,
            }
        })
        .collect()
}
