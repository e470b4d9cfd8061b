//! Search within a single conversation
//!
//! Queries and bodies are normalized the same way (lowercased, whitespace
//! collapsed) and matched as substrings. Every whitespace-separated query term
//! must appear in the body.

use std::ops::ControlFlow;

use anyhow::Result;

use crate::models::{Interaction, ThreadId};
use crate::storage::{EnumerationOrder, ReadTransaction};

/// Normalized queries shorter than this return no results
pub const MINIMUM_SEARCH_TEXT_LENGTH: usize = 2;

/// Lowercase, trim, and collapse runs of whitespace to single spaces
pub fn normalize_search_text(text: &str) -> String {
    text.split_whitespace()
        .map(|word| word.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Interactions in `thread_id` whose body matches `text`, oldest first
pub fn search_within_conversation(
    thread_id: &ThreadId,
    text: &str,
    tx: &dyn ReadTransaction,
) -> Result<Vec<Interaction>> {
    let query = normalize_search_text(text);
    if query.chars().count() < MINIMUM_SEARCH_TEXT_LENGTH {
        return Ok(Vec::new());
    }
    let terms: Vec<&str> = query.split(' ').collect();

    let mut matches = Vec::new();
    tx.enumerate_interactions(
        thread_id,
        EnumerationOrder::OldestFirst,
        &mut |i: &Interaction| {
            if let Some(body) = &i.body {
                let body = normalize_search_text(body);
                if terms.iter().all(|term| body.contains(term)) {
                    matches.push(i.clone());
                }
            }
            ControlFlow::Continue(())
        },
    )?;
    Ok(matches)
}
