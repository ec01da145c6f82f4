//! Reassembly of streamed agent responses.
//!
//! The upstream agent streams a response as a series of fragments sharing a
//! `response_id`; the last one carries `content_complete: true`. Fragments are
//! buffered per id and released as one space-joined string on completion.

use std::collections::HashMap;

/// Identifier the upstream agent attaches to a streamed response
pub type ResponseId = i64;

#[derive(Debug, Default)]
pub struct ResponseAssembler {
    pending: HashMap<ResponseId, Vec<String>>,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment.
    ///
    /// Returns the joined text when `is_complete` closes out the response.
    /// Without a response id there is nothing to accumulate under, so the
    /// fragment is returned as-is when complete and discarded otherwise.
    /// The returned text may be empty; callers decide whether to emit it.
    pub fn ingest(
        &mut self,
        response_id: Option<ResponseId>,
        fragment: &str,
        is_complete: bool,
    ) -> Option<String> {
        let Some(response_id) = response_id else {
            return is_complete.then(|| fragment.to_string());
        };

        let fragments = self.pending.entry(response_id).or_default();
        fragments.push(fragment.to_string());

        if !is_complete {
            return None;
        }

        // Completion retires the id; a later fragment with the same id starts fresh
        self.pending
            .remove(&response_id)
            .map(|fragments| fragments.join(" "))
    }

    /// Whether fragments are buffered under `response_id`
    pub fn is_pending(&self, response_id: ResponseId) -> bool {
        self.pending.contains_key(&response_id)
    }

    /// Number of responses still in flight
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
