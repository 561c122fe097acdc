//! `RangeSet` (spec §4.8): tracks the byte ranges still remaining for a
//! resumable batched scan (online build/scrub progress).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub begin: Vec<u8>,
    pub end: Vec<u8>,
}

impl ByteRange {
    pub fn new(begin: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self { begin: begin.into(), end: end.into() }
    }

    fn is_empty(&self) -> bool {
        self.begin >= self.end
    }
}

/// A set of disjoint, sorted `[begin, end)` byte ranges still to be
/// visited. A freshly created set covers the whole subspace; ranges are
/// removed (in whole or in part) as batches complete.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RangeSet {
    ranges: Vec<ByteRange>,
}

impl RangeSet {
    /// The initial, unstarted set: the whole `[begin, end)` span.
    pub fn from(begin: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        let range = ByteRange::new(begin, end);
        if range.is_empty() {
            Self { ranges: Vec::new() }
        } else {
            Self { ranges: vec![range] }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    /// The next batch to scan: the first remaining range. Callers bound
    /// the actual KV scan by result count (`batch_size`); the `RangeSet`
    /// itself only tracks byte-range coverage, not result counts, so the
    /// whole head range is handed back regardless of its byte width.
    pub fn next_batch(&self) -> Option<ByteRange> {
        self.ranges.first().cloned()
    }

    /// Remove `completed` from the set, splitting or trimming the
    /// overlapping range(s) as needed (spec §4.8: "mark a sub-range as
    /// done without losing track of what remains").
    pub fn mark_completed(&mut self, completed: &ByteRange) {
        if completed.is_empty() {
            return;
        }
        let mut next = Vec::with_capacity(self.ranges.len() + 1);
        for range in self.ranges.drain(..) {
            if completed.end <= range.begin || completed.begin >= range.end {
                // Disjoint: unaffected.
                next.push(range);
                continue;
            }
            if completed.begin <= range.begin && completed.end >= range.end {
                // `completed` fully contains `range`: drop it entirely.
                continue;
            }
            if completed.begin > range.begin && completed.end < range.end {
                // `completed` strictly inside `range`: split into two.
                next.push(ByteRange::new(range.begin.clone(), completed.begin.clone()));
                next.push(ByteRange::new(completed.end.clone(), range.end.clone()));
                continue;
            }
            if completed.begin <= range.begin {
                // Overlaps the low side: trim the begin.
                next.push(ByteRange::new(completed.end.clone(), range.end.clone()));
            } else {
                // Overlaps the high side: trim the end.
                next.push(ByteRange::new(range.begin.clone(), completed.begin.clone()));
            }
        }
        next.retain(|r| !r.is_empty());
        next.sort_by(|a, b| a.begin.cmp(&b.begin));
        self.ranges = next;
    }

    /// Merge adjacent/overlapping ranges. Not required for correctness
    /// (`mark_completed` keeps the set disjoint on its own) but keeps the
    /// set compact after many small completions.
    pub fn normalise(&mut self) {
        self.ranges.sort_by(|a, b| a.begin.cmp(&b.begin));
        let mut merged: Vec<ByteRange> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if range.begin <= last.end => {
                    if range.end > last.end {
                        last.end = range.end;
                    }
                }
                _ => merged.push(range),
            }
        }
        self.ranges = merged;
    }

    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
