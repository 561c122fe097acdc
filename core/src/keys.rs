//! Key layout (spec §6): every persisted key is tuple-packed underneath a
//! single configurable root subspace `S`, never ad-hoc concatenation.

use keyspace_tuple::{Subspace, Value};

/// Which phase a scrubber progress `RangeSet` belongs to (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrubPhase {
    Phase1,
    Phase2,
}

impl ScrubPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ScrubPhase::Phase1 => "phase1",
            ScrubPhase::Phase2 => "phase2",
        }
    }
}

/// Derives every well-known subspace/key spec §6 names from a single root.
#[derive(Debug, Clone)]
pub struct Keys {
    root: Subspace,
}

impl Keys {
    pub fn new(root: Subspace) -> Self { Self { root } }

    pub fn root(&self) -> &Subspace { &self.root }

    /// `S / "R" / entityType`.
    pub fn records(&self, entity_type: &str) -> Subspace {
        self.root.child(&[Value::String("R".into()), Value::String(entity_type.to_string())])
    }

    /// `S / "R" / entityType / id`.
    pub fn record_key(&self, entity_type: &str, id: &Value) -> Vec<u8> { self.records(entity_type).pack(&[id.clone()]) }

    /// `S / "I" / indexName`.
    pub fn index(&self, index_name: &str) -> Subspace {
        self.root.child(&[Value::String("I".into()), Value::String(index_name.to_string())])
    }

    /// `S / "_index_state" / indexName`.
    pub fn index_state_key(&self, index_name: &str) -> Vec<u8> {
        self.root.child(&[Value::String("_index_state".into())]).pack(&[Value::String(index_name.to_string())])
    }

    /// `S / "I" / "_progress" / indexName`.
    pub fn build_progress_key(&self, index_name: &str) -> Vec<u8> {
        self.root
            .child(&[Value::String("I".into()), Value::String("_progress".into())])
            .pack(&[Value::String(index_name.to_string())])
    }

    /// `S / "I" / "_scrub_progress" / indexName / {"phase1"|"phase2"}`.
    pub fn scrub_progress_key(&self, index_name: &str, phase: ScrubPhase) -> Vec<u8> {
        self.root
            .child(&[Value::String("I".into()), Value::String("_scrub_progress".into()), Value::String(index_name.to_string())])
            .pack(&[Value::String(phase.as_str().to_string())])
    }
}
