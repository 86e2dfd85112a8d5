// Copyright 2025 Cowboy AI, LLC.

//! Concept naming: display names for lattice concepts
//!
//! A concept's name is derived from its intent alone: each attribute is
//! rendered with its kind tag (`p_statin`, `s_lipophilic`) and the rendered
//! attributes are joined in canonical order. The universal concept has no
//! attributes and gets a fixed sentinel instead. Names are pure and can be
//! recomputed at any time.

use std::collections::BTreeSet;

use crate::attribute::{Attribute, KindHierarchy};
use crate::lattice::FormalConcept;

/// Default sentinel name of the universal concept
pub const DEFAULT_TOP_NAME: &str = "universal";

/// Names concepts from their intents
#[derive(Debug, Clone)]
pub struct ConceptNamer {
    kinds: KindHierarchy,
    top_name: String,
}

impl ConceptNamer {
    /// Namer rendering attributes with `kinds`
    pub fn new(kinds: KindHierarchy) -> Self {
        Self {
            kinds,
            top_name: DEFAULT_TOP_NAME.to_string(),
        }
    }

    /// Replace the sentinel used for the empty intent
    pub fn with_top_name(mut self, top_name: impl Into<String>) -> Self {
        self.top_name = top_name.into();
        self
    }

    /// Sentinel name of the universal concept
    pub fn top_name(&self) -> &str {
        &self.top_name
    }

    /// Name of an attribute set
    pub fn name_intent(&self, intent: &BTreeSet<Attribute>) -> String {
        if intent.is_empty() {
            self.top_name.clone()
        } else {
            self.kinds.render_intent(intent)
        }
    }

    /// Name of a concept
    pub fn name(&self, concept: &FormalConcept) -> String {
        self.name_intent(concept.intent())
    }
}
