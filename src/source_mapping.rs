// Copyright 2025 Cowboy AI, LLC.

//! Source mapping: components to their exact concept
//!
//! A component maps to the concept whose intent *equals* its attribute set.
//! Intents are unique in a lattice, so there is at most one candidate.
//! Components without an exact match are collected, not treated as errors.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::attribute_table::{AttributeTable, ComponentId};
use crate::lattice::{ConceptId, ConceptLattice};

/// Default number of unmapped component ids kept for reporting
pub const DEFAULT_UNMAPPED_SAMPLE: usize = 10;

/// One mapped component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Source component
    pub component: ComponentId,
    /// Concept with the identical intent
    pub concept: ConceptId,
    /// Component cells as they appeared in the source
    pub source_text: String,
}

/// Components that found no exact concept
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedReport {
    /// How many components were left unmapped
    pub total: usize,
    /// First unmapped ids, in table order
    pub sample: Vec<ComponentId>,
}

impl UnmappedReport {
    /// True when every component was mapped
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

/// Result of mapping a table onto a lattice
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMapping {
    /// Mapped components in table order
    pub mappings: Vec<Mapping>,
    /// Components without an exact match
    pub unmapped: UnmappedReport,
}

impl SourceMapping {
    /// Concept a component was mapped to
    pub fn concept_of(&self, component: &ComponentId) -> Option<ConceptId> {
        self.mappings
            .iter()
            .find(|m| &m.component == component)
            .map(|m| m.concept)
    }
}

/// Maps components of an attribute table onto lattice concepts
#[derive(Debug, Clone, Copy)]
pub struct SourceMapper {
    sample_size: usize,
}

impl Default for SourceMapper {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_UNMAPPED_SAMPLE,
        }
    }
}

impl SourceMapper {
    /// Mapper keeping `sample_size` unmapped ids for reporting
    pub fn new(sample_size: usize) -> Self {
        Self { sample_size }
    }

    /// Map every component; unmapped ones are reported, never fatal.
    pub fn map(&self, table: &AttributeTable, lattice: &ConceptLattice) -> SourceMapping {
        let mut result = SourceMapping::default();
        for component in table.components() {
            match lattice.find_by_intent(&component.intent()) {
                Some(concept) => result.mappings.push(Mapping {
                    component: component.id().clone(),
                    concept: concept.id(),
                    source_text: component.source_text(),
                }),
                None => {
                    result.unmapped.total += 1;
                    if result.unmapped.sample.len() < self.sample_size {
                        result.unmapped.sample.push(component.id().clone());
                    }
                }
            }
        }

        if !result.unmapped.is_empty() {
            let sample: Vec<String> = result
                .unmapped
                .sample
                .iter()
                .map(ToString::to_string)
                .collect();
            warn!(
                total = result.unmapped.total,
                sample = ?sample,
                "components without an exact concept match"
            );
        }
        info!(
            mapped = result.mappings.len(),
            unmapped = result.unmapped.total,
            "source components mapped"
        );
        result
    }
}
