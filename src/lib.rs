// Copyright 2025 Cowboy AI, LLC.

//! # Vocabulary Lattice
//!
//! Derives a concept hierarchy from a table of items described by ranked,
//! categorical attributes, using Formal Concept Analysis.
//!
//! The derivation runs as a chain of pure stages:
//! - **AttributeTable**: normalized long-form records grouped into components
//! - **ContextBuilder**: lazily seeds the formal context from each item
//! - **LatticeBuilder**: closes, identifies and orders concepts (Hasse diagram)
//! - **ConceptNamer**: display names from intents
//! - **SourceMapper**: exact component to concept mapping
//! - **HierarchyTables**: the `concepts`, `concept_relationship` and `mapping`
//!   output tables
//!
//! [`Pipeline`] wires the stages together from a [`PipelineConfig`].
//!
//! ## Design Principles
//!
//! 1. **Determinism**: the same input yields the same ids, names and edges
//! 2. **Lazy seeding**: concepts are seeded per item, never from a powerset
//! 3. **Fail at the boundary**: malformed input is rejected before analysis
//! 4. **Immutability**: every stage consumes finished values and returns new ones

#![warn(missing_docs)]

mod attribute;
mod attribute_table;
mod concept_naming;
mod concepts;
mod context;
mod errors;
mod lattice;
mod pipeline;
mod source_mapping;

pub use attribute::{
    normalize_value, Attribute, KindHierarchy, COMBINATION_SEPARATOR, INTENT_SEPARATOR,
};
pub use attribute_table::{
    AttributeRecord, AttributeTable, Component, ComponentId, InvalidComponentPolicy,
    KindColumns, RawTable, TableLayout,
};
pub use concept_naming::{ConceptNamer, DEFAULT_TOP_NAME};
pub use concepts::{
    ConceptRelationshipRow, ConceptRow, DelimitedTables, HierarchyTables, MappingRow,
    RelationshipLabel,
};
pub use context::{ContextBuilder, FormalContext, Seed, SeedOrigin};
pub use errors::{LatticeError, LatticeResult};
pub use lattice::{
    ConceptId, ConceptLattice, CoveringEdge, FormalConcept, LatticeBuilder, LatticeOptions,
};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput, RunReport};
pub use source_mapping::{
    Mapping, SourceMapper, SourceMapping, UnmappedReport, DEFAULT_UNMAPPED_SAMPLE,
};
