// Copyright 2025 Cowboy AI, LLC.

//! Pipeline orchestration
//!
//! Composes the stages explicitly, in dependency order:
//!
//! ```text
//! RawTable ─▶ AttributeTable ─▶ FormalContext ─▶ ConceptLattice
//!                  │                                  │
//!                  └──────────▶ SourceMapper ◀────────┤
//!                                    │          ConceptNamer
//!                                    ▼                │
//!                              HierarchyTables ◀──────┘
//! ```
//!
//! Every stage runs to completion before the next starts; a fatal error in
//! any stage aborts the run before tables are produced.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::attribute::KindHierarchy;
use crate::attribute_table::{
    AttributeTable, ComponentId, InvalidComponentPolicy, RawTable, TableLayout,
};
use crate::concept_naming::{ConceptNamer, DEFAULT_TOP_NAME};
use crate::concepts::HierarchyTables;
use crate::context::{ContextBuilder, FormalContext};
use crate::errors::{LatticeError, LatticeResult};
use crate::lattice::{ConceptLattice, LatticeBuilder, LatticeOptions};
use crate::source_mapping::{
    SourceMapper, SourceMapping, UnmappedReport, DEFAULT_UNMAPPED_SAMPLE,
};

/// Run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Attribute kinds in dependency order (index = rank)
    pub kinds: Vec<String>,
    /// Column holding the item id
    pub id_column: String,
    /// Handling of components that skip a rank
    pub invalid_components: InvalidComponentPolicy,
    /// Add the infimum concept when no seed carries every attribute
    pub include_bottom: bool,
    /// Name of the universal concept
    pub top_name: String,
    /// Unmapped component ids kept in the report
    pub unmapped_sample_size: usize,
    /// Use the rayon pool for seeding and the covering relation
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            kinds: vec!["primary".to_string(), "secondary".to_string()],
            id_column: "id".to_string(),
            invalid_components: InvalidComponentPolicy::Drop,
            include_bottom: true,
            top_name: DEFAULT_TOP_NAME.to_string(),
            unmapped_sample_size: DEFAULT_UNMAPPED_SAMPLE,
            parallel: true,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration; absent fields take their defaults
    pub fn from_json_str(json: &str) -> LatticeResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration and build its kind hierarchy
    pub fn validate(&self) -> LatticeResult<KindHierarchy> {
        if self.id_column.trim().is_empty() {
            return Err(LatticeError::Configuration(
                "id_column cannot be empty".to_string(),
            ));
        }
        if self.top_name.trim().is_empty() {
            return Err(LatticeError::Configuration(
                "top_name cannot be empty".to_string(),
            ));
        }
        KindHierarchy::new(self.kinds.iter().cloned())
    }

    /// JSON schema of the configuration
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schema_for!(PipelineConfig)).unwrap_or_default()
    }
}

/// Counts and non-fatal findings of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Items with at least one valid component
    pub items: usize,
    /// Valid components
    pub components: usize,
    /// Components dropped by the rank rule
    pub dropped_components: Vec<ComponentId>,
    /// Objects of the formal context
    pub seeds: usize,
    /// Attribute columns of the formal context
    pub attributes: usize,
    /// Concepts in the lattice
    pub concepts: usize,
    /// Covering edges
    pub edges: usize,
    /// Mapped components
    pub mapped: usize,
    /// Components without an exact concept
    pub unmapped: UnmappedReport,
}

/// Everything a run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Normalized input
    pub table: AttributeTable,
    /// Seeded formal context
    pub context: FormalContext,
    /// Concept lattice
    pub lattice: ConceptLattice,
    /// Component to concept mapping
    pub mapping: SourceMapping,
    /// Output tables
    pub tables: HierarchyTables,
    /// Run summary
    pub report: RunReport,
}

/// Configured hierarchy derivation
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    kinds: KindHierarchy,
}

impl Pipeline {
    /// Validate the configuration and prepare a pipeline
    pub fn new(config: PipelineConfig) -> LatticeResult<Self> {
        let kinds = config.validate()?;
        Ok(Self { config, kinds })
    }

    /// Active configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Declared kinds
    pub fn kinds(&self) -> &KindHierarchy {
        &self.kinds
    }

    /// Run on a raw table, inferring the column layout from its headers
    pub fn run(&self, raw: &RawTable) -> LatticeResult<PipelineOutput> {
        let layout = TableLayout::infer(&raw.headers, &self.kinds, &self.config.id_column);
        self.run_with_layout(raw, &layout)
    }

    /// Run on a raw table with an explicit column layout
    pub fn run_with_layout(
        &self,
        raw: &RawTable,
        layout: &TableLayout,
    ) -> LatticeResult<PipelineOutput> {
        let table =
            AttributeTable::from_raw(raw, layout, &self.kinds, self.config.invalid_components)?;
        self.run_table(table)
    }

    /// Run on an already normalized attribute table
    pub fn run_table(&self, table: AttributeTable) -> LatticeResult<PipelineOutput> {
        let _span = info_span!("derive_hierarchy", items = table.item_count()).entered();

        let context = ContextBuilder::new()
            .parallel(self.config.parallel)
            .build(&table);
        let lattice = LatticeBuilder::new(table.kinds().clone())
            .with_options(LatticeOptions {
                include_bottom: self.config.include_bottom,
                parallel: self.config.parallel,
            })
            .build(&context)?;
        let mapping = SourceMapper::new(self.config.unmapped_sample_size).map(&table, &lattice);
        let namer =
            ConceptNamer::new(table.kinds().clone()).with_top_name(self.config.top_name.clone());
        let tables = HierarchyTables::build(&lattice, &namer, &mapping)?;

        let report = RunReport {
            items: table.item_count(),
            components: table.component_count(),
            dropped_components: table.dropped().to_vec(),
            seeds: context.object_count(),
            attributes: context.attribute_count(),
            concepts: lattice.len(),
            edges: lattice.edges().len(),
            mapped: mapping.mappings.len(),
            unmapped: mapping.unmapped.clone(),
        };
        info!(
            concepts = report.concepts,
            edges = report.edges,
            mapped = report.mapped,
            dropped = report.dropped_components.len(),
            "hierarchy derived"
        );

        Ok(PipelineOutput {
            table,
            context,
            lattice,
            mapping,
            tables,
            report,
        })
    }
}
