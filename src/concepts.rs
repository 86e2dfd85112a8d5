// Copyright 2025 Cowboy AI, LLC.

//! Concept tables
//!
//! The derived vocabulary leaves the crate as three flat tables: `concepts`
//! (one row per concept), `concept_relationship` (one "Is a" row per covering
//! edge, child first) and `mapping` (one row per mapped source component).
//! They are plain serde rows so any external writer can persist them; a
//! delimited rendering is provided for the common CSV/TSV case.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::concept_naming::ConceptNamer;
use crate::errors::{LatticeError, LatticeResult};
use crate::lattice::{ConceptId, ConceptLattice};
use crate::source_mapping::SourceMapping;

/// Relationship label between concepts
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum RelationshipLabel {
    /// Is-a (taxonomy) relationship, child to parent
    #[serde(rename = "Is a")]
    IsA,
}

impl Display for RelationshipLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipLabel::IsA => f.write_str("Is a"),
        }
    }
}

/// Row of the `concepts` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConceptRow {
    /// Concept id (0 = universal concept)
    pub id: ConceptId,
    /// Display name derived from the intent
    pub name: String,
}

/// Row of the `concept_relationship` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConceptRelationshipRow {
    /// More specific concept
    pub id_1: ConceptId,
    /// Always "Is a"
    pub relationship: RelationshipLabel,
    /// Direct parent concept
    pub id_2: ConceptId,
}

/// Row of the `mapping` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MappingRow {
    /// Source item id
    pub item_id: String,
    /// Component index within the item
    pub component: usize,
    /// Concept with the identical intent
    pub concept_id: ConceptId,
    /// Source cells of the component
    pub source_attribute_text: String,
    /// Name of the target concept
    pub target_attribute_text: String,
}

/// Delimited text of the three tables, header row included
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedTables {
    /// `concepts` table
    pub concepts: String,
    /// `concept_relationship` table
    pub concept_relationship: String,
    /// `mapping` table
    pub mapping: String,
}

/// The three output tables of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct HierarchyTables {
    /// One row per concept, ordered by id
    pub concepts: Vec<ConceptRow>,
    /// One row per covering edge, ordered by `(id_1, id_2)`
    pub concept_relationship: Vec<ConceptRelationshipRow>,
    /// One row per mapped component, in table order
    pub mapping: Vec<MappingRow>,
}

impl HierarchyTables {
    /// Assemble the tables from a finished lattice and mapping.
    ///
    /// Relationship and mapping rows may only reference ids present in the
    /// concept table.
    pub fn build(
        lattice: &ConceptLattice,
        namer: &ConceptNamer,
        mapping: &SourceMapping,
    ) -> LatticeResult<Self> {
        let concepts: Vec<ConceptRow> = lattice
            .concepts()
            .iter()
            .map(|c| ConceptRow {
                id: c.id(),
                name: namer.name(c),
            })
            .collect();
        let known: BTreeSet<ConceptId> = concepts.iter().map(|r| r.id).collect();

        let mut concept_relationship = Vec::with_capacity(lattice.edges().len());
        for edge in lattice.edges() {
            if !known.contains(&edge.child) || !known.contains(&edge.parent) {
                return Err(LatticeError::InvariantViolation(format!(
                    "relationship {} -> {} references a concept outside the table",
                    edge.child, edge.parent
                )));
            }
            concept_relationship.push(ConceptRelationshipRow {
                id_1: edge.child,
                relationship: RelationshipLabel::IsA,
                id_2: edge.parent,
            });
        }

        let mut rows = Vec::with_capacity(mapping.mappings.len());
        for m in &mapping.mappings {
            let name = concepts
                .get(m.concept.index())
                .map(|r| r.name.clone())
                .ok_or_else(|| {
                    LatticeError::InvariantViolation(format!(
                        "component {} maps to unknown concept {}",
                        m.component, m.concept
                    ))
                })?;
            rows.push(MappingRow {
                item_id: m.component.item_id.clone(),
                component: m.component.index,
                concept_id: m.concept,
                source_attribute_text: m.source_text.clone(),
                target_attribute_text: name,
            });
        }

        Ok(Self {
            concepts,
            concept_relationship,
            mapping: rows,
        })
    }

    /// Render each table as delimited text with a header row.
    pub fn to_delimited(&self, separator: char) -> DelimitedTables {
        let sep = separator.to_string();
        let line = |fields: &[String]| -> String {
            let quoted: Vec<String> = fields.iter().map(|f| quote(f, separator)).collect();
            quoted.join(&sep) + "\n"
        };

        let mut concepts = line(&["id".to_string(), "name".to_string()]);
        for r in &self.concepts {
            concepts.push_str(&line(&[r.id.to_string(), r.name.clone()]));
        }

        let mut concept_relationship =
            line(&["id_1".to_string(), "relationship".to_string(), "id_2".to_string()]);
        for r in &self.concept_relationship {
            concept_relationship.push_str(&line(&[
                r.id_1.to_string(),
                r.relationship.to_string(),
                r.id_2.to_string(),
            ]));
        }

        let mut mapping = line(&[
            "item_id".to_string(),
            "component".to_string(),
            "concept_id".to_string(),
            "source_attribute_text".to_string(),
            "target_attribute_text".to_string(),
        ]);
        for r in &self.mapping {
            mapping.push_str(&line(&[
                r.item_id.clone(),
                r.component.to_string(),
                r.concept_id.to_string(),
                r.source_attribute_text.clone(),
                r.target_attribute_text.clone(),
            ]));
        }

        DelimitedTables {
            concepts,
            concept_relationship,
            mapping,
        }
    }

    /// Pretty JSON of all three tables
    pub fn to_json(&self) -> LatticeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JSON schema of the table bundle
    pub fn json_schema() -> serde_json::Value {
        serde_json::to_value(schema_for!(HierarchyTables)).unwrap_or_default()
    }
}

/// Quote a field when it contains the separator, a quote or a line break
fn quote(field: &str, separator: char) -> String {
    if field.contains(separator) || field.contains(['"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::KindHierarchy;
    use crate::attribute_table::{
        AttributeRecord, AttributeTable, ComponentId, InvalidComponentPolicy,
    };
    use crate::context::ContextBuilder;
    use crate::lattice::LatticeBuilder;
    use crate::source_mapping::SourceMapper;
    use pretty_assertions::assert_eq;

    fn tables() -> HierarchyTables {
        let records = [("a", 0, 0, "A"), ("b", 0, 0, "A"), ("b", 0, 1, "X, Y")]
            .into_iter()
            .filter_map(|(item, comp, rank, value)| {
                AttributeRecord::from_cell(ComponentId::new(item, comp), rank, value)
            });
        let table = AttributeTable::from_records(
            records,
            KindHierarchy::primary_secondary(),
            InvalidComponentPolicy::Drop,
        )
        .unwrap();
        let ctx = ContextBuilder::new().build(&table);
        let lattice = LatticeBuilder::new(table.kinds().clone()).build(&ctx).unwrap();
        let mapping = SourceMapper::default().map(&table, &lattice);
        HierarchyTables::build(&lattice, &ConceptNamer::new(table.kinds().clone()), &mapping)
            .unwrap()
    }

    #[test]
    fn tables_render_as_csv() {
        let out = tables().to_delimited(',');
        assert_eq!(out.concepts, "id,name\n0,universal\n1,p_A\n2,p_A; s_X_Y\n");
        assert_eq!(
            out.concept_relationship,
            "id_1,relationship,id_2\n1,Is a,0\n2,Is a,1\n"
        );
        assert_eq!(
            out.mapping,
            "item_id,component,concept_id,source_attribute_text,target_attribute_text\n\
             a,0,1,A,p_A\n\
             b,0,2,\"A; X, Y\",p_A; s_X_Y\n"
        );
    }

    #[test]
    fn label_serializes_as_is_a() {
        let json = serde_json::to_string(&RelationshipLabel::IsA).unwrap();
        assert_eq!(json, "\"Is a\"");
        let t = tables();
        let back: HierarchyTables = serde_json::from_str(&t.to_json().unwrap()).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn schema_names_all_tables() {
        let schema = HierarchyTables::json_schema();
        let props = &schema["properties"];
        for table in ["concepts", "concept_relationship", "mapping"] {
            assert!(props.get(table).is_some(), "missing {table}");
        }
    }

    #[test]
    fn quoting_doubles_inner_quotes() {
        assert_eq!(quote("say \"hi\"", ','), "\"say \"\"hi\"\"\"");
        assert_eq!(quote("plain", '\t'), "plain");
        assert_eq!(quote("a\tb", '\t'), "\"a\tb\"");
    }
}
