// Copyright 2025 Cowboy AI, LLC.

//! Attribute table: normalized long-form records grouped into components
//!
//! The raw input is a wide table keyed by item id with a fixed number of
//! slot columns per attribute kind. Slot `i` of every kind belongs to
//! component `i` of the item, so a combination item spreads over several
//! components. [`AttributeTable::from_raw`] turns that table into exactly one
//! record per `(item, component, kind)` and enforces the rank rule once, at
//! the boundary.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attribute::{normalize_value, Attribute, KindHierarchy};
use crate::errors::{LatticeError, LatticeResult};

/// Identity of one component: `(item id, component index)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentId {
    /// Item the component belongs to
    pub item_id: String,
    /// Position of the component within the item
    pub index: usize,
}

impl ComponentId {
    /// Create a component id
    pub fn new(item_id: impl Into<String>, index: usize) -> Self {
        Self {
            item_id: item_id.into(),
            index,
        }
    }
}

impl Display for ComponentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.item_id, self.index)
    }
}

/// What to do with a component that breaks the rank rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum InvalidComponentPolicy {
    /// Discard the component and keep going
    #[default]
    Drop,
    /// Abort with [`LatticeError::InvalidComponent`]
    Reject,
}

/// One long-form row: `(item, component, kind) -> value`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRecord {
    /// Owning component
    pub component: ComponentId,
    /// Rank of the attribute kind
    pub rank: usize,
    /// Normalized value
    pub value: String,
    /// Cell text as it appeared in the source
    pub raw: String,
}

impl AttributeRecord {
    /// Build a record, normalizing the raw cell. Blank cells yield `None`.
    pub fn from_cell(component: ComponentId, rank: usize, raw: &str) -> Option<Self> {
        normalize_value(raw).map(|value| Self {
            component,
            rank,
            value,
            raw: raw.trim().to_string(),
        })
    }
}

/// A validated component: one attribute per rank, ranks `0..n` contiguous
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    id: ComponentId,
    attributes: Vec<Attribute>,
    raw: Vec<String>,
}

impl Component {
    /// Component identity
    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    /// Rank-0 attribute (always present on a valid component)
    pub fn primary(&self) -> &Attribute {
        &self.attributes[0]
    }

    /// Attribute at a rank, if present
    pub fn attribute(&self, rank: usize) -> Option<&Attribute> {
        self.attributes.get(rank)
    }

    /// Attributes ordered by rank
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// The component's attribute set
    pub fn intent(&self) -> BTreeSet<Attribute> {
        self.attributes.iter().cloned().collect()
    }

    /// Source text of the component's cells, in rank order
    pub fn source_text(&self) -> String {
        self.raw.join("; ")
    }
}

/// Declares which raw columns hold which kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindColumns {
    /// Kind name (must be declared in the hierarchy)
    pub kind: String,
    /// Slot columns; slot `i` belongs to component `i`
    pub columns: Vec<String>,
}

/// Column layout of a raw table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    /// Column holding the item id
    pub id_column: String,
    /// Slot columns per kind
    pub kind_columns: Vec<KindColumns>,
}

impl TableLayout {
    /// Infer a layout from column names.
    ///
    /// A header belongs to a kind when it equals the kind name or is the kind
    /// name followed by a slot number (`primary_2`, `primary2`), compared
    /// case-insensitively. Slots keep header order. Other columns are ignored.
    pub fn infer(headers: &[String], kinds: &KindHierarchy, id_column: &str) -> Self {
        let mut kind_columns: Vec<KindColumns> = kinds
            .kinds()
            .map(|k| KindColumns {
                kind: k.to_string(),
                columns: Vec::new(),
            })
            .collect();
        for header in headers.iter().filter(|h| h.as_str() != id_column) {
            let lower = header.to_ascii_lowercase();
            let owner = kind_columns.iter_mut().find(|kc| {
                let kind = kc.kind.to_ascii_lowercase();
                match lower.strip_prefix(&kind) {
                    Some("") => true,
                    Some(rest) => {
                        let digits = rest.strip_prefix('_').unwrap_or(rest);
                        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
                    }
                    None => false,
                }
            });
            if let Some(kc) = owner {
                kc.columns.push(header.clone());
            }
        }
        Self {
            id_column: id_column.to_string(),
            kind_columns,
        }
    }

    fn attribute_column_count(&self) -> usize {
        self.kind_columns.iter().map(|kc| kc.columns.len()).sum()
    }
}

/// Wide table as handed over by an external loader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTable {
    /// Column names
    pub headers: Vec<String>,
    /// Rows of cells, one cell per header
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Create a raw table from headers and rows
    pub fn new<H, S>(headers: H, rows: Vec<Vec<String>>) -> Self
    where
        H: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// Normalized, immutable attribute table
#[derive(Debug, Clone)]
pub struct AttributeTable {
    kinds: KindHierarchy,
    items: IndexMap<String, Vec<Component>>,
    dropped: Vec<ComponentId>,
}

impl AttributeTable {
    /// Transform a wide raw table into a validated attribute table.
    ///
    /// Fails fast on a missing id column, on a layout with no attribute
    /// columns, on columns or kinds that do not exist, on ragged rows, and on
    /// blank or repeated item ids.
    pub fn from_raw(
        raw: &RawTable,
        layout: &TableLayout,
        kinds: &KindHierarchy,
        policy: InvalidComponentPolicy,
    ) -> LatticeResult<Self> {
        let id_idx = raw.column(&layout.id_column).ok_or_else(|| {
            LatticeError::malformed(format!("missing id column '{}'", layout.id_column))
        })?;
        if layout.attribute_column_count() == 0 {
            return Err(LatticeError::malformed("no attribute columns"));
        }

        // (rank, column index per slot)
        let mut slots: Vec<(usize, Vec<usize>)> = Vec::with_capacity(layout.kind_columns.len());
        for kc in &layout.kind_columns {
            let rank = kinds.rank_of(&kc.kind).ok_or_else(|| {
                LatticeError::malformed(format!("unknown attribute kind '{}'", kc.kind))
            })?;
            let mut cols = Vec::with_capacity(kc.columns.len());
            for name in &kc.columns {
                cols.push(raw.column(name).ok_or_else(|| {
                    LatticeError::malformed(format!("missing attribute column '{name}'"))
                })?);
            }
            slots.push((rank, cols));
        }

        let mut seen_items = BTreeSet::new();
        let mut records = Vec::new();
        for (line, row) in raw.rows.iter().enumerate() {
            if row.len() != raw.headers.len() {
                return Err(LatticeError::malformed(format!(
                    "row {line} has {} cells, expected {}",
                    row.len(),
                    raw.headers.len()
                )));
            }
            let item_id = row[id_idx].trim();
            if item_id.is_empty() {
                return Err(LatticeError::malformed(format!("row {line} has no item id")));
            }
            if !seen_items.insert(item_id.to_string()) {
                return Err(LatticeError::malformed(format!(
                    "item id '{item_id}' appears in more than one row"
                )));
            }
            for (rank, cols) in &slots {
                for (slot, &col) in cols.iter().enumerate() {
                    let id = ComponentId::new(item_id, slot);
                    if let Some(record) = AttributeRecord::from_cell(id, *rank, &row[col]) {
                        records.push(record);
                    }
                }
            }
        }

        Self::from_records(records, kinds.clone(), policy)
    }

    /// Build from long-form records.
    ///
    /// Records are grouped by component in first-appearance order. Values
    /// must already be normalized (see [`AttributeRecord::from_cell`]), which
    /// also keeps them free of the combination separator. A component must
    /// not repeat a rank; components that skip a rank are dropped or rejected
    /// according to `policy`.
    pub fn from_records(
        records: impl IntoIterator<Item = AttributeRecord>,
        kinds: KindHierarchy,
        policy: InvalidComponentPolicy,
    ) -> LatticeResult<Self> {
        let mut grouped: IndexMap<ComponentId, BTreeMap<usize, (String, String)>> =
            IndexMap::new();
        for record in records {
            if record.rank >= kinds.len() {
                return Err(LatticeError::malformed(format!(
                    "component {} has rank {} but only {} kinds are declared",
                    record.component,
                    record.rank,
                    kinds.len()
                )));
            }
            if normalize_value(&record.value).as_deref() != Some(record.value.as_str()) {
                return Err(LatticeError::malformed(format!(
                    "component {} has unnormalized value '{}' at rank {}",
                    record.component, record.value, record.rank
                )));
            }
            let slot = grouped.entry(record.component.clone()).or_default();
            if slot.insert(record.rank, (record.value, record.raw)).is_some() {
                return Err(LatticeError::malformed(format!(
                    "component {} has more than one attribute of rank {}",
                    record.component, record.rank
                )));
            }
        }

        let mut items: IndexMap<String, Vec<Component>> = IndexMap::new();
        let mut dropped = Vec::new();
        for (id, by_rank) in grouped {
            if let Some(missing_rank) = first_missing_rank(&by_rank) {
                match policy {
                    InvalidComponentPolicy::Reject => {
                        return Err(LatticeError::InvalidComponent {
                            component: id,
                            missing_rank,
                        })
                    }
                    InvalidComponentPolicy::Drop => {
                        debug!(component = %id, missing_rank, "dropping invalid component");
                        dropped.push(id);
                        continue;
                    }
                }
            }
            let (attributes, raw): (Vec<Attribute>, Vec<String>) = by_rank
                .into_iter()
                .map(|(rank, (value, raw))| (Attribute::new(rank, value), raw))
                .unzip();
            items.entry(id.item_id.clone()).or_default().push(Component {
                id,
                attributes,
                raw,
            });
        }
        for components in items.values_mut() {
            components.sort_by_key(|c| c.id.index);
        }

        let table = Self {
            kinds,
            items,
            dropped,
        };
        info!(
            items = table.item_count(),
            components = table.component_count(),
            dropped = table.dropped.len(),
            "attribute table built"
        );
        Ok(table)
    }

    /// Declared kinds
    pub fn kinds(&self) -> &KindHierarchy {
        &self.kinds
    }

    /// Items in first-appearance order with their components
    pub fn items(&self) -> impl Iterator<Item = (&str, &[Component])> {
        self.items.iter().map(|(id, cs)| (id.as_str(), cs.as_slice()))
    }

    /// Every valid component
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.items.values().flatten()
    }

    /// Components of one item
    pub fn item(&self, item_id: &str) -> Option<&[Component]> {
        self.items.get(item_id).map(Vec::as_slice)
    }

    /// Number of items with at least one valid component
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of valid components
    pub fn component_count(&self) -> usize {
        self.items.values().map(Vec::len).sum()
    }

    /// Components discarded by the rank rule
    pub fn dropped(&self) -> &[ComponentId] {
        &self.dropped
    }

    /// Long-form view: exactly one record per `(item, component, kind)`
    pub fn records(&self) -> Vec<AttributeRecord> {
        self.components()
            .flat_map(|c| {
                c.attributes
                    .iter()
                    .zip(&c.raw)
                    .map(move |(a, raw)| AttributeRecord {
                        component: c.id.clone(),
                        rank: a.rank,
                        value: a.value.clone(),
                        raw: raw.clone(),
                    })
            })
            .collect()
    }
}

/// First rank below the highest present rank that is absent
fn first_missing_rank<V>(by_rank: &BTreeMap<usize, V>) -> Option<usize> {
    by_rank
        .keys()
        .enumerate()
        .find(|(expected, rank)| expected != *rank)
        .map(|(expected, _)| expected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn headers() -> Vec<String> {
        row(&["id", "primary_1", "primary_2", "secondary_1", "secondary_2", "notes"])
    }

    #[test_case("primary", true; "bare kind")]
    #[test_case("primary_3", true; "underscore slot")]
    #[test_case("Primary2", true; "case and digits")]
    #[test_case("primary_x", false; "non numeric suffix")]
    #[test_case("primarysecondary", false; "other word")]
    fn infers_kind_columns(header: &str, expected: bool) {
        let layout = TableLayout::infer(
            &row(&["id", header]),
            &KindHierarchy::primary_secondary(),
            "id",
        );
        assert_eq!(layout.kind_columns[0].columns.len() == 1, expected);
    }

    #[test]
    fn layout_inference_keeps_slot_order() {
        let layout = TableLayout::infer(&headers(), &KindHierarchy::default(), "id");
        assert_eq!(layout.kind_columns[0].columns, row(&["primary_1", "primary_2"]));
        assert_eq!(layout.kind_columns[1].columns, row(&["secondary_1", "secondary_2"]));
    }

    #[test]
    fn wide_rows_become_components() {
        let raw = RawTable {
            headers: headers(),
            rows: vec![
                row(&["rx1", "Beta Blocker", "", "", "", "n/a"]),
                row(&["rx2", "Diuretic", "ACE-inhibitor", "thiazide", "", ""]),
            ],
        };
        let kinds = KindHierarchy::default();
        let layout = TableLayout::infer(&raw.headers, &kinds, "id");
        let table =
            AttributeTable::from_raw(&raw, &layout, &kinds, InvalidComponentPolicy::Drop).unwrap();

        assert_eq!(table.item_count(), 2);
        assert_eq!(table.component_count(), 3);
        let rx2 = table.item("rx2").unwrap();
        assert_eq!(rx2[0].attributes().len(), 2);
        assert_eq!(rx2[0].attribute(1).unwrap().value, "thiazide");
        assert_eq!(rx2[1].primary().value, "ACE_inhibitor");
        assert_eq!(rx2[0].source_text(), "Diuretic; thiazide");
        assert_eq!(table.records().len(), 4);
    }

    #[test]
    fn secondary_without_primary_is_dropped() {
        let raw = RawTable {
            headers: headers(),
            rows: vec![row(&["rx9", "", "", "orphan", "", ""])],
        };
        let kinds = KindHierarchy::default();
        let layout = TableLayout::infer(&raw.headers, &kinds, "id");
        let table =
            AttributeTable::from_raw(&raw, &layout, &kinds, InvalidComponentPolicy::Drop).unwrap();
        assert_eq!(table.item_count(), 0);
        assert_eq!(table.dropped(), &[ComponentId::new("rx9", 0)]);

        let err = AttributeTable::from_raw(&raw, &layout, &kinds, InvalidComponentPolicy::Reject)
            .unwrap_err();
        assert_eq!(
            err,
            LatticeError::InvalidComponent {
                component: ComponentId::new("rx9", 0),
                missing_rank: 0,
            }
        );
    }

    #[test]
    fn malformed_tables_fail_fast() {
        let kinds = KindHierarchy::default();
        let raw = RawTable {
            headers: row(&["code", "primary"]),
            rows: vec![row(&["a", "x"])],
        };
        let layout = TableLayout::infer(&raw.headers, &kinds, "id");
        let err = AttributeTable::from_raw(&raw, &layout, &kinds, InvalidComponentPolicy::Drop)
            .unwrap_err();
        assert!(err.is_input_error());

        let raw = RawTable {
            headers: row(&["id", "notes"]),
            rows: vec![],
        };
        let layout = TableLayout::infer(&raw.headers, &kinds, "id");
        let err = AttributeTable::from_raw(&raw, &layout, &kinds, InvalidComponentPolicy::Drop)
            .unwrap_err();
        assert_eq!(err, LatticeError::malformed("no attribute columns"));

        let raw = RawTable {
            headers: row(&["id", "primary"]),
            rows: vec![row(&["a", "x"]), row(&["a", "y"])],
        };
        let layout = TableLayout::infer(&raw.headers, &kinds, "id");
        assert!(
            AttributeTable::from_raw(&raw, &layout, &kinds, InvalidComponentPolicy::Drop).is_err()
        );
    }

    #[test]
    fn repeated_rank_in_records_is_rejected() {
        let id = ComponentId::new("a", 0);
        let records = vec![
            AttributeRecord::from_cell(id.clone(), 0, "x").unwrap(),
            AttributeRecord::from_cell(id, 0, "y").unwrap(),
        ];
        let err = AttributeTable::from_records(
            records,
            KindHierarchy::default(),
            InvalidComponentPolicy::Drop,
        )
        .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test_case("A|B"; "combination separator")]
    #[test_case(""; "empty")]
    #[test_case(" A"; "untrimmed")]
    #[test_case("beta blocker"; "inner whitespace")]
    fn unnormalized_record_values_are_rejected(value: &str) {
        let records = vec![
            AttributeRecord::from_cell(ComponentId::new("x", 0), 0, "A").unwrap(),
            AttributeRecord {
                component: ComponentId::new("z", 0),
                rank: 0,
                value: value.to_string(),
                raw: value.to_string(),
            },
        ];
        let err = AttributeTable::from_records(
            records,
            KindHierarchy::default(),
            InvalidComponentPolicy::Drop,
        )
        .unwrap_err();
        assert!(matches!(err, LatticeError::MalformedInput { .. }));
    }

    #[test]
    fn first_missing_rank_finds_gaps() {
        let m: BTreeMap<usize, ()> = [(0, ()), (2, ())].into_iter().collect();
        assert_eq!(first_missing_rank(&m), Some(1));
        let m: BTreeMap<usize, ()> = [(1, ())].into_iter().collect();
        assert_eq!(first_missing_rank(&m), Some(0));
        let m: BTreeMap<usize, ()> = [(0, ()), (1, ())].into_iter().collect();
        assert_eq!(first_missing_rank(&m), None);
    }
}
