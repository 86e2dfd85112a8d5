// Copyright 2025 Cowboy AI, LLC.

//! Formal context and lazy concept seeding
//!
//! Objects of the context are not the source items but *seed intents*: the
//! attribute sets that will become concepts. Only a handful of seeds are
//! derived per item (the exact component sets, single values, primary/
//! dependent pairs and the combinations of multi-component items), which
//! keeps the context linear in the input instead of enumerating the powerset
//! of attribute values.

use std::collections::BTreeSet;

use indexmap::IndexSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::attribute::Attribute;
use crate::attribute_table::{AttributeTable, Component};

/// Why a seed exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SeedOrigin {
    /// Exact attribute set of a source component
    Component,
    /// A lone rank-0 value
    Single,
    /// A rank-0 value with one of its dependent values
    Pair,
    /// Rank-0 values of a multi-component item, joined
    Combination,
    /// Joined rank-0 values with the joined values of one dependent rank
    PairedCombination,
}

/// One object of the formal context
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed {
    /// Seeding rule that produced the intent
    pub origin: SeedOrigin,
    /// Attribute set the seed stands for
    pub intent: BTreeSet<Attribute>,
}

impl Seed {
    fn new(origin: SeedOrigin, intent: impl IntoIterator<Item = Attribute>) -> Self {
        Self {
            origin,
            intent: intent.into_iter().collect(),
        }
    }
}

/// Objects × attributes incidence table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalContext {
    objects: Vec<Seed>,
    attributes: Vec<Attribute>,
    incidence: Vec<Vec<bool>>,
}

impl FormalContext {
    /// Build the context from its objects.
    ///
    /// One attribute column exists for every distinct attribute appearing in
    /// any seed, in canonical `(rank, value)` order.
    pub fn new(objects: Vec<Seed>) -> Self {
        let attributes: Vec<Attribute> = objects
            .iter()
            .flat_map(|s| s.intent.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let incidence = objects
            .iter()
            .map(|s| attributes.iter().map(|a| s.intent.contains(a)).collect())
            .collect();
        Self {
            objects,
            attributes,
            incidence,
        }
    }

    /// Seeds, indexed by object position
    pub fn objects(&self) -> &[Seed] {
        &self.objects
    }

    /// Attribute columns in canonical order
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Number of objects
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Number of attribute columns
    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Column of an attribute
    pub fn attribute_index(&self, attribute: &Attribute) -> Option<usize> {
        self.attributes.binary_search(attribute).ok()
    }

    /// Incidence lookup by object and attribute position
    pub fn incident(&self, object: usize, attribute: usize) -> bool {
        self.incidence
            .get(object)
            .and_then(|row| row.get(attribute))
            .copied()
            .unwrap_or(false)
    }

    /// Attributes incident to one object (its row of the matrix)
    pub fn object_intent(&self, object: usize) -> BTreeSet<Attribute> {
        self.incidence
            .get(object)
            .map(|row| {
                row.iter()
                    .zip(&self.attributes)
                    .filter(|(hit, _)| **hit)
                    .map(|(_, a)| a.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Derivation of an object set: attributes shared by every object.
    ///
    /// The empty object set derives to every attribute of the context.
    pub fn common_attributes(&self, objects: &BTreeSet<usize>) -> BTreeSet<Attribute> {
        self.attributes
            .iter()
            .enumerate()
            .filter(|(a, _)| objects.iter().all(|&o| self.incident(o, *a)))
            .map(|(_, attr)| attr.clone())
            .collect()
    }

    /// Derivation of an attribute set: objects carrying every attribute.
    ///
    /// An attribute missing from the context yields the empty extent.
    pub fn common_objects(&self, intent: &BTreeSet<Attribute>) -> BTreeSet<usize> {
        let columns: Option<Vec<usize>> =
            intent.iter().map(|a| self.attribute_index(a)).collect();
        let Some(columns) = columns else {
            return BTreeSet::new();
        };
        (0..self.objects.len())
            .filter(|&o| columns.iter().all(|&a| self.incident(o, a)))
            .collect()
    }
}

/// Expands an attribute table into seeds and the formal context
#[derive(Debug, Clone, Copy)]
pub struct ContextBuilder {
    parallel: bool,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self { parallel: true }
    }
}

impl ContextBuilder {
    /// Builder with parallel seeding
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parallel seeding over items
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Seed every item and build the context.
    ///
    /// Seeds are de-duplicated per `(origin, intent)` and kept in item order,
    /// so the result does not depend on scheduling.
    pub fn build(&self, table: &AttributeTable) -> FormalContext {
        let ranks = table.kinds().len();
        let items: Vec<&[Component]> = table.items().map(|(_, cs)| cs).collect();
        let per_item: Vec<Vec<Seed>> = if self.parallel {
            items.par_iter().map(|cs| seed_item(cs, ranks)).collect()
        } else {
            items.iter().map(|cs| seed_item(cs, ranks)).collect()
        };
        let seeds: IndexSet<Seed> = per_item.into_iter().flatten().collect();
        let context = FormalContext::new(seeds.into_iter().collect());
        info!(
            objects = context.object_count(),
            attributes = context.attribute_count(),
            "formal context built"
        );
        context
    }
}

/// Seeds contributed by one item.
///
/// The rank-0 combination is emitted when the item has more than one distinct
/// primary value. A paired combination for rank `r` is emitted when more than
/// one distinct `(primary, rank-r value)` pair occurs; a primary repeats in its
/// join when it pairs with several dependents.
fn seed_item(components: &[Component], ranks: usize) -> Vec<Seed> {
    let mut seeds = Vec::new();
    for component in components {
        let primary = component.primary();
        seeds.push(Seed::new(SeedOrigin::Component, component.intent()));
        seeds.push(Seed::new(SeedOrigin::Single, [primary.clone()]));
        for dependent in &component.attributes()[1..] {
            seeds.push(Seed::new(
                SeedOrigin::Pair,
                [primary.clone(), dependent.clone()],
            ));
        }
    }

    // Joins are canonical: sorted and free of repeats, whatever the slot order.
    let mut primaries: Vec<&str> = components
        .iter()
        .map(|c| c.primary().value.as_str())
        .collect();
    primaries.sort_unstable();
    primaries.dedup();
    if primaries.len() > 1 {
        seeds.push(Seed::new(
            SeedOrigin::Combination,
            [Attribute::combination(0, primaries)],
        ));
    }

    for rank in 1..ranks {
        // Sorted as (primary, dependent) pairs so both joins stay aligned
        let mut pairs: Vec<(&str, &str)> = components
            .iter()
            .filter_map(|c| {
                c.attribute(rank)
                    .map(|d| (c.primary().value.as_str(), d.value.as_str()))
            })
            .collect();
        pairs.sort_unstable();
        pairs.dedup();
        if pairs.len() < 2 {
            continue;
        }
        let (primaries, dependents): (Vec<&str>, Vec<&str>) = pairs.into_iter().unzip();
        seeds.push(Seed::new(
            SeedOrigin::PairedCombination,
            [
                Attribute::combination(0, primaries),
                Attribute::combination(rank, dependents),
            ],
        ));
    }
    seeds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::KindHierarchy;
    use crate::attribute_table::{AttributeRecord, ComponentId, InvalidComponentPolicy};
    use pretty_assertions::assert_eq;

    fn table(rows: &[(&str, usize, usize, &str)]) -> AttributeTable {
        let records = rows.iter().filter_map(|(item, comp, rank, value)| {
            AttributeRecord::from_cell(ComponentId::new(*item, *comp), *rank, value)
        });
        AttributeTable::from_records(
            records,
            KindHierarchy::primary_secondary(),
            InvalidComponentPolicy::Drop,
        )
        .unwrap()
    }

    fn intent(attrs: &[(usize, &str)]) -> BTreeSet<Attribute> {
        attrs.iter().map(|(r, v)| Attribute::new(*r, *v)).collect()
    }

    fn intents(ctx: &FormalContext) -> BTreeSet<BTreeSet<Attribute>> {
        ctx.objects().iter().map(|s| s.intent.clone()).collect()
    }

    #[test]
    fn single_component_seeds_exact_single_and_pair() {
        let t = table(&[("a", 0, 0, "A"), ("a", 0, 1, "X")]);
        let ctx = ContextBuilder::new().build(&t);
        let expected: BTreeSet<_> = [intent(&[(0, "A"), (1, "X")]), intent(&[(0, "A")])]
            .into_iter()
            .collect();
        assert_eq!(intents(&ctx), expected);
        // Component and Pair share the intent but stay separate objects
        assert_eq!(ctx.object_count(), 3);
        assert_eq!(ctx.attribute_count(), 2);
    }

    #[test]
    fn multi_component_item_seeds_combinations() {
        let t = table(&[
            ("a", 0, 0, "A"),
            ("a", 0, 1, "X"),
            ("a", 1, 0, "B"),
            ("a", 1, 1, "Y"),
        ]);
        let ctx = ContextBuilder::new().parallel(false).build(&t);
        let all = intents(&ctx);
        assert!(all.contains(&intent(&[(0, "A|B")])));
        assert!(all.contains(&intent(&[(0, "A|B"), (1, "X|Y")])));
        assert!(!all.contains(&intent(&[(1, "X")])));
    }

    #[test]
    fn paired_combination_only_joins_carriers() {
        let t = table(&[
            ("a", 0, 0, "A"),
            ("a", 1, 0, "B"),
            ("a", 1, 1, "Y"),
        ]);
        let ctx = ContextBuilder::new().build(&t);
        let origins: BTreeSet<_> = ctx.objects().iter().map(|s| s.origin).collect();
        assert!(origins.contains(&SeedOrigin::Combination));
        assert!(!origins.contains(&SeedOrigin::PairedCombination));
    }

    #[test]
    fn combination_joins_ignore_slot_order() {
        let t = table(&[
            ("x", 0, 0, "A"),
            ("x", 0, 1, "X"),
            ("x", 1, 0, "B"),
            ("x", 1, 1, "Y"),
            ("y", 0, 0, "B"),
            ("y", 0, 1, "Y"),
            ("y", 1, 0, "A"),
            ("y", 1, 1, "X"),
        ]);
        let ctx = ContextBuilder::new().build(&t);
        let joined: BTreeSet<_> = ctx
            .objects()
            .iter()
            .filter(|s| {
                matches!(
                    s.origin,
                    SeedOrigin::Combination | SeedOrigin::PairedCombination
                )
            })
            .map(|s| s.intent.clone())
            .collect();
        let expected: BTreeSet<_> = [
            intent(&[(0, "A|B")]),
            intent(&[(0, "A|B"), (1, "X|Y")]),
        ]
        .into_iter()
        .collect();
        assert_eq!(joined, expected);
        // y repeats every seed of x
        assert_eq!(ctx.object_count(), 8);
    }

    #[test]
    fn repeated_values_do_not_form_combinations() {
        let t = table(&[
            ("a", 0, 0, "A"),
            ("a", 0, 1, "X"),
            ("a", 1, 0, "A"),
            ("a", 1, 1, "X"),
        ]);
        let ctx = ContextBuilder::new().build(&t);
        let origins: BTreeSet<_> = ctx.objects().iter().map(|s| s.origin).collect();
        assert_eq!(
            origins,
            BTreeSet::from([SeedOrigin::Component, SeedOrigin::Single, SeedOrigin::Pair])
        );
        assert_eq!(ctx.attribute_count(), 2);
    }

    #[test]
    fn shared_primary_repeats_in_paired_join() {
        let t = table(&[
            ("a", 0, 0, "A"),
            ("a", 0, 1, "Y"),
            ("a", 1, 0, "A"),
            ("a", 1, 1, "X"),
        ]);
        let ctx = ContextBuilder::new().build(&t);
        let all = intents(&ctx);
        assert!(all.contains(&intent(&[(0, "A|A"), (1, "X|Y")])));
        assert!(!all.contains(&intent(&[(0, "A|A")])));
    }

    #[test]
    fn derivation_operators_follow_incidence() {
        let t = table(&[("a", 0, 0, "A"), ("a", 0, 1, "X"), ("b", 0, 0, "B")]);
        let ctx = ContextBuilder::new().build(&t);
        let a = intent(&[(0, "A")]);
        let extent = ctx.common_objects(&a);
        assert!(!extent.is_empty());
        assert_eq!(ctx.common_attributes(&extent), a);
        assert_eq!(
            ctx.common_attributes(&BTreeSet::new()).len(),
            ctx.attribute_count()
        );
        assert!(ctx.common_objects(&intent(&[(0, "Z")])).is_empty());
        for o in 0..ctx.object_count() {
            assert_eq!(ctx.object_intent(o), ctx.objects()[o].intent);
        }
    }

    #[test]
    fn parallel_and_sequential_seeding_agree() {
        let t = table(&[
            ("a", 0, 0, "A"),
            ("b", 0, 0, "B"),
            ("b", 1, 0, "C"),
            ("c", 0, 0, "A"),
            ("c", 0, 1, "X"),
        ]);
        assert_eq!(
            ContextBuilder::new().parallel(true).build(&t),
            ContextBuilder::new().parallel(false).build(&t)
        );
    }
}
