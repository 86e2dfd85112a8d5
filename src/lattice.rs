// Copyright 2025 Cowboy AI, LLC.

//! Concept lattice: closure, identity and the covering relation
//!
//! Every seed row of the [`FormalContext`] is already a closed intent, since
//! seeds are exact attribute sets rather than sampled subsets. The builder
//! collapses rows with equal intents, adds the universal top (and, unless
//! disabled, the infimum), assigns ids in canonical intent-text order and
//! derives the Hasse diagram of strict intent inclusion.
//!
//! ```text
//!            top (∅)
//!           /       \
//!       p_A          p_D
//!        |            |
//!   p_A; s_C     p_D; s_E
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt::{self, Display, Formatter};

use rayon::prelude::*;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attribute::{Attribute, KindHierarchy};
use crate::context::FormalContext;
use crate::errors::{LatticeError, LatticeResult};

/// Stable concept identifier; `0` is always the top concept
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(transparent)]
pub struct ConceptId(pub usize);

impl ConceptId {
    /// Id of the universal concept
    pub const TOP: ConceptId = ConceptId(0);

    /// Position in the lattice's concept list
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for ConceptId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A closed `(extent, intent)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormalConcept {
    id: ConceptId,
    intent: BTreeSet<Attribute>,
    extent: BTreeSet<usize>,
}

impl FormalConcept {
    /// Concept id
    pub fn id(&self) -> ConceptId {
        self.id
    }

    /// Attribute set (smaller = more general)
    pub fn intent(&self) -> &BTreeSet<Attribute> {
        &self.intent
    }

    /// Context objects carrying every attribute of the intent
    pub fn extent(&self) -> &BTreeSet<usize> {
        &self.extent
    }

    /// True for the universal concept
    pub fn is_top(&self) -> bool {
        self.intent.is_empty()
    }
}

/// Direct "is-a" edge from a concept to one of its covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CoveringEdge {
    /// More specific concept
    pub child: ConceptId,
    /// Immediately more general concept
    pub parent: ConceptId,
}

/// Options for lattice construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatticeOptions {
    /// Add the infimum (all attributes, empty extent) when no seed has it
    pub include_bottom: bool,
    /// Compute the covering relation on the rayon pool
    pub parallel: bool,
}

impl Default for LatticeOptions {
    fn default() -> Self {
        Self {
            include_bottom: true,
            parallel: true,
        }
    }
}

/// Immutable concept lattice with its covering relation
#[derive(Debug, Clone)]
pub struct ConceptLattice {
    kinds: KindHierarchy,
    concepts: Vec<FormalConcept>,
    edges: Vec<CoveringEdge>,
    by_intent: BTreeMap<BTreeSet<Attribute>, ConceptId>,
    parents: Vec<Vec<ConceptId>>,
    children: Vec<Vec<ConceptId>>,
    bottom: Option<ConceptId>,
}

impl ConceptLattice {
    /// Kinds used to render intents
    pub fn kinds(&self) -> &KindHierarchy {
        &self.kinds
    }

    /// Concepts ordered by id
    pub fn concepts(&self) -> &[FormalConcept] {
        &self.concepts
    }

    /// Covering edges ordered by `(child, parent)`
    pub fn edges(&self) -> &[CoveringEdge] {
        &self.edges
    }

    /// Number of concepts
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    /// Never true: the top concept always exists
    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Concept by id
    pub fn concept(&self, id: ConceptId) -> Option<&FormalConcept> {
        self.concepts.get(id.index())
    }

    /// The universal concept
    pub fn top(&self) -> &FormalConcept {
        &self.concepts[ConceptId::TOP.index()]
    }

    /// The synthesized infimum, when one was added
    pub fn bottom(&self) -> Option<&FormalConcept> {
        self.bottom.and_then(|id| self.concept(id))
    }

    /// Concept whose intent equals `intent` exactly
    pub fn find_by_intent(&self, intent: &BTreeSet<Attribute>) -> Option<&FormalConcept> {
        self.by_intent.get(intent).and_then(|id| self.concept(*id))
    }

    /// Canonical text of a concept's intent
    pub fn intent_text(&self, id: ConceptId) -> Option<String> {
        self.concept(id)
            .map(|c| self.kinds.render_intent(c.intent()))
    }

    /// Direct parents (covers) of a concept
    pub fn parents(&self, id: ConceptId) -> &[ConceptId] {
        self.parents.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Direct children of a concept
    pub fn children(&self, id: ConceptId) -> &[ConceptId] {
        self.children.get(id.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every concept reachable by following parent edges
    pub fn ancestors(&self, id: ConceptId) -> BTreeSet<ConceptId> {
        let mut seen = BTreeSet::new();
        let mut queue: VecDeque<ConceptId> = self.parents(id).iter().copied().collect();
        while let Some(cur) = queue.pop_front() {
            if seen.insert(cur) {
                queue.extend(self.parents(cur).iter().copied());
            }
        }
        seen
    }

    /// True when `ancestor` is reachable from `descendant` through parents
    pub fn is_ancestor(&self, ancestor: ConceptId, descendant: ConceptId) -> bool {
        self.ancestors(descendant).contains(&ancestor)
    }

    /// Check the structural invariants.
    ///
    /// A violation means canonicalization or closure is broken, so callers
    /// must not emit the lattice.
    pub fn validate(&self) -> LatticeResult<()> {
        if self.by_intent.len() != self.concepts.len() {
            return Err(LatticeError::InvariantViolation(format!(
                "{} concepts but only {} distinct intents",
                self.concepts.len(),
                self.by_intent.len()
            )));
        }
        let tops: Vec<ConceptId> = self
            .concepts
            .iter()
            .filter(|c| c.is_top())
            .map(|c| c.id)
            .collect();
        if tops != [ConceptId::TOP] {
            return Err(LatticeError::InvariantViolation(format!(
                "expected a single top concept with id 0, found {tops:?}"
            )));
        }
        for (index, concept) in self.concepts.iter().enumerate() {
            if concept.id.index() != index {
                return Err(LatticeError::InvariantViolation(format!(
                    "concept at position {index} carries id {}",
                    concept.id
                )));
            }
            if !concept.is_top() && self.parents(concept.id).is_empty() {
                return Err(LatticeError::InvariantViolation(format!(
                    "concept {} has no parent",
                    concept.id
                )));
            }
        }
        for edge in &self.edges {
            let (Some(child), Some(parent)) = (self.concept(edge.child), self.concept(edge.parent))
            else {
                return Err(LatticeError::InvariantViolation(format!(
                    "edge {} -> {} references an unknown concept",
                    edge.child, edge.parent
                )));
            };
            if parent.intent.len() >= child.intent.len() || !parent.intent.is_subset(&child.intent)
            {
                return Err(LatticeError::InvariantViolation(format!(
                    "edge {} -> {} does not follow strict intent inclusion",
                    edge.child, edge.parent
                )));
            }
        }
        Ok(())
    }
}

/// Builds a [`ConceptLattice`] from a [`FormalContext`]
#[derive(Debug, Clone)]
pub struct LatticeBuilder {
    kinds: KindHierarchy,
    options: LatticeOptions,
}

impl LatticeBuilder {
    /// Builder rendering intents with `kinds`
    pub fn new(kinds: KindHierarchy) -> Self {
        Self {
            kinds,
            options: LatticeOptions::default(),
        }
    }

    /// Replace the construction options
    pub fn with_options(mut self, options: LatticeOptions) -> Self {
        self.options = options;
        self
    }

    /// Compute concepts, ids and the covering relation.
    pub fn build(&self, context: &FormalContext) -> LatticeResult<ConceptLattice> {
        // Closure: each row intent is closed; equal rows collapse here.
        let mut closed: BTreeMap<BTreeSet<Attribute>, BTreeSet<usize>> = BTreeMap::new();
        for object in 0..context.object_count() {
            let intent = context.object_intent(object);
            if !closed.contains_key(&intent) {
                let extent = context.common_objects(&intent);
                closed.insert(intent, extent);
            }
        }

        // Universal top; its extent is every object.
        closed
            .entry(BTreeSet::new())
            .or_insert_with(|| (0..context.object_count()).collect());

        let full: BTreeSet<Attribute> = context.attributes().iter().cloned().collect();
        let mut bottom_intent = None;
        if self.options.include_bottom && !closed.contains_key(&full) {
            debug!(attributes = full.len(), "adding infimum concept");
            let extent = context.common_objects(&full);
            closed.insert(full.clone(), extent);
            bottom_intent = Some(full);
        }

        // Ids follow canonical intent text; the empty text sorts first.
        let mut ordered: Vec<(String, BTreeSet<Attribute>, BTreeSet<usize>)> = closed
            .into_iter()
            .map(|(intent, extent)| (self.kinds.render_intent(&intent), intent, extent))
            .collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        let concepts: Vec<FormalConcept> = ordered
            .into_iter()
            .enumerate()
            .map(|(index, (_, intent, extent))| FormalConcept {
                id: ConceptId(index),
                intent,
                extent,
            })
            .collect();
        let by_intent: BTreeMap<BTreeSet<Attribute>, ConceptId> = concepts
            .iter()
            .map(|c| (c.intent.clone(), c.id))
            .collect();
        let bottom = bottom_intent.and_then(|intent| by_intent.get(&intent).copied());

        let edges = covering_edges(&concepts, self.options.parallel);
        let mut parents = vec![Vec::new(); concepts.len()];
        let mut children = vec![Vec::new(); concepts.len()];
        for edge in &edges {
            parents[edge.child.index()].push(edge.parent);
            children[edge.parent.index()].push(edge.child);
        }

        let lattice = ConceptLattice {
            kinds: self.kinds.clone(),
            concepts,
            edges,
            by_intent,
            parents,
            children,
            bottom,
        };
        lattice.validate()?;
        info!(
            concepts = lattice.len(),
            edges = lattice.edges.len(),
            "concept lattice built"
        );
        Ok(lattice)
    }
}

/// Transitive reduction of strict intent inclusion.
///
/// For a child, the candidate parents are the strictly smaller subset
/// intents. Scanned from largest to smallest, a candidate is a cover exactly
/// when it is not contained in a cover already accepted: any intermediate
/// concept is larger, so it was scanned first, and is itself below some
/// accepted cover.
fn covering_edges(concepts: &[FormalConcept], parallel: bool) -> Vec<CoveringEdge> {
    let mut by_size: Vec<&FormalConcept> = concepts.iter().collect();
    by_size.sort_by_key(|c| (c.intent.len(), c.id));

    let covers_of = |child: &FormalConcept| -> Vec<CoveringEdge> {
        let smaller = by_size.partition_point(|c| c.intent.len() < child.intent.len());
        let mut accepted: Vec<&FormalConcept> = Vec::new();
        for candidate in by_size[..smaller].iter().rev() {
            if !candidate.intent.is_subset(&child.intent) {
                continue;
            }
            if accepted
                .iter()
                .any(|cover| candidate.intent.is_subset(&cover.intent))
            {
                continue;
            }
            accepted.push(*candidate);
        }
        let mut edges: Vec<CoveringEdge> = accepted
            .into_iter()
            .map(|parent| CoveringEdge {
                child: child.id,
                parent: parent.id,
            })
            .collect();
        edges.sort();
        edges
    };

    let mut edges: Vec<CoveringEdge> = if parallel {
        concepts.par_iter().flat_map_iter(covers_of).collect()
    } else {
        concepts.iter().flat_map(covers_of).collect()
    };
    edges.sort();
    edges
}
