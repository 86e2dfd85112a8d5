// Copyright 2025 Cowboy AI, LLC.

//! Attributes and the ranked kind hierarchy
//!
//! An attribute is a `(kind, value)` pair. Kinds are declared in dependency
//! order: rank 0 is the primary kind, and a component may only carry an
//! attribute of rank `r` when it also carries one of every rank below `r`.
//! Attributes are qualified by rank, so identically spelled values of
//! different kinds never collide.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::errors::{LatticeError, LatticeResult};

/// Separator used when several values are joined into one combination value.
pub const COMBINATION_SEPARATOR: &str = "|";

/// Separator between attributes in rendered intent text.
pub const INTENT_SEPARATOR: &str = "; ";

/// Characters dropped from raw values during normalization.
const STRIPPED: [char; 3] = ['(', ')', ','];

/// Characters folded to `_` (in addition to whitespace) during normalization.
/// Includes the combination separator and the intent text separator so a
/// normalized value can never be mistaken for a joined one.
const FOLDED: [char; 4] = ['-', '_', '|', ';'];

/// Normalize a raw attribute cell into a value token.
///
/// Whitespace runs and hyphens collapse to a single underscore, parentheses
/// and commas are removed, leading/trailing underscores are trimmed. Case is
/// preserved. Returns `None` for cells that carry no value.
pub fn normalize_value(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.chars() {
        if STRIPPED.contains(&ch) {
            continue;
        }
        if ch.is_whitespace() || FOLDED.contains(&ch) {
            pending_sep = true;
            continue;
        }
        if pending_sep && !out.is_empty() {
            out.push('_');
        }
        pending_sep = false;
        out.push(ch);
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

/// Declared attribute kinds, ordered by dependency (index = rank)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindHierarchy {
    kinds: Vec<String>,
    tags: Vec<String>,
}

impl KindHierarchy {
    /// Build a hierarchy from kind names in rank order.
    ///
    /// Each kind is tagged by its lowercased first letter; tags must be
    /// unique so rendered attribute text stays unambiguous.
    pub fn new<I, S>(kinds: I) -> LatticeResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let kinds: Vec<String> = kinds.into_iter().map(Into::into).collect();
        if kinds.is_empty() {
            return Err(LatticeError::Configuration(
                "at least one attribute kind is required".to_string(),
            ));
        }
        let mut tags = Vec::with_capacity(kinds.len());
        let mut seen_names = BTreeSet::new();
        let mut seen_tags = BTreeSet::new();
        for kind in &kinds {
            let first = kind.trim().chars().next().ok_or_else(|| {
                LatticeError::Configuration("attribute kind names cannot be empty".to_string())
            })?;
            if !seen_names.insert(kind.as_str()) {
                return Err(LatticeError::Configuration(format!(
                    "attribute kind '{kind}' declared twice"
                )));
            }
            let tag: String = first.to_lowercase().collect();
            if !seen_tags.insert(tag.clone()) {
                return Err(LatticeError::Configuration(format!(
                    "attribute kind '{kind}' shares its tag '{tag}' with another kind"
                )));
            }
            tags.push(tag);
        }
        Ok(Self { kinds, tags })
    }

    /// The conventional two-level hierarchy: `primary` then `secondary`.
    pub fn primary_secondary() -> Self {
        Self {
            kinds: vec!["primary".to_string(), "secondary".to_string()],
            tags: vec!["p".to_string(), "s".to_string()],
        }
    }

    /// Number of declared kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Always false for a constructed hierarchy.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Rank of a kind by name.
    pub fn rank_of(&self, kind: &str) -> Option<usize> {
        self.kinds.iter().position(|k| k == kind)
    }

    /// Kind name at a rank.
    pub fn kind_name(&self, rank: usize) -> Option<&str> {
        self.kinds.get(rank).map(String::as_str)
    }

    /// Short tag for a rank (e.g. `p` for `primary`).
    pub fn tag(&self, rank: usize) -> Option<&str> {
        self.tags.get(rank).map(String::as_str)
    }

    /// Iterate kind names in rank order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(String::as_str)
    }

    /// Human-readable text for an attribute: `<tag>_<value>`.
    pub fn render(&self, attribute: &Attribute) -> String {
        match self.tag(attribute.rank) {
            Some(tag) => format!("{tag}_{}", attribute.value),
            None => format!("r{}_{}", attribute.rank, attribute.value),
        }
    }

    /// Canonical text of an attribute set: rendered attributes in
    /// `(rank, value)` order joined by [`INTENT_SEPARATOR`]. Empty for the
    /// empty set.
    pub fn render_intent<'a, I>(&self, intent: I) -> String
    where
        I: IntoIterator<Item = &'a Attribute>,
    {
        let mut attrs: Vec<&Attribute> = intent.into_iter().collect();
        attrs.sort();
        attrs.dedup();
        attrs
            .into_iter()
            .map(|a| self.render(a))
            .collect::<Vec<_>>()
            .join(INTENT_SEPARATOR)
    }
}

impl Default for KindHierarchy {
    fn default() -> Self {
        Self::primary_secondary()
    }
}

/// A rank-qualified attribute value.
///
/// Ordering is `(rank, value)`, which is also the canonical order used for
/// intent text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Attribute {
    /// Rank of the attribute's kind
    pub rank: usize,
    /// Normalized value token
    pub value: String,
}

impl Attribute {
    /// Create an attribute from an already normalized value.
    pub fn new(rank: usize, value: impl Into<String>) -> Self {
        Self {
            rank,
            value: value.into(),
        }
    }

    /// Join several values (in the given order) into one combination attribute.
    pub fn combination<'a, I>(rank: usize, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let joined: Vec<&str> = values.into_iter().collect();
        Self::new(rank, joined.join(COMBINATION_SEPARATOR))
    }

    /// True when this value was produced by joining several values.
    pub fn is_combination(&self) -> bool {
        self.value.contains(COMBINATION_SEPARATOR)
    }
}

impl Display for Attribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "r{}:{}", self.rank, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("Beta Blocker", Some("Beta_Blocker"); "whitespace collapses")]
    #[test_case("ACE-inhibitor", Some("ACE_inhibitor"); "hyphen collapses")]
    #[test_case(
        "  calcium  channel -- blocker ",
        Some("calcium_channel_blocker");
        "runs collapse once"
    )]
    #[test_case("(extended), release", Some("extended_release"); "parens and commas stripped")]
    #[test_case("a|b;c", Some("a_b_c"); "separators folded")]
    #[test_case("   ", None; "blank cell")]
    #[test_case("(),", None; "only stripped characters")]
    fn normalizes_values(raw: &str, expected: Option<&str>) {
        assert_eq!(normalize_value(raw).as_deref(), expected);
    }

    #[test]
    fn hierarchy_assigns_ranks_and_tags() {
        let kinds = KindHierarchy::new(["Primary", "secondary", "tertiary"]).unwrap();
        assert_eq!(kinds.len(), 3);
        assert_eq!(kinds.rank_of("secondary"), Some(1));
        assert_eq!(kinds.tag(0), Some("p"));
        assert_eq!(kinds.kind_name(2), Some("tertiary"));
        assert_eq!(kinds.render(&Attribute::new(0, "Statin")), "p_Statin");
    }

    #[test]
    fn intent_text_is_canonical() {
        let kinds = KindHierarchy::primary_secondary();
        let a = Attribute::new(1, "X");
        let b = Attribute::new(0, "B");
        let c = Attribute::new(0, "A");
        assert_eq!(kinds.render_intent([&a, &b, &c, &b]), "p_A; p_B; s_X");
        assert_eq!(kinds.render_intent(Vec::<&Attribute>::new()), "");
    }

    #[test]
    fn hierarchy_rejects_ambiguous_kinds() {
        assert!(KindHierarchy::new(Vec::<String>::new()).is_err());
        assert!(KindHierarchy::new(["primary", "primary"]).is_err());
        assert!(KindHierarchy::new(["primary", "Pathway"]).is_err());
        assert!(KindHierarchy::new(["primary", ""]).is_err());
    }

    #[test]
    fn combination_joins_in_order() {
        let a = Attribute::combination(0, ["b", "a"]);
        assert_eq!(a.value, "b|a");
        assert!(a.is_combination());
        assert!(!Attribute::new(0, "b").is_combination());
    }

    #[test]
    fn attributes_of_different_kinds_do_not_collide() {
        let p = Attribute::new(0, "x");
        let s = Attribute::new(1, "x");
        assert_ne!(p, s);
        assert!(p < s);
    }
}
