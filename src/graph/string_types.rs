//! String restrictions: what we observed about the values of a string type.
//!
//! A string primitive either accepts anything ([`StringTypes::Unrestricted`]) or is
//! narrowed to a set of literal cases (with occurrence counts) plus a set of recognised
//! sub-formats ([`StringTypes::Restricted`]). A restriction is never empty in both parts.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ————————————————————————————————————————————————————————————————————————————
// SUB-FORMATS
// ————————————————————————————————————————————————————————————————————————————

/// A recognised refinement of a plain string.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
    Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum TransformedStringKind {
    Date,
    Time,
    DateTime,
    Uuid,
    Uri,
    IntegerString,
    BoolString,
}

impl TransformedStringKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "date-time",
            Self::Uuid => "uuid",
            Self::Uri => "uri",
            Self::IntegerString => "integer-string",
            Self::BoolString => "bool-string",
        }
    }
}

impl fmt::Display for TransformedStringKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// STRING TYPE MAPPING
// ————————————————————————————————————————————————————————————————————————————

/// What a run does with one sub-format.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StringDisposition {
    /// Emit the sub-format as its own type.
    #[default]
    Keep,
    /// Treat the sub-format as a plain string.
    FoldToString,
}

/// Per-run table from sub-format to disposition. Missing kinds are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StringTypeMapping(BTreeMap<TransformedStringKind, StringDisposition>);

impl StringTypeMapping {
    pub fn fold(mut self, kind: TransformedStringKind) -> Self {
        self.0.insert(kind, StringDisposition::FoldToString);
        self
    }

    pub fn disposition(&self, kind: TransformedStringKind) -> StringDisposition {
        self.0.get(&kind).copied().unwrap_or_default()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// RESTRICTION
// ————————————————————————————————————————————————————————————————————————————

/// Literal cases and sub-formats observed for one string type.
///
/// Fields are private: the constructor rejects the empty restriction and
/// drops zero counts, so every value in circulation is well-formed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Restriction {
    cases: BTreeMap<String, u64>,
    transformations: BTreeSet<TransformedStringKind>,
}

impl Restriction {
    pub fn cases(&self) -> &BTreeMap<String, u64> {
        &self.cases
    }

    pub fn transformations(&self) -> &BTreeSet<TransformedStringKind> {
        &self.transformations
    }

    /// Sum of all case counts.
    pub fn total_count(&self) -> u64 {
        self.cases.values().sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StringTypes {
    #[default]
    Unrestricted,
    Restricted(Restriction),
}

impl StringTypes {
    pub fn unrestricted() -> Self {
        Self::Unrestricted
    }

    /// Build a restriction; `None` when it would be empty in both parts.
    pub fn restricted(
        cases: BTreeMap<String, u64>,
        transformations: BTreeSet<TransformedStringKind>,
    ) -> Option<Self> {
        let cases: BTreeMap<String, u64> = cases.into_iter().filter(|(_, n)| *n > 0).collect();
        if cases.is_empty() && transformations.is_empty() {
            return None;
        }
        Some(Self::Restricted(Restriction { cases, transformations }))
    }

    /// One literal seen `count` times. A zero count yields an open string.
    pub fn from_case(value: impl Into<String>, count: u64) -> Self {
        let cases = BTreeMap::from([(value.into(), count)]);
        Self::restricted(cases, BTreeSet::new()).unwrap_or_default()
    }

    /// Count every occurrence in `values`.
    pub fn from_cases<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cases = BTreeMap::<String, u64>::new();
        for value in values {
            *cases.entry(value.into()).or_default() += 1;
        }
        Self::restricted(cases, BTreeSet::new()).unwrap_or_default()
    }

    pub fn from_transformation(kind: TransformedStringKind) -> Self {
        Self::Restricted(Restriction {
            cases: BTreeMap::new(),
            transformations: BTreeSet::from([kind]),
        })
    }

    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Restricted(_))
    }

    pub fn restriction(&self) -> Option<&Restriction> {
        match self {
            Self::Unrestricted => None,
            Self::Restricted(r) => Some(r),
        }
    }

    /// Least upper bound: counts add up, an open string absorbs everything.
    pub fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Restricted(a), Self::Restricted(b)) => {
                let mut cases = a.cases.clone();
                for (value, count) in &b.cases {
                    *cases.entry(value.clone()).or_default() += count;
                }
                let transformations = &a.transformations | &b.transformations;
                Self::Restricted(Restriction { cases, transformations })
            }
            _ => Self::Unrestricted,
        }
    }

    /// Narrow through the run's mapping. If any observed sub-format folds to
    /// plain string the value may be any string, so the restriction opens up.
    pub fn apply_string_type_mapping(&self, mapping: &StringTypeMapping) -> Self {
        let Self::Restricted(restriction) = self else {
            return Self::Unrestricted;
        };
        let folds = restriction
            .transformations
            .iter()
            .any(|kind| mapping.disposition(*kind) == StringDisposition::FoldToString);
        if folds {
            Self::Unrestricted
        } else {
            self.clone()
        }
    }
}

impl fmt::Display for StringTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unrestricted => f.write_str("unrestricted"),
            Self::Restricted(r) => {
                f.write_str("restricted{")?;
                let cases = r.cases.iter().map(|(k, n)| format!("{k:?}:{n}"));
                let kinds = r.transformations.iter().map(|k| k.to_string());
                let parts: Vec<String> = cases.chain(kinds).collect();
                write!(f, "{}}}", parts.join(", "))
            }
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
