//! Per-node attribute maps. Keys are unique; a map is built once and then only
//! copied with changes (`with` / `without`), never edited in place.
use std::collections::{BTreeMap, BTreeSet};

use super::string_types::StringTypes;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeKind {
    /// The string restriction; only meaningful on string primitives.
    StringTypes,
    /// Name hints, e.g. the JSON keys a type was observed under.
    Names,
    Description,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    StringTypes(StringTypes),
    Names(BTreeSet<String>),
    Description(Vec<String>),
}

impl AttributeValue {
    pub fn kind(&self) -> AttributeKind {
        match self {
            Self::StringTypes(_) => AttributeKind::StringTypes,
            Self::Names(_) => AttributeKind::Names,
            Self::Description(_) => AttributeKind::Description,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypeAttributes(BTreeMap<AttributeKind, AttributeValue>);

impl TypeAttributes {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, kind: AttributeKind) -> Option<&AttributeValue> {
        self.0.get(&kind)
    }

    pub fn contains(&self, kind: AttributeKind) -> bool {
        self.0.contains_key(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeValue> {
        self.0.values()
    }

    /// Copy with `value` set, replacing any value of the same kind.
    pub fn with(&self, value: AttributeValue) -> Self {
        let mut out = self.0.clone();
        out.insert(value.kind(), value);
        Self(out)
    }

    /// Copy without the attribute of `kind`.
    pub fn without(&self, kind: AttributeKind) -> Self {
        let mut out = self.0.clone();
        out.remove(&kind);
        Self(out)
    }

    pub fn string_types(&self) -> Option<&StringTypes> {
        match self.get(AttributeKind::StringTypes)? {
            AttributeValue::StringTypes(st) => Some(st),
            _ => None,
        }
    }

    pub fn names(&self) -> Option<&BTreeSet<String>> {
        match self.get(AttributeKind::Names)? {
            AttributeValue::Names(names) => Some(names),
            _ => None,
        }
    }

    pub fn description(&self) -> Option<&[String]> {
        match self.get(AttributeKind::Description)? {
            AttributeValue::Description(lines) => Some(lines),
            _ => None,
        }
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        let mut names = self.names().cloned().unwrap_or_default();
        names.insert(name.into());
        self.with(AttributeValue::Names(names))
    }
}

impl FromIterator<AttributeValue> for TypeAttributes {
    fn from_iter<T: IntoIterator<Item = AttributeValue>>(iter: T) -> Self {
        Self(iter.into_iter().map(|v| (v.kind(), v)).collect())
    }
}
