//! Type graph generations.
//!
//! A generation is an arena of slots indexed by stable ids. Slots are either
//! reserved up front (forwarding refs) and bound later, or allocated already
//! bound. Reserve-then-bind is what lets self- and mutually-recursive types be
//! built in one sweep: a child ref can be handed out before its node exists.
//!
//! [`TypeGraphBuilder`] is the only way to allocate. [`TypeGraphBuilder::finish`]
//! checks that every slot is bound and yields a sealed, immutable [`TypeGraph`].
pub mod attributes;
pub mod string_types;

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use indexmap::IndexMap;

use crate::error::GraphError;

pub use attributes::{AttributeKind, AttributeValue, TypeAttributes};
pub use string_types::{
    Restriction, StringDisposition, StringTypeMapping, StringTypes, TransformedStringKind,
};

// ————————————————————————————————————————————————————————————————————————————
// REFS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationId(pub u32);

impl GenerationId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Handle to a slot in one generation. Whether it is "resolved" or
/// "forwarding" is a property of the slot, not of the handle.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeRef {
    generation: GenerationId,
    index: u32,
}

impl TypeRef {
    pub fn generation(self) -> GenerationId {
        self.generation
    }

    pub fn index(self) -> u32 {
        self.index
    }
}

impl fmt::Debug for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.generation, self.index)
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NODES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimitiveKind {
    /// No evidence at all.
    Any,
    /// The absence marker (`null`).
    Null,
    Bool,
    Integer,
    Double,
    String,
    Transformed(TransformedStringKind),
}

impl PrimitiveKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::String => "string",
            Self::Transformed(kind) => kind.name(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Property {
    pub ty: TypeRef,
    pub optional: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    /// Literal string cases; never empty.
    Enum(BTreeSet<String>),
    /// Member refs; never empty, pairwise distinct by construction.
    Union(BTreeSet<TypeRef>),
    Array(TypeRef),
    Class(IndexMap<String, Property>),
}

impl TypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Primitive(kind) => kind.name(),
            Self::Enum(_) => "enum",
            Self::Union(_) => "union",
            Self::Array(_) => "array",
            Self::Class(_) => "class",
        }
    }

    pub fn is_primitive(&self, kind: PrimitiveKind) -> bool {
        matches!(self, Self::Primitive(k) if *k == kind)
    }

    /// Direct child refs, in no particular order.
    pub fn children(&self) -> Vec<TypeRef> {
        match self {
            Self::Primitive(_) | Self::Enum(_) => Vec::new(),
            Self::Union(members) => members.iter().copied().collect(),
            Self::Array(items) => vec![*items],
            Self::Class(props) => props.values().map(|p| p.ty).collect(),
        }
    }

    /// Same shape with every child ref passed through `f`.
    pub fn map_refs<F>(&self, mut f: F) -> Result<Self, GraphError>
    where
        F: FnMut(TypeRef) -> Result<TypeRef, GraphError>,
    {
        Ok(match self {
            Self::Primitive(kind) => Self::Primitive(*kind),
            Self::Enum(cases) => Self::Enum(cases.clone()),
            Self::Union(members) => {
                Self::Union(members.iter().map(|r| f(*r)).collect::<Result<_, _>>()?)
            }
            Self::Array(items) => Self::Array(f(*items)?),
            Self::Class(props) => {
                let mut out = IndexMap::with_capacity(props.len());
                for (name, prop) in props {
                    let ty = f(prop.ty)?;
                    out.insert(name.clone(), Property { ty, optional: prop.optional });
                }
                Self::Class(out)
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    kind: TypeKind,
    attributes: TypeAttributes,
}

impl Node {
    pub fn new(kind: TypeKind, attributes: TypeAttributes) -> Self {
        Self { kind, attributes }
    }

    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    pub fn attributes(&self) -> &TypeAttributes {
        &self.attributes
    }

    /// The node's restriction; a missing attribute means an open string.
    pub fn string_types(&self) -> StringTypes {
        self.attributes.string_types().cloned().unwrap_or_default()
    }
}

// ————————————————————————————————————————————————————————————————————————————
// SEALED GENERATION
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug)]
enum Entry {
    Node(Node),
    /// Forwarding slot that was bound to another ref rather than to content.
    Alias(TypeRef),
}

/// One immutable snapshot of the type graph.
#[derive(Clone, Debug)]
pub struct TypeGraph {
    generation: GenerationId,
    entries: Vec<Entry>,
    top_levels: IndexMap<String, TypeRef>,
}

impl TypeGraph {
    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    /// Number of slots, aliases included.
    pub fn slot_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of real nodes.
    pub fn node_count(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e, Entry::Node(_))).count()
    }

    pub fn top_levels(&self) -> &IndexMap<String, TypeRef> {
        &self.top_levels
    }

    pub fn top_level(&self, name: &str) -> Option<TypeRef> {
        self.top_levels.get(name).copied()
    }

    /// Follow aliases to the ref that owns the node.
    pub fn canonical(&self, r: TypeRef) -> Result<TypeRef, GraphError> {
        let limit = self.entries.len();
        follow_aliases(self.generation, r, limit, |index| match self.entries.get(index) {
            Some(Entry::Node(_)) => Ok(Step::Done),
            Some(Entry::Alias(target)) => Ok(Step::Next(*target)),
            None => Err(GraphError::OutOfBounds { generation: self.generation, index: index as u32 }),
        })
    }

    pub fn resolve(&self, r: TypeRef) -> Result<&Node, GraphError> {
        let r = self.canonical(r)?;
        match &self.entries[r.index as usize] {
            Entry::Node(node) => Ok(node),
            Entry::Alias(_) => Err(GraphError::BrokenReference {
                generation: self.generation,
                index: r.index,
            }),
        }
    }

    /// Every node of the generation. The order carries no meaning; use it for
    /// traversal only, never for anything observable.
    pub fn all_types_unordered(&self) -> impl Iterator<Item = (TypeRef, &Node)> + '_ {
        self.entries.iter().enumerate().filter_map(move |(index, entry)| match entry {
            Entry::Node(node) => Some((
                TypeRef { generation: self.generation, index: index as u32 },
                node,
            )),
            Entry::Alias(_) => None,
        })
    }

    pub(crate) fn ref_at(&self, index: usize) -> TypeRef {
        TypeRef { generation: self.generation, index: index as u32 }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDER
// ————————————————————————————————————————————————————————————————————————————

#[derive(Clone, Debug)]
enum Slot {
    Reserved,
    Bound(Node),
    Alias(TypeRef),
}

/// Identity of a node that may be shared: no attributes, no child refs.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum Identity {
    Primitive(PrimitiveKind),
    Enum(BTreeSet<String>),
}

/// Allocator for one generation under construction. Not shareable across
/// threads while building; `finish` turns it into a sealed [`TypeGraph`].
#[derive(Debug)]
pub struct TypeGraphBuilder {
    generation: GenerationId,
    slots: Vec<Slot>,
    top_levels: IndexMap<String, TypeRef>,
    interned: HashMap<Identity, TypeRef>,
}

impl TypeGraphBuilder {
    pub fn new(generation: GenerationId) -> Self {
        Self {
            generation,
            slots: Vec::new(),
            top_levels: IndexMap::new(),
            interned: HashMap::new(),
        }
    }

    pub fn generation(&self) -> GenerationId {
        self.generation
    }

    /// Reserve a slot whose content is bound later.
    pub fn reserve(&mut self) -> TypeRef {
        self.push(Slot::Reserved)
    }

    pub fn is_bound(&self, r: TypeRef) -> Result<bool, GraphError> {
        let index = self.check(r)?;
        Ok(!matches!(self.slots[index], Slot::Reserved))
    }

    /// Content of a slot under construction; reserved slots are broken refs.
    pub fn resolve(&self, r: TypeRef) -> Result<&Node, GraphError> {
        let mut current = r;
        for _ in 0..=self.slots.len() {
            let index = self.check(current)?;
            match &self.slots[index] {
                Slot::Bound(node) => return Ok(node),
                Slot::Alias(target) => current = *target,
                Slot::Reserved => break,
            }
        }
        Err(GraphError::BrokenReference { generation: self.generation, index: r.index })
    }

    /// Bind a reserved slot to content.
    pub fn bind(&mut self, forwarding: TypeRef, node: Node) -> Result<(), GraphError> {
        let index = self.check_reserved(forwarding)?;
        self.slots[index] = Slot::Bound(node);
        Ok(())
    }

    /// Bind a reserved slot as an alias of another ref in this generation.
    pub fn bind_alias(&mut self, forwarding: TypeRef, target: TypeRef) -> Result<(), GraphError> {
        self.check(target)?;
        let index = self.check_reserved(forwarding)?;
        self.slots[index] = Slot::Alias(target);
        Ok(())
    }

    /// Allocate a node, into `forwarding` if given, otherwise into a new slot.
    /// Attribute-free leaves without a forwarding ref are shared.
    pub fn add_node(
        &mut self,
        kind: TypeKind,
        attributes: TypeAttributes,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        for child in kind.children() {
            self.check(child)?;
        }
        let identity = if attributes.is_empty() {
            match &kind {
                TypeKind::Primitive(p) => Some(Identity::Primitive(*p)),
                TypeKind::Enum(cases) => Some(Identity::Enum(cases.clone())),
                _ => None,
            }
        } else {
            None
        };
        let node = Node::new(kind, attributes);

        if let Some(forwarding) = forwarding {
            self.bind(forwarding, node)?;
            if let Some(identity) = identity {
                self.interned.entry(identity).or_insert(forwarding);
            }
            return Ok(forwarding);
        }
        if let Some(identity) = identity {
            if let Some(&existing) = self.interned.get(&identity) {
                return Ok(existing);
            }
            let r = self.push(Slot::Bound(node));
            self.interned.insert(identity, r);
            return Ok(r);
        }
        Ok(self.push(Slot::Bound(node)))
    }

    pub fn get_primitive_type(
        &mut self,
        kind: PrimitiveKind,
        attributes: TypeAttributes,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        self.add_node(TypeKind::Primitive(kind), attributes, forwarding)
    }

    /// A string primitive; the restriction is attached only when restricted.
    pub fn get_string_type(
        &mut self,
        attributes: TypeAttributes,
        string_types: StringTypes,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        let attributes = match string_types {
            StringTypes::Unrestricted => attributes.without(AttributeKind::StringTypes),
            restricted => attributes.with(AttributeValue::StringTypes(restricted)),
        };
        self.get_primitive_type(PrimitiveKind::String, attributes, forwarding)
    }

    pub fn get_enum_type(
        &mut self,
        attributes: TypeAttributes,
        cases: BTreeSet<String>,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        if cases.is_empty() {
            return Err(GraphError::EmptyEnum { generation: self.generation });
        }
        self.add_node(TypeKind::Enum(cases), attributes, forwarding)
    }

    pub fn get_union_type(
        &mut self,
        attributes: TypeAttributes,
        members: BTreeSet<TypeRef>,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        if members.is_empty() {
            return Err(GraphError::EmptyUnion { generation: self.generation });
        }
        self.add_node(TypeKind::Union(members), attributes, forwarding)
    }

    pub fn get_array_type(
        &mut self,
        attributes: TypeAttributes,
        items: TypeRef,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        self.add_node(TypeKind::Array(items), attributes, forwarding)
    }

    pub fn get_class_type(
        &mut self,
        attributes: TypeAttributes,
        properties: IndexMap<String, Property>,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        self.add_node(TypeKind::Class(properties), attributes, forwarding)
    }

    pub fn add_top_level(&mut self, name: impl Into<String>, r: TypeRef) -> Result<(), GraphError> {
        self.check(r)?;
        self.top_levels.insert(name.into(), r);
        Ok(())
    }

    /// Seal the generation. Fails if any forwarding ref is still unbound or
    /// an alias chain never reaches a node.
    pub fn finish(self) -> Result<TypeGraph, GraphError> {
        let generation = self.generation;
        let mut entries = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.into_iter().enumerate() {
            entries.push(match slot {
                Slot::Bound(node) => Entry::Node(node),
                Slot::Alias(target) => Entry::Alias(target),
                Slot::Reserved => {
                    return Err(GraphError::UnboundForwardingRef { generation, index: index as u32 });
                }
            });
        }
        let graph = TypeGraph { generation, entries, top_levels: self.top_levels };

        for (index, entry) in graph.entries.iter().enumerate() {
            if matches!(entry, Entry::Alias(_)) {
                graph.canonical(graph.ref_at(index))?;
            }
        }
        tracing::trace!(%generation, slots = graph.entries.len(), "sealed generation");
        Ok(graph)
    }

    fn push(&mut self, slot: Slot) -> TypeRef {
        let r = TypeRef { generation: self.generation, index: self.slots.len() as u32 };
        self.slots.push(slot);
        r
    }

    fn check(&self, r: TypeRef) -> Result<usize, GraphError> {
        if r.generation != self.generation {
            return Err(GraphError::ForeignReference {
                expected: self.generation,
                found: r.generation,
                index: r.index,
            });
        }
        let index = r.index as usize;
        if index >= self.slots.len() {
            return Err(GraphError::OutOfBounds { generation: self.generation, index: r.index });
        }
        Ok(index)
    }

    fn check_reserved(&self, r: TypeRef) -> Result<usize, GraphError> {
        let index = self.check(r)?;
        match self.slots[index] {
            Slot::Reserved => Ok(index),
            _ => Err(GraphError::AlreadyBound { generation: self.generation, index: r.index }),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

enum Step {
    Done,
    Next(TypeRef),
}

/// Walk alias links until a node. A chain longer than the arena is a cycle
/// of aliases and can never bind.
fn follow_aliases<F>(
    generation: GenerationId,
    start: TypeRef,
    limit: usize,
    mut step: F,
) -> Result<TypeRef, GraphError>
where
    F: FnMut(usize) -> Result<Step, GraphError>,
{
    let mut current = start;
    let mut hops = 0usize;
    loop {
        if current.generation != generation {
            return Err(GraphError::ForeignReference {
                expected: generation,
                found: current.generation,
                index: current.index,
            });
        }
        match step(current.index as usize)? {
            Step::Done => return Ok(current),
            Step::Next(next) => {
                hops += 1;
                if hops > limit {
                    return Err(GraphError::BrokenReference { generation, index: start.index });
                }
                current = next;
            }
        }
    }
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;

    fn g0() -> TypeGraphBuilder {
        TypeGraphBuilder::new(GenerationId(0))
    }

    #[test]
    fn forwarding_ref_makes_self_reference_constructible() {
        let mut b = g0();
        let node_ref = b.reserve();
        let null = b.get_primitive_type(PrimitiveKind::Null, TypeAttributes::empty(), None).unwrap();
        let next = b
            .get_union_type(TypeAttributes::empty(), BTreeSet::from([node_ref, null]), None)
            .unwrap();
        let props = IndexMap::from([("next".to_string(), Property { ty: next, optional: true })]);
        let got = b
            .get_class_type(TypeAttributes::empty().with_name("Node"), props, Some(node_ref))
            .unwrap();
        assert_eq!(got, node_ref);
        b.add_top_level("Node", node_ref).unwrap();

        let graph = b.finish().unwrap();
        let TypeKind::Class(props) = graph.resolve(node_ref).unwrap().kind() else {
            panic!("expected class");
        };
        let TypeKind::Union(members) = graph.resolve(props["next"].ty).unwrap().kind() else {
            panic!("expected union");
        };
        assert!(members.contains(&node_ref));
    }

    #[test]
    fn unbound_forwarding_ref_fails_to_seal() {
        let mut b = g0();
        let dangling = b.reserve();
        b.get_primitive_type(PrimitiveKind::Bool, TypeAttributes::empty(), None).unwrap();
        assert_eq!(
            b.resolve(dangling).unwrap_err(),
            GraphError::BrokenReference { generation: GenerationId(0), index: dangling.index() }
        );
        let err = b.finish().unwrap_err();
        assert_eq!(
            err,
            GraphError::UnboundForwardingRef { generation: GenerationId(0), index: dangling.index() }
        );
    }

    #[test]
    fn binding_twice_is_rejected() {
        let mut b = g0();
        let r = b.reserve();
        b.get_primitive_type(PrimitiveKind::Bool, TypeAttributes::empty(), Some(r)).unwrap();
        let err = b.get_primitive_type(PrimitiveKind::Bool, TypeAttributes::empty(), Some(r));
        assert!(matches!(err, Err(GraphError::AlreadyBound { .. })));
    }

    #[test]
    fn leaves_without_attributes_are_shared() {
        let mut b = g0();
        let a = b.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::empty(), None).unwrap();
        let c = b.get_primitive_type(PrimitiveKind::Integer, TypeAttributes::empty(), None).unwrap();
        let named = b
            .get_primitive_type(PrimitiveKind::Integer, TypeAttributes::empty().with_name("n"), None)
            .unwrap();
        assert_eq!(a, c);
        assert_ne!(a, named);
    }

    #[test]
    fn aliases_resolve_to_their_target() {
        let mut b = g0();
        let fwd = b.reserve();
        let target = b.get_primitive_type(PrimitiveKind::Double, TypeAttributes::empty(), None).unwrap();
        b.bind_alias(fwd, target).unwrap();
        let graph = b.finish().unwrap();
        assert_eq!(graph.canonical(fwd).unwrap(), target);
        assert!(graph.resolve(fwd).unwrap().kind().is_primitive(PrimitiveKind::Double));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.all_types_unordered().count(), 1);
    }

    #[test]
    fn alias_cycles_never_seal() {
        let mut b = g0();
        let a = b.reserve();
        let c = b.reserve();
        b.bind_alias(a, c).unwrap();
        b.bind_alias(c, a).unwrap();
        assert!(matches!(b.finish(), Err(GraphError::BrokenReference { .. })));
    }

    #[test]
    fn refs_from_another_generation_are_rejected() {
        let mut other = TypeGraphBuilder::new(GenerationId(7));
        let foreign = other.get_primitive_type(PrimitiveKind::Bool, TypeAttributes::empty(), None).unwrap();
        let mut b = g0();
        let err = b.get_array_type(TypeAttributes::empty(), foreign, None).unwrap_err();
        assert!(matches!(err, GraphError::ForeignReference { .. }));
    }

    #[test]
    fn empty_unions_and_enums_are_contract_violations() {
        let mut b = g0();
        assert!(matches!(
            b.get_union_type(TypeAttributes::empty(), BTreeSet::new(), None),
            Err(GraphError::EmptyUnion { .. })
        ));
        assert!(matches!(
            b.get_enum_type(TypeAttributes::empty(), BTreeSet::new(), None),
            Err(GraphError::EmptyEnum { .. })
        ));
    }

    #[test]
    fn restricted_strings_carry_the_attribute_and_open_ones_do_not() {
        let mut b = g0();
        let open = b
            .get_string_type(TypeAttributes::empty(), StringTypes::Unrestricted, None)
            .unwrap();
        let closed = b
            .get_string_type(TypeAttributes::empty(), StringTypes::from_case("a", 2), None)
            .unwrap();
        let graph = b.finish().unwrap();
        assert!(graph.resolve(open).unwrap().attributes().is_empty());
        assert!(graph.resolve(closed).unwrap().string_types().is_restricted());
    }
}
