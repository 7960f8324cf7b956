//! One pass: old generation → new generation.
//!
//! Every old node gets a forwarding ref in the new generation before anything
//! is built, so nodes can be visited in any order and cycles need no special
//! handling. Nodes outside every group are copied with their child refs
//! translated; each group is handed once to the pass's replace function,
//! which must bind the group's forwarding ref.
use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::error::GraphError;
use crate::graph::{
    GenerationId, Node, PrimitiveKind, Property, StringTypes, TypeAttributes, TypeGraph,
    TypeGraphBuilder, TypeRef,
};

/// Builder handle given to a pass's replace function.
pub struct GraphRewriteBuilder<'a> {
    title: &'a str,
    old: &'a TypeGraph,
    types: TypeGraphBuilder,
    /// Old slot index → new forwarding ref.
    forwarding: Vec<TypeRef>,
    trace: bool,
}

impl TypeGraph {
    /// Run one rewrite over this generation. `groups` partitions the nodes to
    /// be replaced; all other nodes are reconstituted unchanged.
    pub fn rewrite<F>(
        &self,
        title: &str,
        trace: bool,
        groups: Vec<Vec<TypeRef>>,
        replace: F,
    ) -> Result<TypeGraph, GraphError>
    where
        F: FnMut(&[TypeRef], &mut GraphRewriteBuilder<'_>, TypeRef) -> Result<TypeRef, GraphError>,
    {
        GraphRewriteBuilder::run(self, title, trace, groups, replace)
    }
}

impl<'a> GraphRewriteBuilder<'a> {
    fn run<F>(
        old: &'a TypeGraph,
        title: &'a str,
        trace: bool,
        groups: Vec<Vec<TypeRef>>,
        mut replace: F,
    ) -> Result<TypeGraph, GraphError>
    where
        F: FnMut(&[TypeRef], &mut GraphRewriteBuilder<'_>, TypeRef) -> Result<TypeRef, GraphError>,
    {
        let generation = old.generation().next();
        tracing::debug!(
            pass = title,
            from = %old.generation(),
            to = %generation,
            groups = groups.len(),
            nodes = old.node_count(),
            "rewriting generation"
        );

        let group_of = partition(old, title, &groups)?;

        // 1) forwarding refs for everything, one per group
        let mut types = TypeGraphBuilder::new(generation);
        let group_refs: Vec<TypeRef> = groups.iter().map(|_| types.reserve()).collect();
        let mut reserved: Vec<Option<TypeRef>> = vec![None; old.slot_count()];
        for (old_ref, _) in old.all_types_unordered() {
            let index = old_ref.index() as usize;
            reserved[index] = Some(match group_of[index] {
                Some(g) => group_refs[g],
                None => types.reserve(),
            });
        }
        // aliases share the slot of the node they stand for
        let forwarding = (0..old.slot_count())
            .map(|index| {
                let canonical = old.canonical(old.ref_at(index))?;
                reserved[canonical.index() as usize].ok_or(GraphError::BrokenReference {
                    generation: old.generation(),
                    index: index as u32,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut builder = GraphRewriteBuilder { title, old, types, forwarding, trace };

        // 2) visit in any order; all cross refs go through forwarding refs
        let mut replaced = vec![false; groups.len()];
        for (old_ref, node) in old.all_types_unordered() {
            let index = old_ref.index() as usize;
            match group_of[index] {
                Some(g) if replaced[g] => {}
                Some(g) => {
                    replaced[g] = true;
                    let forwarding = group_refs[g];
                    let result = replace(&groups[g], &mut builder, forwarding)?;
                    builder.settle(forwarding, result, old_ref)?;
                    for member in &groups[g] {
                        builder.trace_binding(*member, result);
                    }
                }
                None => {
                    let forwarding = builder.forwarding[index];
                    let kind = node.kind().map_refs(|r| builder.reconstitute(r))?;
                    builder.types.bind(forwarding, Node::new(kind, node.attributes().clone()))?;
                    builder.trace_binding(old_ref, forwarding);
                }
            }
        }

        for (name, r) in old.top_levels() {
            let new_ref = builder.reconstitute(*r)?;
            builder.types.add_top_level(name.clone(), new_ref)?;
        }

        // 3) zero unbound forwarding refs, then seal
        let graph = builder.types.finish()?;
        tracing::debug!(
            pass = title,
            generation = %graph.generation(),
            nodes = graph.node_count(),
            "rewrite done"
        );
        Ok(graph)
    }

    /// The generation being rewritten. Borrowed for the builder's lifetime,
    /// not for the `&self` borrow, so nodes can be read while building.
    pub fn old_graph(&self) -> &'a TypeGraph {
        self.old
    }

    pub fn generation(&self) -> GenerationId {
        self.types.generation()
    }

    /// The new-generation ref standing for an old ref.
    pub fn reconstitute(&self, old_ref: TypeRef) -> Result<TypeRef, GraphError> {
        if old_ref.generation() != self.old.generation() {
            return Err(GraphError::ForeignReference {
                expected: self.old.generation(),
                found: old_ref.generation(),
                index: old_ref.index(),
            });
        }
        self.forwarding
            .get(old_ref.index() as usize)
            .copied()
            .ok_or(GraphError::OutOfBounds {
                generation: self.old.generation(),
                index: old_ref.index(),
            })
    }

    /// A contract violation located at `old_ref`.
    pub fn contract_violation(&self, old_ref: TypeRef, reason: impl Into<String>) -> GraphError {
        GraphError::GroupContract {
            pass: self.title.to_string(),
            generation: self.old.generation(),
            index: old_ref.index(),
            reason: reason.into(),
        }
    }

    pub fn reserve(&mut self) -> TypeRef {
        self.types.reserve()
    }

    pub fn get_primitive_type(
        &mut self,
        kind: PrimitiveKind,
        attributes: TypeAttributes,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        self.types.get_primitive_type(kind, attributes, forwarding)
    }

    pub fn get_string_type(
        &mut self,
        attributes: TypeAttributes,
        string_types: StringTypes,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        self.types.get_string_type(attributes, string_types, forwarding)
    }

    pub fn get_enum_type(
        &mut self,
        attributes: TypeAttributes,
        cases: BTreeSet<String>,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        self.types.get_enum_type(attributes, cases, forwarding)
    }

    pub fn get_union_type(
        &mut self,
        attributes: TypeAttributes,
        members: BTreeSet<TypeRef>,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        self.types.get_union_type(attributes, members, forwarding)
    }

    pub fn get_array_type(
        &mut self,
        attributes: TypeAttributes,
        items: TypeRef,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        self.types.get_array_type(attributes, items, forwarding)
    }

    pub fn get_class_type(
        &mut self,
        attributes: TypeAttributes,
        properties: IndexMap<String, Property>,
        forwarding: Option<TypeRef>,
    ) -> Result<TypeRef, GraphError> {
        self.types.get_class_type(attributes, properties, forwarding)
    }

    /// Make sure the group's forwarding ref ends up bound: either the replace
    /// function bound it itself, or it returned another ref we alias to.
    fn settle(&mut self, forwarding: TypeRef, result: TypeRef, at: TypeRef) -> Result<(), GraphError> {
        if result == forwarding {
            return if self.types.is_bound(forwarding)? {
                Ok(())
            } else {
                Err(self.contract_violation(at, "replacement returned its forwarding ref unbound"))
            };
        }
        if self.types.is_bound(forwarding)? {
            return Err(self.contract_violation(
                at,
                format!("forwarding ref {forwarding} was bound but {result} was returned"),
            ));
        }
        self.types.bind_alias(forwarding, result)
    }

    fn trace_binding(&self, old_ref: TypeRef, new_ref: TypeRef) {
        if self.trace {
            tracing::info!(target: "json_typegraph::rewrite", pass = self.title, "{old_ref} -> {new_ref}");
        }
    }
}

/// Validate the groups and index them by old slot. Each group must be
/// non-empty and no node may sit in two groups.
fn partition(old: &TypeGraph, title: &str, groups: &[Vec<TypeRef>]) -> Result<Vec<Option<usize>>, GraphError> {
    let mut group_of = vec![None; old.slot_count()];
    for (g, group) in groups.iter().enumerate() {
        if group.is_empty() {
            return Err(GraphError::EmptyGroup {
                pass: title.to_string(),
                generation: old.generation(),
                group: g,
            });
        }
        for member in group {
            old.resolve(*member)?;
            let index = old.canonical(*member)?.index() as usize;
            if let Some(other) = group_of[index] {
                if other != g {
                    return Err(GraphError::GroupContract {
                        pass: title.to_string(),
                        generation: old.generation(),
                        index: index as u32,
                        reason: format!("node is in groups {other} and {g}"),
                    });
                }
            }
            group_of[index] = Some(g);
        }
    }
    Ok(group_of)
}

// ------------------------------- Tests ------------------------------------ //
