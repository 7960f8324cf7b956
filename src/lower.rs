//! Evidence → generation 0.
//!
//! One node per observed arm; several arms become a union. Name hints (the
//! top-level name, or the JSON key a value was found under) go on the top node
//! of each lowered value. String arms keep their restriction for the string
//! pass to resolve.
use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::error::GraphError;
use crate::graph::{
    GenerationId, PrimitiveKind, Property, TypeAttributes, TypeGraph, TypeGraphBuilder, TypeRef,
};
use crate::inference::Evidence;

/// Build the first generation from named top-level evidence.
pub fn lower_to_graph<'a, I>(top_levels: I) -> Result<TypeGraph, GraphError>
where
    I: IntoIterator<Item = (&'a str, &'a Evidence)>,
{
    let mut b = TypeGraphBuilder::new(GenerationId(0));
    for (name, evidence) in top_levels {
        let r = lower(&mut b, evidence, Some(name))?;
        b.add_top_level(name, r)?;
    }
    b.finish()
}

fn lower(b: &mut TypeGraphBuilder, u: &Evidence, name: Option<&str>) -> Result<TypeRef, GraphError> {
    let named = match name {
        Some(name) => TypeAttributes::empty().with_name(name),
        None => TypeAttributes::empty(),
    };

    if u.is_bottom() {
        return b.get_primitive_type(PrimitiveKind::Any, named, None);
    }

    let arms = count_arms(u);
    // a single arm carries the name itself; otherwise the union does
    let arm_attrs = if arms == 1 { named.clone() } else { TypeAttributes::empty() };
    let mut members = BTreeSet::new();

    if u.nullable {
        members.insert(b.get_primitive_type(PrimitiveKind::Null, arm_attrs.clone(), None)?);
    }
    if u.has_bool {
        members.insert(b.get_primitive_type(PrimitiveKind::Bool, arm_attrs.clone(), None)?);
    }
    if let Some(num) = &u.num {
        let kind = if num.is_integer() { PrimitiveKind::Integer } else { PrimitiveKind::Double };
        members.insert(b.get_primitive_type(kind, arm_attrs.clone(), None)?);
    }
    if let Some(str_c) = &u.str_ {
        members.insert(b.get_string_type(arm_attrs.clone(), str_c.types.clone(), None)?);
    }
    if let Some(arr) = &u.arr {
        let items = lower(b, &arr.item, None)?;
        members.insert(b.get_array_type(arm_attrs.clone(), items, None)?);
    }
    if let Some(obj) = &u.obj {
        let mut properties = IndexMap::with_capacity(obj.fields.len());
        for (key, field) in &obj.fields {
            let ty = lower(b, &field.ty, Some(key))?;
            properties.insert(key.clone(), Property { ty, optional: !obj.is_required(field) });
        }
        members.insert(b.get_class_type(arm_attrs.clone(), properties, None)?);
    }

    if arms == 1 {
        return members
            .into_iter()
            .next()
            .ok_or(GraphError::EmptyUnion { generation: b.generation() });
    }
    b.get_union_type(named, members, None)
}

fn count_arms(u: &Evidence) -> usize {
    [
        u.nullable,
        u.has_bool,
        u.num.is_some(),
        u.str_.is_some(),
        u.arr.is_some(),
        u.obj.is_some(),
    ]
    .into_iter()
    .filter(|present| *present)
    .count()
}

// ------------------------------- Tests ------------------------------------ //
