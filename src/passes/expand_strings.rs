//! String-type resolution: every restricted string primitive becomes a plain
//! string, an enum, sub-format primitives, or a union of those.
use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::GraphError;
use crate::graph::{
    AttributeKind, PrimitiveKind, StringTypes, TypeAttributes, TypeGraph, TypeKind, TypeRef,
};
use crate::rewrite::GraphRewriteBuilder;
use crate::run::{EnumInference, RunContext};

const PASS_TITLE: &str = "expand strings";

/// Fewest observations before a case set can count as categorical.
const MIN_LENGTH_FOR_ENUM: u64 = 10;

static PLAIN_NUMERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\-|\+)?[0-9]+(\.[0-9]+)?$").expect("numeral pattern is valid"));

/// Enough samples, a vocabulary small relative to them (`distinct < √total`),
/// and at least one case that is not a plain numeral. A lone empty case never
/// qualifies.
pub fn should_be_enum(cases: &BTreeMap<String, u64>) -> bool {
    if cases.is_empty() || only_empty_case(cases) {
        return false;
    }
    let some_case_is_not_number = cases.keys().any(|key| !PLAIN_NUMERAL.is_match(key));
    let total: u64 = cases.values().sum();
    total >= MIN_LENGTH_FOR_ENUM && (cases.len() as f64) < (total as f64).sqrt() && some_case_is_not_number
}

fn is_enum_worthy(mode: EnumInference, cases: &BTreeMap<String, u64>) -> bool {
    match mode {
        EnumInference::None => false,
        EnumInference::All => !cases.is_empty() && !only_empty_case(cases),
        EnumInference::Infer => should_be_enum(cases),
    }
}

fn only_empty_case(cases: &BTreeMap<String, u64>) -> bool {
    cases.len() == 1 && cases.contains_key("")
}

/// Restricted string primitives, one singleton group each.
fn restricted_strings(graph: &TypeGraph) -> Vec<Vec<TypeRef>> {
    graph
        .all_types_unordered()
        .filter(|(_, node)| {
            node.kind().is_primitive(PrimitiveKind::String) && node.string_types().is_restricted()
        })
        .map(|(r, _)| vec![r])
        .collect()
}

pub fn expand_strings(ctx: &RunContext, graph: &TypeGraph) -> Result<TypeGraph, GraphError> {
    let groups = restricted_strings(graph);
    tracing::debug!(
        mode = %ctx.enum_inference,
        restricted = groups.len(),
        "expanding restricted strings"
    );
    graph.rewrite(PASS_TITLE, ctx.debug_print_reconstitution, groups, |group, builder, forwarding| {
        replace_string(ctx, group, builder, forwarding)
    })
}

fn replace_string(
    ctx: &RunContext,
    group: &[TypeRef],
    builder: &mut GraphRewriteBuilder<'_>,
    forwarding: TypeRef,
) -> Result<TypeRef, GraphError> {
    let &[old_ref] = group else {
        let at = group.first().copied().unwrap_or(forwarding);
        return Err(builder.contract_violation(at, format!("expected one node, got {}", group.len())));
    };
    let node = builder.old_graph().resolve(old_ref)?;
    if !matches!(node.kind(), TypeKind::Primitive(PrimitiveKind::String)) {
        let kind = node.kind().name();
        return Err(builder.contract_violation(old_ref, format!("expected a string primitive, got {kind}")));
    }

    let attributes = node.attributes().without(AttributeKind::StringTypes);
    let mapped = node.string_types().apply_string_type_mapping(&ctx.string_type_mapping);

    let StringTypes::Restricted(restriction) = mapped else {
        return builder.get_string_type(attributes, StringTypes::Unrestricted, Some(forwarding));
    };

    let mut types = BTreeSet::new();
    let cases = restriction.cases();
    if !cases.is_empty() {
        if !is_enum_worthy(ctx.enum_inference, cases) {
            // sub-formats are dropped along with the cases
            return builder.get_string_type(attributes, StringTypes::Unrestricted, Some(forwarding));
        }
        let enum_cases = cases.keys().cloned().collect();
        types.insert(builder.get_enum_type(TypeAttributes::empty(), enum_cases, None)?);
    }
    for kind in restriction.transformations() {
        types.insert(builder.get_primitive_type(
            PrimitiveKind::Transformed(*kind),
            TypeAttributes::empty(),
            None,
        )?);
    }
    if types.is_empty() {
        return Err(GraphError::EmptyStringExpansion {
            generation: builder.old_graph().generation(),
            index: old_ref.index(),
        });
    }
    builder.get_union_type(attributes, types, Some(forwarding))
}

// ------------------------------- Tests ------------------------------------ //
