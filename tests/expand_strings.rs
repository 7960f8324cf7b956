use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use indoc::indoc;
use serde_json::{Value, json};

use json_typegraph::emit::{emit_schema, render_node_table};
use json_typegraph::graph::{
    AttributeKind, AttributeValue, GenerationId, PrimitiveKind, Property, StringTypeMapping,
    StringTypes, TransformedStringKind, TypeAttributes, TypeGraph, TypeGraphBuilder, TypeKind,
    TypeRef,
};
use json_typegraph::inference::{InferenceOptions, infer_from_values};
use json_typegraph::lower::lower_to_graph;
use json_typegraph::{EnumInference, RunContext, expand_strings};

const MODES: [EnumInference; 3] = [EnumInference::None, EnumInference::All, EnumInference::Infer];

fn cases(pairs: &[(&str, u64)]) -> StringTypes {
    let cases: BTreeMap<String, u64> = pairs.iter().map(|(k, n)| (k.to_string(), *n)).collect();
    StringTypes::restricted(cases, BTreeSet::new()).unwrap()
}

/// One top-level `S` that is a string with the given restriction.
fn single_string(attributes: TypeAttributes, string_types: StringTypes) -> TypeGraph {
    let mut b = TypeGraphBuilder::new(GenerationId(0));
    let s = b.get_string_type(attributes, string_types, None).unwrap();
    b.add_top_level("S", s).unwrap();
    b.finish().unwrap()
}

fn run(mode: EnumInference, graph: &TypeGraph) -> TypeGraph {
    let ctx = RunContext::new(StringTypeMapping::default(), mode);
    expand_strings(&ctx, graph).unwrap()
}

fn top(graph: &TypeGraph) -> TypeRef {
    graph.canonical(graph.top_level("S").unwrap()).unwrap()
}

/// Member kinds of the union at `r`.
fn union_members(graph: &TypeGraph, r: TypeRef) -> Vec<TypeKind> {
    let TypeKind::Union(members) = graph.resolve(r).unwrap().kind() else {
        panic!("expected a union at {r}");
    };
    members.iter().map(|m| graph.resolve(*m).unwrap().kind().clone()).collect()
}

fn assert_plain_string(graph: &TypeGraph, r: TypeRef) {
    let node = graph.resolve(r).unwrap();
    assert!(node.kind().is_primitive(PrimitiveKind::String), "got {}", node.kind().name());
    assert!(!node.attributes().contains(AttributeKind::StringTypes));
}

fn no_restrictions_left(graph: &TypeGraph) -> bool {
    graph
        .all_types_unordered()
        .all(|(_, node)| !node.attributes().contains(AttributeKind::StringTypes))
}

#[test]
fn mode_none_never_builds_enums() {
    let graph = single_string(
        TypeAttributes::empty(),
        cases(&[("red", 5), ("green", 5), ("blue", 5), ("x", 5)]),
    );
    let out = run(EnumInference::None, &graph);
    assert_plain_string(&out, top(&out));
}

#[test]
fn mode_all_builds_enums_from_a_single_sighting() {
    let graph = single_string(TypeAttributes::empty(), cases(&[("only", 1)]));
    let out = run(EnumInference::All, &graph);
    assert_eq!(
        union_members(&out, top(&out)),
        vec![TypeKind::Enum(BTreeSet::from(["only".to_string()]))]
    );
}

#[test]
fn heuristic_boundary_yields_an_enum() {
    let graph = single_string(TypeAttributes::empty(), cases(&[("a", 5), ("b", 4), ("c", 1)]));
    let out = run(EnumInference::Infer, &graph);
    let expected: BTreeSet<String> = ["a", "b", "c"].map(String::from).into();
    assert_eq!(union_members(&out, top(&out)), vec![TypeKind::Enum(expected)]);
}

#[test]
fn numeric_vocabularies_stay_strings() {
    let graph = single_string(TypeAttributes::empty(), cases(&[("1", 5), ("2", 5)]));
    let out = run(EnumInference::Infer, &graph);
    assert_plain_string(&out, top(&out));
}

#[test]
fn lone_empty_case_is_a_string_in_every_mode() {
    let graph = single_string(TypeAttributes::empty(), cases(&[("", 42)]));
    for mode in MODES {
        let out = run(mode, &graph);
        assert_plain_string(&out, top(&out));
    }
}

#[test]
fn transformations_without_cases_become_a_union_in_every_mode() {
    let restriction = StringTypes::restricted(
        BTreeMap::new(),
        BTreeSet::from([TransformedStringKind::Date, TransformedStringKind::Uuid]),
    )
    .unwrap();
    let graph = single_string(TypeAttributes::empty(), restriction);
    for mode in MODES {
        let out = run(mode, &graph);
        assert_eq!(
            union_members(&out, top(&out)),
            vec![
                TypeKind::Primitive(PrimitiveKind::Transformed(TransformedStringKind::Date)),
                TypeKind::Primitive(PrimitiveKind::Transformed(TransformedStringKind::Uuid)),
            ],
            "mode {mode}"
        );
    }
}

#[test]
fn rejected_cases_take_their_transformations_with_them() {
    let restriction = StringTypes::restricted(
        BTreeMap::from([("a".to_string(), 1)]),
        BTreeSet::from([TransformedStringKind::Date]),
    )
    .unwrap();
    let graph = single_string(TypeAttributes::empty(), restriction);
    let out = run(EnumInference::Infer, &graph);
    assert_plain_string(&out, top(&out));

    let out = run(EnumInference::All, &graph);
    assert_eq!(union_members(&out, top(&out)).len(), 2);
}

#[test]
fn folded_sub_formats_collapse_to_plain_strings() {
    let graph = single_string(
        TypeAttributes::empty(),
        StringTypes::from_transformation(TransformedStringKind::DateTime),
    );
    let mapping = StringTypeMapping::default().fold(TransformedStringKind::DateTime);
    let ctx = RunContext::new(mapping, EnumInference::Infer);
    let out = expand_strings(&ctx, &graph).unwrap();
    assert_plain_string(&out, top(&out));
}

#[test]
fn other_attributes_survive_on_the_replacement() {
    let attributes = TypeAttributes::empty()
        .with_name("colour")
        .with(AttributeValue::Description(vec!["paint colour".to_string()]));
    let graph = single_string(attributes, cases(&[("red", 8), ("blue", 4)]));

    for mode in MODES {
        let out = run(mode, &graph);
        let node = out.resolve(top(&out)).unwrap();
        assert!(node.attributes().names().unwrap().contains("colour"));
        assert_eq!(node.attributes().description(), Some(&["paint colour".to_string()][..]));
        assert!(node.attributes().string_types().is_none());
    }
}

#[test]
fn every_restriction_is_resolved_in_one_pass() {
    let mut b = TypeGraphBuilder::new(GenerationId(0));
    let a = b.get_string_type(TypeAttributes::empty(), cases(&[("x", 20)]), None).unwrap();
    let c = b
        .get_string_type(
            TypeAttributes::empty().with_name("when"),
            StringTypes::from_transformation(TransformedStringKind::Date),
            None,
        )
        .unwrap();
    let list = b.get_array_type(TypeAttributes::empty(), a, None).unwrap();
    let props = IndexMap::from([
        ("tags".to_string(), Property { ty: list, optional: false }),
        ("when".to_string(), Property { ty: c, optional: true }),
    ]);
    let root = b.get_class_type(TypeAttributes::empty().with_name("root"), props, None).unwrap();
    b.add_top_level("Root", root).unwrap();
    let graph = b.finish().unwrap();

    for mode in MODES {
        let out = run(mode, &graph);
        assert_eq!(out.generation(), GenerationId(1));
        assert!(no_restrictions_left(&out), "mode {mode}");
    }
    // the input generation is untouched
    assert!(graph.resolve(a).unwrap().string_types().is_restricted());
}

#[test]
fn resolution_is_idempotent() {
    let graph = single_string(
        TypeAttributes::empty().with_name("status"),
        cases(&[("open", 9), ("closed", 3)]),
    );
    for mode in MODES {
        let once = run(mode, &graph);
        let twice = run(mode, &once);
        assert!(no_restrictions_left(&twice));
        assert_eq!(emit_schema(&once).unwrap(), emit_schema(&twice).unwrap(), "mode {mode}");
    }
}

#[test]
fn cycles_survive_resolution() {
    let mut b = TypeGraphBuilder::new(GenerationId(0));
    let item = b.reserve();
    let null = b.get_primitive_type(PrimitiveKind::Null, TypeAttributes::empty(), None).unwrap();
    let next = b
        .get_union_type(TypeAttributes::empty(), BTreeSet::from([item, null]), None)
        .unwrap();
    let kind = b
        .get_string_type(TypeAttributes::empty(), cases(&[("leaf", 30), ("branch", 10)]), None)
        .unwrap();
    let props = IndexMap::from([
        ("kind".to_string(), Property { ty: kind, optional: false }),
        ("next".to_string(), Property { ty: next, optional: false }),
    ]);
    b.get_class_type(TypeAttributes::empty().with_name("item"), props, Some(item)).unwrap();
    b.add_top_level("S", item).unwrap();
    let graph = b.finish().unwrap();

    let out = run(EnumInference::Infer, &graph);
    let root = top(&out);
    let TypeKind::Class(props) = out.resolve(root).unwrap().kind() else { panic!("expected class") };
    let TypeKind::Union(next) = out.resolve(props["next"].ty).unwrap().kind() else {
        panic!("expected union")
    };
    let back: Vec<TypeRef> = next.iter().map(|m| out.canonical(*m).unwrap()).collect();
    assert!(back.contains(&root));
    assert!(matches!(
        union_members(&out, out.canonical(props["kind"].ty).unwrap()).as_slice(),
        [TypeKind::Enum(_)]
    ));
}

#[test]
fn samples_flow_through_to_the_schema() {
    let ndjson = indoc! {r#"
        {"id": 1, "status": "open", "opened": "2024-03-01"}
        {"id": 2, "status": "open", "opened": "2024-03-02"}
        {"id": 3, "status": "closed", "opened": "2024-03-02"}
        {"id": 4, "status": "open", "opened": "2024-03-04"}
        {"id": 5, "status": "closed", "opened": "2024-03-05", "note": "late"}
        {"id": 6, "status": "open", "opened": "2024-03-05"}
        {"id": 7, "status": "open", "opened": "2024-03-07"}
        {"id": 8, "status": "closed", "opened": "2024-03-08"}
        {"id": 9, "status": "open", "opened": "2024-03-08"}
        {"id": 10, "status": "open", "opened": "2024-03-09"}
    "#};
    let values: Vec<Value> = ndjson
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let evidence = infer_from_values(&values, InferenceOptions::default());
    let graph = lower_to_graph([("Ticket", &evidence)]).unwrap();
    let out = run(EnumInference::Infer, &graph);

    let schema = emit_schema(&out).unwrap();
    assert_eq!(schema["topLevels"]["Ticket"], json!({ "$ref": "#/definitions/Ticket" }));
    let ticket = &schema["definitions"]["Ticket"];
    assert_eq!(
        ticket["properties"]["status"],
        json!({ "anyOf": [{ "type": "string", "enum": ["closed", "open"] }] })
    );
    assert_eq!(
        ticket["properties"]["opened"],
        json!({ "anyOf": [{ "type": "string", "format": "date" }] })
    );
    assert_eq!(ticket["properties"]["note"], json!({ "type": "string" }));
    assert_eq!(ticket["required"], json!(["id", "status", "opened"]));
}

/// Collects formatted log output for inspection.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

#[test]
fn tracing_rewrites_leaves_the_graph_alone() {
    let restriction = StringTypes::restricted(
        BTreeMap::from([("a".to_string(), 15), ("b".to_string(), 5)]),
        BTreeSet::from([TransformedStringKind::Date]),
    )
    .unwrap();
    let graph = single_string(TypeAttributes::empty().with_name("code"), restriction);

    let quiet = RunContext::new(StringTypeMapping::default(), EnumInference::Infer);
    let traced = quiet.clone().with_tracing(true);
    assert!(traced.debug_print_reconstitution);

    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();

    let plain = expand_strings(&quiet, &graph).unwrap();
    let logged_run = tracing::subscriber::with_default(subscriber, || expand_strings(&traced, &graph));
    let logged_run = logged_run.unwrap();

    assert_eq!(render_node_table(&plain), render_node_table(&logged_run));
    assert_eq!(emit_schema(&plain).unwrap(), emit_schema(&logged_run).unwrap());

    let output = logs.contents();
    assert!(output.contains("json_typegraph::rewrite"), "{output}");
    assert!(output.contains("g0#0 -> g1#0"), "{output}");
}

#[test]
fn tracing_stays_quiet_unless_asked() {
    let graph = single_string(TypeAttributes::empty(), cases(&[("x", 12)]));
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();

    let ctx = RunContext::new(StringTypeMapping::default(), EnumInference::Infer);
    tracing::subscriber::with_default(subscriber, || expand_strings(&ctx, &graph)).unwrap();
    assert!(!logs.contents().contains(" -> "), "{}", logs.contents());
}
