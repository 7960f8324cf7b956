//! Debug views of a sealed generation.
//!
//! `emit_schema` renders a JSON-schema-ish description reachable from the top
//! levels. Classes go into `definitions` and are referenced by `$ref`, which is
//! what makes recursive graphs terminate. Nothing here depends on node
//! enumeration order: enum cases and union members are sorted.
use std::collections::HashMap;
use std::fmt::Write as _;

use serde_json::{Map, Value, json};

use crate::error::GraphError;
use crate::graph::{PrimitiveKind, TypeGraph, TypeKind, TypeRef};

// ————————————————————————————————————————————————————————————————————————————
// JSON SCHEMA VIEW
// ————————————————————————————————————————————————————————————————————————————

pub fn emit_schema(graph: &TypeGraph) -> Result<Value, GraphError> {
    let mut emitter = SchemaEmitter {
        graph,
        class_names: HashMap::new(),
        definitions: Map::new(),
    };
    let mut top_levels = Map::new();
    for (name, r) in graph.top_levels() {
        top_levels.insert(name.clone(), emitter.schema_for(*r)?);
    }
    Ok(json!({
        "topLevels": top_levels,
        "definitions": emitter.definitions,
    }))
}

struct SchemaEmitter<'a> {
    graph: &'a TypeGraph,
    /// Canonical class ref → definition name.
    class_names: HashMap<TypeRef, String>,
    definitions: Map<String, Value>,
}

impl SchemaEmitter<'_> {
    fn schema_for(&mut self, r: TypeRef) -> Result<Value, GraphError> {
        let r = self.graph.canonical(r)?;
        let node = self.graph.resolve(r)?;

        let mut o = match node.kind() {
            TypeKind::Primitive(kind) => primitive_schema(*kind),
            TypeKind::Enum(cases) => json!({
                "type": "string",
                "enum": cases.iter().cloned().map(Value::from).collect::<Vec<_>>(),
            }),
            TypeKind::Union(members) => {
                let mut arms = Vec::with_capacity(members.len());
                for m in members {
                    arms.push(self.schema_for(*m)?);
                }
                arms.sort_by_cached_key(|v| v.to_string());
                json!({ "anyOf": arms })
            }
            TypeKind::Array(items) => json!({
                "type": "array",
                "items": self.schema_for(*items)?,
            }),
            TypeKind::Class(_) => {
                let name = self.define_class(r)?;
                return Ok(json!({ "$ref": format!("#/definitions/{name}") }));
            }
        };

        if let Some(st) = node.attributes().string_types() {
            o["x-restriction"] = Value::from(st.to_string());
        }
        if let Some(lines) = node.attributes().description() {
            o["description"] = Value::from(lines.join("\n"));
        }
        Ok(o)
    }

    /// Name and render a class once; re-entry through a cycle only needs the name.
    fn define_class(&mut self, r: TypeRef) -> Result<String, GraphError> {
        if let Some(name) = self.class_names.get(&r) {
            return Ok(name.clone());
        }
        let node = self.graph.resolve(r)?;
        let TypeKind::Class(props) = node.kind() else {
            return Err(GraphError::BrokenReference { generation: r.generation(), index: r.index() });
        };

        let hint = node
            .attributes()
            .names()
            .and_then(|names| names.iter().next().cloned())
            .unwrap_or_else(|| "Class".to_string());
        let base = pascal_case(&hint);
        let mut name = base.clone();
        let mut n = 1;
        while self.definitions.contains_key(&name) || self.class_names.values().any(|v| *v == name) {
            n += 1;
            name = format!("{base}{n}");
        }
        self.class_names.insert(r, name.clone());

        let mut properties = Map::new();
        let mut required = Vec::new();
        for (key, prop) in props {
            properties.insert(key.clone(), self.schema_for(prop.ty)?);
            if !prop.optional {
                required.push(Value::from(key.clone()));
            }
        }
        let mut o = json!({
            "type": "object",
            "additionalProperties": false,
            "properties": properties,
        });
        if !required.is_empty() {
            o["required"] = Value::Array(required);
        }
        if let Some(lines) = node.attributes().description() {
            o["description"] = Value::from(lines.join("\n"));
        }
        self.definitions.insert(name.clone(), o);
        Ok(name)
    }
}

fn primitive_schema(kind: PrimitiveKind) -> Value {
    use crate::graph::TransformedStringKind as T;
    match kind {
        PrimitiveKind::Any => json!({}),
        PrimitiveKind::Null => json!({ "type": "null" }),
        PrimitiveKind::Bool => json!({ "type": "boolean" }),
        PrimitiveKind::Integer => json!({ "type": "integer" }),
        PrimitiveKind::Double => json!({ "type": "number" }),
        PrimitiveKind::String => json!({ "type": "string" }),
        PrimitiveKind::Transformed(t) => {
            let format = match t {
                T::Date => "date",
                T::Time => "time",
                T::DateTime => "date-time",
                T::Uuid => "uuid",
                T::Uri => "uri",
                T::IntegerString => "integer",
                T::BoolString => "boolean",
            };
            json!({ "type": "string", "format": format })
        }
    }
}

fn pascal_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for word in s.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "Class");
    }
    out
}

// ————————————————————————————————————————————————————————————————————————————
// NODE TABLE
// ————————————————————————————————————————————————————————————————————————————

/// One line per node, sorted by ref: `g1#4 union [g1#2, g1#3] {names: value}`.
pub fn render_node_table(graph: &TypeGraph) -> String {
    let mut rows: Vec<(TypeRef, String)> = graph
        .all_types_unordered()
        .map(|(r, node)| {
            let mut line = format!("{r} {}", node.kind().name());
            match node.kind() {
                TypeKind::Enum(cases) => {
                    let cases: Vec<&str> = cases.iter().map(String::as_str).collect();
                    let _ = write!(line, " {cases:?}");
                }
                TypeKind::Union(members) => {
                    let _ = write!(line, " {:?}", members.iter().collect::<Vec<_>>());
                }
                TypeKind::Array(items) => {
                    let _ = write!(line, " [{items}]");
                }
                TypeKind::Class(props) => {
                    let props: Vec<String> = props
                        .iter()
                        .map(|(k, p)| format!("{k}{}: {}", if p.optional { "?" } else { "" }, p.ty))
                        .collect();
                    let _ = write!(line, " {{{}}}", props.join(", "));
                }
                TypeKind::Primitive(_) => {}
            }
            if let Some(names) = node.attributes().names() {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                let _ = write!(line, " names={}", names.join("|"));
            }
            if let Some(st) = node.attributes().string_types() {
                let _ = write!(line, " {st}");
            }
            (r, line)
        })
        .collect();
    rows.sort_by_key(|(r, _)| *r);

    let mut out = String::new();
    for (name, r) in graph.top_levels() {
        let _ = writeln!(out, "top {name} = {r}");
    }
    for (_, line) in rows {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

// ------------------------------- Tests ------------------------------------ //
