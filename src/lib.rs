//! Arena-backed type graphs for JSON-sample type inference.
//!
//! Samples are folded into evidence (`inference`), lowered into a first sealed
//! generation (`lower`), and then transformed by passes (`passes`) that each
//! produce a new generation through a `GraphRewriteBuilder` (`rewrite`).
pub mod cli;
pub mod emit;
pub mod error;
pub mod graph;
pub mod inference;
pub mod lower;
pub mod passes;
pub mod rewrite;
pub mod run;

pub use error::GraphError;
pub use graph::{
    GenerationId, Node, PrimitiveKind, Property, StringTypes, TypeAttributes, TypeGraph,
    TypeGraphBuilder, TypeKind, TypeRef,
};
pub use passes::expand_strings;
pub use rewrite::GraphRewriteBuilder;
pub use run::{EnumInference, RunContext};
