use crate::graph::GenerationId;

/// Broken invariants inside the graph engine or a pass.
///
/// None of these are recoverable: a pass that hits one is abandoned and no
/// partial generation escapes.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("broken reference {generation}#{index}: slot was never bound")]
    BrokenReference { generation: GenerationId, index: u32 },

    #[error("reference #{index} belongs to {found}, expected {expected}")]
    ForeignReference {
        expected: GenerationId,
        found: GenerationId,
        index: u32,
    },

    #[error("reference {generation}#{index} is out of bounds")]
    OutOfBounds { generation: GenerationId, index: u32 },

    #[error("forwarding reference {generation}#{index} is still unbound at seal time")]
    UnboundForwardingRef { generation: GenerationId, index: u32 },

    #[error("forwarding reference {generation}#{index} was bound twice")]
    AlreadyBound { generation: GenerationId, index: u32 },

    #[error("pass `{pass}` violated its group contract at {generation}#{index}: {reason}")]
    GroupContract {
        pass: String,
        generation: GenerationId,
        index: u32,
        reason: String,
    },

    #[error("pass `{pass}` handed group {group} of {generation} with no nodes")]
    EmptyGroup {
        pass: String,
        generation: GenerationId,
        group: usize,
    },

    #[error("restricted string {generation}#{index} expanded to no alternatives")]
    EmptyStringExpansion { generation: GenerationId, index: u32 },

    #[error("union in {generation} must have at least one member")]
    EmptyUnion { generation: GenerationId },

    #[error("enum in {generation} must have at least one case")]
    EmptyEnum { generation: GenerationId },
}
