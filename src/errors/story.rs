//! Story tree validation errors
//!
//! Raised when a generated draft breaks one of the structural rules a stored
//! story must satisfy. Node references use the draft's positional keys.

use thiserror::Error;

/// Structural problems found while validating a story draft
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoryError {
    #[error("Story has no nodes")]
    Empty,

    #[error("Story title is blank")]
    BlankTitle,

    #[error("Root node {0} does not exist")]
    MissingRoot(usize),

    #[error("Node {0} has blank content")]
    BlankContent(usize),

    #[error("Option {option} of node {node} has blank text")]
    BlankOptionText { node: usize, option: usize },

    #[error("Option {option} of node {node} points at unknown node {target}")]
    DanglingOption {
        node: usize,
        option: usize,
        target: usize,
    },

    #[error("Ending node {0} must not offer options")]
    EndingWithOptions(usize),

    #[error("Node {0} is a winning ending but not an ending")]
    WinningWithoutEnding(usize),

    #[error("Node {0} is not an ending but offers no options")]
    DeadEnd(usize),

    #[error("Nodes {0:?} are not reachable from the root")]
    Unreachable(Vec<usize>),

    #[error("Cycle detected through node {0}")]
    Cycle(usize),
}
