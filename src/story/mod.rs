//! Branching story model
//!
//! Generators build a [`StoryDraft`] out of [`DraftNode`]s linked by
//! [`StoryOption`]s. [`StoryDraft::validate`] is the single gate between a
//! generator and storage: it enforces one root, option-free endings, winning
//! endings being endings, no dead ends, full reachability from the root and
//! the absence of cycles.

pub mod draft;
pub mod stored;

pub use draft::{DraftNode, NodeKey, StoryDraft, StoryOption, ValidatedStory};
pub use stored::{options_from_json, options_to_json, StoredOption};
