use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::errors::{StoryError, StoryResult};

/// Position of a node inside a [`StoryDraft`].
///
/// Keys are only meaningful for the draft that issued them; database ids are
/// assigned when the story is stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(pub usize);

impl NodeKey {
    pub fn index(self) -> usize {
        self.0
    }
}

/// One player choice.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoryOption {
    /// Leads to another node of the same story.
    Continue { text: String, target: NodeKey },
    /// Ends the story without a dedicated ending node.
    Terminal { text: String },
}

impl StoryOption {
    pub fn continue_to(text: impl Into<String>, target: NodeKey) -> Self {
        StoryOption::Continue {
            text: text.into(),
            target,
        }
    }

    pub fn terminal(text: impl Into<String>) -> Self {
        StoryOption::Terminal { text: text.into() }
    }

    pub fn text(&self) -> &str {
        match self {
            StoryOption::Continue { text, .. } | StoryOption::Terminal { text } => text,
        }
    }

    pub fn target(&self) -> Option<NodeKey> {
        match self {
            StoryOption::Continue { target, .. } => Some(*target),
            StoryOption::Terminal { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftNode {
    pub content: String,
    pub is_ending: bool,
    pub is_winning_ending: bool,
    pub options: Vec<StoryOption>,
}

impl DraftNode {
    pub fn passage(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_ending: false,
            is_winning_ending: false,
            options: Vec::new(),
        }
    }

    pub fn ending(content: impl Into<String>, winning: bool) -> Self {
        Self {
            content: content.into(),
            is_ending: true,
            is_winning_ending: winning,
            options: Vec::new(),
        }
    }
}

/// A story as produced by a generator, before any structural checks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDraft {
    pub title: String,
    pub root: NodeKey,
    pub nodes: Vec<DraftNode>,
}

impl StoryDraft {
    /// Start a draft whose root node is `root`.
    pub fn new(title: impl Into<String>, root: DraftNode) -> Self {
        Self {
            title: title.into(),
            root: NodeKey(0),
            nodes: vec![root],
        }
    }

    pub fn add_node(&mut self, node: DraftNode) -> NodeKey {
        self.nodes.push(node);
        NodeKey(self.nodes.len() - 1)
    }

    /// Append an option to `from`. Targets are checked by [`StoryDraft::validate`].
    pub fn add_option(&mut self, from: NodeKey, option: StoryOption) {
        if let Some(node) = self.nodes.get_mut(from.index()) {
            node.options.push(option);
        }
    }

    /// Check every structural rule and hand back a story that can be stored.
    pub fn validate(self) -> StoryResult<ValidatedStory> {
        if self.nodes.is_empty() {
            return Err(StoryError::Empty);
        }
        if self.title.trim().is_empty() {
            return Err(StoryError::BlankTitle);
        }
        if self.root.index() >= self.nodes.len() {
            return Err(StoryError::MissingRoot(self.root.index()));
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if node.content.trim().is_empty() {
                return Err(StoryError::BlankContent(index));
            }
            if node.is_winning_ending && !node.is_ending {
                return Err(StoryError::WinningWithoutEnding(index));
            }
            if node.is_ending && !node.options.is_empty() {
                return Err(StoryError::EndingWithOptions(index));
            }
            if !node.is_ending && node.options.is_empty() {
                return Err(StoryError::DeadEnd(index));
            }
            for (option_index, option) in node.options.iter().enumerate() {
                if option.text().trim().is_empty() {
                    return Err(StoryError::BlankOptionText {
                        node: index,
                        option: option_index,
                    });
                }
                if let Some(target) = option.target() {
                    if target.index() >= self.nodes.len() {
                        return Err(StoryError::DanglingOption {
                            node: index,
                            option: option_index,
                            target: target.index(),
                        });
                    }
                }
            }
        }

        self.check_acyclic()?;
        self.check_reachable()?;

        Ok(ValidatedStory { draft: self })
    }

    fn successors(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.nodes[index]
            .options
            .iter()
            .filter_map(|option| option.target().map(NodeKey::index))
    }

    fn check_reachable(&self) -> StoryResult<()> {
        let mut seen = vec![false; self.nodes.len()];
        let mut queue = VecDeque::from([self.root.index()]);
        seen[self.root.index()] = true;

        while let Some(index) = queue.pop_front() {
            for next in self.successors(index) {
                if !seen[next] {
                    seen[next] = true;
                    queue.push_back(next);
                }
            }
        }

        let unreachable: Vec<usize> = seen
            .iter()
            .enumerate()
            .filter(|(_, reached)| !**reached)
            .map(|(index, _)| index)
            .collect();

        if unreachable.is_empty() {
            Ok(())
        } else {
            Err(StoryError::Unreachable(unreachable))
        }
    }

    // Iterative three-colour DFS over every node, so cycles among unreachable
    // nodes are reported as cycles rather than only as unreachable.
    fn check_acyclic(&self) -> StoryResult<()> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        let mut marks = vec![Mark::New; self.nodes.len()];

        for start in 0..self.nodes.len() {
            if marks[start] != Mark::New {
                continue;
            }
            let mut stack: Vec<(usize, Vec<usize>)> =
                vec![(start, self.successors(start).collect())];
            marks[start] = Mark::Active;

            while let Some((index, pending)) = stack.last_mut() {
                match pending.pop() {
                    Some(next) => match marks[next] {
                        Mark::Active => return Err(StoryError::Cycle(next)),
                        Mark::New => {
                            marks[next] = Mark::Active;
                            let children = self.successors(next).collect();
                            stack.push((next, children));
                        }
                        Mark::Done => {}
                    },
                    None => {
                        marks[*index] = Mark::Done;
                        stack.pop();
                    }
                }
            }
        }

        Ok(())
    }
}

/// A draft that passed [`StoryDraft::validate`]; the only form the story
/// service accepts for storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedStory {
    draft: StoryDraft,
}

impl ValidatedStory {
    pub fn title(&self) -> &str {
        &self.draft.title
    }

    pub fn root(&self) -> NodeKey {
        self.draft.root
    }

    pub fn nodes(&self) -> &[DraftNode] {
        &self.draft.nodes
    }
}
