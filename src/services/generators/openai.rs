use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::StoryGenerator;
use crate::errors::GenerationError;
use crate::story::{DraftNode, NodeKey, StoryDraft, StoryOption};

const MAX_DEPTH: usize = 12;
const MAX_NODES: usize = 200;

const SYSTEM_PROMPT: &str = r#"You are a creative story writer that creates engaging choose-your-own-adventure stories.
Generate a complete branching story with multiple paths and endings in the JSON format described below.

The story should have:
1. A compelling title
2. A starting situation (root node) with 2-3 options
3. Each option should lead to another node with its own options
4. Some paths should lead to endings (both winning and losing)
5. At least one path should lead to a winning ending

Story structure requirements:
- Each node should have 2-3 options except for ending nodes
- The story should be 3-4 levels deep (including the root node)
- Add variety in the path lengths (some end earlier, some later)
- Make sure there is at least one winning path
- Ending nodes have isEnding set to true and an empty options list
- Only ending nodes may have isWinningEnding set to true

Output ONLY a JSON object with this structure:
{
  "title": "Story title",
  "rootNode": {
    "content": "The starting situation of the story",
    "isEnding": false,
    "isWinningEnding": false,
    "options": [
      {
        "text": "Option text",
        "nextNode": {
          "content": "What happens for this option",
          "isEnding": false,
          "isWinningEnding": false,
          "options": []
        }
      }
    ]
  }
}"#;

/// Story generator backed by an OpenAI-compatible chat completions endpoint.
pub struct OpenAiStoryGenerator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiStoryGenerator {
    pub fn new(api_key: String, base_url: String, model: String) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
        })
    }

    fn build_request(&self, theme: &str) -> serde_json::Value {
        json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": format!("Create the story with this theme: {}", theme)},
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.8,
        })
    }
}

#[async_trait]
impl StoryGenerator for OpenAiStoryGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, theme: &str) -> Result<StoryDraft, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Requesting story for theme '{}' from {}", theme, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(theme))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Provider(format!(
                "{} returned {}: {}",
                url,
                status,
                truncate(&body, 300)
            )));
        }

        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                GenerationError::MalformedResponse("completion has no message content".to_string())
            })?;

        parse_story(&content)
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Nested story shape requested from the model.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmStory {
    pub title: String,
    pub root_node: LlmNode,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmNode {
    pub content: String,
    #[serde(default)]
    pub is_ending: bool,
    #[serde(default)]
    pub is_winning_ending: bool,
    #[serde(default)]
    pub options: Vec<LlmOption>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmOption {
    pub text: String,
    /// Missing for choices that end the story outright.
    #[serde(default)]
    pub next_node: Option<Box<LlmNode>>,
}

impl LlmStory {
    /// Flatten the nested answer into a draft, depth-first, root first.
    pub fn into_draft(self) -> Result<StoryDraft, GenerationError> {
        let mut nodes = Vec::new();
        let root = flatten(self.root_node, 0, &mut nodes)?;
        Ok(StoryDraft {
            title: self.title,
            root,
            nodes,
        })
    }
}

fn flatten(
    node: LlmNode,
    depth: usize,
    nodes: &mut Vec<DraftNode>,
) -> Result<NodeKey, GenerationError> {
    if depth > MAX_DEPTH {
        return Err(GenerationError::MalformedResponse(format!(
            "story is deeper than {} levels",
            MAX_DEPTH
        )));
    }
    if nodes.len() >= MAX_NODES {
        return Err(GenerationError::MalformedResponse(format!(
            "story has more than {} nodes",
            MAX_NODES
        )));
    }

    let key = NodeKey(nodes.len());
    nodes.push(DraftNode {
        content: node.content,
        is_ending: node.is_ending,
        is_winning_ending: node.is_winning_ending,
        options: Vec::with_capacity(node.options.len()),
    });

    for option in node.options {
        let option = match option.next_node {
            Some(next) => {
                let target = flatten(*next, depth + 1, nodes)?;
                StoryOption::continue_to(option.text, target)
            }
            None => StoryOption::terminal(option.text),
        };
        nodes[key.index()].options.push(option);
    }

    Ok(key)
}

/// Parse model output, tolerating a surrounding markdown code fence.
pub fn parse_story(content: &str) -> Result<StoryDraft, GenerationError> {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    let story: LlmStory = serde_json::from_str(body.trim())
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
    story.into_draft()
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}
