use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::database::entities::{stories, story_nodes};
use crate::errors::{CoreError, CoreResult};
use crate::services::job_service;
use crate::story::{options_to_json, StoryOption, StoredOption, ValidatedStory};

/// A node as served to clients walking the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoryNodeView {
    pub id: i32,
    pub content: String,
    pub is_ending: bool,
    pub is_winning_ending: bool,
    pub options: Vec<StoredOption>,
}

/// A whole story: metadata, the root and every node keyed by id, so a client
/// can follow option destinations without further requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CompleteStory {
    pub id: i32,
    pub title: String,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub root_node: StoryNodeView,
    pub all_nodes: BTreeMap<i32, StoryNodeView>,
}

/// Outcome of writing a generated story for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored { story_id: i32 },
    /// The job left `processing` before the story could be attached; nothing was written.
    JobNotProcessing,
}

#[derive(Clone)]
pub struct StoryService {
    db: DatabaseConnection,
}

impl StoryService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Store `story` and complete `job_id` in one transaction.
    ///
    /// If the job is no longer `processing` the transaction is rolled back,
    /// so no story exists without a completed job pointing at it.
    pub async fn store_for_job(
        &self,
        job_id: &str,
        session_id: &str,
        theme: &str,
        story: &ValidatedStory,
    ) -> CoreResult<StoreOutcome> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| CoreError::internal("Failed to begin transaction").with_source(e))?;

        let story_row = stories::ActiveModel {
            title: Set(story.title().trim().to_string()),
            session_id: Set(session_id.to_string()),
            theme: Set(theme.to_string()),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(|e| CoreError::internal("Failed to insert story").with_source(e))?;

        // Insert nodes first to learn their ids, then write the resolved options.
        let mut node_ids = Vec::with_capacity(story.nodes().len());
        for (index, node) in story.nodes().iter().enumerate() {
            let row = story_nodes::ActiveModel {
                story_id: Set(story_row.id),
                content: Set(node.content.clone()),
                is_root: Set(index == story.root().index()),
                is_ending: Set(node.is_ending),
                is_winning_ending: Set(node.is_winning_ending),
                options: Set(serde_json::Value::Array(Vec::new())),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(|e| CoreError::internal("Failed to insert story node").with_source(e))?;
            node_ids.push(row.id);
        }

        for (index, node) in story.nodes().iter().enumerate() {
            if node.options.is_empty() {
                continue;
            }
            let options: Vec<StoredOption> = node
                .options
                .iter()
                .map(|option| match option {
                    StoryOption::Continue { text, target } => StoredOption::Continue {
                        text: text.clone(),
                        node_id: node_ids[target.index()],
                    },
                    StoryOption::Terminal { text } => StoredOption::Terminal { text: text.clone() },
                })
                .collect();

            story_nodes::ActiveModel {
                id: Set(node_ids[index]),
                options: Set(options_to_json(&options)),
                ..Default::default()
            }
            .update(&txn)
            .await
            .map_err(|e| CoreError::internal("Failed to write story options").with_source(e))?;
        }

        if !job_service::mark_completed(&txn, job_id, story_row.id).await? {
            txn.rollback()
                .await
                .map_err(|e| CoreError::internal("Failed to roll back story").with_source(e))?;
            warn!("Discarded story for job {}: job is no longer processing", job_id);
            return Ok(StoreOutcome::JobNotProcessing);
        }

        txn.commit()
            .await
            .map_err(|e| CoreError::internal("Failed to commit story").with_source(e))?;

        info!(
            "Stored story {} ({} nodes) for job {}",
            story_row.id,
            node_ids.len(),
            job_id
        );
        Ok(StoreOutcome::Stored {
            story_id: story_row.id,
        })
    }

    /// Rebuild the full tree of a stored story
    pub async fn assemble(&self, story_id: i32) -> CoreResult<CompleteStory> {
        let story = stories::Entity::find_by_id(story_id)
            .one(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load story").with_source(e))?
            .ok_or_else(|| CoreError::not_found("Story", story_id.to_string()))?;

        let nodes = story_nodes::Entity::find()
            .filter(story_nodes::Column::StoryId.eq(story_id))
            .order_by_asc(story_nodes::Column::Id)
            .all(&self.db)
            .await
            .map_err(|e| CoreError::internal("Failed to load story nodes").with_source(e))?;

        let mut root_id = None;
        let mut all_nodes = BTreeMap::new();
        for node in nodes {
            let options = node.get_options().map_err(|e| {
                CoreError::inconsistency(format!(
                    "Story {} node {} has unreadable options",
                    story_id, node.id
                ))
                .with_source(e)
            })?;

            if node.is_root {
                if let Some(existing) = root_id {
                    return Err(CoreError::inconsistency(format!(
                        "Story {} has more than one root node ({} and {})",
                        story_id, existing, node.id
                    )));
                }
                root_id = Some(node.id);
            }

            all_nodes.insert(
                node.id,
                StoryNodeView {
                    id: node.id,
                    content: node.content,
                    is_ending: node.is_ending,
                    is_winning_ending: node.is_winning_ending,
                    options,
                },
            );
        }

        let root_node = root_id
            .and_then(|id| all_nodes.get(&id).cloned())
            .ok_or_else(|| {
                CoreError::inconsistency(format!("Story {} has no root node", story_id))
            })?;

        Ok(CompleteStory {
            id: story.id,
            title: story.title,
            session_id: story.session_id,
            created_at: story.created_at,
            root_node,
            all_nodes,
        })
    }
}
