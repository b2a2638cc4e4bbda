use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::story::{options_from_json, StoredOption};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "story_nodes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub story_id: i32,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub is_root: bool,
    pub is_ending: bool,
    pub is_winning_ending: bool,
    /// JSON array of [`StoredOption`].
    pub options: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stories::Entity",
        from = "Column::StoryId",
        to = "super::stories::Column::Id",
        on_delete = "Cascade"
    )]
    Stories,
}

impl Related<super::stories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn get_options(&self) -> Result<Vec<StoredOption>, serde_json::Error> {
        options_from_json(&self.options)
    }
}
