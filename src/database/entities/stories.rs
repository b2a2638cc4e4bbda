use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    pub session_id: String,
    pub theme: String,
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::story_nodes::Entity")]
    StoryNodes,
}

impl Related<super::story_nodes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StoryNodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
