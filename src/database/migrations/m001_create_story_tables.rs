use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(StoryJobs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoryJobs::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(StoryJobs::JobId)
                            .string()
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(StoryJobs::SessionId).string().not_null())
                    .col(ColumnDef::new(StoryJobs::Theme).string().not_null())
                    .col(
                        ColumnDef::new(StoryJobs::Status)
                            .string()
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(StoryJobs::StoryId).integer())
                    .col(ColumnDef::new(StoryJobs::Error).text())
                    .col(
                        ColumnDef::new(StoryJobs::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(StoryJobs::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(StoryJobs::CompletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Stories::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Stories::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Stories::Title).string().not_null())
                    .col(ColumnDef::new(Stories::SessionId).string().not_null())
                    .col(ColumnDef::new(Stories::Theme).string().not_null())
                    .col(
                        ColumnDef::new(Stories::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(StoryNodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StoryNodes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StoryNodes::StoryId).integer().not_null())
                    .col(ColumnDef::new(StoryNodes::Content).text().not_null())
                    .col(
                        ColumnDef::new(StoryNodes::IsRoot)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(StoryNodes::IsEnding)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(StoryNodes::IsWinningEnding)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(StoryNodes::Options).json().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_story_nodes_story_id")
                            .from(StoryNodes::Table, StoryNodes::StoryId)
                            .to(Stories::Table, Stories::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_story_jobs_session_id")
                    .table(StoryJobs::Table)
                    .col(StoryJobs::SessionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_story_jobs_status")
                    .table(StoryJobs::Table)
                    .col(StoryJobs::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_stories_session_id")
                    .table(Stories::Table)
                    .col(Stories::SessionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_story_nodes_story_id")
                    .table(StoryNodes::Table)
                    .col(StoryNodes::StoryId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(StoryNodes::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Stories::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(StoryJobs::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(Iden)]
enum StoryJobs {
    Table,
    Id,
    JobId,
    SessionId,
    Theme,
    Status,
    StoryId,
    Error,
    CreatedAt,
    StartedAt,
    CompletedAt,
}

#[derive(Iden)]
enum Stories {
    Table,
    Id,
    Title,
    SessionId,
    Theme,
    CreatedAt,
}

#[derive(Iden)]
enum StoryNodes {
    Table,
    Id,
    StoryId,
    Content,
    IsRoot,
    IsEnding,
    IsWinningEnding,
    Options,
}
