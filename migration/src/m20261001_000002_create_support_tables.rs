//! # Support Tables (legacy owner columns)
//!
//! Tickets, comments, attachments, knowledge articles and assets as first
//! shipped: each owner is a single untyped uuid column with no foreign key,
//! because it may hold an id from any of the identity tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tickets::Table)
                    .if_not_exists()
                    .col(&mut id(Tickets::Id))
                    .col(ColumnDef::new(Tickets::Subject).string_len(255).not_null())
                    .col(ColumnDef::new(Tickets::RequesterId).uuid())
                    .col(ColumnDef::new(Tickets::AssigneeId).uuid())
                    .col(&mut created_at(Tickets::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Comments::Table)
                    .if_not_exists()
                    .col(&mut id(Comments::Id))
                    .col(ColumnDef::new(Comments::TicketId).uuid().not_null())
                    .col(ColumnDef::new(Comments::UserId).uuid())
                    .col(ColumnDef::new(Comments::Body).text().not_null())
                    .col(&mut created_at(Comments::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_comments_ticket_id")
                            .from(Comments::Table, Comments::TicketId)
                            .to(Tickets::Table, Tickets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Attachments::Table)
                    .if_not_exists()
                    .col(&mut id(Attachments::Id))
                    .col(ColumnDef::new(Attachments::TicketId).uuid().not_null())
                    .col(ColumnDef::new(Attachments::UploadedById).uuid())
                    .col(
                        ColumnDef::new(Attachments::FileName)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(&mut created_at(Attachments::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attachments_ticket_id")
                            .from(Attachments::Table, Attachments::TicketId)
                            .to(Tickets::Table, Tickets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(KnowledgeArticles::Table)
                    .if_not_exists()
                    .col(&mut id(KnowledgeArticles::Id))
                    .col(
                        ColumnDef::new(KnowledgeArticles::Title)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(KnowledgeArticles::AuthorId).uuid())
                    .col(&mut created_at(KnowledgeArticles::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Assets::Table)
                    .if_not_exists()
                    .col(&mut id(Assets::Id))
                    .col(ColumnDef::new(Assets::Tag).string_len(64).not_null())
                    .col(ColumnDef::new(Assets::AssignedTo).uuid())
                    .col(&mut created_at(Assets::CreatedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE INDEX idx_comments_ticket_id ON comments (ticket_id);
                CREATE INDEX idx_attachments_ticket_id ON attachments (ticket_id);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Assets::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(KnowledgeArticles::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        manager
            .drop_table(Table::drop().table(Attachments::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Comments::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tickets::Table).if_exists().to_owned())
            .await
    }
}

fn id<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .uuid()
        .not_null()
        .primary_key()
        .default(Expr::cust("gen_random_uuid()"))
        .to_owned()
}

fn created_at<T: IntoIden>(column: T) -> ColumnDef {
    ColumnDef::new(column)
        .timestamp_with_time_zone()
        .not_null()
        .default(Expr::current_timestamp())
        .to_owned()
}

#[derive(DeriveIden)]
enum Tickets {
    Table,
    Id,
    Subject,
    RequesterId,
    AssigneeId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
    TicketId,
    UserId,
    Body,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Attachments {
    Table,
    Id,
    TicketId,
    UploadedById,
    FileName,
    CreatedAt,
}

#[derive(DeriveIden)]
enum KnowledgeArticles {
    Table,
    Id,
    Title,
    AuthorId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Assets {
    Table,
    Id,
    Tag,
    AssignedTo,
    CreatedAt,
}
