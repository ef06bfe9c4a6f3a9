//! # Identity Tables
//!
//! One table per identity domain, each with its own uuid primary key:
//! - `users`: service-provider staff
//! - `org_users`: members of a customer organization
//! - `client_users`: end clients of an organization
//!
//! The same uuid may legitimately appear in more than one of these tables.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [Identity::Users, Identity::OrgUsers, Identity::ClientUsers] {
            manager
                .create_table(
                    Table::create()
                        .table(table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Identity::Id)
                                .uuid()
                                .not_null()
                                .primary_key()
                                .default(Expr::cust("gen_random_uuid()")),
                        )
                        .col(ColumnDef::new(Identity::Email).string_len(255).not_null())
                        .col(ColumnDef::new(Identity::FullName).string_len(100).not_null())
                        .col(
                            ColumnDef::new(Identity::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null()
                                .default(Expr::current_timestamp()),
                        )
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [Identity::ClientUsers, Identity::OrgUsers, Identity::Users] {
            manager
                .drop_table(Table::drop().table(table).if_exists().to_owned())
                .await?;
        }

        Ok(())
    }
}

#[derive(DeriveIden, Clone, Copy)]
enum Identity {
    Users,
    OrgUsers,
    ClientUsers,
    Id,
    Email,
    FullName,
    CreatedAt,
}
