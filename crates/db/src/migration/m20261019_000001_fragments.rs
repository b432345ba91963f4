//! Fragments migration.
//!
//! Creates the table holding one row per stored CRDT update. Built with the schema
//! builder so the same migration runs on Postgres and SQLite.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Fragments::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Fragments::Room).string().not_null())
                    .col(ColumnDef::new(Fragments::Docname).string().not_null())
                    .col(ColumnDef::new(Fragments::Fragment).string().not_null())
                    .col(ColumnDef::new(Fragments::Data).blob().not_null())
                    .col(
                        ColumnDef::new(Fragments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(Fragments::Room)
                            .col(Fragments::Docname)
                            .col(Fragments::Fragment),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Fragments::Table).if_exists().to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Fragments {
    Table,
    Room,
    Docname,
    Fragment,
    Data,
    CreatedAt,
}
