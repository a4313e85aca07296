//! Create `restaurants` table.
//!
//! Ratings are embedded as a JSONB array; `qr_code` is the generated image file name.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Restaurants::Table)
                    .if_not_exists()
                    .col(uuid(Restaurants::Id).primary_key())
                    .col(string_len(Restaurants::Name, 255).unique_key().not_null())
                    .col(json_binary(Restaurants::Ratings).not_null())
                    .col(string_len(Restaurants::QrCode, 255).not_null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Restaurants::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Restaurants { Table, Id, Name, Ratings, QrCode }
