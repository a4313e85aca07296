//! Create `waiters` table with FK to `restaurants`.
//!
//! Deletion is not cascaded by the database: the service layer releases each
//! waiter's photo before removing the record, so the FK restricts instead.
use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Waiters::Table)
                    .if_not_exists()
                    .col(uuid(Waiters::Id).primary_key())
                    .col(uuid(Waiters::RestaurantId).not_null())
                    .col(string_len(Waiters::Name, 255).not_null())
                    .col(string_len(Waiters::Picture, 255).not_null())
                    .col(json_binary(Waiters::Ratings).not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_waiter_restaurant")
                            .from(Waiters::Table, Waiters::RestaurantId)
                            .to(Restaurants::Table, Restaurants::Id)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Waiters::Table).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum Waiters { Table, Id, RestaurantId, Name, Picture, Ratings }

#[derive(DeriveIden)]
enum Restaurants { Table, Id }
