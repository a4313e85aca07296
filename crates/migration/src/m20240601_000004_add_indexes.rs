use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Waiters: lookup by owning restaurant (detail page, cascade delete)
        manager
            .create_index(
                Index::create()
                    .name("idx_waiter_restaurant")
                    .table(Waiters::Table)
                    .col(Waiters::RestaurantId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_waiter_restaurant").table(Waiters::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Waiters { Table, RestaurantId }
