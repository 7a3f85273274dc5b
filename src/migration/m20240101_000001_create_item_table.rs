use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SdbItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(SdbItems::Domain).text().not_null())
                    .col(ColumnDef::new(SdbItems::Name).text().not_null())
                    .col(ColumnDef::new(SdbItems::Data).binary().not_null())
                    .col(ColumnDef::new(SdbItems::Expires).big_integer().null())
                    .primary_key(
                        Index::create()
                            .col(SdbItems::Domain)
                            .col(SdbItems::Name),
                    )
                    .to_owned(),
            )
            .await?;

        // Cleanup sweeps filter on (domain, expires < now).
        manager
            .create_index(
                Index::create()
                    .name("idx_sdb_items_domain_expires")
                    .table(SdbItems::Table)
                    .col(SdbItems::Domain)
                    .col(SdbItems::Expires)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SdbItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SdbItems {
    Table,
    Domain,
    Name,
    Data,
    Expires,
}
