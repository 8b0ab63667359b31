use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Append-only audit of every webhook delivery, written before any
        // state is touched so crashed handlers can be replayed.
        manager
            .create_table(
                Table::create()
                    .table(WebhookLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WebhookLogs::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(WebhookLogs::Provider).string().not_null())
                    .col(ColumnDef::new(WebhookLogs::Payload).text().not_null())
                    .col(
                        ColumnDef::new(WebhookLogs::ReceivedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WebhookLogs::Processed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(WebhookLogs::ProcessingNotes).text().null())
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WebhookLogs::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum WebhookLogs {
    Table,
    Id,
    Provider,
    Payload,
    ReceivedAt,
    Processed,
    ProcessingNotes,
}
