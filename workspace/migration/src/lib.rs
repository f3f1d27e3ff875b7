pub use sea_orm_migration::prelude::*;

pub mod entity_iden;
mod m20250601_000001_create_ledger_tables;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20250601_000001_create_ledger_tables::Migration)]
    }
}
