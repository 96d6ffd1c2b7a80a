//! Snapshot round trip through planning and script output.

use std::fs;

use oxide_dbsync::output::write_atomic;
use oxide_dbsync::{SchemaSource, SnapshotFile};
use oxide_schema::prelude::{
    plan, Column, DefaultValue, ForeignKey, Index, MySqlDialect, NameCase, Schema, ScriptHeader,
    SqlType, Table,
};

fn source_schema() -> Schema {
    Schema::new(
        NameCase::Sensitive,
        [
            Table::new("customers")
                .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
                .column(Column::new("email", SqlType::Varchar(255)).not_null())
                .column(
                    Column::new("status", SqlType::Varchar(16))
                        .not_null()
                        .default(DefaultValue::String("active".to_string())),
                )
                .primary_key(["id"])
                .index(Index::new("uq_customers_email", ["email"]).unique()),
            Table::new("orders")
                .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
                .column(Column::new("customer_id", SqlType::BIGINT).not_null())
                .primary_key(["id"])
                .foreign_key(ForeignKey::new(
                    "fk_orders_customer",
                    ["customer_id"],
                    "customers",
                    ["id"],
                )),
        ],
    )
    .unwrap()
}

fn target_schema() -> Schema {
    Schema::new(
        NameCase::Sensitive,
        [Table::new("customers")
            .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
            .column(Column::new("email", SqlType::Varchar(255)).not_null())
            .column(Column::new("fax", SqlType::Varchar(32)))
            .primary_key(["id"])],
    )
    .unwrap()
}

#[tokio::test]
async fn test_plan_from_saved_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let source_file = SnapshotFile::new(dir.path().join("source.json"));
    let target_file = SnapshotFile::new(dir.path().join("target.json"));
    source_file.save(&source_schema()).unwrap();
    target_file.save(&target_schema()).unwrap();

    let source = SchemaSource::Snapshot(source_file);
    let target = SchemaSource::Snapshot(target_file);
    let (source_schema, target_schema) = tokio::try_join!(source.load(), target.load()).unwrap();

    let plan = plan(&source_schema, &target_schema).unwrap();
    assert!(plan.report.requires_confirmation());
    assert_eq!(plan.report.destructive.len(), 1);

    let header = ScriptHeader::now(source.display_name(), target.display_name());
    let script = plan.script(&MySqlDialect::mariadb(), &header);
    let output = dir.path().join("sync_queries.sql");
    write_atomic(&output, &script).unwrap();

    let written = fs::read_to_string(&output).unwrap();
    assert!(written.starts_with("-- Schema synchronization script\n"));
    assert!(written.contains("-- Dialect: mariadb\n"));
    assert!(written.contains("ADD COLUMN `status` VARCHAR(16) NOT NULL DEFAULT 'active' AFTER `email`;"));
    assert!(written.contains("CREATE UNIQUE INDEX `uq_customers_email` ON `customers` (`email`);"));
    assert!(written.contains("ALTER TABLE `customers` DROP COLUMN `fax`;"));

    let drop = written.find("DROP COLUMN `fax`").unwrap();
    let create = written.find("CREATE TABLE `orders`").unwrap();
    let index = written.find("CREATE UNIQUE INDEX").unwrap();
    assert!(drop < create);
    assert!(create < index);
}

#[tokio::test]
async fn test_identical_snapshots_produce_empty_script() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("schema.json"));
    file.save(&source_schema()).unwrap();

    let schema = SchemaSource::Snapshot(file).load().await.unwrap();
    let plan = plan(&schema, &source_schema()).unwrap();
    assert!(plan.is_empty());

    let script = plan.script(&MySqlDialect::mysql(), &ScriptHeader::now("a", "b"));
    assert!(script.contains("-- No structural differences found."));
}
