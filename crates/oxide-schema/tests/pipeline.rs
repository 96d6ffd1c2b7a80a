//! End-to-end scenarios for the diff, resolve and render pipeline.

use oxide_schema::prelude::{
    diff, plan, resolve, Column, DestructiveReason, ForeignKey, ForeignKeyAction, Index,
    MySqlDialect, NameCase, OperationKind, Phase, Plan, Schema, SchemaError, SchemaState,
    ScriptHeader, SqlType, SyncError, Table,
};
use pretty_assertions::assert_eq;

fn users() -> Table {
    Table::new("users")
        .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
        .column(Column::new("name", SqlType::Varchar(255)).not_null())
        .primary_key(["id"])
}

fn customers() -> Table {
    Table::new("customers")
        .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
        .column(Column::new("email", SqlType::Varchar(255)).not_null())
        .primary_key(["id"])
}

fn orders() -> Table {
    Table::new("orders")
        .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
        .column(Column::new("customer_id", SqlType::BIGINT).not_null())
        .column(Column::new("total", SqlType::Decimal(10, 2)).not_null())
        .primary_key(["id"])
        .foreign_key(
            ForeignKey::new("fk_orders_customer", ["customer_id"], "customers", ["id"])
                .on_delete(ForeignKeyAction::Cascade),
        )
}

fn schema(tables: Vec<Table>) -> Schema {
    Schema::new(NameCase::Sensitive, tables).unwrap()
}

fn kinds(plan: &Plan) -> Vec<OperationKind> {
    plan.operations
        .iter()
        .map(|p| p.operation.kind())
        .collect()
}

#[test]
fn test_new_table_becomes_single_create() {
    let source = schema(vec![users()]);
    let plan = plan(&source, &Schema::empty()).unwrap();

    assert_eq!(kinds(&plan), vec![OperationKind::CreateTable]);
    let statements = plan.statements(&MySqlDialect::mysql());
    assert_eq!(statements.len(), 1);
    assert!(statements[0].starts_with("CREATE TABLE `users` ("));
    assert!(!plan.report.requires_confirmation());
}

#[test]
fn test_dropped_column_is_destructive_and_leaves_foreign_keys_alone() {
    let with_age = users().column(Column::new("age", SqlType::INT));
    let sessions = Table::new("sessions")
        .column(Column::new("id", SqlType::BIGINT).not_null())
        .column(Column::new("user_id", SqlType::BIGINT).not_null())
        .primary_key(["id"])
        .foreign_key(ForeignKey::new("fk_sessions_user", ["user_id"], "users", ["id"]));

    let source = schema(vec![users(), sessions.clone()]);
    let target = schema(vec![with_age, sessions]);
    let plan = plan(&source, &target).unwrap();

    assert_eq!(kinds(&plan), vec![OperationKind::DropColumn]);
    let planned = &plan.operations.as_slice()[0];
    assert!(planned.destructive);
    assert_eq!(planned.reason, Some(DestructiveReason::DropsColumn));
    assert_eq!(planned.operation.table_name(), "users");
    assert_eq!(
        plan.statements(&MySqlDialect::mysql()),
        vec!["ALTER TABLE `users` DROP COLUMN `age`"]
    );
}

#[test]
fn test_new_unique_index_follows_column_changes() {
    let target = schema(vec![customers(), orders()]);
    let extended = orders()
        .column(Column::new("note", SqlType::Text))
        .index(Index::new("uq_orders_customer", ["customer_id"]).unique());
    let source = schema(vec![customers(), extended]);

    let plan = plan(&source, &target).unwrap();
    assert_eq!(
        kinds(&plan),
        vec![OperationKind::AddColumn, OperationKind::CreateIndex]
    );
    assert_eq!(
        plan.statements(&MySqlDialect::mysql())[1],
        "CREATE UNIQUE INDEX `uq_orders_customer` ON `orders` (`customer_id`)"
    );
}

#[test]
fn test_mutually_referencing_new_tables_are_rejected() {
    let a = Table::new("a")
        .column(Column::new("id", SqlType::INT).not_null())
        .column(Column::new("b_id", SqlType::INT))
        .primary_key(["id"])
        .foreign_key(ForeignKey::new("fk_a_b", ["b_id"], "b", ["id"]));
    let b = Table::new("b")
        .column(Column::new("id", SqlType::INT).not_null())
        .column(Column::new("a_id", SqlType::INT))
        .primary_key(["id"])
        .foreign_key(ForeignKey::new("fk_b_a", ["a_id"], "a", ["id"]));

    let err = plan(&schema(vec![a, b]), &Schema::empty()).unwrap_err();
    assert!(matches!(err, SyncError::CyclicDependency { ref tables } if tables == &["a", "b"]));
    assert!(err.to_string().contains("a, b"));
}

#[test]
fn test_referenced_tables_created_first_and_dropped_last() {
    let source = schema(vec![customers(), orders()]);
    let created = plan(&source, &Schema::empty()).unwrap();
    let tables: Vec<&str> = created
        .operations
        .iter()
        .map(|p| p.operation.table_name())
        .collect();
    assert_eq!(tables, vec!["customers", "orders"]);

    let dropped = plan(&Schema::empty(), &source).unwrap();
    let tables: Vec<&str> = dropped
        .operations
        .iter()
        .map(|p| p.operation.table_name())
        .collect();
    assert_eq!(tables, vec!["orders", "customers"]);
    assert_eq!(dropped.report.destructive.len(), 2);
}

#[test]
fn test_narrowing_alter_is_flagged() {
    let narrow = Table::new("users")
        .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
        .column(Column::new("name", SqlType::Varchar(100)).not_null())
        .primary_key(["id"]);
    let plan = plan(&schema(vec![narrow]), &schema(vec![users()])).unwrap();
    assert_eq!(kinds(&plan), vec![OperationKind::AlterColumn]);
    assert_eq!(
        plan.operations.as_slice()[0].reason,
        Some(DestructiveReason::NarrowsType {
            from: SqlType::Varchar(255),
            to: SqlType::Varchar(100),
        })
    );

    let widened = plan_widening();
    assert!(!widened.report.requires_confirmation());
}

fn plan_widening() -> Plan {
    let wide = Table::new("users")
        .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
        .column(Column::new("name", SqlType::Text).not_null())
        .primary_key(["id"]);
    plan(&schema(vec![wide]), &schema(vec![users()])).unwrap()
}

#[test]
fn test_foreign_key_retarget_drops_before_table_removal() {
    // orders moves its reference from customers to users; customers goes away.
    let retargeted = Table::new("orders")
        .column(Column::new("id", SqlType::BIGINT).not_null().auto_increment())
        .column(Column::new("customer_id", SqlType::BIGINT).not_null())
        .column(Column::new("total", SqlType::Decimal(10, 2)).not_null())
        .primary_key(["id"])
        .foreign_key(ForeignKey::new("fk_orders_user", ["customer_id"], "users", ["id"]));
    let source = schema(vec![users(), retargeted]);
    let target = schema(vec![customers(), orders()]);

    let plan = plan(&source, &target).unwrap();
    let summary: Vec<(Phase, OperationKind, &str)> = plan
        .operations
        .iter()
        .map(|p| (p.phase, p.operation.kind(), p.operation.table_name()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (Phase::DropForeignKeys, OperationKind::DropForeignKey, "orders"),
            (Phase::DropTables, OperationKind::DropTable, "customers"),
            (Phase::CreateTables, OperationKind::CreateTable, "users"),
            (Phase::AddForeignKeys, OperationKind::AddForeignKey, "orders"),
        ]
    );
}

#[test]
fn test_plan_and_reverse_plan_reconstruct_both_sides() {
    let source = schema(vec![
        users(),
        customers(),
        orders().index(Index::new("idx_orders_total", ["total"])),
    ]);
    let target = schema(vec![
        users().column(Column::new("age", SqlType::TINYINT)),
        customers(),
    ]);

    let forward = plan(&source, &target).unwrap();
    let mut state = SchemaState::new(&target);
    state.apply_all(&forward.operations).unwrap();
    let reached = state.into_schema().unwrap();
    assert!(diff(&source, &reached).unwrap().is_empty());

    let backward = plan(&target, &reached).unwrap();
    let mut state = SchemaState::new(&reached);
    state.apply_all(&backward.operations).unwrap();
    let restored = state.into_schema().unwrap();
    assert!(diff(&target, &restored).unwrap().is_empty());
}

#[test]
fn test_change_set_inverse_undoes_changes() {
    let source = schema(vec![
        users().column(Column::new("email", SqlType::Varchar(255))),
        customers(),
    ]);
    let target = schema(vec![users(), customers(), orders()]);

    let changes = diff(&source, &target).unwrap();
    let forward = resolve(&changes, &source, &target).unwrap();
    let mut state = SchemaState::new(&target);
    state.apply_all(&forward).unwrap();
    let reached = state.into_schema().unwrap();

    let inverse = changes.inverse();
    let backward = resolve(&inverse, &target, &reached).unwrap();
    let mut state = SchemaState::new(&reached);
    state.apply_all(&backward).unwrap();
    assert!(diff(&target, &state.into_schema().unwrap())
        .unwrap()
        .is_empty());
}

#[test]
fn test_dangling_reference_in_target_is_malformed() {
    let target = schema(vec![orders()]);
    let err = plan(&schema(vec![customers(), orders()]), &target).unwrap_err();
    match err {
        SyncError::MalformedSchema(SchemaError::DanglingReference {
            table,
            referenced_table,
            ..
        }) => {
            assert_eq!(table, "orders");
            assert_eq!(referenced_table, "customers");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_script_artifact() {
    let source = schema(vec![customers(), orders()]);
    let target = schema(vec![customers().column(Column::new("legacy", SqlType::Text))]);
    let plan = plan(&source, &target).unwrap();

    let header = ScriptHeader::now("app@primary:3306/shop", "app@replica:3306/shop");
    let script = plan.script(&MySqlDialect::mysql(), &header);

    assert!(script.contains("-- Operations: 2 (1 destructive)\n"));
    assert!(script.contains("-- DESTRUCTIVE: drops the column and its data\n"));
    let drop = script.find("ALTER TABLE `customers` DROP COLUMN `legacy`;").unwrap();
    let create = script.find("CREATE TABLE `orders`").unwrap();
    assert!(drop < create);
    assert_eq!(script.matches(";\n").count(), 2);
}

#[test]
fn test_unique_rebuild_of_foreign_key_index_lifts_the_constraint() {
    let indexed = |index: Index| orders().index(index);
    let source = schema(vec![
        customers(),
        indexed(Index::new("idx_customer", ["customer_id"]).unique()),
    ]);
    let target = schema(vec![
        customers(),
        indexed(Index::new("idx_customer", ["customer_id"])),
    ]);

    let plan = plan(&source, &target).unwrap();
    assert_eq!(
        plan.statements(&MySqlDialect::mysql()),
        vec![
            "ALTER TABLE `orders` DROP FOREIGN KEY `fk_orders_customer`",
            "DROP INDEX `idx_customer` ON `orders`",
            "CREATE UNIQUE INDEX `idx_customer` ON `orders` (`customer_id`)",
            "ALTER TABLE `orders` ADD CONSTRAINT `fk_orders_customer` FOREIGN KEY (`customer_id`) \
             REFERENCES `customers` (`id`) ON DELETE CASCADE ON UPDATE NO ACTION",
        ]
    );
    assert!(!plan.report.requires_confirmation());
}

#[test]
fn test_widening_foreign_key_columns_lifts_the_constraint() {
    let with_ids = |id: SqlType| {
        let mut customers = customers();
        customers.columns[0].sql_type = id.clone();
        let mut orders = orders();
        orders.columns[1].sql_type = id;
        vec![customers, orders]
    };
    let source = schema(with_ids(SqlType::BIGINT));
    let target = schema(with_ids(SqlType::INT));

    let plan = plan(&source, &target).unwrap();
    let statements = plan.statements(&MySqlDialect::mysql());
    assert_eq!(
        statements[0],
        "ALTER TABLE `orders` DROP FOREIGN KEY `fk_orders_customer`"
    );
    assert_eq!(
        statements[1..3].to_vec(),
        vec![
            "ALTER TABLE `customers` MODIFY COLUMN `id` BIGINT NOT NULL AUTO_INCREMENT",
            "ALTER TABLE `orders` MODIFY COLUMN `customer_id` BIGINT NOT NULL",
        ]
    );
    assert!(statements[3].starts_with("ALTER TABLE `orders` ADD CONSTRAINT `fk_orders_customer`"));
    assert_eq!(statements.len(), 4);
}
