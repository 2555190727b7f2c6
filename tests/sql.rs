#[cfg(test)]
mod tests {
    use indoc::indoc;
    use rust_decimal::Decimal;
    use tether::{
        DateInterval, GenericSqlWriter, Instance, Mapped, Registry, StatementBuilder, Value,
        between, equals, greater, in_list, is_null, like, not, not_equals, or, references,
        smaller, within,
    };
    use time::{Date, PrimitiveDateTime, macros::date};

    const WRITER: GenericSqlWriter = GenericSqlWriter {};

    #[derive(Mapped)]
    struct Department {
        #[tether(key, auto_increment)]
        id: i64,
        name: String,
    }

    #[derive(Mapped)]
    struct Employee {
        #[tether(key, auto_increment)]
        id: i64,
        name: String,
        #[tether(read_only)]
        hired: Date,
        salary: Decimal,
        #[tether(lookup)]
        department: Option<Instance<Department>>,
        #[tether(computed)]
        updated: Option<PrimitiveDateTime>,
        #[tether(transient)]
        _notes: String,
    }

    #[test]
    fn create_and_drop() {
        let registry = Registry::new();
        let descriptor = registry.descriptor_for::<Employee>().unwrap();
        let builder = StatementBuilder::new(&WRITER, &registry, &descriptor, "company");
        assert_eq!(
            builder.create_table().unwrap(),
            [
                "CREATE SCHEMA IF NOT EXISTS \"company\";".to_string(),
                indoc! {r#"
                    CREATE TABLE IF NOT EXISTS "company"."employee" (
                    "id" BIGINT PRIMARY KEY,
                    "name" VARCHAR NOT NULL,
                    "hired" DATE NOT NULL,
                    "salary" DECIMAL NOT NULL,
                    "department_id" BIGINT,
                    "updated" TIMESTAMP
                    );
                "#}
                .trim()
                .to_string(),
                "CREATE SEQUENCE IF NOT EXISTS \"company\".\"EmployeeId\";".to_string(),
            ]
        );
        assert_eq!(
            builder.drop_table(),
            [
                "DROP TABLE IF EXISTS \"company\".\"employee\";",
                "DROP SEQUENCE IF EXISTS \"company\".\"EmployeeId\";",
            ]
        );
    }

    #[test]
    fn insert_every_column_but_computed() {
        let registry = Registry::new();
        let descriptor = registry.descriptor_for::<Employee>().unwrap();
        let builder = StatementBuilder::new(&WRITER, &registry, &descriptor, "company");
        let columns = ["id", "name", "hired", "salary", "department"]
            .into_iter()
            .map(|v| {
                (
                    descriptor.column(&registry, v).unwrap(),
                    Value::Null.into(),
                )
            })
            .collect();
        let statement = builder.insert(columns);
        assert_eq!(
            statement.sql,
            indoc! {r#"
                INSERT INTO "company"."employee" ("id", "name", "hired", "salary", "department_id") VALUES
                (?, ?, ?, ?, ?);
            "#}
            .trim()
        );
        assert_eq!(statement.bindings.len(), 5);
    }

    #[test]
    fn select_with_predicates() {
        let registry = Registry::new();
        let descriptor = registry.descriptor_for::<Employee>().unwrap();
        let builder = StatementBuilder::new(&WRITER, &registry, &descriptor, "");
        let predicate = or([
            greater("salary", Decimal::new(1000, 0)).and(like("name", "a%")),
            not(in_list("id", [1_i64, 2, 3])),
            between("hired", date!(2020 - 01 - 01), date!(2020 - 12 - 31)),
        ]);
        let statement = builder.select(Some(&predicate)).unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT "id", "name", "hired", "salary", "department_id", "updated"
                FROM "employee"
                WHERE "salary" > ? AND LOWER("name") LIKE LOWER(?) OR NOT "id" IN (?, ?, ?) OR "hired" BETWEEN ? AND ?;
            "#}
            .trim()
        );
        let properties: Vec<_> = statement.bindings.iter().map(|v| v.property).collect();
        assert_eq!(
            properties,
            ["salary", "name", "id", "id", "id", "hired", "hired"]
        );
        assert_eq!(statement.columns.len(), 6);
    }

    #[test]
    fn precedence_and_neutral_elements() {
        let registry = Registry::new();
        let descriptor = registry.descriptor_for::<Employee>().unwrap();
        let builder = StatementBuilder::new(&WRITER, &registry, &descriptor, "");
        let where_clause = |predicate| {
            let sql = builder.select(Some(&predicate)).unwrap().sql;
            let (_, clause) = sql.split_once("WHERE ").unwrap();
            clause.trim_end_matches(';').to_string()
        };
        assert_eq!(
            where_clause(equals("name", "x").and(or([smaller("id", 5_i64), is_null("updated")]))),
            "\"name\" = ? AND (\"id\" < ? OR \"updated\" IS NULL)"
        );
        assert_eq!(
            where_clause(not(not(equals("id", 1_i64)))),
            "NOT (NOT \"id\" = ?)"
        );
        assert_eq!(where_clause(tether::and([])), "true");
        assert_eq!(where_clause(or([])), "false");
        assert_eq!(where_clause(in_list::<i64>("id", [])), "false");
        assert_eq!(
            where_clause(equals("updated", Value::Null)),
            "\"updated\" IS NULL"
        );
        assert_eq!(
            where_clause(not_equals("department", Value::Null)),
            "\"department_id\" IS NOT NULL"
        );
        assert_eq!(
            where_clause(within("hired", &DateInterval::new(Some(date!(2021 - 03 - 01)), None))),
            "\"hired\" >= ?"
        );
        assert_eq!(
            where_clause(within("hired", &DateInterval::default())),
            "true"
        );
    }

    #[test]
    fn references_bind_the_key() {
        let registry = Registry::new();
        let descriptor = registry.descriptor_for::<Employee>().unwrap();
        let builder = StatementBuilder::new(&WRITER, &registry, &descriptor, "");
        let research = Instance::new(Department {
            id: 7,
            name: "Research".into(),
        });
        let statement = builder
            .select(Some(&references("department", &research)))
            .unwrap();
        assert!(statement.sql.ends_with("WHERE \"department_id\" = ?;"));
        let binding = &statement.bindings[0];
        assert_eq!(
            binding
                .marshal
                .to_value(binding.property, binding.value.clone())
                .unwrap(),
            Value::Int64(Some(7))
        );

        // A reference of another type is rejected
        let other = Instance::new(Employee {
            id: 1,
            name: "Ada".into(),
            hired: date!(2020 - 01 - 01),
            salary: Decimal::ZERO,
            department: None,
            updated: None,
            _notes: String::new(),
        });
        let statement = builder
            .select(Some(&references("department", &other)))
            .unwrap();
        let binding = &statement.bindings[0];
        assert!(
            binding
                .marshal
                .to_value(binding.property, binding.value.clone())
                .is_err()
        );
    }

    #[test]
    fn unknown_property_in_predicate() {
        let registry = Registry::new();
        let descriptor = registry.descriptor_for::<Employee>().unwrap();
        let builder = StatementBuilder::new(&WRITER, &registry, &descriptor, "");
        assert!(builder.select(Some(&equals("age", 3))).is_err());
        // Transient properties have no column
        assert!(builder.select(Some(&equals("notes", "x"))).is_err());
    }

    #[test]
    fn update_and_delete() {
        let registry = Registry::new();
        let descriptor = registry.descriptor_for::<Department>().unwrap();
        let builder = StatementBuilder::new(&WRITER, &registry, &descriptor, "company");
        let name = descriptor.column(&registry, "name").unwrap();
        let statement = builder
            .update(vec![(name, "Sales".into())], Some(&equals("id", 3_i64)))
            .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                UPDATE "company"."department" SET
                "name" = ?
                WHERE "id" = ?;
            "#}
            .trim()
        );
        assert_eq!(
            builder.delete(None).unwrap().sql,
            "DELETE FROM \"company\".\"department\";"
        );
        assert_eq!(
            builder.delete(Some(&equals("name", "x'y"))).unwrap().sql,
            "DELETE FROM \"company\".\"department\"\nWHERE \"name\" = ?;"
        );
    }

    #[test]
    fn next_value_and_escaping() {
        let mut out = String::new();
        tether::SqlWriter::write_next_value(&WRITER, &mut out, "company.EmployeeId");
        assert_eq!(out, "SELECT nextval('\"company\".\"EmployeeId\"');");
        let mut out = String::new();
        tether::SqlWriter::write_value_string(
            &WRITER,
            &mut Default::default(),
            &mut out,
            "it's",
        );
        assert_eq!(out, "'it''s'");
        let mut out = String::new();
        tether::SqlWriter::write_identifier_quoted(
            &WRITER,
            &mut Default::default(),
            &mut out,
            "a\"b",
        );
        assert_eq!(out, "\"a\"\"b\"");
    }
}
