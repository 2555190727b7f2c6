#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, fmt, sync::Arc};
    use tether::{
        Connection, Driver, Error, ExecutionError, Executor, GenericSqlWriter, Instance, Mapped,
        MappingError, Prepared, Query, QueryResult, Registry, Result, RowLabeled, RowsAffected,
        Value, Values, equals, like,
        stream::{self, Stream},
    };

    /// Records what it is asked to run and answers with scripted results.
    #[derive(Default)]
    struct Recorder {
        log: Vec<(String, Vec<Value>)>,
        script: VecDeque<std::result::Result<Vec<QueryResult>, String>>,
        sequence: i64,
    }

    struct RecorderDriver;

    #[derive(Debug)]
    struct RecorderPrepared {
        sql: String,
        values: Vec<Value>,
    }

    impl fmt::Display for RecorderPrepared {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(&self.sql)
        }
    }

    impl Prepared for RecorderPrepared {
        fn bind(&mut self, value: Value) -> Result<&mut Self> {
            self.values.push(value);
            Ok(self)
        }
        fn bind_index(&mut self, value: Value, index: u64) -> Result<&mut Self> {
            let index = index as usize;
            if self.values.len() <= index {
                self.values.resize(index + 1, Value::Null);
            }
            self.values[index] = value;
            Ok(self)
        }
    }

    impl Driver for RecorderDriver {
        type Executor = Recorder;
        type SqlWriter = GenericSqlWriter;
        type Prepared = RecorderPrepared;

        const NAME: &'static str = "recorder";

        fn sql_writer(&self) -> GenericSqlWriter {
            GenericSqlWriter {}
        }

        async fn connect(&self, _url: &str) -> Result<Recorder> {
            Ok(Recorder::default())
        }
    }

    impl Executor for Recorder {
        type Driver = RecorderDriver;

        fn driver(&self) -> &RecorderDriver {
            &RecorderDriver {}
        }

        async fn prepare(&mut self, sql: String) -> Result<Query<RecorderDriver>> {
            Ok(Query::Prepared(RecorderPrepared {
                sql,
                values: Vec::new(),
            }))
        }

        fn run(
            &mut self,
            query: Query<RecorderDriver>,
        ) -> impl Stream<Item = Result<QueryResult>> + Send {
            let (sql, values) = match query {
                Query::Raw(sql) => (sql, Vec::new()),
                Query::Prepared(prepared) => (prepared.sql, prepared.values),
            };
            let results = if sql.starts_with("SELECT nextval(") {
                self.sequence += 1;
                Ok(vec![QueryResult::Row(row(&["nextval"], [self.sequence.into()]))])
            } else {
                self.script.pop_front().unwrap_or_else(|| {
                    Ok(vec![QueryResult::Affected(RowsAffected {
                        rows_affected: 1,
                        last_affected_id: None,
                    })])
                })
            };
            self.log.push((sql, values));
            let results: Vec<Result<QueryResult>> = match results {
                Ok(v) => v.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(Error::msg(e))],
            };
            stream::iter(results)
        }
    }

    fn row<const N: usize>(labels: &[&str; N], values: [Value; N]) -> RowLabeled {
        RowLabeled::new(
            labels.iter().map(|v| v.to_string()).collect(),
            values.into(),
        )
    }

    fn rows<const N: usize>(labels: &[&str; N], values: Vec<[Value; N]>) -> Vec<QueryResult> {
        values
            .into_iter()
            .map(|v| QueryResult::Row(row(labels, v)))
            .collect()
    }

    #[derive(Mapped, Debug)]
    struct Department {
        #[tether(key, auto_increment)]
        id: i64,
        name: String,
    }

    #[derive(Mapped, Debug)]
    struct Employee {
        #[tether(key, auto_increment)]
        id: i64,
        name: String,
        #[tether(lookup)]
        department: Option<Instance<Department>>,
    }

    #[derive(Mapped)]
    struct Memo {
        text: String,
    }

    async fn connect() -> Connection<Recorder> {
        let registry = Arc::new(Registry::new());
        let mut connection = Connection::open(&RecorderDriver, "recorder://", registry)
            .await
            .unwrap();
        connection
            .register_identity_cache::<Department>()
            .unwrap();
        connection.register_identity_cache::<Employee>().unwrap();
        connection
    }

    #[tokio::test]
    async fn insert_draws_the_key_from_the_sequence() {
        let mut connection = connect().await;
        let research = connection
            .insert::<Department>("hr", Values::new().with("name", "Research").with("budget", 3))
            .await
            .unwrap();
        assert_eq!(research.read().id, 1);
        assert_eq!(research.read().name, "Research");
        let log = &connection.executor().log;
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].0, "SELECT nextval('\"hr\".\"DepartmentId\"');");
        assert_eq!(
            log[1],
            (
                "INSERT INTO \"hr\".\"department\" (\"id\", \"name\") VALUES\n(?, ?);".to_string(),
                vec![Value::Int64(Some(1)), Value::Varchar(Some("Research".into()))]
            )
        );
        let cached = connection.lookup::<Department>(1_i64).unwrap();
        assert!(Instance::ptr_eq(&cached, &research));
        // Keys are compared by value, not by variant
        assert!(connection.lookup::<Department>(1_i32).is_some());
        assert!(connection.lookup::<Department>(2_i64).is_none());

        // An explicit key skips the sequence
        let sales = connection
            .insert::<Department>("hr", Values::new().with("id", 40_i64).with("name", "Sales"))
            .await
            .unwrap();
        assert_eq!(sales.read().id, 40);
        assert_eq!(connection.executor().log.len(), 3);
    }

    #[tokio::test]
    async fn select_keeps_one_instance_per_key() {
        let mut connection = connect().await;
        let research = connection
            .insert::<Department>("", Values::new().with("name", "Research"))
            .await
            .unwrap();
        connection.executor().script.push_back(Ok(rows(
            &["id", "name"],
            vec![
                [1_i64.into(), "R&D".into()],
                [2_i64.into(), "Sales".into()],
            ],
        )));
        let departments = connection.select_all::<Department>("").await.unwrap();
        assert_eq!(departments.len(), 2);
        assert!(Instance::ptr_eq(&departments[0], &research));
        assert_eq!(research.read().name, "R&D");
        assert_eq!(departments[1].read().name, "Sales");
        assert!(Instance::ptr_eq(
            &connection.lookup::<Department>(2_i64).unwrap(),
            &departments[1]
        ));
        assert_eq!(
            connection.executor().log.last().unwrap().0,
            "SELECT \"id\", \"name\"\nFROM \"department\";"
        );
    }

    #[tokio::test]
    async fn lookups_resolve_through_the_cache() {
        let mut connection = connect().await;
        let research = connection
            .insert::<Department>("", Values::new().with("name", "Research"))
            .await
            .unwrap();
        let ada = connection
            .insert::<Employee>(
                "",
                Values::new()
                    .with("name", "Ada")
                    .with_reference("department", &research),
            )
            .await
            .unwrap();
        assert!(Instance::ptr_eq(
            ada.read().department.as_ref().unwrap(),
            &research
        ));
        let (sql, values) = connection.executor().log.last().unwrap().clone();
        assert!(sql.starts_with("INSERT INTO \"employee\" (\"id\", \"name\", \"department_id\")"));
        assert_eq!(values[2], Value::Int64(Some(1)));

        connection.executor().script.push_back(Ok(rows(
            &["id", "name", "department_id"],
            vec![
                [5_i64.into(), "Grace".into(), 1_i64.into()],
                [6_i64.into(), "Linus".into(), Value::Int64(None)],
                [7_i64.into(), "Ken".into(), 99_i64.into()],
            ],
        )));
        let found = connection
            .select::<Employee>("", &like("name", "%"))
            .await
            .unwrap();
        assert!(Instance::ptr_eq(
            found[0].read().department.as_ref().unwrap(),
            &research
        ));
        assert!(found[1].read().department.is_none());
        // Dangling, left unresolved
        assert!(found[2].read().department.is_none());
        assert_eq!(
            connection.executor().log.last().unwrap(),
            &(
                "SELECT \"id\", \"name\"\nFROM \"department\"\nWHERE \"id\" = ?;".to_string(),
                vec![Value::Int64(Some(99))]
            )
        );
    }

    #[tokio::test]
    async fn missing_lookups_are_loaded() {
        let mut connection = connect().await;
        let script = &mut connection.executor().script;
        script.push_back(Ok(rows(
            &["id", "name", "department_id"],
            vec![[5_i64.into(), "Grace".into(), 1_i64.into()]],
        )));
        script.push_back(Ok(rows(
            &["id", "name"],
            vec![[1_i64.into(), "Research".into()]],
        )));
        let grace = connection
            .select_one::<Employee>("hr", &equals("id", 5))
            .await
            .unwrap()
            .unwrap();
        let research = connection.lookup::<Department>(1_i64).unwrap();
        assert_eq!(research.read().name, "Research");
        assert!(Instance::ptr_eq(
            grace.read().department.as_ref().unwrap(),
            &research
        ));
        assert_eq!(
            connection.executor().log.last().unwrap(),
            &(
                "SELECT \"id\", \"name\"\nFROM \"hr\".\"department\"\nWHERE \"id\" = ?;"
                    .to_string(),
                vec![Value::Int64(Some(1))]
            )
        );

        // Cached now, the next read does not ask again
        connection.executor().script.push_back(Ok(rows(
            &["id", "name", "department_id"],
            vec![[5_i64.into(), "Grace".into(), 1_i64.into()]],
        )));
        let before = connection.executor().log.len();
        connection.select_all::<Employee>("hr").await.unwrap();
        assert_eq!(connection.executor().log.len(), before + 1);

        grace.write().name = "Grace H.".into();
        connection.update("hr", &grace).await.unwrap();
        let (sql, values) = connection.executor().log.last().unwrap().clone();
        assert!(sql.contains("\"department_id\" = ?"));
        assert_eq!(
            values,
            [
                Value::Varchar(Some("Grace H.".into())),
                Value::Int64(Some(1)),
                Value::Int64(Some(5))
            ]
        );
    }

    #[tokio::test]
    async fn untracked_lookups_are_not_written() {
        let registry = Arc::new(Registry::new());
        let mut connection = Connection::open(&RecorderDriver, "recorder://", registry)
            .await
            .unwrap();
        connection.register_identity_cache::<Employee>().unwrap();
        connection.executor().script.push_back(Ok(rows(
            &["id", "name", "department_id"],
            vec![[5_i64.into(), "Grace".into(), 1_i64.into()]],
        )));
        let grace = connection
            .select_one::<Employee>("", &equals("id", 5))
            .await
            .unwrap()
            .unwrap();
        assert!(grace.read().department.is_none());
        assert_eq!(connection.executor().log.len(), 1);

        connection.update("", &grace).await.unwrap();
        let (sql, values) = connection.executor().log.last().unwrap().clone();
        assert_eq!(sql, "UPDATE \"employee\" SET\n\"name\" = ?\nWHERE \"id\" = ?;");
        assert_eq!(
            values,
            [Value::Varchar(Some("Grace".into())), Value::Int64(Some(5))]
        );
    }

    #[tokio::test]
    async fn long_statements_keep_their_text() {
        let mut connection = connect().await;
        let schema = "é".repeat(300);
        connection
            .executor()
            .script
            .push_back(Err("constraint violated".into()));
        assert!(
            connection
                .try_insert::<Department>(&schema, Values::new().with("name", "Research"))
                .await
                .is_none()
        );

        connection
            .executor()
            .script
            .push_back(Err("constraint violated".into()));
        let error = connection
            .insert::<Department>(&schema, Values::new().with("name", "Research"))
            .await
            .unwrap_err();
        let Some(ExecutionError::Statement { sql, .. }) = error.downcast_ref::<ExecutionError>()
        else {
            panic!("Expected a statement error, got {:#}", error);
        };
        assert!(sql.len() > 600);
        assert!(sql.contains(&schema));
        assert!(format!("{:#}", error).ends_with("constraint violated"));
    }

    #[tokio::test]
    async fn select_one_needs_exactly_one_row() {
        let mut connection = connect().await;
        let script = &mut connection.executor().script;
        script.push_back(Ok(rows(
            &["id", "name"],
            vec![[1_i64.into(), "A".into()], [2_i64.into(), "B".into()]],
        )));
        script.push_back(Ok(Vec::new()));
        script.push_back(Ok(rows(&["id", "name"], vec![[3_i64.into(), "C".into()]])));
        let predicate = equals("name", "x");
        assert!(
            connection
                .select_one::<Department>("", &predicate)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            connection
                .select_one::<Department>("", &predicate)
                .await
                .unwrap()
                .is_none()
        );
        let one = connection
            .select_one::<Department>("", &predicate)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(one.read().name, "C");
    }

    #[tokio::test]
    async fn update_writes_the_mutable_properties() {
        let mut connection = connect().await;
        let research = connection
            .insert::<Department>("hr", Values::new().with("name", "Research"))
            .await
            .unwrap();
        research.write().name = "Labs".into();
        connection.update("hr", &research).await.unwrap();
        assert_eq!(
            connection.executor().log.last().unwrap(),
            &(
                "UPDATE \"hr\".\"department\" SET\n\"name\" = ?\nWHERE \"id\" = ?;".to_string(),
                vec![Value::Varchar(Some("Labs".into())), Value::Int64(Some(1))]
            )
        );

        // Nothing left to write
        let before = connection.executor().log.len();
        let affected = connection
            .update_properties("hr", &research, &["id"])
            .await
            .unwrap();
        assert_eq!(affected.rows_affected, 0);
        assert_eq!(connection.executor().log.len(), before);

        connection
            .update_where::<Department>(
                "hr",
                Values::new().with("name", "Closed").with("unknown", 1),
                Some(&like("name", "l%")),
            )
            .await
            .unwrap();
        let (sql, values) = connection.executor().log.last().unwrap().clone();
        assert_eq!(
            sql,
            "UPDATE \"hr\".\"department\" SET\n\"name\" = ?\nWHERE LOWER(\"name\") LIKE LOWER(?);"
        );
        assert_eq!(values.len(), 2);
    }

    #[tokio::test]
    async fn delete_keeps_the_cache() {
        let mut connection = connect().await;
        let research = connection
            .insert::<Department>("", Values::new().with("name", "Research"))
            .await
            .unwrap();
        let affected = connection.delete("", &research).await.unwrap();
        assert_eq!(affected.rows_affected, 1);
        assert_eq!(
            connection.executor().log.last().unwrap().0,
            "DELETE FROM \"department\"\nWHERE \"id\" = ?;"
        );
        assert!(connection.lookup::<Department>(1_i64).is_some());
        connection.delete_all::<Department>("").await.unwrap();
        assert_eq!(
            connection.executor().log.last().unwrap().0,
            "DELETE FROM \"department\";"
        );
        connection.close().await.unwrap();
    }

    #[tokio::test]
    async fn failures() {
        let mut connection = connect().await;
        connection
            .executor()
            .script
            .push_back(Err("constraint violated".into()));
        assert!(
            connection
                .try_insert::<Department>("", Values::new().with("name", "Research"))
                .await
                .is_none()
        );
        assert!(connection.lookup::<Department>(1_i64).is_none());

        connection
            .executor()
            .script
            .push_back(Err("constraint violated".into()));
        let error = connection
            .insert::<Department>("", Values::new().with("name", "Research"))
            .await
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ExecutionError>(),
            Some(ExecutionError::Statement { sql, .. }) if sql.starts_with("INSERT INTO")
        ));

        connection
            .executor()
            .script
            .push_back(Err("connection reset".into()));
        let error = connection.select_all::<Department>("").await.unwrap_err();
        assert!(matches!(
            error.downcast_ref::<ExecutionError>(),
            Some(ExecutionError::Cursor { .. })
        ));

        let error = connection.register_identity_cache::<Memo>().unwrap_err();
        assert!(matches!(
            error.downcast_ref::<MappingError>(),
            Some(MappingError::MissingKey { .. })
        ));
        assert!(connection.lookup::<Memo>("x").is_none());
        let memo = Instance::new(Memo { text: "x".into() });
        assert!(connection.update("", &memo).await.is_err());
    }
}
