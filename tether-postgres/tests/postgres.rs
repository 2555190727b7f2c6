mod init;

#[cfg(test)]
mod tests {
    use super::init::init;
    use indoc::indoc;
    use std::sync::{Arc, Mutex};
    use tether::{
        Connection, Executor, Mapped, Query, QueryResult, Registry, StatementBuilder, Value,
        and, in_list, like, stream::TryStreamExt,
    };
    use tether_postgres::{PostgresConnection, PostgresDriver, PostgresSqlWriter};
    use tether_tests::{execute_tests, init_logs, silent_logs};

    static MUTEX: Mutex<()> = Mutex::new(());

    const WRITER: PostgresSqlWriter = PostgresSqlWriter {};

    #[derive(Mapped)]
    struct Track {
        #[tether(key)]
        code: String,
        title: String,
        tags: Vec<String>,
    }

    #[test]
    fn dialect() {
        let registry = Registry::new();
        let descriptor = registry.descriptor_for::<Track>().unwrap();
        let builder = StatementBuilder::new(&WRITER, &registry, &descriptor, "music");
        assert_eq!(
            builder.create_table().unwrap()[1],
            indoc! {r#"
                CREATE TABLE IF NOT EXISTS "music"."track" (
                "code" TEXT PRIMARY KEY,
                "title" TEXT NOT NULL,
                "tags" TEXT[] NOT NULL
                );
            "#}
            .trim()
        );
        let statement = builder
            .select(Some(&and([
                like("title", "%love%"),
                in_list("code", ["a", "b"]),
            ])))
            .unwrap();
        assert_eq!(
            statement.sql,
            indoc! {r#"
                SELECT "code", "title", "tags"
                FROM "music"."track"
                WHERE "title" ILIKE $1 AND "code" IN ($2, $3);
            "#}
            .trim()
        );
        assert_eq!(statement.bindings.len(), 3);
    }

    #[tokio::test]
    async fn postgres() {
        init_logs();
        let _guard = MUTEX.lock().unwrap();
        let (url, container) = init().await;
        let error_msg = format!("Could not connect to `{url}`");

        let driver = PostgresDriver::new();
        let connection = Connection::open(&driver, &url, Arc::new(Registry::new()))
            .await
            .expect(&error_msg);
        execute_tests(&driver, &url, connection).await;

        // Unprepared statements return the values as text
        let mut connection = PostgresConnection::connect(&url).await.expect(&error_msg);
        let results: Vec<QueryResult> = connection
            .run(Query::Raw(
                "CREATE TEMPORARY TABLE note (id INTEGER, body TEXT);
                 INSERT INTO note VALUES (1, 'first'), (2, NULL);
                 SELECT id, body FROM note ORDER BY id;"
                    .into(),
            ))
            .try_collect()
            .await
            .expect("Could not run the statements");
        let rows: Vec<_> = results
            .into_iter()
            .filter_map(|v| match v {
                QueryResult::Row(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].names(), ["id", "body"]);
        assert_eq!(
            rows[0].values(),
            [
                Value::Varchar(Some("1".into())),
                Value::Varchar(Some("first".into()))
            ]
        );
        assert_eq!(rows[1].get_column("body"), Some(&Value::Varchar(None)));
        silent_logs! {
            assert!(
                connection
                    .execute(Query::Raw("SELECT * FROM missing".into()))
                    .await
                    .is_err()
            );
        }
        connection
            .disconnect()
            .await
            .expect("Could not disconnect");
        drop(container);
    }

    #[tokio::test]
    async fn wrong_url() {
        silent_logs! {
            assert!(
                PostgresConnection::connect("sqlite://some_url")
                    .await
                    .is_err()
            );
        }
    }
}
