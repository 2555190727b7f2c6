#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Mutex};
    use tether::{
        Executor, Prepared, Query, QueryResult, RowLabeled, Value, stream::TryStreamExt,
    };
    use tether_sqlite::SqliteConnection;
    use tether_tests::{init_logs, silent_logs};
    use std::time::{Duration, Instant};
    use tokio::fs;

    static MUTEX: Mutex<()> = Mutex::new(());

    #[tokio::test]
    async fn create_database() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/creation.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .await
                .expect(format!("Failed to remove test database file {}", DB_PATH).as_str());
        }
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        silent_logs! {
            assert!(
                SqliteConnection::connect(&format!("sqlite://{}?mode=rw", DB_PATH))
                    .await
                    .is_err(),
                "Should not be able to open an unexisting database without the create mode"
            );
        }
        SqliteConnection::connect(&format!("sqlite://{}?mode=rwc", DB_PATH))
            .await
            .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        SqliteConnection::connect(&format!("sqlite://{}", DB_PATH))
            .await
            .expect("Could not open the database again");
        fs::remove_file(DB_PATH)
            .await
            .expect(format!("Failed to remove existing test database file {}", DB_PATH).as_str());
    }

    #[tokio::test]
    async fn wrong_url() {
        silent_logs! {
            assert!(
                SqliteConnection::connect("postgres://some_value")
                    .await
                    .is_err()
            );
        };
    }

    #[tokio::test]
    async fn raw_statements() {
        init_logs();
        let mut connection = SqliteConnection::connect("sqlite://:memory:")
            .await
            .expect("Could not open the in memory database");
        let results: Vec<QueryResult> = connection
            .run(Query::Raw(
                "CREATE TABLE \"note\" (\"id\" INTEGER PRIMARY KEY, \"text\" TEXT);
                 INSERT INTO \"note\" (\"text\") VALUES ('first'), ('second');
                 -- trailing statements
                 SELECT \"id\", \"text\" FROM \"note\" ORDER BY \"id\";"
                    .into(),
            ))
            .try_collect()
            .await
            .expect("Could not run the statements");
        let affected: Vec<_> = results
            .iter()
            .filter_map(|v| match v {
                QueryResult::Affected(v) => Some(v.rows_affected),
                _ => None,
            })
            .collect();
        assert_eq!(affected.last(), Some(&2));
        let rows: Vec<_> = results
            .into_iter()
            .filter_map(|v| match v {
                QueryResult::Row(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].names(), ["id", "text"]);
        assert_eq!(
            rows[0].values(),
            [Value::Int64(Some(1)), Value::Varchar(Some("first".into()))]
        );
        assert_eq!(
            rows[1].get_column("text"),
            Some(&Value::Varchar(Some("second".into())))
        );

        let mut query = connection
            .prepare("SELECT \"text\" FROM \"note\" WHERE \"id\" = ?".into())
            .await
            .expect("Could not prepare the query");
        let Query::Prepared(prepared) = &mut query else {
            panic!("Expected a prepared query");
        };
        prepared
            .bind(Value::Int64(Some(2)))
            .expect("Could not bind the id");
        let rows: Vec<RowLabeled> = connection
            .fetch(query)
            .try_collect()
            .await
            .expect("Could not fetch the row");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values(), [Value::Varchar(Some("second".into()))]);

        silent_logs! {
            assert!(
                connection
                    .prepare("SELECT 1; SELECT 2;".into())
                    .await
                    .is_err(),
                "Only one statement can be prepared at a time"
            );
            assert!(
                connection
                    .execute(Query::Raw("SELECT * FROM \"missing\"".into()))
                    .await
                    .is_err()
            );
        }

        let id = connection
            .next_value("notes")
            .await
            .expect("Could not draw from the sequence");
        assert_eq!(id, 1);
        let id = connection
            .next_value("notes")
            .await
            .expect("Could not draw from the sequence");
        assert_eq!(id, 2);
    }

    #[tokio::test]
    async fn busy_database() {
        init_logs();
        const DB_PATH: &'static str = "../target/debug/busy.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .await
                .expect(format!("Failed to remove test database file {}", DB_PATH).as_str());
        }
        let mut holder = SqliteConnection::connect(&format!("sqlite://{}?mode=rwc", DB_PATH))
            .await
            .expect("Could not create the database");
        let mut waiter =
            SqliteConnection::connect(&format!("sqlite://{}?mode=rw&busy_timeout=200", DB_PATH))
                .await
                .expect("Could not open the database a second time");
        holder
            .execute(Query::Raw(
                "CREATE TABLE \"counter\" (\"value\" INTEGER); BEGIN EXCLUSIVE;".into(),
            ))
            .await
            .expect("Could not lock the database");

        let start = Instant::now();
        silent_logs! {
            assert!(
                waiter
                    .execute(Query::Raw("INSERT INTO \"counter\" VALUES (1)".into()))
                    .await
                    .is_err(),
                "The exclusive lock is still held"
            );
        }
        assert!(
            start.elapsed() >= Duration::from_millis(150),
            "The statement waits for the lock before failing"
        );

        holder
            .execute(Query::Raw("COMMIT;".into()))
            .await
            .expect("Could not release the lock");
        let result = waiter
            .execute(Query::Raw("INSERT INTO \"counter\" VALUES (1)".into()))
            .await
            .expect("The lock was released");
        assert_eq!(result.rows_affected, 1);

        silent_logs! {
            assert!(
                SqliteConnection::connect(&format!("sqlite://{}?busy_timeout=soon", DB_PATH))
                    .await
                    .is_err(),
                "The timeout must be a number of milliseconds"
            );
        }
        drop(holder);
        drop(waiter);
        fs::remove_file(DB_PATH)
            .await
            .expect(format!("Failed to remove test database file {}", DB_PATH).as_str());
    }
}
