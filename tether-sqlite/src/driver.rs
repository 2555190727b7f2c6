use crate::{SqliteConnection, SqlitePrepared, SqliteSqlWriter};
use tether_core::{Driver, Result};

#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver {}

impl SqliteDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for SqliteDriver {
    type Executor = SqliteConnection;
    type SqlWriter = SqliteSqlWriter;
    type Prepared = SqlitePrepared;

    const NAME: &'static str = "sqlite";

    fn sql_writer(&self) -> SqliteSqlWriter {
        SqliteSqlWriter {}
    }

    async fn connect(&self, url: &str) -> Result<SqliteConnection> {
        SqliteConnection::connect(url).await
    }
}
