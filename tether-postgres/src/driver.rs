use crate::{PostgresConnection, PostgresPrepared, PostgresSqlWriter};
use tether_core::{Driver, Result};

#[derive(Default, Clone, Copy)]
pub struct PostgresDriver {}

impl PostgresDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for PostgresDriver {
    type Executor = PostgresConnection;
    type SqlWriter = PostgresSqlWriter;
    type Prepared = PostgresPrepared;

    const NAME: &'static str = "postgres";

    fn sql_writer(&self) -> PostgresSqlWriter {
        PostgresSqlWriter {}
    }

    async fn connect(&self, url: &str) -> Result<PostgresConnection> {
        PostgresConnection::connect(url).await
    }
}
