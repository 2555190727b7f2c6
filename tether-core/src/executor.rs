use crate::{
    AsValue, Driver, Error, Query, QueryResult, Result, RowLabeled, RowsAffected, SqlWriter,
    stream::{Stream, StreamExt, TryStreamExt},
};
use std::future::Future;

/// Live database session as seen by the engine.
///
/// Drivers implement `prepare` and `run`, everything else has a default built on them.
pub trait Executor: Send + Sized {
    type Driver: Driver;

    fn driver(&self) -> &Self::Driver;

    /// Prepare a parameterized statement.
    fn prepare(&mut self, sql: String)
    -> impl Future<Output = Result<Query<Self::Driver>>> + Send;

    /// General method to send any query and return any result type (either row or count)
    fn run(&mut self, query: Query<Self::Driver>)
    -> impl Stream<Item = Result<QueryResult>> + Send;

    /// Execute the query and returns the rows.
    fn fetch(
        &mut self,
        query: Query<Self::Driver>,
    ) -> impl Stream<Item = Result<RowLabeled>> + Send {
        self.run(query).filter_map(|v| async move {
            match v {
                Ok(QueryResult::Row(v)) => Some(Ok(v)),
                Err(e) => Some(Err(e)),
                _ => None,
            }
        })
    }

    /// Execute the query and return the total number of rows affected.
    fn execute(
        &mut self,
        query: Query<Self::Driver>,
    ) -> impl Future<Output = Result<RowsAffected>> + Send {
        self.run(query)
            .filter_map(|v| async move {
                match v {
                    Ok(QueryResult::Affected(v)) => Some(Ok(v)),
                    Err(e) => Some(Err(e)),
                    _ => None,
                }
            })
            .try_collect()
    }

    /// Draw the next value of a sequence.
    fn next_value(&mut self, sequence: &str) -> impl Future<Output = Result<i64>> + Send {
        let mut sql = String::new();
        self.driver()
            .sql_writer()
            .write_next_value(&mut sql, sequence);
        async move {
            let query = self.prepare(sql).await?;
            let rows: Vec<RowLabeled> = self.fetch(query).try_collect().await?;
            let value = rows
                .into_iter()
                .next()
                .and_then(|row| row.values.into_vec().into_iter().next())
                .ok_or_else(|| {
                    Error::msg(format!("Sequence `{}` did not return any value", sequence))
                })?;
            i64::try_from_value(value)
        }
    }

    /// Release the session.
    fn disconnect(self) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}
