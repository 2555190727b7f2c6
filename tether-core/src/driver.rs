use crate::{Executor, Prepared, Result, SqlWriter};
use std::future::Future;

/// Database backend: dialect printer, prepared statement type and session factory.
pub trait Driver: Send + Sync + Sized {
    type Executor: Executor<Driver = Self>;
    type SqlWriter: SqlWriter;
    type Prepared: Prepared;

    /// Scheme expected at the start of connection urls.
    const NAME: &'static str;

    fn sql_writer(&self) -> Self::SqlWriter;

    /// Open a live session.
    fn connect(&self, url: &str) -> impl Future<Output = Result<Self::Executor>> + Send;
}
