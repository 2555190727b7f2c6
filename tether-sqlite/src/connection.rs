use crate::{
    CBox, SqliteDriver, SqlitePrepared, error_message,
    extract::{extract_name, extract_value},
};
use async_stream::try_stream;
use libsqlite3_sys::{
    SQLITE_DONE, SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI,
    SQLITE_ROW, sqlite3, sqlite3_busy_timeout, sqlite3_changes,
    sqlite3_column_count, sqlite3_db_handle, sqlite3_finalize, sqlite3_last_insert_rowid,
    sqlite3_open_v2, sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt,
};
use std::{
    ffi::{c_char, c_int},
    pin::pin,
    ptr,
    sync::atomic::{AtomicPtr, Ordering},
};

// libsqlite3-sys 0.35 blocklists this binding; the symbol is in the bundled library.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}
use tether_core::{
    Driver, Error, ErrorContext, Executor, Query, QueryResult, Result, Row, RowLabeled, RowNames,
    RowsAffected, as_c_string,
    future::Either,
    stream::{Stream, StreamExt, TryStreamExt},
    truncate_long,
};
use tokio::task::spawn_blocking;

pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
}

/// Milliseconds a statement waits on a lock held by another connection before failing.
pub const BUSY_TIMEOUT: c_int = 5000;

/// The `busy_timeout` url parameter, or [`BUSY_TIMEOUT`].
fn busy_timeout(url: &str) -> Result<c_int> {
    let Some((_, query)) = url.split_once('?') else {
        return Ok(BUSY_TIMEOUT);
    };
    match query
        .split('&')
        .filter_map(|v| v.split_once('='))
        .find(|(k, _)| *k == "busy_timeout")
    {
        Some((_, v)) => v
            .parse::<c_int>()
            .with_context(|| format!("Invalid busy_timeout `{}`", v)),
        None => Ok(BUSY_TIMEOUT),
    }
}

/// Prepare the first statement of `sql` (nul terminated), returning it with the number of bytes
/// consumed. The statement is null when only whitespace or comments were consumed.
fn prepare_statement(
    connection: *mut sqlite3,
    sql: &[u8],
) -> Result<(CBox<*mut sqlite3_stmt>, usize)> {
    unsafe {
        let mut statement = CBox::new(ptr::null_mut(), |p| {
            sqlite3_finalize(p);
        });
        let start = sql.as_ptr() as *const c_char;
        let mut tail = ptr::null();
        let rc = sqlite3_prepare_v2(
            connection,
            start,
            sql.len() as c_int,
            &mut *statement,
            &mut tail,
        );
        if rc != SQLITE_OK {
            return Err(Error::msg(error_message(connection)));
        }
        let consumed = if tail.is_null() {
            sql.len()
        } else {
            tail.offset_from(start) as usize
        };
        Ok((statement, consumed))
    }
}

/// Step through the statement yielding its rows, or the affected count when it returns none.
fn run_statement(
    statement: CBox<*mut sqlite3_stmt>,
) -> impl Stream<Item = Result<QueryResult>> + Send {
    try_stream! {
        let count = unsafe { sqlite3_column_count(*statement) };
        let labels = (0..count)
            .map(|i| extract_name(*statement, i))
            .collect::<Result<RowNames>>()?;
        loop {
            let rc = unsafe { sqlite3_step(*statement) };
            match rc {
                SQLITE_DONE => break,
                SQLITE_ROW => {
                    let values = (0..count)
                        .map(|i| extract_value(*statement, i))
                        .collect::<Result<Row>>()?;
                    yield QueryResult::Row(RowLabeled::new(labels.clone(), values));
                }
                _ => {
                    let error = Error::msg(error_message(unsafe { sqlite3_db_handle(*statement) }));
                    Err::<(), _>(error)?;
                }
            }
        }
        if count == 0 {
            let (rows_affected, last_affected_id) = unsafe {
                let db = sqlite3_db_handle(*statement);
                (sqlite3_changes(db) as u64, sqlite3_last_insert_rowid(db))
            };
            yield QueryResult::Affected(RowsAffected {
                rows_affected,
                last_affected_id: Some(last_affected_id),
            });
        }
    }
}

impl SqliteConnection {
    /// Open `sqlite://path?mode=rwc` (any Sqlite URI filename parameter is accepted) or
    /// `sqlite://:memory:`. `busy_timeout=<ms>` overrides [`BUSY_TIMEOUT`].
    pub async fn connect(url: &str) -> Result<SqliteConnection> {
        let prefix = format!("{}://", SqliteDriver::NAME);
        let Some(path) = url.strip_prefix(&prefix) else {
            let error = Error::msg(format!(
                "Expected sqlite connection url to start with `{}`",
                &prefix
            ));
            log::error!("{:#}", error);
            return Err(error);
        };
        let context = || format!("While trying to connect to `{}`", truncate_long!(url));
        let timeout = busy_timeout(path).with_context(context)?;
        let path = as_c_string(format!("file:{}", path)).with_context(context)?;
        let mut connection = CBox::new(ptr::null_mut(), |p| {
            unsafe { sqlite3_close_v2(p) };
        });
        let rc = unsafe {
            sqlite3_open_v2(
                path.as_ptr(),
                &mut *connection,
                SQLITE_OPEN_URI | SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE,
                ptr::null(),
            )
        };
        if rc != SQLITE_OK {
            let error = Error::msg(error_message(*connection)).context(context());
            log::error!("{:#}", error);
            return Err(error);
        }
        // Lock contention is waited out inside sqlite3_step, which then reports SQLITE_BUSY as an error
        unsafe { sqlite3_busy_timeout(*connection, timeout) };
        let mut result = Self { connection };
        let mut sql = String::new();
        result
            .driver()
            .sql_writer()
            .write_create_sequence_table(&mut sql);
        result
            .execute(Query::Raw(sql))
            .await
            .with_context(context)?;
        Ok(result)
    }

    pub(crate) fn run_unprepared(
        &mut self,
        sql: String,
    ) -> impl Stream<Item = Result<QueryResult>> + Send {
        let connection = CBox::new(*self.connection, |_| {});
        try_stream! {
            let sql = as_c_string(sql)?;
            let sql = sql.as_bytes_with_nul();
            let end = sql.len() - 1;
            let mut offset = 0;
            while offset < end {
                let (statement, consumed) = prepare_statement(*connection, &sql[offset..])?;
                if consumed == 0 {
                    break;
                }
                offset += consumed;
                if statement.is_null() {
                    continue;
                }
                let mut stream = pin!(run_statement(statement));
                while let Some(value) = stream.next().await.transpose()? {
                    yield value;
                }
            }
        }
    }
}

impl Executor for SqliteConnection {
    type Driver = SqliteDriver;

    fn driver(&self) -> &Self::Driver {
        &SqliteDriver {}
    }

    async fn prepare(&mut self, sql: String) -> Result<Query<Self::Driver>> {
        let connection = AtomicPtr::new(*self.connection);
        let context = format!("While preparing the query:\n{}", truncate_long!(sql));
        let prepared = spawn_blocking(move || {
            let connection = connection.load(Ordering::Relaxed);
            let sql = as_c_string(sql)?;
            let sql = sql.as_bytes_with_nul();
            let (statement, consumed) = prepare_statement(connection, sql)?;
            if sql[consumed..]
                .iter()
                .any(|c| *c != 0 && !c.is_ascii_whitespace())
            {
                return Err(Error::msg("Cannot prepare more than one statement at a time"));
            }
            if statement.is_null() {
                return Err(Error::msg("The query does not contain any statement"));
            }
            Ok(statement)
        })
        .await?
        .map_err(|e| {
            let e = e.context(context);
            log::error!("{:#}", e);
            e
        })?;
        Ok(SqlitePrepared::new(prepared).into())
    }

    fn run(
        &mut self,
        query: Query<Self::Driver>,
    ) -> impl Stream<Item = Result<QueryResult>> + Send {
        let context = format!("While running the query:\n{}", query);
        match query {
            Query::Raw(sql) => Either::Left(self.run_unprepared(sql)),
            Query::Prepared(prepared) => Either::Right(run_statement(prepared.statement)),
        }
        .map_err(move |e: Error| {
            let e = e.context(context.clone());
            log::error!("{:#}", e);
            e
        })
    }
}
