use crate::{CBox, error_message};
use libsqlite3_sys::*;
use rust_decimal::prelude::ToPrimitive;
use std::{
    ffi::{CStr, c_int},
    fmt::{self, Display},
    os::raw::{c_char, c_void},
};
use tether_core::{Error, Format, Prepared, Result, Value, truncate_long};

pub struct SqlitePrepared {
    pub(crate) statement: CBox<*mut sqlite3_stmt>,
    pub(crate) index: u64,
}

impl SqlitePrepared {
    pub(crate) fn new(statement: CBox<*mut sqlite3_stmt>) -> Self {
        unsafe {
            sqlite3_clear_bindings(*statement);
        }
        Self {
            statement,
            index: 0,
        }
    }

    unsafe fn bind_text(&self, index: c_int, value: &str) -> c_int {
        unsafe {
            sqlite3_bind_text(
                *self.statement,
                index,
                value.as_ptr() as *const c_char,
                value.len() as c_int,
                SQLITE_TRANSIENT(),
            )
        }
    }
}

impl Prepared for SqlitePrepared {
    fn bind(&mut self, value: Value) -> Result<&mut Self> {
        self.bind_index(value, self.index)
    }

    fn bind_index(&mut self, value: Value, index: u64) -> Result<&mut Self> {
        // Sqlite parameters start from 1
        let position = index as c_int + 1;
        unsafe {
            let rc = match &value {
                v if v.is_null() => sqlite3_bind_null(*self.statement, position),
                Value::Boolean(Some(v)) => sqlite3_bind_int(*self.statement, position, *v as c_int),
                Value::Int32(Some(v)) => sqlite3_bind_int(*self.statement, position, *v),
                Value::Int64(Some(v)) => sqlite3_bind_int64(*self.statement, position, *v),
                Value::Float64(Some(v)) => sqlite3_bind_double(*self.statement, position, *v),
                Value::Decimal(Some(v)) => sqlite3_bind_double(
                    *self.statement,
                    position,
                    v.to_f64().ok_or_else(|| {
                        Error::msg(format!("Cannot convert the Decimal value `{}` to f64", v))
                    })?,
                ),
                Value::Varchar(Some(v)) => self.bind_text(position, v),
                Value::Blob(Some(v)) => sqlite3_bind_blob(
                    *self.statement,
                    position,
                    v.as_ptr() as *const c_void,
                    v.len() as c_int,
                    SQLITE_TRANSIENT(),
                ),
                Value::Date(Some(v)) => self.bind_text(position, &v.format_text()?),
                Value::Time(Some(v)) => self.bind_text(position, &v.format_text()?),
                Value::Timestamp(Some(v)) => self.bind_text(position, &v.format_text()?),
                Value::Uuid(Some(v)) => self.bind_text(position, &v.to_string()),
                _ => {
                    let error =
                        Error::msg(format!("Cannot use a {:?} as a query parameter", value));
                    log::error!("{:#}", error);
                    return Err(error);
                }
            };
            if rc != SQLITE_OK {
                let db = sqlite3_db_handle(*self.statement);
                let query = sqlite3_sql(*self.statement);
                let error = Error::msg(error_message(db)).context(format!(
                    "Cannot bind parameter {} to query:\n{}",
                    position,
                    truncate_long!(CStr::from_ptr(query).to_string_lossy())
                ));
                log::error!("{:#}", error);
                return Err(error);
            }
        }
        self.index = index + 1;
        Ok(self)
    }
}

impl Display for SqlitePrepared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = unsafe { sqlite3_sql(*self.statement) };
        if sql.is_null() {
            return write!(f, "{:p}", *self.statement);
        }
        let sql = unsafe { CStr::from_ptr(sql) }.to_string_lossy();
        write!(f, "{}", truncate_long!(sql))
    }
}
