mod cbox;
mod connection;
mod driver;
mod extract;
mod prepared;
mod sql_writer;

use libsqlite3_sys::{sqlite3, sqlite3_errmsg};
use std::ffi::CStr;

pub(crate) use cbox::*;
pub use connection::*;
pub use driver::*;
pub use prepared::*;
pub use sql_writer::*;

/// Last error reported on the database handle.
pub(crate) fn error_message(db: *mut sqlite3) -> String {
    unsafe {
        let message = sqlite3_errmsg(db);
        if message.is_null() {
            "Unknown error (could not extract the error message)".into()
        } else {
            CStr::from_ptr(message).to_string_lossy().into_owned()
        }
    }
}
