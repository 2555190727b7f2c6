mod connection;
mod driver;
mod prepared;
mod sql_writer;
mod util;
mod value_holder;

pub use connection::*;
pub use driver::*;
pub use prepared::*;
pub use sql_writer::*;
pub(crate) use value_holder::*;
