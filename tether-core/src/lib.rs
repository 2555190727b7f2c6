mod as_value;
mod connection;
mod descriptor;
mod driver;
mod error;
mod executor;
mod lookup;
mod mapped;
mod marshal;
mod parse;
mod predicate;
mod prepared;
mod query;
mod registry;
mod statement;
mod util;
mod value;
mod values;
mod writer;

pub use ::anyhow::Context as ErrorContext;
pub use as_value::*;
pub use connection::*;
pub use descriptor::*;
pub use driver::*;
pub use error::*;
pub use executor::*;
pub use lookup::*;
pub use mapped::*;
pub use marshal::*;
pub use parse::*;
pub use predicate::*;
pub use prepared::*;
pub use query::*;
pub use registry::*;
pub use statement::*;
pub use util::*;
pub use value::*;
pub use values::*;
pub use writer::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;

pub type Result<T> = anyhow::Result<T>;
pub type Error = anyhow::Error;
