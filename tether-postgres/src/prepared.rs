use crate::{ValueHolder, postgres_type_to_value};
use std::{
    fmt::{self, Display},
    mem,
};
use tether_core::{Error, Prepared, Result, Value};
use tokio_postgres::Statement;

pub struct PostgresPrepared {
    pub(crate) statement: Statement,
    pub(crate) index: u64,
    pub(crate) params: Vec<Option<Value>>,
}

impl PostgresPrepared {
    pub(crate) fn new(statement: Statement) -> Self {
        let mut params = Vec::new();
        params.resize_with(statement.params().len(), Default::default);
        Self {
            statement,
            index: 0,
            params,
        }
    }

    /// Every parameter converted to the type the server inferred for it.
    pub(crate) fn take_params(&mut self) -> Result<Vec<ValueHolder>> {
        let types = self.statement.params();
        mem::take(&mut self.params)
            .into_iter()
            .zip(types)
            .enumerate()
            .map(|(i, (value, ty))| {
                let Some(value) = value else {
                    return Err(Error::msg(format!("The parameter {} was not set", i + 1)));
                };
                Ok(ValueHolder(value.try_as(&postgres_type_to_value(ty))?))
            })
            .collect()
    }
}

impl Prepared for PostgresPrepared {
    fn bind(&mut self, value: Value) -> Result<&mut Self> {
        self.bind_index(value, self.index)
    }

    fn bind_index(&mut self, value: Value, index: u64) -> Result<&mut Self> {
        let len = self.params.len();
        let Some(param) = self.params.get_mut(index as usize) else {
            return Err(Error::msg(format!(
                "Parameter index {} out of range, the statement has {} parameters",
                index, len
            )));
        };
        *param = Some(value);
        self.index = index + 1;
        Ok(self)
    }
}

impl Display for PostgresPrepared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.statement)
    }
}
