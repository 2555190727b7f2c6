use std::fmt::Write;
use tether_core::{Column, Context, FieldValue, Marshal, Scope, SqlWriter, Value};

/// PostgreSQL dialect: numbered placeholders, native arrays and `ILIKE`.
#[derive(Default, Clone, Copy)]
pub struct PostgresSqlWriter {}

impl SqlWriter for PostgresSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn write_column_type(&self, context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Boolean(..) => out.push_str("BOOLEAN"),
            Value::Int32(..) => out.push_str("INTEGER"),
            Value::Int64(..) => out.push_str("BIGINT"),
            Value::Float64(..) => out.push_str("DOUBLE PRECISION"),
            Value::Decimal(..) => out.push_str("NUMERIC"),
            Value::Varchar(..) => out.push_str("TEXT"),
            Value::Blob(..) => out.push_str("BYTEA"),
            Value::Date(..) => out.push_str("DATE"),
            Value::Time(..) => out.push_str("TIME"),
            Value::Timestamp(..) => out.push_str("TIMESTAMP"),
            Value::Uuid(..) => out.push_str("UUID"),
            Value::List(.., inner) => {
                self.write_column_type(context, out, inner);
                out.push_str("[]");
            }
            Value::Null => log::error!("Unexpected tether::Value, untyped null has no sql type"),
        };
    }

    fn write_placeholder(&self, context: &mut Context, out: &mut String) {
        context.counter += 1;
        let _ = write!(out, "${}", context.counter);
    }

    fn write_like(
        &self,
        context: &mut Context,
        out: &mut String,
        scope: &mut Scope,
        column: &Column,
        pattern: &str,
    ) {
        self.write_column(context, out, column);
        out.push_str(" ILIKE ");
        self.write_placeholder(context, out);
        scope.bind(
            &Column {
                marshal: Marshal::Scalar(Value::Varchar(None)),
                ..column.clone()
            },
            FieldValue::Value(Value::Varchar(Some(pattern.into()))),
        );
    }
}
