use tether_core::{Context, SqlWriter, Value};

/// Table holding the current value of every emulated sequence.
pub const SEQUENCE_TABLE: &str = "tether_sequence";

/// Sqlite dialect.
///
/// Sqlite has neither schemas nor sequences: the schema becomes a prefix of the table name and
/// sequences are rows of [`SEQUENCE_TABLE`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteSqlWriter {}

impl SqliteSqlWriter {
    pub(crate) fn write_create_sequence_table(&self, out: &mut String) {
        out.push_str("CREATE TABLE IF NOT EXISTS ");
        self.write_identifier_quoted(&mut Context::default(), out, SEQUENCE_TABLE);
        out.push_str(" (\"name\" TEXT PRIMARY KEY, \"value\" INTEGER NOT NULL);");
    }
}

impl SqlWriter for SqliteSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }

    fn write_table_ref(&self, context: &mut Context, out: &mut String, schema: &str, table: &str) {
        out.push('"');
        if !schema.is_empty() {
            self.write_escaped(context, out, schema, '"', "\"\"");
            out.push('.');
        }
        self.write_escaped(context, out, table, '"', "\"\"");
        out.push('"');
    }

    fn write_column_type(&self, _context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Boolean(..) | Value::Int32(..) | Value::Int64(..) => out.push_str("INTEGER"),
            Value::Float64(..) => out.push_str("REAL"),
            Value::Decimal(..) => out.push_str("NUMERIC"),
            Value::Varchar(..) => out.push_str("TEXT"),
            Value::Blob(..) => out.push_str("BLOB"),
            Value::Date(..) | Value::Time(..) | Value::Timestamp(..) | Value::Uuid(..) => {
                out.push_str("TEXT")
            }
            Value::List(..) | Value::Null => {
                log::error!(
                    "Unexpected tether::Value, cannot get the sqlite type from {:?} variant",
                    value
                );
            }
        }
    }

    fn write_create_schema(&self, _out: &mut String, _schema: &str) {
        // Sqlite does not support schema
    }

    fn write_next_value(&self, out: &mut String, sequence: &str) {
        if !out.is_empty() {
            out.push('\n');
        }
        let mut context = Context::default();
        out.push_str("INSERT INTO ");
        self.write_identifier_quoted(&mut context, out, SEQUENCE_TABLE);
        out.push_str(" (\"name\", \"value\") VALUES (");
        self.write_value_string(&mut context, out, sequence);
        out.push_str(", 1)\nON CONFLICT (\"name\") DO UPDATE SET \"value\" = \"value\" + 1\nRETURNING \"value\";");
    }

    fn write_create_sequence(&self, _out: &mut String, _sequence: &str) {
        // Sequences are created on first use
    }

    fn write_drop_sequence(&self, out: &mut String, sequence: &str) {
        if !out.is_empty() {
            out.push('\n');
        }
        let mut context = Context::default();
        out.push_str("DELETE FROM ");
        self.write_identifier_quoted(&mut context, out, SEQUENCE_TABLE);
        out.push_str(" WHERE \"name\" = ");
        self.write_value_string(&mut context, out, sequence);
        out.push(';');
    }
}
