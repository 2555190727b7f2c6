use crate::{
    Column, Comparison, FieldValue, Marshal, Predicate, Result, Scope, TypeDescriptor,
    Value, possibly_parenthesized, separated_by, try_separated_by, writer::Context,
};

/// Dialect printer converting descriptors and predicates into concrete SQL strings.
///
/// Every method has a default closest to PostgreSQL, drivers override what their backend
/// spells differently.
pub trait SqlWriter: Send + Sync {
    fn as_dyn(&self) -> &dyn SqlWriter;

    /// Escape occurrences of `search` char with `replace` while copying into buffer.
    fn write_escaped(
        &self,
        _context: &mut Context,
        out: &mut String,
        value: &str,
        search: char,
        replace: &str,
    ) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    /// Quote identifiers ("name") doubling inner quotes.
    fn write_identifier_quoted(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(context, out, value, '"', "\"\"");
        out.push('"');
    }

    /// Render a schema qualified table name.
    fn write_table_ref(&self, context: &mut Context, out: &mut String, schema: &str, table: &str) {
        if !schema.is_empty() {
            self.write_identifier_quoted(context, out, schema);
            out.push('.');
        }
        self.write_identifier_quoted(context, out, table);
    }

    /// Render a `schema.Name` sequence name.
    fn write_sequence_ref(&self, context: &mut Context, out: &mut String, sequence: &str) {
        let (schema, name) = sequence.split_once('.').unwrap_or(("", sequence));
        self.write_table_ref(context, out, schema, name);
    }

    fn write_column(&self, context: &mut Context, out: &mut String, column: &Column) {
        self.write_identifier_quoted(context, out, &column.name);
    }

    /// Render the SQL type for a `Value` prototype.
    fn write_column_type(&self, context: &mut Context, out: &mut String, value: &Value) {
        match value {
            Value::Boolean(..) => out.push_str("BOOLEAN"),
            Value::Int32(..) => out.push_str("INTEGER"),
            Value::Int64(..) => out.push_str("BIGINT"),
            Value::Float64(..) => out.push_str("DOUBLE PRECISION"),
            Value::Decimal(..) => out.push_str("DECIMAL"),
            Value::Varchar(..) => out.push_str("VARCHAR"),
            Value::Blob(..) => out.push_str("BLOB"),
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

    /// Render boolean literal.
    fn write_value_bool(&self, _context: &mut Context, out: &mut String, value: bool) {
        out.push_str(["false", "true"][value as usize]);
    }

    /// Render and escape a string literal using single quotes.
    fn write_value_string(&self, context: &mut Context, out: &mut String, value: &str) {
        out.push('\'');
        self.write_escaped(context, out, value, '\'', "''");
        out.push('\'');
    }

    /// Render parameter placeholder (dialect may override).
    fn write_placeholder(&self, context: &mut Context, out: &mut String) {
        context.counter += 1;
        out.push('?');
    }

    /// Precedence of the operator at the root of the predicate.
    fn predicate_precedence(&self, predicate: &Predicate) -> i32 {
        match predicate {
            Predicate::True => 1000,
            Predicate::And(v) | Predicate::Or(v) if v.is_empty() => 1000,
            Predicate::And(v) | Predicate::Or(v) if v.len() == 1 => {
                self.predicate_precedence(&v[0])
            }
            Predicate::Or(..) => 100,
            Predicate::And(..) => 200,
            Predicate::Not(..) => 250,
            _ => 300,
        }
    }

    fn write_comparison(&self, _context: &mut Context, out: &mut String, op: Comparison) {
        out.push_str(match op {
            Comparison::Equals => " = ",
            Comparison::NotEquals => " != ",
            Comparison::Greater => " > ",
            Comparison::GreaterOrEqual => " >= ",
            Comparison::Smaller => " < ",
            Comparison::SmallerOrEqual => " <= ",
        });
    }

    /// Case insensitive match of the column against a pattern.
    fn write_like(
        &self,
        context: &mut Context,
        out: &mut String,
        scope: &mut Scope,
        column: &Column,
        pattern: &str,
    ) {
        out.push_str("LOWER(");
        self.write_column(context, out, column);
        out.push_str(") LIKE LOWER(");
        self.write_placeholder(context, out);
        out.push(')');
        scope.bind(
            &Column {
                marshal: Marshal::Scalar(Value::Varchar(None)),
                ..column.clone()
            },
            FieldValue::Value(Value::Varchar(Some(pattern.into()))),
        );
    }

    /// Render a predicate, collecting its parameters into the scope.
    fn write_predicate(
        &self,
        context: &mut Context,
        out: &mut String,
        scope: &mut Scope,
        predicate: &Predicate,
    ) -> Result<()> {
        match predicate {
            Predicate::True => self.write_value_bool(context, out, true),
            Predicate::And(v) | Predicate::Or(v) => {
                let and = matches!(predicate, Predicate::And(..));
                if v.is_empty() {
                    // Neutral element
                    self.write_value_bool(context, out, and);
                    return Ok(());
                }
                let precedence = self.predicate_precedence(predicate);
                try_separated_by(
                    out,
                    v,
                    |out, v| {
                        possibly_parenthesized!(
                            out,
                            self.predicate_precedence(v) < precedence,
                            self.write_predicate(context, out, scope, v)?
                        );
                        Ok(())
                    },
                    if and { " AND " } else { " OR " },
                )?;
            }
            Predicate::Not(v) => {
                out.push_str("NOT ");
                possibly_parenthesized!(
                    out,
                    self.predicate_precedence(v) <= self.predicate_precedence(predicate),
                    self.write_predicate(context, out, scope, v)?
                );
            }
            Predicate::Compare {
                property,
                op,
                value,
            } => {
                let column = scope.column(property)?;
                self.write_column(context, out, &column);
                match op {
                    Comparison::Equals if value.is_null() => out.push_str(" IS NULL"),
                    Comparison::NotEquals if value.is_null() => out.push_str(" IS NOT NULL"),
                    _ => {
                        self.write_comparison(context, out, *op);
                        self.write_placeholder(context, out);
                        scope.bind(&column, value.clone());
                    }
                }
            }
            Predicate::Between {
                property,
                low,
                high,
            } => {
                let column = scope.column(property)?;
                self.write_column(context, out, &column);
                out.push_str(" BETWEEN ");
                self.write_placeholder(context, out);
                scope.bind(&column, low.clone());
                out.push_str(" AND ");
                self.write_placeholder(context, out);
                scope.bind(&column, high.clone());
            }
            Predicate::Like { property, pattern } => {
                let column = scope.column(property)?;
                self.write_like(context, out, scope, &column, pattern);
            }
            Predicate::In { property, values } => {
                let column = scope.column(property)?;
                if values.is_empty() {
                    self.write_value_bool(context, out, false);
                    return Ok(());
                }
                self.write_column(context, out, &column);
                out.push_str(" IN (");
                separated_by(
                    out,
                    values,
                    |out, v| {
                        self.write_placeholder(context, out);
                        scope.bind(&column, v.clone());
                    },
                    ", ",
                );
                out.push(')');
            }
            Predicate::IsNull { property } => {
                let column = scope.column(property)?;
                self.write_column(context, out, &column);
                out.push_str(" IS NULL");
            }
        }
        Ok(())
    }

    /// Emit SELECT statement (projection, FROM, WHERE).
    fn write_select(
        &self,
        out: &mut String,
        schema: &str,
        columns: &[Column],
        scope: &mut Scope,
        predicate: Option<&Predicate>,
    ) -> Result<()> {
        out.reserve(128 + columns.len() * 32);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("SELECT ");
        let mut context = Context::default();
        separated_by(
            out,
            columns,
            |out, v| self.write_column(&mut context, out, v),
            ", ",
        );
        out.push_str("\nFROM ");
        self.write_table_ref(&mut context, out, schema, scope.descriptor.table_name());
        if let Some(predicate) = predicate {
            out.push_str("\nWHERE ");
            self.write_predicate(&mut context, out, scope, predicate)?;
        }
        out.push(';');
        Ok(())
    }

    /// Emit single row INSERT with one placeholder per column.
    fn write_insert(
        &self,
        out: &mut String,
        schema: &str,
        descriptor: &TypeDescriptor,
        columns: &[Column],
    ) {
        out.reserve(128 + columns.len() * 48);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("INSERT INTO ");
        let mut context = Context::default();
        self.write_table_ref(&mut context, out, schema, descriptor.table_name());
        if columns.is_empty() {
            out.push_str(" DEFAULT VALUES;");
            return;
        }
        out.push_str(" (");
        separated_by(
            out,
            columns,
            |out, v| self.write_column(&mut context, out, v),
            ", ",
        );
        out.push_str(") VALUES\n(");
        separated_by(
            out,
            columns,
            |out, _| self.write_placeholder(&mut context, out),
            ", ",
        );
        out.push_str(");");
    }

    /// Emit UPDATE with one placeholder per assigned column.
    ///
    /// The values of `columns` must already be bound in `scope`, the predicate appends its own.
    fn write_update(
        &self,
        out: &mut String,
        schema: &str,
        columns: &[Column],
        scope: &mut Scope,
        predicate: Option<&Predicate>,
    ) -> Result<()> {
        out.reserve(128 + columns.len() * 32);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("UPDATE ");
        let mut context = Context::default();
        self.write_table_ref(&mut context, out, schema, scope.descriptor.table_name());
        out.push_str(" SET\n");
        separated_by(
            out,
            columns,
            |out, v| {
                self.write_column(&mut context, out, v);
                out.push_str(" = ");
                self.write_placeholder(&mut context, out);
            },
            ",\n",
        );
        if let Some(predicate) = predicate {
            out.push_str("\nWHERE ");
            self.write_predicate(&mut context, out, scope, predicate)?;
        }
        out.push(';');
        Ok(())
    }

    /// Emit DELETE statement with optional WHERE clause.
    fn write_delete(
        &self,
        out: &mut String,
        schema: &str,
        scope: &mut Scope,
        predicate: Option<&Predicate>,
    ) -> Result<()> {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("DELETE FROM ");
        let mut context = Context::default();
        self.write_table_ref(&mut context, out, schema, scope.descriptor.table_name());
        if let Some(predicate) = predicate {
            out.push_str("\nWHERE ");
            self.write_predicate(&mut context, out, scope, predicate)?;
        }
        out.push(';');
        Ok(())
    }

    /// Emit the single row, single column query returning the next value of a sequence.
    fn write_next_value(&self, out: &mut String, sequence: &str) {
        let mut context = Context::default();
        let mut name = String::new();
        self.write_sequence_ref(&mut context, &mut name, sequence);
        out.push_str("SELECT nextval(");
        self.write_value_string(&mut context, out, &name);
        out.push_str(");");
    }

    fn write_create_schema(&self, out: &mut String, schema: &str) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("CREATE SCHEMA IF NOT EXISTS ");
        let mut context = Context::default();
        self.write_identifier_quoted(&mut context, out, schema);
        out.push(';');
    }

    /// Emit CREATE TABLE with typed columns and the primary key.
    fn write_create_table(
        &self,
        out: &mut String,
        schema: &str,
        descriptor: &TypeDescriptor,
        columns: &[Column],
    ) {
        out.reserve(128 + columns.len() * 64);
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("CREATE TABLE IF NOT EXISTS ");
        let mut context = Context::default();
        self.write_table_ref(&mut context, out, schema, descriptor.table_name());
        out.push_str(" (\n");
        let keys: Vec<&Column> = columns
            .iter()
            .filter(|c| descriptor.property(c.property).is_some_and(|p| p.key))
            .collect();
        separated_by(
            out,
            columns,
            |out, v| {
                let single_key = keys.len() == 1 && keys[0].name == v.name;
                self.write_column(&mut context, out, v);
                out.push(' ');
                self.write_column_type(&mut context, out, v.marshal.prototype());
                if single_key {
                    out.push_str(" PRIMARY KEY");
                } else if !v.nullable {
                    out.push_str(" NOT NULL");
                }
            },
            ",\n",
        );
        if keys.len() > 1 {
            out.push_str(",\nPRIMARY KEY (");
            separated_by(
                out,
                keys,
                |out, v| self.write_column(&mut context, out, v),
                ", ",
            );
            out.push(')');
        }
        out.push_str("\n);");
    }

    fn write_create_sequence(&self, out: &mut String, sequence: &str) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("CREATE SEQUENCE IF NOT EXISTS ");
        let mut context = Context::default();
        self.write_sequence_ref(&mut context, out, sequence);
        out.push(';');
    }

    fn write_drop_table(&self, out: &mut String, schema: &str, descriptor: &TypeDescriptor) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("DROP TABLE IF EXISTS ");
        let mut context = Context::default();
        self.write_table_ref(&mut context, out, schema, descriptor.table_name());
        out.push(';');
    }

    fn write_drop_sequence(&self, out: &mut String, sequence: &str) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("DROP SEQUENCE IF EXISTS ");
        let mut context = Context::default();
        self.write_sequence_ref(&mut context, out, sequence);
        out.push(';');
    }
}

/// Fallback generic SQL writer (closest to PostgreSQL conventions).
#[derive(Default)]
pub struct GenericSqlWriter;

impl GenericSqlWriter {
    /// Construct a new generic writer.
    pub fn new() -> Self {
        Self {}
    }
}

impl SqlWriter for GenericSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}
