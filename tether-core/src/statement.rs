use crate::{
    Binding, BoxedError, Column, Error, ExecutionError, Executor, FieldValue, Initialization,
    Predicate, Query, Registry, Result, RowLabeled, RowsAffected, Scope, SqlWriter,
    TypeDescriptor, stream::TryStreamExt, truncate_long,
};
use std::mem;

/// SQL text together with the values of its placeholders.
///
/// Prepared, executed and dropped within the operation that built it.
#[derive(Debug)]
pub struct Statement {
    pub sql: String,
    /// In placeholder order.
    pub bindings: Vec<Binding>,
    /// Projection of a select, in the order columns appear in each row.
    pub columns: Vec<Column>,
}

impl Statement {
    fn failure(&self, e: Error) -> Error {
        let source: BoxedError = e.into();
        let e = Error::new(ExecutionError::Statement {
            sql: self.sql.clone(),
            source,
        });
        log::error!("{:#}", e);
        e
    }

    /// Prepare the statement and bind its values.
    pub async fn prepare<X: Executor>(&mut self, executor: &mut X) -> Result<Query<X::Driver>> {
        log::debug!("{}", truncate_long!(self.sql));
        let mut query = executor
            .prepare(self.sql.clone())
            .await
            .map_err(|e| self.failure(e))?;
        if let Query::Prepared(prepared) = &mut query {
            for (index, binding) in mem::take(&mut self.bindings).into_iter().enumerate() {
                let property = binding.property;
                binding
                    .marshal
                    .bind(prepared, index as u64, property, binding.value)
                    .map_err(|e| {
                        e.context(format!("While binding property `{}`", property))
                    })?;
            }
        }
        Ok(query)
    }

    pub async fn execute<X: Executor>(&mut self, executor: &mut X) -> Result<RowsAffected> {
        let query = self.prepare(executor).await?;
        executor.execute(query).await.map_err(|e| self.failure(e))
    }

    /// Run the statement and collect every row.
    pub async fn fetch<X: Executor>(&mut self, executor: &mut X) -> Result<Vec<RowLabeled>> {
        let query = self.prepare(executor).await?;
        executor.fetch(query).try_collect().await.map_err(|e| {
            let source: BoxedError = e.into();
            let e = Error::new(ExecutionError::Cursor {
                sql: self.sql.clone(),
                source,
            });
            log::error!("{:#}", e);
            e
        })
    }
}

/// Builds the statements of one mapped type in one dialect.
pub struct StatementBuilder<'a> {
    writer: &'a dyn SqlWriter,
    registry: &'a Registry,
    descriptor: &'a TypeDescriptor,
    schema: &'a str,
}

impl<'a> StatementBuilder<'a> {
    pub fn new(
        writer: &'a dyn SqlWriter,
        registry: &'a Registry,
        descriptor: &'a TypeDescriptor,
        schema: &'a str,
    ) -> Self {
        Self {
            writer,
            registry,
            descriptor,
            schema,
        }
    }

    fn scope(&self) -> Scope<'a> {
        Scope::new(self.registry, self.descriptor)
    }

    /// Single row insert of the given columns.
    pub fn insert(&self, values: Vec<(Column, FieldValue)>) -> Statement {
        let mut scope = self.scope();
        let mut columns = Vec::with_capacity(values.len());
        for (column, value) in values {
            scope.bind(&column, value);
            columns.push(column);
        }
        let mut sql = String::new();
        self.writer
            .write_insert(&mut sql, self.schema, self.descriptor, &columns);
        Statement {
            sql,
            bindings: scope.bindings,
            columns: Vec::new(),
        }
    }

    /// Every persistent column of the rows matching the predicate.
    pub fn select(&self, predicate: Option<&Predicate>) -> Result<Statement> {
        let columns = self.descriptor.columns(self.registry)?;
        let mut scope = self.scope();
        let mut sql = String::new();
        self.writer
            .write_select(&mut sql, self.schema, &columns, &mut scope, predicate)?;
        Ok(Statement {
            sql,
            bindings: scope.bindings,
            columns,
        })
    }

    /// Assign the given columns on the rows matching the predicate.
    pub fn update(
        &self,
        values: Vec<(Column, FieldValue)>,
        predicate: Option<&Predicate>,
    ) -> Result<Statement> {
        let mut scope = self.scope();
        let mut columns = Vec::with_capacity(values.len());
        for (column, value) in values {
            scope.bind(&column, value);
            columns.push(column);
        }
        let mut sql = String::new();
        self.writer
            .write_update(&mut sql, self.schema, &columns, &mut scope, predicate)?;
        Ok(Statement {
            sql,
            bindings: scope.bindings,
            columns: Vec::new(),
        })
    }

    pub fn delete(&self, predicate: Option<&Predicate>) -> Result<Statement> {
        let mut scope = self.scope();
        let mut sql = String::new();
        self.writer
            .write_delete(&mut sql, self.schema, &mut scope, predicate)?;
        Ok(Statement {
            sql,
            bindings: scope.bindings,
            columns: Vec::new(),
        })
    }

    /// Table, schema and sequences backing the type, one statement each.
    ///
    /// Dialects lacking schemas or sequences write nothing for them, those are skipped.
    pub fn create_table(&self) -> Result<Vec<String>> {
        let columns = self.descriptor.columns(self.registry)?;
        let mut result = Vec::new();
        if !self.schema.is_empty() {
            let mut sql = String::new();
            self.writer.write_create_schema(&mut sql, self.schema);
            result.push(sql);
        }
        let mut sql = String::new();
        self.writer
            .write_create_table(&mut sql, self.schema, self.descriptor, &columns);
        result.push(sql);
        for sequence in self.sequences() {
            let mut sql = String::new();
            self.writer.write_create_sequence(&mut sql, &sequence);
            result.push(sql);
        }
        result.retain(|v| !v.is_empty());
        Ok(result)
    }

    pub fn drop_table(&self) -> Vec<String> {
        let mut result = Vec::new();
        let mut sql = String::new();
        self.writer
            .write_drop_table(&mut sql, self.schema, self.descriptor);
        result.push(sql);
        for sequence in self.sequences() {
            let mut sql = String::new();
            self.writer.write_drop_sequence(&mut sql, &sequence);
            result.push(sql);
        }
        result.retain(|v| !v.is_empty());
        result
    }

    /// Sequences of the auto-increment properties.
    pub fn sequences(&self) -> Vec<String> {
        self.descriptor
            .persistent()
            .filter(|v| v.initialization == Initialization::AutoIncrement)
            .map(|v| self.descriptor.sequence_name(self.schema, v.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::StatementBuilder;
    use crate::{
        Arguments, FieldValue, GenericSqlWriter, Mapped, PropertyDescriptor, Registry, Result,
        TypeDescriptor, Value, equals, like,
    };

    struct Note;

    impl Mapped for Note {
        fn type_name() -> &'static str {
            "Note"
        }
        fn describe(registry: &Registry) -> Result<TypeDescriptor> {
            TypeDescriptor::builder::<Self>()
                .property(
                    PropertyDescriptor::value("id", Value::Int64(None))
                        .key()
                        .auto_increment(),
                )
                .property(PropertyDescriptor::value("text", Value::Varchar(None)))
                .constructor(&["id"])
                .build(registry)
        }
        fn construct(_arguments: &mut Arguments) -> Result<Self> {
            Ok(Note)
        }
        fn get(&self, _property: &str) -> Option<FieldValue> {
            None
        }
        fn set(&mut self, _property: &str, _value: FieldValue) -> Result<bool> {
            Ok(false)
        }
    }

    #[test]
    fn bindings_follow_placeholders() {
        let registry = Registry::new();
        let descriptor = registry.descriptor_for::<Note>().unwrap();
        let writer = GenericSqlWriter::new();
        let builder = StatementBuilder::new(&writer, &registry, &descriptor, "");
        let text = descriptor.column(&registry, "text").unwrap();
        let statement = builder
            .update(
                vec![(text, "hello".into())],
                Some(&equals("id", 5_i64).and(like("text", "h%"))),
            )
            .unwrap();
        assert_eq!(
            statement.sql,
            "UPDATE \"note\" SET\n\"text\" = ?\nWHERE \"id\" = ? AND LOWER(\"text\") LIKE LOWER(?);"
        );
        let properties: Vec<_> = statement.bindings.iter().map(|v| v.property).collect();
        assert_eq!(properties, ["text", "id", "text"]);
        assert_eq!(builder.sequences(), ["NoteId"]);
    }
}
