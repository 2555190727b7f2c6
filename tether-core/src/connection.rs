use crate::{
    Column, Driver, Error, ExecutionError, Executor, FieldValue, Initialization, Instance,
    Lookups, Mapped, MappingError, Marshal, Predicate, Query, Registry, Result, RowLabeled,
    RowsAffected, SqlWriter, StatementBuilder, TypeDescriptor, Value, Values, and, equals,
    mapped::materialize, truncate_long,
};
use std::{
    any::TypeId,
    collections::{HashMap, HashSet},
    sync::Arc,
};

/// Rows read on behalf of a lookup, waiting to be materialized.
struct Loaded {
    target: TypeId,
    descriptor: Arc<TypeDescriptor>,
    key: Value,
    columns: Vec<Column>,
    rows: Vec<RowLabeled>,
}

/// Database session plus the identity caches living as long as it.
///
/// Every operation takes `&mut self`: one connection serves one task at a time, concurrent
/// workers open a connection each.
pub struct Connection<X: Executor> {
    executor: X,
    registry: Arc<Registry>,
    lookups: Lookups,
}

impl<X: Executor> Connection<X> {
    pub fn new(executor: X, registry: Arc<Registry>) -> Self {
        Self {
            executor,
            registry,
            lookups: Lookups::new(),
        }
    }

    /// Connect through the driver and wrap the resulting session.
    pub async fn open<D>(driver: &D, url: &str, registry: Arc<Registry>) -> Result<Self>
    where
        D: Driver<Executor = X>,
    {
        let executor = driver.connect(url).await?;
        log::debug!("Connected to {}", D::NAME);
        Ok(Self::new(executor, registry))
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The underlying session, for raw statements.
    pub fn executor(&mut self) -> &mut X {
        &mut self.executor
    }

    pub fn lookups(&self) -> &Lookups {
        &self.lookups
    }

    /// Track the instances of `E` by key. The type must have exactly one key property.
    pub fn register_identity_cache<E: Mapped>(&mut self) -> Result<()> {
        let descriptor = self.registry.descriptor_for::<E>()?;
        let key = descriptor.single_key().map_err(|e| {
            log::error!("{:#}", e);
            e
        })?;
        let marshal = Marshal::resolve(&self.registry, E::type_name(), key)?;
        self.lookups
            .register::<E>(key.name, marshal.prototype().clone());
        Ok(())
    }

    /// Cached instance of `E` with the given key, `None` if not cached or `E` is not tracked.
    pub fn lookup<E: Mapped>(&self, key: impl Into<Value>) -> Option<Instance<E>> {
        self.lookups.cache::<E>()?.get(&key.into())
    }

    /// Insert a row built from `values` and return the materialized object.
    ///
    /// Auto-increment properties not given a value draw one from their sequence. The object is
    /// built through its constructor, the remaining values are assigned through the setters.
    pub async fn insert<E: Mapped>(&mut self, schema: &str, values: Values) -> Result<Instance<E>> {
        let descriptor = self.registry.descriptor_for::<E>()?;
        let mut values: HashMap<String, FieldValue> = values
            .into_iter()
            .filter(|(name, _)| {
                let known = descriptor.property(name).is_some();
                if !known {
                    log::warn!(
                        "Type `{}` has no property `{}`, the value is ignored",
                        E::type_name(),
                        name
                    );
                }
                known
            })
            .collect();
        let generated: Vec<&'static str> = descriptor
            .persistent()
            .filter(|v| v.initialization == Initialization::AutoIncrement)
            .filter(|v| values.get(v.name).is_none_or(FieldValue::is_null))
            .map(|v| v.name)
            .collect();
        for name in generated {
            let id = self
                .next_id(&descriptor.sequence_name(schema, name))
                .await?;
            values.insert(name.into(), id.into());
        }
        let columns = descriptor
            .persistent()
            .filter(|v| !v.computed)
            .map(|v| {
                let column = descriptor.column(&self.registry, v.name)?;
                let value = values
                    .get(v.name)
                    .cloned()
                    .unwrap_or_else(|| FieldValue::Value(column.marshal.prototype().as_null()));
                Ok((column, value))
            })
            .collect::<Result<Vec<_>>>()?;
        let mut statement = {
            let writer = self.executor.driver().sql_writer();
            StatementBuilder::new(writer.as_dyn(), &self.registry, &descriptor, schema)
                .insert(columns)
        };
        statement.execute(&mut self.executor).await?;
        let instance = materialize::<E>(&descriptor, values)?;
        self.remember(&descriptor, &instance)?;
        Ok(instance)
    }

    /// Same as [`Connection::insert`], returning `None` instead of failing.
    pub async fn try_insert<E: Mapped>(
        &mut self,
        schema: &str,
        values: Values,
    ) -> Option<Instance<E>> {
        match self.insert::<E>(schema, values).await {
            Ok(v) => Some(v),
            Err(e) => {
                log::warn!("Insert of `{}` failed: {:#}", E::type_name(), e);
                None
            }
        }
    }

    /// Write every writable property of the object to its row, found by key.
    pub async fn update<E: Mapped>(
        &mut self,
        schema: &str,
        object: &Instance<E>,
    ) -> Result<RowsAffected> {
        self.update_object(schema, object, None).await
    }

    /// Write only the named properties of the object.
    pub async fn update_properties<E: Mapped>(
        &mut self,
        schema: &str,
        object: &Instance<E>,
        properties: &[&str],
    ) -> Result<RowsAffected> {
        self.update_object(schema, object, Some(properties)).await
    }

    async fn update_object<E: Mapped>(
        &mut self,
        schema: &str,
        object: &Instance<E>,
        only: Option<&[&str]>,
    ) -> Result<RowsAffected> {
        let descriptor = self.registry.descriptor_for::<E>()?;
        if let Some(only) = only {
            for name in only.iter().filter(|v| descriptor.property(v).is_none()) {
                log::warn!("Type `{}` has no property `{}`", E::type_name(), name);
            }
        }
        let (set, predicate) = {
            let object = object.read();
            let set = descriptor
                .persistent()
                .filter(|v| v.writable && !v.key && !v.computed)
                .filter(|v| only.is_none_or(|only| only.contains(&v.name)))
                .map(|v| {
                    Ok((
                        descriptor.column(&self.registry, v.name)?,
                        object.get(v.name).unwrap_or(FieldValue::Value(Value::Null)),
                    ))
                })
                .filter(|v| match v {
                    Ok((column, FieldValue::Reference(None))) => !self.is_untracked(column),
                    _ => true,
                })
                .collect::<Result<Vec<(Column, FieldValue)>>>()?;
            (set, key_predicate(&descriptor, &*object)?)
        };
        if set.is_empty() {
            log::debug!("Nothing to update on `{}`", E::type_name());
            return Ok(RowsAffected::default());
        }
        let mut statement = {
            let writer = self.executor.driver().sql_writer();
            StatementBuilder::new(writer.as_dyn(), &self.registry, &descriptor, schema)
                .update(set, Some(&predicate))?
        };
        statement.execute(&mut self.executor).await
    }

    /// Assign `values` on every row matching the predicate, or on every row when `None`.
    ///
    /// Cached instances are not refreshed.
    pub async fn update_where<E: Mapped>(
        &mut self,
        schema: &str,
        values: Values,
        predicate: Option<&Predicate>,
    ) -> Result<RowsAffected> {
        let descriptor = self.registry.descriptor_for::<E>()?;
        let mut set = Vec::with_capacity(values.len());
        for (name, value) in values {
            match descriptor.property(&name) {
                Some(v) if v.persistent && !v.computed => {
                    set.push((descriptor.column(&self.registry, v.name)?, value));
                }
                _ => log::warn!(
                    "Property `{}` of `{}` is not updatable, the value is ignored",
                    name,
                    E::type_name()
                ),
            }
        }
        if set.is_empty() {
            log::debug!("Nothing to update on `{}`", E::type_name());
            return Ok(RowsAffected::default());
        }
        let mut statement = {
            let writer = self.executor.driver().sql_writer();
            StatementBuilder::new(writer.as_dyn(), &self.registry, &descriptor, schema)
                .update(set, predicate)?
        };
        statement.execute(&mut self.executor).await
    }

    /// Delete the row of the object, found by key. The identity cache is left untouched.
    pub async fn delete<E: Mapped>(
        &mut self,
        schema: &str,
        object: &Instance<E>,
    ) -> Result<RowsAffected> {
        let descriptor = self.registry.descriptor_for::<E>()?;
        let predicate = key_predicate(&descriptor, &*object.read())?;
        self.delete_matching::<E>(schema, &descriptor, Some(&predicate))
            .await
    }

    pub async fn delete_where<E: Mapped>(
        &mut self,
        schema: &str,
        predicate: &Predicate,
    ) -> Result<RowsAffected> {
        let descriptor = self.registry.descriptor_for::<E>()?;
        self.delete_matching::<E>(schema, &descriptor, Some(predicate))
            .await
    }

    pub async fn delete_all<E: Mapped>(&mut self, schema: &str) -> Result<RowsAffected> {
        let descriptor = self.registry.descriptor_for::<E>()?;
        self.delete_matching::<E>(schema, &descriptor, None).await
    }

    async fn delete_matching<E: Mapped>(
        &mut self,
        schema: &str,
        descriptor: &TypeDescriptor,
        predicate: Option<&Predicate>,
    ) -> Result<RowsAffected> {
        let mut statement = {
            let writer = self.executor.driver().sql_writer();
            StatementBuilder::new(writer.as_dyn(), &self.registry, descriptor, schema)
                .delete(predicate)?
        };
        statement.execute(&mut self.executor).await
    }

    /// Objects whose rows match the predicate.
    ///
    /// Rows of an identity-cached type already seen by this connection update and return the
    /// cached instance.
    pub async fn select<E: Mapped>(
        &mut self,
        schema: &str,
        predicate: &Predicate,
    ) -> Result<Vec<Instance<E>>> {
        self.select_matching(schema, Some(predicate)).await
    }

    pub async fn select_all<E: Mapped>(&mut self, schema: &str) -> Result<Vec<Instance<E>>> {
        self.select_matching(schema, None).await
    }

    /// The object matching the predicate, `None` unless exactly one row matches.
    pub async fn select_one<E: Mapped>(
        &mut self,
        schema: &str,
        predicate: &Predicate,
    ) -> Result<Option<Instance<E>>> {
        let mut result = self.select::<E>(schema, predicate).await?;
        Ok(if result.len() == 1 { result.pop() } else { None })
    }

    async fn select_matching<E: Mapped>(
        &mut self,
        schema: &str,
        predicate: Option<&Predicate>,
    ) -> Result<Vec<Instance<E>>> {
        let descriptor = self.registry.descriptor_for::<E>()?;
        let mut statement = {
            let writer = self.executor.driver().sql_writer();
            StatementBuilder::new(writer.as_dyn(), &self.registry, &descriptor, schema)
                .select(predicate)?
        };
        let rows = statement.fetch(&mut self.executor).await?;
        self.load_references(schema, &statement.columns, &rows)
            .await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let values = self.extract(&statement.columns, row)?;
            result.push(self.reconcile::<E>(&descriptor, values)?);
        }
        Ok(result)
    }

    /// Property values of a row, in the order of `columns`.
    fn extract(&self, columns: &[Column], row: RowLabeled) -> Result<HashMap<String, FieldValue>> {
        if row.values.len() != columns.len() {
            return Err(Error::msg(format!(
                "Expected {} columns, the row has {}",
                columns.len(),
                row.values.len(),
            )));
        }
        let mut values = HashMap::with_capacity(columns.len());
        for (column, value) in columns.iter().zip(row.values.into_vec()) {
            let value = column
                .marshal
                .extract(value, column.nullable, &self.lookups)
                .map_err(|e| e.context(format!("While reading column `{}`", column.name)))?;
            values.insert(column.property.to_string(), value);
        }
        Ok(values)
    }

    /// Read the rows that `rows` reference through lookups of tracked types and that are not
    /// cached yet, so that every lookup resolves to its instance.
    ///
    /// Referenced rows are looked for in the same schema.
    async fn load_references(
        &mut self,
        schema: &str,
        columns: &[Column],
        rows: &[RowLabeled],
    ) -> Result<()> {
        let mut queued = HashSet::new();
        let mut pending = Vec::new();
        self.missing_references(columns, rows, &mut queued, &mut pending)?;
        let mut loaded = Vec::new();
        while let Some((target, key)) = pending.pop() {
            let (Some(descriptor), Some(name)) =
                (self.registry.get(target), self.lookups.key_of(target))
            else {
                continue;
            };
            let mut statement = {
                let writer = self.executor.driver().sql_writer();
                StatementBuilder::new(writer.as_dyn(), &self.registry, &descriptor, schema)
                    .select(Some(&equals(name, key.clone())))?
            };
            let rows = statement.fetch(&mut self.executor).await?;
            if rows.is_empty() {
                log::warn!(
                    "`{}` with key `{}` is referenced but does not exist",
                    descriptor.type_name(),
                    key
                );
                continue;
            }
            self.missing_references(&statement.columns, &rows, &mut queued, &mut pending)?;
            loaded.push(Loaded {
                target,
                descriptor,
                key,
                columns: statement.columns,
                rows,
            });
        }
        // Rows read last are referenced by the earlier ones. The second pass resolves the
        // references between rows that were all missing.
        for _ in 0..2 {
            for v in loaded.iter().rev() {
                for row in &v.rows {
                    let values = self.extract(&v.columns, row.clone())?;
                    self.lookups
                        .reconcile(v.target, &v.descriptor, v.key.clone(), values)?;
                }
            }
        }
        Ok(())
    }

    /// Queue the lookup keys of tracked types that are neither cached nor queued already.
    fn missing_references(
        &self,
        columns: &[Column],
        rows: &[RowLabeled],
        queued: &mut HashSet<(TypeId, Value)>,
        pending: &mut Vec<(TypeId, Value)>,
    ) -> Result<()> {
        for (i, column) in columns.iter().enumerate() {
            let Marshal::Lookup {
                target, prototype, ..
            } = &column.marshal
            else {
                continue;
            };
            if !self.lookups.is_registered(*target) {
                continue;
            }
            for value in rows.iter().filter_map(|v| v.values.get(i)) {
                let key = value.clone().try_as(prototype)?;
                if key.is_null() || self.lookups.reference(*target, &key).is_some() {
                    continue;
                }
                if queued.insert((*target, key.clone())) {
                    pending.push((*target, key));
                }
            }
        }
        Ok(())
    }

    /// A lookup to a type without identity cache never resolves, its column is not written
    /// back from an empty property.
    fn is_untracked(&self, column: &Column) -> bool {
        match &column.marshal {
            Marshal::Lookup { target, .. } => !self.lookups.is_registered(*target),
            Marshal::Scalar(..) => false,
        }
    }

    /// Update the cached instance with the row values or materialize a new one.
    fn reconcile<E: Mapped>(
        &mut self,
        descriptor: &TypeDescriptor,
        values: HashMap<String, FieldValue>,
    ) -> Result<Instance<E>> {
        let Some(key) = self.lookups.cache::<E>().map(|v| v.key()) else {
            return materialize::<E>(descriptor, values);
        };
        let key = self.key_value(descriptor, key, values.get(key).cloned())?;
        match self.lookups.cache_mut::<E>() {
            Some(cache) => cache.reconcile(descriptor, key, values),
            None => materialize::<E>(descriptor, values),
        }
    }

    fn remember<E: Mapped>(
        &mut self,
        descriptor: &TypeDescriptor,
        instance: &Instance<E>,
    ) -> Result<()> {
        let Some(key) = self.lookups.cache::<E>().map(|v| v.key()) else {
            return Ok(());
        };
        let value = self.key_value(descriptor, key, instance.get(key))?;
        if let Some(cache) = self.lookups.cache_mut::<E>() {
            cache.insert(value, instance.clone())?;
        }
        Ok(())
    }

    fn key_value(
        &self,
        descriptor: &TypeDescriptor,
        key: &'static str,
        value: Option<FieldValue>,
    ) -> Result<Value> {
        let column = descriptor.column(&self.registry, key)?;
        column
            .marshal
            .to_value(key, value.unwrap_or(FieldValue::Value(Value::Null)))
    }

    /// Next value of the sequence.
    pub async fn next_id(&mut self, sequence: &str) -> Result<i64> {
        self.executor.next_value(sequence).await.map_err(|e| {
            let e = Error::new(ExecutionError::Sequence {
                sequence: sequence.into(),
                source: e.into(),
            });
            log::error!("{:#}", e);
            e
        })
    }

    /// Create the schema, the table and the sequences backing `E`.
    pub async fn create_table<E: Mapped>(&mut self, schema: &str) -> Result<()> {
        let descriptor = self.registry.descriptor_for::<E>()?;
        let statements = {
            let writer = self.executor.driver().sql_writer();
            StatementBuilder::new(writer.as_dyn(), &self.registry, &descriptor, schema)
                .create_table()?
        };
        self.execute_all(statements).await
    }

    /// Drop the table and the sequences backing `E`.
    pub async fn drop_table<E: Mapped>(&mut self, schema: &str) -> Result<()> {
        let descriptor = self.registry.descriptor_for::<E>()?;
        let statements = {
            let writer = self.executor.driver().sql_writer();
            StatementBuilder::new(writer.as_dyn(), &self.registry, &descriptor, schema)
                .drop_table()
        };
        self.execute_all(statements).await
    }

    async fn execute_all(&mut self, statements: Vec<String>) -> Result<()> {
        for sql in statements {
            log::debug!("{}", truncate_long!(sql));
            if let Err(e) = self.executor.execute(Query::Raw(sql.clone())).await {
                let e = Error::new(ExecutionError::Statement {
                    sql,
                    source: e.into(),
                });
                log::error!("{:#}", e);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Drop the identity caches and release the session.
    pub async fn close(mut self) -> Result<()> {
        log::debug!("Closing connection, {} cached objects dropped", self.lookups.len());
        self.lookups.clear();
        self.executor.disconnect().await
    }
}

/// Equality on every key property of the object.
fn key_predicate<E: Mapped>(descriptor: &TypeDescriptor, object: &E) -> Result<Predicate> {
    let keys: Vec<Predicate> = descriptor
        .keys()
        .map(|v| {
            equals(
                v.name,
                object.get(v.name).unwrap_or(FieldValue::Value(Value::Null)),
            )
        })
        .collect();
    if keys.is_empty() {
        return Err(MappingError::MissingKey {
            type_name: E::type_name(),
        }
        .into());
    }
    Ok(and(keys))
}
