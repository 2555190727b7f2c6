use crate::{
    AsValue, Column, FieldValue, Instance, Mapped, Marshal, Registry, Result, TypeDescriptor,
    Value,
};
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equals,
    NotEquals,
    Greater,
    GreaterOrEqual,
    Smaller,
    SmallerOrEqual,
}

/// Immutable `where` clause expression tree.
///
/// Leaves name a property of the mapped type, never a column: the column is resolved through
/// the type descriptor when the predicate is written into a statement.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Matches every row.
    True,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    Compare {
        property: String,
        op: Comparison,
        value: FieldValue,
    },
    /// Inclusive on both ends.
    Between {
        property: String,
        low: FieldValue,
        high: FieldValue,
    },
    /// Case insensitive.
    Like { property: String, pattern: String },
    /// An empty list matches no row.
    In {
        property: String,
        values: Vec<FieldValue>,
    },
    IsNull { property: String },
}

impl Predicate {
    pub fn and(self, other: Predicate) -> Predicate {
        and([self, other])
    }
    pub fn or(self, other: Predicate) -> Predicate {
        or([self, other])
    }
}

pub fn and(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::And(predicates.into_iter().collect())
}

pub fn or(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
    Predicate::Or(predicates.into_iter().collect())
}

pub fn not(predicate: Predicate) -> Predicate {
    Predicate::Not(Box::new(predicate))
}

fn compare(
    property: impl Into<String>,
    op: Comparison,
    value: impl Into<FieldValue>,
) -> Predicate {
    Predicate::Compare {
        property: property.into(),
        op,
        value: value.into(),
    }
}

pub fn equals(property: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    compare(property, Comparison::Equals, value)
}

pub fn not_equals(property: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    compare(property, Comparison::NotEquals, value)
}

pub fn greater(property: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    compare(property, Comparison::Greater, value)
}

pub fn greater_or_equal(property: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    compare(property, Comparison::GreaterOrEqual, value)
}

pub fn smaller(property: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    compare(property, Comparison::Smaller, value)
}

pub fn smaller_or_equal(property: impl Into<String>, value: impl Into<FieldValue>) -> Predicate {
    compare(property, Comparison::SmallerOrEqual, value)
}

pub fn between(
    property: impl Into<String>,
    low: impl Into<FieldValue>,
    high: impl Into<FieldValue>,
) -> Predicate {
    Predicate::Between {
        property: property.into(),
        low: low.into(),
        high: high.into(),
    }
}

pub fn like(property: impl Into<String>, pattern: impl Into<String>) -> Predicate {
    Predicate::Like {
        property: property.into(),
        pattern: pattern.into(),
    }
}

pub fn in_list<V: Into<FieldValue>>(
    property: impl Into<String>,
    values: impl IntoIterator<Item = V>,
) -> Predicate {
    Predicate::In {
        property: property.into(),
        values: values.into_iter().map(Into::into).collect(),
    }
}

pub fn is_null(property: impl Into<String>) -> Predicate {
    Predicate::IsNull {
        property: property.into(),
    }
}

/// Equality against another mapped object, compared through its key.
pub fn references<E: Mapped>(property: impl Into<String>, object: &Instance<E>) -> Predicate {
    equals(property, FieldValue::Reference(Some(object.reference())))
}

/// Date range with optional ends.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DateInterval {
    pub start: Option<Value>,
    pub end: Option<Value>,
}

impl DateInterval {
    pub fn new(start: Option<Date>, end: Option<Date>) -> Self {
        Self {
            start: start.map(AsValue::as_value),
            end: end.map(AsValue::as_value),
        }
    }
}

/// Rows whose property falls in the interval, ends included. Open ends are unbounded.
pub fn within(property: impl Into<String>, interval: &DateInterval) -> Predicate {
    match (&interval.start, &interval.end) {
        (Some(start), Some(end)) => between(property, start.clone(), end.clone()),
        (Some(start), None) => greater_or_equal(property, start.clone()),
        (None, Some(end)) => smaller_or_equal(property, end.clone()),
        (None, None) => Predicate::True,
    }
}

/// Parameter collected while writing a statement, bound in order of appearance.
#[derive(Debug, Clone)]
pub struct Binding {
    pub property: &'static str,
    pub marshal: Marshal,
    pub value: FieldValue,
}

/// Resolution context of a statement being written.
pub struct Scope<'a> {
    pub registry: &'a Registry,
    pub descriptor: &'a TypeDescriptor,
    pub bindings: Vec<Binding>,
}

impl<'a> Scope<'a> {
    pub fn new(registry: &'a Registry, descriptor: &'a TypeDescriptor) -> Self {
        Self {
            registry,
            descriptor,
            bindings: Vec::new(),
        }
    }

    pub fn column(&self, property: &str) -> Result<Column> {
        self.descriptor.column(self.registry, property)
    }

    pub fn bind(&mut self, column: &Column, value: FieldValue) {
        self.bindings.push(Binding {
            property: column.property,
            marshal: column.marshal.clone(),
            value,
        });
    }
}
