use thiserror::Error as ThisError;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

///
/// MappingError
///
/// Raised while building a type descriptor or resolving its marshalling. Always fatal.
///

#[derive(Debug, ThisError)]
pub enum MappingError {
    #[error("Property `{property}` is declared more than once in `{type_name}`")]
    DuplicateProperty {
        type_name: &'static str,
        property: String,
    },

    #[error("Type `{type_name}` does not declare a key-initializing constructor")]
    MissingConstructor { type_name: &'static str },

    #[error("Type `{type_name}` declares more than one key-initializing constructor")]
    AmbiguousConstructor { type_name: &'static str },

    #[error("Type `{type_name}` has no property `{property}`")]
    UnknownProperty {
        type_name: &'static str,
        property: String,
    },

    #[error("Property `{property}` of `{type_name}` has unsupported value type {value_type}")]
    UnsupportedType {
        type_name: &'static str,
        property: String,
        value_type: &'static str,
    },

    #[error("Type `{type_name}` has no key property")]
    MissingKey { type_name: &'static str },

    #[error("Type `{type_name}` has {count} key properties, exactly one is required")]
    MultipleKeys {
        type_name: &'static str,
        count: usize,
    },

    #[error("Type `{type_name}` declares more than one parent")]
    MultipleParents { type_name: &'static str },

    #[error("Property `{property}` expects a reference to `{expected}`, got `{actual}`")]
    ReferenceMismatch {
        property: String,
        expected: &'static str,
        actual: &'static str,
    },
}

///
/// BindingError
///

#[derive(Debug, ThisError)]
pub enum BindingError {
    #[error(
        "Constructor of `{type_name}` expects {expected} for parameter `{parameter}` (position {position}), got {actual}"
    )]
    ArgumentMismatch {
        type_name: &'static str,
        parameter: String,
        position: usize,
        expected: String,
        actual: String,
    },
}

///
/// ExecutionError
///
/// Wraps a driver failure together with what was being executed.
///

#[derive(Debug, ThisError)]
pub enum ExecutionError {
    #[error("Error while executing `{sql}`")]
    Statement {
        sql: String,
        #[source]
        source: BoxedError,
    },

    #[error("Error while reading the rows of `{sql}`")]
    Cursor {
        sql: String,
        #[source]
        source: BoxedError,
    },

    #[error("Error while fetching the next value of sequence `{sequence}`")]
    Sequence {
        sequence: String,
        #[source]
        source: BoxedError,
    },
}
