//! Build-time error types.
//!
//! Every error in this module is fatal for the assembly that raised it: a
//! pipeline that cannot be proven complete at build time is never executed.
//!
//! | Error | Raised when |
//! |---|---|
//! | [`AttrError`] | Two attribute declarations cannot be combined |
//! | [`ResolverError`] | A merge or solve fails for a named context attribute |
//! | [`ProcessorError`] | A processor cannot be matched to its declared contexts |
//! | [`AssemblyError`] | Any of the above, reported with the location stack |

use thiserror::Error;

/// Result type alias using [`AttrError`].
pub type AttrResult<T> = Result<T, AttrError>;

/// Result type alias using [`AssemblyError`].
pub type AssemblyResult<T> = Result<T, AssemblyError>;

/// Attribute declaration conflicts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AttrError {
    /// The attribute declares no acceptable types.
    #[error("Attribute '{name}' declares no types")]
    NoTypes {
        /// Attribute name.
        name: String,
    },

    /// A required attribute is defined only after it is required.
    #[error("Improper order for {required}, it cannot be followed by {defined}")]
    ImproperOrder {
        /// The earlier, required declaration.
        required: String,
        /// The later, defining declaration.
        defined: String,
    },

    /// Intersecting the type sets left nothing.
    #[error("Incompatible types {left} and {right}")]
    IncompatibleTypes {
        /// Left hand declaration types.
        left: String,
        /// Right hand declaration types.
        right: String,
    },

    /// The defined types are not part of the accepted types.
    #[error("Defined types {defined} are not included in {types}")]
    UndeclaredDefinition {
        /// Types produced by defining declarations.
        defined: String,
        /// Types accepted by the merged declaration.
        types: String,
    },

    /// A context redeclares an inherited attribute with incompatible types.
    #[error("Context '{context}' redeclares '{name}' incompatibly: {reason}")]
    Redeclared {
        /// Context name.
        context: String,
        /// Attribute name.
        name: String,
        /// Conflict description.
        reason: String,
    },

    /// The attribute is not declared on the context.
    #[error("Unknown attribute '{name}' for context '{context}'")]
    Unknown {
        /// Context name.
        context: String,
        /// Attribute name.
        name: String,
    },

    /// The assigned value is not of an accepted type.
    #[error("Invalid value of type {actual} for '{context}.{name}', expected {expected}")]
    InvalidValue {
        /// Context name.
        context: String,
        /// Attribute name.
        name: String,
        /// Accepted types.
        expected: String,
        /// Type of the rejected value.
        actual: String,
    },

    /// A REQUIRED attribute cannot be placed on an object context.
    #[error("Attribute '{context}.{name}' is still required and cannot be used for objects")]
    RequiredForObject {
        /// Context name.
        context: String,
        /// Attribute name.
        name: String,
    },
}

impl AttrError {
    /// Creates an unknown attribute error.
    #[must_use]
    pub fn unknown(context: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Unknown {
            context: context.into(),
            name: name.into(),
        }
    }

    /// Creates a redeclaration error.
    #[must_use]
    pub fn redeclared(
        context: impl Into<String>,
        name: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Redeclared {
            context: context.into(),
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Resolver errors, raised while merging or solving named context attributes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// Combining the declarations of a single attribute failed.
    #[error("Cannot {operation} '{context}.{attribute}': {source}")]
    Attribute {
        /// `merge` or `solve`.
        operation: &'static str,
        /// Context name.
        context: String,
        /// Attribute name.
        attribute: String,
        /// Underlying attribute conflict.
        #[source]
        source: AttrError,
    },

    /// A renaming mapping refers to an unknown context.
    #[error("Cannot map context '{from}' to '{to}': {reason}")]
    Mapping {
        /// Source context name.
        from: String,
        /// Target context name.
        to: String,
        /// Problem description.
        reason: String,
    },
}

impl ResolverError {
    /// Wraps an attribute error raised by a merge.
    #[must_use]
    pub fn merge(context: &str, attribute: &str, source: AttrError) -> Self {
        Self::Attribute {
            operation: "merge",
            context: context.to_string(),
            attribute: attribute.to_string(),
            source,
        }
    }

    /// Wraps an attribute error raised by a solve.
    #[must_use]
    pub fn solve(context: &str, attribute: &str, source: AttrError) -> Self {
        Self::Attribute {
            operation: "solve",
            context: context.to_string(),
            attribute: attribute.to_string(),
            source,
        }
    }
}

/// Processor declaration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessorError {
    /// The processor declares no contexts at all.
    #[error("Processor '{processor}' declares no contexts")]
    NoContexts {
        /// Processor name.
        processor: String,
    },

    /// A context name is declared twice on the same processor.
    #[error("Processor '{processor}' already declares a context named '{context}'")]
    DuplicateContext {
        /// Processor name.
        processor: String,
        /// Context name.
        context: String,
    },

    /// A branching processor was given no branches.
    #[error("Branching processor '{processor}' requires at least one branch")]
    NoBranches {
        /// Processor name.
        processor: String,
    },

    /// A declared context is invalid.
    #[error("Processor '{processor}' has an invalid context '{context}': {source}")]
    InvalidContext {
        /// Processor name.
        processor: String,
        /// Context name.
        context: String,
        /// Underlying attribute problem.
        #[source]
        source: AttrError,
    },
}

/// Composite assembly error, carries the location stack of the failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// Attribute conflict.
    #[error(transparent)]
    Attribute(#[from] AttrError),

    /// Resolver conflict.
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// Processor declaration problem.
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    /// Attributes are still required after every processor registered.
    #[error("{scope} '{name}' has unavailable attributes:\n{}", attributes.join("\n"))]
    Unavailable {
        /// `Assembly`, `Routing`, `Using` or `Included`.
        scope: &'static str,
        /// Name of the assembly or branch owner.
        name: String,
        /// Offending attributes as `context.attribute: declaration` lines.
        attributes: Vec<String>,
    },

    /// The named processor is not part of the assembly.
    #[error("Unknown processor '{processor}' in assembly '{assembly}'")]
    UnknownProcessor {
        /// Assembly name.
        assembly: String,
        /// Processor name.
        processor: String,
    },

    /// A failure with the location at which it happened.
    #[error("{source}\n  at {location}")]
    Located {
        /// Location description, usually a processor or branch name.
        location: String,
        /// The located failure.
        #[source]
        source: Box<AssemblyError>,
    },
}

impl AssemblyError {
    /// Creates an unavailable attributes error.
    #[must_use]
    pub fn unavailable(scope: &'static str, name: impl Into<String>, attributes: Vec<String>) -> Self {
        Self::Unavailable {
            scope,
            name: name.into(),
            attributes,
        }
    }

    /// Creates an unknown processor error.
    #[must_use]
    pub fn unknown_processor(assembly: impl Into<String>, processor: impl Into<String>) -> Self {
        Self::UnknownProcessor {
            assembly: assembly.into(),
            processor: processor.into(),
        }
    }

    /// Pushes a location onto this error.
    #[must_use]
    pub fn at(self, location: impl Into<String>) -> Self {
        Self::Located {
            location: location.into(),
            source: Box::new(self),
        }
    }

    /// Returns the error without its location frames.
    pub fn root(&self) -> &Self {
        match self {
            Self::Located { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the location stack, innermost first.
    pub fn locations(&self) -> Vec<&str> {
        let mut locations = Vec::new();
        let mut current = self;
        while let Self::Located { location, source } = current {
            locations.push(location.as_str());
            current = source;
        }
        locations.reverse();
        locations
    }
}
