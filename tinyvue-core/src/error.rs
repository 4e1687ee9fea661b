//! Error types.
//!
//! Failures are fail-fast: nothing in the core retries. Parse errors surface
//! when a template is rendered, evaluation errors surface from the directive
//! effect that evaluated the expression, and context errors surface from the
//! misused helper.

use thiserror::Error;

/// Failure to lex or parse an expression or a template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at offset {offset} in `{source_text}`")]
    UnexpectedChar {
        ch: char,
        offset: usize,
        source_text: String,
    },

    #[error("unexpected token {found} at offset {offset} in `{source_text}`")]
    UnexpectedToken {
        found: String,
        offset: usize,
        source_text: String,
    },

    #[error("unexpected end of expression `{source_text}`")]
    UnexpectedEnd { source_text: String },

    #[error("unterminated string literal at offset {offset} in `{source_text}`")]
    UnterminatedString { offset: usize, source_text: String },

    #[error("{message} at offset {offset} in `{source_text}`")]
    Syntax {
        message: String,
        offset: usize,
        source_text: String,
    },

    #[error("unterminated {construct} in template at offset {offset}")]
    UnterminatedMarkup {
        construct: &'static str,
        offset: usize,
    },
}

/// Failure while evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{name} is not defined")]
    UndefinedIdentifier { name: String },

    #[error("cannot read properties of {target} (reading '{property}')")]
    PropertyOfNullish { target: String, property: String },

    #[error("{callee} is not a function")]
    NotCallable { callee: String },

    #[error("{function} expects {expected} argument(s), got {got}")]
    Arity {
        function: String,
        expected: usize,
        got: usize,
    },

    #[error("type error: {message}")]
    Type { message: String },

    #[error("{message}")]
    Handler { message: String },
}

impl EvalError {
    /// Error raised by application code called from a template.
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler {
            message: message.into(),
        }
    }
}

/// A definition-scoped helper used outside the component definition call.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextError {
    #[error("function {helper} must be called inside the component definition")]
    OutsideDefinition { helper: &'static str },

    #[error("component `{component}` has already rendered a template")]
    AlreadyRendered { component: String },
}

/// Failure of a render pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error("malformed v-for expression `{expression}`, expected `item in source`")]
    MalformedFor { expression: String },

    #[error("unknown component `{name}`")]
    UnknownComponent { name: String },
}
