//! Expression Evaluator
//!
//! Template directives carry small script expressions: `count + 1`,
//! `items.filter(i => i.done).length`, `{ active: isActive }`. This module
//! compiles such a string once into a syntax tree and evaluates it against a
//! bindings context as often as the owning effect re-runs.
//!
//! # How Evaluation Works
//!
//! 1. The source is tokenized and parsed with `chumsky` combinators into an
//!    [`Expression`]; operator precedence comes from a pratt table.
//!
//! 2. [`Expression::bind`] pairs the tree with a bindings context and returns
//!    an [`Evaluator`] closure. No caching: every call walks the tree.
//!
//! 3. Free identifiers resolve against arrow-function parameters first, then
//!    the bindings context (a tracked read, so the surrounding effect
//!    subscribes to that property), then the global builtins. Anything else
//!    fails with [`EvalError::UndefinedIdentifier`].
//!
//! # Grammar
//!
//! Literals (numbers, strings, template literals, `true`, `false`, `null`,
//! `undefined`, `NaN`, `Infinity`), array and object literals, member access
//! (`a.b`, `a[b]`, `a?.b`), calls and method calls, arrow functions with
//! expression bodies, unary `! - + typeof`, binary arithmetic, comparison and
//! equality operators, `&& || ??`, and the ternary operator. There is no
//! assignment, `new` or statement syntax.

mod ast;
mod builtins;
mod eval;
mod lexer;
mod parser;

use std::fmt;
use std::sync::Arc;

use crate::error::{EvalError, ParseError};
use crate::proxy::ReactiveObject;
use crate::value::Value;

use ast::Expr;
use eval::Interpreter;

/// A compiled expression bound to its context: call it to evaluate.
pub type Evaluator = Arc<dyn Fn() -> Result<Value, EvalError> + Send + Sync>;

/// A parsed expression, cheap to clone.
#[derive(Clone)]
pub struct Expression {
    source: Arc<str>,
    ast: Arc<Expr>,
}

impl Expression {
    /// Parse `source`.
    pub fn compile(source: &str) -> Result<Self, ParseError> {
        let ast = parser::parse(source)?;
        tracing::trace!(expression = source, "compiled expression");
        Ok(Self {
            source: Arc::from(source),
            ast: Arc::new(ast),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against `bindings`, tracking every bindings read.
    pub fn evaluate(&self, bindings: &ReactiveObject) -> Result<Value, EvalError> {
        Interpreter::new(Some(bindings.clone())).eval(&self.ast)
    }

    /// Evaluate with only the builtins in scope.
    pub fn evaluate_detached(&self) -> Result<Value, EvalError> {
        Interpreter::new(None).eval(&self.ast)
    }

    /// Bind to a context, producing a zero-argument evaluator.
    pub fn bind(&self, bindings: &ReactiveObject) -> Evaluator {
        let expression = self.clone();
        let bindings = bindings.clone();
        Arc::new(move || expression.evaluate(&bindings))
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Expression").field(&self.source).finish()
    }
}

/// Compile `source` and bind it to `bindings` in one step.
///
/// # Example
///
/// ```rust
/// use tinyvue_core::{evaluate_expression, reactive, Value};
///
/// let data = reactive([Value::object([("count", Value::from(2))])]);
/// let doubled = evaluate_expression("count * 2", &data).unwrap();
/// assert_eq!(doubled().unwrap(), Value::from(4));
/// ```
pub fn evaluate_expression(source: &str, bindings: &ReactiveObject) -> Result<Evaluator, ParseError> {
    Ok(Expression::compile(source)?.bind(bindings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::reactive;
    use crate::reactive::Effect;
    use crate::value::Function;
    use std::sync::atomic::{AtomicI32, Ordering};

    fn data() -> ReactiveObject {
        reactive([Value::object([
            ("count", Value::from(2)),
            ("name", Value::from("John")),
            (
                "items",
                Value::array([
                    Value::object([("title", "a".into()), ("done", true.into())]),
                    Value::object([("title", "b".into()), ("done", false.into())]),
                ]),
            ),
            ("user", Value::Null),
        ])])
    }

    fn eval(source: &str) -> Result<Value, EvalError> {
        Expression::compile(source).unwrap().evaluate(&data())
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("count + 1 * 3").unwrap(), Value::from(5));
        assert_eq!(eval("(count + 1) * 3").unwrap(), Value::from(9));
        assert_eq!(eval("10 % 4 - -1").unwrap(), Value::from(3));
    }

    #[test]
    fn string_concatenation_and_templates() {
        assert_eq!(eval("'Hello ' + name").unwrap(), Value::from("Hello John"));
        assert_eq!(eval("count + '1'").unwrap(), Value::from("21"));
        assert_eq!(eval("`${name} has ${count}`").unwrap(), Value::from("John has 2"));
    }

    #[test]
    fn comparison_logic_and_ternary() {
        assert_eq!(eval("count > 1 && name === 'John'").unwrap(), Value::Bool(true));
        assert_eq!(eval("count == '2'").unwrap(), Value::Bool(true));
        assert_eq!(eval("count === '2'").unwrap(), Value::Bool(false));
        assert_eq!(eval("user ?? 'guest'").unwrap(), Value::from("guest"));
        assert_eq!(eval("user || count").unwrap(), Value::from(2));
        assert_eq!(eval("count ? 'yes' : 'no'").unwrap(), Value::from("yes"));
        assert_eq!(eval("!count").unwrap(), Value::Bool(false));
    }

    #[test]
    fn object_and_array_literals() {
        assert_eq!(
            eval("{ active: count > 1, hidden: false }").unwrap(),
            Value::object([("active", Value::Bool(true)), ("hidden", Value::Bool(false))])
        );
        assert_eq!(
            eval("[count, name]").unwrap(),
            Value::array([Value::from(2), Value::from("John")])
        );
    }

    #[test]
    fn members_methods_and_arrows() {
        assert_eq!(eval("items.length").unwrap(), Value::from(2));
        assert_eq!(eval("items[0].title").unwrap(), Value::from("a"));
        assert_eq!(
            eval("items.filter(i => !i.done).map(i => i.title.toUpperCase())").unwrap(),
            Value::array([Value::from("B")])
        );
        assert_eq!(
            eval("items.reduce((n, i) => n + (i.done ? 1 : 0), 0)").unwrap(),
            Value::from(1)
        );
        assert_eq!(eval("name.length").unwrap(), Value::from(4));
    }

    #[test]
    fn builtins_are_in_scope() {
        assert_eq!(eval("Math.max(count, 7)").unwrap(), Value::from(7));
        assert_eq!(eval("JSON.stringify({ a: count })").unwrap(), Value::from(r#"{"a":2}"#));
        assert_eq!(eval("Object.keys({ x: 1, y: 2 }).join('-')").unwrap(), Value::from("x-y"));
        assert_eq!(eval("(3.14159).toFixed(2)").unwrap(), Value::from("3.14"));
        assert_eq!(eval("parseInt('12px') + 1").unwrap(), Value::from(13));
    }

    #[test]
    fn optional_chaining_short_circuits() {
        assert_eq!(eval("user?.name").unwrap(), Value::Undefined);
        assert_eq!(eval("user?.name.first").unwrap(), Value::Undefined);
        assert_eq!(eval("user?.greet()").unwrap(), Value::Undefined);
    }

    #[test]
    fn errors_are_reported() {
        assert_eq!(
            eval("missing + 1"),
            Err(EvalError::UndefinedIdentifier {
                name: "missing".into()
            })
        );
        assert!(matches!(
            eval("user.name"),
            Err(EvalError::PropertyOfNullish { .. })
        ));
        assert!(matches!(eval("count()"), Err(EvalError::NotCallable { .. })));
        assert_eq!(eval("typeof missing").unwrap(), Value::from("undefined"));
    }

    #[test]
    fn calls_functions_from_bindings() {
        let bindings = reactive([Value::object([(
            "greet",
            Function::named("greet", |args| {
                Ok(Value::String(format!("Hi {}", args.first().cloned().unwrap_or_default())))
            })
            .into(),
        )])]);
        let evaluator = evaluate_expression("greet('Ann')", &bindings).unwrap();
        assert_eq!(evaluator().unwrap(), Value::from("Hi Ann"));
    }

    #[test]
    fn evaluator_reads_are_tracked() {
        let bindings = data();
        let evaluator = evaluate_expression("count * 10", &bindings).unwrap();
        let seen = Arc::new(AtomicI32::new(0));

        let s = seen.clone();
        let _effect = Effect::new(move || {
            if let Ok(v) = evaluator() {
                s.store(v.to_number() as i32, Ordering::SeqCst);
            }
        });
        assert_eq!(seen.load(Ordering::SeqCst), 20);

        bindings.set("count", 5.into());
        assert_eq!(seen.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn reactive_list_mutators_work_in_expressions() {
        let bindings = reactive([Value::object([(
            "list",
            Value::Reactive(reactive([Value::array([1.into()])])),
        )])]);
        let push = evaluate_expression("list.push(2, 3)", &bindings).unwrap();
        assert_eq!(push().unwrap(), Value::from(3));
        let sum = evaluate_expression("list.reduce((a, b) => a + b)", &bindings).unwrap();
        assert_eq!(sum().unwrap(), Value::from(6));
    }

    #[test]
    fn compile_errors_surface_early() {
        assert!(Expression::compile("a +").is_err());
        assert!(evaluate_expression("(", &data()).is_err());
    }
}
