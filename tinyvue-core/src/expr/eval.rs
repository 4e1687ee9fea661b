//! Tree-walking interpreter.

use super::ast::{BinaryOp, Expr, LogicalOp, Property, Segment, UnaryOp};
use super::builtins::{call_method, call_value, get_property, global};
use crate::error::EvalError;
use crate::proxy::ReactiveObject;
use crate::value::{Function, Value};

/// Evaluation scope: arrow-function parameters over the bindings context.
#[derive(Clone)]
pub(crate) struct Interpreter {
    bindings: Option<ReactiveObject>,
    locals: Vec<(String, Value)>,
}

impl Interpreter {
    pub(crate) fn new(bindings: Option<ReactiveObject>) -> Self {
        Self {
            bindings,
            locals: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<Value> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(n, _)| n == name) {
            return Some(value.clone());
        }
        if let Some(bindings) = &self.bindings {
            if bindings.contains_key(name) {
                return Some(bindings.get(name));
            }
        }
        global(name)
    }

    pub(crate) fn eval(&self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self
                .lookup(name)
                .ok_or_else(|| EvalError::UndefinedIdentifier { name: name.clone() }),
            Expr::Array(items) => Ok(Value::from(
                items
                    .iter()
                    .map(|e| self.eval(e))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            Expr::Object(entries) => {
                let mut out = Vec::with_capacity(entries.len());
                for (key, value) in entries {
                    out.push((key.clone(), self.eval(value)?));
                }
                Ok(Value::object(out))
            }
            Expr::Template(segments) => {
                let mut text = String::new();
                for segment in segments {
                    match segment {
                        Segment::Text(t) => text.push_str(t),
                        Segment::Expr(e) => text.push_str(&self.eval(e)?.to_string()),
                    }
                }
                Ok(Value::String(text))
            }
            Expr::Member { .. } | Expr::Call { .. } => Ok(self.chain(expr)?.unwrap_or_default()),
            Expr::Unary { op, operand } => {
                if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, operand.as_ref()) {
                    return Ok(Value::from(self.lookup(name).map_or("undefined", |v| v.type_of())));
                }
                let value = self.eval(operand)?;
                Ok(match op {
                    UnaryOp::Not => Value::Bool(!value.is_truthy()),
                    UnaryOp::Neg => Value::Number(-value.to_number()),
                    UnaryOp::Plus => Value::Number(value.to_number()),
                    UnaryOp::TypeOf => Value::from(value.type_of()),
                })
            }
            Expr::Binary { op, left, right } => {
                let l = self.eval(left)?.resolve();
                let r = self.eval(right)?.resolve();
                Ok(binary(*op, &l, &r))
            }
            Expr::Logical { op, left, right } => {
                let l = self.eval(left)?;
                let short_circuit = match op {
                    LogicalOp::And => !l.is_truthy(),
                    LogicalOp::Or => l.is_truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short_circuit {
                    Ok(l)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if self.eval(test)?.is_truthy() {
                    self.eval(consequent)
                } else {
                    self.eval(alternate)
                }
            }
            Expr::Arrow { params, body } => {
                let params = params.clone();
                let body = body.clone();
                let scope = self.clone();
                Ok(Value::Function(Function::named("arrow", move |args| {
                    let mut inner = scope.clone();
                    for (i, param) in params.iter().enumerate() {
                        inner
                            .locals
                            .push((param.clone(), args.get(i).cloned().unwrap_or_default()));
                    }
                    inner.eval(&body)
                })))
            }
        }
    }

    /// Evaluate a member/call chain. `Ok(None)` means an optional link hit
    /// `null`/`undefined` and the rest of the chain was skipped.
    fn chain(&self, expr: &Expr) -> Result<Option<Value>, EvalError> {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
            } => {
                let Some(target) = self.chain(object)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                let key = self.property_key(property)?;
                get_property(&target, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
            } => {
                if let Expr::Member {
                    object,
                    property,
                    optional: member_optional,
                } = callee.as_ref()
                {
                    let Some(target) = self.chain(object)? else {
                        return Ok(None);
                    };
                    if *member_optional && target.is_nullish() {
                        return Ok(None);
                    }
                    let key = self.property_key(property)?;
                    let args = self.arguments(args)?;
                    return call_method(&target, &key, args, *optional);
                }

                let Some(function) = self.chain(callee)? else {
                    return Ok(None);
                };
                if *optional && function.is_nullish() {
                    return Ok(None);
                }
                let args = self.arguments(args)?;
                call_value(&function, &args, &describe(callee)).map(Some)
            }
            other => self.eval(other).map(Some),
        }
    }

    fn property_key(&self, property: &Property) -> Result<String, EvalError> {
        match property {
            Property::Named(name) => Ok(name.clone()),
            Property::Computed(expr) => Ok(self.eval(expr)?.to_string()),
        }
    }

    fn arguments(&self, args: &[Expr]) -> Result<Vec<Value>, EvalError> {
        args.iter().map(|a| self.eval(a)).collect()
    }
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.clone(),
        Expr::Member {
            object,
            property: Property::Named(name),
            ..
        } => format!("{}.{}", describe(object), name),
        Expr::Member { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}

fn is_string_like(value: &Value) -> bool {
    !matches!(
        value,
        Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_)
    )
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    let num = |f: fn(f64, f64) -> f64| Value::Number(f(l.to_number(), r.to_number()));
    let cmp = |f: fn(std::cmp::Ordering) -> bool| {
        let ordering = match (l, r) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => l.to_number().partial_cmp(&r.to_number()),
        };
        Value::Bool(ordering.is_some_and(f))
    };

    match op {
        BinaryOp::Add if is_string_like(l) || is_string_like(r) => {
            Value::String(format!("{l}{r}"))
        }
        BinaryOp::Add => num(|a, b| a + b),
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Rem => num(|a, b| a % b),
        BinaryOp::Lt => cmp(|o| o.is_lt()),
        BinaryOp::Le => cmp(|o| o.is_le()),
        BinaryOp::Gt => cmp(|o| o.is_gt()),
        BinaryOp::Ge => cmp(|o| o.is_ge()),
        BinaryOp::LooseEq => Value::Bool(l.loose_equals(r)),
        BinaryOp::LooseNe => Value::Bool(!l.loose_equals(r)),
        BinaryOp::StrictEq => Value::Bool(l.strict_equals(r)),
        BinaryOp::StrictNe => Value::Bool(!l.strict_equals(r)),
    }
}
