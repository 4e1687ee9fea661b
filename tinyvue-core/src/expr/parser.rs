//! Parser producing an [`Expr`] tree from the token stream.
//!
//! Postfix chains (`.name`, `?.name`, `[index]`, `(args)`) are folded onto
//! the primary expression; unary and binary operators go through a pratt
//! table; the ternary wraps the result.

use std::sync::Arc;

use chumsky::error::RichReason;
use chumsky::{input::ValueInput, pratt::*, prelude::*};

use super::ast::{BinaryOp, Expr, LogicalOp, Property, Segment, UnaryOp};
use super::lexer::{tokenize, Span, TemplatePiece, Token};
use crate::error::ParseError;
use crate::value::{format_number, Value};

type ParseExtra<'src> = extra::Err<Rich<'src, Token<'src>, Span>>;

#[derive(Debug, Clone, Copy)]
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

enum Access {
    Member(String, bool),
    Index(Expr, bool),
    Call(Vec<Expr>, bool),
}

fn op<'src, I>(punct: &'static str) -> impl Parser<'src, I, Token<'src>, ParseExtra<'src>> + Clone
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    just(Token::Punct(punct))
}

fn combine(left: Expr, op: Infix, right: Expr) -> Expr {
    let (left, right) = (Box::new(left), Box::new(right));
    match op {
        Infix::Binary(op) => Expr::Binary { op, left, right },
        Infix::Logical(op) => Expr::Logical { op, left, right },
    }
}

fn apply(object: Expr, access: Access) -> Expr {
    let object = Box::new(object);
    match access {
        Access::Member(name, optional) => Expr::Member {
            object,
            property: Property::Named(name),
            optional,
        },
        Access::Index(index, optional) => Expr::Member {
            object,
            property: Property::Computed(Box::new(index)),
            optional,
        },
        Access::Call(args, optional) => Expr::Call {
            callee: object,
            args,
            optional,
        },
    }
}

fn template(pieces: Vec<TemplatePiece<'_>>) -> Result<Expr, ParseError> {
    pieces
        .into_iter()
        .map(|piece| match piece {
            TemplatePiece::Text(text) => Ok(Segment::Text(text)),
            TemplatePiece::Hole(source) => parse(source).map(Segment::Expr),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Expr::Template)
}

pub(crate) fn parser<'src, I>() -> impl Parser<'src, I, Expr, ParseExtra<'src>>
where
    I: ValueInput<'src, Token = Token<'src>, Span = Span>,
{
    recursive(|expression| {
        let ident = select! { Token::Ident(name) => name };

        let literal = select! {
            Token::Number(n) => Expr::Literal(Value::Number(n)),
            Token::Str(s) => Expr::Literal(Value::String(s)),
        };

        let template_literal = select! { Token::Template(pieces) => pieces }
            .try_map(|pieces, span| template(pieces).map_err(|err| Rich::custom(span, err.to_string())));

        let word = ident.map(|name: &str| match name {
            "true" => Expr::Literal(Value::Bool(true)),
            "false" => Expr::Literal(Value::Bool(false)),
            "null" => Expr::Literal(Value::Null),
            "undefined" => Expr::Literal(Value::Undefined),
            "NaN" => Expr::Literal(Value::Number(f64::NAN)),
            "Infinity" => Expr::Literal(Value::Number(f64::INFINITY)),
            _ => Expr::Ident(name.to_string()),
        });

        let list = |close: &'static str| {
            expression
                .clone()
                .separated_by(op(","))
                .allow_trailing()
                .collect::<Vec<_>>()
                .then_ignore(op(close))
        };

        let array = op("[").ignore_then(list("]")).map(Expr::Array);

        let object = {
            let key = choice((
                ident.map(|name: &str| (name.to_string(), true)),
                select! {
                    Token::Str(s) => (s, false),
                    Token::Number(n) => (format_number(n), false),
                },
            ));
            let entry = key
                .then(op(":").ignore_then(expression.clone()).or_not())
                .try_map(|((key, shorthand), value), span| match value {
                    Some(value) => Ok((key, value)),
                    None if shorthand => Ok((key.clone(), Expr::Ident(key))),
                    None => Err(Rich::custom(span, format!("expected `:` after key `{key}`"))),
                });

            entry
                .separated_by(op(","))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(op("{"), op("}"))
                .map(Expr::Object)
        };

        let arrow = {
            let params = choice((
                ident.map(|name: &str| vec![name.to_string()]),
                ident
                    .map(str::to_string)
                    .separated_by(op(","))
                    .collect::<Vec<_>>()
                    .delimited_by(op("("), op(")")),
            ));
            params
                .then_ignore(op("=>"))
                .then(expression.clone())
                .map(|(params, body)| Expr::Arrow {
                    params: params.into(),
                    body: Arc::new(body),
                })
        };

        let nested = expression.clone().delimited_by(op("("), op(")"));

        let atom = choice((arrow, literal, template_literal, array, object, nested, word)).boxed();

        let index = expression.clone().delimited_by(op("["), op("]"));
        let args = op("(").ignore_then(list(")"));
        let access = choice((
            op(".").ignore_then(ident).map(|name: &str| Access::Member(name.to_string(), false)),
            op("?.").ignore_then(choice((
                args.clone().map(|args| Access::Call(args, true)),
                index.clone().map(|index| Access::Index(index, true)),
                ident.map(|name: &str| Access::Member(name.to_string(), true)),
            ))),
            index.map(|index| Access::Index(index, false)),
            args.map(|args| Access::Call(args, false)),
        ));

        let chain = atom.foldl(access.repeated(), apply).boxed();

        let unary = choice((
            op("!").to(UnaryOp::Not),
            op("-").to(UnaryOp::Neg),
            op("+").to(UnaryOp::Plus),
            select! { Token::Ident("typeof") => UnaryOp::TypeOf },
        ));
        let multiplicative = choice((
            op("*").to(BinaryOp::Mul),
            op("/").to(BinaryOp::Div),
            op("%").to(BinaryOp::Rem),
        ))
        .map(Infix::Binary);
        let additive = choice((op("+").to(BinaryOp::Add), op("-").to(BinaryOp::Sub))).map(Infix::Binary);
        let relational = choice((
            op("<").to(BinaryOp::Lt),
            op("<=").to(BinaryOp::Le),
            op(">").to(BinaryOp::Gt),
            op(">=").to(BinaryOp::Ge),
        ))
        .map(Infix::Binary);
        let equality = choice((
            op("==").to(BinaryOp::LooseEq),
            op("!=").to(BinaryOp::LooseNe),
            op("===").to(BinaryOp::StrictEq),
            op("!==").to(BinaryOp::StrictNe),
        ))
        .map(Infix::Binary);

        let operators = chain.pratt((
            prefix(8, unary, |op, operand, _| Expr::Unary {
                op,
                operand: Box::new(operand),
            }),
            infix(left(7), multiplicative, |l, op, r, _| combine(l, op, r)),
            infix(left(6), additive, |l, op, r, _| combine(l, op, r)),
            infix(left(5), relational, |l, op, r, _| combine(l, op, r)),
            infix(left(4), equality, |l, op, r, _| combine(l, op, r)),
            infix(left(3), op("&&").to(Infix::Logical(LogicalOp::And)), |l, op, r, _| {
                combine(l, op, r)
            }),
            infix(left(2), op("||").to(Infix::Logical(LogicalOp::Or)), |l, op, r, _| {
                combine(l, op, r)
            }),
            infix(left(1), op("??").to(Infix::Logical(LogicalOp::Nullish)), |l, op, r, _| {
                combine(l, op, r)
            }),
        ));

        operators
            .then(
                op("?")
                    .ignore_then(expression.clone())
                    .then_ignore(op(":"))
                    .then(expression)
                    .or_not(),
            )
            .map(|(test, branches)| match branches {
                Some((consequent, alternate)) => Expr::Conditional {
                    test: Box::new(test),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                },
                None => test,
            })
    })
}

pub(crate) fn parse(source: &str) -> Result<Expr, ParseError> {
    let tokens = tokenize(source)?;
    let end_of_input = Span::from(source.len()..source.len());

    let result = parser()
        .parse(tokens.as_slice().map(end_of_input, |(token, span)| (token, span)))
        .into_result()
        .map_err(|errors| syntax_error(source, errors));
    result
}

fn syntax_error(source: &str, errors: Vec<Rich<'_, Token<'_>, Span>>) -> ParseError {
    let source_text = source.to_string();
    let Some(error) = errors.into_iter().next() else {
        return ParseError::UnexpectedEnd { source_text };
    };
    let offset = error.span().start;

    if let RichReason::Custom(message) = error.reason() {
        return ParseError::Syntax {
            message: message.clone(),
            offset,
            source_text,
        };
    }
    match error.found() {
        Some(token) => ParseError::UnexpectedToken {
            found: token.describe(),
            offset,
            source_text,
        },
        None => ParseError::UnexpectedEnd { source_text },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        let expr = parse("1 + 2 * 3").unwrap();
        let Expr::Binary { op, right, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Add);
        assert!(matches!(*right, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn subtraction_is_left_associative() {
        let expr = parse("10 - 4 - 3").unwrap();
        let Expr::Binary { left, .. } = expr else {
            panic!("expected binary");
        };
        assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
    }

    #[test]
    fn unary_binds_tighter_than_binary() {
        let Expr::Binary { op, left, .. } = parse("-a * b").unwrap() else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Mul);
        assert!(matches!(*left, Expr::Unary { op: UnaryOp::Neg, .. }));
        assert!(matches!(
            parse("!item.done").unwrap(),
            Expr::Unary { op: UnaryOp::Not, .. }
        ));
        assert!(matches!(
            parse("typeof missing").unwrap(),
            Expr::Unary { op: UnaryOp::TypeOf, .. }
        ));
    }

    #[test]
    fn parses_ternary_and_logical() {
        assert!(matches!(
            parse("a && b ? 'x' : 'y'").unwrap(),
            Expr::Conditional { .. }
        ));
        assert!(matches!(
            parse("a ?? b || c").unwrap(),
            Expr::Logical { op: LogicalOp::Nullish, .. }
        ));
    }

    #[test]
    fn parses_member_chains_and_calls() {
        let expr = parse("items.filter(x => x.done).length").unwrap();
        let Expr::Member { object, property, .. } = expr else {
            panic!("expected member");
        };
        assert!(matches!(property, Property::Named(ref n) if n == "length"));
        assert!(matches!(*object, Expr::Call { .. }));
    }

    #[test]
    fn parses_optional_chaining_forms() {
        assert!(matches!(
            parse("user?.name").unwrap(),
            Expr::Member { optional: true, .. }
        ));
        assert!(matches!(
            parse("user?.['name']").unwrap(),
            Expr::Member { optional: true, property: Property::Computed(_), .. }
        ));
        assert!(matches!(
            parse("user?.greet()").unwrap(),
            Expr::Call { .. }
        ));
        assert!(matches!(
            parse("greet?.()").unwrap(),
            Expr::Call { optional: true, .. }
        ));
    }

    #[test]
    fn parses_arrow_parameter_lists() {
        for source in ["() => 1", "(a) => a", "(a, b) => a + b", "a => a"] {
            assert!(
                matches!(parse(source).unwrap(), Expr::Arrow { .. }),
                "{source}"
            );
        }
        let Expr::Arrow { params, .. } = parse("(a, b) => a").unwrap() else {
            unreachable!()
        };
        assert_eq!(&*params, &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn parenthesized_expression_is_not_an_arrow() {
        assert!(matches!(parse("(a)").unwrap(), Expr::Ident(ref n) if n == "a"));
    }

    #[test]
    fn parses_object_literals() {
        let Expr::Object(entries) = parse("{ active: isActive, 'text-danger': err, count }").unwrap()
        else {
            panic!("expected object");
        };
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["active", "text-danger", "count"]);
    }

    #[test]
    fn parses_template_holes_as_expressions() {
        let Expr::Template(segments) = parse("`n = ${ n + 1 }`").unwrap() else {
            panic!("expected template");
        };
        assert!(matches!(segments[0], Segment::Text(ref t) if t == "n = "));
        assert!(matches!(segments[1], Segment::Expr(Expr::Binary { op: BinaryOp::Add, .. })));
    }

    #[test]
    fn rejects_trailing_tokens() {
        assert!(matches!(
            parse("a b"),
            Err(ParseError::UnexpectedToken { offset: 2, .. })
        ));
    }

    #[test]
    fn rejects_incomplete_input() {
        assert!(parse("a +").is_err());
        assert!(parse("(a").is_err());
        assert!(parse("").is_err());
        assert!(parse("`${ a + }`").is_err());
    }

    #[test]
    fn rejects_quoted_key_without_value() {
        assert!(parse("{ 'a' }").is_err());
        assert!(parse("{ a }").is_ok());
    }

    #[test]
    fn rejects_assignment() {
        assert!(parse("a = 1").is_err());
    }
}
