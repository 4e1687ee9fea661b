//! Expression tokenizer.

use std::fmt;

use chumsky::error::RichReason;
use chumsky::prelude::*;

use crate::error::ParseError;

pub(crate) type Span = SimpleSpan;
type LexExtra<'src> = extra::Err<Rich<'src, char, Span>>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token<'src> {
    Number(f64),
    Str(String),
    Template(Vec<TemplatePiece<'src>>),
    Ident(&'src str),
    Punct(&'src str),
    /// A string or template literal missing its closing quote.
    Unterminated,
}

/// A piece of a template literal: literal text or the source of a `${}` hole.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TemplatePiece<'src> {
    Text(String),
    Hole(&'src str),
}

impl Token<'_> {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {n}"),
            Token::Str(s) => format!("string '{s}'"),
            Token::Template(_) => "template literal".to_string(),
            Token::Ident(name) => format!("identifier `{name}`"),
            Token::Punct(p) => format!("`{p}`"),
            Token::Unterminated => "unterminated literal".to_string(),
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

fn escape<'src>() -> impl Parser<'src, &'src str, char, LexExtra<'src>> + Clone {
    let unicode = any()
        .filter(char::is_ascii_hexdigit)
        .repeated()
        .exactly(4)
        .to_slice()
        .try_map(|hex: &str, span| {
            u32::from_str_radix(hex, 16)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Rich::custom(span, format!("invalid escape `\\u{hex}`")))
        });

    just('\\').ignore_then(choice((
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('0').to('\0'),
        just('u').ignore_then(unicode),
        any(),
    )))
}

fn string_literal<'src>(quote: char) -> impl Parser<'src, &'src str, Token<'src>, LexExtra<'src>> + Clone {
    let plain = any().filter(move |c: &char| *c != quote && *c != '\\');

    just(quote)
        .ignore_then(choice((escape(), plain)).repeated().collect::<String>())
        .then(just(quote).or_not())
        .map(|(text, closed)| match closed {
            Some(_) => Token::Str(text),
            None => Token::Unterminated,
        })
}

/// A quoted run kept as source text, for skipping over strings in holes.
fn quoted_slice<'src>(quote: char) -> impl Parser<'src, &'src str, &'src str, LexExtra<'src>> + Clone {
    let escaped = just('\\').then(any()).ignored();
    let plain = any().filter(move |c: &char| *c != quote && *c != '\\').ignored();

    just(quote)
        .then(choice((escaped, plain)).repeated())
        .then(just(quote))
        .to_slice()
}

fn template_literal<'src>() -> impl Parser<'src, &'src str, Token<'src>, LexExtra<'src>> + Clone {
    // Source of a `${ ... }` hole, up to its matching brace.
    let hole = recursive(|hole| {
        choice((
            just('{').then(hole).then(just('}')).to_slice(),
            quoted_slice('\''),
            quoted_slice('"'),
            quoted_slice('`'),
            none_of("{}'\"`").to_slice(),
        ))
        .repeated()
        .to_slice()
    });

    let text = choice((
        escape(),
        any().filter(|c: &char| !matches!(c, '`' | '\\' | '$')),
        just('$').and_is(just("${").not()),
    ))
    .repeated()
    .at_least(1)
    .collect::<String>()
    .map(TemplatePiece::Text);

    let piece = choice((
        just("${")
            .ignore_then(hole)
            .then_ignore(just('}'))
            .map(TemplatePiece::Hole),
        text,
    ));

    just('`')
        .ignore_then(piece.repeated().collect::<Vec<_>>())
        .then(just('`').or_not())
        .map(|(pieces, closed)| match closed {
            Some(_) => Token::Template(pieces),
            None => Token::Unterminated,
        })
}

pub(crate) fn lexer<'src>() -> impl Parser<'src, &'src str, Vec<(Token<'src>, Span)>, LexExtra<'src>> {
    let digits = || text::digits(10);
    let exponent = one_of("eE").then(one_of("+-").or_not()).then(digits());
    let number = choice((
        digits().then(just('.').then(digits()).or_not()).ignored(),
        just('.').then(digits()).ignored(),
    ))
    .then(exponent.or_not())
    .to_slice()
    .try_map(|literal: &str, span| {
        literal
            .parse::<f64>()
            .map(Token::Number)
            .map_err(|_| Rich::custom(span, format!("invalid number literal `{literal}`")))
    });

    let ident = any()
        .filter(|c: &char| c.is_alphabetic() || *c == '_' || *c == '$')
        .then(
            any()
                .filter(|c: &char| c.is_alphanumeric() || *c == '_' || *c == '$')
                .repeated(),
        )
        .to_slice()
        .map(Token::Ident);

    // Longest first so `===` wins over `==` and `=`. `a?.5:1` is a ternary,
    // not optional chaining.
    let punct = choice((
        just("?.")
            .then(any().filter(char::is_ascii_digit).not())
            .ignored(),
        choice((
            just("==="),
            just("!=="),
            just("??"),
            just("=>"),
            just("=="),
            just("!="),
            just("<="),
            just(">="),
            just("&&"),
            just("||"),
        ))
        .ignored(),
        one_of("+-*/%<>!?:.,()[]{}=").ignored(),
    ))
    .to_slice()
    .map(Token::Punct);

    let token = choice((
        number,
        string_literal('\''),
        string_literal('"'),
        template_literal(),
        ident,
        punct,
    ));

    text::whitespace()
        .ignore_then(
            token
                .map_with(|token, extra| (token, extra.span()))
                .then_ignore(text::whitespace())
                .repeated()
                .collect(),
        )
        .then_ignore(end())
}

/// Split `source` into spanned tokens.
pub(crate) fn tokenize(source: &str) -> Result<Vec<(Token<'_>, Span)>, ParseError> {
    let tokens = lexer()
        .parse(source)
        .into_result()
        .map_err(|errors| lex_error(source, errors))?;

    if let Some((_, span)) = tokens.iter().find(|(token, _)| matches!(token, Token::Unterminated)) {
        return Err(ParseError::UnterminatedString {
            offset: span.start,
            source_text: source.to_string(),
        });
    }
    Ok(tokens)
}

fn lex_error(source: &str, errors: Vec<Rich<'_, char, Span>>) -> ParseError {
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
        Some(&ch) => ParseError::UnexpectedChar {
            ch,
            offset,
            source_text,
        },
        None => ParseError::UnexpectedEnd { source_text },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token<'_>> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|(token, _)| token)
            .collect()
    }

    #[test]
    fn tokenizes_operators_longest_first() {
        assert_eq!(
            kinds("a === b ?? c"),
            vec![
                Token::Ident("a"),
                Token::Punct("==="),
                Token::Ident("b"),
                Token::Punct("??"),
                Token::Ident("c"),
            ]
        );
    }

    #[test]
    fn tokenizes_numbers() {
        assert_eq!(
            kinds("1 1.5 .5 1e3"),
            vec![
                Token::Number(1.0),
                Token::Number(1.5),
                Token::Number(0.5),
                Token::Number(1000.0),
            ]
        );
    }

    #[test]
    fn tokenizes_strings_with_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nb" 'A'"#),
            vec![
                Token::Str("it's".into()),
                Token::Str("a\nb".into()),
                Token::Str("A".into()),
            ]
        );
    }

    #[test]
    fn template_literal_keeps_hole_source() {
        assert_eq!(
            kinds("`Hi ${ user.name }!`"),
            vec![Token::Template(vec![
                TemplatePiece::Text("Hi ".into()),
                TemplatePiece::Hole(" user.name "),
                TemplatePiece::Text("!".into()),
            ])]
        );
    }

    #[test]
    fn template_hole_skips_nested_braces_and_strings() {
        assert_eq!(
            kinds("`${ {a: '}'}.a }$`"),
            vec![Token::Template(vec![
                TemplatePiece::Hole(" {a: '}'}.a "),
                TemplatePiece::Text("$".into()),
            ])]
        );
    }

    #[test]
    fn ternary_with_decimal_is_not_optional_chaining() {
        assert_eq!(
            kinds("a?.5:1"),
            vec![
                Token::Ident("a"),
                Token::Punct("?"),
                Token::Number(0.5),
                Token::Punct(":"),
                Token::Number(1.0),
            ]
        );
    }

    #[test]
    fn spans_point_into_the_source() {
        let tokens = tokenize("  count + 1").unwrap();
        let starts: Vec<usize> = tokens.iter().map(|(_, span)| span.start).collect();
        assert_eq!(starts, vec![2, 8, 10]);
    }

    #[test]
    fn reports_unterminated_string() {
        assert!(matches!(
            tokenize("'abc"),
            Err(ParseError::UnterminatedString { offset: 0, .. })
        ));
        assert!(matches!(
            tokenize("x + `a ${b"),
            Err(ParseError::UnterminatedString { offset: 4, .. })
        ));
    }

    #[test]
    fn reports_unexpected_character() {
        assert!(matches!(
            tokenize("a # b"),
            Err(ParseError::UnexpectedChar { ch: '#', offset: 2, .. })
        ));
    }
}
