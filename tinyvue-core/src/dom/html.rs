//! HTML fragment parsing and serialization.
//!
//! The parser covers the markup component templates use: elements with
//! quoted, unquoted and bare attributes, text, comments, void elements,
//! raw-text elements (`script`, `style`, `textarea`, `title`) and character
//! references. Tag and attribute names are lowercased the way an HTML
//! parser does. `<x />` closes any element.

use super::node::{Node, NodeType};
use crate::error::ParseError;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

/// Parse `markup` into a detached fragment.
pub fn parse_fragment(markup: &str) -> Result<Node, ParseError> {
    let fragment = Node::fragment();
    let mut stack: Vec<Node> = vec![fragment.clone()];
    let mut pos = 0;

    while pos < markup.len() {
        let rest = &markup[pos..];
        let current = stack.last().cloned().unwrap_or_else(|| fragment.clone());

        if let Some(body) = rest.strip_prefix("<!--") {
            let end = body.find("-->").ok_or(ParseError::UnterminatedMarkup {
                construct: "comment",
                offset: pos,
            })?;
            current.append_child(&Node::comment(&body[..end]));
            pos += 4 + end + 3;
        } else if rest.starts_with("<!") || rest.starts_with("<?") {
            let end = rest.find('>').ok_or(ParseError::UnterminatedMarkup {
                construct: "declaration",
                offset: pos,
            })?;
            pos += end + 1;
        } else if let Some(body) = rest.strip_prefix("</") {
            let end = body.find('>').ok_or(ParseError::UnterminatedMarkup {
                construct: "closing tag",
                offset: pos,
            })?;
            let name = body[..end].trim().to_ascii_lowercase();
            if let Some(depth) = stack
                .iter()
                .rposition(|n| n.local_name().as_deref() == Some(name.as_str()))
            {
                stack.truncate(depth.max(1));
            }
            pos += 2 + end + 1;
        } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
            let tag = parse_tag(markup, pos)?;
            let element = Node::element(&tag.name);
            for (name, value) in &tag.attributes {
                element.set_attribute(name, value.as_str());
            }
            current.append_child(&element);
            pos = tag.end;

            if tag.self_closing || is_void(&tag.name) {
                continue;
            }
            if RAW_TEXT_ELEMENTS.contains(&tag.name.as_str()) {
                let close = format!("</{}", tag.name);
                let body = &markup[pos..];
                let end = find_ignore_case(body, &close).ok_or(ParseError::UnterminatedMarkup {
                    construct: "raw text element",
                    offset: pos,
                })?;
                let text = &body[..end];
                if !text.is_empty() {
                    let text = if tag.name == "textarea" || tag.name == "title" {
                        decode_entities(text)
                    } else {
                        text.to_string()
                    };
                    element.append_child(&Node::text(&text));
                }
                let after = &body[end..];
                pos += end + after.find('>').map_or(after.len(), |i| i + 1);
                continue;
            }
            stack.push(element);
        } else {
            let end = rest
                .char_indices()
                .skip(1)
                .find(|&(_, c)| c == '<')
                .map_or(rest.len(), |(i, _)| i);
            current.append_child(&Node::text(&decode_entities(&rest[..end])));
            pos += end;
        }
    }

    Ok(fragment)
}

struct Tag {
    name: String,
    attributes: Vec<(String, String)>,
    self_closing: bool,
    end: usize,
}

fn parse_tag(markup: &str, start: usize) -> Result<Tag, ParseError> {
    let unterminated = ParseError::UnterminatedMarkup {
        construct: "tag",
        offset: start,
    };
    let bytes = markup.as_bytes();
    let mut pos = start + 1;

    let name_start = pos;
    while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && !matches!(bytes[pos], b'>' | b'/') {
        pos += 1;
    }
    let name = markup[name_start..pos].to_ascii_lowercase();
    let mut attributes = Vec::new();

    loop {
        while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        match bytes.get(pos) {
            None => return Err(unterminated),
            Some(b'>') => {
                return Ok(Tag {
                    name,
                    attributes,
                    self_closing: false,
                    end: pos + 1,
                })
            }
            Some(b'/') if bytes.get(pos + 1) == Some(&b'>') => {
                return Ok(Tag {
                    name,
                    attributes,
                    self_closing: true,
                    end: pos + 2,
                })
            }
            Some(b'/') => pos += 1,
            Some(_) => {
                let attr_start = pos;
                while pos < bytes.len()
                    && !bytes[pos].is_ascii_whitespace()
                    && !matches!(bytes[pos], b'=' | b'>')
                    && !(bytes[pos] == b'/' && bytes.get(pos + 1) == Some(&b'>'))
                {
                    pos += 1;
                }
                let attr_name = markup[attr_start..pos].to_ascii_lowercase();

                while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                    pos += 1;
                }
                let mut value = String::new();
                if bytes.get(pos) == Some(&b'=') {
                    pos += 1;
                    while pos < bytes.len() && bytes[pos].is_ascii_whitespace() {
                        pos += 1;
                    }
                    match bytes.get(pos) {
                        Some(&quote @ (b'"' | b'\'')) => {
                            let body = &markup[pos + 1..];
                            let end = body.find(quote as char).ok_or(ParseError::UnterminatedMarkup {
                                construct: "attribute value",
                                offset: pos,
                            })?;
                            value = decode_entities(&body[..end]);
                            pos += end + 2;
                        }
                        Some(_) => {
                            let value_start = pos;
                            while pos < bytes.len() && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' {
                                pos += 1;
                            }
                            value = decode_entities(&markup[value_start..pos]);
                        }
                        None => return Err(unterminated),
                    }
                }

                if !attributes.iter().any(|(n, _): &(String, String)| *n == attr_name) {
                    attributes.push((attr_name, value));
                }
            }
        }
    }
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let lower = haystack.to_ascii_lowercase();
    lower.find(&needle.to_ascii_lowercase())
}

/// Decode character references.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .or_else(|| entity.strip_prefix('#').map(str::parse::<u32>))
                    .and_then(Result::ok)
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, end))
        });

        match decoded {
            Some((ch, end)) => {
                out.push(ch);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            c => out.push(c),
        }
    }
}

/// Append the markup of `node` to `out`.
pub fn serialize(node: &Node, out: &mut String) {
    match node.node_type() {
        NodeType::Text => {
            let raw = node
                .parent()
                .and_then(|p| p.local_name())
                .is_some_and(|name| name == "script" || name == "style");
            if raw {
                out.push_str(&node.text_content());
            } else {
                escape_text(&node.text_content(), out);
            }
        }
        NodeType::Comment => {
            out.push_str("<!--");
            out.push_str(&node.text_content());
            out.push_str("-->");
        }
        NodeType::Fragment | NodeType::ShadowRoot => {
            for child in node.children() {
                serialize(&child, out);
            }
        }
        NodeType::Element => {
            let name = node.local_name().unwrap_or_default();
            out.push('<');
            out.push_str(&name);
            for (attr, value) in node.attributes() {
                out.push(' ');
                out.push_str(&attr);
                if !value.is_empty() {
                    out.push_str("=\"");
                    escape_attribute(&value, out);
                    out.push('"');
                }
            }
            out.push('>');
            if is_void(&name) {
                return;
            }
            for child in node.children() {
                serialize(&child, out);
            }
            out.push_str("</");
            out.push_str(&name);
            out.push('>');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(markup: &str) -> String {
        let fragment = parse_fragment(markup).unwrap();
        let mut out = String::new();
        serialize(&fragment, &mut out);
        out
    }

    #[test]
    fn parses_nested_elements_and_text() {
        let fragment = parse_fragment("<div class=\"a\"><p>Hello {{ name }}</p></div>").unwrap();
        let div = fragment.first_element_child().unwrap();
        assert_eq!(div.local_name().as_deref(), Some("div"));
        assert_eq!(div.get_attribute("class").as_deref(), Some("a"));
        assert_eq!(div.text_content(), "Hello {{ name }}");
    }

    #[test]
    fn lowercases_names_and_keeps_directive_attributes() {
        let fragment = parse_fragment("<My-Comp :Title='t' @click=go v-if=\"a > b\" disabled></My-Comp>").unwrap();
        let el = fragment.first_element_child().unwrap();
        assert_eq!(el.local_name().as_deref(), Some("my-comp"));
        assert_eq!(
            el.attributes(),
            vec![
                (":title".to_string(), "t".to_string()),
                ("@click".to_string(), "go".to_string()),
                ("v-if".to_string(), "a > b".to_string()),
                ("disabled".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn void_and_self_closing_elements_do_not_nest() {
        assert_eq!(
            round_trip("<input value=x><br/><my-el /><span>after</span>"),
            "<input value=\"x\"><br><my-el></my-el><span>after</span>"
        );
    }

    #[test]
    fn comments_and_entities() {
        let fragment = parse_fragment("<!-- note --><p>a &amp; b &lt;c&gt; &#65;&#x42;</p>").unwrap();
        let children = fragment.children();
        assert_eq!(children[0].node_type(), NodeType::Comment);
        assert_eq!(children[1].text_content(), "a & b <c> AB");
        assert_eq!(round_trip("<p>a &amp; b</p>"), "<p>a &amp; b</p>");
    }

    #[test]
    fn raw_text_elements_keep_markup_characters() {
        let fragment = parse_fragment("<style>a > b { color: red }</style>").unwrap();
        assert_eq!(fragment.text_content(), "a > b { color: red }");
        assert_eq!(round_trip("<style>a > b {}</style>"), "<style>a > b {}</style>");
    }

    #[test]
    fn stray_closing_tags_are_ignored() {
        assert_eq!(round_trip("<p>x</span></p>"), "<p>x</p>");
    }

    #[test]
    fn unterminated_markup_is_an_error() {
        assert!(matches!(
            parse_fragment("<div class=\"a"),
            Err(ParseError::UnterminatedMarkup { .. })
        ));
        assert!(matches!(
            parse_fragment("<!-- open"),
            Err(ParseError::UnterminatedMarkup { construct: "comment", .. })
        ));
    }

    #[test]
    fn unknown_entities_pass_through() {
        assert_eq!(decode_entities("a &bogus; & b"), "a &bogus; & b");
    }
}
