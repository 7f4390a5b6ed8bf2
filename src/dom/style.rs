//! Inline `style` attribute parsing.
//!
//! Declarations are tokenized with cssparser so that values containing
//! functions or strings (`rgb(0, 0, 0)`, `url("a;b")`) are kept whole.
//! Malformed declarations are skipped, as a browser would.

use cssparser::{Delimiter, ParseError, Parser, ParserInput, Token};

/// One `property: value` pair from a style attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lowercased property name.
    pub property: String,
    /// Value text as written, trimmed, without `!important`.
    pub value: String,
}

/// Parse the contents of a `style` attribute.
pub fn parse_inline_style(style: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);
    let mut declarations = Vec::new();

    loop {
        parser.skip_whitespace();
        if parser.is_exhausted() {
            break;
        }

        let result: Result<Declaration, ParseError<'_, ()>> =
            parser.parse_until_after(Delimiter::Semicolon, parse_declaration);

        if let Ok(decl) = result
            && !decl.value.is_empty()
        {
            declarations.push(decl);
        }
    }

    declarations
}

fn parse_declaration<'i>(i: &mut Parser<'i, '_>) -> Result<Declaration, ParseError<'i, ()>> {
    let property = match i.next()? {
        Token::Ident(name) => name.to_ascii_lowercase(),
        _ => return Err(i.new_custom_error(())),
    };

    i.skip_whitespace();
    match i.next()? {
        Token::Colon => {}
        _ => return Err(i.new_custom_error(())),
    }

    i.skip_whitespace();
    let start = i.position();
    while i.next().is_ok() {}
    let raw = i.slice_from(start).trim();
    let value = strip_important(raw).to_string();

    Ok(Declaration { property, value })
}

fn strip_important(value: &str) -> &str {
    let lower = value.to_ascii_lowercase();
    match lower.rfind("!important") {
        Some(pos) if lower[pos..].trim() == "!important" => value[..pos].trim_end(),
        _ => value,
    }
}

/// Value of the last declaration for `property`, if any.
pub fn style_value<'a>(declarations: &'a [Declaration], property: &str) -> Option<&'a str> {
    declarations
        .iter()
        .rev()
        .find(|d| d.property == property)
        .map(|d| d.value.as_str())
}

/// Parse a pixel length such as `396.00px`.
pub fn px_value(value: &str) -> Option<f64> {
    let number = value.trim().strip_suffix("px")?;
    number.trim().parse().ok()
}

/// Serialize declarations back into attribute form (`a:b;c:d`).
pub fn serialize_style(declarations: &[Declaration]) -> String {
    declarations
        .iter()
        .map(|d| format!("{}:{}", d.property, d.value))
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let decls = parse_inline_style("width: 10px; HEIGHT:5em");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].property, "width");
        assert_eq!(decls[0].value, "10px");
        assert_eq!(decls[1].property, "height");
        assert_eq!(decls[1].value, "5em");
    }

    #[test]
    fn test_functions_and_strings_stay_whole() {
        let decls = parse_inline_style(r#"color: rgb(1, 2, 3); background: url("a;b")"#);
        assert_eq!(style_value(&decls, "color"), Some("rgb(1, 2, 3)"));
        assert_eq!(style_value(&decls, "background"), Some(r#"url("a;b")"#));
    }

    #[test]
    fn test_malformed_declarations_are_skipped() {
        let decls = parse_inline_style("width; : red; font-weight: 700 !important; ;");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].value, "700");
    }

    #[test]
    fn test_px_value() {
        assert_eq!(px_value("396.00px"), Some(396.0));
        assert_eq!(px_value("-12.5px"), Some(-12.5));
        assert_eq!(px_value("3em"), None);
    }

    #[test]
    fn test_last_declaration_wins() {
        let decls = parse_inline_style("width: 1px; width: 2px");
        assert_eq!(style_value(&decls, "width"), Some("2px"));
    }
}
