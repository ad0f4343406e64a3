//! Label template expansion.
//!
//! A template is literal text with `{name}` placeholders that refer to
//! quantification values:
//!
//! | Placeholder     | Expands to                  |
//! |-----------------|-----------------------------|
//! | `{length}`      | `12.35 mm` (value and unit) |
//! | `{length.value}`| `12.35`                     |
//! | `{length.unit}` | `mm`                        |
//! | `{{` / `}}`     | literal brace               |
//!
//! Unknown names expand to nothing; a stray brace is kept as is.

use crate::model::Quantity;
use std::collections::BTreeMap;
use winnow::combinator::{alt, delimited, opt, preceded, repeat};
use winnow::prelude::*;
use winnow::token::{take, take_till, take_while};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Part {
    Whole,
    Value,
    Unit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece<'a> {
    Literal(&'a str),
    Placeholder { name: &'a str, part: Part },
}

/// Expand `expr` against `quantification`.
pub fn expand(expr: &str, quantification: &BTreeMap<String, Quantity>) -> String {
    let pieces: Vec<Piece<'_>> = match repeat(0.., parse_piece).parse(expr) {
        Ok(pieces) => pieces,
        Err(e) => {
            log::warn!("label template {expr:?} did not parse: {e}");
            return expr.to_owned();
        }
    };

    let mut out = String::with_capacity(expr.len());
    for piece in pieces {
        match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Placeholder { name, part } => match quantification.get(name) {
                Some(q) => out.push_str(&format_quantity(q, part)),
                None => log::trace!("label template placeholder {{{name}}} has no value"),
            },
        }
    }
    out
}

fn format_quantity(q: &Quantity, part: Part) -> String {
    match (part, q.unit.as_deref()) {
        (Part::Whole, Some(unit)) if !unit.is_empty() => format!("{:.2} {unit}", q.value),
        (Part::Whole | Part::Value, _) => format!("{:.2}", q.value),
        (Part::Unit, unit) => unit.unwrap_or_default().to_owned(),
    }
}

// ─── Parsers ─────────────────────────────────────────────────────────────

fn parse_piece<'a>(input: &mut &'a str) -> ModalResult<Piece<'a>> {
    alt((
        "{{".value(Piece::Literal("{")),
        "}}".value(Piece::Literal("}")),
        parse_placeholder,
        take_till(1.., ['{', '}']).map(Piece::Literal),
        take(1usize).map(Piece::Literal),
    ))
    .parse_next(input)
}

fn parse_placeholder<'a>(input: &mut &'a str) -> ModalResult<Piece<'a>> {
    delimited('{', (parse_name, opt(preceded('.', parse_part))), '}')
        .map(|(name, part)| Piece::Placeholder {
            name,
            part: part.unwrap_or(Part::Whole),
        })
        .parse_next(input)
}

fn parse_name<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    take_while(1.., |c: char| c.is_alphanumeric() || c == '_' || c == '-').parse_next(input)
}

fn parse_part(input: &mut &str) -> ModalResult<Part> {
    alt(("value".value(Part::Value), "unit".value(Part::Unit))).parse_next(input)
}
