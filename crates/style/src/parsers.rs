//! Low-level nom parsers for CSS-like style values.

use nom::branch::alt;
use nom::bytes::complete::{tag_no_case, take_while_m_n};
use nom::character::complete::char;
use nom::combinator::{map, map_res, opt, recognize};
use nom::sequence::pair;
use nom::{IResult, Parser};
use scriven_types::LengthUnit;

use crate::error::StyleError;

fn parse_f64(input: &str) -> IResult<&str, f64> {
    map_res(
        recognize(pair(
            opt(char('-')),
            alt((
                recognize(pair(
                    take_while_m_n(1, 10, |c: char| c.is_ascii_digit()),
                    opt(pair(
                        char('.'),
                        take_while_m_n(1, 10, |c: char| c.is_ascii_digit()),
                    )),
                )),
                recognize(pair(
                    char('.'),
                    take_while_m_n(1, 10, |c: char| c.is_ascii_digit()),
                )),
            )),
        )),
        |s: &str| s.parse::<f64>(),
    )
    .parse(input)
}

fn parse_unit(input: &str) -> IResult<&str, LengthUnit> {
    alt((
        map(tag_no_case("px"), |_| LengthUnit::Px),
        map(tag_no_case("cm"), |_| LengthUnit::Cm),
        map(tag_no_case("pt"), |_| LengthUnit::Pt),
        map(char('%'), |_| LengthUnit::Percent),
    ))
    .parse(input)
}

/// Parses a numeric CSS value with an optional unit suffix, e.g. `4cm`,
/// `50%`, `-12`, `.5px`.
pub fn parse_value(input: &str) -> IResult<&str, (f64, Option<LengthUnit>)> {
    pair(parse_f64, opt(parse_unit)).parse(input)
}

/// Runs a nom parser against a full (trimmed) input, converting leftovers
/// or parse failures into a `StyleError` for the given property.
pub fn run_parser<'a, T, F>(mut parser: F, property: &str, input: &'a str) -> Result<T, StyleError>
where
    F: FnMut(&'a str) -> IResult<&'a str, T>,
{
    match parser(input.trim()) {
        Ok(("", result)) => Ok(result),
        _ => Err(StyleError::InvalidValue {
            property: property.to_string(),
            value: input.to_string(),
        }),
    }
}
