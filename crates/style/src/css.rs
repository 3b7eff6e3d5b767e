//! Collection of CSS-like declarations from a source element's attributes.

use std::collections::BTreeMap;

use scriven_types::{format_number, Color, Length, LengthUnit};

use crate::parsers::{parse_value, run_parser};

/// Attributes of a source-markup element, keyed by lowercase name.
pub type AttrMap = BTreeMap<String, String>;

/// Properties carrying a numeric value, with the unit assumed when the
/// declaration does not spell one.
const UNIT_PROPERTIES: &[(&str, Option<LengthUnit>)] = &[
    ("width", Some(LengthUnit::Px)),
    ("height", Some(LengthUnit::Px)),
    ("margin-left", Some(LengthUnit::Px)),
    ("margin-right", Some(LengthUnit::Px)),
    ("margin-top", Some(LengthUnit::Px)),
    ("margin-bottom", Some(LengthUnit::Px)),
    ("text-indent", Some(LengthUnit::Px)),
    ("border-spacing", Some(LengthUnit::Px)),
    ("font-size", None),
];

const COLOR_PROPERTIES: &[&str] = &["color", "background-color"];

/// Legacy presentational attributes and the CSS property each one stands
/// for. The `style` attribute wins over these when both are present.
const PRESENTATIONAL_ATTRS: &[(&str, &str)] = &[
    ("width", "width"),
    ("height", "height"),
    ("align", "text-align"),
    ("cellspacing", "border-spacing"),
    ("border", "border"),
];

/// One parsed CSS value, already normalized for the property it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum CssValue {
    Length(Length),
    /// A unitless number on a property with no assumed unit.
    Number(f64),
    Color(Color),
    Keyword(String),
}

impl CssValue {
    /// Parses `value` according to what `property` expects: unit-bearing
    /// properties produce lengths, color properties normalize to hex, and
    /// everything else is kept as a lowercase keyword.
    pub fn parse(property: &str, value: &str) -> CssValue {
        let value = value.trim().to_ascii_lowercase();
        if let Some((_, default_unit)) = UNIT_PROPERTIES.iter().find(|(p, _)| *p == property) {
            if let Ok((num, unit)) = run_parser(parse_value, property, &value) {
                return match unit.or(*default_unit) {
                    Some(unit) => CssValue::Length(Length::new(num, unit)),
                    None => CssValue::Number(num),
                };
            }
            return CssValue::Keyword(value);
        }
        if COLOR_PROPERTIES.contains(&property) {
            return match Color::parse(&value) {
                Ok(color) => CssValue::Color(color),
                // Keep an unparseable color verbatim rather than dropping
                // the declaration.
                Err(_) => CssValue::Keyword(value),
            };
        }
        CssValue::Keyword(value)
    }

    pub fn as_length(&self) -> Option<Length> {
        match self {
            CssValue::Length(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match self {
            CssValue::Keyword(k) => Some(k),
            _ => None,
        }
    }
}

impl std::fmt::Display for CssValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CssValue::Length(l) => write!(f, "{l}"),
            CssValue::Number(n) => f.write_str(&format_number(*n, 3)),
            CssValue::Color(c) => write!(f, "{c}"),
            CssValue::Keyword(k) => f.write_str(k),
        }
    }
}

/// Splits the content of a `style` attribute into `(name, value)` pairs.
pub fn parse_style_attribute(value: &str) -> Vec<(String, String)> {
    let mut res = Vec::new();
    for decl in value.split(';') {
        if decl.trim().is_empty() {
            continue;
        }
        if let Some((name, value)) = decl.split_once(':') {
            res.push((
                name.trim().to_ascii_lowercase(),
                value.trim().to_string(),
            ));
        }
    }
    res
}

/// The CSS declarations in force on one element, collected from its
/// `style` attribute and its legacy presentational attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CssDeclarations {
    values: BTreeMap<String, CssValue>,
}

impl CssDeclarations {
    pub fn from_attrs(attrs: &AttrMap) -> CssDeclarations {
        let mut values = BTreeMap::new();
        if let Some(style) = attrs.get("style") {
            for (name, value) in parse_style_attribute(style) {
                let parsed = CssValue::parse(&name, &value);
                values.insert(name, parsed);
            }
        }
        for (attr, property) in PRESENTATIONAL_ATTRS {
            if !values.contains_key(*property)
                && let Some(raw) = attrs.get(*attr)
            {
                values.insert(property.to_string(), CssValue::parse(property, raw));
            }
        }
        CssDeclarations { values }
    }

    pub fn get(&self, property: &str) -> Option<&CssValue> {
        self.values.get(property)
    }

    pub fn remove(&mut self, property: &str) -> Option<CssValue> {
        self.values.remove(property)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates declarations in property-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CssValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
