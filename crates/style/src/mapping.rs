//! Styles mappings: caller-provided rules binding source-markup selectors
//! to target styles or structured property objects.
//!
//! A mapping exists in two forms: the raw [`StylesMapping`] handed in by
//! the caller (plain data, serde-friendly), and the [`ValidatedMapping`]
//! produced by checking it against a style registry, which is what the
//! resolver consumes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::css::{parse_style_attribute, AttrMap};
use crate::properties::{ListProperties, TableProperties};
use crate::registry::Style;
use crate::tags::UNSTYLABLE_TAGS;

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("styles-mapping keys and style names must be non-empty")]
    EmptyEntry,

    #[error(
        "style \"{0}\" was not found in the template. Note that only styles \
         actually in use within the template are recorded into it; the \
         names shown by an editor are a super-set of those"
    )]
    StyleNotFound(String),

    #[error("element \"{tag}\" cannot carry a style; unstylable elements are: {unstylable:?}")]
    UnstylableTag {
        tag: String,
        unstylable: &'static [&'static str],
    },

    #[error(
        "mapping key \"{key}\" is reserved; its value must be given through \
         the dedicated \"{field}\" field, not as a style name"
    )]
    ReservedKey { key: String, field: &'static str },

    #[error("malformed CSS filter in mapping key \"{0}\"")]
    BadFilter(String),
}

/// A styles mapping as provided by the caller. Selector keys are either a
/// tag name, a tag name with a CSS filter (`p[text-align=center]`), or a
/// CSS class name; values are display names of template styles. Table,
/// list and heading policies travel in their own fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StylesMapping {
    /// Selector -> target style display name.
    pub styles: Vec<(String, String)>,
    /// Offset applied to heading outline levels when looking up a registry
    /// style by level (the `h*` rule). May be negative.
    pub heading_delta: Option<i32>,
    pub table: Option<TableProperties>,
    pub ul: Option<ListProperties>,
    pub ol: Option<ListProperties>,
}

impl StylesMapping {
    pub fn new() -> StylesMapping {
        StylesMapping::default()
    }

    pub fn map(mut self, selector: &str, style: &str) -> StylesMapping {
        self.styles.push((selector.to_string(), style.to_string()));
        self
    }

    pub fn with_table(mut self, table: TableProperties) -> StylesMapping {
        self.table = Some(table);
        self
    }

    pub fn with_list(mut self, tag: &str, props: ListProperties) -> StylesMapping {
        match tag {
            "ul" => self.ul = Some(props),
            "ol" => self.ol = Some(props),
            _ => {}
        }
        self
    }

    pub fn with_heading_delta(mut self, delta: i32) -> StylesMapping {
        self.heading_delta = Some(delta);
        self
    }
}

/// A CSS filter attached to a tag selector: all pairs must match the
/// element's `style` attribute for the rule to apply.
pub type CssFilter = Vec<(String, String)>;

/// Splits `p[text-align=center,color=blue]` into the bare selector and
/// its filter.
fn parse_selector(key: &str) -> Result<(String, Option<CssFilter>), MappingError> {
    let Some((tag, rest)) = key.split_once('[') else {
        return Ok((key.trim().to_string(), None));
    };
    let inner = rest
        .trim()
        .strip_suffix(']')
        .ok_or_else(|| MappingError::BadFilter(key.to_string()))?;
    let mut filter = Vec::new();
    for pair in inner.split(',') {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| MappingError::BadFilter(key.to_string()))?;
        filter.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok((tag.trim().to_string(), Some(filter)))
}

/// A mapping checked against a registry: every selector now points at a
/// concrete [`Style`].
#[derive(Debug, Clone, Default)]
pub struct ValidatedMapping {
    /// Selector (tag or class, filter stripped) -> candidate styles in
    /// declaration order. Filtered candidates come before the unfiltered
    /// fallback.
    entries: HashMap<String, Vec<(Option<CssFilter>, Style)>>,
    pub heading_delta: Option<i32>,
    pub table: Option<TableProperties>,
    pub ul: Option<ListProperties>,
    pub ol: Option<ListProperties>,
}

impl ValidatedMapping {
    pub(crate) fn insert(&mut self, key: String, filter: Option<CssFilter>, style: Style) {
        let entry = self.entries.entry(key).or_default();
        match filter {
            // Unfiltered rules act as the fallback and must be tried last.
            None => entry.push((None, style)),
            Some(f) => {
                let at = entry.iter().position(|(f, _)| f.is_none()).unwrap_or(entry.len());
                entry.insert(at, (Some(f), style));
            }
        }
    }

    /// Looks up a selector key as-is, ignoring CSS filters. Used for class
    /// names.
    pub fn class_style(&self, class: &str) -> Option<&Style> {
        let entry = self.entries.get(class)?;
        entry
            .iter()
            .find(|(f, _)| f.is_none())
            .or_else(|| entry.first())
            .map(|(_, s)| s)
    }

    /// Looks up a tag selector, honoring CSS filters against the
    /// element's `style` attribute.
    pub fn tag_style(&self, tag: &str, attrs: Option<&AttrMap>) -> Option<&Style> {
        let entry = self.entries.get(tag)?;
        let style_attr = attrs.and_then(|a| a.get("style"));
        match style_attr {
            None => entry.iter().find(|(f, _)| f.is_none()).map(|(_, s)| s),
            Some(raw) => {
                let declared = parse_style_attribute(raw);
                entry
                    .iter()
                    .find(|(filter, _)| match filter {
                        None => true,
                        Some(filter) => filter.iter().all(|(name, value)| {
                            declared.iter().any(|(n, v)| n == name && v == value)
                        }),
                    })
                    .map(|(_, s)| s)
            }
        }
    }

    pub fn list(&self, tag: &str) -> Option<&ListProperties> {
        match tag {
            "ul" => self.ul.as_ref(),
            "ol" => self.ol.as_ref(),
            _ => None,
        }
    }
}

/// Reserved selector keys whose values are structured objects rather than
/// style names.
const RESERVED_KEYS: &[(&str, &str)] = &[
    ("table", "table"),
    ("ul", "ul"),
    ("ol", "ol"),
    ("h*", "heading_delta"),
];

/// Validates a raw mapping against a registry and the engine's built-in
/// styles, using `find_style` to resolve display names and
/// `check_adequacy` to reject family-incompatible assignments.
pub(crate) fn validate_mapping<'a>(
    mapping: &StylesMapping,
    resolve: impl Fn(&str) -> Option<&'a Style>,
    check_adequacy: impl Fn(&str, &Style) -> Result<(), crate::error::StyleError>,
) -> Result<ValidatedMapping, crate::error::StyleError> {
    let mut validated = ValidatedMapping {
        heading_delta: mapping.heading_delta,
        table: mapping.table.clone(),
        ul: mapping.ul.clone(),
        ol: mapping.ol.clone(),
        ..ValidatedMapping::default()
    };
    for (key, style_name) in &mapping.styles {
        if key.trim().is_empty() || style_name.trim().is_empty() {
            return Err(MappingError::EmptyEntry.into());
        }
        let (selector, filter) = parse_selector(key)?;
        if let Some((_, field)) = RESERVED_KEYS.iter().copied().find(|(k, _)| *k == selector) {
            return Err(MappingError::ReservedKey {
                key: selector,
                field,
            }
            .into());
        }
        if UNSTYLABLE_TAGS.contains(&selector.as_str()) {
            return Err(MappingError::UnstylableTag {
                tag: selector,
                unstylable: UNSTYLABLE_TAGS,
            }
            .into());
        }
        let style = resolve(style_name)
            .ok_or_else(|| MappingError::StyleNotFound(style_name.clone()))?;
        check_adequacy(&selector, style)?;
        validated.insert(selector, filter, style.clone());
    }
    Ok(validated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StyleFamily;

    fn attrs_with_style(style: &str) -> AttrMap {
        let mut attrs = AttrMap::new();
        attrs.insert("style".to_string(), style.to_string());
        attrs
    }

    #[test]
    fn test_parse_selector() {
        assert_eq!(parse_selector("p").unwrap(), ("p".to_string(), None));
        let (tag, filter) = parse_selector("p[text-align=center,color=blue]").unwrap();
        assert_eq!(tag, "p");
        assert_eq!(
            filter.unwrap(),
            vec![
                ("text-align".to_string(), "center".to_string()),
                ("color".to_string(), "blue".to_string()),
            ]
        );
        assert!(parse_selector("p[text-align]").is_err());
        assert!(parse_selector("p[text-align=center").is_err());
    }

    #[test]
    fn test_filtered_rules_take_priority() {
        let mut mapping = ValidatedMapping::default();
        mapping.insert(
            "p".to_string(),
            None,
            Style::new("Fallback", StyleFamily::Paragraph),
        );
        mapping.insert(
            "p".to_string(),
            Some(vec![("text-align".to_string(), "center".to_string())]),
            Style::new("Centered", StyleFamily::Paragraph),
        );

        let centered = attrs_with_style("text-align: center");
        assert_eq!(mapping.tag_style("p", Some(&centered)).unwrap().name, "Centered");

        let plain = attrs_with_style("color: red");
        assert_eq!(mapping.tag_style("p", Some(&plain)).unwrap().name, "Fallback");

        assert_eq!(mapping.tag_style("p", None).unwrap().name, "Fallback");
        assert!(mapping.tag_style("div", None).is_none());
    }

    #[test]
    fn test_validate_rejects_reserved_and_unstylable() {
        let resolve = |_: &str| -> Option<&'static Style> { None };
        let ok = |_: &str, _: &Style| Ok(());

        let mapping = StylesMapping::new().map("table", "SomeStyle");
        assert!(matches!(
            validate_mapping(&mapping, resolve, ok),
            Err(crate::error::StyleError::Mapping(MappingError::ReservedKey { .. }))
        ));

        let mapping = StylesMapping::new().map("br", "SomeStyle");
        assert!(matches!(
            validate_mapping(&mapping, resolve, ok),
            Err(crate::error::StyleError::Mapping(MappingError::UnstylableTag { .. }))
        ));

        let mapping = StylesMapping::new().map("", "SomeStyle");
        assert!(matches!(
            validate_mapping(&mapping, resolve, ok),
            Err(crate::error::StyleError::Mapping(MappingError::EmptyEntry))
        ));
    }

    #[test]
    fn test_mapping_deserializes_from_json() {
        let mapping: StylesMapping = serde_json::from_str(
            r#"{
                "styles": [["p", "Body"], ["intro", "Intro Paragraph"]],
                "heading_delta": 1,
                "table": { "min_column_width": 0.1 }
            }"#,
        )
        .unwrap();
        assert_eq!(mapping.styles.len(), 2);
        assert_eq!(mapping.heading_delta, Some(1));
        assert_eq!(mapping.table.unwrap().min_column_width, 0.1);
        assert!(mapping.ul.is_none());
    }
}
