//! Derived-style synthesis: turning inline CSS declarations into
//! registered target-schema styles, deduplicated per conversion run.

use std::collections::HashMap;

use scriven_types::{format_number, PX_PER_CM};

use crate::css::{CssDeclarations, CssValue};
use crate::error::StyleError;
use crate::registry::{Style, StyleFamily};
use crate::resolver::CELL_CONTENT_STYLE;
use scriven_types::LengthUnit;

/// Style declarations generated during a conversion, to be merged into
/// the target document. `content` declarations land in the content
/// stream's automatic styles, `styles` in the document-wide styles area.
#[derive(Debug, Clone, Default)]
pub struct DynamicStyles {
    pub content: Vec<String>,
    pub styles: Vec<String>,
}

/// Source CSS property -> target schema attribute.
const HTML_TO_ODF: &[(&str, &str)] = &[
    ("margin-left", "fo:margin-left"),
    ("margin-right", "fo:margin-right"),
    ("margin-top", "fo:margin-top"),
    ("margin-bottom", "fo:margin-bottom"),
    ("text-align", "fo:text-align"),
    ("text-indent", "fo:text-indent"),
    ("background-color", "fo:background-color"),
    ("color", "fo:color"),
    ("font-size", "fo:font-size"),
    ("font-variant", "fo:font-variant"),
    ("vertical-align", "style:vertical-align"),
    ("border", "fo:border"),
    ("border-spacing", "fo:padding"),
];

/// Properties that belong to a style's text-properties element; anything
/// else is a paragraph property.
const TEXT_PROPERTIES: &[&str] = &["fo:color", "fo:font-size", "fo:font-variant"];

/// Properties that stay at the cell level; the rest of a cell's
/// declarations propagate to its inner-paragraph style.
const CELL_PROPERTIES: &[&str] = &[
    "fo:padding",
    "fo:border",
    "fo:background-color",
    "style:vertical-align",
];

fn style_family_for(tag: &str) -> Option<StyleFamily> {
    match tag {
        "p" | "div" => Some(StyleFamily::Paragraph),
        "span" => Some(StyleFamily::Text),
        "td" | "th" => Some(StyleFamily::TableCell),
        _ => None,
    }
}

/// Converts one CSS declaration to its target attribute pair, or `None`
/// when the property has no target equivalent.
fn odf_attribute(name: &str, value: &CssValue) -> Option<(String, String)> {
    let odf_name = HTML_TO_ODF
        .iter()
        .find(|(css, _)| *css == name)
        .map(|(_, odf)| *odf)?;
    let odf_value = match value {
        CssValue::Length(l) if l.unit == LengthUnit::Px => {
            format!("{}cm", format_number(l.value / PX_PER_CM, 3))
        }
        CssValue::Length(l) => l.to_string(),
        CssValue::Number(n) => format_number(*n, 3),
        CssValue::Color(c) => c.to_hex(),
        CssValue::Keyword(k) => match (name, k.as_str()) {
            ("text-align", "left") => "start".to_string(),
            ("text-align", "right") => "end".to_string(),
            ("border", "0") => "none".to_string(),
            _ => k.clone(),
        },
    };
    Some((odf_name.to_string(), odf_value))
}

fn flatten(attrs: &[(String, String)]) -> String {
    attrs
        .iter()
        .map(|(n, v)| format!("{n}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(" ")
}

fn hash_key(tag: &str, attrs: &[(String, String)]) -> String {
    let mut key = String::from(tag);
    for (name, value) in attrs {
        key.push_str(name);
        key.push_str(value);
    }
    key
}

/// The outcome of a generation request. `style` replaces the base style
/// on the element itself; `inner_style` is the synthesized style for a
/// cell's inner paragraph, when one was needed.
#[derive(Debug, Clone, Default)]
pub struct GeneratedStyle {
    pub style: Option<Style>,
    pub inner_style: Option<String>,
}

/// Synthesizes derived styles, one per unique (tag, resolved attributes)
/// combination per conversion run.
#[derive(Debug, Default)]
pub struct StyleGenerator {
    last: u32,
    generated: HashMap<String, String>,
}

impl StyleGenerator {
    pub fn new() -> StyleGenerator {
        StyleGenerator::default()
    }

    /// Generates (or reuses) a derived style for `tag` carrying the given
    /// inline declarations on top of `base`. Returns an empty outcome when
    /// the declarations demand nothing the target schema can express.
    pub fn generate(
        &mut self,
        tag: &str,
        css: &CssDeclarations,
        base: Option<&Style>,
        dynamic: &mut DynamicStyles,
    ) -> Result<GeneratedStyle, StyleError> {
        if css.is_empty() {
            return Ok(GeneratedStyle::default());
        }
        let mut odf_attrs: Vec<(String, String)> = css
            .iter()
            .filter_map(|(name, value)| odf_attribute(name, value))
            .collect();
        if odf_attrs.is_empty() {
            return Ok(GeneratedStyle::default());
        }
        odf_attrs.sort();

        match tag {
            "p" | "div" | "span" => {
                let family = style_family_for(tag).unwrap_or(StyleFamily::Paragraph);
                let name = self.paragraph_style(tag, family, &odf_attrs, base, dynamic);
                Ok(GeneratedStyle {
                    style: Some(Style::new(name, family)),
                    inner_style: None,
                })
            }
            "td" | "th" => Ok(self.cell_style(tag, &odf_attrs, base, dynamic)),
            _ => Ok(GeneratedStyle::default()),
        }
    }

    fn next_name(&mut self, key: String) -> String {
        self.last += 1;
        let name = format!("DS{}", self.last);
        self.generated.insert(key, name.clone());
        name
    }

    /// Generates a paragraph- or text-family style, splitting the
    /// attributes into paragraph and text property buckets.
    fn paragraph_style(
        &mut self,
        tag: &str,
        family: StyleFamily,
        odf_attrs: &[(String, String)],
        base: Option<&Style>,
        dynamic: &mut DynamicStyles,
    ) -> String {
        let key = hash_key(tag, odf_attrs);
        if let Some(existing) = self.generated.get(&key) {
            return existing.clone();
        }
        let name = self.next_name(key);
        let attr_names: Vec<String> = odf_attrs.iter().map(|(n, _)| n.clone()).collect();
        let parent = base
            .map(|b| b.parent_attributes(&attr_names))
            .unwrap_or_default();

        let (text_attrs, para_attrs): (Vec<_>, Vec<_>) = odf_attrs
            .iter()
            .cloned()
            .partition(|(n, _)| TEXT_PROPERTIES.contains(&n.as_str()));
        let mut props = String::new();
        if !text_attrs.is_empty() {
            props.push_str(&format!(
                "<style:text-properties {}/>",
                flatten(&text_attrs)
            ));
        }
        if !para_attrs.is_empty() {
            props.push_str(&format!(
                "<style:paragraph-properties {}/>",
                flatten(&para_attrs)
            ));
        }
        // Dumped into the document-wide styles area: some properties (a
        // percentage font-size among them) are ignored when the style
        // lives in the content stream.
        dynamic.styles.push(format!(
            "<style:style style:name=\"{name}\" style:family=\"{}\"{parent}>{props}</style:style>",
            family.as_str()
        ));
        name
    }

    /// Generates a cell style and, when text-level declarations are
    /// present, a companion style for the cell's inner paragraph, since
    /// the target schema cannot apply text alignment at the cell level.
    fn cell_style(
        &mut self,
        tag: &str,
        odf_attrs: &[(String, String)],
        base: Option<&Style>,
        dynamic: &mut DynamicStyles,
    ) -> GeneratedStyle {
        let mut para_attrs = Vec::new();
        let mut cell_attrs = Vec::new();
        for (name, value) in odf_attrs {
            if name == "fo:text-align" || TEXT_PROPERTIES.contains(&name.as_str()) {
                para_attrs.push((name.clone(), value.clone()));
            } else if CELL_PROPERTIES.contains(&name.as_str()) {
                cell_attrs.push((name.clone(), value.clone()));
            }
        }

        let inner_style = if para_attrs.is_empty() {
            None
        } else {
            let base = Style::new(CELL_CONTENT_STYLE, StyleFamily::Paragraph);
            Some(self.paragraph_style("p", StyleFamily::Paragraph, &para_attrs, Some(&base), dynamic))
        };

        let style = if cell_attrs.is_empty() {
            None
        } else {
            let key = hash_key(tag, &cell_attrs);
            let name = match self.generated.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let name = self.next_name(key);
                    let attr_names: Vec<String> =
                        cell_attrs.iter().map(|(n, _)| n.clone()).collect();
                    // Cells always have a base style: the engine default
                    // when nothing else matched.
                    let parent = base
                        .map(|b| b.parent_attributes(&attr_names))
                        .unwrap_or_default();
                    dynamic.content.push(format!(
                        "<style:style style:name=\"{name}\" style:family=\"table-cell\">\
                         <style:table-cell-properties{parent} {}/></style:style>",
                        flatten(&cell_attrs)
                    ));
                    name
                }
            };
            Some(Style::new(name, StyleFamily::TableCell))
        };

        GeneratedStyle { style, inner_style }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::AttrMap;

    fn css(style: &str) -> CssDeclarations {
        let mut attrs = AttrMap::new();
        attrs.insert("style".to_string(), style.to_string());
        CssDeclarations::from_attrs(&attrs)
    }

    #[test]
    fn test_same_declarations_generate_one_style() {
        let mut generator = StyleGenerator::new();
        let mut dynamic = DynamicStyles::default();
        let declarations = css("margin-left: 4cm");

        let a = generator
            .generate("p", &declarations, None, &mut dynamic)
            .unwrap();
        let b = generator
            .generate("p", &declarations, None, &mut dynamic)
            .unwrap();
        assert_eq!(a.style.unwrap().name, b.style.unwrap().name);
        assert_eq!(dynamic.styles.len(), 1);
        assert!(dynamic.styles[0].contains("fo:margin-left=\"4cm\""));
    }

    #[test]
    fn test_px_converted_to_cm() {
        let mut generator = StyleGenerator::new();
        let mut dynamic = DynamicStyles::default();
        let out = generator
            .generate("p", &css("margin-left: 120px"), None, &mut dynamic)
            .unwrap();
        assert!(out.style.is_some());
        assert!(dynamic.styles[0].contains("fo:margin-left=\"2.717cm\""));
    }

    #[test]
    fn test_alignment_and_border_value_mapping() {
        let mut generator = StyleGenerator::new();
        let mut dynamic = DynamicStyles::default();
        generator
            .generate("p", &css("text-align: left"), None, &mut dynamic)
            .unwrap();
        assert!(dynamic.styles[0].contains("fo:text-align=\"start\""));
    }

    #[test]
    fn test_text_and_paragraph_buckets() {
        let mut generator = StyleGenerator::new();
        let mut dynamic = DynamicStyles::default();
        generator
            .generate("p", &css("color: red; margin-top: 12px"), None, &mut dynamic)
            .unwrap();
        let decl = &dynamic.styles[0];
        assert!(decl.contains("<style:text-properties fo:color=\"#ff0000\"/>"));
        assert!(decl.contains("<style:paragraph-properties fo:margin-top="));
    }

    #[test]
    fn test_cell_split() {
        let mut generator = StyleGenerator::new();
        let mut dynamic = DynamicStyles::default();
        let base = Style::new("svCell", StyleFamily::TableCell)
            .with_defaults(&[("fo:padding", "0.1cm")]);
        let out = generator
            .generate(
                "td",
                &css("text-align: center; background-color: #eeeeee"),
                Some(&base),
                &mut dynamic,
            )
            .unwrap();
        // Background stays on the cell, alignment moves to the inner
        // paragraph.
        let cell = out.style.unwrap();
        assert_eq!(cell.family, StyleFamily::TableCell);
        assert!(out.inner_style.is_some());
        assert_eq!(dynamic.content.len(), 1);
        assert!(dynamic.content[0].contains("fo:background-color=\"#eeeeee\""));
        // The cell family does not inherit: parent attributes are copied.
        assert!(dynamic.content[0].contains("fo:padding=\"0.1cm\""));
        assert_eq!(dynamic.styles.len(), 1);
        assert!(dynamic.styles[0].contains("fo:text-align=\"center\""));
    }

    #[test]
    fn test_unexpressible_tag_is_left_alone() {
        let mut generator = StyleGenerator::new();
        let mut dynamic = DynamicStyles::default();
        let out = generator
            .generate("li", &css("margin-left: 4cm"), None, &mut dynamic)
            .unwrap();
        assert!(out.style.is_none());
        assert!(dynamic.styles.is_empty());
    }
}
