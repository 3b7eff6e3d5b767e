//! The template's style registry, parsed from its styles stream.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scriven_types::{Length, LengthUnit};

use crate::css::AttrMap;
use crate::error::StyleError;

/// The structural class a style applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleFamily {
    Paragraph,
    Text,
    TableCell,
    TableColumn,
    List,
    Other,
}

impl StyleFamily {
    pub fn parse(s: &str) -> StyleFamily {
        match s {
            "paragraph" => StyleFamily::Paragraph,
            "text" => StyleFamily::Text,
            "table-cell" => StyleFamily::TableCell,
            "table-column" => StyleFamily::TableColumn,
            "list" => StyleFamily::List,
            _ => StyleFamily::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StyleFamily::Paragraph => "paragraph",
            StyleFamily::Text => "text",
            StyleFamily::TableCell => "table-cell",
            StyleFamily::TableColumn => "table-column",
            StyleFamily::List => "list",
            StyleFamily::Other => "other",
        }
    }
}

/// One named formatting definition, either parsed from the template or
/// synthesized at conversion time.
#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub name: String,
    pub family: StyleFamily,
    /// The name the template's editor shows; defaults to `name`.
    pub display_name: String,
    pub style_class: Option<String>,
    pub outline_level: Option<u8>,
    pub font_size: Option<Length>,
    /// Default target-schema attributes, copied onto derived styles when
    /// the family does not support native inheritance.
    pub defaults: Vec<(String, String)>,
}

impl Style {
    pub fn new(name: impl Into<String>, family: StyleFamily) -> Style {
        let name = name.into();
        Style {
            display_name: name.clone(),
            name,
            family,
            style_class: None,
            outline_level: None,
            font_size: None,
            defaults: Vec::new(),
        }
    }

    pub fn with_outline_level(mut self, level: u8) -> Style {
        self.outline_level = Some(level);
        self
    }

    pub fn with_defaults(mut self, defaults: &[(&str, &str)]) -> Style {
        self.defaults = defaults
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self
    }

    /// Parses a raw font-size attribute such as `12pt` or `115%`.
    pub fn set_font_size(&mut self, raw: &str) {
        let raw = raw.trim();
        let digits: String = raw
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let unit = match &raw[digits.len()..] {
            "pt" => LengthUnit::Pt,
            "%" => LengthUnit::Percent,
            "cm" => LengthUnit::Cm,
            "px" => LengthUnit::Px,
            _ => return,
        };
        if let Ok(value) = digits.parse::<f64>() {
            self.font_size = Some(Length::new(value, unit));
        }
    }

    /// Namespace prefix of the `style-name` attribute referencing this
    /// style on an element.
    pub fn style_name_ns(&self) -> &'static str {
        if self.family == StyleFamily::TableCell {
            "table"
        } else {
            "text"
        }
    }

    /// Whether the target schema honors a native parent-style reference
    /// for this family. Cell styles must have parent attributes copied in
    /// full instead.
    pub fn inherit_works(&self) -> bool {
        self.family != StyleFamily::TableCell
    }

    /// The attribute string to put on the element referencing this style.
    pub fn odf_attributes(&self, attrs: Option<&AttrMap>) -> String {
        self.odf_attributes_ext(attrs, true, false, &[])
    }

    pub fn odf_attributes_ext(
        &self,
        attrs: Option<&AttrMap>,
        with_name: bool,
        with_defaults: bool,
        exclude: &[String],
    ) -> String {
        let mut res = String::new();
        if with_name {
            res.push_str(&format!(
                " {}:style-name=\"{}\"",
                self.style_name_ns(),
                self.name
            ));
        }
        if let Some(level) = self.outline_level {
            res.push_str(&format!(" text:outline-level=\"{level}\""));
        }
        if let Some(attrs) = attrs {
            if let Some(colspan) = attrs.get("colspan") {
                res.push_str(&format!(" table:number-columns-spanned=\"{colspan}\""));
            }
            if let Some(rowspan) = attrs.get("rowspan") {
                res.push_str(&format!(" table:number-rows-spanned=\"{rowspan}\""));
            }
        }
        if with_defaults {
            for (name, value) in &self.defaults {
                if exclude.contains(name) {
                    continue;
                }
                res.push_str(&format!(" {name}=\"{value}\""));
            }
        }
        res
    }

    /// What a derived style must carry to be based on this one: a native
    /// parent reference when the family inherits, else this style's
    /// default attributes in full (minus the keys the child overrides).
    pub fn parent_attributes(&self, child_keys: &[String]) -> String {
        if self.inherit_works() {
            format!(" style:parent-style-name=\"{}\"", self.name)
        } else {
            self.odf_attributes_ext(None, false, true, child_keys)
        }
    }
}

/// The styles parsed from a template, keyed by internal name.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: BTreeMap<String, Style>,
}

impl StyleRegistry {
    pub fn insert(&mut self, style: Style) {
        self.styles.insert(style.name.clone(), style);
    }

    pub fn get(&self, name: &str) -> Option<&Style> {
        self.styles.get(name)
    }

    pub fn by_display_name(&self, display_name: &str) -> Option<&Style> {
        self.styles.values().find(|s| s.display_name == display_name)
    }

    /// The paragraph style sitting at the given outline level, if any.
    pub fn paragraph_style_at_level(&self, level: u8) -> Option<&Style> {
        self.styles
            .values()
            .find(|s| s.family == StyleFamily::Paragraph && s.outline_level == Some(level))
    }

    pub fn of_family(&self, family: StyleFamily) -> impl Iterator<Item = &Style> {
        self.styles.values().filter(move |s| s.family == family)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }
}

/// The master page geometry, in centimeters.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub name: String,
    pub width: f64,
    pub height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
}

impl Default for PageLayout {
    fn default() -> Self {
        // A4 with 2cm margins, assumed when the template declares no page
        // geometry (spreadsheet-flavored templates).
        PageLayout {
            name: "Standard".to_string(),
            width: 21.0,
            height: 29.7,
            margin_top: 2.0,
            margin_right: 2.0,
            margin_bottom: 2.0,
            margin_left: 2.0,
        }
    }
}

impl PageLayout {
    /// Page width minus the side margins.
    pub fn usable_width(&self) -> f64 {
        self.width - self.margin_left - self.margin_right
    }
}

/// Everything the engine needs from a template's styles stream.
#[derive(Debug, Clone, Default)]
pub struct TemplateStyles {
    pub registry: StyleRegistry,
    pub page_layout: PageLayout,
}

/// Extracts the numeric part of a CSS length such as `21cm`.
fn css_float(value: &str) -> f64 {
    let digits: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    digits.parse().unwrap_or(0.0)
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>, StyleError> {
    for a in e.attributes() {
        let a = a?;
        if a.key.as_ref() == name.as_bytes() {
            let raw = std::str::from_utf8(&a.value)?;
            let value = quick_xml::escape::unescape(raw)
                .map(|c| c.into_owned())
                .unwrap_or_else(|_| raw.to_string());
            return Ok(Some(value));
        }
    }
    Ok(None)
}

#[derive(PartialEq)]
enum State {
    Reading,
    InStyle,
    InPageLayout,
    InMasterStyles,
}

struct StylesReader {
    state: State,
    registry: StyleRegistry,
    current_style: Option<Style>,
    current_layout: Option<PageLayout>,
    layouts: BTreeMap<String, PageLayout>,
    master_layout: Option<String>,
}

impl StylesReader {
    fn new() -> StylesReader {
        StylesReader {
            state: State::Reading,
            registry: StyleRegistry::default(),
            current_style: None,
            current_layout: None,
            layouts: BTreeMap::new(),
            master_layout: None,
        }
    }

    fn read_style(e: &BytesStart) -> Result<Option<Style>, StyleError> {
        let Some(name) = attr(e, "style:name")? else {
            return Ok(None);
        };
        let family = attr(e, "style:family")?.unwrap_or_default();
        let mut style = Style::new(name, StyleFamily::parse(&family));
        style.style_class = attr(e, "style:class")?;
        if let Some(dn) = attr(e, "style:display-name")? {
            style.display_name = dn;
        }
        if let Some(level) = attr(e, "style:default-outline-level")?
            && !level.trim().is_empty()
            && let Ok(level) = level.trim().parse()
        {
            style.outline_level = Some(level);
        }
        Ok(Some(style))
    }

    fn open(&mut self, e: &BytesStart, self_closing: bool) -> Result<(), StyleError> {
        match e.name().as_ref() {
            b"style:style" => {
                if let Some(style) = Self::read_style(e)? {
                    if self_closing {
                        self.registry.insert(style);
                    } else {
                        self.state = State::InStyle;
                        self.current_style = Some(style);
                    }
                }
            }
            b"style:text-properties" if self.state == State::InStyle => {
                if let Some(size) = attr(e, "fo:font-size")?
                    && let Some(style) = self.current_style.as_mut()
                {
                    style.set_font_size(&size);
                }
            }
            b"style:page-layout" => {
                let mut layout = PageLayout::default();
                if let Some(name) = attr(e, "style:name")? {
                    layout.name = name;
                }
                if self_closing {
                    self.layouts.insert(layout.name.clone(), layout);
                } else {
                    self.state = State::InPageLayout;
                    self.current_layout = Some(layout);
                }
            }
            b"style:page-layout-properties" if self.state == State::InPageLayout => {
                if let Some(layout) = self.current_layout.as_mut() {
                    if let Some(w) = attr(e, "fo:page-width")? {
                        layout.width = css_float(&w);
                    }
                    if let Some(h) = attr(e, "fo:page-height")? {
                        layout.height = css_float(&h);
                    }
                    let default_margin =
                        attr(e, "fo:margin")?.map(|m| css_float(&m)).unwrap_or(2.0);
                    let margin = |name: &str| -> Result<Option<f64>, StyleError> {
                        Ok(attr(e, name)?.map(|m| css_float(&m)))
                    };
                    layout.margin_top = margin("fo:margin-top")?.unwrap_or(default_margin);
                    layout.margin_right = margin("fo:margin-right")?.unwrap_or(default_margin);
                    layout.margin_bottom = margin("fo:margin-bottom")?.unwrap_or(default_margin);
                    layout.margin_left = margin("fo:margin-left")?.unwrap_or(default_margin);
                }
            }
            b"office:master-styles" => {
                self.state = State::InMasterStyles;
            }
            b"style:master-page" if self.state == State::InMasterStyles => {
                if let Some(name) = attr(e, "style:page-layout-name")? {
                    self.master_layout = Some(name);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn close(&mut self, name: &[u8]) {
        match name {
            b"style:style" => {
                if let Some(style) = self.current_style.take() {
                    self.registry.insert(style);
                }
                self.state = State::Reading;
            }
            b"style:page-layout" => {
                if let Some(layout) = self.current_layout.take() {
                    self.layouts.insert(layout.name.clone(), layout);
                }
                self.state = State::Reading;
            }
            b"office:master-styles" => {
                self.state = State::Reading;
            }
            _ => {}
        }
    }

    fn finish(mut self) -> TemplateStyles {
        let page_layout = self
            .master_layout
            .take()
            .and_then(|name| self.layouts.remove(&name))
            .or_else(|| self.layouts.into_values().next())
            .unwrap_or_default();
        TemplateStyles {
            registry: self.registry,
            page_layout,
        }
    }
}

/// Parses a template's styles stream into a registry and its master page
/// layout.
pub fn parse_styles(styles_xml: &str) -> Result<TemplateStyles, StyleError> {
    let mut reader = Reader::from_str(styles_xml);
    let mut buf = Vec::new();
    let mut styles = StylesReader::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => styles.open(&e, false)?,
            Event::Empty(e) => styles.open(&e, true)?,
            Event::End(e) => styles.close(e.name().as_ref()),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(styles.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-styles xmlns:office="o" xmlns:style="s" xmlns:fo="f" xmlns:text="t">
 <office:styles>
  <style:style style:name="Standard" style:family="paragraph" style:class="text"/>
  <style:style style:name="Heading_20_1" style:display-name="Heading 1"
               style:family="paragraph" style:default-outline-level="1">
   <style:text-properties fo:font-size="14pt"/>
  </style:style>
  <style:style style:name="Emphasis" style:family="text"/>
 </office:styles>
 <office:automatic-styles>
  <style:page-layout style:name="pm1">
   <style:page-layout-properties fo:page-width="21.001cm" fo:page-height="29.7cm"
     fo:margin-top="2cm" fo:margin-bottom="2cm" fo:margin-left="1.5cm" fo:margin-right="1.5cm"/>
  </style:page-layout>
 </office:automatic-styles>
 <office:master-styles>
  <style:master-page style:name="Standard" style:page-layout-name="pm1"/>
 </office:master-styles>
</office:document-styles>"#;

    #[test]
    fn test_parse_registry() {
        let parsed = parse_styles(STYLES_XML).unwrap();
        assert_eq!(parsed.registry.len(), 3);

        let heading = parsed.registry.get("Heading_20_1").unwrap();
        assert_eq!(heading.display_name, "Heading 1");
        assert_eq!(heading.outline_level, Some(1));
        assert_eq!(heading.font_size, Some(Length::new(14.0, LengthUnit::Pt)));
        assert_eq!(heading.family, StyleFamily::Paragraph);

        assert!(parsed.registry.by_display_name("Heading 1").is_some());
        assert!(parsed.registry.paragraph_style_at_level(1).is_some());
        assert!(parsed.registry.paragraph_style_at_level(4).is_none());
    }

    #[test]
    fn test_parse_page_layout() {
        let parsed = parse_styles(STYLES_XML).unwrap();
        let layout = parsed.page_layout;
        assert_eq!(layout.name, "pm1");
        assert!((layout.width - 21.001).abs() < 1e-9);
        assert!((layout.usable_width() - 18.001).abs() < 1e-9);
    }

    #[test]
    fn test_missing_layout_falls_back() {
        let parsed = parse_styles("<office:styles/>").unwrap();
        assert_eq!(parsed.page_layout, PageLayout::default());
    }

    #[test]
    fn test_cell_family_copies_parent_attributes() {
        let style = Style::new("CellBase", StyleFamily::TableCell)
            .with_defaults(&[("fo:padding", "0.1cm"), ("fo:border", "none")]);
        assert!(!style.inherit_works());
        let parent = style.parent_attributes(&["fo:border".to_string()]);
        assert!(parent.contains("fo:padding=\"0.1cm\""));
        assert!(!parent.contains("fo:border"));

        let para = Style::new("Standard", StyleFamily::Paragraph);
        assert_eq!(
            para.parent_attributes(&[]),
            " style:parent-style-name=\"Standard\""
        );
    }
}
