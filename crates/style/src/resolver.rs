//! The styles manager: one per conversion target, owning the template
//! registry, the validated global mapping, the engine's built-in styles
//! and the derived-style generator.

use std::collections::BTreeMap;

use crate::css::{AttrMap, CssDeclarations};
use crate::error::StyleError;
use crate::generator::{DynamicStyles, StyleGenerator};
use crate::mapping::{validate_mapping, StylesMapping, ValidatedMapping};
use crate::properties::{ListProperties, TableProperties};
use crate::registry::{parse_styles, PageLayout, Style, StyleFamily, StyleRegistry};
use crate::tags;

// Styles the engine's base template ships with. Templates are free to
// override them; the names below are what the converter falls back to.
pub const BOLD_STYLE: &str = "svBold";
pub const ITALIC_STYLE: &str = "svItalic";
pub const UNDERLINE_STYLE: &str = "svUnderline";
pub const STRIKE_STYLE: &str = "svStrike";
pub const SUB_STYLE: &str = "svSub";
pub const SUP_STYLE: &str = "svSup";
pub const CELL_STYLE: &str = "svCell";
pub const HEADER_CELL_STYLE: &str = "svHeader";
pub const CELL_CONTENT_STYLE: &str = "svCellContent";
pub const TABLE_STYLE: &str = "svTable";
pub const KEEP_WITH_NEXT_PARA_STYLE: &str = "svKeepWithNext";
pub const KEEP_WITH_NEXT_ITEM_STYLE: &str = "svItemKeepWithNext";
pub const COMPACT_CELL_STYLE: &str = "svCompactCell";
pub const BULLET_ITEM_STYLE: &str = "svBulletItem";
pub const NUMBER_ITEM_STYLE: &str = "svNumberItem";
pub const BULLET_ITEM_KWN_STYLE: &str = "svBulletItemKeepWithNext";
pub const NUMBER_ITEM_KWN_STYLE: &str = "svNumberItemKeepWithNext";
pub const BULLETED_LIST_STYLE: &str = "svBulletedList";
pub const NUMBERED_LIST_STYLE: &str = "svNumberedList";
pub const PAGE_BREAK_STYLE: &str = "svPageBreak";
/// Prefix of the float-image styles (`svImageLeft`, `svImageRight`).
pub const IMAGE_STYLE_PREFIX: &str = "svImage";

const DEFAULT_CELL_PARAMS: &[(&str, &str)] =
    &[("fo:padding", "0.1cm"), ("fo:border", "0.018cm solid #000000")];
const DEFAULT_HEADER_PARAMS: &[(&str, &str)] = &[
    ("fo:padding", "0.1cm"),
    ("fo:border", "0.018cm solid #000000"),
    ("fo:background-color", "#e6e6e6"),
];

/// A style decision for one element: the style to reference on the
/// element itself (if any), plus the style for a synthesized inner
/// paragraph when the element is a cell carrying text-level declarations.
#[derive(Debug, Clone, Default)]
pub struct ResolvedStyle {
    pub style: Option<Style>,
    pub inner_style: Option<String>,
}

pub struct StylesManager {
    pub registry: StyleRegistry,
    pub page_layout: PageLayout,
    global: ValidatedMapping,
    /// Engine-provided styles reachable by class name.
    builtins: BTreeMap<&'static str, Style>,
    /// Engine-provided default styles per source tag.
    tag_defaults: BTreeMap<&'static str, Style>,
    generator: StyleGenerator,
    pub dynamic: DynamicStyles,
}

fn builtins_by_name() -> BTreeMap<&'static str, Style> {
    BTreeMap::from([
        (
            KEEP_WITH_NEXT_PARA_STYLE,
            Style::new(KEEP_WITH_NEXT_PARA_STYLE, StyleFamily::Paragraph),
        ),
        (
            // Common to bullet and number items; the converter picks the
            // matching concrete item style from the enclosing list kind.
            KEEP_WITH_NEXT_ITEM_STYLE,
            Style::new(KEEP_WITH_NEXT_ITEM_STYLE, StyleFamily::Paragraph),
        ),
        (
            COMPACT_CELL_STYLE,
            Style::new(COMPACT_CELL_STYLE, StyleFamily::TableCell),
        ),
    ])
}

fn default_tag_styles() -> BTreeMap<&'static str, Style> {
    let text = |name: &'static str| Style::new(name, StyleFamily::Text);
    let mut map = BTreeMap::from([
        ("b", text(BOLD_STYLE)),
        ("strong", text(BOLD_STYLE)),
        ("i", text(ITALIC_STYLE)),
        ("em", text(ITALIC_STYLE)),
        ("u", text(UNDERLINE_STYLE)),
        ("strike", text(STRIKE_STYLE)),
        ("s", text(STRIKE_STYLE)),
        ("sub", text(SUB_STYLE)),
        ("sup", text(SUP_STYLE)),
        (
            "td",
            Style::new(CELL_STYLE, StyleFamily::TableCell).with_defaults(DEFAULT_CELL_PARAMS),
        ),
        (
            "th",
            Style::new(HEADER_CELL_STYLE, StyleFamily::TableCell)
                .with_defaults(DEFAULT_HEADER_PARAMS),
        ),
    ]);
    for (tag, name) in [
        ("h1", "svH1"),
        ("h2", "svH2"),
        ("h3", "svH3"),
        ("h4", "svH4"),
        ("h5", "svH5"),
        ("h6", "svH6"),
    ] {
        let level = tags::heading_level(tag).unwrap_or(1);
        map.insert(
            tag,
            Style::new(name, StyleFamily::Paragraph).with_outline_level(level),
        );
    }
    map
}

impl StylesManager {
    /// Builds a manager from a template's styles stream, with an empty
    /// global mapping.
    pub fn new(styles_xml: &str) -> Result<StylesManager, StyleError> {
        let parsed = parse_styles(styles_xml)?;
        Ok(StylesManager {
            registry: parsed.registry,
            page_layout: parsed.page_layout,
            global: ValidatedMapping::default(),
            builtins: builtins_by_name(),
            tag_defaults: default_tag_styles(),
            generator: StyleGenerator::new(),
            dynamic: DynamicStyles::default(),
        })
    }

    /// Validates and installs the document-wide styles mapping. Invalid
    /// entries are rejected before any conversion begins.
    pub fn set_global_mapping(&mut self, mapping: &StylesMapping) -> Result<(), StyleError> {
        self.global = self.validate_mapping(mapping)?;
        Ok(())
    }

    /// Validates a mapping (global or call-local) against the template's
    /// registry and the engine built-ins.
    pub fn validate_mapping(&self, mapping: &StylesMapping) -> Result<ValidatedMapping, StyleError> {
        validate_mapping(
            mapping,
            |display_name| {
                self.registry
                    .by_display_name(display_name)
                    .or_else(|| self.builtins.get(display_name))
            },
            Self::check_adequacy,
        )
    }

    /// Rejects structurally impossible assignments: a text style on a
    /// paragraph-wide element or the reverse.
    fn check_adequacy(tag: &str, style: &Style) -> Result<(), StyleError> {
        let paragraph_wide = tags::PARA_TAGS.contains(&tag) || tags::is_heading(tag);
        if paragraph_wide && style.family == StyleFamily::Text {
            return Err(StyleError::TextStyleOnParagraph {
                tag: tag.to_string(),
                style: style.display_name.clone(),
            });
        }
        if tags::is_inner(tag) && style.family == StyleFamily::Paragraph {
            return Err(StyleError::ParagraphStyleOnText {
                tag: tag.to_string(),
                style: style.display_name.clone(),
            });
        }
        Ok(())
    }

    /// Resolves the style for one element. Lookup order, highest priority
    /// first: local mapping by class, local by tag, global by class,
    /// global by tag, registry style named like the class, engine
    /// built-in named like the class, registry style at the element's
    /// outline level, engine default for the tag. A derived style is
    /// generated on top when inline declarations demand one.
    pub fn find_style(
        &mut self,
        tag: &str,
        attrs: Option<&AttrMap>,
        class_override: Option<&str>,
        local: &ValidatedMapping,
    ) -> Result<ResolvedStyle, StyleError> {
        let class = class_override.or_else(|| attrs.and_then(|a| a.get("class").map(String::as_str)));
        let heading_delta = local
            .heading_delta
            .or(self.global.heading_delta)
            .unwrap_or(0);

        let base: Option<Style> = class
            .and_then(|c| local.class_style(c))
            .or_else(|| local.tag_style(tag, attrs))
            .or_else(|| class.and_then(|c| self.global.class_style(c)))
            .or_else(|| self.global.tag_style(tag, attrs))
            .or_else(|| {
                class.and_then(|c| {
                    self.registry
                        .get(c)
                        .or_else(|| self.registry.by_display_name(c))
                })
            })
            .or_else(|| class.and_then(|c| self.builtins.get(c)))
            .or_else(|| {
                tags::heading_level(tag).and_then(|level| {
                    let level = (level as i32 + heading_delta).max(1) as u8;
                    self.registry.paragraph_style_at_level(level)
                })
            })
            .or_else(|| self.tag_defaults.get(tag))
            .cloned();

        if let Some(style) = &base {
            Self::check_adequacy(tag, style)?;
        }

        let css = attrs.map(CssDeclarations::from_attrs).unwrap_or_default();
        let generated = self
            .generator
            .generate(tag, &css, base.as_ref(), &mut self.dynamic)?;
        Ok(ResolvedStyle {
            style: generated.style.or(base),
            inner_style: generated.inner_style,
        })
    }

    /// The table policies in force: local mapping first, then global,
    /// then the engine defaults. There is always one.
    pub fn table_properties(&self, local: &ValidatedMapping) -> TableProperties {
        local
            .table
            .clone()
            .or_else(|| self.global.table.clone())
            .unwrap_or_default()
    }

    /// List properties from the mappings, when a `ul`/`ol` policy was
    /// configured.
    pub fn list_properties(&self, tag: &str, local: &ValidatedMapping) -> Option<ListProperties> {
        local
            .list(tag)
            .or_else(|| self.global.list(tag))
            .cloned()
    }

    pub fn builtin(&self, name: &str) -> Option<&Style> {
        self.builtins.get(name)
    }

    /// Hands out the styles generated during this conversion, resetting
    /// the areas for the next run.
    pub fn take_dynamic(&mut self) -> DynamicStyles {
        std::mem::take(&mut self.dynamic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MappingError;

    const STYLES_XML: &str = r#"<office:document-styles>
  <style:style style:name="Body" style:family="paragraph"/>
  <style:style style:name="Heading_20_2" style:display-name="Heading 2"
               style:family="paragraph" style:default-outline-level="2"/>
  <style:style style:name="Code_20_In_20_Text" style:display-name="Code In Text"
               style:family="text"/>
</office:document-styles>"#;

    fn manager() -> StylesManager {
        StylesManager::new(STYLES_XML).unwrap()
    }

    fn empty_local() -> ValidatedMapping {
        ValidatedMapping::default()
    }

    #[test]
    fn test_no_mapping_no_style_for_plain_paragraph() {
        let mut m = manager();
        let resolved = m.find_style("p", None, None, &empty_local()).unwrap();
        assert!(resolved.style.is_none());
    }

    #[test]
    fn test_default_tag_styles() {
        let mut m = manager();
        let resolved = m.find_style("b", None, None, &empty_local()).unwrap();
        assert_eq!(resolved.style.unwrap().name, BOLD_STYLE);
    }

    #[test]
    fn test_mapping_beats_defaults() {
        let mut m = manager();
        m.set_global_mapping(&StylesMapping::new().map("b", "Code In Text"))
            .unwrap();
        let resolved = m.find_style("b", None, None, &empty_local()).unwrap();
        assert_eq!(resolved.style.unwrap().name, "Code_20_In_20_Text");
    }

    #[test]
    fn test_local_mapping_beats_global() {
        let mut m = manager();
        m.set_global_mapping(&StylesMapping::new().map("p", "Body")).unwrap();
        let local = m
            .validate_mapping(&StylesMapping::new().map("p", "Heading 2"))
            .unwrap();
        let resolved = m.find_style("p", None, None, &local).unwrap();
        assert_eq!(resolved.style.unwrap().name, "Heading_20_2");
    }

    #[test]
    fn test_heading_resolves_by_outline_level() {
        let mut m = manager();
        let resolved = m.find_style("h2", None, None, &empty_local()).unwrap();
        assert_eq!(resolved.style.unwrap().name, "Heading_20_2");
        // No registry style at level 3: the engine default takes over.
        let resolved = m.find_style("h3", None, None, &empty_local()).unwrap();
        assert_eq!(resolved.style.unwrap().name, "svH3");
    }

    #[test]
    fn test_heading_delta() {
        let mut m = manager();
        m.set_global_mapping(&StylesMapping::new().with_heading_delta(1))
            .unwrap();
        let resolved = m.find_style("h1", None, None, &empty_local()).unwrap();
        assert_eq!(resolved.style.unwrap().name, "Heading_20_2");
    }

    #[test]
    fn test_class_resolves_against_registry_and_builtins() {
        let mut m = manager();
        let mut attrs = AttrMap::new();
        attrs.insert("class".to_string(), "Body".to_string());
        let resolved = m.find_style("p", Some(&attrs), None, &empty_local()).unwrap();
        assert_eq!(resolved.style.unwrap().name, "Body");

        let resolved = m
            .find_style("li", None, Some(KEEP_WITH_NEXT_ITEM_STYLE), &empty_local())
            .unwrap();
        assert_eq!(resolved.style.unwrap().name, KEEP_WITH_NEXT_ITEM_STYLE);
    }

    #[test]
    fn test_unknown_style_rejected_at_validation() {
        let m = manager();
        let err = m
            .validate_mapping(&StylesMapping::new().map("p", "No Such Style"))
            .unwrap_err();
        assert!(matches!(
            err,
            StyleError::Mapping(MappingError::StyleNotFound(_))
        ));
    }

    #[test]
    fn test_adequacy_rejected_at_validation() {
        let m = manager();
        let err = m
            .validate_mapping(&StylesMapping::new().map("p", "Code In Text"))
            .unwrap_err();
        assert!(matches!(err, StyleError::TextStyleOnParagraph { .. }));

        let err = m
            .validate_mapping(&StylesMapping::new().map("b", "Body"))
            .unwrap_err();
        assert!(matches!(err, StyleError::ParagraphStyleOnText { .. }));
    }

    #[test]
    fn test_inline_css_generates_derived_style() {
        let mut m = manager();
        let mut attrs = AttrMap::new();
        attrs.insert("style".to_string(), "margin-left: 4cm".to_string());
        let a = m.find_style("p", Some(&attrs), None, &empty_local()).unwrap();
        let b = m.find_style("p", Some(&attrs), None, &empty_local()).unwrap();
        let (a, b) = (a.style.unwrap(), b.style.unwrap());
        assert_eq!(a.name, b.name);
        assert_eq!(m.dynamic.styles.len(), 1);
    }

    #[test]
    fn test_table_properties_fall_back_to_defaults() {
        let m = manager();
        let props = m.table_properties(&empty_local());
        assert_eq!(props, TableProperties::default());
    }
}
