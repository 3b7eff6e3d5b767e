//! Structured property objects accepted as styles-mapping values.

use serde::{Deserialize, Serialize};

use scriven_types::{format_number, Length, LengthUnit, PX_PER_CM};

use crate::css::CssDeclarations;

/// Table-wide policies: how table and column widths are derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableProperties {
    /// Width, in cm, that percentage table widths are resolved against.
    /// Defaults to the usable width of the template's master page.
    pub page_width: Option<f64>,
    /// Ratio used to convert pixel widths to cm.
    pub px_per_cm: f64,
    /// A table with a pixel width above this threshold is widened to 100%.
    pub wide_above: Option<u32>,
    /// Minimum width guaranteed to every column, as a fraction of the
    /// table width.
    pub min_column_width: f64,
}

impl Default for TableProperties {
    fn default() -> Self {
        TableProperties {
            page_width: None,
            px_per_cm: PX_PER_CM,
            wide_above: Some(495),
            min_column_width: 0.07,
        }
    }
}

impl TableProperties {
    /// The effective table width: the declared CSS width, except that no
    /// declaration (or a pixel width above `wide_above`) means full width.
    pub fn table_width(&self, css: &CssDeclarations) -> Length {
        let Some(width) = css.get("width").and_then(|v| v.as_length()) else {
            return Length::percent(100.0);
        };
        if let Some(threshold) = self.wide_above
            && width.unit == LengthUnit::Px
            && width.value > threshold as f64
        {
            return Length::percent(100.0);
        }
        width
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Bullet,
    Number,
}

/// The shape of a generated list style: marker formats per level and the
/// indentation geometry, in inches.
///
/// `levels` may exceed the number of `formats`; formats then repeat
/// cyclically over the deeper levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListProperties {
    pub kind: ListKind,
    pub levels: u8,
    pub formats: Vec<String>,
    /// Suffix printed after each number; unused for bulleted lists.
    #[serde(default)]
    pub suffixes: Vec<String>,
    /// Indentation added at each level.
    pub delta: f64,
    /// Space between the marker and the text.
    pub space: f64,
}

pub const BULLET_FORMATS: &[&str] = &["\u{2022}", "\u{25e6}", "\u{25aa}"];
pub const NUMBER_FORMATS: &[&str] = &["1"];
pub const NUMBER_SUFFIXES: &[&str] = &["."];

/// Character style applied to bullet markers in generated list styles.
const BULLET_TEXT_STYLE: &str = "svBulletSymbol";
/// Character style applied to number markers in generated list styles.
const NUMBER_TEXT_STYLE: &str = "svNumberSymbol";

impl ListProperties {
    pub fn bulleted() -> ListProperties {
        ListProperties {
            kind: ListKind::Bullet,
            levels: 4,
            formats: BULLET_FORMATS.iter().map(|s| s.to_string()).collect(),
            suffixes: Vec::new(),
            delta: 0.25,
            space: 0.25,
        }
    }

    pub fn numbered() -> ListProperties {
        ListProperties {
            kind: ListKind::Number,
            levels: 4,
            formats: NUMBER_FORMATS.iter().map(|s| s.to_string()).collect(),
            suffixes: NUMBER_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            delta: 0.25,
            space: 0.25,
        }
    }

    /// Creates the properties for a specific marker format, e.g. a list
    /// declared with `list-style-type: upper-roman`.
    pub fn with_format(kind: ListKind, format: &str) -> ListProperties {
        let mut props = match kind {
            ListKind::Bullet => ListProperties::bulleted(),
            ListKind::Number => ListProperties::numbered(),
        };
        props.formats = vec![format.to_string()];
        props
    }

    fn format_at(&self, level: usize) -> &str {
        if self.formats.is_empty() {
            ""
        } else {
            &self.formats[level % self.formats.len()]
        }
    }

    fn suffix_at(&self, level: usize) -> &str {
        if self.suffixes.is_empty() {
            ""
        } else {
            &self.suffixes[level % self.suffixes.len()]
        }
    }

    /// Renders the target-schema list-style declaration under `name`.
    pub fn dump_style(&self, name: &str) -> String {
        let kind = match self.kind {
            ListKind::Bullet => "bullet",
            ListKind::Number => "number",
        };
        let space = format_number(self.space, 3);
        let mut levels = Vec::with_capacity(self.levels as usize);
        let mut space_before = 0.0;
        for i in 0..self.levels as usize {
            space_before += self.delta;
            let sb = format_number(space_before, 3);
            let (level_attrs, text_props) = match self.kind {
                ListKind::Bullet => (
                    format!(
                        "text:style-name=\"{}\" text:bullet-char=\"{}\"",
                        BULLET_TEXT_STYLE,
                        self.format_at(i)
                    ),
                    "\n    <style:text-properties style:font-name=\"OpenSymbol\"/>".to_string(),
                ),
                ListKind::Number => (
                    format!(
                        "text:style-name=\"{}\" style:num-suffix=\"{}\" style:num-format=\"{}\"",
                        NUMBER_TEXT_STYLE,
                        self.suffix_at(i),
                        self.format_at(i)
                    ),
                    String::new(),
                ),
            };
            levels.push(format!(
                "  <text:list-level-style-{kind} text:level=\"{}\" {level_attrs}>\n    \
                 <style:list-level-properties text:space-before=\"{sb}in\" \
                 text:min-label-width=\"{space}in\"/>{text_props}\n  </text:list-level-style-{kind}>",
                i + 1
            ));
        }
        format!(
            "<text:list-style style:name=\"{name}\">\n{}\n</text:list-style>",
            levels.join("\n")
        )
    }
}
