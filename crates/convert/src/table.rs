//! Per-table sub-buffering and column-width inference.
//!
//! Column declarations must precede row markup in the target schema, but
//! the column count is only known once the first row has been fully
//! parsed. Each table therefore writes into its own buffer pair: `out`
//! receives the table start tag and, later, the column declarations;
//! `pending` holds everything parsed before the end of the first row and
//! is flushed into `out` once the count is final.

use scriven_style::resolver::TABLE_STYLE;
use scriven_style::{AttrMap, CssDeclarations, DynamicStyles, TableProperties};
use scriven_types::{format_number, Length, LengthUnit};

/// Content sizes below this floor count as this much; keeps a lone empty
/// cell from collapsing its column entirely.
const MIN_CELL_CONTENT: usize = 5;
/// Cap merged into the per-column running maximum, so one huge cell does
/// not starve every other column.
const MAX_CELL_CONTENT: usize = 100;
/// The target schema's relative column widths are scaled against this
/// total.
const REL_WIDTH_TOTAL: f64 = 65534.0;

#[derive(Debug)]
pub struct TableBuffer {
    /// Generated, document-unique style-name stem; columns are styled
    /// `{name}.1`, `{name}.2`, ...
    pub name: String,
    /// The style referenced by the table element itself.
    pub style_name: String,
    /// Table width in pixels, for converting pixel column widths.
    pub width_px: f64,
    pub props: TableProperties,
    /// False when the table declared `border="0"`; cells then inherit a
    /// borderless look.
    pub border: bool,
    /// Extracted `border-spacing`, applied at the cell level.
    pub border_spacing: Option<String>,
    pub out: String,
    pub pending: String,
    pub first_row_parsed: bool,
    pub nb_columns: usize,
    /// 0 outside cells, else the colspan of the current cell.
    pub in_cell: usize,
    /// Index of the current cell within its row.
    pub cell_index: i32,
    /// Characters accumulated in the current cell.
    pub cell_content_size: usize,
    /// Per-column running maximum content size.
    pub column_content_sizes: Vec<Option<usize>>,
    /// Per-column declared widths; the first declaration wins.
    pub column_widths: Vec<Option<Length>>,
}

impl TableBuffer {
    /// Sets up a table: extracts its border policy, resolves its width
    /// and registers a dynamic table style when an explicit width asks
    /// for one.
    pub fn new(
        name: String,
        attrs: &AttrMap,
        props: TableProperties,
        page_width_cm: f64,
        dynamic: &mut DynamicStyles,
    ) -> TableBuffer {
        let mut css = CssDeclarations::from_attrs(attrs);
        let border = attrs.get("border").is_none_or(|b| b == "1");
        let border_spacing = css.remove("border-spacing").map(|v| v.to_string());

        let has_width = css.get("width").is_some();
        let width = props.table_width(&css);
        let align = css
            .get("text-align")
            .and_then(|v| v.as_keyword())
            .unwrap_or("left")
            .to_string();
        let page_width = props.page_width.unwrap_or(page_width_cm);

        let (width_cm, percentage) = match width.unit {
            LengthUnit::Percent => (page_width * width.value / 100.0, format_number(width.value, 2)),
            unit => {
                let ratio = if unit == LengthUnit::Cm { 1.0 } else { props.px_per_cm };
                let width_cm = (width.value / ratio).min(page_width);
                (width_cm, format_number(width_cm / page_width * 100.0, 2))
            }
        };
        let width_px = width_cm * props.px_per_cm;

        let style_name = if has_width {
            dynamic.content.push(format!(
                "<style:style style:name=\"{name}\" style:family=\"table\" \
                 style:parent-style-name=\"{TABLE_STYLE}\"><style:table-properties \
                 style:width=\"{}cm\" style:rel-width=\"{percentage}%\" \
                 table:align=\"{align}\"/></style:style>",
                format_number(width_cm, 3)
            ));
            name.clone()
        } else {
            TABLE_STYLE.to_string()
        };

        TableBuffer {
            name,
            style_name,
            width_px,
            props,
            border,
            border_spacing,
            out: String::new(),
            pending: String::new(),
            first_row_parsed: false,
            nb_columns: 0,
            in_cell: 0,
            cell_index: -1,
            cell_content_size: 0,
            column_content_sizes: Vec::new(),
            column_widths: Vec::new(),
        }
    }

    /// Records a declared width for the current column. The first
    /// declaration encountered is kept.
    pub fn set_column_width(&mut self, width: Length) {
        let index = self.cell_index.max(0) as usize;
        while self.column_widths.len() <= index {
            self.column_widths.push(None);
        }
        if self.column_widths[index].is_none() {
            self.column_widths[index] = Some(width);
        }
    }

    /// Closes the current cell, folding its content statistics into the
    /// per-column running maxima. Spanning cells are skipped: their
    /// content cannot be attributed to a single column.
    pub fn end_cell(&mut self, is_col_tag: bool) {
        if !is_col_tag && self.in_cell == 1 {
            let index = self.cell_index.max(0) as usize;
            while self.column_content_sizes.len() <= index {
                self.column_content_sizes.push(None);
            }
            let longest = self.column_content_sizes[index]
                .unwrap_or(0)
                .max(self.cell_content_size)
                .max(MIN_CELL_CONTENT);
            self.column_content_sizes[index] = Some(longest.min(MAX_CELL_CONTENT));
        }
        self.in_cell = 0;
        self.cell_content_size = 0;
    }

    /// Computes the final column-width fractions. Exposed separately from
    /// the style dump so the distribution itself is testable.
    pub fn column_fractions(&self) -> Vec<f64> {
        let n = self.nb_columns;
        let min_width = (1.0 / (n as f64 * 2.0)).min(self.props.min_column_width);
        let max_width = 1.0 - min_width;

        // 1st step: fractions for columns with a usable declared width.
        let mut widths: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut remaining = 1.0;
        let mut r#unsized = 0usize;
        for i in 0..n {
            let declared = self
                .column_widths
                .get(i)
                .copied()
                .flatten()
                .and_then(|w| match w.unit {
                    LengthUnit::Px => Some(w.value / self.width_px),
                    LengthUnit::Percent => Some(w.value / 100.0),
                    // cm/pt declarations are ignored here.
                    _ => None,
                })
                // A width near 100% would starve every other column to
                // invisibility; treat it as unspecified.
                .filter(|pc| *pc > min_width && *pc < max_width);
            match declared {
                Some(pc) => {
                    widths.push(Some(pc));
                    remaining -= pc;
                }
                None => {
                    widths.push(None);
                    r#unsized += 1;
                }
            }
        }

        // Every unsized column is guaranteed the minimum width. When the
        // declared widths leave less than that, they are all abandoned
        // and the distribution restarts purely proportionally.
        if r#unsized > 0 && remaining < min_width * r#unsized as f64 {
            widths = vec![None; n];
            remaining = 1.0;
            r#unsized = n;
        }

        // 2nd step: distribute the remaining budget over the unsized
        // columns, proportionally to their accumulated content size.
        let content_at = |i: usize| -> usize {
            self.column_content_sizes.get(i).copied().flatten().unwrap_or(0)
        };
        let content_total: usize = (0..n)
            .filter(|i| widths[*i].is_none())
            .map(content_at)
            .sum();

        let mut surplus = 0.0;
        let mut unforced = 0usize;
        let mut forced = vec![false; n];
        let mut distributed = vec![false; n];
        for i in 0..n {
            if widths[i].is_some() {
                continue;
            }
            distributed[i] = true;
            let share = if content_total > 0 {
                (content_at(i) as f64 / content_total as f64) * remaining
            } else {
                remaining / r#unsized as f64
            };
            if share < min_width {
                surplus += min_width - share;
                forced[i] = true;
                widths[i] = Some(min_width);
            } else {
                unforced += 1;
                widths[i] = Some(share);
            }
        }

        // The width granted to forced-up columns is taken back
        // proportionally from the remaining distributed columns.
        if surplus > 0.0 && unforced > 0 {
            let cut = surplus / unforced as f64;
            for i in 0..n {
                if distributed[i] && !forced[i] {
                    widths[i] = widths[i].map(|w| w - cut);
                }
            }
        }

        widths.into_iter().map(|w| w.unwrap_or(0.0)).collect()
    }

    /// Emits one column style per discovered column into the dynamic
    /// content styles.
    pub fn compute_column_styles(&self, dynamic: &mut DynamicStyles) {
        for (i, fraction) in self.column_fractions().iter().enumerate() {
            let rel = (fraction * REL_WIDTH_TOTAL) as i64;
            dynamic.content.push(format!(
                "<style:style style:name=\"{}.{}\" style:family=\"table-column\">\
                 <style:table-column-properties style:rel-column-width=\"{rel}*\"/>\
                 </style:style>",
                self.name,
                i + 1
            ));
        }
    }
}
