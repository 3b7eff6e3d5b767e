//! The single-pass XHTML to ODT conversion driver.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use scriven_style::resolver::{
    BULLET_ITEM_KWN_STYLE, BULLET_ITEM_STYLE, BULLETED_LIST_STYLE, KEEP_WITH_NEXT_ITEM_STYLE,
    KEEP_WITH_NEXT_PARA_STYLE, NUMBER_ITEM_KWN_STYLE, NUMBER_ITEM_STYLE, NUMBERED_LIST_STYLE,
};
use scriven_style::{AttrMap, CssDeclarations, ListKind, ListProperties, StylesManager,
    ValidatedMapping};

use crate::element::ElementFrame;
use crate::error::ConvertError;
use crate::importer::{ResourceImporter, StyleNamer};
use crate::table::TableBuffer;
use crate::tags::{
    is_inner, is_list, is_styled_inner, not_inside_list, not_inside_para, not_inside_para_or_para,
    odf_tag, ElemKind, IGNORABLE_TAGS, OUTER_TAGS, PARA_TAGS, TABLE_CELL_TAGS, TABLE_COL_TAGS,
    TABLE_ROW_TAGS,
};
use crate::whitespace::crunch;

/// `type` attribute values of legacy list markup, mapped to their CSS
/// `list-style-type` equivalents.
const TYPE_TO_LIST_STYLE: &[(&str, &str)] = &[
    ("1", "decimal"),
    ("a", "lower-alpha"),
    ("A", "upper-alpha"),
    ("i", "lower-roman"),
    ("I", "upper-roman"),
];

/// `list-style-type` values the target schema supports, with the marker
/// format each one produces.
const LIST_FORMATS: &[(&str, &str)] = &[
    ("lower-alpha", "a"),
    ("upper-alpha", "A"),
    ("lower-latin", "a"),
    ("upper-latin", "A"),
    ("lower-roman", "i"),
    ("upper-roman", "I"),
    ("decimal", "1"),
    ("disc", "\u{2022}"),
    ("circle", "\u{25e6}"),
    ("square", "\u{25aa}"),
    ("none", ""),
];

/// Converts an XHTML fragment to target-schema markup. Generated style
/// declarations land in the manager's dynamic areas; embedded resources
/// go through `importer`.
///
/// With `keep_with_next`, the last top-level paragraph or list item of
/// the input is tagged so that a page break can never separate it from
/// the content that follows.
pub fn convert<'a>(
    xhtml: &str,
    manager: &'a mut StylesManager,
    local: &'a ValidatedMapping,
    keep_with_next: bool,
    importer: Option<&'a mut dyn ResourceImporter>,
    namer: &'a mut dyn StyleNamer,
) -> Result<String, ConvertError> {
    let source = if keep_with_next {
        apply_keep_with_next(xhtml)
    } else {
        xhtml.to_string()
    };
    Converter::new(manager, local, importer, namer).run(&source)
}

/// Tags the last top-level `<p` or `<li` of the input with the engine's
/// keep-with-next class, unless it already carries a class.
fn apply_keep_with_next(xhtml: &str) -> String {
    let p = xhtml.rfind("<p").map(|v| v as isize).unwrap_or(-1);
    let li = xhtml.rfind("<li").map(|v| v as isize).unwrap_or(-1);
    if p < 0 && li < 0 {
        return xhtml.to_string();
    }
    let (idx, len, class) = if p > li {
        (p as usize, 2, KEEP_WITH_NEXT_PARA_STYLE)
    } else {
        (li as usize, 3, KEEP_WITH_NEXT_ITEM_STYLE)
    };
    if xhtml[idx..].contains("class=\"") {
        return xhtml.to_string();
    }
    let mut res = String::with_capacity(xhtml.len() + 32);
    res.push_str(&xhtml[..idx + len]);
    res.push_str(" class=\"");
    res.push_str(class);
    res.push_str("\" ");
    res.push_str(&xhtml[idx + len..]);
    res
}

fn escape_text(s: &str) -> String {
    quick_xml::escape::escape(s).into_owned()
}

fn collect_attrs(e: &BytesStart) -> Result<AttrMap, ConvertError> {
    let mut map = AttrMap::new();
    for a in e.attributes() {
        let a = a?;
        let key = String::from_utf8_lossy(a.key.as_ref()).to_ascii_lowercase();
        let raw = std::str::from_utf8(&a.value)?;
        let value = quick_xml::escape::unescape(raw)
            .map(|c| c.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        map.insert(key, value);
    }
    Ok(map)
}

fn item_style(list_tag: &str, keep_with_next: bool) -> &'static str {
    match (list_tag, keep_with_next) {
        ("ol", false) => NUMBER_ITEM_STYLE,
        ("ol", true) => NUMBER_ITEM_KWN_STYLE,
        (_, false) => BULLET_ITEM_STYLE,
        (_, true) => BULLET_ITEM_KWN_STYLE,
    }
}

/// Where a conflictual element lives: directly on the open-element stack,
/// or as the pending synthesized inner paragraph of a stack entry.
enum ConflictLoc {
    Stack(usize),
    InnerOf(usize),
}

pub struct Converter<'a> {
    manager: &'a mut StylesManager,
    local: &'a ValidatedMapping,
    importer: Option<&'a mut dyn ResourceImporter>,
    namer: &'a mut dyn StyleNamer,
    /// The global output buffer. Content inside tables detours through
    /// the table stack's buffers first.
    out: String,
    /// Pending character data, crunched but not yet dumped.
    text: String,
    stack: Vec<ElementFrame>,
    /// Stack indices of the currently open lists.
    lists: Vec<usize>,
    tables: Vec<TableBuffer>,
    /// Tag of the most recently closed element.
    last_elem: Option<String>,
    ignore: bool,
    /// Collected list styles, dumped once at end of document.
    list_styles: Vec<(String, ListProperties)>,
}

impl<'a> Converter<'a> {
    pub fn new(
        manager: &'a mut StylesManager,
        local: &'a ValidatedMapping,
        importer: Option<&'a mut dyn ResourceImporter>,
        namer: &'a mut dyn StyleNamer,
    ) -> Converter<'a> {
        Converter {
            manager,
            local,
            importer,
            namer,
            out: String::new(),
            text: String::new(),
            stack: Vec::new(),
            lists: Vec::new(),
            tables: Vec::new(),
            last_elem: None,
            ignore: false,
            list_styles: Vec::new(),
        }
    }

    pub fn run(&mut self, source: &str) -> Result<String, ConvertError> {
        let mut reader = Reader::from_str(source);
        reader.config_mut().trim_text(false);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                    let attrs = collect_attrs(&e)?;
                    self.handle_start(&tag, &attrs)?;
                }
                Event::Empty(e) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                    let attrs = collect_attrs(&e)?;
                    self.handle_start(&tag, &attrs)?;
                    self.handle_end(&tag)?;
                }
                Event::Text(e) => {
                    if !self.ignore {
                        let raw = std::str::from_utf8(e.as_ref())?;
                        let text = quick_xml::escape::unescape(raw)
                            .map(|c| c.into_owned())
                            .unwrap_or_else(|_| raw.to_string());
                        let crunched = crunch(&text, &self.text);
                        self.text.push_str(&crunched);
                    }
                }
                Event::End(e) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                    self.handle_end(&tag)?;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        // All collected list styles are dumped once, at the very end.
        for (name, props) in &self.list_styles {
            self.manager.dynamic.styles.push(props.dump_style(name));
        }
        Ok(std::mem::take(&mut self.out))
    }

    /// The buffer the next dump lands in: the innermost table's `out`
    /// until its first write or once its columns are known, its `pending`
    /// in between, the global buffer outside tables.
    fn active_buffer(&mut self) -> &mut String {
        match self.tables.last_mut() {
            Some(t) if t.out.is_empty() || t.first_row_parsed => &mut t.out,
            Some(t) => &mut t.pending,
            None => &mut self.out,
        }
    }

    fn dump(&mut self, s: &str) {
        self.active_buffer().push_str(s);
    }

    /// Top of the open-element stack, looking through a remove-tag frame
    /// to its parent (that frame contributes no wrapper of its own).
    fn current_element_index(&self) -> Option<usize> {
        let idx = self.stack.len().checked_sub(1)?;
        if self.stack[idx].remove_tag {
            self.stack[idx].parent
        } else {
            Some(idx)
        }
    }

    /// Flushes pending character data, trimming boundary whitespace
    /// according to what surrounds it.
    fn dump_text(&mut self, at_start: bool, elem: &str) -> Result<(), ConvertError> {
        if at_start && self.text.ends_with(' ') && (!is_inner(elem) || elem == "br") {
            self.text.pop();
        }
        if self.text.starts_with(' ') {
            let trim = match self.last_elem.as_deref() {
                None => true,
                Some(last) => !is_inner(last) || last == "br",
            };
            if trim {
                self.text.remove(0);
            }
        }
        if self.text.is_empty() {
            return Ok(());
        }
        // Text landing directly in a cell or list item needs a
        // synthesized paragraph to hold it.
        if let Some(cur) = self.current_element_index()
            && OUTER_TAGS.contains(&self.stack[cur].tag.as_str())
        {
            self.add_inner_paragraph(cur)?;
        }
        let escaped = escape_text(&self.text);
        self.dump(&escaped);
        if let Some(top) = self.stack.last_mut() {
            top.content_dumped = true;
        }
        if self.tables.last().map(|t| t.in_cell > 0).unwrap_or(false) {
            let size = self.text.chars().count();
            for table in &mut self.tables {
                table.cell_content_size += size;
            }
        }
        self.text.clear();
        Ok(())
    }

    /// Opens a paragraph inside the element at `idx` (a cell or list
    /// item) if none is open yet, picking the style its context asks for.
    fn add_inner_paragraph(&mut self, idx: usize) -> Result<(), ConvertError> {
        if !self.stack[idx].tags_to_close.is_empty() {
            return Ok(());
        }
        let mut open = String::from("<text:p");
        if let Some(inner) = self.stack[idx].inner_style.clone() {
            open.push_str(&format!(" text:style-name=\"{inner}\""));
        } else if self.stack[idx].tag == "li" {
            let list_tag = self
                .lists
                .last()
                .map(|&li| self.stack[li].tag.clone())
                .unwrap_or_else(|| "ul".to_string());
            let style_name = if let Some(class) = self.stack[idx].class_attr.clone() {
                let resolved = self.manager.find_style("li", None, Some(&class), self.local)?;
                let kwn = resolved
                    .style
                    .map(|s| s.name == KEEP_WITH_NEXT_ITEM_STYLE)
                    .unwrap_or(false);
                item_style(&list_tag, kwn).to_string()
            } else if let Some(style) = self.manager.find_style("p", None, None, self.local)?.style {
                style.name
            } else {
                item_style(&list_tag, false).to_string()
            };
            open.push_str(&format!(" text:style-name=\"{style_name}\""));
        } else if let Some(style) = self.manager.find_style("p", None, None, self.local)?.style {
            open.push_str(&format!(" text:style-name=\"{}\"", style.name));
        }
        open.push('>');
        self.dump(&open);
        let mut inner = ElementFrame::new("p", &AttrMap::new(), Some(idx));
        inner.emitted_start = Some(open);
        self.stack[idx].tags_to_close.push(inner);
        Ok(())
    }

    /// Detects nesting the target schema cannot represent between the new
    /// element and the open ancestors. May instead flag the new element
    /// remove-tag (paragraphs directly inside cells and list items).
    fn conflict_locations(&self, frame: &mut ElementFrame) -> Vec<ConflictLoc> {
        let Some(top) = self.stack.len().checked_sub(1) else {
            return Vec::new();
        };
        let parent = &self.stack[top];
        // Cells and list items tolerate direct inline content: keep the
        // paragraph's content, drop its wrapper.
        if (parent.tag == "li" || parent.tag == "td") && PARA_TAGS.contains(&frame.tag.as_str()) {
            frame.remove_tag = true;
            return Vec::new();
        }
        // Block content cannot nest inside a paragraph.
        if parent.kind == ElemKind::Para && not_inside_para_or_para(&frame.tag) {
            return vec![ConflictLoc::Stack(top)];
        }
        // Paragraphs and block content cannot nest inside a character
        // run: close the run chain up to the nearest paragraph-like
        // ancestor, inclusive.
        if is_inner(&parent.tag) && (frame.kind == ElemKind::Para || not_inside_para(&frame.tag)) {
            let mut locs = vec![ConflictLoc::Stack(top)];
            for i in (0..top).rev() {
                locs.insert(0, ConflictLoc::Stack(i));
                if self.stack[i].kind == ElemKind::Para {
                    break;
                }
            }
            return locs;
        }
        // A pending synthesized inner paragraph is as much a paragraph as
        // a real one.
        if let Some(inner) = parent.tags_to_close.last()
            && inner.kind == ElemKind::Para
            && not_inside_para(&frame.tag)
        {
            return vec![ConflictLoc::InnerOf(top)];
        }
        // Tables cannot nest inside lists.
        if parent.kind == ElemKind::List && not_inside_list(&frame.tag) {
            return vec![ConflictLoc::Stack(top)];
        }
        Vec::new()
    }

    /// Closes conflictual elements now and returns the frames to reopen
    /// once the new element ends.
    fn resolve_conflicts(&mut self, frame: &mut ElementFrame) -> Vec<ElementFrame> {
        let locs = self.conflict_locations(frame);
        if locs.is_empty() {
            return Vec::new();
        }
        for loc in &locs {
            match *loc {
                ConflictLoc::Stack(i) => self.stack[i].conflictual = true,
                ConflictLoc::InnerOf(i) => {
                    if let Some(inner) = self.stack[i].tags_to_close.last_mut() {
                        inner.conflictual = true;
                    }
                }
            }
        }
        let mut elems: Vec<ElementFrame> = locs
            .iter()
            .filter_map(|loc| match *loc {
                ConflictLoc::Stack(i) => Some(self.stack[i].clone()),
                ConflictLoc::InnerOf(i) => self.stack[i].tags_to_close.last().cloned(),
            })
            .collect();
        self.close_conflictual(&elems);
        // The innermost closed element's pending inner paragraph is not
        // wanted on the reopened copy.
        if let Some(last) = elems.last_mut() {
            last.tags_to_close.clear();
        }
        if let Some(ConflictLoc::Stack(i)) = locs.last() {
            self.stack[*i].tags_to_close.clear();
        }
        elems
    }

    /// Emits closing tags for `elems`, unless their start tags are the
    /// last thing in the buffer, in which case the would-be empty
    /// wrappers are stripped instead of closed.
    fn close_conflictual(&mut self, elems: &[ElementFrame]) {
        let start_tags: String = elems
            .iter()
            .filter(|e| !e.remove_tag)
            .filter_map(|e| e.emitted_start.clone())
            .collect();
        let buffer = self.active_buffer();
        if !start_tags.is_empty() && buffer.ends_with(&start_tags) {
            let len = buffer.len() - start_tags.len();
            buffer.truncate(len);
        } else {
            let mut closes = String::new();
            for e in elems {
                if e.remove_tag {
                    continue;
                }
                closes = format!("{}{}", e.render_close(), closes);
            }
            self.dump(&closes);
        }
    }

    /// Resolves the attribute string for an element's start tag, and the
    /// inner-paragraph style a generated cell style may come with. Cells
    /// inherit the table's border and spacing policies.
    fn resolved_attributes(
        &mut self,
        tag: &str,
        attrs: &AttrMap,
    ) -> Result<(String, Option<String>), ConvertError> {
        let mut attrs = attrs.clone();
        if TABLE_CELL_TAGS.contains(&tag)
            && let Some(table) = self.tables.last()
        {
            if !table.border {
                attrs.insert("border".to_string(), "0".to_string());
            }
            if let Some(spacing) = &table.border_spacing {
                attrs.insert("cellspacing".to_string(), spacing.clone());
            }
        }
        let resolved = self.manager.find_style(tag, Some(&attrs), None, self.local)?;
        let attr_str = resolved
            .style
            .map(|s| s.odf_attributes(Some(&attrs)))
            .unwrap_or_default();
        Ok((attr_str, resolved.inner_style))
    }

    /// Renders a fresh start tag for a frame being reopened after a
    /// conflict, pending inner elements included.
    fn render_start(&mut self, frame: &ElementFrame) -> Result<String, ConvertError> {
        let odf = frame.odf_tag().unwrap_or("");
        let mut s = if frame.kind == ElemKind::List {
            let style = frame.list_style.clone().unwrap_or_default();
            // A reopened numbered list continues where it left off.
            let numbering = if frame.tag == "ol" {
                " text:continue-numbering=\"true\""
            } else {
                ""
            };
            format!("<{odf} text:style-name=\"{style}\"{numbering}>")
        } else {
            let (attr_str, _) = self.resolved_attributes(&frame.tag, &AttrMap::new())?;
            format!("<{odf}{attr_str}>")
        };
        for sub in &frame.tags_to_close {
            s.push_str(&self.render_start(sub)?);
        }
        Ok(s)
    }

    fn handle_start(&mut self, tag: &str, attrs: &AttrMap) -> Result<(), ConvertError> {
        self.dump_text(true, tag)?;
        let prev_idx = self.current_element_index();
        let mut frame = ElementFrame::new(tag, attrs, prev_idx);

        let reopen = self.resolve_conflicts(&mut frame);
        if !reopen.is_empty() {
            frame.tags_to_reopen = reopen;
        }

        // An inline element arriving directly inside a cell or list item
        // needs the enclosing paragraph opened first.
        if let Some(prev) = prev_idx
            && OUTER_TAGS.contains(&self.stack[prev].tag.as_str())
            && is_inner(tag)
        {
            self.add_inner_paragraph(prev)?;
        }

        let idx = self.stack.len();
        let remove_tag = frame.remove_tag;
        self.stack.push(frame);
        if is_list(tag) {
            self.lists.push(idx);
        } else if tag == "table" {
            let props = self.manager.table_properties(self.local);
            let page_width = self.manager.page_layout.usable_width();
            let name = self.namer.unique_name("Table");
            let table = TableBuffer::new(name, attrs, props, page_width, &mut self.manager.dynamic);
            self.tables.push(table);
        } else if TABLE_COL_TAGS.contains(&tag) {
            let css = CssDeclarations::from_attrs(attrs);
            let colspan = attrs
                .get("colspan")
                .and_then(|c| c.parse::<usize>().ok())
                .unwrap_or(1)
                .max(1);
            if let Some(table) = self.tables.last_mut() {
                table.in_cell = colspan;
                table.cell_index += colspan as i32;
                if !table.first_row_parsed {
                    table.nb_columns += colspan;
                }
                if colspan == 1
                    && let Some(width) = css.get("width").and_then(|v| v.as_length())
                {
                    table.set_column_width(width);
                }
            }
        }

        if remove_tag {
            // No wrapper for this element; separate it from content
            // already sitting in the parent.
            let parent_dumped = self.stack[idx]
                .parent
                .map(|p| self.stack[p].content_dumped)
                .unwrap_or(false);
            if parent_dumped {
                self.dump("<text:line-break/>");
            }
            return Ok(());
        }
        if IGNORABLE_TAGS.contains(&tag) {
            self.ignore = true;
            return Ok(());
        }

        let emitted: Option<String> = match tag {
            "a" => {
                let mut s = String::from("<text:a xlink:type=\"simple\"");
                if let Some(href) = attrs.get("href") {
                    s.push_str(&format!(" xlink:href=\"{}\"", escape_text(href)));
                }
                s.push('>');
                Some(s)
            }
            "ul" | "ol" => {
                let prologue = if self.lists.len() >= 2 {
                    // A list inside another list item must be wrapped in
                    // an extra list item of its own.
                    "<text:list-item>"
                } else {
                    ""
                };
                let numbering = if tag == "ol" {
                    " text:continue-numbering=\"false\""
                } else {
                    ""
                };
                let style = self.list_style(tag, attrs)?;
                self.stack[idx].list_style = Some(style.clone());
                Some(format!(
                    "{prologue}<text:list text:style-name=\"{style}\"{numbering}>"
                ))
            }
            "li" => {
                let restart = self
                    .lists
                    .last()
                    .copied()
                    .and_then(|li| self.stack[li].list_start.take())
                    .map(|start| format!(" text:start-value=\"{start}\""))
                    .unwrap_or_default();
                Some(format!("<text:list-item{restart}>"))
            }
            "thead" | "tr" => Some(format!("<{}>", odf_tag(tag).unwrap_or(""))),
            "table" => self.tables.last().map(|table| {
                format!(
                    "<table:table table:name=\"{}\" table:style-name=\"{}\">",
                    table.name, table.style_name
                )
            }),
            "img" => {
                let src = attrs.get("src").cloned().unwrap_or_default();
                let style_attr = attrs.get("style").cloned();
                if let Some(importer) = self.importer.as_deref_mut() {
                    let fragment = importer.import_image(&src, style_attr.as_deref())?;
                    self.dump(&fragment);
                } else {
                    log::warn!("no resource importer configured; skipping image \"{src}\"");
                }
                None
            }
            _ => match odf_tag(tag) {
                Some(odf) => {
                    let (attr_str, inner) = self.resolved_attributes(tag, attrs)?;
                    if inner.is_some() {
                        self.stack[idx].inner_style = inner;
                    }
                    Some(format!("<{odf}{attr_str}>"))
                }
                // No target equivalent (q, acronym, ...): the wrapper is
                // elided, its content kept.
                None => None,
            },
        };
        if let Some(s) = emitted {
            self.dump(&s);
            self.stack[idx].emitted_start = Some(s);
        }
        Ok(())
    }

    fn handle_end(&mut self, tag: &str) -> Result<(), ConvertError> {
        self.dump_text(false, tag)?;
        let Some(mut frame) = self.stack.pop() else {
            return Ok(());
        };
        let mut trailing: Option<&'static str> = None;

        if is_list(tag) {
            self.lists.pop();
        } else if tag == "table" {
            if let Some(table) = self.tables.pop() {
                if table.nb_columns > 0 {
                    table.compute_column_styles(&mut self.manager.dynamic);
                }
                // Flush into the parent buffer: the global output or the
                // enclosing table, never further out.
                self.dump(&table.out);
            }
        } else if TABLE_ROW_TAGS.contains(&tag) {
            if let Some(table) = self.tables.last_mut() {
                table.cell_index = -1;
                if !table.first_row_parsed {
                    // The column count is now final: emit the column
                    // declarations, then everything held back so far.
                    table.first_row_parsed = true;
                    for i in 1..=table.nb_columns {
                        table.out.push_str(&format!(
                            "<table:table-column table:style-name=\"{}.{}\"/>",
                            table.name, i
                        ));
                    }
                    let pending = std::mem::take(&mut table.pending);
                    table.out.push_str(&pending);
                }
            }
        } else if TABLE_COL_TAGS.contains(&tag) {
            if let Some(table) = self.tables.last_mut() {
                table.end_cell(tag == "col");
            }
        } else if is_styled_inner(tag)
            && let Some(parent) = self.stack.last()
            && is_styled_inner(&parent.tag)
            && !parent.content_dumped
        {
            // The target schema cannot wrap byte-identical text in two
            // nested character styles; a zero-width space between the
            // closes makes the wrapped runs textually distinct.
            trailing = Some("\u{200b}");
        }

        if !frame.tags_to_close.is_empty() {
            let to_close = std::mem::take(&mut frame.tags_to_close);
            self.close_conflictual(&to_close);
        }

        let mut elided = false;
        if frame.conflictual
            && let Some(emitted) = frame.emitted_start.as_deref()
        {
            let buffer = self.active_buffer();
            if buffer.ends_with(emitted) {
                // Closing now would produce an empty wrapper pair; strip
                // the start tag instead.
                let len = buffer.len() - emitted.len();
                buffer.truncate(len);
                elided = true;
            }
        }
        if !elided {
            let mut end_tag = frame
                .odf_tag()
                .map(|t| format!("</{t}>"))
                .unwrap_or_default();
            if is_list(tag) && !self.lists.is_empty() {
                // Leaving a nested list: close its wrapping list item.
                end_tag.push_str("</text:list-item>");
            }
            if !end_tag.is_empty() && !frame.remove_tag {
                self.dump(&end_tag);
            }
        }

        if IGNORABLE_TAGS.contains(&tag) {
            self.ignore = false;
        }
        if let Some(t) = trailing {
            self.dump(t);
        }
        if !frame.tags_to_reopen.is_empty() {
            let to_reopen = std::mem::take(&mut frame.tags_to_reopen);
            let mut reopened = String::new();
            for e in &to_reopen {
                reopened.push_str(&self.render_start(e)?);
            }
            self.dump(&reopened);
        }
        self.last_elem = Some(frame.tag);
        Ok(())
    }

    /// The list style to apply to a `ul`/`ol`: mapping-provided
    /// properties first, then the `list-style-type` declaration, then the
    /// legacy `type` attribute, else the document defaults.
    fn list_style(&mut self, tag: &str, attrs: &AttrMap) -> Result<String, ConvertError> {
        if let Some(props) = self.manager.list_properties(tag, self.local) {
            return Ok(self.register_list_properties(props));
        }
        let css = CssDeclarations::from_attrs(attrs);
        let mut type_name = css
            .get("list-style-type")
            .and_then(|v| v.as_keyword())
            .filter(|t| *t != "initial" && *t != "inherit")
            .map(str::to_string);
        if type_name.is_none()
            && let Some(legacy) = attrs.get("type")
        {
            type_name = TYPE_TO_LIST_STYLE
                .iter()
                .find(|(t, _)| t == legacy)
                .map(|(_, css)| css.to_string());
        }
        match type_name {
            Some(name) => Ok(self.register_named_list_style(tag, &name)),
            None => Ok(if tag == "ol" {
                NUMBERED_LIST_STYLE.to_string()
            } else {
                BULLETED_LIST_STYLE.to_string()
            }),
        }
    }

    /// Registers mapping-provided list properties, reusing the name of an
    /// equal registration from earlier in this conversion.
    fn register_list_properties(&mut self, props: ListProperties) -> String {
        if let Some((name, _)) = self.list_styles.iter().find(|(_, p)| *p == props) {
            return name.clone();
        }
        let name = self.namer.unique_name("List");
        self.list_styles.push((name.clone(), props));
        name
    }

    /// Registers the list style for one `list-style-type` value, once per
    /// document.
    fn register_named_list_style(&mut self, tag: &str, type_name: &str) -> String {
        let style_name = format!("L-{type_name}");
        if self.list_styles.iter().any(|(n, _)| *n == style_name) {
            return style_name;
        }
        let kind = if tag == "ol" {
            ListKind::Number
        } else {
            ListKind::Bullet
        };
        let props = match LIST_FORMATS.iter().find(|(t, _)| *t == type_name) {
            Some((_, format)) => ListProperties::with_format(kind, format),
            None => match kind {
                ListKind::Bullet => ListProperties::bulleted(),
                ListKind::Number => ListProperties::numbered(),
            },
        };
        self.list_styles.push((style_name.clone(), props));
        style_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::SequentialNamer;

    const STYLES_XML: &str = "<office:document-styles/>";

    fn convert_str(xhtml: &str) -> String {
        let mut manager = StylesManager::new(STYLES_XML).unwrap();
        let local = ValidatedMapping::default();
        let mut namer = SequentialNamer::new();
        convert(xhtml, &mut manager, &local, false, None, &mut namer).unwrap()
    }

    #[test]
    fn test_plain_paragraph_without_mapping() {
        assert_eq!(convert_str("<p>Hello</p>"), "<text:p>Hello</text:p>");
    }

    #[test]
    fn test_heading_gets_outline_level() {
        let out = convert_str("<h2>Title</h2>");
        assert_eq!(
            out,
            "<text:h text:style-name=\"svH2\" text:outline-level=\"2\">Title</text:h>"
        );
    }

    #[test]
    fn test_bold_run_default_style() {
        let out = convert_str("<p>a <b>b</b> c</p>");
        assert_eq!(
            out,
            "<text:p>a <text:span text:style-name=\"svBold\">b</text:span> c</text:p>"
        );
    }

    #[test]
    fn test_nested_styled_runs_get_zero_width_separator() {
        let out = convert_str("<b><u>Text</u></b>");
        let b = "<text:span text:style-name=\"svBold\">";
        let u = "<text:span text:style-name=\"svUnderline\">";
        assert_eq!(
            out,
            format!("{b}{u}Text</text:span>\u{200b}</text:span>")
        );
    }

    #[test]
    fn test_whitespace_crunched() {
        let out = convert_str("<p>Hello   \n  world</p>");
        assert_eq!(out, "<text:p>Hello world</text:p>");
    }

    #[test]
    fn test_text_escaped() {
        let out = convert_str("<p>a &lt; b &amp; c</p>");
        assert_eq!(out, "<text:p>a &lt; b &amp; c</text:p>");
    }

    #[test]
    fn test_hyperlink() {
        let out = convert_str("<p><a href=\"https://example.org/?a=1&amp;b=2\">link</a></p>");
        assert_eq!(
            out,
            "<text:p><text:a xlink:type=\"simple\" \
             xlink:href=\"https://example.org/?a=1&amp;b=2\">link</text:a></text:p>"
        );
    }

    #[test]
    fn test_list_inside_paragraph_closes_and_reopens() {
        let out = convert_str("<p>before<ul><li>x</li></ul>after</p>");
        assert_eq!(
            out,
            "<text:p>before</text:p>\
             <text:list text:style-name=\"svBulletedList\">\
             <text:list-item><text:p text:style-name=\"svBulletItem\">x</text:p></text:list-item>\
             </text:list>\
             <text:p>after</text:p>"
        );
    }

    #[test]
    fn test_empty_wrapper_elided_on_conflict() {
        // The paragraph has emitted nothing when the list arrives: both
        // its tags must vanish, and the trailing reopened paragraph is
        // dropped as conflictual-empty at its end tag.
        let out = convert_str("<p><ul><li>x</li></ul></p>");
        assert_eq!(
            out,
            "<text:list text:style-name=\"svBulletedList\">\
             <text:list-item><text:p text:style-name=\"svBulletItem\">x</text:p></text:list-item>\
             </text:list>"
        );
    }

    #[test]
    fn test_list_inside_run_wrapper_closes_and_reopens() {
        let out = convert_str("<b>pre<ul><li>x</li></ul>post</b>");
        let bold = "<text:span text:style-name=\"svBold\">";
        assert_eq!(
            out,
            format!(
                "{bold}pre</text:span>\
                 <text:list text:style-name=\"svBulletedList\">\
                 <text:list-item><text:p text:style-name=\"svBulletItem\">x</text:p></text:list-item>\
                 </text:list>\
                 {bold}post</text:span>"
            )
        );
    }

    #[test]
    fn test_paragraph_in_list_item_drops_wrapper() {
        let out = convert_str("<ul><li><p>only</p></li></ul>");
        assert_eq!(
            out,
            "<text:list text:style-name=\"svBulletedList\">\
             <text:list-item><text:p text:style-name=\"svBulletItem\">only</text:p></text:list-item>\
             </text:list>"
        );
    }

    #[test]
    fn test_nested_list_wrapped_in_extra_item() {
        // The inner list conflicts with its enclosing item, which closes
        // around it; the nested list itself rides in a list item of its
        // own, and the reopened (empty) item is elided at the end.
        let out = convert_str("<ul><li>a<ul><li>b</li></ul></li></ul>");
        assert_eq!(
            out,
            "<text:list text:style-name=\"svBulletedList\">\
             <text:list-item><text:p text:style-name=\"svBulletItem\">a</text:p></text:list-item>\
             <text:list-item><text:list text:style-name=\"svBulletedList\">\
             <text:list-item><text:p text:style-name=\"svBulletItem\">b</text:p></text:list-item>\
             </text:list></text:list-item>\
             </text:list>"
        );
    }

    #[test]
    fn test_ordered_list_numbering() {
        let out = convert_str("<ol start=\"4\"><li>a</li><li>b</li></ol>");
        assert!(out.starts_with(
            "<text:list text:style-name=\"svNumberedList\" text:continue-numbering=\"false\">"
        ));
        // Only the first item restarts the numbering.
        assert_eq!(out.matches("text:start-value=\"4\"").count(), 1);
        assert!(out.contains("<text:list-item text:start-value=\"4\">"));
    }

    #[test]
    fn test_list_style_type_registers_style() {
        let mut manager = StylesManager::new(STYLES_XML).unwrap();
        let local = ValidatedMapping::default();
        let mut namer = SequentialNamer::new();
        let out = convert(
            "<ol style=\"list-style-type: upper-roman\"><li>a</li></ol>",
            &mut manager,
            &local,
            false,
            None,
            &mut namer,
        )
        .unwrap();
        assert!(out.contains("text:style-name=\"L-upper-roman\""));
        let styles = manager.take_dynamic().styles;
        assert_eq!(styles.len(), 1);
        assert!(styles[0].contains("style:name=\"L-upper-roman\""));
        assert!(styles[0].contains("style:num-format=\"I\""));
    }

    #[test]
    fn test_legacy_type_attribute() {
        let mut manager = StylesManager::new(STYLES_XML).unwrap();
        let local = ValidatedMapping::default();
        let mut namer = SequentialNamer::new();
        let out = convert(
            "<ul type=\"a\"><li>x</li></ul>",
            &mut manager,
            &local,
            false,
            None,
            &mut namer,
        )
        .unwrap();
        assert!(out.contains("text:style-name=\"L-lower-alpha\""));
    }

    #[test]
    fn test_table_columns_declared_before_rows() {
        let out = convert_str("<table><tr><td>A</td><td>B</td></tr></table>");
        let cols = out.find("<table:table-column").unwrap();
        let rows = out.find("<table:table-row").unwrap();
        assert!(cols < rows, "column declarations must precede rows: {out}");
        assert_eq!(out.matches("<table:table-column").count(), 2);
        assert!(out.contains("table:style-name=\"Table1.1\""));
        assert!(out.contains("table:style-name=\"Table1.2\""));
        assert!(out.ends_with("</table:table>"));
    }

    #[test]
    fn test_equal_columns_get_equal_relative_widths() {
        let mut manager = StylesManager::new(STYLES_XML).unwrap();
        let local = ValidatedMapping::default();
        let mut namer = SequentialNamer::new();
        convert(
            "<table><tr><td>A</td><td>B</td></tr></table>",
            &mut manager,
            &local,
            false,
            None,
            &mut namer,
        )
        .unwrap();
        let content = manager.take_dynamic().content;
        let widths: Vec<&String> = content
            .iter()
            .filter(|s| s.contains("table-column-properties"))
            .collect();
        assert_eq!(widths.len(), 2);
        assert!(widths[0].contains("style:rel-column-width=\"32767*\""));
        assert!(widths[1].contains("style:rel-column-width=\"32767*\""));
    }

    #[test]
    fn test_cell_text_wrapped_in_content_paragraph() {
        let out = convert_str("<table><tr><td>A</td></tr></table>");
        assert!(out.contains(
            "<table:table-cell table:style-name=\"svCell\">\
             <text:p text:style-name=\"svCellContent\">A</text:p></table:table-cell>"
        ));
    }

    #[test]
    fn test_header_cells_and_header_rows() {
        let out = convert_str("<table><thead><tr><th>H</th></tr></thead></table>");
        assert!(out.contains("<table:table-header-rows>"));
        assert!(out.contains("table:style-name=\"svHeader\""));
        assert!(out.contains("</table:table-header-rows>"));
    }

    #[test]
    fn test_colspan_spans_columns() {
        let out = convert_str(
            "<table><tr><td colspan=\"2\">W</td></tr><tr><td>a</td><td>b</td></tr></table>",
        );
        assert!(out.contains("table:number-columns-spanned=\"2\""));
        assert_eq!(out.matches("<table:table-column").count(), 2);
    }

    #[test]
    fn test_table_inside_list_conflicts() {
        let out = convert_str("<ul><li>x</li><table><tr><td>c</td></tr></table><li>y</li></ul>");
        let table_start = out.find("<table:table ").unwrap();
        let list_close = out.find("</text:list>").unwrap();
        assert!(
            list_close < table_start,
            "list must close before the table: {out}"
        );
        // The list reopens after the table and hosts the second item.
        let after_table = &out[table_start..];
        let reopened = after_table.find("<text:list ").unwrap();
        assert!(after_table[reopened..].contains(">y</text:p>"));
    }

    #[test]
    fn test_reopened_list_elided_when_nothing_follows() {
        let out = convert_str("<ul><li>x</li><table><tr><td>c</td></tr></table></ul>");
        // Nothing follows the table: the reopened list would be an empty
        // wrapper and must not survive.
        assert_eq!(out.matches("<text:list ").count(), 1);
        assert_eq!(out.matches("</text:list>").count(), 1);
        assert!(out.ends_with("</table:table>"));
    }

    #[test]
    fn test_ignorable_tags_dropped() {
        let out = convert_str("<style>p { color: red }</style><p>keep</p>");
        assert_eq!(out, "<text:p>keep</text:p>");
    }

    #[test]
    fn test_keep_with_next_tags_last_paragraph() {
        let tagged = apply_keep_with_next("<p>a</p><p>b</p>");
        assert_eq!(
            tagged,
            format!("<p>a</p><p class=\"{KEEP_WITH_NEXT_PARA_STYLE}\" >b</p>")
        );
        let tagged = apply_keep_with_next("<ul><li>a</li><li>b</li></ul>");
        assert!(tagged.contains(&format!("<li class=\"{KEEP_WITH_NEXT_ITEM_STYLE}\" >b")));
        // An existing class is left alone.
        let source = "<p>a</p><p class=\"intro\">b</p>";
        assert_eq!(apply_keep_with_next(source), source);
    }

    #[test]
    fn test_keep_with_next_end_to_end() {
        let mut manager = StylesManager::new(STYLES_XML).unwrap();
        let local = ValidatedMapping::default();
        let mut namer = SequentialNamer::new();
        let out = convert(
            "<p>a</p><p>b</p>",
            &mut manager,
            &local,
            true,
            None,
            &mut namer,
        )
        .unwrap();
        assert_eq!(
            out,
            format!(
                "<text:p>a</text:p>\
                 <text:p text:style-name=\"{KEEP_WITH_NEXT_PARA_STYLE}\">b</text:p>"
            )
        );
    }

    #[test]
    fn test_well_formedness_tag_balance() {
        let out = convert_str(
            "<div><h1>T</h1><p>a<b>b<i>c</i></b></p>\
             <table><tr><td><ul><li>d</li></ul></td></tr></table></div>",
        );
        for tag in [
            "text:p",
            "text:span",
            "text:h",
            "text:list",
            "text:list-item",
            "table:table",
            "table:table-row",
            "table:table-cell",
        ] {
            // Opens are "<tag " or "<tag>"; the prefix-free suffix check
            // keeps text:list from matching text:list-item.
            let opens = out.matches(&format!("<{tag} ")).count()
                + out.matches(&format!("<{tag}>")).count();
            let closes = out.matches(&format!("</{tag}>")).count();
            assert_eq!(opens, closes, "unbalanced {tag} in {out}");
        }
    }

    #[test]
    fn test_no_empty_wrapper_pairs() {
        for source in [
            "<p><ul><li>x</li></ul></p>",
            "<b><ul><li>x</li></ul></b>",
            "<p><b><table><tr><td>c</td></tr></table></b></p>",
        ] {
            let out = convert_str(source);
            assert!(
                !out.contains("<text:p></text:p>"),
                "empty paragraph pair in {out}"
            );
            assert!(
                !out.contains("></text:span>") || !out.contains("<text:span></text:span>"),
                "empty span pair in {out}"
            );
            assert!(!out.contains("<text:span></text:span>"), "empty span in {out}");
        }
    }
}
