mod common;

use common::{test_doc, TestResult};

/// Extracts the relative column widths (the `N` of
/// `style:rel-column-width="N*"`) from generated column styles.
fn rel_widths(content_styles: &[String]) -> Vec<i64> {
    content_styles
        .iter()
        .filter(|s| s.contains("table-column-properties"))
        .map(|s| {
            let at = s.find("rel-column-width=\"").unwrap() + "rel-column-width=\"".len();
            s[at..].split('*').next().unwrap().parse().unwrap()
        })
        .collect()
}

#[test]
fn test_two_equal_columns_split_evenly() -> TestResult {
    let mut t = test_doc();
    let markup = t.doc.convert_xhtml(
        "<table><tr><td>A</td><td>B</td></tr></table>",
        None,
        false,
    )?;
    assert_eq!(markup.matches("<table:table-column").count(), 2);

    let widths = rel_widths(&t.doc.finish().content_styles);
    assert_eq!(widths.len(), 2);
    // Equal content, equal share: half of the 65534 scale each.
    assert_eq!(widths, vec![32767, 32767]);
    Ok(())
}

#[test]
fn test_width_fractions_conserved() -> TestResult {
    let mut t = test_doc();
    t.doc.convert_xhtml(
        "<table><tr>\
         <td>short</td>\
         <td>a much longer cell with quite a lot of content in it</td>\
         <td>mid-sized cell text</td>\
         </tr></table>",
        None,
        false,
    )?;
    let widths = rel_widths(&t.doc.finish().content_styles);
    assert_eq!(widths.len(), 3);
    let total: i64 = widths.iter().sum();
    // Integer truncation may shave a few units off the scale total.
    assert!((total - 65534).abs() <= 3, "total {total}");
    // Longer content earns the wider column.
    assert!(widths[1] > widths[2]);
    assert!(widths[2] > widths[0]);
    // Every column is at least the guaranteed minimum (7% by default).
    let min = (0.07 * 65534.0) as i64;
    for w in &widths {
        assert!(*w >= min - 1, "column narrower than minimum: {w}");
    }
    Ok(())
}

#[test]
fn test_declared_column_width_respected() -> TestResult {
    let mut t = test_doc();
    t.doc.convert_xhtml(
        "<table><tr>\
         <td style=\"width: 30%\">a</td>\
         <td>b</td>\
         </tr></table>",
        None,
        false,
    )?;
    let widths = rel_widths(&t.doc.finish().content_styles);
    assert_eq!(widths[0], (0.3 * 65534.0) as i64);
    assert_eq!(widths[1], (0.7 * 65534.0) as i64);
    Ok(())
}

#[test]
fn test_table_with_explicit_width_gets_dynamic_style() -> TestResult {
    let mut t = test_doc();
    let markup = t.doc.convert_xhtml(
        "<table style=\"width: 50%\"><tr><td>a</td></tr></table>",
        None,
        false,
    )?;
    let output = t.doc.finish();
    let table_style = output
        .content_styles
        .iter()
        .find(|s| s.contains("style:family=\"table\""))
        .expect("dynamic table style");
    assert!(table_style.contains("style:rel-width=\"50%\""));
    assert!(table_style.contains("style:parent-style-name=\"svTable\""));
    // Usable page width is 17cm: half of it for the table.
    assert!(table_style.contains("style:width=\"8.5cm\""));
    // The table references its generated style, not the default.
    assert!(!markup.contains("table:style-name=\"svTable\""));
    Ok(())
}

#[test]
fn test_table_without_width_uses_default_style() -> TestResult {
    let mut t = test_doc();
    let markup = t
        .doc
        .convert_xhtml("<table><tr><td>a</td></tr></table>", None, false)?;
    assert!(markup.contains("table:style-name=\"svTable\""));
    Ok(())
}

#[test]
fn test_nested_table_flushes_into_enclosing_cell() -> TestResult {
    let mut t = test_doc();
    let markup = t.doc.convert_xhtml(
        "<table><tr><td>\
         <table><tr><td>inner</td></tr></table>\
         </td></tr></table>",
        None,
        false,
    )?;
    // The inner table's markup sits inside the outer cell.
    let outer_cell = markup.find("<table:table-cell").unwrap();
    let inner_table = markup.rfind("<table:table ").unwrap();
    assert!(inner_table > outer_cell, "inner table outside its cell: {markup}");
    assert_eq!(markup.matches("</table:table>").count(), 2);
    // Both tables declared their columns.
    assert_eq!(markup.matches("<table:table-column").count(), 2);
    Ok(())
}
