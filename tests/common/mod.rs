use scriven::{DocumentContext, ImporterConfig};
use tempfile::TempDir;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// A template styles stream with a couple of named styles and an A4-ish
/// page layout, close to what a real base template carries.
pub const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-styles xmlns:office="urn:o" xmlns:style="urn:s" xmlns:fo="urn:f" xmlns:text="urn:t">
 <office:styles>
  <style:style style:name="Standard" style:family="paragraph" style:class="text"/>
  <style:style style:name="Body" style:family="paragraph"/>
  <style:style style:name="Heading_20_1" style:display-name="Heading 1"
               style:family="paragraph" style:default-outline-level="1">
   <style:text-properties fo:font-size="16pt"/>
  </style:style>
  <style:style style:name="Heading_20_2" style:display-name="Heading 2"
               style:family="paragraph" style:default-outline-level="2"/>
  <style:style style:name="Source_20_Text" style:display-name="Source Text" style:family="text"/>
 </office:styles>
 <office:automatic-styles>
  <style:page-layout style:name="pm1">
   <style:page-layout-properties fo:page-width="21cm" fo:page-height="29.7cm" fo:margin="2cm"/>
  </style:page-layout>
 </office:automatic-styles>
 <office:master-styles>
  <style:master-page style:name="Standard" style:page-layout-name="pm1"/>
 </office:master-styles>
</office:document-styles>"#;

pub struct TestDoc {
    /// Keeps the staging directories alive for the test's duration.
    pub dir: TempDir,
    pub doc: DocumentContext,
}

pub fn test_doc() -> TestDoc {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = TempDir::new().expect("tempdir");
    let mut config = ImporterConfig::new(dir.path().join("Pictures"));
    config.temp_dir = Some(dir.path().join("work"));
    let doc = DocumentContext::new(STYLES_XML, config).expect("document context");
    TestDoc { dir, doc }
}
