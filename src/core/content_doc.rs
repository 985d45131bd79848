//! Primary content document scanner.
//!
//! Each content unit carries one XML document named after its canonical
//! id. The packager needs a handful of things from it: the root kind,
//! the bank key, the declared format, the renderer spec filename, and
//! the dependency references (word lists, stimulus, tutorial). The raw
//! text is kept too, for the classifier's substring checks.
//!
//! Parsing is strict about well-formedness but lenient about missing
//! elements; reference ids stay as raw strings until extraction so a
//! bad value surfaces as a per-item failure, not a parse failure.

use anyhow::{anyhow, Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Kind of the content element found under the document root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocRoot {
    Item,
    Passage,
}

/// A `bankkey`/`id` attribute pair from a dependency element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyRef {
    bank_key: String,
    id: String,
}

impl DependencyRef {
    pub fn bank_key(&self) -> Result<u32> {
        self.bank_key
            .trim()
            .parse()
            .with_context(|| format!("bad bankkey attribute '{}'", self.bank_key))
    }

    pub fn id(&self) -> Result<u32> {
        self.id
            .trim()
            .parse()
            .with_context(|| format!("bad id attribute '{}'", self.id))
    }
}

#[derive(Debug)]
pub struct ContentDoc {
    text: String,
    root: Option<DocRoot>,
    bank_key: Option<String>,
    type_attr: Option<String>,
    renderer_spec: Option<String>,
    word_lists: Vec<DependencyRef>,
    associated_passage: Option<String>,
    legacy_stim_id: Option<String>,
    tutorial: Option<DependencyRef>,
}

fn attr(element: &BytesStart, name: &str) -> Result<Option<String>> {
    let value = element
        .try_get_attribute(name)?
        .map(|a| a.unescape_value().map(|v| v.into_owned()))
        .transpose()?;
    Ok(value)
}

impl ContentDoc {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(bytes).into_owned();

        let mut doc = Self {
            text: String::new(),
            root: None,
            bank_key: None,
            type_attr: None,
            renderer_spec: None,
            word_lists: Vec::new(),
            associated_passage: None,
            legacy_stim_id: None,
            tutorial: None,
        };

        let mut reader = Reader::from_str(&text);
        let mut stack: Vec<String> = Vec::new();
        // Depth at which a <attrib attid="stm_pass_id"> opened, if any.
        let mut stim_attrib_depth: Option<usize> = None;

        loop {
            match reader.read_event().context("malformed content document")? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    doc.scan_element(&e, &name, &stack, &mut stim_attrib_depth)?;
                    stack.push(name);
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    doc.scan_element(&e, &name, &stack, &mut stim_attrib_depth)?;
                }
                Event::End(_) => {
                    stack.pop();
                    if stim_attrib_depth.is_some_and(|d| stack.len() < d) {
                        stim_attrib_depth = None;
                    }
                }
                Event::Text(t) => {
                    let value = t.unescape().context("malformed content document")?;
                    match stack.last().map(String::as_str) {
                        Some("associatedpassage") => {
                            doc.associated_passage
                                .get_or_insert_with(String::new)
                                .push_str(&value);
                        }
                        Some("val") if stim_attrib_depth.is_some() => {
                            doc.legacy_stim_id
                                .get_or_insert_with(String::new)
                                .push_str(&value);
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        doc.text = text;
        Ok(doc)
    }

    fn scan_element(
        &mut self,
        element: &BytesStart,
        name: &str,
        stack: &[String],
        stim_attrib_depth: &mut Option<usize>,
    ) -> Result<()> {
        let parent = stack.last().map(String::as_str);

        match name {
            "item" | "passage" if stack.len() == 1 => {
                self.root = Some(if name == "item" {
                    DocRoot::Item
                } else {
                    DocRoot::Passage
                });
                self.bank_key = attr(element, "bankkey")?;
                // The declared kind moved from "type" to "format" at some point.
                self.type_attr = match attr(element, "format")? {
                    Some(v) => Some(v),
                    None => attr(element, "type")?,
                };
            }
            "RendererSpec" if parent == Some("item") => {
                self.renderer_spec = attr(element, "filename")?;
            }
            "resource" if parent == Some("resourceslist") => {
                let kind = attr(element, "type")?.unwrap_or_default();
                if kind.eq_ignore_ascii_case("wordList") {
                    self.word_lists.push(DependencyRef {
                        bank_key: attr(element, "bankkey")?.unwrap_or_default(),
                        id: attr(element, "id")?.unwrap_or_default(),
                    });
                }
            }
            "tutorial" if parent == Some("item") => {
                self.tutorial = Some(DependencyRef {
                    bank_key: attr(element, "bankkey")?.unwrap_or_default(),
                    id: attr(element, "id")?.unwrap_or_default(),
                });
            }
            "attrib" => {
                *stim_attrib_depth =
                    if attr(element, "attid")?.as_deref() == Some("stm_pass_id") {
                        Some(stack.len() + 1)
                    } else {
                        None
                    };
            }
            _ => {}
        }
        Ok(())
    }

    /// Serialized document text, as stored in the bank.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.text.contains(needle)
    }

    pub fn root(&self) -> Option<DocRoot> {
        self.root
    }

    /// Bank key declared on the content element.
    pub fn bank_key(&self) -> Result<u32> {
        let raw = self
            .bank_key
            .as_deref()
            .ok_or_else(|| anyhow!("content element has no bankkey attribute"))?;
        raw.trim()
            .parse()
            .with_context(|| format!("bad bankkey attribute '{}'", raw))
    }

    /// The `format` (or legacy `type`) attribute, empty when absent.
    pub fn type_attr(&self) -> &str {
        self.type_attr.as_deref().unwrap_or("")
    }

    /// Renderer spec filename, with any leading `//` stripped.
    pub fn renderer_spec_file(&self) -> Option<&str> {
        self.renderer_spec
            .as_deref()
            .map(|f| f.strip_prefix("//").unwrap_or(f))
    }

    pub fn word_lists(&self) -> &[DependencyRef] {
        &self.word_lists
    }

    /// Stimulus reference. Newer documents carry an `associatedpassage`
    /// element; older ones put the id in an `attrib` with
    /// `attid="stm_pass_id"`. The newer form wins when both appear.
    pub fn stimulus_id(&self) -> Option<&str> {
        self.associated_passage
            .as_deref()
            .or(self.legacy_stim_id.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn tutorial(&self) -> Option<&DependencyRef> {
        self.tutorial.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITEM_DOC: &str = r#"<itemrelease version="2.0">
  <item format="wordList" id="612345" bankkey="200" version="3">
    <RendererSpec filename="//item_612345.gax"/>
    <resourceslist>
      <resource type="wordList" id="622222" bankkey="200" index="1"/>
      <resource type="other" id="9" bankkey="200"/>
    </resourceslist>
    <associatedpassage>67890</associatedpassage>
    <tutorial id="633333" bankkey="200"/>
    <content language="ENU">
      <stem>hello_vietnamese.m4a</stem>
    </content>
  </item>
</itemrelease>"#;

    #[test]
    fn scans_item_document() {
        let doc = ContentDoc::parse(ITEM_DOC.as_bytes()).unwrap();
        assert_eq!(doc.root(), Some(DocRoot::Item));
        assert_eq!(doc.bank_key().unwrap(), 200);
        assert_eq!(doc.type_attr(), "wordList");
        assert_eq!(doc.renderer_spec_file(), Some("item_612345.gax"));
        assert_eq!(doc.word_lists().len(), 1);
        assert_eq!(doc.word_lists()[0].id().unwrap(), 622222);
        assert_eq!(doc.word_lists()[0].bank_key().unwrap(), 200);
        assert_eq!(doc.stimulus_id(), Some("67890"));
        assert_eq!(doc.tutorial().unwrap().id().unwrap(), 633333);
        assert!(doc.contains("hello_vietnamese.m4a"));
    }

    #[test]
    fn scans_passage_document() {
        let xml = r#"<itemrelease>
  <passage id="67890" bankkey="200">
    <resourceslist>
      <resource type="WORDLIST" id="655555" bankkey="200"/>
    </resourceslist>
  </passage>
</itemrelease>"#;
        let doc = ContentDoc::parse(xml.as_bytes()).unwrap();
        assert_eq!(doc.root(), Some(DocRoot::Passage));
        assert_eq!(doc.word_lists().len(), 1);
        assert_eq!(doc.word_lists()[0].id().unwrap(), 655555);
        assert_eq!(doc.stimulus_id(), None);
    }

    #[test]
    fn legacy_stimulus_attrib_is_a_fallback() {
        let xml = r#"<itemrelease>
  <item id="1" bankkey="200">
    <attriblist>
      <attrib attid="stm_pass_id">
        <name>Stim: ITS ID</name>
        <val>4242</val>
      </attrib>
      <attrib attid="other"><val>99</val></attrib>
    </attriblist>
  </item>
</itemrelease>"#;
        let doc = ContentDoc::parse(xml.as_bytes()).unwrap();
        assert_eq!(doc.stimulus_id(), Some("4242"));
    }

    #[test]
    fn malformed_xml_is_an_error() {
        assert!(ContentDoc::parse(b"<itemrelease><item></itemrelease>").is_err());
    }

    #[test]
    fn bad_reference_id_fails_at_extraction() {
        let xml = r#"<itemrelease>
  <item id="1" bankkey="200">
    <tutorial id="not-a-number" bankkey="200"/>
  </item>
</itemrelease>"#;
        let doc = ContentDoc::parse(xml.as_bytes()).unwrap();
        assert!(doc.tutorial().unwrap().id().is_err());
    }
}
