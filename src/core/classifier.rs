//! Per-file admit/reject decisions.
//!
//! Every file listed for a content unit runs through here before it is
//! written into the package. Items and tutorials are checked against
//! the attachment registry and the content text; word lists only admit
//! files their XML actually references by href; stimuli admit anything
//! that survives the static exclusions.
//!
//! The filename pattern checks are advisory. A mismatch is logged so
//! content staff can fix the bank, but it never rejects a file on its
//! own.

use std::sync::OnceLock;

use regex::Regex;

use crate::adapters::Attachment;
use crate::core::content_doc::ContentDoc;
use crate::core::rename::{normalize_glossary_audio, RenameRecord};
use crate::domain::{ContentId, ContentKind, Role};
use crate::progress::{ProgressLog, Severity};

/// Why a file was admitted (or that nothing matched).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitReason {
    CoreFile,
    RegisteredAttachment,
    ContentReferenced,
    RendererSpecReferenced,
    ExplicitInclude,
    Unmatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationResult {
    pub admitted: bool,
    pub reason: AdmitReason,
}

impl ClassificationResult {
    fn admit(reason: AdmitReason) -> Self {
        Self {
            admitted: true,
            reason,
        }
    }

    fn reject() -> Self {
        Self {
            admitted: false,
            reason: AdmitReason::Unmatched,
        }
    }
}

/// Detected container format of an audio blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Ogg,
    M4a,
    Unknown,
}

impl AudioFormat {
    fn extension(self) -> &'static str {
        match self {
            AudioFormat::Ogg => "ogg",
            AudioFormat::M4a => "m4a",
            AudioFormat::Unknown => "unknown",
        }
    }
}

const OGG_MAGIC: &[u8; 4] = b"OggS";
const M4A_MAGIC: &[u8; 4] = b"ftyp";

/// Inspect the leading bytes of an audio blob. Ogg containers start
/// with `OggS`; MP4 containers carry `ftyp` at offset 4.
pub fn sniff_audio(bytes: &[u8]) -> AudioFormat {
    if bytes.len() >= 4 && &bytes[..4] == OGG_MAGIC {
        AudioFormat::Ogg
    } else if bytes.len() >= 8 && &bytes[4..8] == M4A_MAGIC {
        AudioFormat::M4a
    } else {
        AudioFormat::Unknown
    }
}

/// Outcome of the word-list audio/illustration follow-up checks.
#[derive(Debug, Default)]
pub struct WitFollowup {
    /// The blob's container format disagrees with its extension.
    pub extension_mismatch: bool,
    /// Rename applied because the name missed the glossary patterns.
    pub rename: Option<RenameRecord>,
}

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($re).unwrap())
        }
    };
}

pattern!(
    cc_pattern,
    r"(?i)passage_\d+_v[0-9]+(\.[0-9]+)?_\d+_[a-z]+[0-9]?\.vtt"
);
pattern!(
    asl_pattern,
    r"(?i)(item|stim|passage)_\d+_ASL_[a-z]+[0-9]?\.(mp4|webm)"
);
pattern!(
    braille_pattern,
    r"(?i)(item|passage)_\d+_enu_(exn|ecn|uxn|ucn|uxt|uct|ucl|ecl|contracted|uncontracted)\.(brf|prn)"
);
pattern!(
    stim_audio_pattern,
    r"(?i)passage_\d+_v[0-9]+(\.[0-9])?_\d+_[a-z]+[0-9]?.(m4a|ogg)"
);
pattern!(
    glossary_audio_pattern,
    r"(?i)(item|stim)_\d+_[a-z]+_v[0-9]+(\.[0-9])_[a-z]+(_[a-z])?\.(m4a|ogg)"
);
pattern!(
    glossary_audio_legacy_pattern,
    r"(?i)(item|stim)_\d+_v[0-9]+_\d+_[0-9]+[a-z]+_glossary_ogg_m4a\.(m4a|ogg)"
);
pattern!(
    image_pattern,
    r"(?i)(item|passage)_[0-9]+_(v[0-9]+(\.[0-9]))?_?(graphics1|stem|equation)_(png256|ENU|ESN)(_(0[0-9]|[0-9]+))?\.(png|svg)"
);
pattern!(
    illustration_glossary_pattern,
    r"(?i)item_[0-9]+_[a-z]+_v[0-9]+(\.[0-9]+)?_illustration_glossary\.svg"
);

fn extension(name: &str) -> &str {
    // Byte slice; the boundary can land inside a multi-byte character,
    // in which case the name has no recognizable extension.
    name.get(name.len().saturating_sub(3)..).unwrap_or("")
}

/// Classifier for one content unit's file listing.
pub struct Classifier<'a> {
    id: &'a ContentId,
    doc: &'a ContentDoc,
    renderer_spec: Option<&'a ContentDoc>,
    attachments: &'a [Attachment],
    include_import_zip: bool,
}

impl<'a> Classifier<'a> {
    pub fn new(
        id: &'a ContentId,
        doc: &'a ContentDoc,
        renderer_spec: Option<&'a ContentDoc>,
        attachments: &'a [Attachment],
        include_import_zip: bool,
    ) -> Self {
        Self {
            id,
            doc,
            renderer_spec,
            attachments,
            include_import_zip,
        }
    }

    /// Entries never admitted regardless of content type: the glossary
    /// and general-attachments folders and their contents, item.json,
    /// and the legacy top-level XML named after the bare numeric id.
    pub fn is_excluded(id: &ContentId, name: &str) -> bool {
        name == "glossary"
            || name.contains("glossary/")
            || name == "general-attachments"
            || name.contains("general-attachments/")
            || name == "item.json"
            || name == format!("{}.xml", id.id)
    }

    pub fn classify(&self, name: &str, log: &mut ProgressLog) -> ClassificationResult {
        // Stimulus packages carry whatever the bank lists; only the
        // static exclusions apply.
        if self.id.role == Role::Stim {
            return ClassificationResult::admit(AdmitReason::CoreFile);
        }
        match self.id.kind {
            ContentKind::Item | ContentKind::Tutorial => self.classify_item(name, log),
            ContentKind::WordList => self.classify_word_list(name, log),
        }
    }

    fn classify_item(&self, name: &str, log: &mut ProgressLog) -> ClassificationResult {
        let id = self.id.canonical();

        if matches!(extension(name), "xml" | "qrx" | "eax" | "gax") {
            return ClassificationResult::admit(AdmitReason::CoreFile);
        }

        if let Some(attachment) = self.attachments.iter().find(|a| a.file_name == name) {
            log.log(
                Severity::Message,
                &id,
                &format!(
                    "Checking if {} has a valid file name pattern for CC, ASL, or Braille.",
                    name
                ),
                "",
            );
            let check = match attachment.file_type.as_str() {
                "cc" => Some(("CC", cc_pattern())),
                "asl" => Some(("ASL", asl_pattern())),
                "braille" => Some(("Braille", braille_pattern())),
                _ => None,
            };
            if let Some((label, pattern)) = check {
                if pattern.is_match(name) {
                    log.log(
                        Severity::Message,
                        &id,
                        &format!("{} is a valid file name pattern for {}.", name, label),
                        "",
                    );
                } else {
                    log.log(
                        Severity::Message,
                        &id,
                        &format!(
                            "{} is a valid file, but the file name pattern is not valid for {}. Consider renaming the file.",
                            name, label
                        ),
                        "",
                    );
                }
            }
            return ClassificationResult::admit(AdmitReason::RegisteredAttachment);
        }

        if self.content_references(name) {
            if image_pattern().is_match(name) {
                log.log(
                    Severity::Message,
                    &id,
                    &format!("{} is a valid file name pattern for images in the content.", name),
                    "",
                );
            } else if stim_audio_pattern().is_match(name) {
                log.log(
                    Severity::Message,
                    &id,
                    &format!("{} is a valid file name pattern for audio in the stim.", name),
                    "",
                );
            } else {
                log.log(
                    Severity::Message,
                    &id,
                    &format!(
                        "{} is a valid file, but the file name pattern is not valid for images in the content or audio in stim. Consider renaming the file.",
                        name
                    ),
                    "",
                );
            }
            log.log(
                Severity::Message,
                &id,
                &format!("{} is a valid file referenced in the stem content.", name),
                "",
            );
            return ClassificationResult::admit(AdmitReason::ContentReferenced);
        }

        if name == "import.zip" && self.include_import_zip {
            log.log(Severity::Message, &id, "Adding the import.zip file.", "");
            return ClassificationResult::admit(AdmitReason::ExplicitInclude);
        }

        if let Some(renderer) = self.renderer_spec {
            // Stacked Spanish images are not named in the renderer spec;
            // they share its base name with an _ESN suffix added.
            let base_name = name.replace("_ESN", "").replace("_esn", "");
            if renderer.text().to_lowercase().contains(&base_name.to_lowercase()) {
                if image_pattern().is_match(name) {
                    log.log(
                        Severity::Message,
                        &id,
                        &format!("{} is a valid file name pattern for images in the content.", name),
                        "",
                    );
                } else {
                    log.log(
                        Severity::Message,
                        &id,
                        &format!(
                            "{} is a valid file, but the file name pattern is not valid for images in the content. Consider renaming the file.",
                            name
                        ),
                        "",
                    );
                }
                log.log(
                    Severity::Message,
                    &id,
                    &format!(
                        "{} is a valid file referenced in the renderer spec. If the file name includes _ESN, this is the stacked spanish version of the image and will be included.",
                        name
                    ),
                    "",
                );
                return ClassificationResult::admit(AdmitReason::RendererSpecReferenced);
            }
        }

        log.log(
            Severity::Message,
            &id,
            &format!(
                "Will not add the following object: {}. The file is not a valid attachment file, or a file referenced in the stem or renderer spec content.",
                name
            ),
            "",
        );
        ClassificationResult::reject()
    }

    /// The content text contains the name verbatim, or the loose
    /// fragment with the first character and the extension stripped.
    /// The fragment covers references like `123_name.png` written as
    /// `23_name.` in the stem.
    fn content_references(&self, name: &str) -> bool {
        if self.doc.contains(name) {
            return true;
        }
        name.get(1..name.len().saturating_sub(3))
            .is_some_and(|fragment| !fragment.is_empty() && self.doc.contains(fragment))
    }

    fn classify_word_list(&self, name: &str, log: &mut ProgressLog) -> ClassificationResult {
        if extension(name) == "xml" {
            return ClassificationResult::admit(AdmitReason::CoreFile);
        }

        // A bare contains() check passes when the reference is
        // item_123456_Word_Language.ogg but the file is
        // Word_Language.ogg, so anchor on the href attribute instead.
        let admitted = name
            .get(..name.len().saturating_sub(4))
            .filter(|stem| !stem.is_empty())
            .map(|stem| self.doc.contains(&format!("href=\"{}", stem)))
            .unwrap_or(false);

        if admitted {
            ClassificationResult::admit(AdmitReason::ContentReferenced)
        } else {
            log.log(
                Severity::Message,
                &self.id.canonical(),
                &format!("Will not add the following object: {}", name),
                "",
            );
            ClassificationResult::reject()
        }
    }

    /// Follow-up checks for an admitted non-XML word-list file: audio
    /// container sniffing and the glossary naming patterns.
    pub fn word_list_followup(
        &self,
        name: &str,
        bytes: &[u8],
        rename_enabled: bool,
        log: &mut ProgressLog,
    ) -> WitFollowup {
        let id = self.id.canonical();
        let mut followup = WitFollowup::default();
        let ext = extension(name);

        if ext == "ogg" || ext == "m4a" {
            let found = sniff_audio(bytes);
            if found.extension() != ext {
                followup.extension_mismatch = true;
            }

            if glossary_audio_pattern().is_match(name)
                || glossary_audio_legacy_pattern().is_match(name)
            {
                log.log(
                    Severity::Message,
                    &id,
                    &format!("{} is a valid file name pattern for audio in glossary.", name),
                    "",
                );
            } else if rename_enabled {
                log.log(
                    Severity::Message,
                    &id,
                    &format!(
                        "{} is a valid file, but the file name pattern is not valid for audio in glossary. Proceeding to rename the file.",
                        name
                    ),
                    "",
                );
                match normalize_glossary_audio(name, self.id) {
                    Some(new_name) => {
                        log.log(
                            Severity::Message,
                            &id,
                            &format!("Renamed {} to {}", name, new_name),
                            "",
                        );
                        followup.rename = Some(RenameRecord {
                            old_name: name.to_string(),
                            new_name,
                        });
                    }
                    None => {
                        log.log(
                            Severity::Degraded,
                            &id,
                            &format!("{} does not fit a recognized legacy audio name shape. Keeping the name as is.", name),
                            "",
                        );
                    }
                }
            } else {
                log.log(
                    Severity::Message,
                    &id,
                    &format!(
                        "{} is a valid file, but the file name pattern is not valid for audio in glossary. Consider renaming the file.",
                        name
                    ),
                    "",
                );
            }
        } else if illustration_glossary_pattern().is_match(name) {
            log.log(
                Severity::Message,
                &id,
                &format!("{} is a valid file name pattern for illustrated glossary.", name),
                "",
            );
        } else {
            log.log(
                Severity::Message,
                &id,
                &format!(
                    "{} is a valid file, but the file name pattern is not valid for illustrated glossary. Consider renaming the file.",
                    name
                ),
                "",
            );
        }

        followup
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_id() -> ContentId {
        ContentId::parse("item-200-612345", 200).unwrap()
    }

    fn wit_id() -> ContentId {
        use crate::domain::Role;
        ContentId::new(Role::Item, 200, 600_012_345, ContentKind::WordList)
    }

    fn doc(xml: &str) -> ContentDoc {
        ContentDoc::parse(xml.as_bytes()).unwrap()
    }

    fn log() -> ProgressLog {
        ProgressLog::from_writer(Box::new(Vec::new())).unwrap()
    }

    #[test]
    fn core_extensions_always_admitted() {
        let id = item_id();
        let content = doc("<itemrelease><item id=\"612345\" bankkey=\"200\"/></itemrelease>");
        let classifier = Classifier::new(&id, &content, None, &[], false);
        let mut log = log();

        for name in ["item-200-612345.xml", "a.qrx", "b.eax", "c.gax"] {
            let result = classifier.classify(name, &mut log);
            assert!(result.admitted, "{} should be admitted", name);
            assert_eq!(result.reason, AdmitReason::CoreFile);
        }
    }

    #[test]
    fn registered_attachment_admitted_with_pattern_advisory() {
        let id = item_id();
        let content = doc("<itemrelease><item id=\"612345\" bankkey=\"200\"/></itemrelease>");
        let attachments = vec![Attachment {
            file_name: "item_612345_ASL_enu.mp4".to_string(),
            file_type: "asl".to_string(),
        }];
        let classifier = Classifier::new(&id, &content, None, &attachments, false);
        let mut log = log();

        let result = classifier.classify("item_612345_ASL_enu.mp4", &mut log);
        assert!(result.admitted);
        assert_eq!(result.reason, AdmitReason::RegisteredAttachment);
    }

    #[test]
    fn content_reference_admits_by_verbatim_and_fragment() {
        let id = item_id();
        let content = doc(
            "<itemrelease><item id=\"612345\" bankkey=\"200\">\
             <content>picture_one.png and 3456_stem.</content></item></itemrelease>",
        );
        let classifier = Classifier::new(&id, &content, None, &[], false);
        let mut log = log();

        let verbatim = classifier.classify("picture_one.png", &mut log);
        assert!(verbatim.admitted);
        assert_eq!(verbatim.reason, AdmitReason::ContentReferenced);

        // "13456_stem.svg" minus its first char and last three chars
        // is "3456_stem." which the content carries.
        let fragment = classifier.classify("13456_stem.svg", &mut log);
        assert!(fragment.admitted);
        assert_eq!(fragment.reason, AdmitReason::ContentReferenced);
    }

    #[test]
    fn import_zip_is_opt_in() {
        let id = item_id();
        let content = doc("<itemrelease><item id=\"612345\" bankkey=\"200\"/></itemrelease>");
        let mut log = log();

        let off = Classifier::new(&id, &content, None, &[], false);
        assert!(!off.classify("import.zip", &mut log).admitted);

        let on = Classifier::new(&id, &content, None, &[], true);
        let result = on.classify("import.zip", &mut log);
        assert!(result.admitted);
        assert_eq!(result.reason, AdmitReason::ExplicitInclude);
    }

    #[test]
    fn renderer_spec_match_strips_esn_suffix() {
        let id = item_id();
        let content = doc("<itemrelease><item id=\"612345\" bankkey=\"200\"/></itemrelease>");
        let renderer = doc("<rendererSpec><img src=\"item_612345_stem_png256.png\"/></rendererSpec>");
        let classifier = Classifier::new(&id, &content, Some(&renderer), &[], false);
        let mut log = log();

        let result = classifier.classify("item_612345_stem_png256_ESN.png", &mut log);
        assert!(result.admitted);
        assert_eq!(result.reason, AdmitReason::RendererSpecReferenced);

        let miss = classifier.classify("unrelated.png", &mut log);
        assert!(!miss.admitted);
        assert_eq!(miss.reason, AdmitReason::Unmatched);
    }

    #[test]
    fn word_list_requires_href_reference() {
        let id = wit_id();
        let content = doc(
            "<itemrelease><item id=\"612345\" bankkey=\"200\">\
             <html><a href=\"hello_vietnamese.m4a\"/></html></item></itemrelease>",
        );
        let classifier = Classifier::new(&id, &content, None, &[], false);
        let mut log = log();

        assert!(classifier.classify("hello_vietnamese.m4a", &mut log).admitted);
        // Recognized audio extension but no href reference.
        assert!(!classifier.classify("stray_audio.ogg", &mut log).admitted);
        // XML is always core.
        assert!(classifier.classify("item-200-612345.xml", &mut log).admitted);
    }

    #[test]
    fn audio_sniffing_detects_container() {
        assert_eq!(sniff_audio(b"OggS\x00\x02rest"), AudioFormat::Ogg);
        assert_eq!(sniff_audio(b"\x00\x00\x00\x20ftypM4A "), AudioFormat::M4a);
        assert_eq!(sniff_audio(b"RIFF1234"), AudioFormat::Unknown);
        assert_eq!(sniff_audio(b"Og"), AudioFormat::Unknown);
    }

    #[test]
    fn mismatched_container_raises_recode() {
        let id = wit_id();
        let content = doc("<itemrelease><item id=\"612345\" bankkey=\"200\"/></itemrelease>");
        let classifier = Classifier::new(&id, &content, None, &[], false);
        let mut log = log();

        // m4a bytes behind an ogg name.
        let followup = classifier.word_list_followup(
            "item_12345_hello_v1.0_vietnamese.ogg",
            b"\x00\x00\x00\x20ftypM4A ",
            false,
            &mut log,
        );
        assert!(followup.extension_mismatch);

        let ok = classifier.word_list_followup(
            "item_12345_hello_v1.0_vietnamese.ogg",
            b"OggS\x00\x02rest",
            false,
            &mut log,
        );
        assert!(!ok.extension_mismatch);
    }

    #[test]
    fn off_pattern_audio_renamed_when_enabled() {
        let id = wit_id();
        let content = doc("<itemrelease><item id=\"612345\" bankkey=\"200\"/></itemrelease>");
        let classifier = Classifier::new(&id, &content, None, &[], false);
        let mut log = log();

        let followup = classifier.word_list_followup(
            "hello_vietnamese.m4a",
            b"\x00\x00\x00\x20ftypM4A ",
            true,
            &mut log,
        );
        let rename = followup.rename.unwrap();
        assert_eq!(rename.old_name, "hello_vietnamese.m4a");
        assert_eq!(rename.new_name, "item_12345_hello_v1.0_vietnamese.m4a");

        let disabled = classifier.word_list_followup(
            "hello_vietnamese.m4a",
            b"\x00\x00\x00\x20ftypM4A ",
            false,
            &mut log,
        );
        assert!(disabled.rename.is_none());
    }

    #[test]
    fn non_ascii_names_classify_without_panicking() {
        let id = item_id();
        let content = doc(
            "<itemrelease><item id=\"612345\" bankkey=\"200\">\
             <content>aéé</content></item></itemrelease>",
        );
        let classifier = Classifier::new(&id, &content, None, &[], false);
        let mut log = log();

        // Last three bytes land inside 'é'; no extension, no panic.
        assert_eq!(extension("aéé"), "");
        let referenced = classifier.classify("aéé", &mut log);
        assert!(referenced.admitted);
        assert!(!classifier.classify("béé", &mut log).admitted);
    }

    #[test]
    fn stimulus_admits_unreferenced_files() {
        use crate::domain::Role;
        let id = ContentId::new(Role::Stim, 200, 50, ContentKind::Item);
        let content = doc("<itemrelease><passage id=\"50\" bankkey=\"200\"/></itemrelease>");
        let classifier = Classifier::new(&id, &content, None, &[], false);
        let mut log = log();

        let result = classifier.classify("passage_50_v1.0_1_enu.pdf", &mut log);
        assert!(result.admitted);
    }

    #[test]
    fn static_exclusions() {
        let id = item_id();
        assert!(Classifier::is_excluded(&id, "glossary"));
        assert!(Classifier::is_excluded(&id, "glossary/word.ogg"));
        assert!(Classifier::is_excluded(&id, "general-attachments"));
        assert!(Classifier::is_excluded(&id, "general-attachments/x.pdf"));
        assert!(Classifier::is_excluded(&id, "item.json"));
        assert!(Classifier::is_excluded(&id, "612345.xml"));
        assert!(!Classifier::is_excluded(&id, "item-200-612345.xml"));
    }
}
