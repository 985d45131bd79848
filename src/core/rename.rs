//! Legacy glossary-audio filename normalization.
//!
//! Word-list audio recorded before the naming convention settled shows up
//! with 2 to 5 underscore-delimited parts and no version token. The
//! canonical form is
//! `(item|stim)_<root id>_<term>_v<major.minor>_<language>[_<dialect>].(m4a|ogg)`
//! where the root id is the bank id minus the word-list offset.

use crate::domain::ContentId;

/// Offset between a word list's bank id and the root id embedded in its
/// audio file names.
const ROOT_ID_OFFSET: u32 = 600_000_000;

/// Version token inserted when the legacy name carries none.
const DEFAULT_VERSION: &str = "v1.0";

/// One applied rename, substituted into the owning item's content
/// document before it is written to the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameRecord {
    pub old_name: String,
    pub new_name: String,
}

/// Rewrite a legacy glossary audio name into the canonical form.
///
/// Returns `None` when the name does not split into 2..=5 parts, or
/// when the owner id is below the word-list offset; the caller keeps
/// the original name in those cases.
pub fn normalize_glossary_audio(old_name: &str, owner: &ContentId) -> Option<String> {
    let root_id = owner.id.checked_sub(ROOT_ID_OFFSET)?.to_string();
    let role = owner.role.token();

    let parts: Vec<&str> = old_name.split('_').collect();
    if !(2..=5).contains(&parts.len()) {
        return None;
    }

    // Prefix the role token when the name does not already start with it.
    let mut out = String::new();
    if parts[0] != role {
        out.push_str(role);
    }

    let lower = |s: &str| s.to_lowercase();

    match parts.len() {
        // <term>_<language>
        2 => {
            out.push_str(&format!(
                "_{}_{}_{}_{}",
                root_id,
                lower(parts[0]),
                DEFAULT_VERSION,
                lower(parts[1])
            ));
        }
        // <term>_<language>_<dialect>
        3 if parts[0] != root_id => {
            out.push_str(&format!(
                "_{}_{}_{}_{}_{}",
                root_id,
                lower(parts[0]),
                DEFAULT_VERSION,
                lower(parts[1]),
                lower(parts[2])
            ));
        }
        // <root>_<term>_<language>
        3 => {
            out.push_str(&format!(
                "_{}_{}_{}_{}",
                lower(parts[0]),
                lower(parts[1]),
                DEFAULT_VERSION,
                lower(parts[2])
            ));
        }
        // <role>_<root>_<term>_<language>
        4 if parts[0] == role => {
            out.push_str(&format!(
                "{}_{}_{}_{}_{}",
                parts[0],
                lower(parts[1]),
                lower(parts[2]),
                DEFAULT_VERSION,
                lower(parts[3])
            ));
        }
        // <root>_<term>_<language>_<dialect>
        4 => {
            out.push_str(&format!(
                "_{}_{}_{}_{}_{}",
                lower(parts[0]),
                lower(parts[1]),
                DEFAULT_VERSION,
                lower(parts[2]),
                lower(parts[3])
            ));
        }
        // <role>_<root>_<term>_<language>_<dialect>
        5 => {
            out.push_str(&format!(
                "{}_{}_{}_{}_{}_{}",
                lower(parts[0]),
                lower(parts[1]),
                lower(parts[2]),
                DEFAULT_VERSION,
                lower(parts[3]),
                lower(parts[4])
            ));
        }
        _ => unreachable!(),
    }

    Some(out)
}
