//! Identity of a content unit in the item bank.
//!
//! An id carries a role (item vs stimulus), a bank key, the numeric id,
//! and the kind of content it resolves to (regular item, word list, or
//! tutorial). The textual forms are either a bare number or the full
//! `role-bankKey-id` triplet.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether the unit lives under `Items/` or `Stimuli/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Item,
    Stim,
}

impl Role {
    /// Lowercase token used in file names and lookup keys.
    pub fn token(&self) -> &'static str {
        match self {
            Role::Item => "item",
            Role::Stim => "stim",
        }
    }

    /// Capitalized token used in archive folder names.
    pub fn token_cap(&self) -> &'static str {
        match self {
            Role::Item => "Item",
            Role::Stim => "Stim",
        }
    }
}

/// What the content unit is, which selects the classification rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Item,
    WordList,
    Tutorial,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("id '{0}' is neither a bare number nor a role-bankKey-id triplet")]
    Unrecognized(String),

    #[error("unknown role '{0}' (expected 'item' or 'stim')")]
    UnknownRole(String),

    #[error("non-numeric component in id '{0}'")]
    BadNumber(String),
}

/// Parsed identity of an item, stimulus, word list, or tutorial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentId {
    pub role: Role,
    pub bank_key: u32,
    pub id: u32,
    pub kind: ContentKind,
}

impl ContentId {
    pub fn new(role: Role, bank_key: u32, id: u32, kind: ContentKind) -> Self {
        Self {
            role,
            bank_key,
            id,
            kind,
        }
    }

    /// Parse either a bare number or a `role-bankKey-id` triplet.
    ///
    /// A bare number becomes an Item in the caller-supplied default bank.
    pub fn parse(text: &str, default_bank_key: u32) -> Result<Self, ParseIdError> {
        let text = text.trim();
        if let Ok(id) = text.parse::<u32>() {
            return Ok(Self::new(Role::Item, default_bank_key, id, ContentKind::Item));
        }

        let parts: Vec<&str> = text.split('-').collect();
        if parts.len() != 3 {
            return Err(ParseIdError::Unrecognized(text.to_string()));
        }

        let role = match parts[0].to_ascii_lowercase().as_str() {
            "item" => Role::Item,
            "stim" => Role::Stim,
            other => return Err(ParseIdError::UnknownRole(other.to_string())),
        };
        let bank_key = parts[1]
            .parse::<u32>()
            .map_err(|_| ParseIdError::BadNumber(text.to_string()))?;
        let id = parts[2]
            .parse::<u32>()
            .map_err(|_| ParseIdError::BadNumber(text.to_string()))?;

        Ok(Self::new(role, bank_key, id, ContentKind::Item))
    }

    /// Canonical lowercase triplet, e.g. `item-200-12345`.
    ///
    /// This is the form used for repository lookups, content file names,
    /// and manifest identifiers.
    pub fn canonical(&self) -> String {
        format!("{}-{}-{}", self.role.token(), self.bank_key, self.id)
    }

    /// Capitalized triplet for user-facing output and the `Items/`
    /// folder naming, e.g. `Item-200-12345`.
    pub fn display_cap(&self) -> String {
        format!("{}-{}-{}", self.role.token_cap(), self.bank_key, self.id)
    }

    /// Name of the primary content document inside the repository.
    pub fn content_file_name(&self) -> String {
        format!("{}.xml", self.canonical())
    }

    /// Archive folder for this unit, with trailing slash.
    ///
    /// Items get the capitalized folder name, stimuli the lowercase one,
    /// matching the package layout the downstream loader expects.
    pub fn archive_folder(&self) -> String {
        match self.role {
            Role::Item => format!("Items/{}/", self.display_cap()),
            Role::Stim => format!("Stimuli/{}/", self.canonical()),
        }
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}
