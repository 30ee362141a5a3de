//! The named candidate palette and its JSON file format.
//!
//! A palette file is a single JSON object mapping color names to `[r, g, b]`
//! triples, for example:
//!
//! ```json
//! { "ecru": [240, 234, 218], "garnet": [115, 12, 37] }
//! ```
//!
//! Entry order in the file is preserved and becomes the candidate index order
//! used everywhere else in the crate.

use crate::MAX_CANDIDATES;
use indexmap::IndexMap;
use palette::Srgb;
use std::{fs::File, io::BufRead, io::BufReader, path::Path};
use thiserror::Error;

/// The errors reported while building or loading a [`NamedPalette`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PaletteError {
    /// The palette contains no entries.
    #[error("palette contains no entries")]
    Empty,
    /// The palette contains more than [`MAX_CANDIDATES`] entries.
    #[error("palette contains {0} entries but at most {MAX_CANDIDATES} are supported")]
    TooManyCandidates(usize),
    /// Two entries share the same name.
    #[error("duplicate color name \"{0}\"")]
    DuplicateName(String),
    /// The palette file could not be read.
    #[error("failed to read palette file")]
    Io(#[from] std::io::Error),
    /// The palette file is not valid JSON of the expected shape.
    #[error("failed to parse palette json")]
    Json(#[from] serde_json::Error),
}

/// One candidate color together with its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteEntry {
    /// The display name, e.g. a thread or yarn product name.
    pub name: String,
    /// The device color of the entry.
    pub color: Srgb<u8>,
}

/// An ordered set of named candidate colors.
///
/// The index of an entry is stable for the lifetime of the palette and is used
/// as the candidate index throughout the reduction pipeline. Names must be
/// unique; colors may repeat (two products can share a dye lot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedPalette {
    /// The candidate names in index order.
    names: Vec<String>,
    /// The candidate colors in index order.
    colors: Vec<Srgb<u8>>,
}

impl NamedPalette {
    /// Creates a palette from `(name, color)` pairs, preserving order.
    ///
    /// # Errors
    /// Returns an error if the input is empty, has more than [`MAX_CANDIDATES`]
    /// entries, or repeats a name.
    pub fn new(
        entries: impl IntoIterator<Item = (String, Srgb<u8>)>,
    ) -> Result<Self, PaletteError> {
        let mut names = Vec::new();
        let mut colors = Vec::new();
        for (name, color) in entries {
            if names.contains(&name) {
                return Err(PaletteError::DuplicateName(name));
            }
            names.push(name);
            colors.push(color);
        }

        if names.is_empty() {
            return Err(PaletteError::Empty);
        }
        if names.len() > usize::from(MAX_CANDIDATES) {
            return Err(PaletteError::TooManyCandidates(names.len()));
        }

        Ok(Self { names, colors })
    }

    /// Parses a palette from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the entries fail the
    /// checks documented on [`NamedPalette::new`].
    pub fn from_json_str(json: &str) -> Result<Self, PaletteError> {
        let map: IndexMap<String, [u8; 3]> = serde_json::from_str(json)?;
        Self::from_map(map)
    }

    /// Reads and parses a palette from a JSON file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, the JSON is malformed, or
    /// the entries fail the checks documented on [`NamedPalette::new`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PaletteError> {
        Self::from_json_reader(BufReader::new(File::open(path)?))
    }

    /// Parses a palette from a JSON reader.
    ///
    /// # Errors
    /// See [`NamedPalette::load`].
    pub fn from_json_reader(reader: impl BufRead) -> Result<Self, PaletteError> {
        let map: IndexMap<String, [u8; 3]> = serde_json::from_reader(reader)?;
        Self::from_map(map)
    }

    fn from_map(map: IndexMap<String, [u8; 3]>) -> Result<Self, PaletteError> {
        // A repeated key in the file collapses to its last occurrence during
        // parsing, so DuplicateName only fires for programmatic construction.
        Self::new(
            map.into_iter()
                .map(|(name, [r, g, b])| (name, Srgb::new(r, g, b))),
        )
    }

    /// The number of candidate colors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the palette has no entries. Always `false` for a constructed palette.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The name of the candidate at the given index.
    #[must_use]
    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    /// The color of the candidate at the given index.
    #[must_use]
    pub fn color(&self, index: usize) -> Srgb<u8> {
        self.colors[index]
    }

    /// All candidate colors in index order.
    #[must_use]
    pub fn colors(&self) -> &[Srgb<u8>] {
        &self.colors
    }

    /// All candidate names in index order.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// An owned [`PaletteEntry`] for the candidate at the given index.
    #[must_use]
    pub fn entry(&self, index: usize) -> PaletteEntry {
        PaletteEntry {
            name: self.names[index].clone(),
            color: self.colors[index],
        }
    }

    /// The index of the candidate with the given name, if present.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Iterates over `(name, color)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Srgb<u8>)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.colors.iter().copied())
    }
}
