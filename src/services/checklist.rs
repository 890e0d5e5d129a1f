use scraper::{Html, Selector};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use strsim::jaro_winkler;

/// Minimum similarity for a "did you mean" suggestion (0.0 - 1.0).
const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Species on the California Bird Records Committee checklist.
///
/// The backing CSV holds the whole list in its first record.
#[derive(Debug, Clone)]
pub struct SpeciesChecklist {
    species: Vec<String>,
    normalized: HashSet<String>,
}

impl SpeciesChecklist {
    pub fn new(species: Vec<String>) -> Self {
        let species: Vec<String> = species
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let normalized = species.iter().map(|s| s.to_lowercase()).collect();
        Self { species, normalized }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ChecklistError> {
        let file = std::fs::File::open(path.as_ref()).map_err(|source| ChecklistError::Io {
            path: path.as_ref().display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ChecklistError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut first = csv::StringRecord::new();
        if !csv.read_record(&mut first)? {
            return Err(ChecklistError::Empty);
        }

        let checklist = Self::new(first.iter().map(str::to_string).collect());
        if checklist.is_empty() {
            return Err(ChecklistError::Empty);
        }
        Ok(checklist)
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }

    /// Case-insensitive membership test.
    pub fn contains(&self, name: &str) -> bool {
        self.normalized.contains(&name.to_lowercase())
    }

    /// Closest checklist entry to a misspelled name, if any is close enough.
    pub fn closest(&self, name: &str) -> Option<&str> {
        let needle = name.trim().to_lowercase();
        self.species
            .iter()
            .map(|s| (s, jaro_winkler(&s.to_lowercase(), &needle)))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, _)| s.as_str())
    }
}

/// Extract species names from the CBRC checklist page.
///
/// Each species is a `<p class="species">`; its first non-blank text node is
/// the common name.
pub fn parse_checklist_html(html: &str) -> Result<Vec<String>, ChecklistError> {
    let document = Html::parse_document(html);
    let selector =
        Selector::parse("p.species").map_err(|e| ChecklistError::Selector(e.to_string()))?;

    Ok(document
        .select(&selector)
        .filter_map(|element| {
            element
                .text()
                .map(str::trim)
                .find(|t| !t.is_empty())
                .map(str::to_string)
        })
        .collect())
}

/// Write the checklist as a single CSV record.
pub fn write_csv(path: impl AsRef<Path>, species: &[String]) -> Result<(), ChecklistError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(species)?;
    writer.flush().map_err(|source| ChecklistError::Io {
        path: "checklist csv".to_string(),
        source,
    })?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum ChecklistError {
    #[error("Failed to read checklist {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Checklist CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Checklist contains no species")]
    Empty,

    #[error("Invalid selector: {0}")]
    Selector(String),
}
