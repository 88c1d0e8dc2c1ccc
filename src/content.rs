//! Typed article content returned by the generation service
//!
//! The service answers with a JSON object of named sections plus an SEO
//! sub-object. Deserialization is lenient about shape (aliases, tables given
//! as a bare row array, keywords given as a comma-separated string) but the
//! result is always the same closed set of typed sections.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Structural section of an article
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    /// Opening paragraph
    Introduction,
    /// Primary data table of recommended pressures
    PressureTable,
    /// Free-standing body sections (at least one)
    Body,
    /// Frequently asked questions (at least one entry)
    Faq,
    /// Closing paragraph
    Conclusion,
}

impl SectionKind {
    /// Stable string form
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Introduction => "introduction",
            SectionKind::PressureTable => "pressure_table",
            SectionKind::Body => "body",
            SectionKind::Faq => "faq",
            SectionKind::Conclusion => "conclusion",
        }
    }
}

impl std::fmt::Display for SectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the pressure table
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PressureRow {
    /// Load condition ("empty", "loaded", "max", ...)
    #[serde(alias = "load", alias = "label")]
    pub condition: String,
    /// Front axle pressure
    #[serde(default)]
    pub front: Option<f64>,
    /// Rear axle pressure
    #[serde(default)]
    pub rear: Option<f64>,
}

/// Recommended pressures by load condition
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "PressureTableRepr")]
pub struct PressureTable {
    /// Unit label ("psi", "bar")
    pub unit: Option<String>,
    /// Table rows
    pub rows: Vec<PressureRow>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PressureTableRepr {
    Rows(Vec<PressureRow>),
    Table {
        #[serde(default)]
        unit: Option<String>,
        #[serde(default)]
        rows: Vec<PressureRow>,
    },
}

impl From<PressureTableRepr> for PressureTable {
    fn from(repr: PressureTableRepr) -> Self {
        match repr {
            PressureTableRepr::Rows(rows) => PressureTable { unit: None, rows },
            PressureTableRepr::Table { unit, rows } => PressureTable { unit, rows },
        }
    }
}

/// Headed body section
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    /// Section heading
    #[serde(alias = "title")]
    pub heading: String,
    /// Section body
    #[serde(alias = "content", alias = "text")]
    pub body: String,
}

/// FAQ entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaqEntry {
    /// Question
    #[serde(alias = "q")]
    pub question: String,
    /// Answer
    #[serde(alias = "a")]
    pub answer: String,
}

/// SEO metadata block
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SeoBlock {
    /// Page title
    #[serde(default, alias = "meta_title")]
    pub title: Option<String>,
    /// Meta description
    #[serde(default, alias = "meta_description")]
    pub description: Option<String>,
    /// Keyword set
    #[serde(default, deserialize_with = "keywords::deserialize")]
    pub keywords: Vec<String>,
    /// Canonical URL (may be a placeholder path)
    #[serde(default, alias = "canonical")]
    pub canonical_url: Option<String>,
}

mod keywords {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        List(Vec<String>),
        Joined(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let words = match Option::<Repr>::deserialize(deserializer)? {
            Some(Repr::List(list)) => list,
            Some(Repr::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
            None => Vec::new(),
        };
        Ok(words
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect())
    }
}

/// Article content as generated
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedContent {
    /// On-page headline
    #[serde(default, alias = "headline")]
    pub title: Option<String>,
    /// Opening paragraph
    #[serde(default, alias = "intro")]
    pub introduction: Option<String>,
    /// Pressure table
    #[serde(default, alias = "pressure_data", alias = "table")]
    pub pressure_table: Option<PressureTable>,
    /// Body sections
    #[serde(default)]
    pub sections: Vec<ContentSection>,
    /// FAQ
    #[serde(default, alias = "faqs")]
    pub faq: Vec<FaqEntry>,
    /// Closing paragraph
    #[serde(default, alias = "summary")]
    pub conclusion: Option<String>,
    /// SEO metadata
    #[serde(default, alias = "seo_data", alias = "meta")]
    pub seo: SeoBlock,
}

fn non_blank(text: &Option<String>) -> bool {
    text.as_deref().is_some_and(|t| !t.trim().is_empty())
}

impl GeneratedContent {
    /// Parse content from the JSON object extracted from a response
    pub fn from_value(value: serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Whether the given section is present with non-empty content
    pub fn has_section(&self, kind: SectionKind) -> bool {
        match kind {
            SectionKind::Introduction => non_blank(&self.introduction),
            SectionKind::PressureTable => self
                .pressure_table
                .as_ref()
                .is_some_and(|t| !t.rows.is_empty()),
            SectionKind::Body => self.sections.iter().any(|s| !s.body.trim().is_empty()),
            SectionKind::Faq => !self.faq.is_empty(),
            SectionKind::Conclusion => non_blank(&self.conclusion),
        }
    }

    /// Sections present in this content
    pub fn present_sections(&self) -> Vec<SectionKind> {
        [
            SectionKind::Introduction,
            SectionKind::PressureTable,
            SectionKind::Body,
            SectionKind::Faq,
            SectionKind::Conclusion,
        ]
        .into_iter()
        .filter(|k| self.has_section(*k))
        .collect()
    }

    /// No usable section at all
    ///
    /// Degenerate content is treated like a malformed response and escalated.
    pub fn is_degenerate(&self) -> bool {
        self.present_sections().is_empty()
    }

    /// Words across all prose sections
    pub fn word_count(&self) -> usize {
        let prose = [self.introduction.as_deref(), self.conclusion.as_deref()]
            .into_iter()
            .flatten()
            .chain(self.sections.iter().map(|s| s.body.as_str()))
            .chain(self.faq.iter().map(|f| f.answer.as_str()));
        prose.map(|t| t.split_whitespace().count()).sum()
    }

    /// SHA-256 fingerprint of the serialized content
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        #[allow(clippy::expect_used)] // no non-string map keys, so serialization cannot fail
        serde_json::to_writer(&mut hasher, self).expect("content serializes to JSON");
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}
