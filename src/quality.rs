//! Structural quality scoring for generated articles
//!
//! Scoring is deterministic: it looks only at which sections are present and
//! at the shape of the SEO block, never at prose quality. A low score is
//! reported, not enforced; the orchestrator persists the article with its
//! score either way.

use serde::{Deserialize, Serialize};

use crate::config::QualityConfig;
use crate::content::{GeneratedContent, SectionKind};
use crate::types::QualityLevel;

/// One problem found while scoring
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityIssue {
    /// Required section absent or empty
    MissingSection {
        /// Section that is missing
        section: SectionKind,
    },
    /// SEO title absent
    MissingTitle,
    /// SEO title longer than the soft limit
    TitleTooLong {
        /// Actual length in characters
        length: usize,
        /// Soft limit
        limit: usize,
    },
    /// Meta description absent
    MissingDescription,
    /// Meta description longer than the soft limit
    DescriptionTooLong {
        /// Actual length in characters
        length: usize,
        /// Soft limit
        limit: usize,
    },
    /// No canonical URL
    MissingCanonical,
    /// Keyword set smaller than required
    TooFewKeywords {
        /// Keywords present
        count: usize,
        /// Required minimum
        min: usize,
    },
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityIssue::MissingSection { section } => write!(f, "missing section {}", section.as_str()),
            QualityIssue::MissingTitle => f.write_str("missing SEO title"),
            QualityIssue::TitleTooLong { length, limit } => {
                write!(f, "SEO title is {length} chars (limit {limit})")
            }
            QualityIssue::MissingDescription => f.write_str("missing meta description"),
            QualityIssue::DescriptionTooLong { length, limit } => {
                write!(f, "meta description is {length} chars (limit {limit})")
            }
            QualityIssue::MissingCanonical => f.write_str("missing canonical URL"),
            QualityIssue::TooFewKeywords { count, min } => {
                write!(f, "{count} keywords (need {min})")
            }
        }
    }
}

/// Result of scoring one article
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Score within the configured bounds
    pub score: i32,
    /// Level derived from the score
    pub level: QualityLevel,
    /// Problems found, in check order
    pub issues: Vec<QualityIssue>,
    /// Minimum acceptable score in effect when scored
    pub min_acceptable: i32,
}

impl QualityReport {
    /// Whether the score falls under the acceptable minimum
    pub fn below_threshold(&self) -> bool {
        self.score < self.min_acceptable
    }
}

/// Deterministic structural scorer
#[derive(Clone, Debug, Default)]
pub struct ContentQualityScorer {
    config: QualityConfig,
}

impl ContentQualityScorer {
    /// Create a scorer with the given rules
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    /// Score one article
    pub fn score(&self, content: &GeneratedContent) -> QualityReport {
        let cfg = &self.config;
        let mut score = cfg.max_score;
        let mut issues = Vec::new();

        for &section in &cfg.required_sections {
            if !content.has_section(section) {
                score -= cfg.missing_section_penalty;
                issues.push(QualityIssue::MissingSection { section });
            }
        }

        let seo = &content.seo;
        match present(&seo.title) {
            None => {
                score -= cfg.missing_seo_penalty;
                issues.push(QualityIssue::MissingTitle);
            }
            Some(title) => {
                let length = title.chars().count();
                if length > cfg.title_soft_limit {
                    score -= cfg.soft_limit_penalty;
                    issues.push(QualityIssue::TitleTooLong {
                        length,
                        limit: cfg.title_soft_limit,
                    });
                }
            }
        }

        match present(&seo.description) {
            None => {
                score -= cfg.missing_seo_penalty;
                issues.push(QualityIssue::MissingDescription);
            }
            Some(description) => {
                let length = description.chars().count();
                if length > cfg.description_soft_limit {
                    score -= cfg.soft_limit_penalty;
                    issues.push(QualityIssue::DescriptionTooLong {
                        length,
                        limit: cfg.description_soft_limit,
                    });
                }
            }
        }

        if present(&seo.canonical_url).is_none() {
            score -= cfg.canonical_penalty;
            issues.push(QualityIssue::MissingCanonical);
        }

        if seo.keywords.len() < cfg.min_keywords {
            score -= cfg.keyword_penalty;
            issues.push(QualityIssue::TooFewKeywords {
                count: seo.keywords.len(),
                min: cfg.min_keywords,
            });
        }

        let score = score.clamp(cfg.min_score, cfg.max_score);
        QualityReport {
            score,
            level: self.level_for(score),
            issues,
            min_acceptable: cfg.min_acceptable_score,
        }
    }

    /// Level for a score under the configured thresholds
    pub fn level_for(&self, score: i32) -> QualityLevel {
        let t = &self.config.thresholds;
        if score >= t.excellent {
            QualityLevel::Excellent
        } else if score >= t.good {
            QualityLevel::Good
        } else if score >= t.average {
            QualityLevel::Average
        } else if score >= t.poor {
            QualityLevel::Poor
        } else {
            QualityLevel::VeryPoor
        }
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
