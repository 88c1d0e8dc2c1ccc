//! Prompt construction
//!
//! Turns a validated record into the text sent to the generation service.
//! The gateway treats the result as opaque; only the JSON shape it asks for
//! matters downstream, and that shape matches [`GeneratedContent`](crate::content::GeneratedContent).

use std::fmt::Write as _;

use crate::content::SectionKind;
use crate::validation::NormalizedRecord;

/// Builds generation prompts for one set of required sections
#[derive(Clone, Debug)]
pub struct PromptBuilder {
    required_sections: Vec<SectionKind>,
    title_limit: usize,
    description_limit: usize,
}

impl PromptBuilder {
    /// Create a builder
    pub fn new(required_sections: Vec<SectionKind>, title_limit: usize, description_limit: usize) -> Self {
        Self {
            required_sections,
            title_limit,
            description_limit,
        }
    }

    /// Prompt for one vehicle
    pub fn build(&self, record: &NormalizedRecord) -> String {
        let mut prompt = String::with_capacity(1024);
        let p = &record.pressures;

        let vehicle = match &record.variant {
            Some(variant) => format!("{} {} {} {}", record.make, record.model, variant, record.year),
            None => format!("{} {} {}", record.make, record.model, record.year),
        };

        // Writing to a String cannot fail
        let _ = writeln!(
            prompt,
            "Write a tyre pressure guide for the {vehicle} ({}, {}).",
            record.category,
            record.vehicle_type.as_str()
        );
        let _ = writeln!(prompt, "Tyre size: {}", record.tire_size);
        let _ = writeln!(prompt, "Recommended pressures (psi):");
        let _ = writeln!(prompt, "- empty: front {}, rear {}", p.empty_front, p.empty_rear);
        if p.loaded_front.is_some() || p.loaded_rear.is_some() {
            let _ = writeln!(
                prompt,
                "- loaded: front {}, rear {}",
                fmt_opt(p.loaded_front),
                fmt_opt(p.loaded_rear)
            );
        }
        if p.max_front.is_some() || p.max_rear.is_some() {
            let _ = writeln!(
                prompt,
                "- maximum: front {}, rear {}",
                fmt_opt(p.max_front),
                fmt_opt(p.max_rear)
            );
        }

        let sections: Vec<&str> = self.required_sections.iter().map(SectionKind::as_str).collect();
        let _ = writeln!(prompt);
        let _ = writeln!(prompt, "Required sections: {}.", sections.join(", "));
        let _ = writeln!(
            prompt,
            "SEO title at most {} characters, meta description at most {} characters, \
             at least 3 keywords, canonical URL /tyre-pressure/{}.",
            self.title_limit, self.description_limit, record.key
        );
        let _ = writeln!(prompt);
        prompt.push_str(RESPONSE_SHAPE);

        prompt
    }
}

impl Default for PromptBuilder {
    fn default() -> Self {
        let quality = crate::config::QualityConfig::default();
        Self::new(
            quality.required_sections,
            quality.title_soft_limit,
            quality.description_soft_limit,
        )
    }
}

const RESPONSE_SHAPE: &str = r#"Answer with a single JSON object and nothing else:
{
  "title": string,
  "introduction": string,
  "pressure_table": {"unit": "psi", "rows": [{"condition": string, "front": number, "rear": number}]},
  "sections": [{"heading": string, "body": string}],
  "faq": [{"question": string, "answer": string}],
  "conclusion": string,
  "seo": {"title": string, "description": string, "keywords": [string], "canonical_url": string}
}
"#;

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}
