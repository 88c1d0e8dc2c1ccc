//! Simulated generation for dry runs
//!
//! Produces deterministic content from the record itself so a dry run
//! exercises scoring and reporting without touching the network.

use crate::content::{
    ContentSection, FaqEntry, GeneratedContent, PressureRow, PressureTable, SeoBlock,
};
use crate::validation::NormalizedRecord;

/// Content a well-behaved service would plausibly return for `record`
pub fn simulated_content(record: &NormalizedRecord) -> GeneratedContent {
    let p = &record.pressures;
    let vehicle = match &record.variant {
        Some(variant) => format!("{} {} {} {}", record.make, record.model, variant, record.year),
        None => format!("{} {} {}", record.make, record.model, record.year),
    };

    let mut rows = vec![PressureRow {
        condition: "empty".to_string(),
        front: Some(p.empty_front),
        rear: Some(p.empty_rear),
    }];
    if p.loaded_front.is_some() || p.loaded_rear.is_some() {
        rows.push(PressureRow {
            condition: "loaded".to_string(),
            front: p.loaded_front,
            rear: p.loaded_rear,
        });
    }
    if p.max_front.is_some() || p.max_rear.is_some() {
        rows.push(PressureRow {
            condition: "max".to_string(),
            front: p.max_front,
            rear: p.max_rear,
        });
    }

    GeneratedContent {
        title: Some(format!("{vehicle} tyre pressure")),
        introduction: Some(format!(
            "Recommended tyre pressures for the {vehicle} on {} tyres.",
            record.tire_size
        )),
        pressure_table: Some(PressureTable {
            unit: Some("psi".to_string()),
            rows,
        }),
        sections: vec![ContentSection {
            heading: "Checking your pressures".to_string(),
            body: "Measure with cold tyres and adjust to the values in the table.".to_string(),
        }],
        faq: vec![FaqEntry {
            question: format!("What pressure should a {vehicle} run?"),
            answer: format!(
                "{} psi front and {} psi rear when unladen.",
                p.empty_front, p.empty_rear
            ),
        }],
        conclusion: Some("Check pressures monthly and before long trips.".to_string()),
        seo: SeoBlock {
            title: Some(format!("{vehicle} Tyre Pressure")),
            description: Some(format!(
                "Front and rear tyre pressures for the {vehicle}, {} tyres.",
                record.tire_size
            )),
            keywords: vec![
                format!("{} {} tyre pressure", record.make, record.model).to_lowercase(),
                format!("{} psi", record.tire_size),
                format!("{} {}", record.model, record.year).to_lowercase(),
            ],
            canonical_url: Some(format!("/tyre-pressure/{}", record.key)),
        },
    }
}
