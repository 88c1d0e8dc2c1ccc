
use crate::content::tests::complete_content;
use crate::quality::ContentQualityScorer;
use crate::store::NewArticle;
use crate::types::{NaturalKey, Tier};

/// Article for the Hilux fixture, scored with default rules
fn new_article(key: &str) -> NewArticle {
    let content = complete_content();
    let quality = ContentQualityScorer::default().score(&content);
    NewArticle {
        key: NaturalKey::from_slug(key),
        make: "Toyota".to_string(),
        model: "Hilux".to_string(),
        year: 2021,
        variant: None,
        content,
        tier_used: Tier::Standard,
        generation_attempts: 1,
        quality,
    }
}
