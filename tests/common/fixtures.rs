//! Datasets and mock service responses

use serde_json::{Value, json};
use std::path::PathBuf;
use tempfile::TempDir;

/// One valid motorcycle and one pickup with a zero loaded-front pressure
pub const MIXED_CSV: &str = "\
make,model,year,tire_size,category,vehicle_type,empty_front,empty_rear,loaded_front,loaded_rear
Yamaha,MT-07,2022,120/70 ZR17,naked,motorcycle,28,32,,
Toyota,Hilux,2021,265/65 R17,pickup,car,29,29,0,41
";

/// Three valid records
pub const VALID_CSV: &str = "\
brand,model,year,tyre_size,segment,type,front_empty,rear_empty
Yamaha,MT-07,2022,120/70 ZR17,naked,motorcycle,28,32
Honda,Civic,2020,235/40 R18,hatchback,car,33,33
Tesla,Model 3,2023,235/45 R18,sedan,electric,42,42
";

/// Write `contents` to `vehicles.csv` in `dir`
pub fn write_csv(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("vehicles.csv");
    std::fs::write(&path, contents).unwrap();
    path
}

/// Article payload with every section and a complete SEO block
pub fn article_json() -> Value {
    json!({
        "title": "Tyre pressure guide",
        "introduction": "Correct pressures keep the vehicle stable and efficient.",
        "pressure_table": {
            "unit": "psi",
            "rows": [{ "condition": "empty", "front": 28, "rear": 32 }]
        },
        "sections": [{ "heading": "Checking pressure", "body": "Check cold tyres monthly." }],
        "faq": [{ "question": "Where is the placard?", "answer": "On the door pillar." }],
        "conclusion": "Stick to the placard values.",
        "seo": {
            "title": "Tyre Pressure Guide",
            "description": "Recommended front and rear tyre pressures.",
            "keywords": ["tyre pressure", "psi", "placard"],
            "canonical_url": "/tyre-pressure/placeholder"
        }
    })
}

/// Chat-completion style body whose message wraps `payload` in prose and a code fence
pub fn chat_completion(payload: &Value) -> Value {
    json!({
        "id": "cmpl-test",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": format!("Here is the article:\n```json\n{}\n```\nEnjoy!", payload)
            }
        }]
    })
}

/// Chat-completion body with no JSON in it at all
pub fn prose_only_completion() -> Value {
    json!({
        "choices": [{
            "message": { "role": "assistant", "content": "Sorry, I cannot help with that." }
        }]
    })
}
