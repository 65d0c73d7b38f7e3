use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Column order of every tabular export.
pub const COLUMNS: [&str; 5] = ["Name", "Weight", "MRP", "Price", "Image_Path"];

static MRP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"MRP is\s*₹(\d+)").expect("valid MRP pattern"));

// Greedy `.*`: the first match captures the last rupee amount after "Price".
static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Price.*₹(\d+)").expect("valid Price pattern"));

/// One scraped product card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductRecord {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Weight")]
    pub weight: String,
    #[serde(rename = "MRP")]
    pub mrp: String,
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Image_Path")]
    pub image_path: String,
}

impl ProductRecord {
    /// Cells in `COLUMNS` order.
    pub fn to_row(&self) -> [&str; 5] {
        [
            self.name.as_str(),
            self.weight.as_str(),
            self.mrp.as_str(),
            self.price.as_str(),
            self.image_path.as_str(),
        ]
    }
}

/// Fields parsed out of a content description, before an image is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedDescription {
    pub name: String,
    pub weight: String,
    pub mrp: String,
    pub price: String,
}

impl ParsedDescription {
    pub fn into_record(self, image_path: &Path) -> ProductRecord {
        ProductRecord {
            name: self.name,
            weight: self.weight,
            mrp: self.mrp,
            price: self.price,
            image_path: image_path.to_string_lossy().into_owned(),
        }
    }
}

/// First two comma-separated segments, trimmed. Missing segments are empty.
pub fn parse_name_weight(desc: &str) -> (String, String) {
    let mut parts = desc.split(',').map(str::trim);
    let name = parts.next().unwrap_or_default().to_string();
    let weight = parts.next().unwrap_or_default().to_string();
    (name, weight)
}

pub fn parse_mrp(desc: &str) -> String {
    capture_digits(&MRP_RE, desc)
}

pub fn parse_price(desc: &str) -> String {
    capture_digits(&PRICE_RE, desc)
}

fn capture_digits(re: &Regex, desc: &str) -> String {
    re.captures(desc)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Best-effort parse of a product card description. Never fails.
pub fn parse_description(desc: &str) -> ParsedDescription {
    let (name, weight) = parse_name_weight(desc);
    ParsedDescription {
        name,
        weight,
        mrp: parse_mrp(desc),
        price: parse_price(desc),
    }
}

/// Replace every character outside `[A-Za-z0-9]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Screenshot path for the record that will sit at 1-based position `index`.
pub fn image_path_for(dir: &Path, index: usize, name: &str, sanitized_names: bool) -> PathBuf {
    if sanitized_names {
        dir.join(format!("{index}_{}.png", sanitize_name(name)))
    } else {
        dir.join(format!("{index}.png"))
    }
}
