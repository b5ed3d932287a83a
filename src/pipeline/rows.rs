//! Batch rows: normalized field lookup and the row-source seam

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

use crate::engine::MAX_DIMENSION;
use crate::error::GenerationError;
use crate::pipeline::placeholder::usable_dimension;

/// Canonical fields a row may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowField {
    FileBaseName,
    Width,
    Height,
    Prompt,
    AssetType,
    CharacterPart,
    FacingDirection,
}

impl RowField {
    /// Resolve a column header, ignoring case, whitespace, `_` and `-`
    pub fn from_header(header: &str) -> Option<RowField> {
        let key: String = header
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();

        match key.as_str() {
            "filebasename" | "filename" | "file" | "name" => Some(RowField::FileBaseName),
            "width" | "w" => Some(RowField::Width),
            "height" | "h" => Some(RowField::Height),
            "prompt" | "description" => Some(RowField::Prompt),
            "assettype" | "type" => Some(RowField::AssetType),
            "characterpart" | "part" => Some(RowField::CharacterPart),
            "facingdirection" | "facing" | "direction" => Some(RowField::FacingDirection),
            _ => None,
        }
    }
}

/// One unit of batch work
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRow {
    fields: HashMap<RowField, String>,
}

impl BatchRow {
    /// Build a row from raw `(header, value)` pairs. Unknown headers and
    /// blank values are dropped; the first occurrence of a field wins.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut fields = HashMap::new();
        for (header, value) in pairs {
            let value = value.as_ref().trim();
            if value.is_empty() {
                continue;
            }
            if let Some(field) = RowField::from_header(header.as_ref()) {
                fields.entry(field).or_insert_with(|| value.to_string());
            }
        }
        Self { fields }
    }

    pub fn get(&self, field: RowField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn is_blank(&self) -> bool {
        self.fields.is_empty()
    }

    /// `<fileBaseName>.png`, or `asset_<n>.png` with a 1-based position
    pub fn output_filename(&self, index: usize) -> String {
        match self.get(RowField::FileBaseName) {
            Some(base) if base.to_lowercase().ends_with(".png") => base.to_string(),
            Some(base) => format!("{}.png", base),
            None => format!("asset_{}.png", index + 1),
        }
    }

    /// Prompt and dimensions, or the reason the row cannot be generated
    pub fn validated(&self) -> Result<(&str, u32, u32), GenerationError> {
        let prompt = self
            .get(RowField::Prompt)
            .ok_or_else(|| GenerationError::Validation("prompt is missing".to_string()))?;
        let width = parse_dimension(self.get(RowField::Width), "width")?;
        let height = parse_dimension(self.get(RowField::Height), "height")?;
        Ok((prompt, width, height))
    }

    /// Dimensions for a placeholder; unusable values fall back per axis
    pub fn best_guess_dimensions(&self) -> (u32, u32) {
        let guess = |field| {
            self.get(field)
                .and_then(|v| v.parse::<i64>().ok())
                .map(|v| v.clamp(0, MAX_DIMENSION as i64) as u32)
                .unwrap_or(0)
        };
        (
            usable_dimension(guess(RowField::Width)),
            usable_dimension(guess(RowField::Height)),
        )
    }
}

/// Reserve `name` in `taken`, appending `_2`, `_3`, ... before the extension
/// while it collides. Comparison ignores case.
pub fn unique_filename(taken: &mut HashSet<String>, name: String) -> String {
    if taken.insert(name.to_lowercase()) {
        return name;
    }

    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name.as_str(), ""),
    };
    let mut suffix = 2;
    loop {
        let candidate = format!("{}_{}{}", stem, suffix, extension);
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn parse_dimension(raw: Option<&str>, axis: &str) -> Result<u32, GenerationError> {
    let raw = raw.ok_or_else(|| GenerationError::Validation(format!("{} is missing", axis)))?;
    let value: i64 = raw
        .parse()
        .map_err(|_| GenerationError::Validation(format!("{} '{}' is not an integer", axis, raw)))?;

    if value <= 0 {
        return Err(GenerationError::Validation(format!("{} must be positive, got {}", axis, value)));
    }
    if value > MAX_DIMENSION as i64 {
        return Err(GenerationError::Validation(format!(
            "{} must be at most {}, got {}",
            axis, MAX_DIMENSION, value
        )));
    }
    Ok(value as u32)
}

/// Failure to turn tabular input into rows; surfaced verbatim
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RowSourceError(pub String);

/// Produces the ordered, blank-filtered rows of a batch
pub trait RowSource {
    fn rows(&self) -> Result<Vec<BatchRow>, RowSourceError>;
}

/// Rows from a JSON array of flat objects
pub struct JsonRowSource {
    value: Value,
}

impl JsonRowSource {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn parse(text: &str) -> Result<Self, RowSourceError> {
        serde_json::from_str(text)
            .map(Self::new)
            .map_err(|e| RowSourceError(format!("Could not parse rows: {}", e)))
    }
}

impl RowSource for JsonRowSource {
    fn rows(&self) -> Result<Vec<BatchRow>, RowSourceError> {
        let records = self
            .value
            .as_array()
            .ok_or_else(|| RowSourceError("Rows must be a JSON array".to_string()))?;

        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let object = record
                .as_object()
                .ok_or_else(|| RowSourceError(format!("Row {} is not an object", index + 1)))?;

            let mut pairs = Vec::with_capacity(object.len());
            for (key, value) in object {
                let text = match value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null => String::new(),
                    _ => {
                        return Err(RowSourceError(format!(
                            "Row {} field '{}' must be a string or number",
                            index + 1,
                            key
                        )))
                    }
                };
                pairs.push((key.as_str(), text));
            }

            let row = BatchRow::from_pairs(pairs);
            if !row.is_blank() {
                rows.push(row);
            }
        }

        Ok(rows)
    }
}
