use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::{SyncError, SyncResult};

/// Axis-aligned rectangle in document-native units.
///
/// Serialized as `[x0, y0, x1, y1]`, matching the extraction payload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "[f64; 4]", try_from = "[f64; 4]")]
pub struct BoundingBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl BoundingBox {
    /// Build a box, enforcing finite coordinates and `x0 <= x1`, `y0 <= y1`.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Result<Self, FragmentRejection> {
        if ![x0, y0, x1, y1].iter().all(|c| c.is_finite()) {
            return Err(FragmentRejection::NonFiniteCoordinate);
        }
        if x0 > x1 || y0 > y1 {
            return Err(FragmentRejection::InvertedBbox);
        }
        Ok(Self { x0, y0, x1, y1 })
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(bbox: BoundingBox) -> Self {
        [bbox.x0, bbox.y0, bbox.x1, bbox.y1]
    }
}

impl TryFrom<[f64; 4]> for BoundingBox {
    type Error = FragmentRejection;

    fn try_from(c: [f64; 4]) -> Result<Self, Self::Error> {
        BoundingBox::new(c[0], c[1], c[2], c[3])
    }
}

/// One extracted unit of text tied to a page location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub text: String,
    /// 1-based page ordinal
    pub page: u32,
    pub bbox: BoundingBox,
}

impl Fragment {
    pub fn new(text: impl Into<String>, page: u32, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            page,
            bbox,
        }
    }
}

/// Why a raw payload entry was kept out of the index
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum FragmentRejection {
    #[error("entry is not an object")]
    NotAnObject,
    #[error("text is missing or not a string")]
    MissingText,
    #[error("text is empty")]
    EmptyText,
    #[error("page is missing")]
    MissingPage,
    #[error("page is not an integer >= 1")]
    InvalidPage,
    #[error("bbox is missing")]
    MissingBbox,
    #[error("bbox must be an array of 4 coordinates")]
    MalformedBbox,
    #[error("bbox coordinate {0} is not a number")]
    NonNumericCoordinate(usize),
    #[error("bbox has a non-finite coordinate")]
    NonFiniteCoordinate,
    #[error("bbox is inverted (x0 > x1 or y0 > y1)")]
    InvertedBbox,
}

/// A payload entry that failed validation, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFragment {
    /// Position of the entry in the payload's fragment list
    pub position: usize,
    pub reason: FragmentRejection,
}

/// Document identifier as sent by the extraction service (numeric or opaque)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    Number(u64),
    Text(String),
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Number(n) => write!(f, "{}", n),
            DocumentId::Text(s) => f.write_str(s),
        }
    }
}

/// Unvalidated fragment as it arrives over the wire
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFragment {
    #[serde(default)]
    pub text: Option<Value>,
    #[serde(default)]
    pub page: Option<Value>,
    #[serde(default)]
    pub bbox: Option<Value>,
}

impl RawFragment {
    /// Read one payload entry; anything but a JSON object is rejected
    pub fn from_value(entry: Value) -> Result<Self, FragmentRejection> {
        if !entry.is_object() {
            return Err(FragmentRejection::NotAnObject);
        }
        serde_json::from_value(entry).map_err(|_| FragmentRejection::NotAnObject)
    }

    /// Validate one entry against the fragment invariants
    pub fn validate(&self) -> Result<Fragment, FragmentRejection> {
        let text = match &self.text {
            Some(Value::String(s)) => s,
            _ => return Err(FragmentRejection::MissingText),
        };
        if text.is_empty() {
            return Err(FragmentRejection::EmptyText);
        }

        let page = match &self.page {
            None | Some(Value::Null) => return Err(FragmentRejection::MissingPage),
            Some(v) => v
                .as_u64()
                .filter(|p| *p >= 1)
                .and_then(|p| u32::try_from(p).ok())
                .ok_or(FragmentRejection::InvalidPage)?,
        };

        let coords = match &self.bbox {
            None | Some(Value::Null) => return Err(FragmentRejection::MissingBbox),
            Some(Value::Array(items)) if items.len() == 4 => items,
            Some(_) => return Err(FragmentRejection::MalformedBbox),
        };

        let mut c = [0.0f64; 4];
        for (i, item) in coords.iter().enumerate() {
            c[i] = item
                .as_f64()
                .ok_or(FragmentRejection::NonNumericCoordinate(i))?;
        }

        let bbox = BoundingBox::try_from(c)?;
        Ok(Fragment::new(text.clone(), page, bbox))
    }
}

/// Response of the extraction service
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionPayload {
    #[serde(default)]
    pub id: Option<DocumentId>,
    #[serde(default)]
    pub url: Option<String>,
    /// Kept loose so a single bad entry cannot sink the whole payload
    #[serde(alias = "data")]
    pub fragments: Vec<Value>,
    #[serde(default, rename = "formattedText", alias = "formatted_text")]
    pub formatted_text: Option<String>,
}

impl ExtractionPayload {
    /// Parse a payload from its JSON text
    pub fn from_json(json: &str) -> SyncResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SyncError::payload_with_source("invalid extraction payload", e))
    }

    /// Validate every entry; malformed ones are dropped and recorded
    pub fn validate(self) -> ValidatedDocument {
        let mut fragments = Vec::with_capacity(self.fragments.len());
        let mut skipped = Vec::new();

        for (position, entry) in self.fragments.into_iter().enumerate() {
            match RawFragment::from_value(entry).and_then(|raw| raw.validate()) {
                Ok(fragment) => fragments.push(fragment),
                Err(reason) => {
                    debug!(position, %reason, "Dropping malformed fragment");
                    skipped.push(SkippedFragment { position, reason });
                }
            }
        }

        if !skipped.is_empty() {
            warn!(
                skipped = skipped.len(),
                kept = fragments.len(),
                "⚠️  Dropped malformed fragments from extraction payload"
            );
        }
        info!(fragments = fragments.len(), "📄 Extraction payload validated");

        ValidatedDocument {
            id: self.id,
            url: self.url,
            fragments,
            formatted_text: self.formatted_text.filter(|t| !t.trim().is_empty()),
            skipped,
        }
    }
}

/// A payload whose fragments all satisfy the data model invariants
#[derive(Debug, Clone, Serialize)]
pub struct ValidatedDocument {
    pub id: Option<DocumentId>,
    pub url: Option<String>,
    /// Fragments in reading order
    pub fragments: Vec<Fragment>,
    pub formatted_text: Option<String>,
    pub skipped: Vec<SkippedFragment>,
}

impl ValidatedDocument {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}
