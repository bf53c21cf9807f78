//! User supplied tag overrides applied to every written file.
//!
//! Overrides are read from a JSON object in the DICOM JSON model layout:
//!
//! ```json
//! {
//!   "00100010": { "vr": "PN", "Value": [{ "Alphabetic": "Doe^Jane" }] },
//!   "00080050": { "vr": "SH", "Value": ["ACC-1234"] }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use dicom_core::{Tag, VR};
use serde::Deserialize;
use tracing::debug;

use crate::image_pipeline::common::error::{ConversionError, Result};

/// Value representations that can be written from their textual form.
const TEXT_VRS: &[VR] = &[
    VR::AE,
    VR::AS,
    VR::CS,
    VR::DA,
    VR::DS,
    VR::DT,
    VR::IS,
    VR::LO,
    VR::LT,
    VR::PN,
    VR::SH,
    VR::ST,
    VR::TM,
    VR::UC,
    VR::UI,
    VR::UR,
    VR::UT,
];

#[derive(Debug, Deserialize)]
struct JsonAttribute {
    vr: String,
    #[serde(rename = "Value", default)]
    value: Vec<serde_json::Value>,
}

/// One overriding attribute
#[derive(Debug, Clone, PartialEq)]
pub struct TagOverride {
    pub tag: Tag,
    pub vr: VR,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdditionalTags {
    entries: BTreeMap<Tag, TagOverride>,
}

impl AdditionalTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the override for `tag`.
    pub fn insert(&mut self, tag: Tag, vr: VR, values: Vec<String>) -> Result<()> {
        if !TEXT_VRS.contains(&vr) {
            return Err(ConversionError::ConfigError(format!(
                "tag {tag} uses VR {vr:?}, only textual VRs can be overridden"
            )));
        }
        self.entries.insert(tag, TagOverride { tag, vr, values });
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, JsonAttribute> = serde_json::from_str(json)
            .map_err(|e| ConversionError::ConfigError(format!("tag overrides: {e}")))?;

        let mut tags = Self::new();
        for (key, attribute) in raw {
            let tag = parse_tag(&key)?;
            let vr: VR = attribute.vr.parse().map_err(|_| {
                ConversionError::ConfigError(format!("tag {key}: unknown VR '{}'", attribute.vr))
            })?;
            let values = attribute
                .value
                .iter()
                .map(|v| json_value_to_text(&key, v))
                .collect::<Result<Vec<_>>>()?;
            tags.insert(tag, vr, values)?;
        }
        debug!("Loaded {} tag overrides", tags.len());
        Ok(tags)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ConversionError::InputReadError(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn get(&self, tag: Tag) -> Option<&TagOverride> {
        self.entries.get(&tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TagOverride> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_tag(key: &str) -> Result<Tag> {
    let digits: String = key.chars().filter(|c| *c != ',').collect();
    if digits.len() != 8 {
        return Err(ConversionError::ConfigError(format!(
            "tag '{key}' must have 8 hex digits"
        )));
    }
    let value = u32::from_str_radix(&digits, 16)
        .map_err(|_| ConversionError::ConfigError(format!("tag '{key}' is not hexadecimal")))?;
    Ok(Tag((value >> 16) as u16, (value & 0xFFFF) as u16))
}

fn json_value_to_text(key: &str, value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Object(map) => match map.get("Alphabetic") {
            Some(serde_json::Value::String(name)) => Ok(name.clone()),
            _ => Err(ConversionError::ConfigError(format!(
                "tag {key}: person name objects need an 'Alphabetic' string"
            ))),
        },
        other => Err(ConversionError::ConfigError(format!(
            "tag {key}: unsupported value {other}"
        ))),
    }
}
