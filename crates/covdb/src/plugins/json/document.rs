//! Serde shape of a covdb-json document

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::plugins::records::{HistoryRecord, SourceRecord};

/// Value of the document's `format` key
pub const JSON_FORMAT: &str = "covdb-json";

/// Highest document version this build reads
pub const JSON_VERSION: u32 = 1;

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn is_one(value: &u32) -> bool {
    *value == 1
}

fn is_default_goal(value: &i64) -> bool {
    *value == crate::core::DEFAULT_SCOPE_GOAL
}

fn one() -> u32 {
    1
}

fn default_goal() -> i64 {
    crate::core::DEFAULT_SCOPE_GOAL
}

fn default_language() -> String {
    crate::core::SourceLanguage::None.name().to_string()
}

#[allow(clippy::ptr_arg)]
fn is_no_language(value: &String) -> bool {
    *value == default_language()
}

/// Whole document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonDocument {
    pub format: String,
    pub version: u32,
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub written_by: String,
    #[serde(default)]
    pub written_time: String,
    #[serde(default = "default_separator")]
    pub path_separator: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<SourceRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<HistoryRecord>,
    #[serde(default)]
    pub scopes: Vec<ScopeNode>,
}

fn default_separator() -> String {
    crate::core::DEFAULT_PATH_SEPARATOR.to_string()
}

/// Source location; `file` indexes the document's `files`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<usize>,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub token: u32,
}

/// Covergroup options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CvgNode {
    pub at_least: i64,
    #[serde(default)]
    pub per_instance: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Toggle details
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_name: Option<String>,
    pub metric: String,
    #[serde(rename = "type")]
    pub toggle_type: String,
    pub dir: String,
}

/// One scope and everything beneath it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub scope_type: String,
    #[serde(default = "one", skip_serializing_if = "is_one")]
    pub weight: u32,
    #[serde(default = "default_goal", skip_serializing_if = "is_default_goal")]
    pub goal: i64,
    #[serde(default = "default_language", skip_serializing_if = "is_no_language")]
    pub language: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub flags: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub du_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvg: Option<CvgNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub crossed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toggle: Option<ToggleNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<ItemNode>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ScopeNode>,
}

/// One cover item; absent numeric fields take the defaults of its type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemNode {
    pub name: String,
    #[serde(rename = "type")]
    pub cover_type: String,
    pub count: u64,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub flags: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub bitlen: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceNode>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}
