//! Identifier and year extraction from filenames.
//!
//! Test workbooks are named loosely (`LF 053-18.xlsx`, `LF053_2021 rev.xlsx`,
//! `056-23 final.xls`). The extractor pulls candidate `(identifier, year)`
//! pairs out of a file stem with three strategies tried in priority order:
//!
//! 1. the marker token (default `LF`) followed by digits and an optional
//!    separated year
//! 2. a generic `digits [sep] year` pattern anywhere in the stem
//! 3. every 1-4 digit group, with no year
//!
//! A later strategy only runs when the earlier ones found nothing.

use crate::error::{Result, ScoutError};
use regex::Regex;
use std::path::Path;

/// Two-digit years at or above this fall in the 1900s.
const YEAR_PIVOT: u32 = 97;

/// One `(identifier, year)` pair pulled from a filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdCandidate {
    /// Normalized identifier, three digits or more
    pub id: String,

    /// Four-digit year, if the filename carried one
    pub year: Option<String>,
}

/// Compiled extraction patterns for one marker token.
#[derive(Debug, Clone)]
pub struct IdentifierExtractor {
    marker: String,
    marker_re: Regex,
    generic_re: Regex,
    digits_re: Regex,
}

impl IdentifierExtractor {
    pub fn new(marker: &str) -> Result<Self> {
        let marker = marker.trim();
        if marker.is_empty() {
            return Err(ScoutError::ConfigError {
                reason: "identifier marker must not be empty".to_string(),
            });
        }

        let marker_re = compile(&format!(
            r"(?i){}\D*(\d{{1,4}})(?:\D+[/-]?(\d{{2,4}}))?",
            regex::escape(marker)
        ))?;

        Ok(IdentifierExtractor {
            marker: marker.to_uppercase(),
            marker_re,
            generic_re: compile(r"(\d{1,4})[\s_\-]*/?[\s_\-]?(\d{2,4})")?,
            digits_re: compile(r"\d{1,4}")?,
        })
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Candidate pairs for a filename (the extension is ignored).
    pub fn extract(&self, file_name: &str) -> Vec<IdCandidate> {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        if let Some(caps) = self.marker_re.captures(&stem) {
            return vec![IdCandidate {
                id: normalize_id(&caps[1]),
                year: caps.get(2).and_then(|m| normalize_year(m.as_str())),
            }];
        }

        if let Some(caps) = self.generic_re.captures(&stem) {
            return vec![IdCandidate {
                id: normalize_id(&caps[1]),
                year: normalize_year(&caps[2]),
            }];
        }

        self.digits_re
            .find_iter(&stem)
            .map(|m| IdCandidate {
                id: normalize_id(m.as_str()),
                year: None,
            })
            .collect()
    }

    /// Whether `file_name` spells the normalized identifier right after the
    /// marker token, as a whole word (`LF 053`, `LF_053`, `lf053`).
    pub fn names_identifier(&self, file_name: &str, normalized_id: &str) -> bool {
        let pattern = format!(
            r"\b{}\D*{}\b",
            regex::escape(&self.marker),
            regex::escape(normalized_id)
        );
        match Regex::new(&pattern) {
            Ok(re) => re.is_match(&file_name.to_uppercase()),
            Err(_) => false,
        }
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| ScoutError::ConfigError {
        reason: format!("invalid identifier pattern: {}", e),
    })
}

/// Canonical identifier: integer value zero-padded to three digits.
///
/// Falls back to the digits of the input when it is not a plain integer, and
/// to the input itself when it has no digits at all.
pub fn normalize_id(raw: &str) -> String {
    if let Ok(value) = raw.trim().parse::<u64>() {
        return format!("{:03}", value);
    }
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        raw.to_string()
    } else {
        format!("{:0>3}", digits)
    }
}

/// Four-digit year from a year token. Two-digit years pivot at 97.
pub fn normalize_year(raw: &str) -> Option<String> {
    let value = raw.trim().parse::<u32>().ok()?;
    if value < 100 {
        let century = if value >= YEAR_PIVOT { 19 } else { 20 };
        Some(format!("{}{:02}", century, value))
    } else {
        Some(value.to_string())
    }
}
