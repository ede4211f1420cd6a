//! Lightweight structural parser for STEP Part 21 files.
//!
//! Validates the container markers and takes a census of entity types in
//! the data section. No geometry is evaluated.

pub mod entities;
pub mod scanner;

use std::collections::BTreeMap;

use memchr::memmem;
use tracing::debug;

use crate::detect::sniff::{STEP_CLOSE_MARKER, STEP_OPEN_MARKER, find_open_marker};
use crate::models::{StepErrorCode, StepParseResult};

const HEADER_KEYWORD: &[u8] = b"HEADER;";
const DATA_KEYWORD: &[u8] = b"DATA;";

/// Stateless STEP structure validator. Safe to share across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepStructuralParser;

impl StepStructuralParser {
    /// Create a parser.
    pub fn new() -> Self {
        Self
    }

    /// Validate `bytes` and summarize the entity types they declare.
    pub fn parse(&self, bytes: &[u8]) -> StepParseResult {
        let data = match data_section(bytes) {
            Ok(data) => data,
            Err(message) => {
                debug!(reason = message, "STEP header validation failed");
                return StepParseResult::failure(StepErrorCode::InvalidStepHeader, message);
            }
        };

        let mut entity_count = 0usize;
        let mut distinct: BTreeMap<String, usize> = BTreeMap::new();
        for statement in scanner::statements(data) {
            let Some(types) = scanner::instance_types(&statement) else {
                continue;
            };
            entity_count += 1;
            for name in types {
                *distinct.entry(name).or_default() += 1;
            }
        }

        let solid_count: usize = distinct
            .iter()
            .filter(|(name, _)| entities::is_solid(name))
            .map(|(_, count)| count)
            .sum();
        let surface_count: usize = distinct
            .iter()
            .filter(|(name, _)| entities::is_surface(name))
            .map(|(_, count)| count)
            .sum();

        debug!(
            entities = entity_count,
            types = distinct.len(),
            solids = solid_count,
            surfaces = surface_count,
            "STEP census complete"
        );

        StepParseResult::from_census(entity_count, distinct, solid_count, surface_count)
    }
}

/// The bytes between `DATA;` and the closing marker, or why they could not be found.
fn data_section(bytes: &[u8]) -> Result<&[u8], &'static str> {
    let open = find_open_marker(bytes).ok_or("ISO-10303-21 header marker was not found.")?;
    let after_open = open + STEP_OPEN_MARKER.len();

    let header = memmem::find(&bytes[after_open..], HEADER_KEYWORD)
        .map(|i| after_open + i + HEADER_KEYWORD.len())
        .ok_or("HEADER section was not found after the ISO-10303-21 marker.")?;

    let data_start = memmem::find(&bytes[header..], DATA_KEYWORD)
        .map(|i| header + i + DATA_KEYWORD.len())
        .ok_or("DATA section was not found after the HEADER section.")?;

    let close = memmem::rfind(&bytes[data_start..], STEP_CLOSE_MARKER)
        .map(|i| data_start + i)
        .ok_or("END-ISO-10303-21 terminator was not found after the DATA section.")?;

    Ok(&bytes[data_start..close])
}
