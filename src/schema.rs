//! Column schema generation for logger dumps.
//!
//! A logger writes one fixed-width block of columns per node in its range.
//! The header row it emits is not reliable across firmware revisions, so the
//! column names are regenerated from the node range and used both to name the
//! columns on ingest and to find each node's block afterwards.

use crate::constants::{VALUE_SLOTS_PER_NODE, columns};
use crate::error::Result;
use crate::models::NodeRange;

/// Zero-padded node label used as the column prefix, e.g. `0007`
pub fn node_label(node_id: u32) -> String {
    format!("{:04}", node_id)
}

/// Build the ordered column names expected for `start_id..=end_id`.
///
/// Fails with `InvalidRange` unless `1 <= start_id <= end_id <= 9999`.
pub fn generate_columns(start_id: u32, end_id: u32) -> Result<Vec<String>> {
    let range = NodeRange::new(start_id, end_id)?;
    Ok(columns_for_range(&range))
}

/// Column names for an already validated range
pub fn columns_for_range(range: &NodeRange) -> Vec<String> {
    let mut result = Vec::with_capacity(1 + range.len() * crate::constants::COLUMNS_PER_NODE);
    result.push(columns::TIME.to_string());

    for node_id in range.ids() {
        let block = NodeColumns::for_node(node_id);
        result.push(block.node_id);
        result.push(block.signal_strength);
        result.push(block.sensor_type);
        for ((value, scale), unit) in block
            .values
            .into_iter()
            .zip(block.scales)
            .zip(block.units)
        {
            result.push(value);
            result.push(scale);
            result.push(unit);
        }
    }

    result
}

/// Append physical header names beyond the generated schema.
///
/// Newer logger firmware occasionally adds trailing columns; they are kept
/// under their original names so nothing is truncated.
pub fn extend_for_drift(schema: &mut Vec<String>, physical_header: &[String]) {
    if physical_header.len() > schema.len() {
        schema.extend(physical_header[schema.len()..].iter().cloned());
    }
}

/// Names of the columns that make up one node block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeColumns {
    pub node_id: String,
    pub signal_strength: String,
    pub sensor_type: String,
    pub values: Vec<String>,
    pub scales: Vec<String>,
    pub units: Vec<String>,
}

impl NodeColumns {
    pub fn for_node(node_id: u32) -> Self {
        let prefix = node_label(node_id);
        let slot = |kind: &str, i: usize| format!("{}:{}{}", prefix, kind, i);

        Self {
            node_id: format!("{}:{}", prefix, columns::NODE_ID),
            signal_strength: format!("{}:{}", prefix, columns::SIGNAL_STRENGTH),
            sensor_type: format!("{}:{}", prefix, columns::SENSOR_TYPE),
            values: (1..=VALUE_SLOTS_PER_NODE)
                .map(|i| slot(columns::VALUE, i))
                .collect(),
            scales: (1..=VALUE_SLOTS_PER_NODE)
                .map(|i| slot(columns::SCALE, i))
                .collect(),
            units: (1..=VALUE_SLOTS_PER_NODE)
                .map(|i| slot(columns::UNIT, i))
                .collect(),
        }
    }
}
