//! Print the node schema table and metadata registry as JSON.
//!
//! Usage: `generate-schemas [schemas|metadata]` (defaults to `schemas`).

use audio_bridge_core::metadata::registry;
use audio_bridge_core::schema::{node_schemas, NodeSchemaSummary};

fn main() {
    let which = std::env::args().nth(1).unwrap_or_else(|| "schemas".to_string());

    let json = match which.as_str() {
        "schemas" => {
            let summaries: Vec<NodeSchemaSummary> = node_schemas()
                .into_iter()
                .map(NodeSchemaSummary::from)
                .collect();
            serde_json::to_string_pretty(&summaries)
        }
        "metadata" => serde_json::to_string_pretty(&registry().descriptors()),
        other => {
            eprintln!("unknown table '{other}', expected 'schemas' or 'metadata'");
            std::process::exit(2);
        }
    };

    match json {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("failed to serialize: {err}");
            std::process::exit(1);
        }
    }
}
