use crate::cli::SchemaDocument;
use anyhow::Result;
use ingress_core::resources::Manifest;
use ingress_core::settings::Settings;
use schemars::{Schema, schema_for};

pub fn document_schema(document: SchemaDocument) -> Schema {
    match document {
        SchemaDocument::Manifest => schema_for!(Manifest),
        SchemaDocument::Settings => schema_for!(Settings),
    }
}

pub fn handle_schema_command(document: SchemaDocument) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&document_schema(document))?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SchemaDocument::Manifest, "VirtualServer")]
    #[case(SchemaDocument::Settings, "zoneSync")]
    fn test_document_schema_mentions(#[case] document: SchemaDocument, #[case] needle: &str) {
        let schema = serde_json::to_string(&document_schema(document)).unwrap_or_default();
        assert!(schema.contains(needle), "{needle} missing from schema");
    }
}
