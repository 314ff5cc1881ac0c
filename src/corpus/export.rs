//! Corpus export for external machine-learning tools.
//!
//! The document vectors are written in term space, ignoring any active LSA
//! concept space, so the output matches what other tools expect.

use std::fs;
use std::io::Write;
use std::path::Path;

use super::Corpus;
use crate::error::Result;

const BOM_UTF8: &[u8] = b"\xef\xbb\xbf";

/// Supported tabular formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Orange tab-separated format with `m#name` and `c#type` meta columns.
    Orange,
    /// Weka ARFF with one numeric attribute per term and a class attribute.
    Weka,
}

impl Corpus {
    /// Writes the corpus as a BOM-prefixed text file in the given format.
    /// Feature columns are sorted by term; weights are written with four
    /// decimals, zero as a bare `0`.
    pub fn export(
        &self,
        path: impl AsRef<Path>,
        format: ExportFormat,
        relation: &str,
    ) -> Result<()> {
        let mut keys = self.features();
        keys.sort_unstable();
        let mut lines = Vec::new();
        match format {
            ExportFormat::Orange => {
                let mut header: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
                header.push("m#name");
                header.push("c#type");
                lines.push(header.join("\t"));
                for document in self.iter() {
                    let v = self.document_vector(document);
                    let mut row: Vec<String> =
                        keys.iter().map(|k| cell(v.get(k, 0.0))).collect();
                    row.push(document.name().unwrap_or("").to_owned());
                    row.push(document.label().unwrap_or("").to_owned());
                    lines.push(row.join("\t"));
                }
            }
            ExportFormat::Weka => {
                lines.push(format!("@RELATION {relation}"));
                for k in &keys {
                    lines.push(format!("@ATTRIBUTE {k} NUMERIC"));
                }
                let mut labels: Vec<&str> =
                    self.iter().filter_map(|d| d.label()).collect();
                labels.sort_unstable();
                labels.dedup();
                lines.push(format!("@ATTRIBUTE class {{{}}}", labels.join(",")));
                lines.push("@DATA".to_owned());
                for document in self.iter() {
                    let v = self.document_vector(document);
                    let mut row: Vec<String> =
                        keys.iter().map(|k| cell(v.get(k, 0.0))).collect();
                    row.push(document.label().unwrap_or("").to_owned());
                    lines.push(row.join(","));
                }
            }
        }
        let mut file = fs::File::create(path)?;
        file.write_all(BOM_UTF8)?;
        file.write_all(lines.join("\n").as_bytes())?;
        Ok(())
    }
}

fn cell(weight: f64) -> String {
    if weight == 0.0 {
        "0".to_owned()
    } else {
        format!("{weight:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::tokenize::TokenizeOptions;
    use crate::vector::Weight;

    fn corpus() -> Corpus {
        let opts = TokenizeOptions::default();
        Corpus::from_documents(
            vec![
                Document::from_text("cat purrs", &opts)
                    .with_name("cat")
                    .with_label("pet"),
                Document::from_text("cow chews", &opts)
                    .with_name("cow")
                    .with_label("livestock"),
            ],
            Weight::TfIdf,
        )
    }

    #[test]
    fn orange_export_has_meta_columns_and_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farm.tab");
        corpus().export(&path, ExportFormat::Orange, "farm").unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..3], BOM_UTF8);
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.ends_with("m#name\tc#type"));
        assert_eq!(text.lines().count(), 3);
        assert!(text.lines().nth(1).unwrap().ends_with("cat\tpet"));
    }

    #[test]
    fn weka_export_declares_attributes_and_classes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("farm.arff");
        corpus().export(&path, ExportFormat::Weka, "farm").unwrap();
        let bytes = std::fs::read(&path).unwrap();
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        assert!(text.starts_with("@RELATION farm"));
        assert!(text.contains("@ATTRIBUTE cat NUMERIC"));
        assert!(text.contains("@ATTRIBUTE class {livestock,pet}"));
        let data: Vec<&str> = text.lines().skip_while(|l| *l != "@DATA").skip(1).collect();
        assert_eq!(data.len(), 2);
        assert!(data[0].ends_with(",pet"));
    }

    #[test]
    fn zero_weights_are_written_bare() {
        assert_eq!(cell(0.0), "0");
        assert_eq!(cell(0.25), "0.2500");
    }
}
