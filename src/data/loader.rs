// ============================================================
// Layer 4 — CSV Example Loader
// ============================================================
// Loads (article, summary) pairs from a CSV file using the
// `csv` crate.
//
// The news_summary.csv dataset this was built for has the
// reference summary in a column called `text` and the full
// article in `ctext`, and is Latin-1 encoded. Both column
// names and the encoding are configurable.
//
// Steps:
//   1. Read the header row and locate the two columns by name
//   2. Rename them to text / summary (SummaryExample fields)
//   3. Drop any row where either value is missing or blank
//
// Records are read as raw bytes so a Latin-1 file never trips
// the csv crate's UTF-8 validation.

use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::PathBuf};

use crate::domain::example::SummaryExample;
use crate::domain::traits::ExampleSource;

/// Character encoding of the CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextEncoding {
    /// ISO-8859-1: every byte is the code point of the same value
    Latin1,
    /// UTF-8; invalid sequences become U+FFFD
    Utf8,
}

impl TextEncoding {
    pub fn decode(&self, bytes: &[u8]) -> String {
        match self {
            TextEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            TextEncoding::Utf8   => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Loads examples from two named columns of a CSV file.
/// Implements the ExampleSource trait from Layer 3.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    path:           PathBuf,
    text_column:    String,
    summary_column: String,
    encoding:       TextEncoding,
}

impl CsvLoader {
    /// Create a loader with the news_summary.csv defaults:
    /// article in `ctext`, summary in `text`, Latin-1 encoded.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:           path.into(),
            text_column:    "ctext".to_string(),
            summary_column: "text".to_string(),
            encoding:       TextEncoding::Latin1,
        }
    }

    /// Override which CSV columns hold the article and the summary
    pub fn with_columns(
        mut self,
        text_column:    impl Into<String>,
        summary_column: impl Into<String>,
    ) -> Self {
        self.text_column    = text_column.into();
        self.summary_column = summary_column.into();
        self
    }

    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    fn column_index(&self, headers: &[String], name: &str) -> Result<usize> {
        match headers.iter().position(|h| h == name) {
            Some(idx) => Ok(idx),
            None => bail!(
                "Column '{}' not found in '{}' (available: {})",
                name,
                self.path.display(),
                headers.join(", ")
            ),
        }
    }
}

impl ExampleSource for CsvLoader {
    fn load_all(&self) -> Result<Vec<SummaryExample>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open CSV file '{}'", self.path.display()))?;

        // flexible(true): short rows are treated as missing values, not errors
        let mut reader = ReaderBuilder::new()
            .flexible(true)
            .from_reader(BufReader::new(file));

        let headers: Vec<String> = reader
            .byte_headers()
            .with_context(|| format!("Cannot read CSV header of '{}'", self.path.display()))?
            .iter()
            .map(|h| self.encoding.decode(h).trim().to_string())
            .collect();

        let text_idx    = self.column_index(&headers, &self.text_column)?;
        let summary_idx = self.column_index(&headers, &self.summary_column)?;

        let mut examples = Vec::new();
        let mut dropped  = 0usize;

        for (row, record) in reader.byte_records().enumerate() {
            // +2: one for the header, one for 1-based line numbers
            let record = record.with_context(|| {
                format!("Malformed record on line {} of '{}'", row + 2, self.path.display())
            })?;

            let text    = record.get(text_idx).map(|b| self.encoding.decode(b));
            let summary = record.get(summary_idx).map(|b| self.encoding.decode(b));

            match (present(text), present(summary)) {
                (Some(text), Some(summary)) => examples.push(SummaryExample { text, summary }),
                _ => dropped += 1,
            }
        }

        tracing::info!(
            "Loaded {} examples from '{}' ({} rows dropped for missing values)",
            examples.len(),
            self.path.display(),
            dropped
        );
        Ok(examples)
    }
}

/// A field counts as missing when absent or blank.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
