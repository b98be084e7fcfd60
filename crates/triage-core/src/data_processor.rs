//! Flat-file loaders for the two seed corpora.
//!
//! Feedback file: a header line, then one `Feedback #N: <text>` entry per line.
//! Bug file: reports separated by five consecutive newlines, each report
//! starting with a title/separator line that is dropped.

use regex::Regex;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::Category;

/// One text entry ready to be embedded, with the subset it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    pub content: String,
    pub category: Category,
}

const BUG_SEPARATOR: &str = "\n\n\n\n\n";

pub struct DataProcessor {
    feedback_prefix: Regex,
}

impl DataProcessor {
    pub fn new() -> Result<Self> {
        let feedback_prefix = Regex::new(r"^Feedback #\d+: ")
            .map_err(|e| Error::InvalidConfig(format!("feedback prefix pattern: {e}")))?;
        Ok(Self { feedback_prefix })
    }

    pub fn load_feedbacks(&self, path: &Path) -> Result<Vec<SourceRecord>> {
        let content = self.read_file_content(path)?;
        let records = self.parse_feedbacks(&content);
        tracing::info!(path = %path.display(), count = records.len(), "loaded feedback entries");
        Ok(records)
    }

    pub fn load_bug_reports(&self, path: &Path) -> Result<Vec<SourceRecord>> {
        let content = self.read_file_content(path)?;
        let records = self.parse_bug_reports(&content);
        tracing::info!(path = %path.display(), count = records.len(), "loaded bug reports");
        Ok(records)
    }

    /// Feedbacks first, then bugs; this is the ingestion order.
    pub fn load_all(&self, feedback_file: &Path, bug_file: &Path) -> Result<Vec<SourceRecord>> {
        let mut records = self.load_feedbacks(feedback_file)?;
        records.extend(self.load_bug_reports(bug_file)?);
        Ok(records)
    }

    pub fn parse_feedbacks(&self, content: &str) -> Vec<SourceRecord> {
        content
            .lines()
            .skip(1)
            .map(|line| self.feedback_prefix.replace(line, "").trim().to_string())
            .filter(|line| !line.is_empty())
            .map(|content| SourceRecord { content, category: Category::Feedbacks })
            .collect()
    }

    pub fn parse_bug_reports(&self, content: &str) -> Vec<SourceRecord> {
        let normalized = content.replace("\r\n", "\n");
        normalized
            .split(BUG_SEPARATOR)
            .map(|block| block.split('\n').skip(1).collect::<Vec<_>>().join("\n"))
            .map(|body| body.trim().to_string())
            .filter(|body| !body.is_empty())
            .map(|content| SourceRecord { content, category: Category::Bugs })
            .collect()
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }
}
