use crate::error::ScanError;
use crate::model::{EdgeRecord, NodeRecord};

/// Declarations and relations found in one source file, excluding the file
/// node itself.
#[derive(Debug, Default)]
pub struct ExtractedFile {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

/// One parseable source language. The scanner drives exactly one dialect per
/// scan; adding a language means implementing this trait.
pub trait SourceDialect: Send {
    fn name(&self) -> &'static str;

    /// File extensions (without the dot) this dialect parses.
    fn extensions(&self) -> &'static [&'static str];

    /// Extracts declarations from `source`. `rel_path` is the file node id.
    fn extract(&mut self, rel_path: &str, source: &str) -> Result<ExtractedFile, ScanError>;

    fn handles(&self, extension: &str) -> bool {
        self.extensions().iter().any(|candidate| *candidate == extension)
    }
}
