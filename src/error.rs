use std::path::PathBuf;
use thiserror::Error;

/// A single source file could not contribute structure to the graph.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path}: parser returned no tree")]
    NoTree { path: String },
    #[error("parse {path}: syntax error at line {line}, column {column}")]
    Syntax {
        path: String,
        line: usize,
        column: usize,
    },
}

/// The overlay snapshot could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("overlay io {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("overlay {} is malformed: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures a caller of the session can see.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a project root path is required")]
    EmptyRoot,
    #[error("project root {} is not accessible: {source}", root.display())]
    RootInaccessible {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("project root {} is not a directory", root.display())]
    NotADirectory { root: PathBuf },
    #[error("no project is mounted; pass a root path")]
    NotMounted,
}
