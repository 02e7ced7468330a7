use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Fatal conditions. Any of these aborts the whole conversion; a tree that
/// failed one of the structural checks is never handed to later phases.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("invalid structure content for node {id}: {content:?} (expected 7 characters)")]
    StructureContent { id: usize, content: String },

    #[error("unknown node kind: {name}")]
    UnknownKind { name: String },

    #[error("node {id} jumps from level {from} to level {to}")]
    LevelJump { id: usize, from: usize, to: usize },

    #[error("first record must be a level 0 document, got {kind} at level {level}")]
    BadRoot { kind: String, level: usize },

    #[error("node {id} is a second level 0 record")]
    MultipleRoots { id: usize },

    #[error("dump contained no records")]
    EmptyDump,

    #[error("bad parent: node {child} is listed under {expected} but points at {found:?}")]
    ParentMismatch {
        child: usize,
        expected: usize,
        found: Option<usize>,
    },

    #[error("no document has been read")]
    NoDocument,

    #[error("failed to start dump producer {program}: {source}")]
    ProducerSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dump producer did not finish within {secs}s")]
    ProducerTimeout { secs: u64 },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
