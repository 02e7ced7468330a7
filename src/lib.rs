pub mod ast;
pub mod builder;
pub mod compiler;
pub mod dump;
pub mod error;
pub mod kind;
pub mod parser;
pub mod producer;
pub mod types;

pub use ast::{Node, NodeId, Payload, Tree};
pub use builder::{build_tree, BuildStats, TreeBuilder};
pub use compiler::{ConvertOptions, Converter, SourceEcho, Translator};
pub use dump::{dump_json, dump_struct};
pub use error::{ConvertError, Result};
pub use kind::{resolve_kind, ContentRule, NodeKind};
pub use producer::{PerlProducer, Producer, StaticProducer};
pub use types::{Conversion, PHP_OPEN_TAG};

use std::path::Path;

/// Converts a Perl file, running the PPI dumper on it.
pub fn convert_file(source: &Path, options: ConvertOptions) -> Result<Conversion> {
    let mut converter = Converter::with_options(SourceEcho, options);
    converter.read_file(source)?;
    converter.convert()
}

/// Converts an already captured dump.
pub fn convert_dump(text: &str, options: ConvertOptions) -> Result<Conversion> {
    let mut converter = Converter::with_options(SourceEcho, options);
    converter.read_lines(text.lines())?;
    converter.convert()
}
