use crate::ast::{Node, NodeId, Payload, Tree};
use crate::builder::{BuildStats, TreeBuilder};
use crate::dump::dump_struct;
use crate::error::{ConvertError, Result};
use crate::producer::{PerlProducer, Producer};
use crate::types::{Conversion, PHP_OPEN_TAG};
use serde::Deserialize;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub quiet: bool,
    /// Where to write the structure dump before generation starts.
    pub debug_dump: Option<PathBuf>,
    /// Limit on reading the producer's output, in seconds.
    pub timeout_secs: Option<u64>,
    pub perl: PathBuf,
    pub include_dirs: Vec<PathBuf>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            quiet: false,
            debug_dump: None,
            timeout_secs: Some(60),
            perl: PathBuf::from("perl"),
            include_dirs: Vec::new(),
        }
    }
}

impl ConvertOptions {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn producer(&self) -> PerlProducer {
        PerlProducer {
            perl: self.perl.clone(),
            include_dirs: self.include_dirs.clone(),
            timeout: self.timeout(),
        }
    }
}

/// Per-kind translation rules, called by [`Converter::convert`].
///
/// `analyze_context` runs over the whole tree (pre-order) before any
/// `generate` call, so generation may read context set on any node.
/// `generate` runs once per node in dump order.
pub trait Translator {
    fn analyze_context(&mut self, tree: &mut Tree, id: NodeId) -> Result<()>;

    fn generate(&mut self, tree: &mut Tree, id: NodeId) -> Result<()>;

    /// Text this node contributes ahead of its children.
    fn assembled_content<'t>(&self, tree: &'t Tree, id: NodeId) -> Cow<'t, str> {
        Cow::Borrowed(tree.get(id).output.as_deref().unwrap_or(""))
    }

    /// Text this node contributes after its children.
    fn closing_content<'t>(&self, tree: &'t Tree, id: NodeId) -> Cow<'t, str> {
        Cow::Borrowed(tree.get(id).closing.as_deref().unwrap_or(""))
    }
}

/// Writes every token back out unchanged, so the result is the original
/// Perl text behind the open tag.
#[derive(Debug, Default, Clone)]
pub struct SourceEcho;

impl Translator for SourceEcho {
    fn analyze_context(&mut self, tree: &mut Tree, id: NodeId) -> Result<()> {
        let path = match tree.parent(id) {
            None => "0".to_string(),
            Some(p) => {
                let index = tree.children(p).iter().position(|&c| c == id).unwrap_or(0);
                let parent_path = tree.get(p).context.get("path").cloned().unwrap_or_default();
                format!("{}.{}", parent_path, index)
            }
        };
        tree.get_mut(id).context.insert("path".to_string(), path);
        Ok(())
    }

    fn generate(&mut self, tree: &mut Tree, id: NodeId) -> Result<()> {
        let node = tree.get_mut(id);
        match &node.payload {
            Payload::Empty => {}
            Payload::Text { content } => node.output = Some(content.clone()),
            Payload::Delimiters { start, end } => {
                node.output = Some(start.to_string());
                node.closing = Some(end.to_string());
            }
        }
        Ok(())
    }
}

pub struct Converter<T: Translator = SourceEcho> {
    options: ConvertOptions,
    translator: T,
    tree: Option<Tree>,
    stats: BuildStats,
}

impl Converter<SourceEcho> {
    pub fn new() -> Self {
        Self::with_translator(SourceEcho)
    }
}

impl Default for Converter<SourceEcho> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Translator> Converter<T> {
    pub fn with_translator(translator: T) -> Self {
        Self::with_options(translator, ConvertOptions::default())
    }

    pub fn with_options(translator: T, options: ConvertOptions) -> Self {
        Self {
            options,
            translator,
            tree: None,
            stats: BuildStats::default(),
        }
    }

    pub fn set_quiet(&mut self, quiet: bool) {
        self.options.quiet = quiet;
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    pub fn translator(&self) -> &T {
        &self.translator
    }

    /// Dumps `source` with the configured perl and rebuilds its tree.
    pub fn read_file(&mut self, source: &Path) -> Result<()> {
        let producer = self.options.producer();
        self.read_from(&producer, source)
    }

    pub fn read_from<P: Producer + ?Sized>(&mut self, producer: &P, source: &Path) -> Result<()> {
        self.read_results(producer.produce(source)?)
    }

    pub fn read_lines<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.read_results(lines.into_iter().map(Ok))
    }

    fn read_results<I, S>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = Result<S>>,
        S: AsRef<str>,
    {
        let mut builder = TreeBuilder::new();
        for line in lines {
            builder.push_line(line?.as_ref())?;
        }
        let (tree, stats) = builder.finish()?;
        if !self.options.quiet {
            info!("{} lines read", stats.lines_read);
        }
        if stats.lines_skipped > 0 {
            debug!(skipped = stats.lines_skipped, "dump lines skipped");
        }
        self.tree = Some(tree);
        self.stats = stats;
        Ok(())
    }

    /// Runs analysis, generation and assembly over the tree last read.
    pub fn convert(&mut self) -> Result<Conversion> {
        let tree = self.tree.as_mut().ok_or(ConvertError::NoDocument)?;
        let root = tree.root().ok_or(ConvertError::NoDocument)?;

        if !self.options.quiet {
            info!("Phase 1: Analyze lexical structure");
        }
        let tree_order: Vec<NodeId> = tree.iter_tree().map(Node::handle).collect();
        for id in tree_order {
            self.translator.analyze_context(tree, id)?;
        }

        if let Some(path) = &self.options.debug_dump {
            fs::write(path, dump_struct(tree)?)?;
            debug!(path = %path.display(), "structure dump written");
        }

        if !self.options.quiet {
            info!("Phase 2: Calling all converters");
        }
        let flat_order: Vec<NodeId> = tree.iter_flat().map(Node::handle).collect();
        for id in flat_order {
            self.translator.generate(tree, id)?;
        }

        if !self.options.quiet {
            info!("Phase 3: Writing source");
        }
        let mut output = String::from(PHP_OPEN_TAG);
        assemble(&self.translator, tree, root, &mut output);

        Ok(Conversion {
            output,
            stats: self.stats,
        })
    }
}

fn assemble<T: Translator>(translator: &T, tree: &Tree, id: NodeId, out: &mut String) {
    out.push_str(&translator.assembled_content(tree, id));
    for &child in tree.children(id) {
        assemble(translator, tree, child, out);
    }
    out.push_str(&translator.closing_content(tree, id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::StaticProducer;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    const FOO: &[&str] = &[
        "PPI::Document",
        "  PPI::Statement",
        "    PPI::Token::Word 'foo'",
    ];

    #[test]
    fn three_record_document_assembles_to_token() {
        let mut conv = Converter::new();
        conv.read_lines(FOO).unwrap();
        let out = conv.convert().unwrap();
        assert_eq!(out.output, "<?php\nfoo");
        assert_eq!(out.stats.nodes, 3);
    }

    #[test]
    fn structures_wrap_their_children() {
        let mut conv = Converter::new();
        conv.read_lines([
            "PPI::Document",
            "  PPI::Statement",
            "    PPI::Token::Word 'f'",
            "    PPI::Structure::List ( ... )",
            "      PPI::Statement::Expression",
            "        PPI::Token::Number '1'",
            "        PPI::Token::Operator ','",
            "        PPI::Token::Number '2'",
            "    PPI::Token::Structure ';'",
        ])
        .unwrap();
        assert_eq!(conv.convert().unwrap().output, "<?php\nf(1,2);");
    }

    #[test]
    fn convert_without_input_fails() {
        let mut conv = Converter::new();
        assert!(matches!(conv.convert().unwrap_err(), ConvertError::NoDocument));
    }

    #[test]
    fn reads_through_producer() {
        let producer = StaticProducer::new(FOO.iter().copied());
        let mut conv = Converter::new();
        conv.set_quiet(true);
        conv.read_from(&producer, Path::new("foo.pl")).unwrap();
        assert_eq!(conv.tree().unwrap().len(), 3);
        assert_eq!(conv.convert().unwrap().output, "<?php\nfoo");
    }

    #[test]
    fn echo_records_tree_paths() {
        let mut conv = Converter::new();
        conv.read_lines([
            "PPI::Document",
            "  PPI::Statement",
            "    PPI::Token::Word 'a'",
            "    PPI::Token::Word 'b'",
            "  PPI::Statement",
        ])
        .unwrap();
        conv.convert().unwrap();
        let paths: Vec<&str> = conv
            .tree()
            .unwrap()
            .iter_flat()
            .map(|n| n.context["path"].as_str())
            .collect();
        assert_eq!(paths, ["0", "0.0", "0.0.0", "0.0.1", "0.1"]);
    }

    /// Records call order and checks phase 1 finished before phase 2.
    #[derive(Default)]
    struct Recorder {
        analyzed: Vec<usize>,
        generated: Vec<usize>,
    }

    impl Translator for Recorder {
        fn analyze_context(&mut self, tree: &mut Tree, id: NodeId) -> Result<()> {
            assert!(self.generated.is_empty());
            let node = tree.get_mut(id);
            self.analyzed.push(node.id);
            node.context.insert("seen".into(), node.id.to_string());
            Ok(())
        }

        fn generate(&mut self, tree: &mut Tree, id: NodeId) -> Result<()> {
            // every node, including later ones, already carries context
            assert!(tree.iter_flat().all(|n| n.context.contains_key("seen")));
            let node = tree.get_mut(id);
            self.generated.push(node.id);
            node.output = Some(format!("[{}]", node.id));
            Ok(())
        }
    }

    #[test]
    fn phases_follow_tree_then_flat_order() {
        let mut conv = Converter::with_translator(Recorder::default());
        conv.read_lines([
            "PPI::Document",
            "  PPI::Statement",
            "    PPI::Token::Word 'a'",
            "  PPI::Token::Whitespace ' '",
        ])
        .unwrap();
        let out = conv.convert().unwrap();
        assert_eq!(conv.translator().analyzed, [1, 2, 3, 4]);
        assert_eq!(conv.translator().generated, [1, 2, 3, 4]);
        assert_eq!(out.output, "<?php\n[1][2][3][4]");
    }

    #[test]
    fn debug_dump_written_before_generation() {
        struct FailGenerate;
        impl Translator for FailGenerate {
            fn analyze_context(&mut self, _: &mut Tree, _: NodeId) -> Result<()> {
                Ok(())
            }
            fn generate(&mut self, _: &mut Tree, _: NodeId) -> Result<()> {
                Err(ConvertError::NoDocument)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("struct.txt");
        let options = ConvertOptions {
            quiet: true,
            debug_dump: Some(path.clone()),
            ..Default::default()
        };
        let mut conv = Converter::with_options(FailGenerate, options);
        conv.read_lines(FOO).unwrap();
        assert!(conv.convert().is_err());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "1 PpiDocument\n2   PpiStatement\n3     PpiTokenWord 'foo'\n"
        );
    }

    /// Runs a conversion of `FOO` and returns what was logged at info level.
    fn captured_log(quiet: bool) -> (String, String) {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || SharedBuf(sink.clone()))
            .with_ansi(false)
            .with_max_level(tracing::Level::INFO)
            .finish();

        let output = tracing::subscriber::with_default(subscriber, || {
            let mut conv = Converter::new();
            conv.set_quiet(quiet);
            assert_eq!(conv.options().quiet, quiet);
            conv.read_lines(FOO).unwrap();
            conv.convert().unwrap().output
        });
        let log = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        (output, log)
    }

    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for SharedBuf {
        fn write(&mut self, bytes: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn progress_messages_are_logged() {
        let (_, log) = captured_log(false);
        for msg in [
            "3 lines read",
            "Phase 1: Analyze lexical structure",
            "Phase 2: Calling all converters",
            "Phase 3: Writing source",
        ] {
            assert!(log.contains(msg), "missing {:?} in {:?}", msg, log);
        }
    }

    #[test]
    fn quiet_suppresses_progress_only() {
        let (loud, _) = captured_log(false);
        let (quiet, log) = captured_log(true);
        assert_eq!(loud, quiet);
        assert!(!log.contains("lines read"), "{:?}", log);
        assert!(!log.contains("Phase"), "{:?}", log);
    }

    #[test]
    fn sub_signature_is_echoed() {
        let mut conv = Converter::new();
        conv.set_quiet(true);
        conv.read_lines([
            "PPI::Document",
            "  PPI::Statement::Sub",
            "    PPI::Token::Word 'sub'",
            "    PPI::Token::Whitespace ' '",
            "    PPI::Token::Word 'f'",
            "    PPI::Token::Whitespace ' '",
            "    PPI::Structure::Signature ( ... )",
            "      PPI::Statement::Expression",
            "        PPI::Token::Symbol '$x'",
            "    PPI::Token::Whitespace ' '",
            "    PPI::Structure::Block { ... }",
        ])
        .unwrap();
        assert_eq!(conv.convert().unwrap().output, "<?php\nsub f ($x) {}");
    }

    #[test]
    fn options_from_json() {
        let opts = ConvertOptions::from_json(
            r#"{"quiet": true, "timeout_secs": null, "include_dirs": ["lib"]}"#,
        )
        .unwrap();
        assert!(opts.quiet);
        assert_eq!(opts.timeout(), None);
        assert_eq!(opts.perl, PathBuf::from("perl"));
        assert_eq!(opts.producer().include_dirs, [PathBuf::from("lib")]);

        let opts = ConvertOptions::from_json("{}").unwrap();
        assert_eq!(opts.timeout(), Some(Duration::from_secs(60)));

        assert!(matches!(
            ConvertOptions::from_json("{\"quiet\": 3}").unwrap_err(),
            ConvertError::Json(_)
        ));
    }
}
