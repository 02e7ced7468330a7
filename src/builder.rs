use crate::ast::{Node, NodeId, Tree};
use crate::error::{ConvertError, Result};
use crate::kind::resolve_kind;
use crate::parser::{decode_content, parse_record, RawRecord};
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub lines_read: usize,
    pub lines_skipped: usize,
    pub nodes: usize,
}

/// Rebuilds the tree from dump records fed in dump order.
///
/// Depth changes drive the parent cursor: one level deeper makes the
/// previous node the parent, shallower pops back up the stack.
#[derive(Debug)]
pub struct TreeBuilder {
    tree: Tree,
    last: Option<NodeId>,
    last_level: Option<usize>,
    parent_stack: Vec<NodeId>,
    current_parent: Option<NodeId>,
    line_num: usize,
    stats: BuildStats,
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self {
            tree: Tree::default(),
            last: None,
            last_level: None,
            parent_stack: Vec::new(),
            current_parent: None,
            line_num: 1,
            stats: BuildStats::default(),
        }
    }
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes and adds one dump line. Lines without a record shape are
    /// logged and skipped.
    pub fn push_line(&mut self, line: &str) -> Result<Option<NodeId>> {
        self.stats.lines_read += 1;
        match parse_record(line) {
            Some(record) => self.push_record(&record).map(Some),
            None => {
                self.stats.lines_skipped += 1;
                warn!(line_no = self.stats.lines_read, "BAD: {:?}", line);
                Ok(None)
            }
        }
    }

    pub fn push_record(&mut self, record: &RawRecord<'_>) -> Result<NodeId> {
        let kind = resolve_kind(record.kind)?;
        let id = self.tree.len() + 1;
        let level = record.level;

        match self.last_level {
            None if level != 0 || !kind.is_document() => {
                return Err(ConvertError::BadRoot {
                    kind: record.kind.to_string(),
                    level,
                });
            }
            Some(_) if level == 0 => return Err(ConvertError::MultipleRoots { id }),
            Some(last) if level > last + 1 => {
                return Err(ConvertError::LevelJump {
                    id,
                    from: last,
                    to: level,
                });
            }
            _ => {}
        }

        let payload = decode_content(kind.content_rule(), record.content, id)?;
        let mut node = Node::new(id, kind, level, self.line_num, payload);
        if record.has_newline_escape() {
            self.line_num += 1;
        }

        self.move_cursor(level)?;

        node.root = self.tree.root().unwrap_or(NodeId(0));
        node.parent = self.current_parent;
        node.prev = self.last;
        let prior_sibling = self
            .current_parent
            .and_then(|p| self.tree.children(p).last().copied());
        node.prev_sibling = prior_sibling;
        let handle = self.tree.push(node);

        match self.current_parent {
            None => self.current_parent = Some(handle),
            Some(parent) => {
                self.tree.get_mut(parent).children.push(handle);
                if let Some(prior) = prior_sibling {
                    self.tree.get_mut(prior).next_sibling = Some(handle);
                }
            }
        }
        if let Some(last) = self.last {
            self.tree.get_mut(last).next = Some(handle);
        }
        self.last = Some(handle);
        self.stats.nodes += 1;

        debug!(id, level, kind = kind.tag(), "node");
        Ok(handle)
    }

    fn move_cursor(&mut self, level: usize) -> Result<()> {
        let Some(mut last_level) = self.last_level else {
            // root: nothing to descend from yet
            self.last_level = Some(level);
            return Ok(());
        };

        if level > last_level {
            if let Some(parent) = self.current_parent {
                self.parent_stack.push(parent);
            }
            self.current_parent = self.last;
            last_level = level;
        } else {
            while level < last_level {
                let parent = self
                    .parent_stack
                    .pop()
                    .ok_or(ConvertError::MultipleRoots {
                        id: self.tree.len() + 1,
                    })?;
                self.current_parent = Some(parent);
                last_level -= 1;
            }
        }
        self.last_level = Some(last_level);
        Ok(())
    }

    pub fn finish(self) -> Result<(Tree, BuildStats)> {
        if self.tree.is_empty() {
            return Err(ConvertError::EmptyDump);
        }
        Ok((self.tree, self.stats))
    }
}

/// Builds a tree from a complete dump.
pub fn build_tree<I, S>(lines: I) -> Result<(Tree, BuildStats)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut builder = TreeBuilder::new();
    for line in lines {
        builder.push_line(line.as_ref())?;
    }
    builder.finish()
}
