//! Human-readable renderings of a reconstructed tree.

use crate::ast::{NodeId, Payload, Tree};
use crate::error::{ConvertError, Result};
use serde::Serialize;

/// Renders one line per node in tree pre-order:
/// `{id} {indent}{kind}[ {detail}]`, two spaces per level.
///
/// Every child's parent link is checked against the node that lists it;
/// a mismatch means the graph is corrupt and is reported as
/// [`ConvertError::ParentMismatch`].
pub fn dump_struct(tree: &Tree) -> Result<String> {
    let root = tree.root().ok_or(ConvertError::NoDocument)?;
    let mut out = String::new();
    dump_node(tree, root, &mut out)?;
    Ok(out)
}

fn dump_node(tree: &Tree, id: NodeId, out: &mut String) -> Result<()> {
    let node = tree.get(id);
    out.push_str(&format!("{} {}\n", node.id, describe(tree, id)));
    for &child in &node.children {
        let c = tree.get(child);
        if c.parent != Some(id) {
            return Err(ConvertError::ParentMismatch {
                child: c.id,
                expected: node.id,
                found: c.parent.map(|p| tree.get(p).id),
            });
        }
        dump_node(tree, child, out)?;
    }
    Ok(())
}

fn describe(tree: &Tree, id: NodeId) -> String {
    let node = tree.get(id);
    let indent = "  ".repeat(node.level);
    match &node.payload {
        Payload::Empty => format!("{}{}", indent, node.kind.tag()),
        Payload::Text { content } => {
            format!("{}{} '{}'", indent, node.kind.tag(), escape(content))
        }
        Payload::Delimiters { start, end } => {
            format!("{}{} {} ... {}", indent, node.kind.tag(), start, end)
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
}

#[derive(Serialize)]
struct JsonNode<'a> {
    id: usize,
    kind: &'static str,
    level: usize,
    line: usize,
    payload: &'a Payload,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<JsonNode<'a>>,
}

fn json_node(tree: &Tree, id: NodeId) -> JsonNode<'_> {
    let node = tree.get(id);
    JsonNode {
        id: node.id,
        kind: node.kind.tag(),
        level: node.level,
        line: node.line_num,
        payload: &node.payload,
        children: node.children.iter().map(|&c| json_node(tree, c)).collect(),
    }
}

/// Nested JSON form of the tree.
pub fn dump_json(tree: &Tree) -> Result<String> {
    let root = tree.root().ok_or(ConvertError::NoDocument)?;
    Ok(serde_json::to_string_pretty(&json_node(tree, root))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_tree;
    use pretty_assertions::assert_eq;

    const LINES: &[&str] = &[
        "PPI::Document",
        "  PPI::Statement::Compound",
        "    PPI::Token::Word 'if'",
        "    PPI::Structure::Condition ( ... )",
        "      PPI::Token::Comment '# a\\\\b\\tc'",
        "  PPI::Token::Whitespace '\\n'",
    ];

    #[test]
    fn renders_indented_tree() {
        let (tree, _) = build_tree(LINES).unwrap();
        let expected = "\
1 PpiDocument
2   PpiStatementCompound
3     PpiTokenWord 'if'
4     PpiStructureCondition ( ... )
5       PpiTokenComment '# a\\\\b\\tc'
6   PpiTokenWhitespace '\\n'
";
        assert_eq!(dump_struct(&tree).unwrap(), expected);
    }

    #[test]
    fn detects_parent_mismatch() {
        let (mut tree, _) = build_tree(LINES).unwrap();
        tree.get_mut(NodeId(2)).parent = Some(NodeId(0));
        let err = dump_struct(&tree).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::ParentMismatch {
                child: 3,
                expected: 2,
                found: Some(1)
            }
        ));
    }

    #[test]
    fn empty_tree_has_no_document() {
        assert!(matches!(
            dump_struct(&Tree::default()).unwrap_err(),
            ConvertError::NoDocument
        ));
    }

    #[test]
    fn json_nests_children() {
        let (tree, _) = build_tree(LINES).unwrap();
        let v: serde_json::Value = serde_json::from_str(&dump_json(&tree).unwrap()).unwrap();
        assert_eq!(v["kind"], "PpiDocument");
        assert_eq!(v["children"][0]["children"][1]["payload"]["start"], "(");
        assert_eq!(
            v["children"][0]["children"][1]["children"][0]["payload"]["content"],
            "# a\\b\tc"
        );
        assert_eq!(v["children"][1]["line"], 1);
    }
}
