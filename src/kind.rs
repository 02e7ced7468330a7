use crate::error::{ConvertError, Result};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Category {
    Document,
    Node,
    Statement,
    Structure,
    Token,
}

/// How a record's raw content turns into node payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentRule {
    /// Containers carry no content.
    None,
    /// `"( ... )"`: exactly 7 chars, delimiters at both ends.
    Delimiters,
    /// Quoted, with `\n` and `\t` escapes.
    Whitespace,
    /// Quoted, with `\\`, `\n` and `\t` escapes.
    Comment,
    /// Quoted, taken verbatim.
    Quoted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKind {
    tag: &'static str,
    category: Category,
    rule: ContentRule,
}

impl NodeKind {
    const fn new(tag: &'static str, category: Category, rule: ContentRule) -> Self {
        Self {
            tag,
            category,
            rule,
        }
    }

    /// Normalized class tag, e.g. `PpiTokenQuoteSingle`.
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    pub fn content_rule(&self) -> ContentRule {
        self.rule
    }

    pub fn is_document(&self) -> bool {
        self.category == Category::Document
    }

    pub fn is_structure(&self) -> bool {
        self.category == Category::Structure
    }

    pub fn is_token(&self) -> bool {
        self.category == Category::Token
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self.category,
            Category::Document | Category::Node | Category::Statement
        )
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag)
    }
}

const fn document(tag: &'static str) -> NodeKind {
    NodeKind::new(tag, Category::Document, ContentRule::None)
}

const fn statement(tag: &'static str) -> NodeKind {
    NodeKind::new(tag, Category::Statement, ContentRule::None)
}

const fn structure(tag: &'static str) -> NodeKind {
    NodeKind::new(tag, Category::Structure, ContentRule::Delimiters)
}

const fn token(tag: &'static str) -> NodeKind {
    NodeKind::new(tag, Category::Token, ContentRule::Quoted)
}

static KINDS: &[NodeKind] = &[
    document("PpiDocument"),
    document("PpiDocumentFragment"),
    NodeKind::new("PpiNode", Category::Node, ContentRule::None),
    statement("PpiStatement"),
    statement("PpiStatementBreak"),
    statement("PpiStatementCompound"),
    statement("PpiStatementData"),
    statement("PpiStatementEnd"),
    statement("PpiStatementExpression"),
    statement("PpiStatementGiven"),
    statement("PpiStatementInclude"),
    statement("PpiStatementIncludePerl6"),
    statement("PpiStatementNull"),
    statement("PpiStatementPackage"),
    statement("PpiStatementScheduled"),
    statement("PpiStatementSub"),
    statement("PpiStatementUnknown"),
    statement("PpiStatementUnmatchedBrace"),
    statement("PpiStatementVariable"),
    statement("PpiStatementWhen"),
    structure("PpiStructure"),
    structure("PpiStructureBlock"),
    structure("PpiStructureCondition"),
    structure("PpiStructureConstructor"),
    structure("PpiStructureFor"),
    structure("PpiStructureGiven"),
    structure("PpiStructureList"),
    structure("PpiStructureSignature"),
    structure("PpiStructureSubscript"),
    structure("PpiStructureUnknown"),
    structure("PpiStructureWhen"),
    token("PpiToken"),
    token("PpiTokenArrayIndex"),
    token("PpiTokenAttribute"),
    token("PpiTokenBOM"),
    token("PpiTokenCast"),
    NodeKind::new("PpiTokenComment", Category::Token, ContentRule::Comment),
    token("PpiTokenDashedWord"),
    token("PpiTokenData"),
    token("PpiTokenEnd"),
    token("PpiTokenHereDoc"),
    token("PpiTokenLabel"),
    token("PpiTokenMagic"),
    token("PpiTokenNumber"),
    token("PpiTokenNumberBinary"),
    token("PpiTokenNumberExp"),
    token("PpiTokenNumberFloat"),
    token("PpiTokenNumberHex"),
    token("PpiTokenNumberOctal"),
    token("PpiTokenNumberVersion"),
    token("PpiTokenOperator"),
    token("PpiTokenPod"),
    token("PpiTokenPrototype"),
    token("PpiTokenQuote"),
    token("PpiTokenQuoteDouble"),
    token("PpiTokenQuoteInterpolate"),
    token("PpiTokenQuoteLiteral"),
    token("PpiTokenQuoteSingle"),
    token("PpiTokenQuoteLike"),
    token("PpiTokenQuoteLikeBacktick"),
    token("PpiTokenQuoteLikeCommand"),
    token("PpiTokenQuoteLikeReadline"),
    token("PpiTokenQuoteLikeRegexp"),
    token("PpiTokenQuoteLikeWords"),
    token("PpiTokenRegexp"),
    token("PpiTokenRegexpMatch"),
    token("PpiTokenRegexpSubstitute"),
    token("PpiTokenRegexpTransliterate"),
    token("PpiTokenSeparator"),
    token("PpiTokenStructure"),
    token("PpiTokenSymbol"),
    token("PpiTokenUnknown"),
    NodeKind::new("PpiTokenWhitespace", Category::Token, ContentRule::Whitespace),
    token("PpiTokenWord"),
];

/// Maps a dumped class name such as `PPI::Statement::Sub` to its kind.
pub fn resolve_kind(name: &str) -> Result<NodeKind> {
    let tag = name.replace("::", "").replace("PPI", "Ppi");
    KINDS
        .iter()
        .find(|k| k.tag == tag)
        .copied()
        .ok_or_else(|| ConvertError::UnknownKind {
            name: name.to_string(),
        })
}
