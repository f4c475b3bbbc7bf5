use crate::lexer::{Token, TokenKind};

/// Index of a node within its [`Ast`] arena.
pub type NodeIndex = usize;

/// Field cardinality. `Singular` covers proto3 fields without a label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldLabel {
    Singular,
    Optional,
    Required,
    Repeated,
}

impl FieldLabel {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            FieldLabel::Singular => None,
            FieldLabel::Optional => Some("optional"),
            FieldLabel::Required => Some("required"),
            FieldLabel::Repeated => Some("repeated"),
        }
    }
}

/// A declaration in the source file. Children reference their parent by
/// index; the arena owns every node and drops them in bulk.
#[derive(Clone, Debug)]
pub struct Node {
    pub parent: Option<NodeIndex>,
    pub kind: NodeKind,
    /// First token of the declaration (inclusive), in the file token stream.
    pub start_token: usize,
    /// Last token of the declaration (inclusive).
    pub end_token: usize,
    /// The token carrying the declared name, when the node has one.
    pub name_token: Option<usize>,
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    /// The file root. `syntax` is `proto2` when no declaration is present.
    File { syntax: String, has_syntax_decl: bool },
    Syntax { value: String },
    Package { name: String },
    Import { path: String, modifier: Option<String> },
    /// A file-, message-, field-, or call-level option.
    Option { name: String, value: String },
    Message { name: String },
    Field {
        name: String,
        number: i64,
        label: FieldLabel,
        type_name: String,
        options: Vec<(String, String)>,
    },
    MapField {
        name: String,
        number: i64,
        key_type: String,
        value_type: String,
        options: Vec<(String, String)>,
    },
    Oneof { name: String },
    Group { name: String, number: i64, label: FieldLabel },
    Enum { name: String },
    EnumValue {
        name: String,
        number: i64,
        options: Vec<(String, String)>,
    },
    Reserved { spec: String },
    Extensions { spec: String },
    Extend { type_name: String },
    Service { name: String },
    Rpc {
        name: String,
        request_type: String,
        response_type: String,
        client_streaming: bool,
        server_streaming: bool,
    },
    /// `;` on its own. Kept so the formatter can drop it deliberately.
    Empty,
}

impl NodeKind {
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeKind::Message { name }
            | NodeKind::Oneof { name }
            | NodeKind::Enum { name }
            | NodeKind::Service { name }
            | NodeKind::Package { name }
            | NodeKind::Group { name, .. }
            | NodeKind::Field { name, .. }
            | NodeKind::MapField { name, .. }
            | NodeKind::EnumValue { name, .. }
            | NodeKind::Rpc { name, .. } => Some(name),
            _ => None,
        }
    }
}

/// Arena AST for one file, sharing the file's token stream.
#[derive(Clone, Debug)]
pub struct Ast {
    pub path: String,
    pub tokens: Vec<Token>,
    /// Nodes in document order; index 0 is always the `File` root.
    pub nodes: Vec<Node>,
}

impl Ast {
    pub fn root(&self) -> &Node {
        &self.nodes[0]
    }

    /// Direct children of `parent`, in document order.
    pub fn children(&self, parent: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, node)| node.parent == Some(parent))
            .map(|(index, _)| index)
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index]
    }

    /// The package declared by the file, if any.
    pub fn package(&self) -> Option<&str> {
        self.children(0).find_map(|index| match &self.nodes[index].kind {
            NodeKind::Package { name } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn syntax(&self) -> &str {
        match &self.nodes[0].kind {
            NodeKind::File { syntax, .. } => syntax,
            _ => "proto2",
        }
    }

    /// Location of the node's name token, falling back to its first token.
    pub fn location(&self, index: NodeIndex) -> crate::Location {
        let node = &self.nodes[index];
        let token = node.name_token.unwrap_or(node.start_token);
        self.tokens[token].location
    }

    /// Comments directly preceding the node, nearest last.
    ///
    /// Attachment is lazy: the stream is scanned backwards from the node's
    /// first token, crossing only trivia, and stopping at a blank line that
    /// separates a detached comment block from the declaration.
    pub fn leading_comments(&self, index: NodeIndex) -> Vec<&Token> {
        let mut comments = Vec::new();
        let mut newlines = 0;
        let start = self.nodes[index].start_token;
        for token in self.tokens[..start].iter().rev() {
            match token.kind {
                TokenKind::Whitespace => continue,
                TokenKind::Newline => {
                    newlines += 1;
                    if newlines > 1 && !comments.is_empty() {
                        break;
                    }
                    if newlines > 2 {
                        break;
                    }
                }
                TokenKind::LineComment | TokenKind::BlockComment => {
                    comments.push(token);
                    newlines = 0;
                }
                _ => break,
            }
        }
        comments.reverse();
        comments
    }

    /// The comment on the same line after the node's last token, if any.
    pub fn trailing_comment(&self, index: NodeIndex) -> Option<&Token> {
        let end = self.nodes[index].end_token;
        for token in &self.tokens[end + 1..] {
            match token.kind {
                TokenKind::Whitespace => continue,
                TokenKind::LineComment | TokenKind::BlockComment => return Some(token),
                _ => return None,
            }
        }
        None
    }

    /// Whether the node has any comment attached, leading or trailing.
    pub fn has_comment(&self, index: NodeIndex) -> bool {
        !self.leading_comments(index).is_empty() || self.trailing_comment(index).is_some()
    }
}
