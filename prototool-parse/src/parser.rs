use prototool_config::Failure;

use crate::ast::{Ast, FieldLabel, Node, NodeIndex, NodeKind};
use crate::lexer::{Token, TokenKind};

/// Parses a token stream into an arena AST.
///
/// The grammar covers proto2 and proto3: groups, extensions, reserved
/// ranges, oneofs, map fields, and custom options with parenthesized paths.
pub fn parse(path: &str, tokens: Vec<Token>) -> Result<Ast, Failure> {
    let mut parser = Parser {
        path,
        tokens: &tokens,
        pos: 0,
        nodes: vec![Node {
            parent: None,
            kind: NodeKind::File {
                syntax: "proto2".to_string(),
                has_syntax_decl: false,
            },
            start_token: 0,
            end_token: tokens.len().saturating_sub(1),
            name_token: None,
        }],
    };
    parser.file()?;
    let nodes = parser.nodes;
    Ok(Ast {
        path: path.to_string(),
        tokens,
        nodes,
    })
}

struct Parser<'a> {
    path: &'a str,
    tokens: &'a [Token],
    pos: usize,
    nodes: Vec<Node>,
}

impl<'a> Parser<'a> {
    // -- cursor helpers ------------------------------------------------------

    fn skip_trivia(&mut self) {
        while self
            .tokens
            .get(self.pos)
            .is_some_and(|token| token.kind.is_trivia())
        {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<&'a Token> {
        self.skip_trivia();
        self.tokens.get(self.pos)
    }

    fn peek_text(&mut self) -> &'a str {
        self.peek().map_or("", |token| token.text.as_str())
    }

    fn bump(&mut self) -> Result<(usize, &'a Token), Failure> {
        self.skip_trivia();
        let index = self.pos;
        let token = self
            .tokens
            .get(index)
            .ok_or_else(|| self.failure("unexpected end of file"))?;
        self.pos += 1;
        Ok((index, token))
    }

    fn expect_symbol(&mut self, symbol: &str) -> Result<usize, Failure> {
        let (index, token) = self.bump()?;
        if token.kind == TokenKind::Symbol && token.text == symbol {
            Ok(index)
        } else {
            Err(self.failure_at(token, format!("expected {symbol:?}, got {:?}", token.text)))
        }
    }

    fn expect_keyword(&mut self, keyword: &str) -> Result<usize, Failure> {
        let (index, token) = self.bump()?;
        if token.kind == TokenKind::Identifier && token.text == keyword {
            Ok(index)
        } else {
            Err(self.failure_at(token, format!("expected {keyword:?}, got {:?}", token.text)))
        }
    }

    fn expect_ident(&mut self) -> Result<(usize, String), Failure> {
        let (index, token) = self.bump()?;
        if token.kind == TokenKind::Identifier {
            Ok((index, token.text.clone()))
        } else {
            Err(self.failure_at(token, format!("expected identifier, got {:?}", token.text)))
        }
    }

    fn expect_string(&mut self) -> Result<(usize, String), Failure> {
        let (index, token) = self.bump()?;
        if token.kind == TokenKind::StringLiteral {
            Ok((index, unquote(&token.text)))
        } else {
            Err(self.failure_at(token, format!("expected string literal, got {:?}", token.text)))
        }
    }

    fn expect_int(&mut self) -> Result<(usize, i64), Failure> {
        let negative = if self.peek_text() == "-" {
            self.bump()?;
            true
        } else {
            false
        };
        let (index, token) = self.bump()?;
        if token.kind != TokenKind::IntLiteral {
            return Err(self.failure_at(token, format!("expected integer, got {:?}", token.text)));
        }
        let value = parse_int(&token.text)
            .ok_or_else(|| self.failure_at(token, format!("invalid integer {:?}", token.text)))?;
        Ok((index, if negative { -value } else { value }))
    }

    fn failure(&mut self, message: impl Into<String>) -> Failure {
        self.skip_trivia();
        match self.tokens.get(self.pos) {
            Some(token) => self.failure_at(token, message),
            None => {
                let (line, column) = self
                    .tokens
                    .last()
                    .map_or((1, 1), |token| (token.location.line, token.location.column));
                Failure::new(self.path, line, column, message).with_rule("PARSE")
            }
        }
    }

    fn failure_at(&self, token: &Token, message: impl Into<String>) -> Failure {
        Failure::new(
            self.path,
            token.location.line,
            token.location.column,
            message,
        )
        .with_rule("PARSE")
    }

    fn push(&mut self, parent: NodeIndex, kind: NodeKind, start: usize) -> NodeIndex {
        self.nodes.push(Node {
            parent: Some(parent),
            kind,
            start_token: start,
            end_token: start,
            name_token: None,
        });
        self.nodes.len() - 1
    }

    fn finish(&mut self, node: NodeIndex, end: usize) {
        self.nodes[node].end_token = end;
    }

    // -- grammar -------------------------------------------------------------

    fn file(&mut self) -> Result<(), Failure> {
        while let Some(token) = self.peek() {
            let start = self.pos;
            match token.text.as_str() {
                "syntax" => self.syntax_decl(start)?,
                "package" => self.package_decl(start)?,
                "import" => self.import_decl(start)?,
                "option" => {
                    self.option_decl(0, start)?;
                }
                "message" => self.message_decl(0, start)?,
                "enum" => self.enum_decl(0, start)?,
                "service" => self.service_decl(start)?,
                "extend" => self.extend_decl(0, start)?,
                ";" => {
                    let (index, _) = self.bump()?;
                    let node = self.push(0, NodeKind::Empty, index);
                    self.finish(node, index);
                }
                other => {
                    return Err(self.failure(format!("unexpected {other:?} at file scope")));
                }
            }
        }
        Ok(())
    }

    fn syntax_decl(&mut self, start: usize) -> Result<(), Failure> {
        self.expect_keyword("syntax")?;
        self.expect_symbol("=")?;
        let (_, value) = self.expect_string()?;
        let end = self.expect_symbol(";")?;
        if value != "proto2" && value != "proto3" {
            return Err(self.failure(format!("unknown syntax {value:?}")));
        }
        let node = self.push(0, NodeKind::Syntax { value: value.clone() }, start);
        self.finish(node, end);
        if let NodeKind::File {
            syntax,
            has_syntax_decl,
        } = &mut self.nodes[0].kind
        {
            *syntax = value;
            *has_syntax_decl = true;
        }
        Ok(())
    }

    fn package_decl(&mut self, start: usize) -> Result<(), Failure> {
        self.expect_keyword("package")?;
        let (name_token, name) = self.dotted_ident()?;
        let end = self.expect_symbol(";")?;
        let node = self.push(0, NodeKind::Package { name }, start);
        self.nodes[node].name_token = Some(name_token);
        self.finish(node, end);
        Ok(())
    }

    fn import_decl(&mut self, start: usize) -> Result<(), Failure> {
        self.expect_keyword("import")?;
        let modifier = match self.peek_text() {
            modifier @ ("public" | "weak") => {
                let modifier = modifier.to_string();
                self.bump()?;
                Some(modifier)
            }
            _ => None,
        };
        let (path_token, path) = self.expect_string()?;
        let end = self.expect_symbol(";")?;
        let node = self.push(0, NodeKind::Import { path, modifier }, start);
        self.nodes[node].name_token = Some(path_token);
        self.finish(node, end);
        Ok(())
    }

    fn option_decl(&mut self, parent: NodeIndex, start: usize) -> Result<NodeIndex, Failure> {
        self.expect_keyword("option")?;
        let name = self.option_name()?;
        self.expect_symbol("=")?;
        let value = self.option_value()?;
        let end = self.expect_symbol(";")?;
        let node = self.push(parent, NodeKind::Option { name, value }, start);
        self.finish(node, end);
        Ok(node)
    }

    /// `option_name = ( ident | '(' dotted ')' ) ( '.' ident )*`
    fn option_name(&mut self) -> Result<String, Failure> {
        let mut name = String::new();
        if self.peek_text() == "(" {
            self.bump()?;
            name.push('(');
            if self.peek_text() == "." {
                self.bump()?;
                name.push('.');
            }
            let (_, path) = self.dotted_ident()?;
            name.push_str(&path);
            self.expect_symbol(")")?;
            name.push(')');
        } else {
            let (_, ident) = self.expect_ident()?;
            name.push_str(&ident);
        }
        while self.peek_text() == "." {
            self.bump()?;
            let (_, ident) = self.expect_ident()?;
            name.push('.');
            name.push_str(&ident);
        }
        Ok(name)
    }

    fn option_value(&mut self) -> Result<String, Failure> {
        if self.peek_text() == "{" {
            return self.aggregate_value();
        }
        let mut value = String::new();
        if self.peek_text() == "-" {
            self.bump()?;
            value.push('-');
        }
        let (_, token) = self.bump()?;
        match token.kind {
            TokenKind::StringLiteral
            | TokenKind::IntLiteral
            | TokenKind::FloatLiteral => value.push_str(&token.text),
            TokenKind::Identifier => {
                value.push_str(&token.text);
                while self.peek_text() == "." {
                    self.bump()?;
                    let (_, ident) = self.expect_ident()?;
                    value.push('.');
                    value.push_str(&ident);
                }
            }
            _ => {
                return Err(
                    self.failure_at(token, format!("expected option value, got {:?}", token.text))
                )
            }
        }
        Ok(value)
    }

    /// Consumes a balanced `{ ... }` aggregate, normalizing interior spacing.
    fn aggregate_value(&mut self) -> Result<String, Failure> {
        let mut depth = 0usize;
        let mut parts: Vec<String> = Vec::new();
        loop {
            let (_, token) = self.bump()?;
            match token.text.as_str() {
                "{" => depth += 1,
                "}" => depth -= 1,
                _ => {}
            }
            parts.push(token.text.clone());
            if depth == 0 {
                break;
            }
        }
        Ok(render_parts(&parts))
    }

    fn dotted_ident(&mut self) -> Result<(usize, String), Failure> {
        let (first_token, mut name) = self.expect_ident()?;
        while self.peek_text() == "." {
            self.bump()?;
            let (_, ident) = self.expect_ident()?;
            name.push('.');
            name.push_str(&ident);
        }
        Ok((first_token, name))
    }

    /// A message-field type: optionally dot-rooted, dotted identifier.
    fn type_name(&mut self) -> Result<String, Failure> {
        let mut name = String::new();
        if self.peek_text() == "." {
            self.bump()?;
            name.push('.');
        }
        let (_, path) = self.dotted_ident()?;
        name.push_str(&path);
        Ok(name)
    }

    fn message_decl(&mut self, parent: NodeIndex, start: usize) -> Result<(), Failure> {
        self.expect_keyword("message")?;
        let (name_token, name) = self.expect_ident()?;
        let node = self.push(parent, NodeKind::Message { name }, start);
        self.nodes[node].name_token = Some(name_token);
        self.expect_symbol("{")?;
        let end = self.message_body(node)?;
        self.finish(node, end);
        Ok(())
    }

    /// Parses message-scope statements until the closing brace, returning its
    /// token index.
    fn message_body(&mut self, parent: NodeIndex) -> Result<usize, Failure> {
        loop {
            let Some(token) = self.peek() else {
                return Err(self.failure("unexpected end of file in message body"));
            };
            let start = self.pos;
            match token.text.as_str() {
                "}" => {
                    let (index, _) = self.bump()?;
                    return Ok(index);
                }
                "message" => self.message_decl(parent, start)?,
                "enum" => self.enum_decl(parent, start)?,
                "oneof" => self.oneof_decl(parent, start)?,
                "extend" => self.extend_decl(parent, start)?,
                "option" => {
                    self.option_decl(parent, start)?;
                }
                "map" => self.map_field(parent, start)?,
                "reserved" => self.reserved_decl(parent, start)?,
                "extensions" => self.extensions_decl(parent, start)?,
                ";" => {
                    let (index, _) = self.bump()?;
                    let node = self.push(parent, NodeKind::Empty, index);
                    self.finish(node, index);
                }
                _ => self.field_decl(parent, start)?,
            }
        }
    }

    fn field_decl(&mut self, parent: NodeIndex, start: usize) -> Result<(), Failure> {
        let label = match self.peek_text() {
            "optional" => {
                self.bump()?;
                FieldLabel::Optional
            }
            "required" => {
                self.bump()?;
                FieldLabel::Required
            }
            "repeated" => {
                self.bump()?;
                FieldLabel::Repeated
            }
            _ => FieldLabel::Singular,
        };

        if self.peek_text() == "group" {
            return self.group_decl(parent, start, label);
        }
        if self.peek_text() == "map" && label == FieldLabel::Singular {
            return self.map_field(parent, start);
        }

        let type_name = self.type_name()?;
        let (name_token, name) = self.expect_ident()?;
        self.expect_symbol("=")?;
        let (_, number) = self.expect_int()?;
        let options = self.field_options()?;
        let end = self.expect_symbol(";")?;
        let node = self.push(
            parent,
            NodeKind::Field {
                name,
                number,
                label,
                type_name,
                options,
            },
            start,
        );
        self.nodes[node].name_token = Some(name_token);
        self.finish(node, end);
        Ok(())
    }

    fn map_field(&mut self, parent: NodeIndex, start: usize) -> Result<(), Failure> {
        self.expect_keyword("map")?;
        self.expect_symbol("<")?;
        let key_type = self.type_name()?;
        self.expect_symbol(",")?;
        let value_type = self.type_name()?;
        self.expect_symbol(">")?;
        let (name_token, name) = self.expect_ident()?;
        self.expect_symbol("=")?;
        let (_, number) = self.expect_int()?;
        let options = self.field_options()?;
        let end = self.expect_symbol(";")?;
        let node = self.push(
            parent,
            NodeKind::MapField {
                name,
                number,
                key_type,
                value_type,
                options,
            },
            start,
        );
        self.nodes[node].name_token = Some(name_token);
        self.finish(node, end);
        Ok(())
    }

    fn group_decl(
        &mut self,
        parent: NodeIndex,
        start: usize,
        label: FieldLabel,
    ) -> Result<(), Failure> {
        self.expect_keyword("group")?;
        let (name_token, name) = self.expect_ident()?;
        self.expect_symbol("=")?;
        let (_, number) = self.expect_int()?;
        let node = self.push(parent, NodeKind::Group { name, number, label }, start);
        self.nodes[node].name_token = Some(name_token);
        self.expect_symbol("{")?;
        let end = self.message_body(node)?;
        self.finish(node, end);
        Ok(())
    }

    fn oneof_decl(&mut self, parent: NodeIndex, start: usize) -> Result<(), Failure> {
        self.expect_keyword("oneof")?;
        let (name_token, name) = self.expect_ident()?;
        let node = self.push(parent, NodeKind::Oneof { name }, start);
        self.nodes[node].name_token = Some(name_token);
        self.expect_symbol("{")?;
        loop {
            let Some(token) = self.peek() else {
                return Err(self.failure("unexpected end of file in oneof body"));
            };
            let start = self.pos;
            match token.text.as_str() {
                "}" => {
                    let (index, _) = self.bump()?;
                    self.finish(node, index);
                    return Ok(());
                }
                "option" => {
                    self.option_decl(node, start)?;
                }
                ";" => {
                    self.bump()?;
                }
                _ => self.field_decl(node, start)?,
            }
        }
    }

    fn enum_decl(&mut self, parent: NodeIndex, start: usize) -> Result<(), Failure> {
        self.expect_keyword("enum")?;
        let (name_token, name) = self.expect_ident()?;
        let node = self.push(parent, NodeKind::Enum { name }, start);
        self.nodes[node].name_token = Some(name_token);
        self.expect_symbol("{")?;
        loop {
            let Some(token) = self.peek() else {
                return Err(self.failure("unexpected end of file in enum body"));
            };
            let start = self.pos;
            match token.text.as_str() {
                "}" => {
                    let (index, _) = self.bump()?;
                    self.finish(node, index);
                    return Ok(());
                }
                "option" => {
                    self.option_decl(node, start)?;
                }
                "reserved" => self.reserved_decl(node, start)?,
                ";" => {
                    self.bump()?;
                }
                _ => {
                    let (name_token, name) = self.expect_ident()?;
                    self.expect_symbol("=")?;
                    let (_, number) = self.expect_int()?;
                    let options = self.field_options()?;
                    let end = self.expect_symbol(";")?;
                    let value = self.push(
                        node,
                        NodeKind::EnumValue {
                            name,
                            number,
                            options,
                        },
                        start,
                    );
                    self.nodes[value].name_token = Some(name_token);
                    self.finish(value, end);
                }
            }
        }
    }

    fn reserved_decl(&mut self, parent: NodeIndex, start: usize) -> Result<(), Failure> {
        self.expect_keyword("reserved")?;
        let (spec, end) = self.range_spec()?;
        let node = self.push(parent, NodeKind::Reserved { spec }, start);
        self.finish(node, end);
        Ok(())
    }

    fn extensions_decl(&mut self, parent: NodeIndex, start: usize) -> Result<(), Failure> {
        self.expect_keyword("extensions")?;
        let (spec, end) = self.range_spec()?;
        let node = self.push(parent, NodeKind::Extensions { spec }, start);
        self.finish(node, end);
        Ok(())
    }

    /// Collects range/name tokens up to `;`, normalized.
    fn range_spec(&mut self) -> Result<(String, usize), Failure> {
        let mut parts = Vec::new();
        loop {
            let (index, token) = self.bump()?;
            if token.kind == TokenKind::Symbol && token.text == ";" {
                return Ok((render_parts(&parts), index));
            }
            parts.push(token.text.clone());
        }
    }

    fn extend_decl(&mut self, parent: NodeIndex, start: usize) -> Result<(), Failure> {
        self.expect_keyword("extend")?;
        let type_name = self.type_name()?;
        let node = self.push(parent, NodeKind::Extend { type_name }, start);
        self.expect_symbol("{")?;
        let end = self.message_body(node)?;
        self.finish(node, end);
        Ok(())
    }

    fn service_decl(&mut self, start: usize) -> Result<(), Failure> {
        self.expect_keyword("service")?;
        let (name_token, name) = self.expect_ident()?;
        let node = self.push(0, NodeKind::Service { name }, start);
        self.nodes[node].name_token = Some(name_token);
        self.expect_symbol("{")?;
        loop {
            let Some(token) = self.peek() else {
                return Err(self.failure("unexpected end of file in service body"));
            };
            let start = self.pos;
            match token.text.as_str() {
                "}" => {
                    let (index, _) = self.bump()?;
                    self.finish(node, index);
                    return Ok(());
                }
                "option" => {
                    self.option_decl(node, start)?;
                }
                "rpc" => self.rpc_decl(node, start)?,
                ";" => {
                    self.bump()?;
                }
                other => {
                    return Err(self.failure(format!("unexpected {other:?} in service body")));
                }
            }
        }
    }

    fn rpc_decl(&mut self, parent: NodeIndex, start: usize) -> Result<(), Failure> {
        self.expect_keyword("rpc")?;
        let (name_token, name) = self.expect_ident()?;
        self.expect_symbol("(")?;
        let client_streaming = self.stream_marker()?;
        let request_type = self.type_name()?;
        self.expect_symbol(")")?;
        self.expect_keyword("returns")?;
        self.expect_symbol("(")?;
        let server_streaming = self.stream_marker()?;
        let response_type = self.type_name()?;
        self.expect_symbol(")")?;

        let node = self.push(
            parent,
            NodeKind::Rpc {
                name,
                request_type,
                response_type,
                client_streaming,
                server_streaming,
            },
            start,
        );
        self.nodes[node].name_token = Some(name_token);

        let end = if self.peek_text() == "{" {
            self.bump()?;
            loop {
                let Some(token) = self.peek() else {
                    return Err(self.failure("unexpected end of file in rpc body"));
                };
                let start = self.pos;
                match token.text.as_str() {
                    "}" => {
                        let (index, _) = self.bump()?;
                        break index;
                    }
                    "option" => {
                        self.option_decl(node, start)?;
                    }
                    ";" => {
                        self.bump()?;
                    }
                    other => {
                        return Err(self.failure(format!("unexpected {other:?} in rpc body")));
                    }
                }
            }
        } else {
            self.expect_symbol(";")?
        };
        self.finish(node, end);
        Ok(())
    }

    fn stream_marker(&mut self) -> Result<bool, Failure> {
        if self.peek_text() == "stream" {
            // "stream" can also name a type; only treat it as the marker when
            // another type token follows.
            let saved = self.pos;
            self.bump()?;
            match self.peek() {
                Some(token)
                    if token.kind == TokenKind::Identifier
                        || (token.kind == TokenKind::Symbol && token.text == ".") =>
                {
                    return Ok(true);
                }
                _ => self.pos = saved,
            }
        }
        Ok(false)
    }

    fn field_options(&mut self) -> Result<Vec<(String, String)>, Failure> {
        let mut options = Vec::new();
        if self.peek_text() != "[" {
            return Ok(options);
        }
        self.bump()?;
        loop {
            let name = self.option_name()?;
            self.expect_symbol("=")?;
            let value = self.option_value()?;
            options.push((name, value));
            match self.peek_text() {
                "," => {
                    self.bump()?;
                }
                "]" => {
                    self.bump()?;
                    return Ok(options);
                }
                other => {
                    return Err(self.failure(format!("expected \",\" or \"]\", got {other:?}")));
                }
            }
        }
    }
}

fn unquote(text: &str) -> String {
    let inner = &text[1..text.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(escaped) = chars.next() {
                match escaped {
                    'n' => out.push('\n'),
                    'r' => out.push('\r'),
                    't' => out.push('\t'),
                    other => out.push(other),
                }
            }
        } else {
            out.push(ch);
        }
    }
    out
}

fn parse_int(text: &str) -> Option<i64> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

/// Joins token texts with single spaces, eliding them around punctuation that
/// reads tighter without: `a: 1` aggregates, `1 to 10` ranges, quoted names.
fn render_parts(parts: &[String]) -> String {
    let mut out = String::new();
    for (index, part) in parts.iter().enumerate() {
        let glue_left = matches!(part.as_str(), "," | ";" | ":" | "}" | "]" | ")" | ".");
        let glue_right = index
            .checked_sub(1)
            .map(|prev| matches!(parts[prev].as_str(), "{" | "[" | "(" | "." | "-"));
        if index > 0 && !glue_left && !glue_right.unwrap_or(false) {
            out.push(' ');
        }
        out.push_str(part);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    #[test]
    fn parses_proto3_file() {
        let src = r#"syntax = "proto3";

package foo.v1;

import "google/protobuf/timestamp.proto";

option java_package = "com.foo.v1";

message Request {
  string name = 1;
  repeated int32 values = 2;
  map<string, Inner> inner = 3;

  message Inner {
    bool ok = 1;
  }

  oneof choice {
    string left = 4;
    int64 right = 5;
  }

  reserved 6, 7;
  reserved "legacy";
}

enum Kind {
  KIND_INVALID = 0;
  KIND_ONE = 1;
}

service FooService {
  rpc Get(Request) returns (Request);
  rpc Watch(Request) returns (stream Request);
}
"#;
        let ast = parse_source("foo.proto", src).unwrap();
        assert_eq!(ast.syntax(), "proto3");
        assert_eq!(ast.package(), Some("foo.v1"));

        let messages: Vec<&str> = ast
            .children(0)
            .filter_map(|index| match &ast.node(index).kind {
                NodeKind::Message { name } => Some(name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(messages, vec!["Request"]);

        let request = ast
            .children(0)
            .find(|&index| matches!(&ast.node(index).kind, NodeKind::Message { name } if name == "Request"))
            .unwrap();
        let fields: Vec<&str> = ast
            .children(request)
            .filter_map(|index| match &ast.node(index).kind {
                NodeKind::Field { name, .. } | NodeKind::MapField { name, .. } => {
                    Some(name.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(fields, vec!["name", "values", "inner"]);

        let service = ast
            .children(0)
            .find(|&index| matches!(&ast.node(index).kind, NodeKind::Service { .. }))
            .unwrap();
        let rpcs: Vec<(bool, bool)> = ast
            .children(service)
            .filter_map(|index| match &ast.node(index).kind {
                NodeKind::Rpc {
                    client_streaming,
                    server_streaming,
                    ..
                } => Some((*client_streaming, *server_streaming)),
                _ => None,
            })
            .collect();
        assert_eq!(rpcs, vec![(false, false), (false, true)]);
    }

    #[test]
    fn parses_proto2_constructs() {
        let src = r#"syntax = "proto2";

package bar;

message Legacy {
  required string id = 1;
  optional int32 count = 2 [default = 42];
  repeated group Item = 3 {
    optional string name = 1;
  }
  extensions 100 to 199;
}

extend Legacy {
  optional string extra = 100;
}
"#;
        let ast = parse_source("bar.proto", src).unwrap();
        assert_eq!(ast.syntax(), "proto2");
        let legacy = ast
            .children(0)
            .find(|&index| matches!(&ast.node(index).kind, NodeKind::Message { .. }))
            .unwrap();
        assert!(ast
            .children(legacy)
            .any(|index| matches!(&ast.node(index).kind, NodeKind::Group { name, .. } if name == "Item")));
        assert!(ast
            .children(legacy)
            .any(|index| matches!(&ast.node(index).kind, NodeKind::Extensions { .. })));
        assert!(ast
            .children(0)
            .any(|index| matches!(&ast.node(index).kind, NodeKind::Extend { type_name } if type_name == "Legacy")));
    }

    #[test]
    fn parses_custom_options() {
        let src = r#"syntax = "proto3";

import "google/protobuf/descriptor.proto";

option (my.file_opt) = { key: "value" nested { flag: true } };

message M {
  string a = 1 [(my.field_opt) = 7, deprecated = true];
}
"#;
        let ast = parse_source("opts.proto", src).unwrap();
        let option = ast
            .children(0)
            .find_map(|index| match &ast.node(index).kind {
                NodeKind::Option { name, value } => Some((name.clone(), value.clone())),
                _ => None,
            })
            .unwrap();
        assert_eq!(option.0, "(my.file_opt)");
        assert_eq!(option.1, "{key: \"value\" nested {flag: true}}");
    }

    #[test]
    fn missing_file_scope_keyword_is_parse_failure() {
        let failure = parse_source("bad.proto", "mesage Foo {}\n").unwrap_err();
        assert_eq!(failure.rule_id.as_deref(), Some("PARSE"));
        assert_eq!(failure.line, 1);
    }

    #[test]
    fn enum_name_location_matches_source() {
        let ast = parse_source("e.proto", "enum foo { A = 0; }\n").unwrap();
        let node = ast
            .children(0)
            .find(|&index| matches!(&ast.node(index).kind, NodeKind::Enum { .. }))
            .unwrap();
        let location = ast.location(node);
        assert_eq!((location.line, location.column), (1, 6));
    }

    #[test]
    fn attaches_leading_and_trailing_comments() {
        let src = "// about Foo\n// second line\nmessage Foo {\n  string a = 1; // inline\n}\n";
        let ast = parse_source("c.proto", src).unwrap();
        let foo = ast
            .children(0)
            .find(|&index| matches!(&ast.node(index).kind, NodeKind::Message { .. }))
            .unwrap();
        let leading = ast.leading_comments(foo);
        assert_eq!(leading.len(), 2);
        assert_eq!(leading[0].text, "// about Foo");

        let field = ast.children(foo).next().unwrap();
        assert_eq!(ast.trailing_comment(field).unwrap().text, "// inline");
    }

    #[test]
    fn negative_enum_values() {
        let ast = parse_source("n.proto", "syntax = \"proto2\";\nenum E { NEG = -1; }\n").unwrap();
        let e = ast
            .children(0)
            .find(|&index| matches!(&ast.node(index).kind, NodeKind::Enum { .. }))
            .unwrap();
        let number = ast
            .children(e)
            .find_map(|index| match &ast.node(index).kind {
                NodeKind::EnumValue { number, .. } => Some(*number),
                _ => None,
            })
            .unwrap();
        assert_eq!(number, -1);
    }
}
