//! The canonical printer: two-space indent, one blank line between top-level
//! declarations, normalized option spacing, comments preserved at their
//! declarations. Formatting is idempotent; the three output modes (overwrite,
//! diff, lint) share one rendering.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use itertools::Itertools;
use similar::TextDiff;

use prototool_config::{Error, Failure, LintSettings};
use prototool_parse::{Ast, NodeIndex, NodeKind, TokenKind};

use crate::lint::render_header;

/// Renders the canonical form of a parsed file. With `fix` set and a file
/// header configured, everything before the syntax declaration is replaced by
/// the header.
pub fn format_file(ast: &Ast, settings: &LintSettings, fix: bool) -> String {
    Printer::new(ast).render(settings, fix)
}

/// A unified diff between the on-disk form and the canonical form, or `None`
/// when the file is already formatted.
pub fn unified_diff(path: &str, original: &str, formatted: &str) -> Option<String> {
    if original == formatted {
        return None;
    }
    let diff = TextDiff::from_lines(original, formatted);
    Some(
        diff.unified_diff()
            .context_radius(3)
            .header(&format!("a/{path}"), &format!("b/{path}"))
            .to_string(),
    )
}

/// The lint-mode failure for an unformatted file.
pub fn format_failure(path: &str) -> Failure {
    Failure::new(path, 1, 1, "file is not formatted; run format with --overwrite")
        .with_rule("FORMAT_DIFF")
}

/// Writes `content` to `path` atomically: temp file in the same directory,
/// then rename.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), Error> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::internal(format!("{} has no parent", path.display())))?;
    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    fs::write(tmp.path(), content)?;
    tmp.persist(path)
        .map_err(|err| Error::Io(err.error))?;
    Ok(())
}

struct Printer<'a> {
    ast: &'a Ast,
    out: String,
    /// Token indices of comments not yet emitted.
    pending_comments: BTreeSet<usize>,
}

impl<'a> Printer<'a> {
    fn new(ast: &'a Ast) -> Printer<'a> {
        let pending_comments = ast
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, token)| token.kind.is_comment())
            .map(|(index, _)| index)
            .collect();
        Printer {
            ast,
            out: String::new(),
            pending_comments,
        }
    }

    fn render(mut self, settings: &LintSettings, fix: bool) -> String {
        if fix {
            if let Some(header) = &settings.file_header {
                let end = self.syntax_offset();
                self.pending_comments
                    .retain(|&index| self.ast.tokens[index].location.offset >= end);
                self.out.push_str(&render_header(&header.content, header.is_commented));
                self.out.push('\n');
            }
        }

        let children: Vec<NodeIndex> = self
            .ast
            .children(0)
            .filter(|&index| !matches!(self.ast.node(index).kind, NodeKind::Empty))
            .collect();

        let mut first = true;
        for child in children {
            if !first {
                self.out.push('\n');
            }
            self.flush_comments_before(self.ast.node(child).start_token, 0);
            self.emit_node(child, 0);
            first = false;
        }

        // Comments after the last declaration.
        if !self.pending_comments.is_empty() {
            if !self.out.is_empty() {
                self.out.push('\n');
            }
            self.flush_comments_before(self.ast.tokens.len(), 0);
        }

        // Exactly one trailing newline.
        while self.out.ends_with("\n\n") {
            self.out.pop();
        }
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.out
    }

    fn syntax_offset(&self) -> usize {
        self.ast
            .nodes
            .iter()
            .find(|node| matches!(node.kind, NodeKind::Syntax { .. }))
            .map(|node| self.ast.tokens[node.start_token].location.offset)
            .unwrap_or(0)
    }

    fn indent(&mut self, depth: usize) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
    }

    /// Emits pending comments located before `token_index`, keeping a blank
    /// line after blocks that were followed by one in the source.
    fn flush_comments_before(&mut self, token_index: usize, depth: usize) {
        let ready: Vec<usize> = self
            .pending_comments
            .iter()
            .copied()
            .take_while(|&index| index < token_index)
            .collect();
        for index in ready {
            self.pending_comments.remove(&index);
            self.indent(depth);
            self.out.push_str(&self.ast.tokens[index].text.clone());
            self.out.push('\n');
            if self.gap_after(index) >= 2 {
                self.out.push('\n');
            }
        }
    }

    /// Newlines between token `index` and the next non-trivia or comment
    /// token.
    fn gap_after(&self, index: usize) -> usize {
        let mut newlines = 0;
        for token in &self.ast.tokens[index + 1..] {
            match token.kind {
                TokenKind::Newline => newlines += 1,
                TokenKind::Whitespace => {}
                _ => break,
            }
        }
        newlines
    }

    /// Consumes and returns the trailing comment of `node`, if pending.
    fn take_trailing_comment(&mut self, node: NodeIndex) -> Option<String> {
        let end = self.ast.node(node).end_token;
        for (offset, token) in self.ast.tokens[end + 1..].iter().enumerate() {
            match token.kind {
                TokenKind::Whitespace => continue,
                TokenKind::LineComment | TokenKind::BlockComment => {
                    let index = end + 1 + offset;
                    if self.pending_comments.remove(&index) {
                        return Some(token.text.clone());
                    }
                    return None;
                }
                _ => return None,
            }
        }
        None
    }

    fn finish_line(&mut self, node: NodeIndex) {
        if let Some(comment) = self.take_trailing_comment(node) {
            self.out.push(' ');
            self.out.push_str(&comment);
        }
        self.out.push('\n');
    }

    fn emit_node(&mut self, index: NodeIndex, depth: usize) {
        let node = self.ast.node(index);
        match &node.kind {
            NodeKind::Syntax { value } => {
                self.indent(depth);
                self.out.push_str(&format!("syntax = \"{value}\";"));
                self.finish_line(index);
            }
            NodeKind::Package { name } => {
                self.indent(depth);
                self.out.push_str(&format!("package {name};"));
                self.finish_line(index);
            }
            NodeKind::Import { path, modifier } => {
                self.indent(depth);
                match modifier {
                    Some(modifier) => {
                        self.out.push_str(&format!("import {modifier} \"{path}\";"))
                    }
                    None => self.out.push_str(&format!("import \"{path}\";")),
                }
                self.finish_line(index);
            }
            NodeKind::Option { name, value } => {
                self.indent(depth);
                self.out.push_str(&format!("option {name} = {value};"));
                self.finish_line(index);
            }
            NodeKind::Message { name } => {
                self.emit_block(index, depth, &format!("message {name}"));
            }
            NodeKind::Enum { name } => {
                self.emit_block(index, depth, &format!("enum {name}"));
            }
            NodeKind::Service { name } => {
                self.emit_block(index, depth, &format!("service {name}"));
            }
            NodeKind::Oneof { name } => {
                self.emit_block(index, depth, &format!("oneof {name}"));
            }
            NodeKind::Extend { type_name } => {
                self.emit_block(index, depth, &format!("extend {type_name}"));
            }
            NodeKind::Group {
                name,
                number,
                label,
            } => {
                let mut header = String::new();
                if let Some(keyword) = label.keyword() {
                    header.push_str(keyword);
                    header.push(' ');
                }
                header.push_str(&format!("group {name} = {number}"));
                self.emit_block(index, depth, &header);
            }
            NodeKind::Field {
                name,
                number,
                label,
                type_name,
                options,
            } => {
                self.indent(depth);
                if let Some(keyword) = label.keyword() {
                    self.out.push_str(keyword);
                    self.out.push(' ');
                }
                self.out.push_str(&format!("{type_name} {name} = {number}"));
                self.emit_options_list(options);
                self.out.push(';');
                self.finish_line(index);
            }
            NodeKind::MapField {
                name,
                number,
                key_type,
                value_type,
                options,
            } => {
                self.indent(depth);
                self.out
                    .push_str(&format!("map<{key_type}, {value_type}> {name} = {number}"));
                self.emit_options_list(options);
                self.out.push(';');
                self.finish_line(index);
            }
            NodeKind::EnumValue {
                name,
                number,
                options,
            } => {
                self.indent(depth);
                self.out.push_str(&format!("{name} = {number}"));
                self.emit_options_list(options);
                self.out.push(';');
                self.finish_line(index);
            }
            NodeKind::Reserved { spec } => {
                self.indent(depth);
                self.out.push_str(&format!("reserved {spec};"));
                self.finish_line(index);
            }
            NodeKind::Extensions { spec } => {
                self.indent(depth);
                self.out.push_str(&format!("extensions {spec};"));
                self.finish_line(index);
            }
            NodeKind::Rpc {
                name,
                request_type,
                response_type,
                client_streaming,
                server_streaming,
            } => {
                self.indent(depth);
                let request = stream_type(*client_streaming, request_type);
                let response = stream_type(*server_streaming, response_type);
                self.out
                    .push_str(&format!("rpc {name}({request}) returns ({response})"));
                let children: Vec<NodeIndex> = self.body_children(index);
                if children.is_empty() {
                    self.out.push(';');
                    self.finish_line(index);
                } else {
                    self.out.push_str(" {\n");
                    for child in children {
                        self.flush_comments_before(self.ast.node(child).start_token, depth + 1);
                        self.emit_node(child, depth + 1);
                    }
                    self.flush_comments_before(self.ast.node(index).end_token, depth + 1);
                    self.indent(depth);
                    self.out.push('}');
                    self.finish_line(index);
                }
            }
            NodeKind::File { .. } | NodeKind::Empty => {}
        }
    }

    fn body_children(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.ast
            .children(index)
            .filter(|&child| !matches!(self.ast.node(child).kind, NodeKind::Empty))
            .collect()
    }

    fn emit_block(&mut self, index: NodeIndex, depth: usize, header: &str) {
        self.indent(depth);
        self.out.push_str(header);
        let children = self.body_children(index);
        if children.is_empty() {
            self.out.push_str(" {}");
            self.finish_line(index);
            return;
        }
        self.out.push_str(" {\n");
        for child in children {
            self.flush_comments_before(self.ast.node(child).start_token, depth + 1);
            self.emit_node(child, depth + 1);
        }
        self.flush_comments_before(self.ast.node(index).end_token, depth + 1);
        self.indent(depth);
        self.out.push('}');
        self.finish_line(index);
    }

    fn emit_options_list(&mut self, options: &[(String, String)]) {
        if options.is_empty() {
            return;
        }
        let rendered = options
            .iter()
            .map(|(name, value)| format!("{name} = {value}"))
            .join(", ");
        self.out.push_str(&format!(" [{rendered}]"));
    }
}

fn stream_type(streaming: bool, type_name: &str) -> String {
    if streaming {
        format!("stream {type_name}")
    } else {
        type_name.to_string()
    }
}
