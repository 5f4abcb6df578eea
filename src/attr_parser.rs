// SPDX-FileCopyrightText: Copyright (c) 2024 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0
//! Attribute extraction from annotated C source.
//!
//! This is not a C parser. It strips comments, then scans for runs of
//! `__attribute__((name))` / `__attribute__((name(arg, ...)))` blocks
//! followed by a function-like declaration, and reports the function name,
//! its ordered attribute list, and the raw parameter text. Everything else
//! in the source is ignored.
//!
//! The scan is deliberately permissive: malformed annotation syntax yields
//! no attributes, so the affected function is simply never reported. No
//! diagnostics are produced here. Nested parentheses inside attribute
//! arguments are handled by depth counting.

use crate::ir::Attribute;

const ATTR_KEYWORD: &str = "__attribute__";

/// A function-like declaration with at least one attribute attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedFn {
    /// Function name.
    pub name: String,
    /// Attribute occurrences, in source order across all consecutive blocks.
    pub attrs: Vec<Attribute>,
    /// Raw text between the parentheses of the parameter list.
    pub params: String,
}

/// Remove `/* */` block comments and `//` line comments.
///
/// Block comments disappear entirely; line comments keep their terminating
/// newline. Comment markers inside string literals are not recognized,
/// which matches what the annotation grammar needs (attributes never carry
/// string arguments).
pub fn strip_comments(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut out = String::with_capacity(src.len());
    let mut pos = 0;
    while pos < bytes.len() {
        if src[pos..].starts_with("/*") {
            match src[pos + 2..].find("*/") {
                Some(end) => pos += 2 + end + 2,
                None => break,
            }
        } else if src[pos..].starts_with("//") {
            match src[pos..].find('\n') {
                Some(end) => pos += end,
                None => break,
            }
        } else {
            let ch = src[pos..].chars().next().unwrap_or('\0');
            out.push(ch);
            pos += ch.len_utf8();
        }
    }
    out
}

/// Extract every function-like declaration carrying attributes.
///
/// Functions without attributes are pure pass-through and do not appear in
/// the result.
pub fn extract_annotated_fns(src: &str) -> Vec<AnnotatedFn> {
    let cleaned = strip_comments(src);
    let mut funcs = Vec::new();
    let mut cur = Cursor::new(&cleaned);

    while let Some(kw_pos) = cur.find(ATTR_KEYWORD) {
        cur.pos = kw_pos;
        // On any mismatch, resume scanning right past this keyword so a
        // later well-formed annotation run is still found.
        let resume = kw_pos + ATTR_KEYWORD.len();
        match cur.parse_annotated_fn() {
            Some(f) => funcs.push(f),
            None => cur.pos = resume,
        }
    }

    funcs
}

/// Byte-position cursor over comment-stripped source.
struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    /// Position of the next occurrence of `needle` at or after the cursor.
    fn find(&self, needle: &str) -> Option<usize> {
        if self.pos >= self.src.len() {
            return None;
        }
        self.src[self.pos..].find(needle).map(|off| self.pos + off)
    }

    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn try_consume(&mut self, ch: u8) -> bool {
        if self.peek() == Some(ch) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Read a C identifier (`[A-Za-z_][A-Za-z0-9_]*`); empty if none here.
    fn read_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            let is_ident = ch == b'_' || ch.is_ascii_alphanumeric();
            let is_first = self.pos == start;
            if is_ident && !(is_first && ch.is_ascii_digit()) {
                self.pos += 1;
            } else {
                break;
            }
        }
        &self.src[start..self.pos]
    }

    /// Parse one or more consecutive attribute blocks followed by a
    /// function declarator. Returns `None` on any shape mismatch.
    fn parse_annotated_fn(&mut self) -> Option<AnnotatedFn> {
        let mut attrs = Vec::new();

        loop {
            self.skip_whitespace();
            if !self.src[self.pos..].starts_with(ATTR_KEYWORD) {
                break;
            }
            self.pos += ATTR_KEYWORD.len();
            attrs.append(&mut self.parse_attr_block()?);
        }

        if attrs.is_empty() {
            return None;
        }

        let (name, params) = self.parse_declarator()?;
        Some(AnnotatedFn {
            name,
            attrs,
            params,
        })
    }

    /// Parse the `(( spec [, spec ...] ))` following the attribute keyword.
    fn parse_attr_block(&mut self) -> Option<Vec<Attribute>> {
        self.skip_whitespace();
        if !self.try_consume(b'(') {
            return None;
        }
        self.skip_whitespace();
        if !self.try_consume(b'(') {
            return None;
        }

        let mut attrs = Vec::new();
        loop {
            self.skip_whitespace();
            let name = self.read_identifier();
            if name.is_empty() {
                return None;
            }
            self.skip_whitespace();
            let args = if self.peek() == Some(b'(') {
                self.parse_arg_list()?
            } else {
                Vec::new()
            };
            attrs.push(Attribute::new(name, args));

            self.skip_whitespace();
            if !self.try_consume(b',') {
                break;
            }
        }

        self.skip_whitespace();
        if !self.try_consume(b')') {
            return None;
        }
        self.skip_whitespace();
        if !self.try_consume(b')') {
            return None;
        }
        Some(attrs)
    }

    /// Parse a parenthesized argument list, splitting on top-level commas.
    fn parse_arg_list(&mut self) -> Option<Vec<String>> {
        if !self.try_consume(b'(') {
            return None;
        }
        let mut args = Vec::new();
        let mut depth = 0usize;
        let mut piece_start = self.pos;
        loop {
            let ch = self.peek()?;
            match ch {
                b'(' => depth += 1,
                b')' if depth == 0 => {
                    let piece = self.src[piece_start..self.pos].trim();
                    if !piece.is_empty() || !args.is_empty() {
                        args.push(piece.to_string());
                    }
                    self.pos += 1;
                    return Some(args);
                }
                b')' => depth -= 1,
                b',' if depth == 0 => {
                    args.push(self.src[piece_start..self.pos].trim().to_string());
                    piece_start = self.pos + 1;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }

    /// Parse `[return-type tokens] name ( params )` after an attribute run.
    /// Return-type tokens are identifiers and `*`; the identifier directly
    /// followed by `(` is the function name.
    fn parse_declarator(&mut self) -> Option<(String, String)> {
        loop {
            self.skip_whitespace();
            if self.try_consume(b'*') {
                continue;
            }
            let ident = self.read_identifier();
            if ident.is_empty() {
                return None;
            }
            self.skip_whitespace();
            if self.try_consume(b'(') {
                let params = self.read_balanced_params()?;
                return Some((ident.to_string(), params));
            }
        }
    }

    /// Read parameter text up to the matching `)`, depth-aware.
    fn read_balanced_params(&mut self) -> Option<String> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            let ch = self.peek()?;
            match ch {
                b'(' => depth += 1,
                b')' if depth == 0 => {
                    let params = self.src[start..self.pos].trim().to_string();
                    self.pos += 1;
                    return Some(params);
                }
                b')' => depth -= 1,
                _ => {}
            }
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments() {
        let src = "a /* gone\nstill gone */ b // tail\nc";
        assert_eq!(strip_comments(src), "a  b \nc");
    }

    #[test]
    fn test_strip_unterminated_block_comment() {
        assert_eq!(strip_comments("a /* never ends"), "a ");
    }

    #[test]
    fn test_single_attribute_no_args() {
        let src = "__attribute__((rvp4_parser))\nvoid parse_vlan(phv_t *phv) {}";
        let funcs = extract_annotated_fns(src);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "parse_vlan");
        assert_eq!(funcs[0].attrs, vec![Attribute::new("rvp4_parser", vec![])]);
        assert_eq!(funcs[0].params, "phv_t *phv");
    }

    #[test]
    fn test_attribute_run_with_args() {
        let src = "\
__attribute__((rvp4_table))
__attribute__((rvp4_lpm))
__attribute__((rvp4_stage(0)))
__attribute__((rvp4_size(65536)))
void table_ipv4_lpm(phv_t *phv, metadata_t *meta) {}
";
        let funcs = extract_annotated_fns(src);
        assert_eq!(funcs.len(), 1);
        let f = &funcs[0];
        assert_eq!(f.name, "table_ipv4_lpm");
        assert_eq!(f.attrs.len(), 4);
        assert_eq!(f.attrs[2], Attribute::new("rvp4_stage", vec!["0".into()]));
        assert_eq!(f.attrs[3], Attribute::new("rvp4_size", vec!["65536".into()]));
    }

    #[test]
    fn test_multiple_specs_in_one_block() {
        let src = "__attribute__((rvp4_table, rvp4_stage(7))) void t(void);";
        let funcs = extract_annotated_fns(src);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].attrs.len(), 2);
        assert_eq!(funcs[0].attrs[1].args, vec!["7".to_string()]);
    }

    #[test]
    fn test_nested_parens_in_args() {
        let src = "__attribute__((rvp4_key(hash(ipv4_src, ipv4_dst), eth_type))) void t(void);";
        let funcs = extract_annotated_fns(src);
        assert_eq!(funcs.len(), 1);
        assert_eq!(
            funcs[0].attrs[0].args,
            vec!["hash(ipv4_src, ipv4_dst)".to_string(), "eth_type".to_string()]
        );
    }

    #[test]
    fn test_unannotated_function_not_reported() {
        let src = "void helper(int x) { return; }";
        assert!(extract_annotated_fns(src).is_empty());
    }

    #[test]
    fn test_struct_field_annotations_not_reported() {
        // Field attributes trail the declarator, so no function shape follows.
        let src = "\
typedef struct {
    uint8_t  eth_dst[6]   __attribute__((rvp4_phv_field));
    uint16_t eth_type     __attribute__((rvp4_phv_field));
} phv_t;
";
        assert!(extract_annotated_fns(src).is_empty());
    }

    #[test]
    fn test_malformed_attribute_skipped_silently() {
        // Unbalanced inner paren: the whole candidate degrades to nothing.
        let src = "__attribute__((rvp4_table(  )\nvoid broken(void);\n\
                   __attribute__((rvp4_action))\nvoid ok(metadata_t *m);";
        let funcs = extract_annotated_fns(src);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "ok");
    }

    #[test]
    fn test_comment_between_attribute_and_function() {
        let src = "__attribute__((rvp4_parser))\n/* parse the v6 header */\nvoid parse_ipv6(phv_t *p);";
        let funcs = extract_annotated_fns(src);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "parse_ipv6");
    }

    #[test]
    fn test_commented_out_annotation_ignored() {
        let src = "// __attribute__((rvp4_table))\n// void table_old(void);\n";
        assert!(extract_annotated_fns(src).is_empty());
    }

    #[test]
    fn test_pointer_return_type() {
        let src = "__attribute__((rvp4_action)) static uint8_t *act_peek(metadata_t *m);";
        let funcs = extract_annotated_fns(src);
        assert_eq!(funcs.len(), 1);
        assert_eq!(funcs[0].name, "act_peek");
    }

    #[test]
    fn test_empty_arg_list_yields_no_args() {
        let src = "__attribute__((rvp4_size())) __attribute__((rvp4_table)) void t(void);";
        let funcs = extract_annotated_fns(src);
        assert_eq!(funcs.len(), 1);
        assert!(funcs[0].attrs[0].args.is_empty());
    }
}
