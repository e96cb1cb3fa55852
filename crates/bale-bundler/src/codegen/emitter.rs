//! Text assembly with position tracking.
//!
//! Generated code is spliced together from slices of module text and short
//! synthesized fragments. Every copied token start and every edit point
//! records a mapping back to the module's original source, passing through
//! the module's transpile map when it has one.

use bale_graph::oxc::Span;
use bale_graph::{Mapping, ModuleRecord, TokenMap};

/// A module's text together with its index in the unit's source list.
#[derive(Clone, Copy)]
pub(crate) struct MappedSource<'a> {
    pub record: &'a ModuleRecord,
    pub index: u32,
}

/// Builds generated text and its mapping tokens.
#[derive(Debug, Default)]
pub(crate) struct Emitter {
    code: String,
    line: u32,
    /// Column in UTF-16 code units.
    column: u32,
    tokens: Vec<Mapping>,
}

/// Replacement text for one span of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Splice {
    pub span: Span,
    pub text: String,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn ends_with_newline(&self) -> bool {
        self.code.is_empty() || self.code.ends_with('\n')
    }

    /// Append synthesized text. It carries no mappings.
    pub fn push(&mut self, text: &str) {
        for ch in text.chars() {
            self.advance(ch);
        }
        self.code.push_str(text);
    }

    pub fn newline(&mut self) {
        self.push("\n");
    }

    /// Start a new line unless the output already ends with one.
    pub fn ensure_newline(&mut self) {
        if !self.ends_with_newline() {
            self.newline();
        }
    }

    /// Append synthesized text that stands for the code at `offset`.
    pub fn push_mapped(&mut self, source: MappedSource<'_>, offset: u32, text: &str) {
        let (line, column) = source.record.line_index.line_column(offset, &source.record.code);
        self.add_token(source, line, column);
        self.push(text);
    }

    /// Copy `start..end` of the module's code verbatim.
    pub fn copy(&mut self, source: MappedSource<'_>, start: u32, end: u32) {
        if start >= end {
            return;
        }
        let code = &source.record.code;
        let Some(text) = code.get(start as usize..end as usize) else {
            return;
        };
        let (mut src_line, mut src_column) = source.record.line_index.line_column(start, code);
        let mut token_start = true;
        for ch in text.chars() {
            if ch.is_whitespace() {
                token_start = true;
            } else if token_start {
                self.add_token(source, src_line, src_column);
                token_start = false;
            }
            if ch == '\n' {
                src_line += 1;
                src_column = 0;
            } else {
                src_column += ch.len_utf16() as u32;
            }
            self.advance(ch);
        }
        self.code.push_str(text);
    }

    /// Copy `start..end`, substituting `splices` (sorted, non-overlapping,
    /// inside the range).
    pub fn copy_with(&mut self, source: MappedSource<'_>, start: u32, end: u32, splices: &[Splice]) {
        let mut cursor = start;
        for splice in splices {
            if splice.span.start < cursor || splice.span.end > end {
                continue;
            }
            self.copy(source, cursor, splice.span.start);
            self.push_mapped(source, splice.span.start, &splice.text);
            cursor = splice.span.end;
        }
        self.copy(source, cursor, end);
    }

    pub fn finish(self) -> (String, TokenMap) {
        (self.code, TokenMap::from_tokens(self.tokens))
    }

    fn advance(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += ch.len_utf16() as u32;
        }
    }

    /// Record a token for position (`line`, `column`) of the module's code.
    fn add_token(&mut self, source: MappedSource<'_>, line: u32, column: u32) {
        let (src_line, src_col) = match &source.record.code_map {
            None => (line, column),
            Some(map) => match map.lookup(line, column) {
                Some(hit) => (hit.src_line, hit.src_col + (column - hit.dst_col)),
                None => return,
            },
        };
        self.tokens.push(Mapping {
            dst_line: self.line,
            dst_col: self.column,
            source: source.index,
            src_line,
            src_col,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bale_graph::{ModuleId, SourceKind, analyze_module};
    use std::sync::Arc;

    fn record(source: &str) -> ModuleRecord {
        analyze_module(ModuleId::file("/src/a.js"), SourceKind::Internal, Arc::from(source)).unwrap()
    }

    #[test]
    fn test_copy_maps_token_starts() {
        let record = record("const a = 1;\nconst b = a;\n");
        let source = MappedSource {
            record: &record,
            index: 0,
        };
        let mut emitter = Emitter::new();
        emitter.push("// header\n");
        emitter.copy(source, 13, 25);
        let (code, map) = emitter.finish();

        assert_eq!(code, "// header\nconst b = a;");
        let first = map.lookup(1, 0).unwrap();
        assert_eq!((first.src_line, first.src_col), (1, 0));
        let last = map.lookup(1, 10).unwrap();
        assert_eq!((last.src_line, last.src_col), (1, 10));
    }

    #[test]
    fn test_splices_replace_spans() {
        let record = record("use(a, a);\n");
        let source = MappedSource {
            record: &record,
            index: 0,
        };
        let splices = vec![
            Splice {
                span: Span::new(4, 5),
                text: "a$1".into(),
            },
            Splice {
                span: Span::new(7, 8),
                text: "a$1".into(),
            },
        ];
        let mut emitter = Emitter::new();
        emitter.copy_with(source, 0, 10, &splices);
        let (code, map) = emitter.finish();

        assert_eq!(code, "use(a$1, a$1);");
        let second = map.lookup(0, 9).unwrap();
        assert_eq!(second.src_col, 7);
    }
}
