use std::path::PathBuf;

use colored::Colorize;

use self::lexer::Span;

pub mod ast;
pub mod intern;
pub mod lexer;
pub mod parser;

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

impl SourceFile {
    pub fn from_memory(contents: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            origin: SourceFileOrigin::Memory,
        }
    }

    pub fn value_of_span(&self, span: Span) -> &str {
        &self.contents[span.start..span.end]
    }

    /// 1-based line number containing the byte at `position`
    pub fn row_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());

        self.contents[..position].matches('\n').count() + 1
    }

    /// 1-based column of the byte at `position` within its line
    pub fn column_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());
        let line_start = self.line_start(position);

        self.contents[line_start..position].chars().count() + 1
    }

    pub fn format_span_position(&self, span: Span) -> String {
        format!(
            "{}:{}:{}",
            self.origin,
            self.row_for_position(span.start),
            self.column_for_position(span.start)
        )
    }

    /// Renders the line containing the start of `span` with a caret underline
    /// beneath the spanned characters.
    pub fn render_span(&self, span: Span) -> String {
        let start = span.start.min(self.contents.len());
        let line_start = self.line_start(start);
        let line_end = self.contents[start..]
            .find('\n')
            .map(|offset| start + offset)
            .unwrap_or(self.contents.len());

        let line = &self.contents[line_start..line_end];
        let row = self.row_for_position(start).to_string();
        let gutter = " ".repeat(row.len());

        let padding = self.contents[line_start..start].chars().count();
        let width = self.contents[start..span.end.clamp(start, line_end)]
            .chars()
            .count()
            .max(1);

        format!(
            "{gutter} {}\n{} {} {line}\n{gutter} {} {}{}",
            "|".blue(),
            row.blue(),
            "|".blue(),
            "|".blue(),
            " ".repeat(padding),
            "^".repeat(width).red()
        )
    }

    pub fn highlight_span(&self, span: Span) {
        eprintln!("{}", self.render_span(span));
    }

    fn line_start(&self, position: usize) -> usize {
        self.contents[..position]
            .rfind('\n')
            .map(|index| index + 1)
            .unwrap_or(0)
    }
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    Memory,
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::Memory => f.write_str("<memory>"),
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_are_one_based() {
        let source = SourceFile::from_memory("main = {\n    exscribe x;\n}");
        let x = source.contents.rfind('x').unwrap();

        assert_eq!(source.row_for_position(0), 1);
        assert_eq!(source.column_for_position(0), 1);
        assert_eq!(source.row_for_position(x), 2);
        assert_eq!(source.column_for_position(x), 14);
        assert_eq!(source.format_span_position(Span::new(x, x + 1)), "<memory>:2:14");
    }

    #[test]
    fn rendered_span_underlines_the_offending_text() {
        let source = SourceFile::from_memory("let x = 1;\nlet y = nope;\n");
        let start = source.contents.find("nope").unwrap();
        let rendered = strip_ansi_escapes::strip_str(source.render_span(Span::new(start, start + 4)));

        assert_eq!(rendered, "  |\n2 | let y = nope;\n  |         ^^^^");
    }
}
