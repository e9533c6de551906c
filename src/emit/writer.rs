//! Indentation-aware writer for generated C# text.
//!
//! Tracks the indentation level and whether the cursor sits at the start of a line, so drivers can write
//! fragments without managing whitespace themselves.

/// Spaces per indentation level.
pub const INDENT_WIDTH: usize = 4;

/// Writer that builds one generated source file.
pub struct SourceWriter {
    output: String,
    indent_level: usize,
    at_line_start: bool,
    documentation: bool,
}

impl SourceWriter {
    /// Create a writer. `documentation` controls whether [`doc`](Self::doc) emits anything.
    pub fn new(documentation: bool) -> Self {
        Self {
            output: String::new(),
            indent_level: 0,
            at_line_start: true,
            documentation,
        }
    }

    /// Finish writing and return the text.
    pub fn finish(self) -> String {
        self.output
    }

    pub fn indent(&mut self) {
        self.indent_level += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    pub fn current_indent(&self) -> usize {
        self.indent_level
    }

    fn write_indent(&mut self) {
        if self.at_line_start {
            for _ in 0..(self.indent_level * INDENT_WIDTH) {
                self.output.push(' ');
            }
            self.at_line_start = false;
        }
    }

    /// Write text without a newline.
    pub fn write(&mut self, s: &str) {
        if s.is_empty() {
            return;
        }
        self.write_indent();
        self.output.push_str(s);
    }

    /// Write text followed by a newline.
    pub fn writeln(&mut self, s: &str) {
        self.write(s);
        self.newline();
    }

    pub fn newline(&mut self) {
        self.output.push('\n');
        self.at_line_start = true;
    }

    /// Separate two members with one empty line. Never produces two empty lines in a row, and nothing
    /// directly after an opening brace.
    pub fn blank_line(&mut self) {
        if !self.at_line_start {
            self.newline();
        }
        if self.output.is_empty() || self.output.ends_with("\n\n") || self.output.ends_with("{\n") {
            return;
        }
        self.newline();
    }

    /// Write `header` and an opening brace on its own line, then indent.
    pub fn open_block(&mut self, header: &str) {
        self.writeln(header);
        self.writeln("{");
        self.indent();
    }

    /// Dedent and write the closing brace.
    pub fn close_block(&mut self) {
        self.close_block_with("");
    }

    /// Dedent and write the closing brace followed by `suffix` (`;` for initializers).
    pub fn close_block_with(&mut self, suffix: &str) {
        if !self.at_line_start {
            self.newline();
        }
        self.dedent();
        self.write("}");
        self.writeln(suffix);
    }

    /// Write a `<summary>` comment when documentation is enabled.
    pub fn doc(&mut self, summary: &str) {
        if !self.documentation {
            return;
        }
        self.writeln("/// <summary>");
        for line in summary.lines() {
            self.writeln(&format!("/// {line}"));
        }
        self.writeln("/// </summary>");
    }

    pub fn documentation(&self) -> bool {
        self.documentation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========================================
    // Write tests
    // ========================================

    #[test]
    fn test_write_at_top_level_has_no_indent() {
        let mut writer = SourceWriter::new(true);
        writer.writeln("namespace Game");
        assert_eq!(writer.finish(), "namespace Game\n");
    }

    #[test]
    fn test_fragments_share_one_indent() {
        let mut writer = SourceWriter::new(true);
        writer.indent();
        writer.write("public ");
        writer.write("int");
        writer.newline();
        assert_eq!(writer.finish(), "    public int\n");
    }

    #[test]
    fn test_dedent_saturates() {
        let mut writer = SourceWriter::new(true);
        writer.dedent();
        assert_eq!(writer.current_indent(), 0);
    }

    // ========================================
    // Block tests
    // ========================================

    #[test]
    fn test_nested_blocks() {
        let mut writer = SourceWriter::new(true);
        writer.open_block("namespace Game");
        writer.open_block("partial class Enemy");
        writer.writeln("int x;");
        writer.close_block();
        writer.close_block();
        assert_eq!(
            writer.finish(),
            "namespace Game\n{\n    partial class Enemy\n    {\n        int x;\n    }\n}\n"
        );
    }

    #[test]
    fn test_blank_lines_are_collapsed() {
        let mut writer = SourceWriter::new(true);
        writer.open_block("class A");
        writer.blank_line();
        writer.writeln("int a;");
        writer.blank_line();
        writer.blank_line();
        writer.writeln("int b;");
        writer.close_block();
        assert_eq!(writer.finish(), "class A\n{\n    int a;\n\n    int b;\n}\n");
    }

    // ========================================
    // Documentation tests
    // ========================================

    #[test]
    fn test_doc_respects_setting() {
        let mut on = SourceWriter::new(true);
        on.doc("Enabled instances.");
        assert_eq!(on.finish(), "/// <summary>\n/// Enabled instances.\n/// </summary>\n");

        let mut off = SourceWriter::new(false);
        off.doc("Enabled instances.");
        assert_eq!(off.finish(), "");
    }
}
