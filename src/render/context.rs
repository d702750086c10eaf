//! ConTeXt output primitives.
//!
//! [`ContextWriter`] accumulates ConTeXt source from a stream of text and
//! structure calls. Text is escaped with commands that stay valid inside
//! `\startchapter[title={...}]` and inside ascii mode, so cleaned text can be
//! placed in either.

/// Returns the ConTeXt spelling of `c` when it is a special character.
pub fn escape_char(c: char) -> Option<&'static str> {
    Some(match c {
        '\\' => "\\letterbackslash{}",
        '{' => "\\letteropenbrace{}",
        '}' => "\\letterclosebrace{}",
        '#' => "\\#",
        '$' => "\\$",
        '%' => "\\%",
        '&' => "\\&",
        '_' => "\\_",
        '^' => "\\letterhat{}",
        '~' => "\\lettertilde{}",
        '|' => "\\letterbar{}",
        _ => return None,
    })
}

/// Escapes every ConTeXt special character in `s`.
pub fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match escape_char(c) {
            Some(escaped) => out.push_str(escaped),
            None => out.push(c),
        }
    }
    out
}

const ITEM: &str = "\\item ";

/// Builds ConTeXt source with HTML-like whitespace handling.
///
/// Runs of whitespace in text collapse to one space; paragraph breaks collapse
/// to one blank line; leading and trailing whitespace is dropped by
/// [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct ContextWriter {
    out: String,
    pending_space: bool,
    list_depth: usize,
}

impl ContextWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends escaped text. Whitespace is collapsed and control characters are dropped.
    pub fn text(&mut self, s: &str) {
        for c in s.chars() {
            if c.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            if c.is_control() {
                continue;
            }
            self.flush_space();
            match escape_char(c) {
                Some(escaped) => self.out.push_str(escaped),
                None => self.out.push(c),
            }
        }
    }

    /// Appends text verbatim apart from escaping, keeping its whitespace.
    pub fn preformatted(&mut self, s: &str) {
        self.flush_space();
        for c in s.chars() {
            if c == '\n' {
                self.out.push_str("\\crlf\n");
            } else if c.is_control() && c != '\t' {
                continue;
            } else {
                match escape_char(c) {
                    Some(escaped) => self.out.push_str(escaped),
                    None => self.out.push(c),
                }
            }
        }
    }

    /// Opens a group with a font switch such as `\em` or `\bf`.
    pub fn open_group(&mut self, switch: &str) {
        self.flush_space();
        self.out.push('{');
        self.out.push_str(switch);
        self.out.push(' ');
    }

    /// Closes the current group. Pending whitespace is emitted after the brace.
    pub fn close_group(&mut self) {
        self.out.push('}');
    }

    pub fn line_break(&mut self) {
        self.pending_space = false;
        self.trim_trailing_spaces();
        if !self.out.is_empty() {
            self.out.push_str("\\crlf\n");
        }
    }

    /// Ends the paragraph. Does nothing directly after [`item`](Self::item).
    pub fn paragraph_break(&mut self) {
        self.pending_space = false;
        if self.out.ends_with(ITEM) {
            return;
        }
        self.trim_trailing_spaces();
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            if self.out.ends_with('\n') {
                self.out.push('\n');
            } else {
                self.out.push_str("\n\n");
            }
        }
    }

    /// Emits a command such as `\startitemize` on a line of its own.
    pub fn command_line(&mut self, command: &str) {
        self.pending_space = false;
        self.trim_trailing_spaces();
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.out.push_str(command);
        self.out.push('\n');
    }

    /// Opens an itemization, numbered or bulleted.
    pub fn start_list(&mut self, numbered: bool) {
        self.command_line(if numbered {
            "\\startitemize[n]"
        } else {
            "\\startitemize"
        });
        self.list_depth += 1;
    }

    pub fn stop_list(&mut self) {
        self.list_depth = self.list_depth.saturating_sub(1);
        let trimmed = self.out.trim_end().len();
        self.out.truncate(trimmed);
        self.command_line("\\stopitemize");
    }

    /// Starts a list item: `\item ` on a fresh line. Outside a list the item
    /// is set as a plain paragraph.
    pub fn item(&mut self) {
        if self.list_depth == 0 {
            self.paragraph_break();
            return;
        }
        self.pending_space = false;
        self.trim_trailing_spaces();
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.out.push('\n');
        }
        self.out.push_str(ITEM);
    }

    pub fn finish(self) -> String {
        collapse_blank_lines(self.out.trim())
    }

    fn flush_space(&mut self) {
        if self.pending_space
            && !self.out.is_empty()
            && !self.out.ends_with(|c: char| c == ' ' || c == '\n')
        {
            self.out.push(' ');
        }
        self.pending_space = false;
    }

    fn trim_trailing_spaces(&mut self) {
        let trimmed = self.out.trim_end_matches([' ', '\t']).len();
        self.out.truncate(trimmed);
    }
}

/// Trims every line and keeps at most one blank line in a row.
fn collapse_blank_lines(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut blank_run = 0usize;
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() {
            blank_run += 1;
            if blank_run == 1 {
                out.push('\n');
            }
        } else {
            blank_run = 0;
            out.push_str(line);
            out.push('\n');
        }
    }
    out.trim_end_matches('\n').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_text_specials() {
        assert_eq!(escape_text("50% of #1 & co"), "50\\% of \\#1 \\& co");
        assert_eq!(escape_text("a_b$c"), "a\\_b\\$c");
        assert_eq!(
            escape_text("{x}"),
            "\\letteropenbrace{}x\\letterclosebrace{}"
        );
        assert_eq!(escape_text("C:\\dir"), "C:\\letterbackslash{}dir");
        assert_eq!(escape_text("plain text"), "plain text");
    }

    #[test]
    fn test_text_collapses_whitespace() {
        let mut w = ContextWriter::new();
        w.text("  hello \n\t world  ");
        assert_eq!(w.finish(), "hello world");
    }

    #[test]
    fn test_text_drops_control_chars() {
        let mut w = ContextWriter::new();
        w.text("bell\u{7}less\u{1b}");
        assert_eq!(w.finish(), "bellless");
    }

    #[test]
    fn test_groups_and_spacing() {
        let mut w = ContextWriter::new();
        w.text("a ");
        w.open_group("\\em");
        w.text("b ");
        w.close_group();
        w.text("c");
        assert_eq!(w.finish(), "a {\\em b} c");
    }

    #[test]
    fn test_paragraph_breaks_collapse() {
        let mut w = ContextWriter::new();
        w.paragraph_break();
        w.text("one");
        w.paragraph_break();
        w.paragraph_break();
        w.text("two");
        w.paragraph_break();
        assert_eq!(w.finish(), "one\n\ntwo");
    }

    #[test]
    fn test_items() {
        let mut w = ContextWriter::new();
        w.text("intro");
        w.start_list(false);
        w.item();
        w.text(" first ");
        w.item();
        w.paragraph_break();
        w.text("second");
        w.paragraph_break();
        w.stop_list();
        assert_eq!(
            w.finish(),
            "intro\n\\startitemize\n\\item first\n\\item second\n\\stopitemize"
        );
    }

    #[test]
    fn test_item_outside_list_is_paragraph() {
        let mut w = ContextWriter::new();
        w.text("intro");
        w.item();
        w.text("loose");
        assert_eq!(w.finish(), "intro\n\nloose");
    }

    #[test]
    fn test_preformatted_keeps_lines() {
        let mut w = ContextWriter::new();
        w.preformatted("let x = 1;\nx % 2");
        assert_eq!(w.finish(), "let x = 1;\\crlf\nx \\% 2");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n b \n\nc"), "a\n\nb\n\nc");
        assert_eq!(collapse_blank_lines(""), "");
    }
}
