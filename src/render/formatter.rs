use crate::feed::{Entry, FeedCollection};
use std::borrow::Cow;
use std::fmt::Write;

/// Document title used when the caller does not supply one.
pub const DEFAULT_TITLE: &str = "Rss Feeds";

const PREAMBLE_START: &str = "\\usemodule[rssfeed]\n\\starttext\n";
const CLOSING: &str = "\\stoptext\n";

/// Renders a [`FeedCollection`] as one ConTeXt document.
///
/// Each entry becomes a chapter labelled with its collection key; characters
/// outside `[A-Za-z0-9._:-]` in the key are replaced with `-`. The chapter
/// title is set in ascii mode, where `#`, `%` and friends are ordinary
/// characters; content is emitted as-is because it is already ConTeXt from the
/// cleaner and may carry markup of its own.
#[derive(Debug, Clone, Copy)]
pub struct FeedFormatter<'a> {
    feeds: &'a FeedCollection,
}

impl<'a> FeedFormatter<'a> {
    pub fn new(feeds: &'a FeedCollection) -> Self {
        Self { feeds }
    }

    /// Renders the whole document. `title` is embedded verbatim.
    pub fn format(&self, title: &str) -> String {
        let mut out = String::with_capacity(256 + self.feeds.entry_count() * 512);
        out.push_str(PREAMBLE_START);
        out.push_str("\\starttitle[title={");
        out.push_str(title);
        out.push_str("}]\n    \\placelist[chapter]\n\\stoptitle\n");

        for (key, entries) in self.feeds.iter() {
            for entry in entries {
                format_entry(&mut out, key, entry);
            }
        }

        out.push_str(CLOSING);
        out
    }
}

fn is_label_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':')
}

fn chapter_label(key: &str) -> Cow<'_, str> {
    if key.chars().all(is_label_char) {
        return Cow::Borrowed(key);
    }
    Cow::Owned(
        key.chars()
            .map(|c| if is_label_char(c) { c } else { '-' })
            .collect(),
    )
}

fn format_entry(out: &mut String, key: &str, entry: &Entry) {
    // Writing into a String cannot fail
    let _ = write!(
        out,
        "\n\\startasciimode\n\\startchapter[title={{{}}}][name={{{}}}]\n\\stopasciimode\n{}\n\\stopchapter\n",
        escape_title(entry.title()),
        chapter_label(key),
        entry.content(),
    );
}

/// Makes a string safe as the `title={...}` argument of a chapter in ascii mode.
///
/// Ascii mode already neutralizes `# $ % & ^ _ ~ |`. What remains are line
/// breaks, which would end the argument early, and unbalanced braces, which
/// would swallow or close it, and a trailing lone backslash, which would
/// escape the closing brace of the argument. Line breaks become spaces; braces
/// without a partner become `\letteropenbrace{}` / `\letterclosebrace{}`; the
/// trailing backslash becomes `\letterbackslash{}`. Balanced pairs and escapes
/// produced by the cleaner are left alone.
pub fn escape_title(title: &str) -> Cow<'_, str> {
    let needs_work = title.contains(['\n', '\r'])
        || !braces_balanced(title)
        || ends_with_lone_backslash(title);
    if !needs_work {
        return Cow::Borrowed(title);
    }

    let chars: Vec<char> = title.chars().collect();
    let mut unmatched = vec![false; chars.len()];
    let mut open_stack = Vec::new();
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '{' if !is_escaped(&chars, i) => open_stack.push(i),
            '}' if !is_escaped(&chars, i) => {
                if open_stack.pop().is_none() {
                    unmatched[i] = true;
                }
            }
            _ => {}
        }
    }
    for i in open_stack {
        unmatched[i] = true;
    }

    let mut out = String::with_capacity(title.len() + 16);
    let mut last_was_break = false;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '\n' | '\r' => {
                if !last_was_break {
                    out.push(' ');
                }
                last_was_break = true;
                continue;
            }
            '{' if unmatched[i] => out.push_str("\\letteropenbrace{}"),
            '}' if unmatched[i] => out.push_str("\\letterclosebrace{}"),
            _ => out.push(c),
        }
        last_was_break = false;
    }
    if ends_with_lone_backslash(&out) {
        out.pop();
        out.push_str("\\letterbackslash{}");
    }
    Cow::Owned(out)
}

/// True when `s` ends in an odd run of backslashes.
fn ends_with_lone_backslash(s: &str) -> bool {
    s.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// True when the brace at `i` is preceded by an odd number of backslashes.
fn is_escaped(chars: &[char], i: usize) -> bool {
    chars[..i].iter().rev().take_while(|&&c| c == '\\').count() % 2 == 1
}

fn braces_balanced(s: &str) -> bool {
    let chars: Vec<char> = s.chars().collect();
    let mut depth = 0usize;
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '{' if !is_escaped(&chars, i) => depth += 1,
            '}' if !is_escaped(&chars, i) => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}
