use super::context::ContextWriter;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use scraper::{ElementRef, Html, Node};
use thiserror::Error;

/// Largest field accepted by [`ContextCleaner`] (1 MB).
pub const MAX_FIELD_BYTES: usize = 1024 * 1024;

/// Deeper HTML than this is flattened to its text.
const MAX_HTML_DEPTH: usize = 128;

/// Elements whose contents never reach the document.
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "head", "template", "svg", "object",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CleanError {
    #[error("field too large: {len} bytes (max {max} bytes)")]
    TooLarge { len: usize, max: usize },
}

/// Converts raw feed text into text that can be embedded in the output document.
pub trait TextCleaner {
    /// Converts text of unknown markup (treated as Markdown).
    fn convert_generic(&self, text: &str) -> Result<String, CleanError>;

    /// Converts an HTML fragment, dropping markup that has no document equivalent.
    fn convert_html(&self, text: &str) -> Result<String, CleanError>;
}

/// [`TextCleaner`] producing ConTeXt.
#[derive(Debug, Clone, Copy)]
pub struct ContextCleaner {
    max_input_bytes: usize,
}

impl Default for ContextCleaner {
    fn default() -> Self {
        Self {
            max_input_bytes: MAX_FIELD_BYTES,
        }
    }
}

impl ContextCleaner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_input_bytes(mut self, max: usize) -> Self {
        self.max_input_bytes = max;
        self
    }

    fn check_size(&self, text: &str) -> Result<(), CleanError> {
        if text.len() > self.max_input_bytes {
            return Err(CleanError::TooLarge {
                len: text.len(),
                max: self.max_input_bytes,
            });
        }
        Ok(())
    }
}

impl TextCleaner for ContextCleaner {
    fn convert_generic(&self, text: &str) -> Result<String, CleanError> {
        self.check_size(text)?;
        let mut writer = ContextWriter::new();
        write_markdown(&mut writer, text);
        Ok(writer.finish())
    }

    fn convert_html(&self, text: &str) -> Result<String, CleanError> {
        self.check_size(text)?;
        let mut writer = ContextWriter::new();
        write_html(&mut writer, text);
        Ok(writer.finish())
    }
}

fn write_html(writer: &mut ContextWriter, html: &str) {
    let fragment = Html::parse_fragment(html);
    write_children(writer, fragment.root_element(), 0);
}

fn write_children(writer: &mut ContextWriter, element: ElementRef, depth: usize) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => writer.text(text),
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    write_element(writer, child_ref, depth + 1);
                }
            }
            _ => {}
        }
    }
}

fn write_element(writer: &mut ContextWriter, element: ElementRef, depth: usize) {
    let name = element.value().name();
    if SKIPPED_ELEMENTS.contains(&name) {
        return;
    }
    if depth > MAX_HTML_DEPTH {
        for text in element.text() {
            writer.text(text);
        }
        return;
    }

    match name {
        "br" => writer.line_break(),
        "hr" => writer.paragraph_break(),
        "img" => {}
        "em" | "i" | "cite" | "dfn" => group(writer, element, depth, "\\em"),
        "strong" | "b" => group(writer, element, depth, "\\bf"),
        "code" | "tt" | "kbd" | "samp" => group(writer, element, depth, "\\tt"),
        "pre" => {
            writer.paragraph_break();
            writer.open_group("\\tt");
            let text: String = element.text().collect();
            writer.preformatted(text.trim_matches('\n'));
            writer.close_group();
            writer.paragraph_break();
        }
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            writer.paragraph_break();
            group(writer, element, depth, "\\bf");
            writer.paragraph_break();
        }
        "ul" | "ol" => {
            writer.start_list(name == "ol");
            write_children(writer, element, depth);
            writer.stop_list();
        }
        "li" => {
            writer.item();
            write_children(writer, element, depth);
        }
        name if is_block_element(name) => {
            writer.paragraph_break();
            write_children(writer, element, depth);
            writer.paragraph_break();
        }
        _ => write_children(writer, element, depth),
    }
}

fn group(writer: &mut ContextWriter, element: ElementRef, depth: usize, switch: &str) {
    writer.open_group(switch);
    write_children(writer, element, depth);
    writer.close_group();
}

fn is_block_element(name: &str) -> bool {
    matches!(
        name,
        "p" | "div"
            | "blockquote"
            | "section"
            | "article"
            | "header"
            | "footer"
            | "aside"
            | "figure"
            | "figcaption"
            | "table"
            | "tr"
            | "dl"
            | "dt"
            | "dd"
    )
}

fn write_markdown(writer: &mut ContextWriter, text: &str) {
    let mut code_block: Option<String> = None;
    // Block HTML arrives line by line; it is converted once the block ends
    let mut html_block = String::new();

    for event in Parser::new(text) {
        if let Some(buf) = code_block.as_mut() {
            match event {
                Event::Text(t) => buf.push_str(&t),
                Event::End(TagEnd::CodeBlock) => {
                    writer.paragraph_break();
                    writer.open_group("\\tt");
                    writer.preformatted(buf.trim_end_matches('\n'));
                    writer.close_group();
                    writer.paragraph_break();
                    code_block = None;
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Start(Tag::Paragraph) | Event::End(TagEnd::Paragraph) => {
                writer.paragraph_break()
            }
            Event::Start(Tag::Heading { .. }) => {
                writer.paragraph_break();
                writer.open_group("\\bf");
            }
            Event::End(TagEnd::Heading(_)) => {
                writer.close_group();
                writer.paragraph_break();
            }
            Event::Start(Tag::Emphasis) => writer.open_group("\\em"),
            Event::Start(Tag::Strong) => writer.open_group("\\bf"),
            Event::End(TagEnd::Emphasis) | Event::End(TagEnd::Strong) => writer.close_group(),
            Event::Start(Tag::List(start)) => writer.start_list(start.is_some()),
            Event::End(TagEnd::List(_)) => writer.stop_list(),
            Event::Start(Tag::Item) => writer.item(),
            Event::Start(Tag::CodeBlock(_)) => code_block = Some(String::new()),
            Event::Text(t) => writer.text(&t),
            Event::Code(code) => {
                writer.open_group("\\tt");
                writer.text(&code);
                writer.close_group();
            }
            Event::Html(html) => html_block.push_str(&html),
            Event::End(TagEnd::HtmlBlock) => {
                writer.paragraph_break();
                write_html(writer, &html_block);
                writer.paragraph_break();
                html_block.clear();
            }
            // Inline tags are dropped; the text between them is kept
            Event::InlineHtml(_) => {}
            Event::SoftBreak => writer.text(" "),
            Event::HardBreak => writer.line_break(),
            Event::Rule => writer.paragraph_break(),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn html(s: &str) -> String {
        ContextCleaner::new().convert_html(s).unwrap()
    }

    fn generic(s: &str) -> String {
        ContextCleaner::new().convert_generic(s).unwrap()
    }

    #[test]
    fn test_html_paragraphs_and_inline_markup() {
        assert_eq!(
            html("<p>Hello <em>big</em>\n  <strong>world</strong></p><p>Bye</p>"),
            "Hello {\\em big} {\\bf world}\n\nBye"
        );
    }

    #[test]
    fn test_html_entities_decoded_then_escaped() {
        assert_eq!(html("Fish &amp; chips &#8212; 100%"), "Fish \\& chips \u{2014} 100\\%");
        assert_eq!(html("&lt;b&gt;not bold&lt;/b&gt;"), "<b>not bold</b>");
    }

    #[test]
    fn test_html_scripts_and_images_dropped() {
        assert_eq!(
            html("<script>alert(1)</script><style>p{}</style>Text<img src=\"x.png\">"),
            "Text"
        );
    }

    #[test]
    fn test_html_links_keep_text() {
        assert_eq!(
            html("Read <a href=\"https://example.com/?a=1&b=2#x\">more</a>."),
            "Read more."
        );
    }

    #[test]
    fn test_html_lists() {
        assert_eq!(
            html("<ul><li>one</li><li>two</li></ul><ol><li>first</li></ol>"),
            "\\startitemize\n\\item one\n\\item two\n\\stopitemize\n\\startitemize[n]\n\\item first\n\\stopitemize"
        );
    }

    #[test]
    fn test_html_stray_item_is_a_paragraph() {
        assert_eq!(html("<li>stray</li>"), "stray");
        assert_eq!(html("before<li>stray</li>"), "before\n\nstray");
    }

    #[test]
    fn test_html_item_paragraph_joins_item() {
        assert_eq!(
            html("<ul><li><p>one</p></li><li>two</li></ul>"),
            "\\startitemize\n\\item one\n\n\\item two\n\\stopitemize"
        );
    }

    #[test]
    fn test_html_breaks_and_pre() {
        assert_eq!(html("a<br>b"), "a\\crlf\nb");
        assert_eq!(html("<pre>x = 1\ny = 2</pre>"), "{\\tt x = 1\\crlf\ny = 2}");
    }

    #[test]
    fn test_html_plain_text_unchanged() {
        assert_eq!(html("Hello"), "Hello");
        assert_eq!(html(""), "");
        assert_eq!(html("   \n "), "");
    }

    #[test]
    fn test_html_title_with_hash() {
        assert_eq!(html("Issue #42: {braces}"), "Issue \\#42: \\letteropenbrace{}braces\\letterclosebrace{}");
    }

    #[test]
    fn test_html_deep_nesting_flattened() {
        let input = format!("{}deep{}", "<span>".repeat(300), "</span>".repeat(300));
        assert_eq!(html(&input), "deep");
    }

    #[test]
    fn test_generic_markdown_emphasis() {
        assert_eq!(generic("Some *emphasis* and **bold**"), "Some {\\em emphasis} and {\\bf bold}");
    }

    #[test]
    fn test_generic_escapes_specials() {
        assert_eq!(generic("Tom & Jerry: 100% #1"), "Tom \\& Jerry: 100\\% \\#1");
        assert_eq!(generic("snake_case_name"), "snake\\_case\\_name");
    }

    #[test]
    fn test_generic_inline_code_and_breaks() {
        assert_eq!(generic("use `a_b`\nnext line"), "use {\\tt a\\_b} next line");
        assert_eq!(generic("para one\n\npara two"), "para one\n\npara two");
    }

    #[test]
    fn test_generic_embedded_html() {
        assert_eq!(generic("A <b>bold</b> move"), "A bold move");
    }

    #[test]
    fn test_generic_html_block() {
        assert_eq!(
            generic("Intro\n\n<div>\n<p>Inside <em>block</em></p>\n</div>\n\nOutro"),
            "Intro\n\nInside {\\em block}\n\nOutro"
        );
    }

    #[test]
    fn test_generic_lists() {
        assert_eq!(
            generic("- one\n- two"),
            "\\startitemize\n\\item one\n\\item two\n\\stopitemize"
        );
    }

    #[test]
    fn test_generic_loose_list() {
        assert_eq!(
            generic("- one\n\n- two"),
            "\\startitemize\n\\item one\n\n\\item two\n\\stopitemize"
        );
    }

    #[test]
    fn test_oversized_input_rejected() {
        let cleaner = ContextCleaner::new().with_max_input_bytes(8);
        assert_eq!(
            cleaner.convert_html("0123456789"),
            Err(CleanError::TooLarge { len: 10, max: 8 })
        );
        assert!(cleaner.convert_generic("0123456789").is_err());
        assert_eq!(cleaner.convert_generic("short").unwrap(), "short");
    }
}
