//! Markdown rendering for finalized answers

use pulldown_cmark::{html, Event, Options, Parser};

/// Text-to-markup transform applied to the final answer of a turn
pub trait Renderer: Send + Sync {
    fn render(&self, text: &str) -> String;
}

/// Markdown to HTML, with any raw HTML in the input escaped as text
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, text: &str) -> String {
        let options = Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS;

        // Model output is untrusted; never pass markup through.
        let events = Parser::new_ext(text, options).map(|event| match event {
            Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
            other => other,
        });

        let mut out = String::with_capacity(text.len() * 3 / 2);
        html::push_html(&mut out, events);
        out
    }
}

/// Passes text through unchanged
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRenderer;

#[cfg(test)]
impl Renderer for IdentityRenderer {
    fn render(&self, text: &str) -> String {
        text.to_string()
    }
}
