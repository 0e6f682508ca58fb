//! Default collaborators: a conservative markdown renderer for the web
//! preview and a naive whitespace segmenter for search.

use regex::Regex;

use crate::ports::{Renderer, Segmenter};

/// Escape HTML special characters.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Renders a small markdown subset (headers, emphasis, code spans and
/// fences, links, bullets) into HTML. Escape-first: user text is escaped
/// before any tag is introduced, so nothing the user wrote survives as
/// markup.
pub struct MarkdownRenderer {
    link_re: Regex,
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            // Intentionally conservative: no nested brackets.
            link_re: Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("valid regex"),
        }
    }

    fn render_line(&self, line: &str) -> String {
        if let Some(rest) = line.strip_prefix("### ") {
            return format!("<h3>{}</h3>", self.render_inline(rest));
        }
        if let Some(rest) = line.strip_prefix("## ") {
            return format!("<h2>{}</h2>", self.render_inline(rest));
        }
        if let Some(rest) = line.strip_prefix("# ") {
            return format!("<h1>{}</h1>", self.render_inline(rest));
        }
        if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            return format!("<li>{}</li>", self.render_inline(rest));
        }
        if line.is_empty() {
            return String::new();
        }
        format!("<p>{}</p>", self.render_inline(line))
    }

    fn render_inline(&self, text: &str) -> String {
        let (text, codes) = extract_inline_codes(text);
        let mut out = escape_html(&text);

        out = replace_delimited(&out, "**", "<b>", "</b>");
        out = replace_delimited(&out, "__", "<b>", "</b>");
        out = replace_delimited(&out, "*", "<i>", "</i>");
        out = replace_delimited(&out, "_", "<i>", "</i>");

        out = self
            .link_re
            .replace_all(&out, r#"<a href="$2">$1</a>"#)
            .to_string();

        for (i, code) in codes.iter().enumerate() {
            out = out.replace(
                &format!("\0CODE{i}\0"),
                &format!("<code>{}</code>", escape_html(code)),
            );
        }
        out
    }
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for MarkdownRenderer {
    fn markdown_to_safe_html(&self, markdown: &str) -> String {
        let (text, blocks) = extract_code_blocks(markdown);

        let mut out: Vec<String> = text
            .split('\n')
            .map(|line| self.render_line(line.trim_end()))
            .filter(|line| !line.is_empty())
            .collect();

        // Wrap runs of <li> into a list.
        let mut html = String::new();
        let mut in_list = false;
        for line in out.drain(..) {
            let is_item = line.starts_with("<li>");
            if is_item && !in_list {
                html.push_str("<ul>\n");
                in_list = true;
            }
            if !is_item && in_list {
                html.push_str("</ul>\n");
                in_list = false;
            }
            html.push_str(&line);
            html.push('\n');
        }
        if in_list {
            html.push_str("</ul>\n");
        }

        for (i, block) in blocks.iter().enumerate() {
            html = html.replace(
                &format!("<p>\0BLOCK{i}\0</p>"),
                &format!("<pre>{}</pre>", escape_html(block)),
            );
        }

        html.trim_end().to_string()
    }
}

fn extract_code_blocks(input: &str) -> (String, Vec<String>) {
    let mut blocks = Vec::new();
    let mut out = Vec::new();
    let mut current: Option<String> = None;

    for line in input.split('\n') {
        if line.trim_start().starts_with("```") {
            match current.take() {
                Some(block) => {
                    out.push(format!("\0BLOCK{}\0", blocks.len()));
                    blocks.push(block.trim_end().to_string());
                }
                None => current = Some(String::new()),
            }
            continue;
        }
        match current.as_mut() {
            Some(block) => {
                block.push_str(line);
                block.push('\n');
            }
            None => out.push(line.to_string()),
        }
    }
    // An unterminated fence renders as a block anyway.
    if let Some(block) = current {
        out.push(format!("\0BLOCK{}\0", blocks.len()));
        blocks.push(block.trim_end().to_string());
    }

    (out.join("\n"), blocks)
}

fn extract_inline_codes(input: &str) -> (String, Vec<String>) {
    let mut codes = Vec::new();
    let mut out = String::new();
    let mut rest = input;

    while let Some(start) = rest.find('`') {
        let Some(len) = rest[start + 1..].find('`') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&format!("\0CODE{}\0", codes.len()));
        codes.push(rest[start + 1..start + 1 + len].to_string());
        rest = &rest[start + len + 2..];
    }
    out.push_str(rest);

    (out, codes)
}

/// Replace balanced pairs of `delim` with open/close tags. Odd occurrences
/// are left alone.
fn replace_delimited(text: &str, delim: &str, open: &str, close: &str) -> String {
    let parts: Vec<&str> = text.split(delim).collect();
    if parts.len() < 3 {
        return text.to_string();
    }

    let mut out = String::new();
    let pairs = (parts.len() - 1) / 2;
    for (i, part) in parts.iter().enumerate() {
        out.push_str(part);
        if i < parts.len() - 1 {
            if i < pairs * 2 {
                out.push_str(if i % 2 == 0 { open } else { close });
            } else {
                out.push_str(delim);
            }
        }
    }
    out
}

/// Lowercases and splits on non-alphanumeric boundaries.
///
/// The port exists because the original system used a real word segmenter;
/// this default is deliberately naive and works per whitespace-delimited
/// languages only.
pub struct WhitespaceSegmenter;

impl Segmenter for WhitespaceSegmenter {
    fn tokenize(&self, text: &str) -> String {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
