// SPDX-FileCopyrightText: 2026 PrepodavAI Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTML document assembly for printing.

use prepodavai_core::RenderInput;

const PRINT_CSS: &str = "\
@page { size: A4; margin: 18mm 16mm; }
body { font-family: 'DejaVu Sans', 'Noto Sans', Arial, sans-serif; font-size: 12pt; line-height: 1.45; color: #111; }
h1, h2, h3 { page-break-after: avoid; }
p { margin: 0 0 0.7em; }
pre, code { font-family: 'DejaVu Sans Mono', monospace; white-space: pre-wrap; }
table { border-collapse: collapse; } td, th { border: 1px solid #999; padding: 4px 6px; }
";

/// Escape text for inclusion in HTML content.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Blank-line separated paragraphs; single newlines become `<br>`.
fn paragraphs(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape_html(p).replace('\n', "<br>\n")))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Whether the HTML is already a full document rather than a fragment.
fn is_document(html: &str) -> bool {
    let head = html.trim_start().get(..200).unwrap_or(html.trim_start());
    let lower = head.to_ascii_lowercase();
    lower.starts_with("<!doctype") || lower.starts_with("<html")
}

/// Whether the content contains TeX math delimiters.
pub fn contains_math(content: &str) -> bool {
    if content.contains("$$") || content.contains("\\(") || content.contains("\\[") {
        return true;
    }
    content.lines().any(has_inline_math)
}

/// `$...$` where the opening dollar is followed by a non-space and the closing
/// one is preceded by a non-space and not followed by a digit. Rules out
/// prices such as "$5 and $3".
fn has_inline_math(line: &str) -> bool {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let opens = chars[i] == '$' && chars.get(i + 1).is_some_and(|c| !c.is_whitespace());
        if opens {
            let Some(offset) = chars[i + 1..].iter().position(|c| *c == '$') else {
                return false;
            };
            let close = i + 1 + offset;
            let before = chars[close - 1];
            let digit_after = chars.get(close + 1).is_some_and(|c| c.is_ascii_digit());
            if close > i + 1 && !before.is_whitespace() && !digit_after {
                return true;
            }
            i = close;
        }
        i += 1;
    }
    false
}

fn mathjax_head(mathjax_url: &str) -> String {
    format!(
        "<script>window.MathJax = {{ tex: {{ inlineMath: [['$','$'],['\\\\(','\\\\)']] }}, \
         startup: {{ typeset: true }} }};</script>\n\
         <script id=\"MathJax-script\" src=\"{}\"></script>",
        escape_html(mathjax_url)
    )
}

fn wrap(body: &str, math: Option<&str>) -> String {
    let script = math.map(mathjax_head).unwrap_or_default();
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>{PRINT_CSS}</style>\n{script}\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    )
}

fn inject_into_head(document: &str, snippet: &str) -> String {
    let lower = document.to_ascii_lowercase();
    match lower.find("</head>") {
        Some(pos) => format!("{}{}\n{}", &document[..pos], snippet, &document[pos..]),
        None => match lower.find("<body") {
            Some(pos) => format!("{}<head>{}</head>{}", &document[..pos], snippet, &document[pos..]),
            None => format!("{snippet}\n{document}"),
        },
    }
}

/// A print-ready HTML page and whether it needs math typesetting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPage {
    pub html: String,
    pub has_math: bool,
}

/// Build the HTML page for `input`. The MathJax script is added only when
/// math delimiters are present.
pub fn prepare(input: &RenderInput, mathjax_url: &str) -> PreparedPage {
    match input {
        RenderInput::Text(text) => {
            let has_math = contains_math(text);
            PreparedPage {
                html: wrap(&paragraphs(text), has_math.then_some(mathjax_url)),
                has_math,
            }
        }
        RenderInput::Html(html) => {
            let has_math = contains_math(html);
            let html = if is_document(html) {
                if has_math {
                    inject_into_head(html, &mathjax_head(mathjax_url))
                } else {
                    html.clone()
                }
            } else {
                wrap(html, has_math.then_some(mathjax_url))
            };
            PreparedPage { html, has_math }
        }
    }
}
