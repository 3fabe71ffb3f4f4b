//! Client-side script accumulator
//!
//! Statements appended during a render or update cycle are shipped to the
//! browser once and then cleared. Fragments are kept in append order, nothing
//! is deduplicated.

use std::fmt;

/// Append-only builder of client-side statements.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Script {
    buffer: String,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw statement fragment.
    pub fn code(&mut self, code: impl AsRef<str>) -> &mut Self {
        self.buffer.push_str(code.as_ref());
        self
    }

    pub fn console_log(&mut self, text: &str) -> &mut Self {
        self.code(format!("console.log('{}');", encode(text)))
    }

    /// Show a user visible message.
    pub fn alert(&mut self, text: &str) -> &mut Self {
        self.code(format!("alert('{}');", encode(text)))
    }

    /// Focus an input of the active page.
    ///
    /// Runs best effort: a missing element or a throwing `focus()` is
    /// swallowed on the client.
    pub fn focus(&mut self, id: &str) -> &mut Self {
        self.code(format!(
            "try {{ var f = document.querySelector('.vue-page-active #{}'); if (f) {{ f.focus(); }} }} catch(e) {{ }}",
            encode(id)
        ))
    }

    /// Navigate to another page inside the single page shell.
    pub fn navigate_to(&mut self, url: &str) -> &mut Self {
        self.code(format!("navToPage('{}');", encode(url)))
    }

    /// Full browser redirect.
    pub fn redirect_to(&mut self, url: &str) -> &mut Self {
        self.code(format!("location.href = '{}';", encode(url)))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    /// Return the accumulated text and clear the accumulator.
    pub fn flush(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.buffer)
    }
}

/// Escape `text` for use inside a single or double quoted JavaScript string.
///
/// `<`, `>` and `&` are escaped as well so the result can be embedded in an
/// inline `<script>` element.
pub fn encode(text: &str) -> String {
    let mut out = String::with_capacity(text.len());

    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }

    out
}
