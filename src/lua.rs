use std::path::Path;

use anyhow::{Context, Result};

use crate::pipeline::ConvertedEntry;

/// Escape a title for a double-quoted Lua string.
pub fn escape_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out
}

/// Wrap text in a Lua long bracket. Plain `[[...]]` unless the text would
/// close it early, in which case the lowest safe `[=[...]=]` level is used.
pub fn long_bracket(text: &str) -> String {
    let probe = format!("{}]", text);
    let mut level = 0;
    loop {
        let eq = "=".repeat(level);
        let close = format!("]{}]", eq);
        if !probe.contains(&close) {
            return format!("[{eq}[{text}{close}");
        }
        level += 1;
    }
}

fn render_entry(entry: &ConvertedEntry) -> String {
    format!(
        "  {{ title = \"{}\", walkthrough = {} }}",
        escape_title(&entry.title),
        long_bracket(&entry.walkthrough)
    )
}

/// Render all entries as a single `return { ... }` expression.
pub fn serialize(entries: &[ConvertedEntry]) -> String {
    let body: Vec<String> = entries.iter().map(render_entry).collect();
    format!("return {{\n{}\n}}", body.join(",\n"))
}

/// Write the table in one go, replacing any existing file.
pub fn write_table(path: &Path, entries: &[ConvertedEntry]) -> Result<()> {
    let lua = serialize(entries);
    std::fs::write(path, lua)
        .with_context(|| format!("Failed to write Lua table to {}", path.display()))
}

// ── Tests ──
