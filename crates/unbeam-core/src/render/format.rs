//! Line-join and indentation helpers for multi-line constructs.

/// Replace every newline in `text` with `replacement`, re-aligning an
/// already-rendered block to a deeper indentation.
pub fn adjust_newlines(text: &str, replacement: &str) -> String {
    text.replace('\n', replacement)
}

/// Indent every line of `text` by `spaces` spaces.
pub fn indent(text: &str, spaces: usize) -> String {
    let prefix = " ".repeat(spaces);

    text.lines()
        .map(|line| {
            if line.is_empty() {
                line.to_string()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
