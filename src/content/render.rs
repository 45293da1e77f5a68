//! Body rendering and slug helpers for the in-memory repository.

/// Tags that already form a block and must not be wrapped in `<p>`
const BLOCK_TAGS: &[&str] = &[
    "<p", "<div", "<h1", "<h2", "<h3", "<h4", "<h5", "<h6", "<ul", "<ol", "<li", "<blockquote",
    "<pre", "<figure", "<table", "<hr", "<section", "<!--",
];

/// Turn plain text paragraphs into HTML.
///
/// Blank lines separate paragraphs; single newlines inside a paragraph
/// become `<br />`. Chunks that already start with a block tag pass through.
pub fn autop(body: &str) -> String {
    let normalized = body.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in normalized.lines() {
        if line.trim().is_empty() {
            flush(&mut current, &mut out);
        } else {
            current.push(line.trim_end());
        }
    }
    flush(&mut current, &mut out);

    out.join("\n")
}

fn flush(lines: &mut Vec<&str>, out: &mut Vec<String>) {
    if lines.is_empty() {
        return;
    }

    let chunk = lines.join("\n");
    lines.clear();

    let lowered = chunk.trim_start().to_ascii_lowercase();
    if BLOCK_TAGS.iter().any(|tag| lowered.starts_with(tag)) {
        out.push(chunk);
    } else {
        out.push(format!("<p>{}</p>", chunk.replace('\n', "<br />\n")));
    }
}

/// Derive a URL slug from a title
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut dash = false;

    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
