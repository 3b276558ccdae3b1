use std::collections::HashSet;

/// Tags the rich-text widget may produce and the public site may render.
const RICH_TEXT_TAGS: [&str; 31] = [
    "h1", "h2", "h3", "h4", "h5", "h6", "b", "strong", "i", "em", "u", "p", "br",
    "a", "ul", "ol", "li", "blockquote", "code", "pre", "hr", "img", "table",
    "thead", "tbody", "tr", "th", "td", "s", "span", "figure",
];

const RICH_TEXT_ATTRIBUTES: [&str; 8] = ["src", "href", "alt", "title", "class", "width", "height", "align"];

/// Cleans HTML coming from the rich-text editor: keeps formatting tags, drops
/// scripts, event handlers, inline styles and anything else not allow-listed.
pub fn sanitize_rich_text(html_input: &str) -> String {
    let tags: HashSet<&str> = RICH_TEXT_TAGS.iter().copied().collect();
    let attributes: HashSet<&str> = RICH_TEXT_ATTRIBUTES.iter().copied().collect();
    ammonia::Builder::new()
        .tags(tags)
        .generic_attributes(attributes)
        .link_rel(Some("noopener noreferrer"))
        .clean(html_input)
        .to_string()
}

/// Strips all HTML tags from input (for titles, names, plain descriptions).
/// The result is plain text: entities are decoded so templates escape it once.
pub fn strip_all_html(input: &str) -> String {
    let cleaned = ammonia::Builder::new()
        .tags(HashSet::new())
        .clean(input)
        .to_string();
    html_escape::decode_html_entities(&cleaned).trim().to_string()
}
