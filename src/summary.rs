use crate::parser::TAGS;

/// Prose the model wrote before its first tagged line.
///
/// The boundary is the earliest occurrence of any record tag, so a reply
/// that opens with rankings or chart data never leaks them into the
/// summary. Without any tag the whole reply is the summary.
pub fn extract_summary(text: &str) -> &str {
    let boundary = TAGS
        .iter()
        .filter_map(|tag| text.find(tag))
        .min()
        .unwrap_or(text.len());

    let prefix = &text[..boundary];
    // Drop a partial line such as a bullet that precedes the tag
    let prefix = if boundary < text.len() {
        prefix.rfind('\n').map_or("", |newline| &prefix[..newline])
    } else {
        prefix
    };

    prefix.trim()
}
