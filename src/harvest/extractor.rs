use crate::harvest::types::Completeness;

/// Split one raw recognized-text block into ordered candidate items.
///
/// Non-blank lines are trimmed and accumulated into the current block; a
/// blank line closes the block as one item. A block still open at the end
/// of input is emitted too, but flagged `Incomplete` because the viewport
/// edge may have cut it off -- only a trailing blank line proves the last
/// block ended on screen. No other normalization happens: items stay
/// opaque strings.
pub fn extract(raw_text: &str) -> Vec<(String, Completeness)> {
    let mut items: Vec<(String, Completeness)> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in raw_text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !current.is_empty() {
                items.push((current.join("\n"), Completeness::Complete));
                current.clear();
            }
        } else {
            current.push(trimmed);
        }
    }

    if !current.is_empty() {
        items.push((current.join("\n"), Completeness::Incomplete));
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_nothing() {
        assert!(extract("").is_empty());
    }

    #[test]
    fn blank_only_input_yields_nothing() {
        assert!(extract("\n \n\t\n").is_empty());
    }

    #[test]
    fn blank_line_closes_blocks() {
        let items = extract("a\nb\n\nc\n\n");
        assert_eq!(
            items,
            vec![
                ("a\nb".to_string(), Completeness::Complete),
                ("c".to_string(), Completeness::Complete),
            ]
        );
    }

    #[test]
    fn unterminated_tail_is_incomplete() {
        let items = extract("a\nb");
        assert_eq!(items, vec![("a\nb".to_string(), Completeness::Incomplete)]);
    }

    #[test]
    fn trailing_newline_alone_does_not_close_the_block() {
        // A newline ends the line but only a blank line ends the block.
        let items = extract("a\n\nc\n");
        assert_eq!(
            items,
            vec![
                ("a".to_string(), Completeness::Complete),
                ("c".to_string(), Completeness::Incomplete),
            ]
        );
    }

    #[test]
    fn lines_are_trimmed() {
        let items = extract("  padded  \n\tentry\t\n\n");
        assert_eq!(
            items,
            vec![("padded\nentry".to_string(), Completeness::Complete)]
        );
    }
}
