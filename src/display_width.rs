use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Terminal columns taken by one character. Control characters count as zero.
pub fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

pub fn max_width<'a>(items: impl IntoIterator<Item = &'a str>, min: usize) -> usize {
    items
        .into_iter()
        .map(display_width)
        .fold(min, usize::max)
}
