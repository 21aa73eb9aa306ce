//! Line breaking and emoji segmentation.
//!
//! Widths come from a caller-supplied measure, normally the font tables of
//! the request's faces. `estimated_advance` covers characters that no loaded
//! face has a glyph for.

/// A run of text or a single emoji grapheme cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Emoji(&'a str),
}

const ZWJ: char = '\u{200D}';

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

fn is_emoji_start(c: char) -> bool {
    matches!(c as u32,
        0x1F000..=0x1FAFF
        | 0x2600..=0x27BF
        | 0x2300..=0x23FF
        | 0x2B05..=0x2B07
        | 0x2B1B..=0x2B1C
        | 0x2B50
        | 0x2B55
        | 0x3030
        | 0x303D
        | 0x3297
        | 0x3299)
}

fn is_emoji_modifier(c: char) -> bool {
    matches!(c as u32,
        0xFE0F
        | 0x1F3FB..=0x1F3FF
        | 0x20E3
        | 0xE0020..=0xE007F)
}

/// Split text into plain runs and emoji clusters (ZWJ sequences, skin tones,
/// flags and tag sequences kept whole).
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    let mut chars = text.char_indices().peekable();
    let mut run_start = 0;

    while let Some((start, c)) = chars.next() {
        if !is_emoji_start(c) {
            continue;
        }
        if run_start < start {
            out.push(Segment::Text(&text[run_start..start]));
        }

        let mut end = start + c.len_utf8();
        let mut regional = usize::from(is_regional_indicator(c));
        while let Some(&(idx, next)) = chars.peek() {
            if is_emoji_modifier(next) {
                end = idx + next.len_utf8();
                chars.next();
            } else if next == ZWJ {
                let mut lookahead = chars.clone();
                lookahead.next();
                match lookahead.peek() {
                    Some(&(joined_idx, joined)) if is_emoji_start(joined) => {
                        end = joined_idx + joined.len_utf8();
                        chars.next();
                        chars.next();
                    }
                    _ => break,
                }
            } else if regional == 1 && is_regional_indicator(next) {
                regional += 1;
                end = idx + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        out.push(Segment::Emoji(&text[start..end]));
        run_start = end;
    }

    if run_start < text.len() {
        out.push(Segment::Text(&text[run_start..]));
    }
    out
}

fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6)
}

/// Advance in em units for a character no loaded face covers.
pub fn estimated_advance(c: char, font_weight: u16) -> f32 {
    let em = match c {
        ' ' => 0.28,
        'i' | 'j' | 'l' | '.' | ',' | ':' | ';' | '\'' | '|' | '!' => 0.28,
        'f' | 't' | 'r' | 'I' | '(' | ')' | '[' | ']' | '-' => 0.38,
        'm' | 'w' => 0.85,
        'M' | 'W' => 0.95,
        'A'..='Z' => 0.68,
        '0'..='9' => 0.56,
        c if c.is_ascii() => 0.54,
        c if is_wide(c) => 1.0,
        _ => 0.6,
    };
    if font_weight >= 600 {
        em * 1.05
    } else {
        em
    }
}

/// Collapse whitespace runs to single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A wrapped line and its measured width.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub text: String,
    pub width: f32,
}

/// Greedy word wrap. Words wider than `max_width` get a line of their own.
pub fn wrap<F>(text: &str, max_width: f32, mut measure: F) -> Vec<Line>
where
    F: FnMut(&str) -> f32,
{
    let space = measure(" ");
    let mut lines = Vec::new();
    let mut current = Line {
        text: String::new(),
        width: 0.0,
    };

    for word in text.split(' ').filter(|w| !w.is_empty()) {
        let word_width = measure(word);
        if current.text.is_empty() {
            current.text.push_str(word);
            current.width = word_width;
        } else if current.width + space + word_width <= max_width + 0.01 {
            current.text.push(' ');
            current.text.push_str(word);
            current.width += space + word_width;
        } else {
            let text = std::mem::take(&mut current.text);
            lines.push(Line {
                text,
                width: current.width,
            });
            current.text.push_str(word);
            current.width = word_width;
        }
    }
    if !current.text.is_empty() {
        lines.push(current);
    }
    lines
}
