//! Turns a resolved span list into display segments, and segments into markup.
//!
//! `render_segments` is the lossless step: concatenating the text of every
//! segment reproduces the input exactly. The HTML and ANSI writers below are
//! projections of that segment list for the browser and the terminal.

use std::fmt::Write as _;

use crossterm::style::{Color, Stylize};
use serde::Serialize;

use crate::span::{DisplayClass, MatchSpan, PALETTE_SIZE};

/// Keyword colours, indexed by palette slot.
pub const PALETTE: [(u8, u8, u8); PALETTE_SIZE] = [
    (255, 213, 79),
    (129, 212, 250),
    (165, 214, 167),
    (244, 143, 177),
    (206, 147, 216),
    (255, 171, 145),
    (128, 203, 196),
    (197, 202, 233),
];

/// Uniform colour of replaced-range markers.
pub const REPLACED_COLOR: (u8, u8, u8) = (255, 112, 67);

pub fn class_rgb(class: DisplayClass) -> (u8, u8, u8) {
    match class {
        DisplayClass::Keyword(color) => PALETTE[color % PALETTE_SIZE],
        DisplayClass::Replaced => REPLACED_COLOR,
    }
}

/// A run of the original text, either untouched or tagged for highlighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Segment<'a> {
    Plain {
        #[serde(rename = "plain")]
        text: &'a str,
    },
    Tagged {
        #[serde(rename = "tagged")]
        text: &'a str,
        class: DisplayClass,
    },
}

impl<'a> Segment<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Self::Plain { text } | Self::Tagged { text, .. } => text,
        }
    }

    pub fn class(&self) -> Option<DisplayClass> {
        match self {
            Self::Plain { .. } => None,
            Self::Tagged { class, .. } => Some(*class),
        }
    }
}

/// Split `text` into plain gaps and tagged spans.
///
/// `spans` must be ordered and non-overlapping, as produced by
/// [`crate::resolve::resolve_overlaps`]. Spans that do not fit the text (stale
/// offsets, overlaps, non-boundary offsets) are skipped rather than trusted.
pub fn render_segments<'a>(text: &'a str, spans: &[MatchSpan]) -> Vec<Segment<'a>> {
    let mut segments = Vec::with_capacity(spans.len() * 2 + 1);
    let mut last = 0;
    for span in spans {
        if span.start < last
            || span.end > text.len()
            || !text.is_char_boundary(span.start)
            || !text.is_char_boundary(span.end)
        {
            continue;
        }
        if span.start > last {
            segments.push(Segment::Plain { text: &text[last..span.start] });
        }
        segments.push(Segment::Tagged {
            text: &text[span.start..span.end],
            class: span.class,
        });
        last = span.end;
    }
    if last < text.len() {
        segments.push(Segment::Plain { text: &text[last..] });
    }
    segments
}

/// Concatenate segment texts; the inverse of [`render_segments`].
pub fn join_segments(segments: &[Segment<'_>]) -> String {
    segments.iter().map(Segment::text).collect()
}

/// Markup for a content-editable surface: `<mark>` per tagged segment, `<br>`
/// per line break, everything else escaped.
pub fn render_html(segments: &[Segment<'_>]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Plain { text } => push_escaped(&mut out, text),
            Segment::Tagged { text, class } => {
                let _ = write!(out, "<mark class=\"{}\">", class.css_class());
                push_escaped(&mut out, text);
                out.push_str("</mark>");
            }
        }
    }
    out
}

/// A standalone HTML page around [`render_html`], styled with the given font
/// and the highlight palette.
pub fn render_html_document(segments: &[Segment<'_>], font_family: &str, font_size: u16) -> String {
    let mut css = String::new();
    for (slot, (r, g, b)) in PALETTE.iter().enumerate() {
        let _ = writeln!(css, "mark.kw-{slot} {{ background: rgb({r}, {g}, {b}); }}");
    }
    let (r, g, b) = REPLACED_COLOR;
    let _ = writeln!(css, "mark.replaced {{ background: rgb({r}, {g}, {b}); }}");

    let mut family = String::new();
    push_escaped(&mut family, font_family);
    format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<style>\n{css}</style>\n</head>\n<body>\n<div class=\"document\" style=\"font-family: {family}; font-size: {font_size}px;\">{}</div>\n</body>\n</html>\n",
        render_html(segments)
    )
}

/// Terminal rendering with 24-bit colour escapes.
pub fn render_ansi(segments: &[Segment<'_>]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Plain { text } => out.push_str(text),
            Segment::Tagged { text, class } => {
                let (r, g, b) = class_rgb(*class);
                let styled = match class {
                    DisplayClass::Keyword(_) => text.with(Color::Rgb { r, g, b }).bold(),
                    DisplayClass::Replaced => text.on(Color::Rgb { r, g, b }).with(Color::Black),
                };
                let _ = write!(out, "{styled}");
            }
        }
    }
    out
}

fn push_escaped(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '\n' => out.push_str("<br>\n"),
            '\r' => {}
            _ => out.push(c),
        }
    }
}
