//! RATTA_RLE layer bitmaps.
//!
//! A layer is a stream of `(color, length)` byte pairs. Lengths with the high
//! bit set are held back and either merged with the following pair (same
//! color) or flushed as a long run on their own.

use crate::error::{NoteError, NoteResult};

pub const COLOR_BLACK: u8 = 0x61;
pub const COLOR_BACKGROUND: u8 = 0x62;
pub const COLOR_DARK_GRAY: u8 = 0x63;
pub const COLOR_GRAY: u8 = 0x64;
pub const COLOR_WHITE: u8 = 0x65;
pub const COLOR_MARKER_BLACK: u8 = 0x66;
pub const COLOR_MARKER_DARK_GRAY: u8 = 0x67;
pub const COLOR_MARKER_GRAY: u8 = 0x68;

const SPECIAL_LENGTH_MARKER: u8 = 0xff;
const SPECIAL_LENGTH: usize = 0x4000;
const SPECIAL_LENGTH_FOR_BLANK: usize = 0x400;

const GRAY_BLACK: u8 = 0x00;
const GRAY_DARK: u8 = 0x9d;
const GRAY_LIGHT: u8 = 0xc9;
pub const GRAY_WHITE: u8 = 0xfe;

/// Gray level for a color code, `None` for the transparent background.
pub fn gray_level(color: u8) -> Option<u8> {
    match color {
        COLOR_BACKGROUND => None,
        COLOR_BLACK | COLOR_MARKER_BLACK => Some(GRAY_BLACK),
        COLOR_DARK_GRAY | COLOR_MARKER_DARK_GRAY => Some(GRAY_DARK),
        COLOR_GRAY | COLOR_MARKER_GRAY => Some(GRAY_LIGHT),
        COLOR_WHITE => Some(GRAY_WHITE),
        raw => Some(raw),
    }
}

/// Expands an encoded layer into one color code per pixel.
pub fn decode(data: &[u8], width: u32, height: u32, all_blank: bool) -> NoteResult<Vec<u8>> {
    let expected = width as usize * height as usize;
    let mut out = Vec::with_capacity(expected);
    let mut held: Option<(u8, u8)> = None;

    for pair in data.chunks(2) {
        let &[color, length] = pair else {
            return Err(NoteError::malformed("rle stream ends with a dangling byte"));
        };

        if let Some((held_color, held_length)) = held.take() {
            if color == held_color {
                let run = 1 + length as usize + held_run(held_length, 7);
                push_run(&mut out, color, run, expected)?;
                continue;
            }
            push_run(&mut out, held_color, held_run(held_length, 7), expected)?;
        }

        if length == SPECIAL_LENGTH_MARKER {
            let run = if all_blank {
                SPECIAL_LENGTH_FOR_BLANK
            } else {
                SPECIAL_LENGTH
            };
            push_run(&mut out, color, run, expected)?;
        } else if length & 0x80 != 0 {
            held = Some((color, length));
        } else {
            push_run(&mut out, color, length as usize + 1, expected)?;
        }
    }

    if let Some((color, length)) = held {
        let run = tail_run(length, expected - out.len());
        push_run(&mut out, color, run, expected)?;
    }

    if out.len() != expected {
        return Err(NoteError::malformed(format!(
            "rle stream produced {} pixels, expected {expected}",
            out.len()
        )));
    }
    Ok(out)
}

fn held_run(length: u8, shift: u32) -> usize {
    ((length & 0x7f) as usize + 1) << shift
}

// A held run at the end of the stream is clipped to the largest power-of-two
// multiple that still fits the page.
fn tail_run(length: u8, remaining: usize) -> usize {
    (0..8)
        .rev()
        .map(|shift| held_run(length, shift))
        .find(|run| *run <= remaining)
        .unwrap_or(0)
}

fn push_run(out: &mut Vec<u8>, color: u8, run: usize, expected: usize) -> NoteResult<()> {
    if out.len() + run > expected {
        return Err(NoteError::malformed(format!(
            "rle run overflows the page ({} + {run} > {expected})",
            out.len()
        )));
    }
    out.resize(out.len() + run, color);
    Ok(())
}
