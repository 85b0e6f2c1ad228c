// src/ui/glyphs.rs
//! Blocky 5x7 caps for banner labels, drawn as solid quads.
use crate::ui::actors::{self, Actor};

const COLS: usize = 5;
const ROWS: usize = 7;

#[rustfmt::skip]
const GLYPHS: &[(char, [&str; ROWS])] = &[
    ('A', [" ### ", "#   #", "#   #", "#####", "#   #", "#   #", "#   #"]),
    ('B', ["#### ", "#   #", "#   #", "#### ", "#   #", "#   #", "#### "]),
    ('D', ["#### ", "#   #", "#   #", "#   #", "#   #", "#   #", "#### "]),
    ('E', ["#####", "#    ", "#    ", "#### ", "#    ", "#    ", "#####"]),
    ('F', ["#####", "#    ", "#    ", "#### ", "#    ", "#    ", "#    "]),
    ('G', [" ####", "#    ", "#    ", "#  ##", "#   #", "#   #", " ####"]),
    ('H', ["#   #", "#   #", "#   #", "#####", "#   #", "#   #", "#   #"]),
    ('I', ["#####", "  #  ", "  #  ", "  #  ", "  #  ", "  #  ", "#####"]),
    ('L', ["#    ", "#    ", "#    ", "#    ", "#    ", "#    ", "#####"]),
    ('O', [" ### ", "#   #", "#   #", "#   #", "#   #", "#   #", " ### "]),
    ('P', ["#### ", "#   #", "#   #", "#### ", "#    ", "#    ", "#    "]),
    ('Q', [" ### ", "#   #", "#   #", "#   #", "# # #", "#  # ", " ## #"]),
    ('S', [" ####", "#    ", "#    ", " ### ", "    #", "    #", "#### "]),
    ('T', ["#####", "  #  ", "  #  ", "  #  ", "  #  ", "  #  ", "  #  "]),
    ('U', ["#   #", "#   #", "#   #", "#   #", "#   #", "#   #", " ### "]),
    ('Y', ["#   #", "#   #", " # # ", "  #  ", "  #  ", "  #  ", "  #  "]),
];

fn rows_for(c: char) -> Option<&'static [&'static str; ROWS]> {
    GLYPHS.iter().find(|(g, _)| *g == c).map(|(_, rows)| rows)
}

/// Width of `text` in pixels at `cell` pixels per dot.
pub fn measure(text: &str, cell: f32) -> f32 {
    let n = text.chars().count();
    if n == 0 {
        return 0.0;
    }
    (n * (COLS + 1) - 1) as f32 * cell
}

/// Quads spelling `text` centered on (`cx`, `cy`). Unknown characters
/// leave a blank cell. Runs of lit dots in a row share one quad.
pub fn label(text: &str, cx: f32, cy: f32, cell: f32, color: [f32; 4], z: i16) -> Vec<Actor> {
    let mut out = Vec::new();
    let left = cx - measure(text, cell) / 2.0;
    let top = cy - ROWS as f32 * cell / 2.0;
    for (i, c) in text.chars().enumerate() {
        let Some(rows) = rows_for(c.to_ascii_uppercase()) else { continue };
        let gx = left + (i * (COLS + 1)) as f32 * cell;
        for (r, row) in rows.iter().enumerate() {
            let bytes = row.as_bytes();
            let mut col = 0;
            while col < COLS {
                if bytes[col] != b'#' {
                    col += 1;
                    continue;
                }
                let start = col;
                while col < COLS && bytes[col] == b'#' {
                    col += 1;
                }
                out.push(actors::quad(
                    gx + start as f32 * cell,
                    top + r as f32 * cell,
                    (col - start) as f32 * cell,
                    cell,
                    color,
                    z,
                ));
            }
        }
    }
    out
}
