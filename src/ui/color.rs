// src/ui/color.rs

/// Accepts "#rgb", "#rgba", "#rrggbb", "#rrggbbaa" (or without '#').
/// Panics on invalid input, which in a `const` is a compile error.
pub const fn rgba_hex(s: &str) -> [f32; 4] {
    const fn nib(b: u8) -> u8 {
        match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => 10 + (b - b'a'),
            b'A'..=b'F' => 10 + (b - b'A'),
            _ => panic!("invalid hex digit"),
        }
    }
    const fn byte2(h: u8, l: u8) -> u8 { (nib(h) << 4) | nib(l) }
    const fn rep(n: u8) -> u8 { (nib(n) << 4) | nib(n) }

    let bytes = s.as_bytes();
    let off = if !bytes.is_empty() && bytes[0] == b'#' { 1 } else { 0 };

    let (r, g, bl, a) = match bytes.len() - off {
        3 => (rep(bytes[off]), rep(bytes[off + 1]), rep(bytes[off + 2]), 0xFF),
        4 => (rep(bytes[off]), rep(bytes[off + 1]), rep(bytes[off + 2]), rep(bytes[off + 3])),
        6 => (
            byte2(bytes[off], bytes[off + 1]),
            byte2(bytes[off + 2], bytes[off + 3]),
            byte2(bytes[off + 4], bytes[off + 5]),
            0xFF,
        ),
        8 => (
            byte2(bytes[off], bytes[off + 1]),
            byte2(bytes[off + 2], bytes[off + 3]),
            byte2(bytes[off + 4], bytes[off + 5]),
            byte2(bytes[off + 6], bytes[off + 7]),
        ),
        _ => panic!("hex must be 3/4/6/8 digits"),
    };

    [r as f32 / 255.0, g as f32 / 255.0, bl as f32 / 255.0, a as f32 / 255.0]
}

/// Same color with alpha replaced.
#[inline(always)]
pub const fn with_alpha(c: [f32; 4], a: f32) -> [f32; 4] {
    [c[0], c[1], c[2], a]
}
