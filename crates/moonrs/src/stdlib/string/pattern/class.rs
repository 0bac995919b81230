// Character class matching for Lua patterns
// Handles %a %c %d %g %l %p %s %u %w %x and their uppercase inverses,
// plus [set] matching. Byte-oriented, like all Lua string operations.

/// Does byte `c` belong to class letter `cl` (lowercase)?
#[inline]
pub fn match_class(c: u8, cl: u8) -> bool {
    let result = match cl.to_ascii_lowercase() {
        b'a' => c.is_ascii_alphabetic(),
        b'c' => c.is_ascii_control(),
        b'd' => c.is_ascii_digit(),
        b'g' => c.is_ascii_graphic(),
        b'l' => c.is_ascii_lowercase(),
        b'p' => c.is_ascii_punctuation(),
        b's' => c.is_ascii_whitespace() || c == 0x0B,
        b'u' => c.is_ascii_uppercase(),
        b'w' => c.is_ascii_alphanumeric(),
        b'x' => c.is_ascii_hexdigit(),
        _ => return c == cl, // not a class letter: literal match
    };
    if cl.is_ascii_uppercase() { !result } else { result }
}

/// Match `c` against the set starting at `pat[p]` (the '['), with the
/// set body ending right before `ep` (the index past the closing ']').
pub fn match_bracket_class(c: u8, pat: &[u8], p: usize, ep: usize) -> bool {
    let mut p = p + 1;
    let invert = pat.get(p) == Some(&b'^');
    if invert {
        p += 1;
    }
    let end = ep - 1; // position of ']'
    let mut found = false;
    while p < end {
        if pat[p] == b'%' && p + 1 < end {
            p += 1;
            if match_class(c, pat[p]) {
                found = true;
            }
            p += 1;
        } else if p + 2 < end && pat[p + 1] == b'-' {
            // Range a-z
            if pat[p] <= c && c <= pat[p + 2] {
                found = true;
            }
            p += 3;
        } else {
            if pat[p] == c {
                found = true;
            }
            p += 1;
        }
    }
    found != invert
}
