// Lua pattern matcher
// Modeled after the reference lstrlib machinery: a MatchState over raw
// bytes, a fixed capture array, recursion-bounded backtracking. No AST;
// the pattern is interpreted in place.

use super::class::{match_bracket_class, match_class};

pub const MAX_CAPTURES: usize = 32;
const CAP_UNFINISHED: isize = -1;
const CAP_POSITION: isize = -2;
const MAX_MATCH_DEPTH: usize = 220;

#[derive(Clone, Copy)]
struct Capture {
    start: usize,
    /// Length, or CAP_UNFINISHED / CAP_POSITION.
    len: isize,
}

pub struct MatchState<'a> {
    pub src: &'a [u8],
    pub pat: &'a [u8],
    level: usize,
    captures: [Capture; MAX_CAPTURES],
    depth: usize,
}

/// A finished capture: either a byte span or a position (from `()`).
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureValue {
    Span(usize, usize),
    Position(usize),
}

/// One successful match: the whole span plus its captures.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub start: usize,
    pub end: usize,
    pub captures: Vec<CaptureValue>,
    /// Whether the pattern had explicit `(...)` captures.
    pub has_captures: bool,
}

enum DefaultOutcome {
    /// Element matched with no quantifier: advance to pattern index.
    Advance(usize),
    Done(Option<usize>),
}

impl<'a> MatchState<'a> {
    pub fn new(src: &'a [u8], pat: &'a [u8]) -> Self {
        MatchState {
            src,
            pat,
            level: 0,
            captures: [Capture { start: 0, len: 0 }; MAX_CAPTURES],
            depth: 0,
        }
    }

    fn reset(&mut self) {
        self.level = 0;
        self.depth = 0;
    }

    /// The whole-pattern match attempt at byte offset `s`.
    fn try_at(&mut self, s: usize) -> Result<Option<usize>, String> {
        self.reset();
        let p = if self.pat.first() == Some(&b'^') { 1 } else { 0 };
        self.do_match(s, p)
    }

    fn do_match(&mut self, mut s: usize, mut p: usize) -> Result<Option<usize>, String> {
        self.depth += 1;
        if self.depth > MAX_MATCH_DEPTH {
            self.depth -= 1;
            return Err("pattern too complex".to_string());
        }
        let result = self.do_match_inner(&mut s, &mut p);
        self.depth -= 1;
        result
    }

    fn do_match_inner(&mut self, s: &mut usize, p: &mut usize) -> Result<Option<usize>, String> {
        loop {
            if *p >= self.pat.len() {
                return Ok(Some(*s));
            }
            match self.pat[*p] {
                b'(' => {
                    return if self.pat.get(*p + 1) == Some(&b')') {
                        self.start_capture(*s, *p + 2, CAP_POSITION)
                    } else {
                        self.start_capture(*s, *p + 1, CAP_UNFINISHED)
                    };
                }
                b')' => {
                    return self.end_capture(*s, *p + 1);
                }
                b'$' if *p + 1 == self.pat.len() => {
                    return Ok(if *s == self.src.len() { Some(*s) } else { None });
                }
                b'%' => match self.pat.get(*p + 1) {
                    Some(b'b') => {
                        match self.match_balance(*s, *p + 2)? {
                            Some(next_s) => {
                                *s = next_s;
                                *p += 4;
                                continue;
                            }
                            None => return Ok(None),
                        }
                    }
                    Some(b'f') => {
                        *p += 2;
                        if self.pat.get(*p) != Some(&b'[') {
                            return Err("missing '[' after '%f' in pattern".to_string());
                        }
                        let ep = self.class_end(*p)?;
                        let previous = if *s == 0 { 0 } else { self.src[*s - 1] };
                        let current = if *s < self.src.len() { self.src[*s] } else { 0 };
                        if !match_bracket_class(previous, self.pat, *p, ep)
                            && match_bracket_class(current, self.pat, *p, ep)
                        {
                            *p = ep;
                            continue;
                        }
                        return Ok(None);
                    }
                    Some(d) if d.is_ascii_digit() => {
                        match self.match_capture(*s, (d - b'0') as usize)? {
                            Some(next_s) => {
                                *s = next_s;
                                *p += 2;
                                continue;
                            }
                            None => return Ok(None),
                        }
                    }
                    _ => match self.default_match(*s, *p)? {
                        DefaultOutcome::Advance(ep) => {
                            *s += 1;
                            *p = ep;
                        }
                        DefaultOutcome::Done(result) => return Ok(result),
                    },
                },
                _ => match self.default_match(*s, *p)? {
                    DefaultOutcome::Advance(ep) => {
                        *s += 1;
                        *p = ep;
                    }
                    DefaultOutcome::Done(result) => return Ok(result),
                },
            }
        }
    }

    /// Single pattern element followed by an optional quantifier. A
    /// quantifier-free element that matches just advances the cursor, so
    /// long literal patterns cost no recursion depth.
    fn default_match(&mut self, s: usize, p: usize) -> Result<DefaultOutcome, String> {
        let ep = self.class_end(p)?;
        let matched = s < self.src.len() && self.single_match(self.src[s], p, ep);

        let result = match self.pat.get(ep) {
            Some(b'?') => {
                if matched {
                    if let Some(result) = self.do_match(s + 1, ep + 1)? {
                        return Ok(DefaultOutcome::Done(Some(result)));
                    }
                }
                self.do_match(s, ep + 1)?
            }
            Some(b'+') => {
                if matched {
                    self.max_expand(s + 1, p, ep)?
                } else {
                    None
                }
            }
            Some(b'*') => self.max_expand(s, p, ep)?,
            Some(b'-') => self.min_expand(s, p, ep)?,
            _ => {
                return Ok(if matched {
                    DefaultOutcome::Advance(ep)
                } else {
                    DefaultOutcome::Done(None)
                });
            }
        };
        Ok(DefaultOutcome::Done(result))
    }

    fn single_match(&self, c: u8, p: usize, ep: usize) -> bool {
        match self.pat[p] {
            b'.' => true,
            b'%' => match_class(c, self.pat[p + 1]),
            b'[' => match_bracket_class(c, self.pat, p, ep),
            literal => literal == c,
        }
    }

    /// Index just past the pattern element starting at `p`.
    fn class_end(&self, p: usize) -> Result<usize, String> {
        match self.pat[p] {
            b'%' => {
                if p + 1 >= self.pat.len() {
                    Err("malformed pattern (ends with '%')".to_string())
                } else {
                    Ok(p + 2)
                }
            }
            b'[' => {
                let mut i = p + 1;
                if self.pat.get(i) == Some(&b'^') {
                    i += 1;
                }
                // A ']' as the very first set character is a literal
                let first = i;
                loop {
                    if i >= self.pat.len() {
                        return Err("malformed pattern (missing ']')".to_string());
                    }
                    let c = self.pat[i];
                    i += 1;
                    if c == b'%' {
                        if i >= self.pat.len() {
                            return Err("malformed pattern (ends with '%')".to_string());
                        }
                        i += 1;
                    } else if c == b']' && i - 1 > first {
                        return Ok(i);
                    }
                }
            }
            _ => Ok(p + 1),
        }
    }

    fn max_expand(&mut self, s: usize, p: usize, ep: usize) -> Result<Option<usize>, String> {
        let mut count = 0usize;
        while s + count < self.src.len() && self.single_match(self.src[s + count], p, ep) {
            count += 1;
        }
        loop {
            if let Some(result) = self.do_match(s + count, ep + 1)? {
                return Ok(Some(result));
            }
            if count == 0 {
                return Ok(None);
            }
            count -= 1;
        }
    }

    fn min_expand(&mut self, mut s: usize, p: usize, ep: usize) -> Result<Option<usize>, String> {
        loop {
            if let Some(result) = self.do_match(s, ep + 1)? {
                return Ok(Some(result));
            }
            if s < self.src.len() && self.single_match(self.src[s], p, ep) {
                s += 1;
            } else {
                return Ok(None);
            }
        }
    }

    fn start_capture(
        &mut self,
        s: usize,
        p: usize,
        what: isize,
    ) -> Result<Option<usize>, String> {
        if self.level >= MAX_CAPTURES {
            return Err("too many captures".to_string());
        }
        self.captures[self.level] = Capture { start: s, len: what };
        self.level += 1;
        let result = self.do_match(s, p)?;
        if result.is_none() {
            self.level -= 1;
        }
        Ok(result)
    }

    fn end_capture(&mut self, s: usize, p: usize) -> Result<Option<usize>, String> {
        let index = self.unfinished_capture()?;
        self.captures[index].len = (s - self.captures[index].start) as isize;
        let result = self.do_match(s, p)?;
        if result.is_none() {
            self.captures[index].len = CAP_UNFINISHED;
        }
        Ok(result)
    }

    fn unfinished_capture(&self) -> Result<usize, String> {
        for i in (0..self.level).rev() {
            if self.captures[i].len == CAP_UNFINISHED {
                return Ok(i);
            }
        }
        Err("invalid pattern capture".to_string())
    }

    fn match_capture(&mut self, s: usize, index: usize) -> Result<Option<usize>, String> {
        if index == 0 || index > self.level || self.captures[index - 1].len < 0 {
            return Err(format!("invalid capture index %{}", index));
        }
        let cap = self.captures[index - 1];
        let len = cap.len as usize;
        if self.src.len() - s >= len && self.src[cap.start..cap.start + len] == self.src[s..s + len]
        {
            Ok(Some(s + len))
        } else {
            Ok(None)
        }
    }

    /// `%bxy` balanced match.
    fn match_balance(&mut self, s: usize, p: usize) -> Result<Option<usize>, String> {
        if p + 1 >= self.pat.len() {
            return Err("malformed pattern (missing arguments to '%b')".to_string());
        }
        if s >= self.src.len() || self.src[s] != self.pat[p] {
            return Ok(None);
        }
        let open = self.pat[p];
        let close = self.pat[p + 1];
        let mut balance = 1;
        let mut i = s + 1;
        while i < self.src.len() {
            if self.src[i] == close {
                balance -= 1;
                if balance == 0 {
                    return Ok(Some(i + 1));
                }
            } else if self.src[i] == open {
                balance += 1;
            }
            i += 1;
        }
        Ok(None)
    }

    /// Captures of a finished match; with no explicit captures the whole
    /// match stands in as capture 1.
    fn finished_captures(&self, start: usize, end: usize) -> Vec<CaptureValue> {
        if self.level == 0 {
            return vec![CaptureValue::Span(start, end)];
        }
        (0..self.level)
            .map(|i| {
                let cap = self.captures[i];
                if cap.len == CAP_POSITION {
                    CaptureValue::Position(cap.start + 1)
                } else {
                    CaptureValue::Span(cap.start, cap.start + cap.len.max(0) as usize)
                }
            })
            .collect()
    }
}

/// Find the first match of `pat` in `src` at or after `init`.
pub fn pattern_find(
    src: &[u8],
    pat: &[u8],
    init: usize,
) -> Result<Option<MatchResult>, String> {
    let anchored = pat.first() == Some(&b'^');
    let mut state = MatchState::new(src, pat);
    let mut s = init.min(src.len());
    loop {
        if let Some(end) = state.try_at(s)? {
            let has_captures = state.level > 0;
            let captures = state.finished_captures(s, end);
            return Ok(Some(MatchResult {
                start: s,
                end,
                captures,
                has_captures,
            }));
        }
        if anchored || s >= src.len() {
            return Ok(None);
        }
        s += 1;
    }
}

/// True when the pattern has no special characters (plain `find`).
pub fn is_plain_pattern(pat: &[u8]) -> bool {
    !pat.iter()
        .any(|b| matches!(b, b'^' | b'$' | b'*' | b'+' | b'?' | b'.' | b'(' | b')' | b'[' | b']' | b'%' | b'-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_span(src: &str, pat: &str) -> Option<(usize, usize)> {
        pattern_find(src.as_bytes(), pat.as_bytes(), 0)
            .unwrap()
            .map(|m| (m.start, m.end))
    }

    #[test]
    fn literal_and_classes() {
        assert_eq!(find_span("hello world", "world"), Some((6, 11)));
        assert_eq!(find_span("abc123", "%d+"), Some((3, 6)));
        assert_eq!(find_span("abc", "%a%a%a"), Some((0, 3)));
        assert_eq!(find_span("abc", "%d"), None);
    }

    #[test]
    fn anchors_and_quantifiers() {
        assert_eq!(find_span("aaa", "^a*$"), Some((0, 3)));
        assert_eq!(find_span("abc", "^b"), None);
        assert_eq!(find_span("<<x>>", "<(.-)>"), Some((0, 4)));
    }

    #[test]
    fn captures() {
        let m = pattern_find(b"key=value", b"(%w+)=(%w+)", 0)
            .unwrap()
            .unwrap();
        assert_eq!(m.captures.len(), 2);
        assert_eq!(m.captures[0], CaptureValue::Span(0, 3));
        assert_eq!(m.captures[1], CaptureValue::Span(4, 9));
    }

    #[test]
    fn balanced_and_frontier() {
        assert_eq!(find_span("(foo(bar))", "%b()"), Some((0, 10)));
        assert_eq!(find_span("THE (quick) fox", "%f[%a]%a+"), Some((0, 3)));
    }

    #[test]
    fn sets_and_ranges() {
        assert_eq!(find_span("x9", "[a-z][0-9]"), Some((0, 2)));
        assert_eq!(find_span("x9", "[^0-9]"), Some((0, 1)));
    }

    #[test]
    fn back_reference() {
        assert_eq!(find_span("abcabc", "(abc)%1"), Some((0, 6)));
        assert_eq!(find_span("abcabd", "(abc)%1"), None);
    }
}
