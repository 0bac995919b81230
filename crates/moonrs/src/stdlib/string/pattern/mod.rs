// Lua pattern matching: byte-oriented, no parse phase
// Modeled after the reference lstrlib: the pattern string is interpreted
// directly during matching, captures live in a fixed array, recursion is
// bounded against pathological patterns.

mod class;
mod matcher;

pub use matcher::{CaptureValue, MatchResult, pattern_find, is_plain_pattern};
