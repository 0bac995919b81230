use crate::compiler::parser::{lua_token_kind::LuaTokenKind, reader::SourceRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LuaTokenData {
    pub kind: LuaTokenKind,
    pub range: SourceRange,
    /// Line number at the START of this token (1-based).
    pub line: u32,
}

impl LuaTokenData {
    pub fn new(kind: LuaTokenKind, range: SourceRange, line: u32) -> Self {
        LuaTokenData { kind, range, line }
    }
}
