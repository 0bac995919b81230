// Lua 5.4 lexer
// Produces a token stream with byte ranges and start lines; malformed
// input is reported through RawError records and lexing continues where
// a sensible resynchronization point exists.

use crate::compiler::parser::{
    RawError, lua_token_data::LuaTokenData, lua_token_kind::LuaTokenKind,
    reader::{EOF_CHAR, Reader},
};
use crate::diagnostics::codes;

pub struct LuaTokenize<'a> {
    reader: Reader<'a>,
    line: u32,
}

impl<'a> LuaTokenize<'a> {
    pub fn new(text: &'a str) -> Self {
        LuaTokenize {
            reader: Reader::new(text),
            line: 1,
        }
    }

    pub fn tokenize(mut self, errors: &mut Vec<RawError>) -> Vec<LuaTokenData> {
        let mut tokens = vec![];

        while !self.reader.is_eof() {
            let start_line = self.line;
            let kind = self.lex(errors);
            if kind == LuaTokenKind::TkEof {
                break;
            }
            tokens.push(LuaTokenData::new(
                kind,
                self.reader.current_range(),
                start_line,
            ));
        }

        tokens
    }

    fn name_to_kind(name: &str) -> LuaTokenKind {
        match name {
            "and" => LuaTokenKind::TkAnd,
            "break" => LuaTokenKind::TkBreak,
            "do" => LuaTokenKind::TkDo,
            "else" => LuaTokenKind::TkElse,
            "elseif" => LuaTokenKind::TkElseIf,
            "end" => LuaTokenKind::TkEnd,
            "false" => LuaTokenKind::TkFalse,
            "for" => LuaTokenKind::TkFor,
            "function" => LuaTokenKind::TkFunction,
            "goto" => LuaTokenKind::TkGoto,
            "if" => LuaTokenKind::TkIf,
            "in" => LuaTokenKind::TkIn,
            "local" => LuaTokenKind::TkLocal,
            "nil" => LuaTokenKind::TkNil,
            "not" => LuaTokenKind::TkNot,
            "or" => LuaTokenKind::TkOr,
            "repeat" => LuaTokenKind::TkRepeat,
            "return" => LuaTokenKind::TkReturn,
            "then" => LuaTokenKind::TkThen,
            "true" => LuaTokenKind::TkTrue,
            "until" => LuaTokenKind::TkUntil,
            "while" => LuaTokenKind::TkWhile,
            _ => LuaTokenKind::TkName,
        }
    }

    fn error(&self, errors: &mut Vec<RawError>, code: &'static str, message: String) {
        errors.push(RawError {
            code,
            message,
            range: self.reader.current_range(),
            line: self.line,
        });
    }

    fn lex(&mut self, errors: &mut Vec<RawError>) -> LuaTokenKind {
        self.reader.reset_buff();

        match self.reader.current_char() {
            '\n' | '\r' => self.lex_new_line(),
            ' ' | '\t' | '\u{000B}' | '\u{000C}' => {
                self.reader
                    .eat_while(|ch| matches!(ch, ' ' | '\t' | '\u{000B}' | '\u{000C}'));
                LuaTokenKind::TkWhitespace
            }
            '-' => {
                self.reader.bump();
                if self.reader.current_char() != '-' {
                    return LuaTokenKind::TkMinus;
                }

                self.reader.bump();
                if self.reader.current_char() == '[' {
                    self.reader.bump();
                    let sep = self.skip_sep();
                    if self.reader.current_char() == '[' {
                        self.reader.bump();
                        self.lex_long_bracket(sep, true, errors);
                        return LuaTokenKind::TkLongComment;
                    }
                }

                self.reader.eat_while(|ch| ch != '\n' && ch != '\r');
                LuaTokenKind::TkShortComment
            }
            '[' => {
                self.reader.bump();
                if self.reader.current_char() != '[' && self.reader.current_char() != '=' {
                    return LuaTokenKind::TkLeftBracket;
                }
                let sep = self.skip_sep();
                if sep == 0 && self.reader.current_char() != '[' {
                    return LuaTokenKind::TkLeftBracket;
                }
                if self.reader.current_char() != '[' {
                    self.error(
                        errors,
                        codes::MISSING_DELIMITER,
                        "invalid long string delimiter".to_string(),
                    );
                    return LuaTokenKind::TkLongString;
                }

                self.reader.bump();
                self.lex_long_bracket(sep, false, errors);
                LuaTokenKind::TkLongString
            }
            '=' => {
                self.reader.bump();
                if self.reader.current_char() != '=' {
                    return LuaTokenKind::TkAssign;
                }
                self.reader.bump();
                LuaTokenKind::TkEq
            }
            '<' => {
                self.reader.bump();
                match self.reader.current_char() {
                    '=' => {
                        self.reader.bump();
                        LuaTokenKind::TkLe
                    }
                    '<' => {
                        self.reader.bump();
                        LuaTokenKind::TkShl
                    }
                    _ => LuaTokenKind::TkLt,
                }
            }
            '>' => {
                self.reader.bump();
                match self.reader.current_char() {
                    '=' => {
                        self.reader.bump();
                        LuaTokenKind::TkGe
                    }
                    '>' => {
                        self.reader.bump();
                        LuaTokenKind::TkShr
                    }
                    _ => LuaTokenKind::TkGt,
                }
            }
            '~' => {
                self.reader.bump();
                if self.reader.current_char() != '=' {
                    return LuaTokenKind::TkBitXor;
                }
                self.reader.bump();
                LuaTokenKind::TkNe
            }
            ':' => {
                self.reader.bump();
                if self.reader.current_char() != ':' {
                    return LuaTokenKind::TkColon;
                }
                self.reader.bump();
                LuaTokenKind::TkDbColon
            }
            '"' | '\'' => {
                let quote = self.reader.current_char();
                self.reader.bump();
                self.lex_string(quote, errors)
            }
            '.' => {
                if self.reader.next_char().is_ascii_digit() {
                    return self.lex_number(errors);
                }

                self.reader.bump();
                if self.reader.current_char() != '.' {
                    return LuaTokenKind::TkDot;
                }
                self.reader.bump();
                if self.reader.current_char() != '.' {
                    return LuaTokenKind::TkConcat;
                }
                self.reader.bump();
                LuaTokenKind::TkDots
            }
            '0'..='9' => self.lex_number(errors),
            '/' => {
                self.reader.bump();
                if self.reader.current_char() != '/' {
                    return LuaTokenKind::TkDiv;
                }
                self.reader.bump();
                LuaTokenKind::TkIDiv
            }
            '*' => {
                self.reader.bump();
                LuaTokenKind::TkMul
            }
            '+' => {
                self.reader.bump();
                LuaTokenKind::TkPlus
            }
            '%' => {
                self.reader.bump();
                LuaTokenKind::TkMod
            }
            '^' => {
                self.reader.bump();
                LuaTokenKind::TkPow
            }
            '#' => {
                // Shebang only at the very start of the chunk
                let is_line_start = self.reader.is_start_of_line();
                self.reader.bump();
                if is_line_start && self.line == 1 && self.reader.current_char() == '!' {
                    self.reader.eat_while(|ch| ch != '\n' && ch != '\r');
                    return LuaTokenKind::TkShebang;
                }
                LuaTokenKind::TkLen
            }
            '&' => {
                self.reader.bump();
                LuaTokenKind::TkBitAnd
            }
            '|' => {
                self.reader.bump();
                LuaTokenKind::TkBitOr
            }
            '(' => {
                self.reader.bump();
                LuaTokenKind::TkLeftParen
            }
            ')' => {
                self.reader.bump();
                LuaTokenKind::TkRightParen
            }
            '{' => {
                self.reader.bump();
                LuaTokenKind::TkLeftBrace
            }
            '}' => {
                self.reader.bump();
                LuaTokenKind::TkRightBrace
            }
            ']' => {
                self.reader.bump();
                LuaTokenKind::TkRightBracket
            }
            ';' => {
                self.reader.bump();
                LuaTokenKind::TkSemicolon
            }
            ',' => {
                self.reader.bump();
                LuaTokenKind::TkComma
            }
            ch if ch.is_ascii_alphabetic() || ch == '_' => {
                self.reader
                    .eat_while(|c| c.is_ascii_alphanumeric() || c == '_');
                Self::name_to_kind(self.reader.current_text())
            }
            EOF_CHAR if self.reader.is_eof() => LuaTokenKind::TkEof,
            ch => {
                self.reader.bump();
                self.error(
                    errors,
                    codes::UNEXPECTED_TOKEN,
                    format!("unexpected symbol near '{}'", ch),
                );
                LuaTokenKind::TkUnknown
            }
        }
    }

    fn lex_new_line(&mut self) -> LuaTokenKind {
        // \r, \n, \r\n and \n\r each count as one line ending
        let first = self.reader.current_char();
        self.reader.bump();
        let second = self.reader.current_char();
        if (second == '\n' || second == '\r') && second != first {
            self.reader.bump();
        }
        self.line += 1;
        LuaTokenKind::TkEndOfLine
    }

    /// Count the '=' characters of a long bracket after the first '['.
    fn skip_sep(&mut self) -> usize {
        let mut count = 0;
        while self.reader.current_char() == '=' {
            count += 1;
            self.reader.bump();
        }
        count
    }

    /// Body of a long string or comment, after the opening bracket.
    fn lex_long_bracket(&mut self, sep: usize, is_comment: bool, errors: &mut Vec<RawError>) {
        loop {
            match self.reader.current_char() {
                EOF_CHAR if self.reader.is_eof() => {
                    let (code, what) = if is_comment {
                        (codes::UNTERMINATED_COMMENT, "comment")
                    } else {
                        (codes::UNTERMINATED_STRING, "string")
                    };
                    self.error(errors, code, format!("unfinished long {}", what));
                    return;
                }
                '\n' | '\r' => {
                    self.lex_new_line();
                }
                ']' => {
                    self.reader.bump();
                    let close_sep = self.skip_sep();
                    if close_sep == sep && self.reader.current_char() == ']' {
                        self.reader.bump();
                        return;
                    }
                }
                _ => self.reader.bump(),
            }
        }
    }

    fn lex_string(&mut self, quote: char, errors: &mut Vec<RawError>) -> LuaTokenKind {
        loop {
            match self.reader.current_char() {
                c if c == quote => {
                    self.reader.bump();
                    return LuaTokenKind::TkString;
                }
                EOF_CHAR if self.reader.is_eof() => {
                    self.error(
                        errors,
                        codes::UNTERMINATED_STRING,
                        "unfinished string".to_string(),
                    );
                    return LuaTokenKind::TkString;
                }
                '\n' | '\r' => {
                    self.error(
                        errors,
                        codes::UNTERMINATED_STRING,
                        "unfinished string".to_string(),
                    );
                    return LuaTokenKind::TkString;
                }
                '\\' => {
                    self.reader.bump();
                    match self.reader.current_char() {
                        '\n' | '\r' => {
                            self.lex_new_line();
                        }
                        'z' => {
                            self.reader.bump();
                            loop {
                                match self.reader.current_char() {
                                    ' ' | '\t' | '\u{000B}' | '\u{000C}' => self.reader.bump(),
                                    '\n' | '\r' => {
                                        self.lex_new_line();
                                    }
                                    _ => break,
                                }
                            }
                        }
                        EOF_CHAR if self.reader.is_eof() => {}
                        _ => self.reader.bump(),
                    }
                }
                _ => self.reader.bump(),
            }
        }
    }

    fn lex_number(&mut self, errors: &mut Vec<RawError>) -> LuaTokenKind {
        let mut is_float = false;

        if self.reader.current_char() == '0'
            && matches!(self.reader.next_char(), 'x' | 'X')
        {
            self.reader.bump();
            self.reader.bump();
            let mut any = false;
            while self.reader.current_char().is_ascii_hexdigit() {
                any = true;
                self.reader.bump();
            }
            if self.reader.current_char() == '.' {
                is_float = true;
                self.reader.bump();
                while self.reader.current_char().is_ascii_hexdigit() {
                    any = true;
                    self.reader.bump();
                }
            }
            if !any {
                self.error(errors, codes::INVALID_NUMBER, "malformed number".to_string());
            }
            if matches!(self.reader.current_char(), 'p' | 'P') {
                is_float = true;
                self.reader.bump();
                if matches!(self.reader.current_char(), '+' | '-') {
                    self.reader.bump();
                }
                if !self.reader.current_char().is_ascii_digit() {
                    self.error(errors, codes::INVALID_NUMBER, "malformed number".to_string());
                }
                self.reader.eat_while(|c| c.is_ascii_digit());
            }
        } else {
            self.reader.eat_while(|c| c.is_ascii_digit());
            if self.reader.current_char() == '.' && self.reader.next_char() != '.' {
                is_float = true;
                self.reader.bump();
                self.reader.eat_while(|c| c.is_ascii_digit());
            }
            if matches!(self.reader.current_char(), 'e' | 'E') {
                is_float = true;
                self.reader.bump();
                if matches!(self.reader.current_char(), '+' | '-') {
                    self.reader.bump();
                }
                if !self.reader.current_char().is_ascii_digit() {
                    self.error(errors, codes::INVALID_NUMBER, "malformed number".to_string());
                }
                self.reader.eat_while(|c| c.is_ascii_digit());
            }
        }

        // Trailing identifier characters make the whole lexeme malformed,
        // matching the reference "malformed number near" behavior.
        if self.reader.current_char().is_ascii_alphanumeric() || self.reader.current_char() == '_' {
            self.reader
                .eat_while(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
            self.error(
                errors,
                codes::INVALID_NUMBER,
                format!("malformed number near '{}'", self.reader.current_text()),
            );
        }

        if is_float {
            LuaTokenKind::TkFloat
        } else {
            LuaTokenKind::TkInt
        }
    }
}
