// Parser behavior: diagnostics, recovery, round-trip rendering
use crate::compiler::{Compiler, ast_display};
use crate::diagnostics::Severity;
use crate::test::{check, run_int, run_str};

fn errors_of(source: &str) -> Vec<String> {
    match Compiler::compile(source, "test") {
        Ok(_) => Vec::new(),
        Err(diagnostics) => diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .map(|d| d.to_string())
            .collect(),
    }
}

#[test]
fn test_valid_chunks_parse() {
    for source in [
        "",
        ";",
        "return",
        "return 1, 2, 3",
        "local x <const>, y <close> = 1, nil",
        "for i = 1, 2 do end for k, v in pairs({}) do end",
        "function a.b.c:m(x, ...) return x end",
        "local t = {1; 2, [3] = 4, x = 5}",
        "goto done ::done::",
        "while true do break end repeat until true",
        "local s = 'esc\\n' .. \"d\\097y\" .. [[long]]",
        "#!/usr/bin/lua\nreturn 0",
        "return 0x10, 1e5, .5, 3.14E+2, 0x1p4",
    ] {
        assert!(errors_of(source).is_empty(), "failed to parse: {}", source);
    }
}

#[test]
fn test_reports_unexpected_token() {
    let errors = errors_of("return +");
    assert!(!errors.is_empty());
    assert!(errors[0].contains("P00"), "got: {}", errors[0]);
}

#[test]
fn test_reports_missing_end() {
    let errors = errors_of("if true then");
    assert!(!errors.is_empty());
    assert!(errors[0].contains("'end' expected"), "got: {}", errors[0]);
}

#[test]
fn test_reports_unterminated_string() {
    let errors = errors_of("local s = \"unfinished");
    assert!(!errors.is_empty());
    assert!(
        errors.iter().any(|e| e.contains("unfinished")),
        "got: {:?}",
        errors
    );
}

#[test]
fn test_reports_malformed_number() {
    let errors = errors_of("return 0x");
    assert!(!errors.is_empty());
    assert!(
        errors.iter().any(|e| e.contains("malformed number")),
        "got: {:?}",
        errors
    );
}

#[test]
fn test_reserved_word_as_name() {
    let errors = errors_of("local end = 1");
    assert!(!errors.is_empty());
}

#[test]
fn test_recovery_reports_multiple_errors() {
    // Two independent statements, two diagnostics
    let errors = errors_of("local = 1\nlocal = 2");
    assert!(errors.len() >= 2, "got: {:?}", errors);
}

#[test]
fn test_diagnostic_has_position() {
    let errors = errors_of("\n\nreturn +");
    assert!(errors[0].contains("test:3"), "got: {}", errors[0]);
}

#[test]
fn test_break_outside_loop() {
    let errors = errors_of("break");
    assert!(!errors.is_empty());
}

#[test]
fn test_vararg_outside_vararg_function() {
    let errors = errors_of("local function f() return ... end");
    assert!(!errors.is_empty());
    // ... is fine at chunk level
    assert!(errors_of("return ...").is_empty());
}

#[test]
fn test_render_roundtrip_fixpoint() {
    // Rendering the parse, re-parsing, and rendering again is stable
    for source in [
        "return 1 + 2 * 3",
        "local x, y = f(), {1, 2, a = 3}",
        "if a then b() elseif c then d() else e() end",
        "for i = 1, 10, 2 do print(i) end",
        "function m.n:o(p, ...) return (p), ... end",
        "while x < 10 do x = x + 1 end",
        "repeat local v <close> = r() until done",
        "local s = 'mix\\n' .. [[raw]] .. \"q\\\"q\"",
        "goto skip do return end ::skip::",
        "return -x ^ 2, not a and b or c, #t, ~n",
        "t[1], t.x = t.x, t[1]",
        "return 0.5, 1e20, 3.25",
    ] {
        let chunk = Compiler::compile(source, "rt").expect(source);
        let rendered = ast_display::render_chunk(&chunk.block);
        let reparsed = Compiler::compile(&rendered, "rt2")
            .unwrap_or_else(|e| panic!("re-parse failed for {:?}: {:?}", rendered, e));
        let rendered_again = ast_display::render_chunk(&reparsed.block);
        assert_eq!(rendered, rendered_again, "source: {}", source);
    }
}

#[test]
fn test_shebang_skipped() {
    assert_eq!(run_int("#!/usr/bin/env lua\nreturn 7"), 7);
}

#[test]
fn test_semicolons_and_empty_statements() {
    assert_eq!(run_int(";;; return 1;"), 1);
}

#[test]
fn test_call_statement_forms() {
    check(
        r#"
        local captured
        local function f(x) captured = x end
        f "direct string"
        assert(captured == "direct string")
        f {key = "table"}
        assert(captured.key == "table")
        f [[long string]]
        assert(captured == "long string")
    "#,
    );
}

#[test]
fn test_method_definition_and_call() {
    check(
        r#"
        local account = {balance = 0}
        function account:deposit(n)
            self.balance = self.balance + n
        end
        account:deposit(100)
        account:deposit(20)
        assert(account.balance == 120)
    "#,
    );
}

#[test]
fn test_string_escapes() {
    assert_eq!(run_str(r#"return "\tA\r\n""#), "\tA\r\n");
    assert_eq!(run_str(r#"return "\z
            spread""#), "spread");
    check(r#"assert("\a\b\f\v" == string.char(7, 8, 12, 11))"#);
}
