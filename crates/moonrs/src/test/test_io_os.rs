// io and os libraries (FullTrust; filesystem via temp directories)
use crate::host::{LuaHost, LuaHostOptions, TrustLevel};
use crate::test::check;

fn full_host() -> LuaHost {
    LuaHost::new(LuaHostOptions::with_trust(TrustLevel::FullTrust))
}

fn temp_path(dir: &tempfile::TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

#[test]
fn test_write_then_read() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_path(&dir, "data.txt");
    let host = full_host();
    let source = format!(
        r#"
        local path = {path:?}
        local f = assert(io.open(path, "w"))
        f:write("hello\n", "world", 42, "\n")
        f:close()

        local g = assert(io.open(path, "r"))
        local first = g:read("l")
        local rest = g:read("a")
        g:close()
        return first, rest
    "#
    );
    let values = host.execute(&source).expect("runs");
    assert_eq!(values[0].as_str(), Some("hello"));
    assert_eq!(values[1].as_str(), Some("world42\n"));
}

#[test]
fn test_read_formats() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_path(&dir, "formats.txt");
    std::fs::write(&path, "12 next\nkeep\n").expect("seed file");
    let host = full_host();
    let source = format!(
        r#"
        local f = assert(io.open({path:?}, "r"))
        local n = f:read("n")
        local rest = f:read("l")
        local with_newline = f:read("L")
        local eof = f:read("l")
        f:close()
        return n, rest, with_newline, eof
    "#
    );
    let values = host.execute(&source).expect("runs");
    assert_eq!(values[0].as_integer(), Some(12));
    // read("n") consumes the delimiter byte that ended the numeral
    assert_eq!(values[1].as_str(), Some("next"));
    assert_eq!(values[2].as_str(), Some("keep\n"));
    assert!(values[3].is_nil());
}

#[test]
fn test_lines_iterator() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_path(&dir, "lines.txt");
    std::fs::write(&path, "a\nb\nc\n").expect("seed file");
    let host = full_host();
    let source = format!(
        r#"
        local collected = {{}}
        for line in io.lines({path:?}) do
            collected[#collected + 1] = line
        end
        return table.concat(collected, "|")
    "#
    );
    let values = host.execute(&source).expect("runs");
    assert_eq!(values[0].as_str(), Some("a|b|c"));
}

#[test]
fn test_file_handle_close_attribute() {
    // Scenario: <close> releases the handle at scope exit
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_path(&dir, "guarded.txt");
    let host = full_host();
    let source = format!(
        r#"
        local probe
        do
            local f <close> = assert(io.open({path:?}, "w"))
            f:write("guarded")
            probe = f
        end
        -- the handle is closed once the block exits
        return io.type(probe)
    "#
    );
    let values = host.execute(&source).expect("runs");
    assert_eq!(values[0].as_str(), Some("closed file"));
    assert_eq!(std::fs::read_to_string(&path).expect("written"), "guarded");
}

#[test]
fn test_io_type_and_open_failure() {
    let host = full_host();
    let values = host
        .execute(
            r#"
            local f, err = io.open("/definitely/not/here/file.txt", "r")
            return f, type(err), io.type(io.stdout), io.type("not a file")
        "#,
        )
        .expect("runs");
    assert!(values[0].is_nil());
    assert_eq!(values[1].as_str(), Some("string"));
    assert_eq!(values[2].as_str(), Some("file"));
    assert!(values[3].is_nil());
}

#[test]
fn test_seek() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = temp_path(&dir, "seek.txt");
    std::fs::write(&path, "0123456789").expect("seed file");
    let host = full_host();
    let source = format!(
        r#"
        local f = assert(io.open({path:?}, "r"))
        f:seek("set", 5)
        local tail = f:read("a")
        local size = f:seek("end")
        f:close()
        return tail, size
    "#
    );
    let values = host.execute(&source).expect("runs");
    assert_eq!(values[0].as_str(), Some("56789"));
    assert_eq!(values[1].as_integer(), Some(10));
}

#[test]
fn test_os_time_and_clock() {
    check(
        r#"
        local t = os.time()
        assert(math.type(t) == "integer")
        assert(t > 1600000000)  -- after 2020

        local c1 = os.clock()
        assert(type(c1) == "number" and c1 >= 0)

        assert(os.difftime(t + 30, t) == 30.0)
    "#,
    );
}

#[test]
fn test_os_time_from_table() {
    check(
        r#"
        local stamp = os.time({year = 2020, month = 6, day = 15, hour = 12, min = 0, sec = 0})
        assert(math.type(stamp) == "integer")
        -- the reverse direction reproduces the fields
        local t = os.date("*t", stamp)
        assert(t.year == 2020 and t.month == 6 and t.day == 15)
    "#,
    );
}

#[test]
fn test_os_date() {
    check(
        r#"
        local y = os.date("%Y")
        assert(#y == 4 and tonumber(y) >= 2020)

        local t = os.date("*t")
        assert(type(t) == "table")
        assert(t.month >= 1 and t.month <= 12)
        assert(t.wday >= 1 and t.wday <= 7)

        local utc = os.date("!%H", 0)
        assert(utc == "00")
    "#,
    );
}

#[test]
fn test_os_getenv() {
    check(
        r#"
        assert(os.getenv("__moonrs_surely_unset__") == nil)
        assert(type(os.getenv("PATH")) == "string" or os.getenv("PATH") == nil)
    "#,
    );
}

#[test]
fn test_os_remove_rename() {
    let dir = tempfile::tempdir().expect("tempdir");
    let from = temp_path(&dir, "from.txt");
    let to = temp_path(&dir, "to.txt");
    std::fs::write(&from, "content").expect("seed file");
    let host = full_host();
    let source = format!(
        r#"
        assert(os.rename({from:?}, {to:?}))
        local ok, err = os.remove({from:?})
        assert(ok == nil and type(err) == "string")
        assert(os.remove({to:?}))
        return "done"
    "#
    );
    let values = host.execute(&source).expect("runs");
    assert_eq!(values[0].as_str(), Some("done"));
    assert!(!std::path::Path::new(&to).exists());
}

#[test]
fn test_tmpname_unique() {
    let host = full_host();
    let values = host
        .execute("local a, b = os.tmpname(), os.tmpname() return a ~= b")
        .expect("runs");
    assert_eq!(values[0].as_boolean(), Some(true));
}
