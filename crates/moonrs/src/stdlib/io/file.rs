// File handles
// A file handle is userdata wrapping a LuaFile; the shared file
// metatable exposes methods through __index and closes handles through
// __close so `local f <close> = io.open(...)` releases them.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};

use crate::lua_value::number::str_to_number;
use crate::lua_value::LuaValue;

pub const FILE_TAG: &str = "FILE*";

pub enum FileKind {
    Closed,
    Stdin,
    Stdout,
    Stderr,
    Reader(BufReader<File>),
    Writer(File),
}

pub struct LuaFile {
    pub kind: FileKind,
}

impl LuaFile {
    pub fn open(path: &str, mode: &str) -> std::io::Result<LuaFile> {
        let mode = mode.trim_end_matches('b');
        let kind = match mode {
            "r" => FileKind::Reader(BufReader::new(File::open(path)?)),
            "w" => FileKind::Writer(File::create(path)?),
            "a" => FileKind::Writer(OpenOptions::new().create(true).append(true).open(path)?),
            "r+" | "w+" | "a+" => {
                let mut options = OpenOptions::new();
                options.read(true).write(true);
                if mode == "w+" {
                    options.create(true).truncate(true);
                } else if mode == "a+" {
                    options.create(true).append(true);
                }
                FileKind::Reader(BufReader::new(options.open(path)?))
            }
            _ => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("invalid mode '{}'", mode),
                ));
            }
        };
        Ok(LuaFile { kind })
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.kind, FileKind::Closed)
    }

    pub fn close(&mut self) {
        self.kind = FileKind::Closed;
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        match &mut self.kind {
            FileKind::Stdout => std::io::stdout().write_all(bytes),
            FileKind::Stderr => std::io::stderr().write_all(bytes),
            FileKind::Writer(f) => f.write_all(bytes),
            FileKind::Reader(r) => r.get_mut().write_all(bytes),
            FileKind::Stdin => Err(other_error("file not opened for writing")),
            FileKind::Closed => Err(other_error("attempt to use a closed file")),
        }
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.kind {
            FileKind::Stdout => std::io::stdout().flush(),
            FileKind::Stderr => std::io::stderr().flush(),
            FileKind::Writer(f) => f.flush(),
            _ => Ok(()),
        }
    }

    pub fn seek(&mut self, whence: &str, offset: i64) -> std::io::Result<u64> {
        let target = match whence {
            "set" => SeekFrom::Start(offset.max(0) as u64),
            "cur" => SeekFrom::Current(offset),
            "end" => SeekFrom::End(offset),
            _ => return Err(other_error("invalid 'whence' for seek")),
        };
        match &mut self.kind {
            FileKind::Reader(r) => r.seek(target),
            FileKind::Writer(f) => f.seek(target),
            FileKind::Closed => Err(other_error("attempt to use a closed file")),
            _ => Err(other_error("cannot seek on this file")),
        }
    }

    fn read_byte(&mut self) -> std::io::Result<Option<u8>> {
        let mut buf = [0u8; 1];
        let n = match &mut self.kind {
            FileKind::Stdin => std::io::stdin().read(&mut buf)?,
            FileKind::Reader(r) => r.read(&mut buf)?,
            FileKind::Closed => return Err(other_error("attempt to use a closed file")),
            _ => return Err(other_error("file not opened for reading")),
        };
        Ok(if n == 0 { None } else { Some(buf[0]) })
    }

    /// One read format: "l"/"L" line, "n" number, "a" rest, or a byte
    /// count. Returns nil at end of input (except "a").
    pub fn read_format(&mut self, format: &ReadFormat) -> std::io::Result<LuaValue> {
        match format {
            ReadFormat::Line { keep_newline } => {
                let mut out = Vec::new();
                match &mut self.kind {
                    FileKind::Reader(r) => {
                        r.read_until(b'\n', &mut out)?;
                    }
                    FileKind::Stdin => {
                        let stdin = std::io::stdin();
                        stdin.lock().read_until(b'\n', &mut out)?;
                    }
                    FileKind::Closed => {
                        return Err(other_error("attempt to use a closed file"));
                    }
                    _ => return Err(other_error("file not opened for reading")),
                }
                if out.is_empty() {
                    return Ok(LuaValue::Nil);
                }
                if !keep_newline && out.last() == Some(&b'\n') {
                    out.pop();
                    if out.last() == Some(&b'\r') {
                        out.pop();
                    }
                }
                Ok(LuaValue::bytes(out))
            }
            ReadFormat::All => {
                let mut out = Vec::new();
                match &mut self.kind {
                    FileKind::Reader(r) => {
                        r.read_to_end(&mut out)?;
                    }
                    FileKind::Stdin => {
                        std::io::stdin().read_to_end(&mut out)?;
                    }
                    FileKind::Closed => {
                        return Err(other_error("attempt to use a closed file"));
                    }
                    _ => return Err(other_error("file not opened for reading")),
                }
                Ok(LuaValue::bytes(out))
            }
            ReadFormat::Count(n) => {
                let mut out = Vec::with_capacity((*n).min(1 << 20));
                for _ in 0..*n {
                    match self.read_byte()? {
                        Some(b) => out.push(b),
                        None => break,
                    }
                }
                if out.is_empty() && *n > 0 {
                    return Ok(LuaValue::Nil);
                }
                Ok(LuaValue::bytes(out))
            }
            ReadFormat::Number => {
                // Skip whitespace, then collect a numeral
                let mut out: Vec<u8> = Vec::new();
                loop {
                    match self.read_byte()? {
                        Some(b) if b.is_ascii_whitespace() && out.is_empty() => continue,
                        Some(b)
                            if b.is_ascii_digit()
                                || matches!(
                                    b,
                                    b'+' | b'-' | b'.' | b'e' | b'E' | b'x' | b'X'
                                )
                                || b.is_ascii_hexdigit() =>
                        {
                            out.push(b)
                        }
                        _ => break,
                    }
                }
                Ok(str_to_number(&out).unwrap_or(LuaValue::Nil))
            }
        }
    }
}

pub enum ReadFormat {
    Line { keep_newline: bool },
    All,
    Number,
    Count(usize),
}

impl ReadFormat {
    pub fn parse(spec: &LuaValue) -> Result<ReadFormat, String> {
        if let Some(n) = crate::lua_value::number::coerce_integer(spec) {
            if n < 0 {
                return Err("invalid read count".to_string());
            }
            return Ok(ReadFormat::Count(n as usize));
        }
        let text = spec
            .as_str()
            .ok_or_else(|| format!("invalid format (got {})", spec.type_name()))?;
        match text.trim_start_matches('*') {
            "l" => Ok(ReadFormat::Line { keep_newline: false }),
            "L" => Ok(ReadFormat::Line { keep_newline: true }),
            "a" => Ok(ReadFormat::All),
            "n" => Ok(ReadFormat::Number),
            other => Err(format!("invalid format '{}'", other)),
        }
    }
}

fn other_error(msg: &str) -> std::io::Error {
    std::io::Error::other(msg.to_string())
}
