// string.pack / string.unpack / string.packsize
// Binary (de)serialization of Lua values driven by a format string.
// Supported directives: endianness '<' '>' '=', '!' (accepted), integer
// sizes b B h H l L j J i[n] I[n], floats f d n, strings s[n] z, padding
// x. Integral sizes are limited to 1..=8 bytes.

use crate::lua_interp::{LuaResult, LuaState};
use crate::lua_value::number::coerce_integer;
use crate::lua_value::LuaValue;

#[derive(Clone, Copy, PartialEq)]
enum Endian {
    Little,
    Big,
}

fn native_endian() -> Endian {
    if cfg!(target_endian = "big") {
        Endian::Big
    } else {
        Endian::Little
    }
}

enum Item {
    Int { size: usize, signed: bool },
    Float,
    Double,
    /// Counted string with a length prefix of the given size.
    Str { prefix: usize },
    /// Zero-terminated string.
    ZStr,
    Padding,
}

struct FormatParser<'a> {
    fmt: &'a [u8],
    pos: usize,
    endian: Endian,
}

impl<'a> FormatParser<'a> {
    fn new(fmt: &'a [u8]) -> Self {
        FormatParser {
            fmt,
            pos: 0,
            endian: native_endian(),
        }
    }

    fn optional_size(&mut self, default: usize) -> usize {
        let mut size = 0usize;
        let mut any = false;
        while self
            .fmt
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_digit())
        {
            size = size * 10 + (self.fmt[self.pos] - b'0') as usize;
            any = true;
            self.pos += 1;
        }
        if any { size } else { default }
    }

    fn next(&mut self) -> Result<Option<Item>, String> {
        loop {
            let Some(&c) = self.fmt.get(self.pos) else {
                return Ok(None);
            };
            self.pos += 1;
            let item = match c {
                b' ' => continue,
                b'<' => {
                    self.endian = Endian::Little;
                    continue;
                }
                b'>' => {
                    self.endian = Endian::Big;
                    continue;
                }
                b'=' => {
                    self.endian = native_endian();
                    continue;
                }
                b'!' => {
                    // Alignment request: sizes accepted, no padding added
                    self.optional_size(8);
                    continue;
                }
                b'b' => Item::Int { size: 1, signed: true },
                b'B' => Item::Int { size: 1, signed: false },
                b'h' => Item::Int { size: 2, signed: true },
                b'H' => Item::Int { size: 2, signed: false },
                b'l' | b'j' => Item::Int { size: 8, signed: true },
                b'L' | b'J' | b'T' => Item::Int { size: 8, signed: false },
                b'i' => {
                    let size = self.optional_size(4);
                    check_int_size(size)?;
                    Item::Int { size, signed: true }
                }
                b'I' => {
                    let size = self.optional_size(4);
                    check_int_size(size)?;
                    Item::Int { size, signed: false }
                }
                b'f' => Item::Float,
                b'd' | b'n' => Item::Double,
                b's' => {
                    let prefix = self.optional_size(8);
                    check_int_size(prefix)?;
                    Item::Str { prefix }
                }
                b'z' => Item::ZStr,
                b'x' => Item::Padding,
                other => {
                    return Err(format!(
                        "invalid format option '{}'",
                        other as char
                    ));
                }
            };
            return Ok(Some(item));
        }
    }
}

fn check_int_size(size: usize) -> Result<(), String> {
    if (1..=8).contains(&size) {
        Ok(())
    } else {
        Err(format!("integral size ({}) out of limits [1,8]", size))
    }
}

fn write_uint(out: &mut Vec<u8>, value: u64, size: usize, endian: Endian) {
    let bytes = value.to_le_bytes();
    match endian {
        Endian::Little => out.extend_from_slice(&bytes[..size]),
        Endian::Big => out.extend(bytes[..size].iter().rev()),
    }
}

fn read_uint(data: &[u8], size: usize, endian: Endian) -> u64 {
    let mut value: u64 = 0;
    match endian {
        Endian::Little => {
            for (i, &b) in data[..size].iter().enumerate() {
                value |= (b as u64) << (8 * i);
            }
        }
        Endian::Big => {
            for &b in &data[..size] {
                value = (value << 8) | b as u64;
            }
        }
    }
    value
}

fn sign_extend(value: u64, size: usize) -> i64 {
    if size >= 8 {
        return value as i64;
    }
    let shift = 64 - size * 8;
    ((value << shift) as i64) >> shift
}

pub fn pack(l: &mut LuaState, fmt: &[u8], args: &[LuaValue]) -> LuaResult<Vec<u8>> {
    let mut parser = FormatParser::new(fmt);
    let mut out = Vec::new();
    let mut arg_n = 1; // args[0] is the format

    loop {
        let item = match parser.next() {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(out),
            Err(msg) => return Err(l.error(msg)),
        };
        match item {
            Item::Padding => out.push(0),
            Item::Int { size, signed } => {
                arg_n += 1;
                let value = pack_arg_integer(l, args, arg_n)?;
                if size < 8 {
                    // Range check before truncation
                    let fits = if signed {
                        let min = -(1i64 << (size * 8 - 1));
                        let max = (1i64 << (size * 8 - 1)) - 1;
                        value >= min && value <= max
                    } else {
                        value >= 0 && (value as u64) < (1u64 << (size * 8))
                    };
                    if !fits {
                        return Err(l.error(format!(
                            "bad argument #{} to 'pack' (integer overflow)",
                            arg_n
                        )));
                    }
                }
                write_uint(&mut out, value as u64, size, parser.endian);
            }
            Item::Float => {
                arg_n += 1;
                let value = pack_arg_number(l, args, arg_n)? as f32;
                let bytes = value.to_le_bytes();
                match parser.endian {
                    Endian::Little => out.extend_from_slice(&bytes),
                    Endian::Big => out.extend(bytes.iter().rev()),
                }
            }
            Item::Double => {
                arg_n += 1;
                let value = pack_arg_number(l, args, arg_n)?;
                let bytes = value.to_le_bytes();
                match parser.endian {
                    Endian::Little => out.extend_from_slice(&bytes),
                    Endian::Big => out.extend(bytes.iter().rev()),
                }
            }
            Item::Str { prefix } => {
                arg_n += 1;
                let bytes = pack_arg_string(l, args, arg_n)?;
                if prefix < 8 && bytes.len() as u64 >= 1u64 << (prefix * 8) {
                    return Err(l.error(format!(
                        "bad argument #{} to 'pack' (string longer than given size)",
                        arg_n
                    )));
                }
                write_uint(&mut out, bytes.len() as u64, prefix, parser.endian);
                out.extend_from_slice(&bytes);
            }
            Item::ZStr => {
                arg_n += 1;
                let bytes = pack_arg_string(l, args, arg_n)?;
                if bytes.contains(&0) {
                    return Err(l.error(format!(
                        "bad argument #{} to 'pack' (string contains zeros)",
                        arg_n
                    )));
                }
                out.extend_from_slice(&bytes);
                out.push(0);
            }
        }
    }
}

pub fn unpack(l: &mut LuaState, fmt: &[u8], data: &[u8], init: usize) -> LuaResult<Vec<LuaValue>> {
    let mut parser = FormatParser::new(fmt);
    let mut pos = init;
    let mut results = Vec::new();

    loop {
        let item = match parser.next() {
            Ok(Some(item)) => item,
            Ok(None) => {
                results.push(LuaValue::Integer(pos as i64 + 1));
                return Ok(results);
            }
            Err(msg) => return Err(l.error(msg)),
        };
        match item {
            Item::Padding => {
                need(l, data, pos, 1)?;
                pos += 1;
            }
            Item::Int { size, signed } => {
                need(l, data, pos, size)?;
                let raw = read_uint(&data[pos..], size, parser.endian);
                pos += size;
                let value = if signed {
                    LuaValue::Integer(sign_extend(raw, size))
                } else if size >= 8 && raw > i64::MAX as u64 {
                    return Err(l.error("unsigned value does not fit in an integer"));
                } else {
                    LuaValue::Integer(raw as i64)
                };
                results.push(value);
            }
            Item::Float => {
                need(l, data, pos, 4)?;
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&data[pos..pos + 4]);
                if parser.endian == Endian::Big {
                    bytes.reverse();
                }
                pos += 4;
                results.push(LuaValue::Float(f32::from_le_bytes(bytes) as f64));
            }
            Item::Double => {
                need(l, data, pos, 8)?;
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&data[pos..pos + 8]);
                if parser.endian == Endian::Big {
                    bytes.reverse();
                }
                pos += 8;
                results.push(LuaValue::Float(f64::from_le_bytes(bytes)));
            }
            Item::Str { prefix } => {
                need(l, data, pos, prefix)?;
                let len = read_uint(&data[pos..], prefix, parser.endian) as usize;
                pos += prefix;
                need(l, data, pos, len)?;
                results.push(LuaValue::bytes(data[pos..pos + len].to_vec()));
                pos += len;
            }
            Item::ZStr => {
                let end = data[pos..]
                    .iter()
                    .position(|&b| b == 0)
                    .ok_or_else(|| l.error("unfinished string for format 'z'"))?;
                results.push(LuaValue::bytes(data[pos..pos + end].to_vec()));
                pos += end + 1;
            }
        }
    }
}

pub fn packsize(l: &mut LuaState, fmt: &[u8]) -> LuaResult<i64> {
    let mut parser = FormatParser::new(fmt);
    let mut total: i64 = 0;
    loop {
        let item = match parser.next() {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(total),
            Err(msg) => return Err(l.error(msg)),
        };
        total += match item {
            Item::Padding => 1,
            Item::Int { size, .. } => size as i64,
            Item::Float => 4,
            Item::Double => 8,
            Item::Str { .. } | Item::ZStr => {
                return Err(l.error("variable-size format in packsize"));
            }
        };
    }
}

fn need(l: &LuaState, data: &[u8], pos: usize, size: usize) -> LuaResult<()> {
    if pos + size > data.len() {
        Err(l.error("data string too short"))
    } else {
        Ok(())
    }
}

fn pack_arg_integer(l: &LuaState, args: &[LuaValue], n: usize) -> LuaResult<i64> {
    let value = args.get(n - 1).cloned().unwrap_or(LuaValue::Nil);
    coerce_integer(&value)
        .ok_or_else(|| crate::lib_registry::bad_argument(l, n, "pack", "number", &value))
}

fn pack_arg_number(l: &LuaState, args: &[LuaValue], n: usize) -> LuaResult<f64> {
    let value = args.get(n - 1).cloned().unwrap_or(LuaValue::Nil);
    match crate::lua_value::number::coerce_number(&value) {
        Some(LuaValue::Integer(i)) => Ok(i as f64),
        Some(LuaValue::Float(f)) => Ok(f),
        _ => Err(crate::lib_registry::bad_argument(l, n, "pack", "number", &value)),
    }
}

fn pack_arg_string(l: &LuaState, args: &[LuaValue], n: usize) -> LuaResult<Vec<u8>> {
    let value = args.get(n - 1).cloned().unwrap_or(LuaValue::Nil);
    match &value {
        LuaValue::Str(s) => Ok(s.as_bytes().to_vec()),
        _ => Err(crate::lib_registry::bad_argument(l, n, "pack", "string", &value)),
    }
}
