//! Textual PDF syntax for objects.
//!
//! Two independent switches control the output: `tight` drops every
//! optional space, and `ascii` escapes bytes outside printable ASCII so the
//! result is 7-bit clean. The encrypted variant runs string bytes through a
//! [`Crypt`] keyed by the owning object's number and generation.

use std::io::Write;

use crate::error::{Error, Result};
use crate::limits::MAX_DEPTH;
use crate::model::{Name, Obj, PdfString};

/// Output switches for [`print_obj`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintOptions {
    /// Omit whitespace that is not needed to separate tokens.
    pub tight: bool,
    /// Escape every byte outside printable ASCII.
    pub ascii: bool,
}

impl PrintOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tight and ASCII-only: the most compact 7-bit output.
    pub fn compact() -> Self {
        PrintOptions {
            tight: true,
            ascii: true,
        }
    }
}

/// Encrypts string bytes for one indirect object.
pub trait Crypt {
    fn encrypt(&self, num: u32, generation: u16, data: &[u8]) -> Vec<u8>;
}

/// Writes `obj` in PDF syntax.
pub fn print_obj<W: Write>(out: &mut W, obj: &Obj, options: PrintOptions) -> Result<()> {
    let bytes = sprint_obj(obj, options)?;
    out.write_all(&bytes)?;
    Ok(())
}

/// Writes `obj` in PDF syntax with its strings encrypted for object
/// `num generation`.
pub fn print_encrypted_obj<W: Write>(
    out: &mut W,
    obj: &Obj,
    options: PrintOptions,
    crypt: &dyn Crypt,
    num: u32,
    generation: u16,
) -> Result<()> {
    let mut printer = Printer::new(options, Some(Encryption { crypt, num, generation }));
    printer.obj(obj, 0)?;
    out.write_all(&printer.buf)?;
    Ok(())
}

/// Renders `obj` in PDF syntax.
pub fn sprint_obj(obj: &Obj, options: PrintOptions) -> Result<Vec<u8>> {
    let mut printer = Printer::new(options, None);
    printer.obj(obj, 0)?;
    Ok(printer.buf)
}

struct Encryption<'a> {
    crypt: &'a dyn Crypt,
    num: u32,
    generation: u16,
}

struct Printer<'a> {
    buf: Vec<u8>,
    options: PrintOptions,
    encryption: Option<Encryption<'a>>,
}

fn is_delimiter(byte: u8) -> bool {
    matches!(byte, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | b'\x0c' | b'\0')
}

fn is_regular(byte: u8) -> bool {
    !is_delimiter(byte) && !is_whitespace(byte)
}

const HEX: &[u8; 16] = b"0123456789abcdef";

impl<'a> Printer<'a> {
    fn new(options: PrintOptions, encryption: Option<Encryption<'a>>) -> Self {
        Printer {
            buf: Vec::new(),
            options,
            encryption,
        }
    }

    /// Appends a token, separating it from the previous one when both
    /// would otherwise run together.
    fn token(&mut self, text: &[u8]) {
        if let (Some(&last), Some(&first)) = (self.buf.last(), text.first()) {
            if is_regular(last) && is_regular(first) {
                self.buf.push(b' ');
            }
        }
        self.buf.extend_from_slice(text);
    }

    fn newline(&mut self, level: usize) {
        self.buf.push(b'\n');
        self.buf.resize(self.buf.len() + level * 2, b' ');
    }

    fn obj(&mut self, obj: &Obj, level: usize) -> Result<()> {
        if level > MAX_DEPTH {
            return Err(Error::TooDeep { max: MAX_DEPTH });
        }
        match obj {
            Obj::Null => self.token(b"null"),
            Obj::Bool(true) => self.token(b"true"),
            Obj::Bool(false) => self.token(b"false"),
            Obj::Int(value) => self.token(value.to_string().as_bytes()),
            Obj::Real(value) => self.token(format_real(*value).as_bytes()),
            Obj::Name(name) => self.name(name),
            Obj::String(string) => self.string(string),
            Obj::Indirect(reference) => {
                let text = format!("{} {} R", reference.num(), reference.generation());
                self.token(text.as_bytes());
            }
            Obj::Array(array) => {
                let items = array.to_vec();
                self.token(b"[");
                for item in &items {
                    if !self.options.tight {
                        self.buf.push(b' ');
                    }
                    self.obj(item, level + 1)?;
                }
                if !self.options.tight {
                    self.buf.push(b' ');
                }
                self.token(b"]");
            }
            Obj::Dict(dict) => self.dict(&dict.iter().collect::<Vec<_>>(), level)?,
            Obj::Stream(stream) => self.dict(&stream.dict().iter().collect::<Vec<_>>(), level)?,
        }
        Ok(())
    }

    fn dict(&mut self, entries: &[(Name, Obj)], level: usize) -> Result<()> {
        self.token(b"<<");
        if self.options.tight {
            for (key, value) in entries {
                self.name(key);
                self.obj(value, level + 1)?;
            }
        } else if entries.is_empty() {
            self.buf.push(b' ');
        } else {
            for (key, value) in entries {
                self.newline(level + 1);
                self.name(key);
                self.buf.push(b' ');
                self.obj(value, level + 1)?;
            }
            self.newline(level);
        }
        self.token(b">>");
        Ok(())
    }

    fn name(&mut self, name: &Name) {
        let mut text = Vec::with_capacity(name.as_bytes().len() + 1);
        text.push(b'/');
        for &byte in name.as_bytes() {
            if (0x21..=0x7e).contains(&byte) && !is_delimiter(byte) && byte != b'#' {
                text.push(byte);
            } else {
                text.extend_from_slice(&[b'#', HEX[(byte >> 4) as usize], HEX[(byte & 15) as usize]]);
            }
        }
        self.token(&text);
    }

    fn string(&mut self, string: &PdfString) {
        let encrypted = self
            .encryption
            .as_ref()
            .map(|e| e.crypt.encrypt(e.num, e.generation, string.as_bytes()));
        let bytes = encrypted.as_deref().unwrap_or(string.as_bytes());
        let unicode = bytes.starts_with(&[0xfe, 0xff]) || bytes.starts_with(&[0xff, 0xfe]);
        let literal = literal_string(bytes, self.options.ascii);
        let hex_len = bytes.len() * 2 + 2;
        if encrypted.is_some() || unicode || literal.len() > hex_len {
            self.hex_string(bytes);
        } else {
            self.token(&literal);
        }
    }

    fn hex_string(&mut self, bytes: &[u8]) {
        let mut text = Vec::with_capacity(bytes.len() * 2 + 2);
        text.push(b'<');
        for &byte in bytes {
            text.extend_from_slice(&[HEX[(byte >> 4) as usize], HEX[(byte & 15) as usize]]);
        }
        text.push(b'>');
        self.token(&text);
    }
}

fn literal_string(bytes: &[u8], ascii: bool) -> Vec<u8> {
    let mut text = Vec::with_capacity(bytes.len() + 2);
    text.push(b'(');
    for &byte in bytes {
        match byte {
            b'\n' => text.extend_from_slice(b"\\n"),
            b'\r' => text.extend_from_slice(b"\\r"),
            b'\t' => text.extend_from_slice(b"\\t"),
            b'\x08' => text.extend_from_slice(b"\\b"),
            b'\x0c' => text.extend_from_slice(b"\\f"),
            b'(' | b')' | b'\\' => text.extend_from_slice(&[b'\\', byte]),
            0x20..=0x7e => text.push(byte),
            0x80..=0xff if !ascii => text.push(byte),
            _ => text.extend_from_slice(format!("\\{:03o}", byte).as_bytes()),
        }
    }
    text.push(b')');
    text
}

/// Formats a real without exponent notation. Non-finite values have no PDF
/// spelling: NaN prints as 0 and infinities as the largest finite value.
fn format_real(value: f32) -> String {
    let value = if value.is_nan() {
        0.0
    } else {
        value.clamp(f32::MIN, f32::MAX)
    };
    if value == 0.0 {
        return "0".to_string();
    }
    value.to_string()
}
