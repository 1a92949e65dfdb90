//! Capacity-checked writer over a caller-owned byte buffer
//!
//! Every append either fits completely or leaves the writer untouched and
//! reports [`Overflow`]. Response assembly goes exclusively through this
//! type, so a response can never grow past its buffer.

use core::fmt;

/// The next fragment would not fit in the remaining capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overflow;

impl fmt::Display for Overflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("response buffer overflow")
    }
}

pub struct BoundedWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> BoundedWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    pub fn push_bytes(&mut self, data: &[u8]) -> Result<(), Overflow> {
        let end = self.len.checked_add(data.len()).ok_or(Overflow)?;
        if end > self.buf.len() {
            return Err(Overflow);
        }
        self.buf[self.len..end].copy_from_slice(data);
        self.len = end;
        Ok(())
    }

    pub fn push_str(&mut self, s: &str) -> Result<(), Overflow> {
        self.push_bytes(s.as_bytes())
    }

    /// `write!`-style formatting; nothing is kept if the output does not fit.
    pub fn push_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), Overflow> {
        self.all_or_nothing(|w| fmt::Write::write_fmt(w, args).map_err(|_| Overflow))
    }

    /// Escape `<`, `>`, `&`, `"` and `'` for HTML text and attribute values.
    pub fn push_html_escaped(&mut self, s: &str) -> Result<(), Overflow> {
        self.all_or_nothing(|w| {
            for ch in s.chars() {
                match ch {
                    '<' => w.push_str("&lt;")?,
                    '>' => w.push_str("&gt;")?,
                    '&' => w.push_str("&amp;")?,
                    '"' => w.push_str("&quot;")?,
                    '\'' => w.push_str("&#39;")?,
                    c => w.push_char(c)?,
                }
            }
            Ok(())
        })
    }

    /// Escape the contents of a JSON string literal (without the quotes).
    pub fn push_json_escaped(&mut self, s: &str) -> Result<(), Overflow> {
        self.all_or_nothing(|w| {
            for ch in s.chars() {
                match ch {
                    '"' => w.push_str("\\\"")?,
                    '\\' => w.push_str("\\\\")?,
                    '\n' => w.push_str("\\n")?,
                    '\r' => w.push_str("\\r")?,
                    '\t' => w.push_str("\\t")?,
                    c if c < ' ' => w.push_fmt(format_args!("\\u{:04x}", c as u32))?,
                    c => w.push_char(c)?,
                }
            }
            Ok(())
        })
    }

    fn push_char(&mut self, ch: char) -> Result<(), Overflow> {
        let mut tmp = [0u8; 4];
        self.push_str(ch.encode_utf8(&mut tmp))
    }

    fn all_or_nothing<F>(&mut self, f: F) -> Result<(), Overflow>
    where
        F: FnOnce(&mut Self) -> Result<(), Overflow>,
    {
        let start = self.len;
        let result = f(self);
        if result.is_err() {
            self.len = start;
        }
        result
    }
}

impl fmt::Write for BoundedWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_str(s).map_err(|_| fmt::Error)
    }
}
