//! Ordered JSON object emitter on top of [`BoundedWriter`]

use crate::buffer::{BoundedWriter, Overflow};

pub struct JsonWriter<'w, 'a> {
    out: &'w mut BoundedWriter<'a>,
    needs_comma: bool,
}

impl<'w, 'a> JsonWriter<'w, 'a> {
    pub fn new(out: &'w mut BoundedWriter<'a>) -> Self {
        Self {
            out,
            needs_comma: false,
        }
    }

    pub fn begin_object(&mut self) -> Result<(), Overflow> {
        self.separator()?;
        self.out.push_str("{")?;
        self.needs_comma = false;
        Ok(())
    }

    /// `"key":{` - close it with [`end_object`](Self::end_object).
    pub fn begin_field_object(&mut self, key: &str) -> Result<(), Overflow> {
        self.key(key)?;
        self.out.push_str("{")?;
        self.needs_comma = false;
        Ok(())
    }

    pub fn end_object(&mut self) -> Result<(), Overflow> {
        self.out.push_str("}")?;
        self.needs_comma = true;
        Ok(())
    }

    pub fn field_str(&mut self, key: &str, value: &str) -> Result<(), Overflow> {
        self.key(key)?;
        self.out.push_str("\"")?;
        self.out.push_json_escaped(value)?;
        self.out.push_str("\"")?;
        self.needs_comma = true;
        Ok(())
    }

    /// Two decimals; non-finite values become `null`.
    pub fn field_f32(&mut self, key: &str, value: f32) -> Result<(), Overflow> {
        self.key(key)?;
        if value.is_finite() {
            self.out.push_fmt(format_args!("{:.2}", value))?;
        } else {
            self.out.push_str("null")?;
        }
        self.needs_comma = true;
        Ok(())
    }

    pub fn field_u32(&mut self, key: &str, value: u32) -> Result<(), Overflow> {
        self.key(key)?;
        self.out.push_fmt(format_args!("{}", value))?;
        self.needs_comma = true;
        Ok(())
    }

    fn key(&mut self, key: &str) -> Result<(), Overflow> {
        self.separator()?;
        self.out.push_str("\"")?;
        self.out.push_json_escaped(key)?;
        self.out.push_str("\":")
    }

    fn separator(&mut self) -> Result<(), Overflow> {
        if self.needs_comma {
            self.out.push_str(",")?;
            self.needs_comma = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render<F>(cap: usize, f: F) -> Result<std::string::String, Overflow>
    where
        F: FnOnce(&mut JsonWriter<'_, '_>) -> Result<(), Overflow>,
    {
        let mut buf = std::vec![0u8; cap];
        let mut out = BoundedWriter::new(&mut buf);
        let mut json = JsonWriter::new(&mut out);
        f(&mut json)?;
        Ok(std::string::String::from_utf8(out.as_bytes().to_vec()).unwrap())
    }

    #[test]
    fn flat_object() {
        let s = render(64, |j| {
            j.begin_object()?;
            j.field_f32("T", 22.5)?;
            j.field_str("TF", "C")?;
            j.field_f32("H", 55.0)?;
            j.end_object()
        })
        .unwrap();
        assert_eq!(s, r#"{"T":22.50,"TF":"C","H":55.00}"#);
    }

    #[test]
    fn nested_objects_get_commas_between_siblings() {
        let s = render(128, |j| {
            j.begin_object()?;
            j.begin_field_object("A")?;
            j.field_u32("X", 1)?;
            j.end_object()?;
            j.begin_field_object("B")?;
            j.end_object()?;
            j.field_str("name", "say \"hi\"")?;
            j.end_object()
        })
        .unwrap();
        assert_eq!(s, r#"{"A":{"X":1},"B":{},"name":"say \"hi\""}"#);
    }

    #[test]
    fn non_finite_is_null() {
        let s = render(32, |j| {
            j.begin_object()?;
            j.field_f32("T", f32::NAN)?;
            j.end_object()
        })
        .unwrap();
        assert_eq!(s, r#"{"T":null}"#);
    }

    #[test]
    fn overflow_propagates() {
        let r = render(10, |j| {
            j.begin_object()?;
            j.field_str("status", "not_implemented_yet")?;
            j.end_object()
        });
        assert_eq!(r, Err(Overflow));
    }
}
