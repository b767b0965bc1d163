//! Typed message fields
//!
//! A decoded message is reported as an ordered set of named, typed fields;
//! the same representation collects user-edited values when a message is
//! rebuilt for retransmission. Each field carries a width whose unit
//! depends on the kind: bits for the integer-like kinds, characters for
//! strings, nibbles for byte arrays, decimal digits for floats.

use thiserror::Error;

/// Validation failure from [`Field::set_from_str`]. The field is left
/// unmodified when one of these is returned.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("malformed {0} literal")]
    Malformed(&'static str),
    #[error("value does not fit in a width of {0}")]
    Overflow(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Str,
    SignedInt,
    UnsignedInt,
    Binary,
    Hex,
    Bytes,
    Float,
}

#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Str(String),
    SignedInt(i64),
    UnsignedInt(u64),
    Binary(u64),
    Hex(u64),
    Bytes(Vec<u8>),
    Float(f64),
}

/// One named, typed value with an explicit width.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    len: u32,
    value: FieldValue,
}

fn bit_mask(len: u32) -> u64 {
    if len >= 64 {
        u64::MAX
    } else {
        (1u64 << len) - 1
    }
}

impl Field {
    pub fn new_str(name: &str, value: &str, len: u32) -> Self {
        let value: String = value.chars().take(len as usize).collect();
        Self {
            name: name.to_string(),
            len,
            value: FieldValue::Str(value),
        }
    }

    pub fn new_int(name: &str, value: i64, bits: u32) -> Self {
        Self {
            name: name.to_string(),
            len: bits,
            value: FieldValue::SignedInt(value),
        }
    }

    pub fn new_uint(name: &str, value: u64, bits: u32) -> Self {
        Self {
            name: name.to_string(),
            len: bits,
            value: FieldValue::UnsignedInt(value),
        }
    }

    pub fn new_bin(name: &str, value: u64, bits: u32) -> Self {
        Self {
            name: name.to_string(),
            len: bits,
            value: FieldValue::Binary(value),
        }
    }

    pub fn new_hex(name: &str, value: u64, bits: u32) -> Self {
        Self {
            name: name.to_string(),
            len: bits,
            value: FieldValue::Hex(value),
        }
    }

    /// `nibbles` is the rendered width; `bytes` should hold at least
    /// `ceil(nibbles / 2)` bytes.
    pub fn new_bytes(name: &str, bytes: &[u8], nibbles: u32) -> Self {
        let mut v = bytes.to_vec();
        v.resize(nibbles.div_ceil(2) as usize, 0);
        Self {
            name: name.to_string(),
            len: nibbles,
            value: FieldValue::Bytes(v),
        }
    }

    /// `digits` is the number of decimal digits after the point.
    pub fn new_float(name: &str, value: f64, digits: u32) -> Self {
        Self {
            name: name.to_string(),
            len: digits,
            value: FieldValue::Float(value),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        match self.value {
            FieldValue::Str(_) => FieldKind::Str,
            FieldValue::SignedInt(_) => FieldKind::SignedInt,
            FieldValue::UnsignedInt(_) => FieldKind::UnsignedInt,
            FieldValue::Binary(_) => FieldKind::Binary,
            FieldValue::Hex(_) => FieldKind::Hex,
            FieldValue::Bytes(_) => FieldKind::Bytes,
            FieldValue::Float(_) => FieldKind::Float,
        }
    }

    /// Width of the field: bits, characters, nibbles or decimal digits
    /// depending on the kind.
    pub fn len(&self) -> u32 {
        self.len
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.value {
            FieldValue::UnsignedInt(v) | FieldValue::Binary(v) | FieldValue::Hex(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            FieldValue::SignedInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            FieldValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.value {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Render the value for display and editing, per kind.
    pub fn render(&self) -> String {
        match &self.value {
            FieldValue::Str(s) => s.clone(),
            FieldValue::SignedInt(v) => v.to_string(),
            FieldValue::UnsignedInt(v) => v.to_string(),
            FieldValue::Binary(v) => {
                let v = v & bit_mask(self.len);
                (0..self.len)
                    .rev()
                    .map(|b| if (v >> b) & 1 != 0 { '1' } else { '0' })
                    .collect()
            }
            FieldValue::Hex(v) => {
                let digits = self.len.div_ceil(4) as usize;
                format!("{:0width$X}", v & bit_mask(self.len), width = digits)
            }
            FieldValue::Bytes(b) => {
                let mut s = hex::encode_upper(b);
                s.truncate(self.len as usize);
                s
            }
            FieldValue::Float(v) => format!("{:.*}", self.len as usize, v),
        }
    }

    /// Parse `input` into the field, validating per kind. On failure the
    /// field keeps its previous value. Strings longer than the field width
    /// are truncated, matching the fixed-width display buffer they edit.
    pub fn set_from_str(&mut self, input: &str) -> Result<(), FieldError> {
        match &mut self.value {
            FieldValue::Str(s) => {
                *s = input.chars().take(self.len as usize).collect();
                Ok(())
            }
            FieldValue::SignedInt(v) => {
                let parsed: i64 = input
                    .parse()
                    .map_err(|_| FieldError::Malformed("signed integer"))?;
                let half = 1i128 << (self.len.max(1) - 1).min(63);
                if self.len < 64 && ((parsed as i128) < -half || (parsed as i128) >= half) {
                    return Err(FieldError::Overflow(self.len));
                }
                *v = parsed;
                Ok(())
            }
            FieldValue::UnsignedInt(v) => {
                let parsed: u64 = input
                    .parse()
                    .map_err(|_| FieldError::Malformed("unsigned integer"))?;
                if parsed > bit_mask(self.len) {
                    return Err(FieldError::Overflow(self.len));
                }
                *v = parsed;
                Ok(())
            }
            FieldValue::Binary(v) => {
                if input.is_empty() || !input.bytes().all(|c| c == b'0' || c == b'1') {
                    return Err(FieldError::Malformed("binary"));
                }
                if input.len() > self.len as usize {
                    return Err(FieldError::Overflow(self.len));
                }
                *v = input
                    .bytes()
                    .fold(0u64, |acc, c| (acc << 1) | (c == b'1') as u64);
                Ok(())
            }
            FieldValue::Hex(v) => {
                let parsed =
                    u64::from_str_radix(input, 16).map_err(|_| FieldError::Malformed("hex"))?;
                if parsed > bit_mask(self.len) {
                    return Err(FieldError::Overflow(self.len));
                }
                *v = parsed;
                Ok(())
            }
            FieldValue::Bytes(b) => {
                if input.len() > self.len as usize {
                    return Err(FieldError::Overflow(self.len));
                }
                let mut nibbles = Vec::with_capacity(input.len());
                for c in input.chars() {
                    nibbles
                        .push(c.to_digit(16).ok_or(FieldError::Malformed("hex bytes"))? as u8);
                }
                let mut bytes = vec![0u8; self.len.div_ceil(2) as usize];
                for (i, nib) in nibbles.iter().enumerate() {
                    if i % 2 == 0 {
                        bytes[i / 2] |= nib << 4;
                    } else {
                        bytes[i / 2] |= nib;
                    }
                }
                *b = bytes;
                Ok(())
            }
            FieldValue::Float(v) => {
                let parsed: f64 = input.parse().map_err(|_| FieldError::Malformed("float"))?;
                *v = parsed;
                Ok(())
            }
        }
    }

    /// Add `delta` to the value, wrapping at the field width. Integer-like
    /// kinds wrap modulo 2^bits (two's complement for signed); floats just
    /// add; byte arrays only support steps of ±1, rippling the carry
    /// through the nibbles; strings cannot be incremented. Returns false
    /// when the operation is unsupported.
    pub fn increment(&mut self, delta: i64) -> bool {
        match &mut self.value {
            FieldValue::Str(_) => false,
            FieldValue::SignedInt(v) => {
                let m = 1i128 << self.len.min(64);
                let mut x = (*v as i128 + delta as i128).rem_euclid(m);
                if x >= m / 2 {
                    x -= m;
                }
                *v = x as i64;
                true
            }
            FieldValue::UnsignedInt(v) | FieldValue::Binary(v) | FieldValue::Hex(v) => {
                let m = 1i128 << self.len.min(64);
                *v = (*v as i128 + delta as i128).rem_euclid(m) as u64;
                true
            }
            FieldValue::Float(v) => {
                *v += delta as f64;
                true
            }
            FieldValue::Bytes(b) => {
                if delta != 1 && delta != -1 {
                    return false;
                }
                let nibbles = self.len as usize;
                if nibbles == 0 {
                    return false;
                }
                for i in (0..nibbles).rev() {
                    let shift = if i % 2 == 0 { 4 } else { 0 };
                    let byte = i / 2;
                    let nib = (b[byte] >> shift) & 0x0f;
                    let (next, carry) = if delta > 0 {
                        if nib == 15 {
                            (0, true)
                        } else {
                            (nib + 1, false)
                        }
                    } else if nib == 0 {
                        (15, true)
                    } else {
                        (nib - 1, false)
                    };
                    b[byte] = (b[byte] & !(0x0f << shift)) | (next << shift);
                    if !carry {
                        break;
                    }
                }
                true
            }
        }
    }

    /// Copy the value from `other` when name and kind match, conforming it
    /// to this field's width. Used to pre-fill a synthesis field set from a
    /// previously decoded one, whose fields may be sized differently.
    pub fn copy_value_from(&mut self, other: &Field) -> bool {
        if self.name != other.name || self.kind() != other.kind() {
            return false;
        }
        self.value = other.value.clone();
        match &mut self.value {
            // increment() indexes nibbles up to self.len, so the buffer
            // must cover the full width.
            FieldValue::Bytes(b) => b.resize(self.len.div_ceil(2) as usize, 0),
            FieldValue::Str(s) => {
                if s.chars().count() > self.len as usize {
                    *s = s.chars().take(self.len as usize).collect();
                }
            }
            _ => {}
        }
        true
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.render())
    }
}

/// Ordered, insertion-order collection of fields. Names are not required
/// to be unique, but protocol decoders use them as stable keys when
/// copy-matching between sets.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSet {
    fields: Vec<Field>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn add(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn add_str(&mut self, name: &str, value: &str, len: u32) {
        self.add(Field::new_str(name, value, len));
    }

    pub fn add_int(&mut self, name: &str, value: i64, bits: u32) {
        self.add(Field::new_int(name, value, bits));
    }

    pub fn add_uint(&mut self, name: &str, value: u64, bits: u32) {
        self.add(Field::new_uint(name, value, bits));
    }

    pub fn add_bin(&mut self, name: &str, value: u64, bits: u32) {
        self.add(Field::new_bin(name, value, bits));
    }

    pub fn add_hex(&mut self, name: &str, value: u64, bits: u32) {
        self.add(Field::new_hex(name, value, bits));
    }

    pub fn add_bytes(&mut self, name: &str, bytes: &[u8], nibbles: u32) {
        self.add(Field::new_bytes(name, bytes, nibbles));
    }

    pub fn add_float(&mut self, name: &str, value: f64, digits: u32) {
        self.add(Field::new_float(name, value, digits));
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Field> {
        self.fields.iter_mut()
    }

    /// Copy values from `other` into every field here whose name and kind
    /// match one of its fields. Returns the number of fields filled.
    pub fn copy_matching(&mut self, other: &FieldSet) -> usize {
        let mut copied = 0;
        for field in self.fields.iter_mut() {
            if let Some(src) = other.get(field.name()) {
                if field.copy_value_from(src) {
                    copied += 1;
                }
            }
        }
        copied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_kinds() {
        assert_eq!(Field::new_uint("n", 42, 8).render(), "42");
        assert_eq!(Field::new_int("n", -7, 8).render(), "-7");
        assert_eq!(Field::new_bin("n", 0b1011, 6).render(), "001011");
        assert_eq!(Field::new_hex("n", 0xAB, 12).render(), "0AB");
        assert_eq!(Field::new_float("n", 21.5, 1).render(), "21.5");
        assert_eq!(Field::new_bytes("n", &[0xAB, 0xC0], 3).render(), "ABC");
        assert_eq!(Field::new_str("n", "hello", 8).render(), "hello");
    }

    #[test]
    fn test_from_string_roundtrip() {
        let mut f = Field::new_hex("n", 0, 16);
        f.set_from_str("BEEF").unwrap();
        assert_eq!(f.render(), "BEEF");

        let mut f = Field::new_int("n", 0, 12);
        f.set_from_str("-2048").unwrap();
        assert_eq!(f.render(), "-2048");

        let mut f = Field::new_bin("n", 0, 8);
        f.set_from_str("1010").unwrap();
        assert_eq!(f.as_u64(), Some(0b1010));

        let mut f = Field::new_bytes("n", &[], 4);
        f.set_from_str("1F2E").unwrap();
        assert_eq!(f.render(), "1F2E");

        let mut f = Field::new_float("n", 0.0, 2);
        f.set_from_str("3.25").unwrap();
        assert_eq!(f.render(), "3.25");
    }

    #[test]
    fn test_malformed_input_leaves_field_unmodified() {
        let mut f = Field::new_uint("n", 99, 8);
        assert_eq!(f.set_from_str("12x"), Err(FieldError::Malformed("unsigned integer")));
        assert_eq!(f.as_u64(), Some(99));

        assert_eq!(f.set_from_str("256"), Err(FieldError::Overflow(8)));
        assert_eq!(f.as_u64(), Some(99));

        let mut f = Field::new_int("n", 5, 8);
        assert_eq!(f.set_from_str("128"), Err(FieldError::Overflow(8)));
        assert_eq!(f.as_i64(), Some(5));

        let mut f = Field::new_bytes("n", &[0x12], 2);
        assert_eq!(f.set_from_str("GG"), Err(FieldError::Malformed("hex bytes")));
        assert_eq!(f.render(), "12");
    }

    #[test]
    fn test_string_truncates_at_width() {
        let mut f = Field::new_str("n", "", 4);
        f.set_from_str("abcdef").unwrap();
        assert_eq!(f.render(), "abcd");
        f.set_from_str("ab").unwrap();
        assert_eq!(f.render(), "ab");
    }

    #[test]
    fn test_increment_wraps_unsigned() {
        let mut f = Field::new_uint("n", 255, 8);
        assert!(f.increment(1));
        assert_eq!(f.as_u64(), Some(0));
        assert!(f.increment(-1));
        assert_eq!(f.as_u64(), Some(255));
    }

    #[test]
    fn test_increment_wraps_signed_twos_complement() {
        let mut f = Field::new_int("n", 127, 8);
        assert!(f.increment(1));
        assert_eq!(f.as_i64(), Some(-128));
        assert!(f.increment(-1));
        assert_eq!(f.as_i64(), Some(127));
    }

    #[test]
    fn test_increment_bytes_ripples_carry() {
        let mut f = Field::new_bytes("n", &[0x0F, 0xF0], 4);
        assert!(f.increment(1));
        assert_eq!(f.render(), "0FF1");
        let mut f = Field::new_bytes("n", &[0x0F, 0xFF], 4);
        assert!(f.increment(1));
        assert_eq!(f.render(), "1000");
        let mut f = Field::new_bytes("n", &[0x10, 0x00], 4);
        assert!(f.increment(-1));
        assert_eq!(f.render(), "0FFF");
        // Only unit steps are meaningful for byte arrays.
        assert!(!f.increment(2));
    }

    #[test]
    fn test_increment_rejected_for_strings() {
        let mut f = Field::new_str("n", "hi", 8);
        assert!(!f.increment(1));
    }

    #[test]
    fn test_copy_conforms_to_destination_width() {
        // A narrower decoded value filling a wider template must still
        // leave the field incrementable over its whole width.
        let mut dst = Field::new_bytes("id", &[], 10);
        let src = Field::new_bytes("id", &[0xAB], 2);
        assert!(dst.copy_value_from(&src));
        assert_eq!(dst.as_bytes().map(<[u8]>::len), Some(5));
        assert!(dst.increment(1));
        assert_eq!(dst.render(), "AB00000001");

        let mut dst = Field::new_str("txt", "", 3);
        assert!(dst.copy_value_from(&Field::new_str("txt", "abcdef", 8)));
        assert_eq!(dst.render(), "abc");
    }

    #[test]
    fn test_copy_matching_by_name_and_kind() {
        let mut dst = FieldSet::new();
        dst.add_hex("code", 0, 24);
        dst.add_uint("repeat", 4, 8);

        let mut src = FieldSet::new();
        src.add_hex("code", 0xABCDEF, 24);
        src.add_str("repeat", "4", 8); // kind mismatch, must not copy

        assert_eq!(dst.copy_matching(&src), 1);
        assert_eq!(dst.get("code").unwrap().as_u64(), Some(0xABCDEF));
        assert_eq!(dst.get("repeat").unwrap().as_u64(), Some(4));
    }
}
