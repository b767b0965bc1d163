//! Bounds-checked logical bit sequence
//!
//! Every stage after the raw sample conversion works on bitmaps: the bit
//! sampler writes into one, line-code decoders read one and write another,
//! protocol decoders pattern-match on them. Bits are packed MSB-first into
//! bytes, the same packing the sampled radio bits arrive in.
//!
//! Out-of-range accesses are deliberately silent: `get` past the end reads
//! as 0 and `set` past the end is dropped. Decoders match sync and line-code
//! patterns right up to the edge of the sampled window and rely on reading
//! zeros there to terminate cleanly.

/// MSB-first bit sequence backed by a byte buffer of fixed capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    bytes: Vec<u8>,
}

impl Bitmap {
    /// A zeroed bitmap able to hold `capacity_bytes * 8` bits.
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            bytes: vec![0; capacity_bytes],
        }
    }

    /// Wrap existing bytes; their bits become addressable MSB-first.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn capacity_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn capacity_bits(&self) -> u32 {
        (self.bytes.len() * 8) as u32
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Read one bit. Out-of-range positions read as false.
    pub fn get(&self, bitpos: u32) -> bool {
        let byte = (bitpos / 8) as usize;
        let bit = 7 - (bitpos & 7);
        if byte >= self.bytes.len() {
            return false;
        }
        (self.bytes[byte] & (1 << bit)) != 0
    }

    /// Write one bit. Out-of-range positions are silently discarded.
    pub fn set(&mut self, bitpos: u32, val: bool) {
        let byte = (bitpos / 8) as usize;
        let bit = 7 - (bitpos & 7);
        if byte >= self.bytes.len() {
            return;
        }
        if val {
            self.bytes[byte] |= 1 << bit;
        } else {
            self.bytes[byte] &= !(1 << bit);
        }
    }

    /// Copy `count` bits from `src` starting at `src_off` into `self` at
    /// `dst_off`.
    ///
    /// Byte-aligned stretches are transferred a byte at a time; when only
    /// the destination is aligned, source bytes are shifted into place with
    /// the computed bit skew; whatever is left goes bit by bit.
    pub fn copy_from(&mut self, mut dst_off: u32, src: &Bitmap, mut src_off: u32, mut count: u32) {
        let dlen = self.bytes.len();
        let slen = src.bytes.len();

        // Both offsets byte aligned: straight byte copy.
        if (dst_off & 7) == 0 && (src_off & 7) == 0 {
            let mut didx = (dst_off / 8) as usize;
            let mut sidx = (src_off / 8) as usize;
            while count > 8 && didx < dlen && sidx < slen {
                self.bytes[didx] = src.bytes[sidx];
                didx += 1;
                sidx += 1;
                count -= 8;
            }
            dst_off = (didx * 8) as u32;
            src_off = (sidx * 8) as u32;
        }

        // Walk bit by bit until the destination is byte aligned.
        while count > 8 && (dst_off & 7) != 0 {
            let bit = src.get(src_off);
            self.set(dst_off, bit);
            src_off += 1;
            dst_off += 1;
            count -= 1;
        }

        // Destination aligned. When the offsets had the same misalignment
        // the walk above left the source aligned too (skew 0), so whole
        // bytes transfer directly; otherwise shift each pair of source
        // bytes into one destination byte.
        if count > 8 {
            let skew = src_off % 8;
            let mut didx = (dst_off / 8) as usize;
            let mut sidx = (src_off / 8) as usize;
            if skew == 0 {
                while count > 8 && didx < dlen && sidx < slen {
                    self.bytes[didx] = src.bytes[sidx];
                    sidx += 1;
                    didx += 1;
                    src_off += 8;
                    dst_off += 8;
                    count -= 8;
                }
            } else {
                while count > 8 && didx < dlen && sidx + 1 < slen {
                    self.bytes[didx] =
                        (src.bytes[sidx] << skew) | (src.bytes[sidx + 1] >> (8 - skew));
                    sidx += 1;
                    didx += 1;
                    src_off += 8;
                    dst_off += 8;
                    count -= 8;
                }
            }
        }

        // Trailing bits.
        while count > 0 {
            let bit = src.get(src_off);
            self.set(dst_off, bit);
            src_off += 1;
            dst_off += 1;
            count -= 1;
        }
    }

    /// Copy `count` bits inside the same bitmap. The ranges may overlap;
    /// the copy direction is chosen so source bits are read before they are
    /// overwritten.
    pub fn copy_within(&mut self, dst_off: u32, src_off: u32, count: u32) {
        if dst_off == src_off || count == 0 {
            return;
        }
        if dst_off < src_off {
            for j in 0..count {
                let bit = self.get(src_off + j);
                self.set(dst_off + j, bit);
            }
        } else {
            for j in (0..count).rev() {
                let bit = self.get(src_off + j);
                self.set(dst_off + j, bit);
            }
        }
    }

    /// Reverse the bit order inside every byte. Used by protocols that
    /// transmit least-significant-bit first.
    pub fn reverse_bytes_bits(&mut self) {
        for byte in self.bytes.iter_mut() {
            let mut b = *byte;
            b = (b & 0xf0) >> 4 | (b & 0x0f) << 4;
            b = (b & 0xcc) >> 2 | (b & 0x33) << 2;
            b = (b & 0xaa) >> 1 | (b & 0x55) << 1;
            *byte = b;
        }
    }

    /// True if the literal 0/1 `pattern` appears at `bitpos`. Positions past
    /// the end read as 0, so a pattern of zeros matches past the end.
    pub fn match_bits(&self, bitpos: u32, pattern: &str) -> bool {
        for (j, ch) in pattern.bytes().enumerate() {
            let expected = ch == b'1';
            if self.get(bitpos + j as u32) != expected {
                return false;
            }
        }
        true
    }

    /// Linear search for `pattern` starting at `start`, scanning at most
    /// `max_bits` positions and never past the bitmap capacity. Returns the
    /// bit offset of the first match.
    ///
    /// There are better algorithms (Boyer-Moore), but sync patterns give a
    /// lot of early mismatches so the vanilla scan is fine.
    pub fn seek_bits(&self, start: u32, max_bits: u32, pattern: &str) -> Option<u32> {
        let end = self.capacity_bits().min(start.saturating_add(max_bits));
        (start..end).find(|&j| self.match_bits(j, pattern))
    }

    /// Bit-for-bit equality between two (possibly identical, possibly
    /// overlapping) bitmaps at the given offsets.
    pub fn match_bitmap(&self, off: u32, other: &Bitmap, other_off: u32, count: u32) -> bool {
        (0..count).all(|j| self.get(off + j) == other.get(other_off + j))
    }

    /// Render `len` bits starting at `off` as a "0110..." string.
    pub fn to_bit_string(&self, off: u32, len: u32) -> String {
        (0..len)
            .map(|j| if self.get(off + j) { '1' } else { '0' })
            .collect()
    }

    /// Write a literal "0110..." pattern at `off`. Handy for building test
    /// vectors without an actual radio capture.
    pub fn set_pattern(&mut self, off: u32, pattern: &str) {
        for (j, ch) in pattern.bytes().enumerate() {
            self.set(off + j as u32, ch == b'1');
        }
    }
}
