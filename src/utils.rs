//! Formatting helpers for byte-level debug logging.

use core::fmt;

/// Lazily formats a byte slice as `[0x01, 0xff]`.
pub struct Hex<'a>(&'a [u8]);

/// Wrap `bytes` for `{}` formatting.
pub fn hex(bytes: &[u8]) -> Hex<'_> {
    Hex(bytes)
}

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "0x{b:02x}")?;
        }
        f.write_str("]")
    }
}
