//! [BSON Decimal128](https://github.com/mongodb/specifications/blob/master/source/bson-decimal128/decimal128.md) data type representation

use std::fmt;

const EXPONENT_BIAS: i32 = 6176;
const MAX_COEFFICIENT_DIGITS: usize = 34;

/// Struct representing a BSON Decimal128 type.
///
/// The 16 bytes are carried bit-for-bit: reading and re-writing a value never renormalizes it.
/// [`Display`](fmt::Display) renders the canonical string form of the IEEE 754-2008 decimal
/// (BID encoding).
#[derive(Copy, Clone, Hash, PartialEq, Eq)]
pub struct Decimal128 {
    /// BSON bytes containing the decimal128. Stored for round tripping.
    pub(crate) bytes: [u8; 16],
}

impl Decimal128 {
    /// Constructs a new `Decimal128` from the provided raw byte representation.
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    /// Returns the raw byte representation of this `Decimal128`.
    pub const fn bytes(&self) -> [u8; 16] {
        self.bytes
    }

    fn high(&self) -> u64 {
        let mut buf = [0; 8];
        buf.copy_from_slice(&self.bytes[8..]);
        u64::from_le_bytes(buf)
    }

    fn low(&self) -> u64 {
        let mut buf = [0; 8];
        buf.copy_from_slice(&self.bytes[..8]);
        u64::from_le_bytes(buf)
    }

    fn parse(&self) -> Parsed {
        let high = self.high();
        let sign = high >> 63 == 1;
        let combination = (high >> 58) & 0x1F;

        if combination == 0x1F {
            return Parsed::NaN;
        }
        if combination == 0x1E {
            return Parsed::Infinity { sign };
        }

        let (exponent, coefficient) = if (high >> 61) & 0x3 == 0x3 {
            // The implicit leading bits would put the coefficient above 10^34 - 1, which is
            // non-canonical and treated as zero.
            ((high >> 47) & 0x3FFF, 0)
        } else {
            let coefficient =
                (u128::from(high & 0x1_FFFF_FFFF_FFFF) << 64) | u128::from(self.low());
            ((high >> 49) & 0x3FFF, coefficient)
        };
        let coefficient = if coefficient >= 10u128.pow(MAX_COEFFICIENT_DIGITS as u32) {
            0
        } else {
            coefficient
        };

        Parsed::Finite {
            sign,
            exponent: exponent as i32 - EXPONENT_BIAS,
            coefficient,
        }
    }
}

enum Parsed {
    NaN,
    Infinity {
        sign: bool,
    },
    Finite {
        sign: bool,
        exponent: i32,
        coefficient: u128,
    },
}

impl fmt::Debug for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Decimal128(\"{self}\")")
    }
}

impl fmt::Display for Decimal128 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (sign, exponent, coefficient) = match self.parse() {
            Parsed::NaN => return f.write_str("NaN"),
            Parsed::Infinity { sign: true } => return f.write_str("-Infinity"),
            Parsed::Infinity { sign: false } => return f.write_str("Infinity"),
            Parsed::Finite {
                sign,
                exponent,
                coefficient,
            } => (sign, exponent, coefficient),
        };

        let digits = coefficient.to_string();
        let adjusted = exponent + digits.len() as i32 - 1;
        let mut out = String::with_capacity(digits.len() + 8);
        if sign {
            out.push('-');
        }

        if exponent > 0 || adjusted < -6 {
            // scientific notation
            out.push_str(&digits[..1]);
            if digits.len() > 1 {
                out.push('.');
                out.push_str(&digits[1..]);
            }
            out.push('E');
            if adjusted >= 0 {
                out.push('+');
            }
            out.push_str(&adjusted.to_string());
        } else if exponent == 0 {
            out.push_str(&digits);
        } else {
            let scale = exponent.unsigned_abs() as usize;
            if digits.len() > scale {
                let split = digits.len() - scale;
                out.push_str(&digits[..split]);
                out.push('.');
                out.push_str(&digits[split..]);
            } else {
                out.push_str("0.");
                out.extend(std::iter::repeat_n('0', scale - digits.len()));
                out.push_str(&digits);
            }
        }

        f.write_str(&out)
    }
}

#[cfg(test)]
mod test {
    use super::Decimal128;

    fn from_parts(high: u64, low: u64) -> Decimal128 {
        let mut bytes = [0; 16];
        bytes[..8].copy_from_slice(&low.to_le_bytes());
        bytes[8..].copy_from_slice(&high.to_le_bytes());
        Decimal128::from_bytes(bytes)
    }

    #[test]
    fn canonical_strings() {
        assert_eq!(from_parts(0x3040000000000000, 0).to_string(), "0");
        assert_eq!(from_parts(0xB040000000000000, 0).to_string(), "-0");
        assert_eq!(from_parts(0x3040000000000000, 1).to_string(), "1");
        assert_eq!(from_parts(0x303E000000000000, 1).to_string(), "0.1");
        assert_eq!(from_parts(0x3034000000000000, 0x4D2).to_string(), "0.001234");
        assert_eq!(from_parts(0x3042000000000000, 1).to_string(), "1E+1");
        assert_eq!(from_parts(0x7C00000000000000, 0).to_string(), "NaN");
        assert_eq!(from_parts(0x7800000000000000, 0).to_string(), "Infinity");
        assert_eq!(from_parts(0xF800000000000000, 0).to_string(), "-Infinity");
    }

    #[test]
    fn out_of_range_coefficients_read_as_zero() {
        // Implicit 0b100 coefficient prefix.
        assert_eq!(from_parts(0x6C10000000000000, 0).to_string(), "0");
        // 10^34
        assert_eq!(from_parts(0x3041ED09BEAD87C0, 0x378D8E6400000000).to_string(), "0");
        assert_eq!(from_parts(0x3018000000000000, 1234).to_string(), "1.234E-17");
    }

    #[test]
    fn bytes_are_preserved() {
        let bytes = [0xAB; 16];
        assert_eq!(Decimal128::from_bytes(bytes).bytes(), bytes);
    }
}
