//! TC Kimlik No (Turkish national identity number) checksum validation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of characters in a TC Kimlik No.
pub const TC_KIMLIK_LENGTH: usize = 11;

/// Check whether `input` is a structurally valid TC Kimlik No.
///
/// The first character must be 1-9, the remaining ten 0-9. The 10th digit is
/// `(7 * oddSum - evenSum) mod 10` and the 11th is
/// `(oddSum + evenSum + d10) mod 10`, where `oddSum` covers the 1st, 3rd, 5th,
/// 7th and 9th digits and `evenSum` the 2nd, 4th, 6th and 8th.
pub fn is_valid(input: &str) -> bool {
    let bytes = input.as_bytes();
    if bytes.len() != TC_KIMLIK_LENGTH {
        return false;
    }
    if !bytes.iter().all(u8::is_ascii_digit) || bytes[0] == b'0' {
        return false;
    }

    let d: Vec<i32> = bytes.iter().map(|b| i32::from(b - b'0')).collect();

    let odd_sum = d[0] + d[2] + d[4] + d[6] + d[8];
    let even_sum = d[1] + d[3] + d[5] + d[7];

    // The intermediate can go negative (e.g. 1*7 - 36), so `%` is not enough.
    let check10 = (odd_sum * 7 - even_sum).rem_euclid(10);
    if check10 != d[9] {
        return false;
    }

    let check11 = (odd_sum + even_sum + d[9]).rem_euclid(10);
    check11 == d[10]
}

/// A TC Kimlik No that has passed [`is_valid`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TcKimlikNo(String);

impl TcKimlikNo {
    /// Parse and validate, trimming surrounding whitespace.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        is_valid(trimmed).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Masked form for logs, e.g. `123******50`.
    pub fn masked(&self) -> String {
        mask(&self.0)
    }
}

impl fmt::Display for TcKimlikNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TcKimlikNo {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TcKimlikNo::parse(&value).ok_or_else(|| format!("invalid TC Kimlik No: {}", mask(&value)))
    }
}

impl From<TcKimlikNo> for String {
    fn from(value: TcKimlikNo) -> Self {
        value.0
    }
}

/// Mask an identity number for logging, keeping the first 3 and last 2 characters.
pub fn mask(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    if chars.len() <= 5 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 5), tail)
}
