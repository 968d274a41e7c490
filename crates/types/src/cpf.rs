//! Brazilian national ID (CPF).
//!
//! A CPF is 11 decimal digits. The last two are check digits computed from the first nine
//! (and then ten) with descending weights, modulo 11. Numbers made of a single repeated digit
//! satisfy the arithmetic but are not issued, so they are rejected.

use std::str::FromStr;

const CPF_LEN: usize = 11;
const BASE_LEN: usize = 9;

/// Errors returned when parsing a [`Cpf`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CpfError {
    #[error("CPF must have exactly 11 digits")]
    InvalidLength,
    #[error("CPF must contain only digits")]
    NonDigit,
    #[error("CPF cannot be a repeated single digit")]
    RepeatedDigits,
    #[error("CPF check digits do not match")]
    Checksum,
}

/// A validated CPF, stored as its 11-digit string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cpf(String);

impl Cpf {
    /// Parses and validates a CPF.
    ///
    /// Input must be the bare 11 digits; punctuated forms such as `111.444.777-35` are not
    /// accepted.
    pub fn parse(input: &str) -> Result<Self, CpfError> {
        let digits = digits_of(input, CPF_LEN)?;

        if digits.iter().all(|d| *d == digits[0]) {
            return Err(CpfError::RepeatedDigits);
        }

        let (first, second) = check_digits(&digits[..BASE_LEN]);
        if digits[9] != first || digits[10] != second {
            return Err(CpfError::Checksum);
        }

        Ok(Self(input.to_owned()))
    }

    /// Builds a valid CPF from its 9-digit base by appending the check digits.
    pub fn complete(base: &str) -> Result<Self, CpfError> {
        let digits = digits_of(base, BASE_LEN)?;
        let (first, second) = check_digits(&digits);
        Self::parse(&format!("{base}{first}{second}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn digits_of(input: &str, expected_len: usize) -> Result<Vec<u8>, CpfError> {
    if input.len() != expected_len {
        return Err(CpfError::InvalidLength);
    }
    input
        .bytes()
        .map(|b| {
            if b.is_ascii_digit() {
                Ok(b - b'0')
            } else {
                Err(CpfError::NonDigit)
            }
        })
        .collect()
}

/// Computes both check digits for a 9-digit base.
fn check_digits(base: &[u8]) -> (u8, u8) {
    let first = check_digit(base);
    let mut extended = base.to_vec();
    extended.push(first);
    let second = check_digit(&extended);
    (first, second)
}

fn check_digit(digits: &[u8]) -> u8 {
    let top_weight = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .zip((2..=top_weight).rev())
        .map(|(d, w)| u32::from(*d) * w)
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        r => r as u8,
    }
}

impl FromStr for Cpf {
    type Err = CpfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Cpf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Cpf {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for Cpf {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for Cpf {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Cpf::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_known_valid_numbers() {
        for valid in ["11144477735", "82354403933", "52998224725"] {
            assert!(Cpf::parse(valid).is_ok(), "{valid} should be valid");
        }
    }

    #[test]
    fn rejects_wrong_check_digits() {
        assert_eq!(Cpf::parse("11144477736"), Err(CpfError::Checksum));
        assert_eq!(Cpf::parse("11144477725"), Err(CpfError::Checksum));
        assert_eq!(Cpf::parse("12345678901"), Err(CpfError::Checksum));
    }

    #[test]
    fn rejects_bad_shape() {
        assert_eq!(Cpf::parse("1114447773"), Err(CpfError::InvalidLength));
        assert_eq!(Cpf::parse("111444777350"), Err(CpfError::InvalidLength));
        assert_eq!(Cpf::parse("111.444.777"), Err(CpfError::NonDigit));
        assert_eq!(Cpf::parse("1114447773a"), Err(CpfError::NonDigit));
        assert_eq!(Cpf::parse(""), Err(CpfError::InvalidLength));
    }

    #[test]
    fn rejects_repeated_digit_sequences() {
        assert_eq!(Cpf::parse("00000000000"), Err(CpfError::RepeatedDigits));
        assert_eq!(Cpf::parse("99999999999"), Err(CpfError::RepeatedDigits));
    }

    #[test]
    fn complete_appends_check_digits() {
        assert_eq!(Cpf::complete("111444777").unwrap().as_str(), "11144477735");
        assert_eq!(Cpf::complete("529982247").unwrap().as_str(), "52998224725");
        assert_eq!(Cpf::complete("12345"), Err(CpfError::InvalidLength));
    }

    #[test]
    fn serde_validates_on_deserialize() {
        let cpf: Cpf = serde_json::from_str("\"11144477735\"").unwrap();
        assert_eq!(serde_json::to_string(&cpf).unwrap(), "\"11144477735\"");
        assert!(serde_json::from_str::<Cpf>("\"11144477736\"").is_err());
    }
}
