//! Amount and IBAN validation
//!
//! Pure functions, no I/O.
//!
//! The IBAN check is ISO 7064 MOD-97-10. Like every MOD-97 scheme it catches
//! all single-digit substitutions and almost all transpositions, but two
//! different typos can still produce a number whose remainder is 1. Such
//! collisions are a known limitation; the processor re-validates the account
//! when the external account is attached.

use crate::error::Error;

/// Smallest transferable amount in minor units (1.00)
pub const MIN_AMOUNT_MINOR_UNITS: i64 = 100;
/// Largest transferable amount in minor units (1,000,000.00)
pub const MAX_AMOUNT_MINOR_UNITS: i64 = 100_000_000;

const GERMAN_IBAN_LEN: usize = 22;

/// Check that an amount lies within the transferable range
///
/// Out-of-range amounts are rejected, never clamped.
pub fn validate_amount(amount_minor_units: i64) -> Result<(), Error> {
    if amount_minor_units < MIN_AMOUNT_MINOR_UNITS {
        return Err(Error::InvalidAmount {
            amount: amount_minor_units,
            reason: format!(
                "minimum amount is {} minor units",
                MIN_AMOUNT_MINOR_UNITS
            ),
        });
    }

    if amount_minor_units > MAX_AMOUNT_MINOR_UNITS {
        return Err(Error::InvalidAmount {
            amount: amount_minor_units,
            reason: format!(
                "maximum amount is {} minor units",
                MAX_AMOUNT_MINOR_UNITS
            ),
        });
    }

    Ok(())
}

/// Check a German IBAN
///
/// Whitespace is stripped and letters upper-cased before checking. Anything
/// that is not `DE` followed by exactly 20 digits, or whose MOD-97 remainder
/// is not 1, yields `false`.
pub fn validate_german_iban(iban: &str) -> bool {
    let normalized: String = iban
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    if normalized.len() != GERMAN_IBAN_LEN
        || !normalized.starts_with("DE")
        || !normalized[2..].bytes().all(|b| b.is_ascii_digit())
    {
        return false;
    }

    let (head, tail) = normalized.split_at(4);
    mod97(tail.chars().chain(head.chars())) == Some(1)
}

/// Remainder of the IBAN numeral modulo 97, `None` on characters outside A-Z/0-9
///
/// Letters expand to two digits (A=10 ... Z=35). The numeral is folded one
/// digit at a time so it never needs arbitrary precision.
fn mod97(chars: impl Iterator<Item = char>) -> Option<u32> {
    let mut remainder = 0u32;

    for c in chars {
        match c {
            '0'..='9' => {
                remainder = (remainder * 10 + c.to_digit(10)?) % 97;
            }
            'A'..='Z' => {
                let value = c as u32 - 'A' as u32 + 10;
                remainder = (remainder * 100 + value) % 97;
            }
            _ => return None,
        }
    }

    Some(remainder)
}
