//! Numeric literals of the action language, like `42`, `0x2a`, `0o52`,
//! `0b101010`, `32K` or `1M`.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("number \"{0}\" has wrong format")]
    Format(String),
    #[error("{text} is too big, number must fit into {max_bits} bits")]
    Range { text: String, max_bits: u32 },
}

fn multiplier(suffix: char) -> Option<u64> {
    match suffix.to_ascii_uppercase() {
        'K' => Some(1 << 10),
        'M' => Some(1 << 20),
        'G' => Some(1 << 30),
        _ => None,
    }
}

/// Parses `text` into a value below `2^max_bits`.
///
/// An empty string is zero. A trailing `K`, `M` or `G` multiplies the
/// literal in front of it by 1024, 1024² or 1024³.
pub fn parse_number(text: &str, max_bits: u32) -> Result<u64, ParseError> {
    let Some(last) = text.chars().last() else {
        return Ok(0);
    };

    let (literal, multiplier) = match multiplier(last) {
        Some(multiplier) => (&text[..text.len() - last.len_utf8()], multiplier),
        None => (text, 1),
    };

    // Unsigned only, `parse_int` would negate the value itself.
    if literal.trim_start().starts_with('-') {
        return Err(ParseError::Format(text.to_string()));
    }

    let value: u64 =
        parse_int::parse(literal).map_err(|_| ParseError::Format(text.to_string()))?;

    let out_of_range = || ParseError::Range {
        text: text.to_string(),
        max_bits,
    };

    let value = value.checked_mul(multiplier).ok_or_else(out_of_range)?;

    if max_bits < u64::BITS && value >> max_bits != 0 {
        return Err(out_of_range());
    }

    Ok(value)
}

pub fn parse_u32(text: &str) -> Result<u32, ParseError> {
    parse_number(text, 32).map(|value| value as u32)
}

pub fn parse_u8(text: &str) -> Result<u8, ParseError> {
    parse_number(text, 8).map(|value| value as u8)
}

/// Byte counts are limited to the 32 bit address space.
pub fn parse_size(text: &str) -> Result<usize, ParseError> {
    parse_number(text, 32).map(|value| value as usize)
}
