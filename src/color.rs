//! Hex color parsing for material tints
//!
//! Scene files express tints as `#RRGGBB` or `#RRGGBBAA` strings.

use image::Rgba;
use thiserror::Error;

/// Error type for color parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    /// Input string was empty
    #[error("empty color string")]
    Empty,
    /// Input string doesn't start with '#'
    #[error("color must start with '#'")]
    MissingHash,
    /// Invalid length (must be 6 or 8 hex chars after #)
    #[error("invalid color length {0}, expected 6 or 8")]
    InvalidLength(usize),
    /// Contains non-hex characters
    #[error("invalid hex character '{0}'")]
    InvalidHex(char),
}

/// Parse a `#RRGGBB` or `#RRGGBBAA` string into an RGBA color.
///
/// Alpha defaults to 255 (opaque) for the 6-digit form.
///
/// # Examples
///
/// ```
/// use thingshot::color::parse_color;
///
/// let red = parse_color("#FF0000").unwrap();
/// assert_eq!(red, image::Rgba([255, 0, 0, 255]));
///
/// let ghost = parse_color("#00FF0080").unwrap();
/// assert_eq!(ghost, image::Rgba([0, 255, 0, 128]));
/// ```
pub fn parse_color(s: &str) -> Result<Rgba<u8>, ColorError> {
    if s.is_empty() {
        return Err(ColorError::Empty);
    }
    let hex = s.strip_prefix('#').ok_or(ColorError::MissingHash)?;
    if hex.len() != 6 && hex.len() != 8 {
        return Err(ColorError::InvalidLength(hex.len()));
    }
    if let Some(bad) = hex.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(ColorError::InvalidHex(bad));
    }

    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(0);
    let r = channel(0);
    let g = channel(2);
    let b = channel(4);
    let a = if hex.len() == 8 { channel(6) } else { 255 };
    Ok(Rgba([r, g, b, a]))
}
