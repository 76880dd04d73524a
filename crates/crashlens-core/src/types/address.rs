//! Module base address type.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Load address of a module inside a dump
///
/// Debugger output prints addresses as hex text (`0x00007f3a2c000000`,
/// `7f3a2c000000`). Wrapping them keeps base addresses from being mixed up
/// with sizes or indices, and gives one place that knows the hex format.
///
/// ## Zero
///
/// A base address of zero means the module was declared but never mapped.
/// Listings drop such entries instead of reporting them as loaded at zero.
///
/// ## Example
///
/// ```rust
/// use crashlens_core::types::Address;
///
/// let base: Address = "0x7f3a2c000000".parse().unwrap();
/// assert_eq!(base.value(), 0x7f3a_2c00_0000);
/// assert_eq!(base.to_string(), "0x00007f3a2c000000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Address(u64);

impl Address
{
    /// The unmapped address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Whether this is the "declared but not loaded" address.
    pub const fn is_zero(self) -> bool
    {
        self.0 == 0
    }

    /// Parse hex text with or without a `0x`/`0X` prefix.
    ///
    /// Returns `None` for empty input, non-hex digits, or values wider than
    /// 64 bits.
    ///
    /// ```rust
    /// use crashlens_core::types::Address;
    ///
    /// assert_eq!(Address::parse_hex("1f"), Some(Address::new(0x1f)));
    /// assert_eq!(Address::parse_hex("0XFF"), Some(Address::new(0xff)));
    /// assert_eq!(Address::parse_hex("0x"), None);
    /// assert_eq!(Address::parse_hex("zz"), None);
    /// ```
    #[must_use]
    pub fn parse_hex(text: &str) -> Option<Self>
    {
        let text = text.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u64::from_str_radix(digits, 16).ok().map(Address)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl FromStr for Address
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        Self::parse_hex(s).ok_or_else(|| format!("not a hex address: {s}"))
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
