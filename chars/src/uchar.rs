/// The largest code point addressable in BMP-only ("non-unicode") mode, one
/// past `0xFFFF`.
pub const MAX_BMP: u32 = 0x10000;

/// The largest code point addressable in full Unicode mode, one past
/// `0x10FFFF`.
pub const MAX_UNICODE: u32 = 0x110000;

/// A single Unicode code point in `0..=0x10FFFF`, ordered by value.
///
/// Unlike [`char`], a `UChar` does not exclude the surrogate range, since the
/// automaton and VM need to reason about raw code unit values that a
/// `u16`-indexed `.*` wildcard can touch.
pub type UChar = u32;
