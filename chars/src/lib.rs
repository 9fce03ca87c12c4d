/*!
Character-domain primitives used by the backtracking analysis: Unicode code
points, canonical interval sets over them, and [`ICharSet`], an alphabet
refinement that keeps the atoms a pattern actually distinguishes between
pairwise disjoint.

Unicode property data (general category, script, ...) is treated as an
external concern: this crate resolves a pattern's classes into concrete
[`IntervalSet`]s but does not carry its own copy of the Unicode tables.
*/

mod case;
mod charset;
mod ichar;
mod interval;
mod uchar;

pub use case::{canonicalize, canonicalize_set};
pub use charset::ICharSet;
pub use ichar::IChar;
pub use interval::IntervalSet;
pub use uchar::{MAX_BMP, MAX_UNICODE, UChar};
