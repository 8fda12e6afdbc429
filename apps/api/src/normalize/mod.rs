// Field Normalizer: raw CV record -> display projection.
// Pure and total. No I/O, no error path.

pub mod fields;
pub mod projection;

pub use projection::normalize;
