pub mod projection;
pub mod record;

pub use projection::{ContentMode, DisplayProjection, WorkExperience};
pub use record::RawRecord;
