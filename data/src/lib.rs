//! Mission acceptance rules: the data model, the live registry, and the JSON
//! interchange format used for import/export.

mod rule;
pub use rule::*;

mod registry;
pub use registry::*;

pub mod interchange;
pub use interchange::RuleRecord;
