//! JSON path engine
//!
//! Navigates responses by dot-separated paths and extracts filtered values
//! for pipeline targets.

pub mod path;
pub mod select;
pub mod value;

pub use path::{
    common_heading, common_heading_all, common_parents, normalize_path, set_values_at,
    strip_heading, values_at,
};
pub use select::{filtered_extract, filtered_extract_with_rng, AlternativeOption, FilterSpec};
pub use value::{is_blank, value_to_string};
