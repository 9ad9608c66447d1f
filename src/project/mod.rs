//! Metadata project file parsing

mod edmproj_parser;

pub use edmproj_parser::{parse_edmproj, EdmProject};
