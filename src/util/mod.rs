//! Small helpers shared by the crawler, the store and the query layer.

pub mod coerce;
pub mod flatten;
pub mod fuzzy;
pub mod paths;

pub use coerce::str2num;
pub use flatten::{flatten_list, flatten_map};
pub use fuzzy::{fuzzy_string_match, FuzzyMatch};
pub use paths::{get_dirs, get_path, get_url};
