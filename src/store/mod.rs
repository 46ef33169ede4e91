//! Flat-file league store: CSV files laid out by league, season and team.

pub mod csv_io;
pub mod frame;
pub mod layout;

pub use csv_io::{read_frame, read_rows, sum_rows, write_rows, Row};
pub use frame::Frame;
pub use layout::StoreLayout;
