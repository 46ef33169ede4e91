//! Read-side analysis over the league store.

pub mod form_study;
pub mod query;
pub mod regression;

pub use form_study::{run_form_study, FormStudy};
pub use query::{LeagueQuery, Location, TeamHistory};
pub use regression::LinearRegression;
