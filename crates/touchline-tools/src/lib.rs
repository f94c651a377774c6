//! External data providers used by the retrieval steps.

pub mod sports_data;
pub mod web_search;

pub use sports_data::{team_from_api, SportsDbClient};
pub use web_search::TavilySearch;
