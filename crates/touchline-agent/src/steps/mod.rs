//! The concrete steps of the question workflow.

pub mod domain_data;
pub mod responder;
pub mod router;
pub mod web_search;

pub use domain_data::DomainDataStep;
pub use responder::ResponderStep;
pub use router::{RouteTargets, RouterStep};
pub use web_search::WebSearchStep;
