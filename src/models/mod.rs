pub mod link;
pub mod visit;

pub use link::{CreateLinkRequest, Link, LinkWithVisits};
pub use visit::{NewVisit, Visit};
