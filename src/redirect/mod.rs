pub mod consumption;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use consumption::{ConsumeError, Consumption, LinkConsumer};
pub use routes::create_redirect_router;
