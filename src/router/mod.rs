//! Job routing: plan, dispatch, aggregate.

pub mod dispatch;
pub mod plan;
pub mod router;

pub use plan::{Assignment, RoutingPlan};
pub use router::{JobResponse, ROUTER_ID, Router};
