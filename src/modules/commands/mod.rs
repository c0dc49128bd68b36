pub mod controller;
pub mod middleware;
pub mod routes;
pub mod schema;

pub use controller::*;
pub use middleware::*;
pub use routes::*;
pub use schema::*;
