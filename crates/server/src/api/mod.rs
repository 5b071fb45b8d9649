pub mod categories;
pub mod handlers;
pub mod instances;
pub mod middleware;
pub mod routes;
pub mod torrents;

pub use routes::create_router;
