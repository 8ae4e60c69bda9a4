pub mod audit;
pub mod cron;
pub mod handlers;
pub mod middleware;
pub mod notifications;
pub mod requote;
pub mod routes;

pub use routes::create_router;
