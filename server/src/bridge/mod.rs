pub mod broadcaster;
pub mod registry;
pub mod routes;
pub mod session;
