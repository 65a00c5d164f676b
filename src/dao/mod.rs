pub mod error;
pub mod http;
pub mod planning;
pub mod users;
