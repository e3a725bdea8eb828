pub mod link;
pub mod mqtt;
pub mod retry;
pub mod session;
