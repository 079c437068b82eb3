pub mod agent;
pub mod feedback;
pub mod session;
