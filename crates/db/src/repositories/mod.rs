pub mod memory;
pub mod session;

pub use memory::InMemorySessionRepository;
pub use session::SqlSessionRepository;

pub(crate) fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
