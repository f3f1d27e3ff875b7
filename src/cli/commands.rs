pub mod import;
pub mod initdb;
pub mod serve;

pub use import::import;
pub use initdb::init_database;
pub use serve::serve;
