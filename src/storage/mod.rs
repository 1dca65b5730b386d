pub mod file_lock;
pub mod kv_store;
pub mod layout;
pub mod publish;
