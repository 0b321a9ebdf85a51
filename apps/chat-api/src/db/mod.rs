pub mod kv;
pub mod pool;
