pub mod health;
pub use self::health::health;

pub mod jsonrpc;
pub use self::jsonrpc::dispatch;
