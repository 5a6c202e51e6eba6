pub mod proxy_configs;
pub mod stubs;
pub mod system;
