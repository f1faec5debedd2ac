pub mod apps;
pub mod config;
pub mod decode;
pub mod definition;
pub mod flow;
pub mod logger;
pub mod util;
