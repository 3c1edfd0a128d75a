pub mod debug_log;
pub mod output;
pub mod scenarios;
