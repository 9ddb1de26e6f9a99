pub mod check_config;
pub mod simulate;
pub mod table;
