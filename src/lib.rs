pub mod buzzer;
pub mod config;
