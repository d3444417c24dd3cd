// tests/property/main.rs

mod scheduler;
mod speedup;
