// tests/property/main.rs

mod queue_exhaustiveness;
