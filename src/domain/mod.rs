// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing the core concepts:
// a news article paired with its reference summary, where
// examples come from, and what it means to summarise.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// An (article, reference summary) pair
pub mod example;

// Core abstractions (traits) that other layers implement
pub mod traits;
