// FILE: src/core/bouncer.rs
//! The Bouncer: decides whether typed input is worth an upstream call.
//!
//! Noise is defined as:
//! 1. Input shorter than the minimum length (after trimming)
//! 2. Input made only of punctuation / symbols, separators included

pub struct Bouncer {
    min_chars: usize,
}

impl Bouncer {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    pub fn is_noise(&self, input: &str) -> bool {
        let trimmed = input.trim();

        if trimmed.chars().count() < self.min_chars {
            return true;
        }

        !trimmed.chars().any(|c| c.is_alphanumeric())
    }
}
