mod client;

pub use client::{OpenAIClient, DEFAULT_BASE_URL};
