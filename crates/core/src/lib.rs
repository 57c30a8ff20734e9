//! lobbyvox core: long-form game voice-chat session synthesis.
//!
//! A session is a sequence of rounds. Each round walks a fixed category
//! script, picks clips from an on-disk library, colours them with a
//! randomized effect chain and separates them with tiered pauses. The
//! finished buffer is normalized, laid over a background ambience and
//! written as a versioned WAV.
//!
//! [`stream`] is the simpler mode: one folder of clips, loudness-matched and
//! joined by noise-filled pauses.

pub mod audio;
pub mod error;
pub mod library;
pub mod output;
pub mod session;
pub mod splitter;
pub mod stream;
pub mod types;
