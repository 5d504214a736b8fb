//! Test Fixtures Module
//!
//! Programmatically generated audio for driving sessions:
//! - Normalized detector frames (30 ms, mono 16 kHz)
//! - Transport-layout frames (48 kHz stereo)
//! - Synthesized payloads (WAV)

// Allow dead code in test fixtures - not every test binary uses every helper
#![allow(dead_code)]

pub mod audio_fixtures;

pub use audio_fixtures::*;
