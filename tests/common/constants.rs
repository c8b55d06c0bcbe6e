//! Shared constants for end-to-end tests
//!
//! When fixture behavior changes (link names, album names, etc.),
//! update only this file.

// ============================================================================
// Fake Converter Links
// ============================================================================

/// A single-item link the fake converter turns into one loose song.
pub const LINK_SINGLE: &str = "linkA";

/// A playlist link the fake converter turns into an album folder with two songs.
pub const LINK_PLAYLIST: &str = "playlistA";

/// A link the fake converter always fails on.
pub const LINK_FAILING: &str = "linkB";

/// Album folder created for `LINK_PLAYLIST`.
pub const PLAYLIST_ALBUM: &str = "Road Trip";

/// Songs written into `PLAYLIST_ALBUM`, in track order.
pub const PLAYLIST_SONGS: [&str; 2] = ["01 - Intro.m4a", "02 - Highway.m4a"];

/// Bytes written for every fake audio file.
pub const FAKE_AUDIO_BYTES: &[u8] = b"fake m4a payload for end-to-end tests";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Progress forwarder interval used by the test server (milliseconds)
pub const FEED_POLL_INTERVAL_MS: u64 = 5;

/// Maximum time to wait for a job to complete (milliseconds)
pub const JOB_COMPLETION_TIMEOUT_MS: u64 = 10_000;
