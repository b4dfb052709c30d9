//! Streaming threshold (spec.md §4.2 "Streaming threshold"): bodies below
//! this size may be read fully before writing, to allow on-the-fly
//! compression selection; larger bodies are streamed chunk-by-chunk.

/// On the order of hundreds of kilobytes, as specified.
pub const SMALL_FILE_THRESHOLD_BYTES: u64 = 256 * 1024;

/// Fixed-capacity copy buffer for streaming responses (spec.md §4.2:
/// "stream the upstream body to the client using a fixed-capacity copy
/// buffer; do not buffer in memory for full-file length").
pub const STREAM_COPY_BUFFER_BYTES: usize = 64 * 1024;

pub fn should_buffer_fully(content_length: Option<u64>) -> bool {
    matches!(content_length, Some(len) if len < SMALL_FILE_THRESHOLD_BYTES)
}
