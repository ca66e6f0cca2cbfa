//! Shared configuration primitives for stream processing.

/// Statistical summary of a completed stream processing operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSummary {
    /// Total number of bytes read from the input source.
    pub bytes_read: u64,

    /// Total number of bytes written to the output destination.
    pub bytes_written: u64,
}

impl StreamSummary {
    /// Creates a new stream summary with the specified byte counts.
    ///
    /// This is used internally by the compression and decompression
    /// pipelines to report statistics after processing completes.
    pub(crate) const fn new(bytes_read: u64, bytes_written: u64) -> Self {
        Self {
            bytes_read,
            bytes_written,
        }
    }

    /// Calculates the compression ratio for this stream summary.
    ///
    /// # Returns
    ///
    /// The compression ratio as an `f64`. A value less than 1.0 indicates
    /// compression occurred, while a value greater than 1.0 indicates expansion.
    #[allow(clippy::cast_precision_loss)]
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_read == 0 {
            if self.bytes_written == 0 {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            self.bytes_written as f64 / self.bytes_read as f64
        }
    }

    /// Calculates the space saved percentage for compression operations.
    ///
    /// # Returns
    ///
    /// The space saved as a percentage (0.0 to 100.0). Positive values indicate
    /// space was saved through compression. Negative values indicate the output
    /// was larger than the input.
    pub fn space_saved_percent(&self) -> f64 {
        if self.bytes_read == 0 {
            0.0
        } else {
            let ratio = self.compression_ratio();
            (1.0 - ratio) * 100.0
        }
    }
}
