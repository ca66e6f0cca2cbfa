//! Asynchronous block-parallel compression and decompression pipeline.
//!
//! Block coding is CPU-bound, so it runs on the runtime's blocking pool via
//! [`tokio::task::spawn_blocking`]; the async task itself only does I/O and
//! ordering. Completed blocks are awaited in submission order, which keeps
//! the container stream ordered without a reorder buffer. Unlike the
//! single-threaded synchronous path, the async compressor always codes
//! blocks independently and never chains the dictionary window.

use std::collections::VecDeque;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;

use crate::checksum::StreamDigest;
use crate::config::StreamSummary;
use crate::container::{
    self, BlockKind, StreamHeader, BLOCK_HEADER_LEN, DIGEST_LEN, END_MARKER_LEN, STREAM_HEADER_LEN,
};
use crate::error::{Error, Result};
use crate::lzma;
use crate::options::{CompressionOptions, DecompressionOptions};

use super::{push_window, Encoded};

/// Compresses data asynchronously from a reader into a writer using the provided options.
///
/// # Parameters
///
/// * `reader` - Input source implementing [`AsyncRead`] + [`Unpin`] traits
/// * `writer` - Output destination implementing [`AsyncWrite`] + [`Unpin`] traits
/// * `options` - Compression configuration options [`CompressionOptions`]
///
/// # Returns
///
/// Returns a [`StreamSummary`] containing statistics about bytes read and written,
/// or an error if compression fails.
///
/// # Errors
///
/// This function will return an error if:
///
/// - Async I/O operations on the reader or writer fail
/// - A working buffer cannot be allocated
/// - A blocking coding task panics or is cancelled
pub async fn compress_async<R, W>(
    mut reader: R,
    mut writer: W,
    options: &CompressionOptions,
) -> Result<StreamSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let session = options.resolve_session()?;
    let params = session.params;
    let threads = session.threads as usize;

    let mut header = Vec::with_capacity(STREAM_HEADER_LEN as usize);
    StreamHeader {
        dict_size: params.dict_size,
        literal_context_bits: params.literal_context_bits,
        integrity: session.integrity,
    }
    .write_to(&mut header)?;
    writer.write_all(&header).await?;

    let mut digest = session.integrity.then(StreamDigest::new);
    let mut in_flight: VecDeque<(u32, JoinHandle<Result<Encoded>>)> = VecDeque::new();
    let mut seq = 0u32;
    let mut total_in = 0u64;
    let mut total_out = STREAM_HEADER_LEN;

    loop {
        let block = read_block_async(&mut reader, session.block_size).await?;
        if block.is_empty() {
            break;
        }
        total_in += block.len() as u64;
        if let Some(digest) = digest.as_mut() {
            digest.update(&block);
        }

        if in_flight.len() >= threads {
            if let Some((done_seq, handle)) = in_flight.pop_front() {
                total_out += write_encoded(&mut writer, done_seq, join(handle).await?).await?;
            }
        }

        let handle = tokio::task::spawn_blocking(move || {
            match lzma::encode_block(&params, &[], &block) {
                Ok(Some(payload)) => Ok(Encoded::Coded {
                    raw_len: block.len(),
                    payload,
                }),
                Ok(None) => Ok(Encoded::Stored(block)),
                Err(err) => Err(err),
            }
        });
        in_flight.push_back((seq, handle));
        seq += 1;
    }

    while let Some((done_seq, handle)) = in_flight.pop_front() {
        total_out += write_encoded(&mut writer, done_seq, join(handle).await?).await?;
    }

    let mut trailer = Vec::new();
    container::write_end_marker(&mut trailer, digest.map(|digest| digest.finish()))?;
    writer.write_all(&trailer).await?;
    total_out += trailer.len() as u64;

    writer.flush().await?;
    Ok(StreamSummary::new(total_in, total_out))
}

/// Decompresses data asynchronously from a reader into a writer using the provided options.
///
/// # Parameters
///
/// * `reader` - Input source implementing [`AsyncRead`] + [`Unpin`] traits
/// * `writer` - Output destination implementing [`AsyncWrite`] + [`Unpin`] traits
/// * `options` - Decompression configuration options [`DecompressionOptions`]
///
/// # Returns
///
/// Returns a [`StreamSummary`] containing statistics about bytes read and written,
/// or an error if decompression fails.
///
/// # Errors
///
/// This function will return an error if:
///
/// - Async I/O operations on the reader or writer fail
/// - The container data is corrupt or truncated
/// - The trailing integrity digest does not match the reconstructed output
/// - A blocking coding task panics or is cancelled
pub async fn decompress_async<R, W>(
    mut reader: R,
    mut writer: W,
    options: &DecompressionOptions,
) -> Result<StreamSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let threads = options.resolved_threads() as usize;

    let mut header_bytes = [0u8; STREAM_HEADER_LEN as usize];
    reader.read_exact(&mut header_bytes).await?;
    let header = StreamHeader::read_from(&mut header_bytes.as_slice())?;
    let dict_size = header.dict_size as usize;

    let mut digest = header.integrity.then(StreamDigest::new);
    let mut window: Vec<u8> = Vec::new();
    let mut in_flight: VecDeque<Slot> = VecDeque::new();
    let mut seq = 0u32;
    let mut total_in = STREAM_HEADER_LEN;
    let mut total_out = 0u64;

    loop {
        let mut control = [0u8; 1];
        reader.read_exact(&mut control).await?;
        if container::is_end_marker(control[0]) {
            total_in += END_MARKER_LEN;
            break;
        }

        let mut head = [0u8; BLOCK_HEADER_LEN as usize];
        head[0] = control[0];
        reader.read_exact(&mut head[1..]).await?;
        let block = match container::read_block_header(&mut head.as_slice())? {
            Some(block) => block,
            None => return Err(Error::CorruptStream("unknown block control byte")),
        };
        total_in += BLOCK_HEADER_LEN;
        if block.seq != seq {
            return Err(Error::CorruptStream("block sequence mismatch"));
        }

        let payload = read_payload_async(&mut reader, block.comp_len as usize).await?;
        total_in += payload.len() as u64;

        // Stored blocks count against the in-flight bound too, or a run of
        // them behind a slow coded block would buffer the rest of the stream.
        if block.kind != BlockKind::CodedChained && in_flight.len() >= threads {
            if let Some(slot) = in_flight.pop_front() {
                let raw = slot.finish().await?;
                total_out +=
                    write_raw(&mut writer, &raw, &mut window, dict_size, digest.as_mut()).await?;
            }
        }

        match block.kind {
            BlockKind::Stored => {
                in_flight.push_back(Slot::Ready(payload));
            }
            BlockKind::CodedReset => {
                let raw_len = block.raw_len as usize;
                in_flight.push_back(Slot::Task(tokio::task::spawn_blocking(move || {
                    lzma::decode_block(
                        header.dict_size,
                        header.literal_context_bits,
                        &[],
                        &payload,
                        raw_len,
                    )
                })));
            }
            BlockKind::CodedChained => {
                // A chained block needs the full output of every earlier
                // block, so drain in-flight work before decoding it.
                while let Some(slot) = in_flight.pop_front() {
                    let raw = slot.finish().await?;
                    total_out +=
                        write_raw(&mut writer, &raw, &mut window, dict_size, digest.as_mut())
                            .await?;
                }

                let carried = window.clone();
                let raw_len = block.raw_len as usize;
                let handle = tokio::task::spawn_blocking(move || {
                    lzma::decode_block(
                        header.dict_size,
                        header.literal_context_bits,
                        &carried,
                        &payload,
                        raw_len,
                    )
                });
                let raw = join(handle).await?;
                total_out +=
                    write_raw(&mut writer, &raw, &mut window, dict_size, digest.as_mut()).await?;
            }
        }
        seq += 1;
    }

    while let Some(slot) = in_flight.pop_front() {
        let raw = slot.finish().await?;
        total_out += write_raw(&mut writer, &raw, &mut window, dict_size, digest.as_mut()).await?;
    }

    if let Some(digest) = digest {
        let mut trailer = [0u8; DIGEST_LEN as usize];
        reader.read_exact(&mut trailer).await?;
        total_in += DIGEST_LEN;

        let expected = u64::from_le_bytes(trailer);
        let actual = digest.finish();
        if expected != actual {
            return Err(Error::IntegrityError { expected, actual });
        }
    }

    writer.flush().await?;
    Ok(StreamSummary::new(total_in, total_out))
}

/// A block whose reconstructed bytes are either already available (stored
/// blocks) or still being produced on the blocking pool.
enum Slot {
    Ready(Vec<u8>),
    Task(JoinHandle<Result<Vec<u8>>>),
}

impl Slot {
    async fn finish(self) -> Result<Vec<u8>> {
        match self {
            Slot::Ready(raw) => Ok(raw),
            Slot::Task(handle) => join(handle).await,
        }
    }
}

async fn join<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    handle
        .await
        .map_err(|err| Error::WorkerFailure(err.to_string()))?
}

async fn read_block_async<R: AsyncRead + Unpin>(
    reader: &mut R,
    block_size: usize,
) -> Result<Vec<u8>> {
    let mut block = Vec::new();
    block
        .try_reserve_exact(block_size)
        .map_err(|_| Error::AllocationFailed {
            capacity: block_size,
        })?;
    block.resize(block_size, 0);

    let mut filled = 0usize;
    while filled < block_size {
        let read = reader.read(&mut block[filled..]).await?;
        if read == 0 {
            break;
        }
        filled += read;
    }
    block.truncate(filled);
    Ok(block)
}

async fn read_payload_async<R: AsyncRead + Unpin>(reader: &mut R, len: usize) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    payload
        .try_reserve_exact(len)
        .map_err(|_| Error::AllocationFailed { capacity: len })?;
    payload.resize(len, 0);
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

async fn write_encoded<W: AsyncWrite + Unpin>(
    writer: &mut W,
    seq: u32,
    encoded: Encoded,
) -> Result<u64> {
    let (kind, raw_len, payload) = match encoded {
        Encoded::Stored(data) => (BlockKind::Stored, data.len(), data),
        Encoded::Coded { raw_len, payload } => (BlockKind::CodedReset, raw_len, payload),
    };

    let mut head = Vec::with_capacity(BLOCK_HEADER_LEN as usize);
    // Lengths are bounded by MAX_BLOCK_SIZE, which fits in u32.
    #[allow(clippy::cast_possible_truncation)]
    container::write_block_header(&mut head, seq, kind, raw_len as u32, payload.len() as u32)?;
    writer.write_all(&head).await?;
    writer.write_all(&payload).await?;
    Ok(BLOCK_HEADER_LEN + payload.len() as u64)
}

async fn write_raw<W: AsyncWrite + Unpin>(
    writer: &mut W,
    raw: &[u8],
    window: &mut Vec<u8>,
    dict_size: usize,
    digest: Option<&mut StreamDigest>,
) -> Result<u64> {
    writer.write_all(raw).await?;
    if let Some(digest) = digest {
        digest.update(raw);
    }
    push_window(window, raw, dict_size);
    Ok(raw.len() as u64)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use crate::pipeline::tests::{FailingReader, SlowReader, EMPTY_SAMPLE, LARGE_SAMPLE, SAMPLE};
    use crate::threading::Threading;

    use super::*;

    /// Test basic async round-trip compression and decompression.
    #[tokio::test(flavor = "current_thread")]
    async fn async_round_trip_works() {
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let compression_summary = compress_async(SAMPLE, &mut compressed, &options)
            .await
            .unwrap();
        assert!(compression_summary.bytes_written > 0);
        assert_eq!(compression_summary.bytes_read, SAMPLE.len() as u64);

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let decompression_summary =
            decompress_async(compressed.as_slice(), &mut decompressed, &options)
                .await
                .unwrap();
        assert_eq!(decompression_summary.bytes_written, SAMPLE.len() as u64);
        assert!(decompressed == SAMPLE);
    }

    /// Test async compression and decompression of empty input.
    #[tokio::test(flavor = "current_thread")]
    async fn async_empty_input() {
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let _ = compress_async(EMPTY_SAMPLE, &mut compressed, &options)
            .await
            .unwrap();

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let decompression_summary =
            decompress_async(compressed.as_slice(), &mut decompressed, &options)
                .await
                .unwrap();
        assert_eq!(decompression_summary.bytes_written, 0);
        assert!(decompressed == EMPTY_SAMPLE);
    }

    /// Test async round trip over multiple blocks.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_multi_block_round_trip() {
        let options = CompressionOptions::default()
            .with_threads(Threading::Exact(3))
            .with_block_size(Some(NonZeroU64::new(64 * 1024).unwrap()));
        let mut compressed = Vec::new();
        let _ = compress_async(LARGE_SAMPLE, &mut compressed, &options)
            .await
            .unwrap();

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default().with_threads(Threading::Exact(3));
        let _ = decompress_async(compressed.as_slice(), &mut decompressed, &options)
            .await
            .unwrap();
        assert!(decompressed == LARGE_SAMPLE);
    }

    /// Test that the async decoder handles chained blocks produced by the
    /// single-threaded synchronous compressor.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_decodes_chained_blocks() {
        let data: Vec<u8> = b"repeated phrases that span block boundaries ".repeat(2000);
        let options = CompressionOptions::default()
            .with_threads(Threading::Exact(1))
            .with_block_size(Some(NonZeroU64::new(8192).unwrap()));
        let mut compressed = Vec::new();
        let _ = crate::pipeline::compress(data.as_slice(), &mut compressed, &options).unwrap();

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default().with_threads(Threading::Exact(2));
        let _ = decompress_async(compressed.as_slice(), &mut decompressed, &options)
            .await
            .unwrap();
        assert!(decompressed == data);
    }

    /// Test async streaming with small chunks.
    #[tokio::test(flavor = "current_thread")]
    async fn async_streaming_small_chunks() {
        let reader = SlowReader::new(SAMPLE, 4);
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let _ = compress_async(reader, &mut compressed, &options)
            .await
            .unwrap();

        let reader = SlowReader::new(&compressed, 8);
        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let _ = decompress_async(reader, &mut decompressed, &options)
            .await
            .unwrap();
        assert!(decompressed == SAMPLE);
    }

    /// Test async error handling - data that is not a container stream.
    #[tokio::test(flavor = "current_thread")]
    async fn async_error_corrupted_data() {
        let corrupted_data = b"This is definitely not a compressed stream";
        let mut decompressed = Vec::new();

        let options = DecompressionOptions::default();
        let result =
            decompress_async(corrupted_data.as_slice(), &mut decompressed, &options).await;
        assert!(matches!(result, Err(Error::CorruptStream(_))));
    }

    /// Test async error handling - I/O errors during reading.
    #[tokio::test(flavor = "current_thread")]
    async fn async_error_io_failure() {
        let failing_reader = FailingReader::new(10);
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();

        let result = compress_async(failing_reader, &mut compressed, &options).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    /// A reader over a slice that publishes how far it has been consumed.
    struct TrackedReader<'a> {
        data: &'a [u8],
        pos: usize,
        consumed: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl AsyncRead for TrackedReader<'_> {
        fn poll_read(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &mut tokio::io::ReadBuf<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            let remaining = self.data.len() - self.pos;
            if remaining > 0 {
                let to_read = std::cmp::min(remaining, buf.remaining());
                let end = self.pos + to_read;
                buf.put_slice(&self.data[self.pos..end]);
                self.pos = end;
                self.consumed
                    .store(end, std::sync::atomic::Ordering::SeqCst);
            }
            std::task::Poll::Ready(Ok(()))
        }
    }

    /// A writer that records the reader position at its first write and
    /// discards the data.
    struct FirstWriteOffset {
        consumed: std::sync::Arc<std::sync::atomic::AtomicUsize>,
        first_write: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl AsyncWrite for FirstWriteOffset {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            let _ = self.first_write.compare_exchange(
                usize::MAX,
                self.consumed.load(std::sync::atomic::Ordering::SeqCst),
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
            );
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    /// Test that a long run of stored blocks streams out incrementally
    /// instead of being buffered until the end marker.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_stored_blocks_stream_incrementally() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        // Pseudorandom input never shrinks, so every block is stored.
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        let data: Vec<u8> = (0..64 * 1024)
            .map(|_| {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                (state >> 56) as u8
            })
            .collect();

        let options = CompressionOptions::default()
            .with_threads(Threading::Exact(2))
            .with_block_size(Some(NonZeroU64::new(4096).unwrap()));
        let mut compressed = Vec::new();
        let _ = compress_async(data.as_slice(), &mut compressed, &options)
            .await
            .unwrap();

        let consumed = Arc::new(AtomicUsize::new(0));
        let first_write = Arc::new(AtomicUsize::new(usize::MAX));
        let reader = TrackedReader {
            data: &compressed,
            pos: 0,
            consumed: Arc::clone(&consumed),
        };
        let writer = FirstWriteOffset {
            consumed: Arc::clone(&consumed),
            first_write: Arc::clone(&first_write),
        };

        let options = DecompressionOptions::default().with_threads(Threading::Exact(2));
        let summary = decompress_async(reader, writer, &options).await.unwrap();
        assert_eq!(summary.bytes_written, data.len() as u64);

        let offset = first_write.load(Ordering::SeqCst);
        assert!(
            offset < compressed.len() / 2,
            "first write only happened at input offset {offset} of {}",
            compressed.len()
        );
    }

    /// Test that sync-compressed streams decode asynchronously and vice versa.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn async_interoperates_with_sync() {
        let data: Vec<u8> = SAMPLE.repeat(100);

        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let _ = compress_async(data.as_slice(), &mut compressed, &options)
            .await
            .unwrap();

        let mut decompressed = Vec::new();
        let _ = crate::pipeline::decompress(
            compressed.as_slice(),
            &mut decompressed,
            &DecompressionOptions::default(),
        )
        .unwrap();
        assert!(decompressed == data);
    }
}
