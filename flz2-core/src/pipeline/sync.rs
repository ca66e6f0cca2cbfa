//! Synchronous block-parallel compression and decompression pipeline.

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter, Read, Write};

use crossbeam_channel::{bounded, TrySendError};

use crate::checksum::StreamDigest;
use crate::config::StreamSummary;
use crate::container::{
    self, BlockHeader, BlockKind, StreamHeader, BLOCK_HEADER_LEN, DIGEST_LEN, END_MARKER_LEN,
    STREAM_HEADER_LEN,
};
use crate::error::{Error, Result};
use crate::lzma;
use crate::options::{CompressionOptions, DecompressionOptions, SessionParams};

use super::{push_window, read_block, Encoded};

/// Compresses data from a reader into a writer using the provided options.
///
/// Input is split into fixed-size blocks. With one worker thread, blocks are
/// coded in place and may chain the dictionary window across block
/// boundaries; with more, blocks are coded independently on worker threads
/// and written back in stream order.
///
/// # Parameters
///
/// * `reader` - Input source implementing [`Read`] trait
/// * `writer` - Output destination implementing [`Write`] trait
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
/// - I/O operations on the reader or writer fail
/// - A working buffer cannot be allocated
/// - A worker thread terminates abnormally
pub fn compress<R, W>(reader: R, writer: W, options: &CompressionOptions) -> Result<StreamSummary>
where
    R: Read,
    W: Write,
{
    let session = options.resolve_session()?;
    let mut reader = BufReader::with_capacity(session.input_capacity, reader);
    let mut writer = BufWriter::with_capacity(session.output_capacity, writer);

    StreamHeader {
        dict_size: session.params.dict_size,
        literal_context_bits: session.params.literal_context_bits,
        integrity: session.integrity,
    }
    .write_to(&mut writer)?;

    let body = if session.threads <= 1 {
        compress_serial(&mut reader, &mut writer, &session)?
    } else {
        compress_parallel(&mut reader, &mut writer, &session)?
    };

    writer.flush()?;
    Ok(StreamSummary::new(
        body.bytes_read,
        body.bytes_written + STREAM_HEADER_LEN,
    ))
}

/// Decompresses data from a reader into a writer using the provided options.
///
/// # Parameters
///
/// * `reader` - Input source implementing [`Read`] trait
/// * `writer` - Output destination implementing [`Write`] trait
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
/// - I/O operations on the reader or writer fail
/// - The container data is corrupt or truncated
/// - The trailing integrity digest does not match the reconstructed output
/// - A worker thread terminates abnormally
pub fn decompress<R, W>(
    reader: R,
    writer: W,
    options: &DecompressionOptions,
) -> Result<StreamSummary>
where
    R: Read,
    W: Write,
{
    let threads = options.resolved_threads();
    let mut reader = BufReader::with_capacity(options.input_capacity(), reader);
    let mut writer = BufWriter::with_capacity(options.output_capacity(), writer);

    let header = StreamHeader::read_from(&mut reader)?;
    let body = if threads <= 1 {
        decompress_serial(&mut reader, &mut writer, &header)?
    } else {
        decompress_parallel(&mut reader, &mut writer, &header, threads as usize)?
    };

    writer.flush()?;
    Ok(StreamSummary::new(
        body.bytes_read + STREAM_HEADER_LEN,
        body.bytes_written,
    ))
}

fn compress_serial<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    session: &SessionParams,
) -> Result<StreamSummary> {
    let dict_size = session.params.dict_size as usize;
    let mut digest = session.integrity.then(StreamDigest::new);
    let mut window: Vec<u8> = Vec::new();
    let mut seq = 0u32;
    let mut total_in = 0u64;
    let mut total_out = 0u64;

    loop {
        let block = read_block(reader, session.block_size)?;
        if block.is_empty() {
            break;
        }
        total_in += block.len() as u64;
        if let Some(digest) = digest.as_mut() {
            digest.update(&block);
        }

        match lzma::encode_block(&session.params, &window, &block)? {
            Some(payload) => {
                let kind = if window.is_empty() {
                    BlockKind::CodedReset
                } else {
                    BlockKind::CodedChained
                };
                total_out += write_record(writer, seq, kind, block.len(), &payload)?;
            }
            None => {
                total_out += write_record(writer, seq, BlockKind::Stored, block.len(), &block)?;
            }
        }
        push_window(&mut window, &block, dict_size);
        seq += 1;
    }

    total_out += write_trailer(writer, digest)?;
    Ok(StreamSummary::new(total_in, total_out))
}

fn compress_parallel<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    session: &SessionParams,
) -> Result<StreamSummary> {
    let threads = session.threads as usize;
    let params = session.params;

    std::thread::scope(|scope| {
        let (job_tx, job_rx) = bounded::<(u32, Vec<u8>)>(threads);
        let (done_tx, done_rx) = bounded::<(u32, Result<Encoded>)>(threads);

        for _ in 0..threads {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                while let Ok((seq, data)) = job_rx.recv() {
                    let result = match lzma::encode_block(&params, &[], &data) {
                        Ok(Some(payload)) => Ok(Encoded::Coded {
                            raw_len: data.len(),
                            payload,
                        }),
                        Ok(None) => Ok(Encoded::Stored(data)),
                        Err(err) => Err(err),
                    };
                    if done_tx.send((seq, result)).is_err() {
                        break;
                    }
                }
            });
        }
        // Only workers hold senders/receivers for their ends now; dropping
        // these lets shutdown propagate through the channels.
        drop(job_rx);
        drop(done_tx);

        let mut digest = session.integrity.then(StreamDigest::new);
        let mut pending: BTreeMap<u32, Encoded> = BTreeMap::new();
        let mut next_write = 0u32;
        let mut seq = 0u32;
        let mut total_in = 0u64;
        let mut total_out = 0u64;

        loop {
            let block = read_block(reader, session.block_size)?;
            if block.is_empty() {
                break;
            }
            total_in += block.len() as u64;
            if let Some(digest) = digest.as_mut() {
                digest.update(&block);
            }

            let mut job = (seq, block);
            loop {
                match job_tx.try_send(job) {
                    Ok(()) => break,
                    Err(TrySendError::Full(returned)) => {
                        job = returned;
                        let (done_seq, result) = recv_done(&done_rx)?;
                        pending.insert(done_seq, result?);
                        total_out += flush_encoded(writer, &mut pending, &mut next_write)?;
                    }
                    Err(TrySendError::Disconnected(_)) => {
                        return Err(worker_gone());
                    }
                }
            }
            seq += 1;

            while let Ok((done_seq, result)) = done_rx.try_recv() {
                pending.insert(done_seq, result?);
            }
            total_out += flush_encoded(writer, &mut pending, &mut next_write)?;
        }

        drop(job_tx);
        while next_write < seq {
            let (done_seq, result) = recv_done(&done_rx)?;
            pending.insert(done_seq, result?);
            total_out += flush_encoded(writer, &mut pending, &mut next_write)?;
        }

        total_out += write_trailer(writer, digest)?;
        Ok(StreamSummary::new(total_in, total_out))
    })
}

fn decompress_serial<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    header: &StreamHeader,
) -> Result<StreamSummary> {
    let dict_size = header.dict_size as usize;
    let mut digest = header.integrity.then(StreamDigest::new);
    let mut window: Vec<u8> = Vec::new();
    let mut expected_seq = 0u32;
    let mut total_in = 0u64;
    let mut total_out = 0u64;

    loop {
        let block = match container::read_block_header(reader)? {
            Some(block) => block,
            None => {
                total_in += END_MARKER_LEN;
                break;
            }
        };
        total_in += BLOCK_HEADER_LEN;
        if block.seq != expected_seq {
            return Err(Error::CorruptStream("block sequence mismatch"));
        }

        let payload = container::read_payload(reader, block.comp_len as usize)?;
        total_in += payload.len() as u64;

        let raw = decode_record(header, &window, &block, payload)?;
        writer.write_all(&raw)?;
        total_out += raw.len() as u64;
        if let Some(digest) = digest.as_mut() {
            digest.update(&raw);
        }
        push_window(&mut window, &raw, dict_size);
        expected_seq += 1;
    }

    total_in += verify_trailer(reader, digest)?;
    Ok(StreamSummary::new(total_in, total_out))
}

fn decompress_parallel<R: Read, W: Write>(
    reader: &mut R,
    writer: &mut W,
    header: &StreamHeader,
    threads: usize,
) -> Result<StreamSummary> {
    let dict_size = header.dict_size as usize;
    let header = *header;

    std::thread::scope(|scope| {
        let (job_tx, job_rx) = bounded::<(u32, BlockHeader, Vec<u8>)>(threads);
        let (done_tx, done_rx) = bounded::<(u32, Result<Vec<u8>>)>(threads);

        for _ in 0..threads {
            let job_rx = job_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || {
                while let Ok((seq, block, payload)) = job_rx.recv() {
                    let result = lzma::decode_block(
                        header.dict_size,
                        header.literal_context_bits,
                        &[],
                        &payload,
                        block.raw_len as usize,
                    );
                    if done_tx.send((seq, result)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_rx);
        drop(done_tx);

        let mut digest = header.integrity.then(StreamDigest::new);
        let mut window: Vec<u8> = Vec::new();
        let mut pending: BTreeMap<u32, Vec<u8>> = BTreeMap::new();
        let mut next_write = 0u32;
        let mut seq = 0u32;
        let mut total_in = 0u64;
        let mut total_out = 0u64;

        loop {
            let block = match container::read_block_header(reader)? {
                Some(block) => block,
                None => {
                    total_in += END_MARKER_LEN;
                    break;
                }
            };
            total_in += BLOCK_HEADER_LEN;
            if block.seq != seq {
                return Err(Error::CorruptStream("block sequence mismatch"));
            }

            let payload = container::read_payload(reader, block.comp_len as usize)?;
            total_in += payload.len() as u64;

            match block.kind {
                BlockKind::Stored => {
                    // Stored blocks skip the workers but still count against
                    // the reorder buffer: once it fills, wait for a coded
                    // predecessor instead of queueing the rest of the stream
                    // behind it. The second condition guarantees a worker
                    // actually holds a block, so recv_done cannot hang.
                    while pending.len() >= threads && (seq - next_write) as usize > pending.len() {
                        let (done_seq, result) = recv_done(&done_rx)?;
                        pending.insert(done_seq, result?);
                        total_out += flush_decoded(
                            writer,
                            &mut pending,
                            &mut next_write,
                            &mut window,
                            dict_size,
                            digest.as_mut(),
                        )?;
                    }
                    pending.insert(seq, payload);
                }
                BlockKind::CodedChained => {
                    // A chained block needs the full output of every earlier
                    // block, so drain in-flight work before decoding it here.
                    total_out += flush_decoded(
                        writer,
                        &mut pending,
                        &mut next_write,
                        &mut window,
                        dict_size,
                        digest.as_mut(),
                    )?;
                    while next_write < seq {
                        let (done_seq, result) = recv_done(&done_rx)?;
                        pending.insert(done_seq, result?);
                        total_out += flush_decoded(
                            writer,
                            &mut pending,
                            &mut next_write,
                            &mut window,
                            dict_size,
                            digest.as_mut(),
                        )?;
                    }

                    let raw = lzma::decode_block(
                        header.dict_size,
                        header.literal_context_bits,
                        &window,
                        &payload,
                        block.raw_len as usize,
                    )?;
                    pending.insert(seq, raw);
                }
                BlockKind::CodedReset => {
                    let mut job = (seq, block, payload);
                    loop {
                        match job_tx.try_send(job) {
                            Ok(()) => break,
                            Err(TrySendError::Full(returned)) => {
                                job = returned;
                                let (done_seq, result) = recv_done(&done_rx)?;
                                pending.insert(done_seq, result?);
                                total_out += flush_decoded(
                                    writer,
                                    &mut pending,
                                    &mut next_write,
                                    &mut window,
                                    dict_size,
                                    digest.as_mut(),
                                )?;
                            }
                            Err(TrySendError::Disconnected(_)) => {
                                return Err(worker_gone());
                            }
                        }
                    }
                }
            }
            seq += 1;

            while let Ok((done_seq, result)) = done_rx.try_recv() {
                pending.insert(done_seq, result?);
            }
            total_out += flush_decoded(
                writer,
                &mut pending,
                &mut next_write,
                &mut window,
                dict_size,
                digest.as_mut(),
            )?;
        }

        drop(job_tx);
        while next_write < seq {
            let (done_seq, result) = recv_done(&done_rx)?;
            pending.insert(done_seq, result?);
            total_out += flush_decoded(
                writer,
                &mut pending,
                &mut next_write,
                &mut window,
                dict_size,
                digest.as_mut(),
            )?;
        }

        total_in += verify_trailer(reader, digest)?;
        Ok(StreamSummary::new(total_in, total_out))
    })
}

fn write_record<W: Write>(
    writer: &mut W,
    seq: u32,
    kind: BlockKind,
    raw_len: usize,
    payload: &[u8],
) -> Result<u64> {
    // Lengths are bounded by MAX_BLOCK_SIZE, which fits in u32.
    #[allow(clippy::cast_possible_truncation)]
    container::write_block_header(writer, seq, kind, raw_len as u32, payload.len() as u32)?;
    writer.write_all(payload)?;
    Ok(BLOCK_HEADER_LEN + payload.len() as u64)
}

fn write_trailer<W: Write>(writer: &mut W, digest: Option<StreamDigest>) -> Result<u64> {
    let digest = digest.map(|digest| digest.finish());
    container::write_end_marker(writer, digest)?;
    Ok(END_MARKER_LEN + if digest.is_some() { DIGEST_LEN } else { 0 })
}

fn verify_trailer<R: Read>(reader: &mut R, digest: Option<StreamDigest>) -> Result<u64> {
    match digest {
        Some(digest) => {
            let expected = container::read_trailer_digest(reader)?;
            let actual = digest.finish();
            if expected != actual {
                return Err(Error::IntegrityError { expected, actual });
            }
            Ok(DIGEST_LEN)
        }
        None => Ok(0),
    }
}

fn decode_record(
    header: &StreamHeader,
    window: &[u8],
    block: &BlockHeader,
    payload: Vec<u8>,
) -> Result<Vec<u8>> {
    match block.kind {
        BlockKind::Stored => Ok(payload),
        BlockKind::CodedReset => lzma::decode_block(
            header.dict_size,
            header.literal_context_bits,
            &[],
            &payload,
            block.raw_len as usize,
        ),
        BlockKind::CodedChained => lzma::decode_block(
            header.dict_size,
            header.literal_context_bits,
            window,
            &payload,
            block.raw_len as usize,
        ),
    }
}

/// Writes completed encoder results that are next in stream order.
fn flush_encoded<W: Write>(
    writer: &mut W,
    pending: &mut BTreeMap<u32, Encoded>,
    next_write: &mut u32,
) -> Result<u64> {
    let mut written = 0u64;
    while let Some(encoded) = pending.remove(next_write) {
        written += match encoded {
            Encoded::Stored(data) => {
                write_record(writer, *next_write, BlockKind::Stored, data.len(), &data)?
            }
            Encoded::Coded { raw_len, payload } => {
                write_record(writer, *next_write, BlockKind::CodedReset, raw_len, &payload)?
            }
        };
        *next_write += 1;
    }
    Ok(written)
}

/// Writes completed decoder results that are next in stream order, keeping
/// the dictionary window and digest in step with the emitted bytes.
fn flush_decoded<W: Write>(
    writer: &mut W,
    pending: &mut BTreeMap<u32, Vec<u8>>,
    next_write: &mut u32,
    window: &mut Vec<u8>,
    dict_size: usize,
    mut digest: Option<&mut StreamDigest>,
) -> Result<u64> {
    let mut written = 0u64;
    while let Some(raw) = pending.remove(next_write) {
        writer.write_all(&raw)?;
        written += raw.len() as u64;
        if let Some(digest) = digest.as_deref_mut() {
            digest.update(&raw);
        }
        push_window(window, &raw, dict_size);
        *next_write += 1;
    }
    Ok(written)
}

fn recv_done<T>(done_rx: &crossbeam_channel::Receiver<(u32, Result<T>)>) -> Result<(u32, Result<T>)> {
    done_rx.recv().map_err(|_| worker_gone())
}

fn worker_gone() -> Error {
    Error::WorkerFailure("worker thread exited unexpectedly".to_string())
}

#[cfg(test)]
mod tests {
    use std::num::{NonZeroU64, NonZeroUsize};

    use crate::pipeline::tests::{
        FailingReader, FailingWriter, SlowReader, EMPTY_SAMPLE, LARGE_SAMPLE, SAMPLE,
    };
    use crate::preset::Preset;
    use crate::threading::Threading;

    use super::*;

    /// Test basic round-trip compression and decompression functionality.
    #[test]
    fn sync_round_trip_works() {
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let compression_summary = compress(SAMPLE, &mut compressed, &options).unwrap();
        assert!(compression_summary.bytes_written > 0);
        assert_eq!(
            usize::try_from(compression_summary.bytes_read).unwrap(),
            SAMPLE.len()
        );

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let decompression_summary =
            decompress(compressed.as_slice(), &mut decompressed, &options).unwrap();
        assert_eq!(
            usize::try_from(decompression_summary.bytes_written).unwrap(),
            SAMPLE.len()
        );
        assert!(decompressed == SAMPLE);
    }

    /// Test compression and decompression of empty input.
    #[test]
    fn sync_empty_input() {
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let compression_summary = compress(EMPTY_SAMPLE, &mut compressed, &options).unwrap();
        // Header, end marker, and digest are always present
        assert!(compression_summary.bytes_written > 0);
        assert_eq!(compression_summary.bytes_read, 0);

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let decompression_summary =
            decompress(compressed.as_slice(), &mut decompressed, &options).unwrap();
        assert_eq!(decompression_summary.bytes_written, 0);
        assert!(decompressed == EMPTY_SAMPLE);
    }

    /// Test compression and decompression of large input data.
    #[test]
    fn sync_large_input() {
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let compression_summary = compress(LARGE_SAMPLE, &mut compressed, &options).unwrap();
        assert!(compression_summary.bytes_written > 0);
        // A run of identical bytes must compress dramatically
        assert!(compression_summary.bytes_written < compression_summary.bytes_read / 10);

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let decompression_summary =
            decompress(compressed.as_slice(), &mut decompressed, &options).unwrap();
        assert_eq!(
            usize::try_from(decompression_summary.bytes_written).unwrap(),
            LARGE_SAMPLE.len()
        );
        assert!(decompressed == LARGE_SAMPLE);
    }

    /// Test compression with different preset levels.
    #[test]
    fn sync_preset_levels() {
        for level in [1, 6, 10] {
            let options = CompressionOptions::default().with_preset(Preset::new(level).unwrap());
            let mut compressed = Vec::new();
            let compression_summary = compress(SAMPLE, &mut compressed, &options).unwrap();
            assert!(compression_summary.bytes_written > 0);

            let mut decompressed = Vec::new();
            let options = DecompressionOptions::default();
            let _ = decompress(compressed.as_slice(), &mut decompressed, &options).unwrap();
            assert!(decompressed == SAMPLE);
        }
    }

    /// Test that raising the preset level never costs more than a small
    /// envelope over the level below it.
    #[test]
    fn sync_preset_monotonicity() {
        let data: Vec<u8> = SAMPLE.repeat(200);
        let mut previous: Option<u64> = None;

        for level in 1..=10 {
            let options = CompressionOptions::default().with_preset(Preset::new(level).unwrap());
            let mut compressed = Vec::new();
            let summary = compress(data.as_slice(), &mut compressed, &options).unwrap();

            let mut decompressed = Vec::new();
            let _ = decompress(
                compressed.as_slice(),
                &mut decompressed,
                &DecompressionOptions::default(),
            )
            .unwrap();
            assert!(decompressed == data);

            if let Some(prev) = previous {
                assert!(
                    summary.bytes_written <= prev + prev / 16,
                    "preset {level} produced {} bytes, preset {} produced {prev}",
                    summary.bytes_written,
                    level - 1
                );
            }
            previous = Some(summary.bytes_written);
        }
    }

    /// Test round trip with the integrity digest disabled.
    #[test]
    fn sync_integrity_disabled() {
        let options = CompressionOptions::default().with_integrity(false);
        let mut compressed = Vec::new();
        let _ = compress(SAMPLE, &mut compressed, &options).unwrap();

        let mut with_digest = Vec::new();
        let _ = compress(SAMPLE, &mut with_digest, &CompressionOptions::default()).unwrap();
        // Disabling the digest removes exactly the 8 trailer bytes
        assert_eq!(compressed.len() + 8, with_digest.len());

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let _ = decompress(compressed.as_slice(), &mut decompressed, &options).unwrap();
        assert!(decompressed == SAMPLE);
    }

    /// Test different buffer sizes.
    #[test]
    fn sync_buffer_sizes() {
        let buffer_sizes = [
            NonZeroUsize::new(1024).unwrap(),
            NonZeroUsize::new(8192).unwrap(),
            NonZeroUsize::new(65536).unwrap(),
        ];

        for size in buffer_sizes {
            let options = CompressionOptions::default()
                .with_input_buffer_size(size)
                .with_output_buffer_size(size);
            let mut compressed = Vec::new();
            let compression_summary = compress(SAMPLE, &mut compressed, &options).unwrap();
            assert!(compression_summary.bytes_written > 0);

            let decompression_options = DecompressionOptions::default()
                .with_input_buffer_size(size)
                .with_output_buffer_size(size);
            let mut decompressed = Vec::new();
            let _ = decompress(
                compressed.as_slice(),
                &mut decompressed,
                &decompression_options,
            )
            .unwrap();
            assert!(decompressed == SAMPLE);
        }
    }

    /// Test threading configurations on both sides of the pipeline.
    #[test]
    fn sync_threading_options() {
        let thread_configs = [Threading::Auto, Threading::Exact(1), Threading::Exact(2)];
        let data: Vec<u8> = SAMPLE.repeat(500);

        for threads in thread_configs {
            let options = CompressionOptions::default()
                .with_threads(threads)
                .with_block_size(Some(NonZeroU64::new(4096).unwrap()));
            let mut compressed = Vec::new();
            let compression_summary = compress(data.as_slice(), &mut compressed, &options).unwrap();
            assert!(compression_summary.bytes_written > 0);

            for decode_threads in thread_configs {
                let decompression_options =
                    DecompressionOptions::default().with_threads(decode_threads);
                let mut decompressed = Vec::new();
                let _ = decompress(
                    compressed.as_slice(),
                    &mut decompressed,
                    &decompression_options,
                )
                .unwrap();
                assert!(decompressed == data);
            }
        }
    }

    /// Test that single-threaded output with chained blocks decodes on any
    /// thread count.
    #[test]
    fn sync_chained_blocks_round_trip() {
        let data: Vec<u8> = b"phrases that repeat across block boundaries ".repeat(3000);
        let options = CompressionOptions::default()
            .with_threads(Threading::Exact(1))
            .with_block_size(Some(NonZeroU64::new(8192).unwrap()));
        let mut compressed = Vec::new();
        let _ = compress(data.as_slice(), &mut compressed, &options).unwrap();

        for decode_threads in [Threading::Exact(1), Threading::Exact(4)] {
            let decompression_options =
                DecompressionOptions::default().with_threads(decode_threads);
            let mut decompressed = Vec::new();
            let _ = decompress(
                compressed.as_slice(),
                &mut decompressed,
                &decompression_options,
            )
            .unwrap();
            assert!(decompressed == data);
        }
    }

    /// A reader over a slice that publishes how far it has been consumed.
    struct TrackedReader<'a> {
        data: &'a [u8],
        pos: usize,
        consumed: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl Read for TrackedReader<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let remaining = self.data.len() - self.pos;
            let to_read = std::cmp::min(remaining, buf.len());
            let end = self.pos + to_read;
            buf[..to_read].copy_from_slice(&self.data[self.pos..end]);
            self.pos = end;
            self.consumed
                .store(end, std::sync::atomic::Ordering::SeqCst);
            Ok(to_read)
        }
    }

    /// A writer that records the reader position at its first write and
    /// discards the data.
    struct FirstWriteOffset {
        consumed: std::sync::Arc<std::sync::atomic::AtomicUsize>,
        first_write: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl Write for FirstWriteOffset {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let _ = self.first_write.compare_exchange(
                usize::MAX,
                self.consumed.load(std::sync::atomic::Ordering::SeqCst),
                std::sync::atomic::Ordering::SeqCst,
                std::sync::atomic::Ordering::SeqCst,
            );
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Test that stored blocks queued behind a coded block stream out
    /// incrementally instead of buffering until the end marker.
    #[test]
    fn sync_stored_blocks_stream_incrementally() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        // One compressible block up front, then pseudorandom blocks that
        // every preset stores verbatim.
        let block = 64 * 1024usize;
        let mut data = SAMPLE.repeat(block / SAMPLE.len() + 1);
        data.truncate(block);
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        data.extend((0..15 * block).map(|_| {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (state >> 56) as u8
        }));

        let options = CompressionOptions::default()
            .with_threads(Threading::Exact(2))
            .with_block_size(Some(NonZeroU64::new(block as u64).unwrap()));
        let mut compressed = Vec::new();
        let _ = compress(data.as_slice(), &mut compressed, &options).unwrap();

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
        let summary = decompress(reader, writer, &options).unwrap();
        assert_eq!(summary.bytes_written, data.len() as u64);

        let offset = first_write.load(Ordering::SeqCst);
        assert!(
            offset < compressed.len() / 2,
            "first write only happened at input offset {offset} of {}",
            compressed.len()
        );
    }

    /// Test streaming with small chunks.
    #[test]
    fn sync_streaming_small_chunks() {
        // Read 4 bytes at a time
        let reader = SlowReader::new(SAMPLE, 4);
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let compression_summary = compress(reader, &mut compressed, &options).unwrap();
        assert!(compression_summary.bytes_written > 0);

        let reader = SlowReader::new(&compressed, 8); // Read 8 bytes at a time
        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let _ = decompress(reader, &mut decompressed, &options).unwrap();
        assert!(decompressed == SAMPLE);
    }

    /// Test summary statistics accuracy.
    #[test]
    fn sync_summary_statistics() {
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let compression_summary = compress(SAMPLE, &mut compressed, &options).unwrap();

        assert_eq!(compression_summary.bytes_read, SAMPLE.len() as u64);
        assert_eq!(compression_summary.bytes_written, compressed.len() as u64);

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let decompression_summary =
            decompress(compressed.as_slice(), &mut decompressed, &options).unwrap();

        assert_eq!(decompression_summary.bytes_read, compressed.len() as u64);
        assert_eq!(decompression_summary.bytes_written, SAMPLE.len() as u64);
    }

    /// Test error handling - data that is not a container stream.
    #[test]
    fn sync_error_corrupted_data() {
        let corrupted_data = b"This is not a valid compressed stream at all";
        let mut decompressed = Vec::new();

        let options = DecompressionOptions::default();
        let result = decompress(corrupted_data.as_slice(), &mut decompressed, &options);

        assert!(matches!(result, Err(Error::CorruptStream(_))));
    }

    /// Test error handling - truncated stream.
    #[test]
    fn sync_error_truncated_stream() {
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let _ = compress(SAMPLE, &mut compressed, &options).unwrap();

        let truncated = &compressed[..compressed.len() / 2];
        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        assert!(decompress(truncated, &mut decompressed, &options).is_err());
    }

    /// Test error handling - flipped payload byte fails the integrity check.
    #[test]
    fn sync_error_integrity_mismatch() {
        // Pseudo-random bytes force a stored block, so a payload flip cannot
        // be caught by the block decoder and must be caught by the digest.
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        let data: Vec<u8> = (0..4096)
            .map(|_| {
                state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
                (state >> 56) as u8
            })
            .collect();

        let mut compressed = Vec::new();
        let options = CompressionOptions::default();
        let _ = compress(data.as_slice(), &mut compressed, &options).unwrap();

        // Flip a byte well inside the stored payload
        let target = compressed.len() / 2;
        compressed[target] ^= 0x40;

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let result = decompress(compressed.as_slice(), &mut decompressed, &options);
        assert!(matches!(result, Err(Error::IntegrityError { .. })));
    }

    /// Test error handling - I/O errors during reading.
    #[test]
    fn sync_error_io_failure() {
        // Fail after 10 bytes
        let failing_reader = FailingReader::new(10);
        let mut compressed = Vec::new();
        let options = CompressionOptions::default();

        let result = compress(failing_reader, &mut compressed, &options);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    /// Test error handling - I/O errors during writing.
    #[test]
    fn sync_error_write_failure() {
        // Fail after 5 bytes; even the stream header cannot be written
        let failing_writer = FailingWriter::new(5);
        let options = CompressionOptions::default();
        let result = compress(SAMPLE, failing_writer, &options);

        assert!(matches!(result, Err(Error::Io(_))));
    }

    /// Test oversized thread count handling (should be clamped, not fail).
    #[test]
    fn sync_oversized_thread_count_is_clamped() {
        let options = CompressionOptions::default().with_threads(Threading::Exact(1000));
        let mut compressed = Vec::new();
        let compression_summary = compress(SAMPLE, &mut compressed, &options).unwrap();
        assert!(compression_summary.bytes_written > 0);

        let mut decompressed = Vec::new();
        let options = DecompressionOptions::default();
        let _ = decompress(compressed.as_slice(), &mut decompressed, &options).unwrap();
        assert!(decompressed == SAMPLE);
    }

    /// Test multiple consecutive operations.
    #[test]
    fn sync_multiple_operations() {
        for _ in 0..5 {
            let mut compressed = Vec::new();
            let options = CompressionOptions::default();
            let compression_summary = compress(SAMPLE, &mut compressed, &options).unwrap();
            assert!(compression_summary.bytes_written > 0);

            let mut decompressed = Vec::new();
            let options = DecompressionOptions::default();
            let _ = decompress(compressed.as_slice(), &mut decompressed, &options).unwrap();
            assert!(decompressed == SAMPLE);
        }
    }

    /// Test that identical inputs produce identical streams for a fixed
    /// configuration.
    #[test]
    fn sync_output_is_deterministic() {
        let data: Vec<u8> = SAMPLE.repeat(200);
        let options = CompressionOptions::default()
            .with_threads(Threading::Exact(3))
            .with_block_size(Some(NonZeroU64::new(4096).unwrap()));

        let mut first = Vec::new();
        let _ = compress(data.as_slice(), &mut first, &options).unwrap();
        let mut second = Vec::new();
        let _ = compress(data.as_slice(), &mut second, &options).unwrap();

        assert_eq!(first, second);
    }
}
