// Many threads feeding one buffer out of order: every record must come out
// exactly once and the spans must tile the stream.
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use stbuffer::STBuffer::{Claim, SequencedUnit, STBufferBuilder};

fn csv(rows: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..rows {
        out.extend_from_slice(format!("{},{}\n", i, i * i).as_bytes());
    }
    out
}

/// Submission order shuffled inside windows, so no unit runs more than
/// `window` positions ahead of its neighbours.
fn windowed_order(units: usize, window: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..units).collect();
    for chunk in order.chunks_mut(window) {
        fastrand::shuffle(chunk);
    }
    order
}

struct Run {
    /// (end sequence, 0) for spans, (sequence, 1) for complete records
    parts: Vec<((u64, u8), Bytes)>,
    covered: u64,
    fragments: Vec<u64>,
}

fn run(data: &[u8], chunk: usize, capacity: usize, window: usize, threads: usize) -> Run {
    let pieces: Vec<Bytes> = data.chunks(chunk).map(Bytes::copy_from_slice).collect();
    let order = Arc::new(windowed_order(pieces.len(), window));
    let pieces = Arc::new(pieces);
    let buffer = Arc::new(
        STBufferBuilder::new()
            .with_capacity(capacity)
            .build()
            .unwrap(),
    );
    let next = Arc::new(AtomicUsize::new(0));
    let parts = Arc::new(Mutex::new(Vec::new()));
    let spans = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let (order, pieces, buffer, next, parts, spans) = (
                order.clone(),
                pieces.clone(),
                buffer.clone(),
                next.clone(),
                parts.clone(),
                spans.clone(),
            );
            thread::spawn(move || loop {
                let position = next.fetch_add(1, Ordering::Relaxed);
                let Some(&index) = order.get(position) else {
                    break;
                };
                let sequence = index as u64 + 1;
                let unit = SequencedUnit::scan(sequence, pieces[index].clone(), b'\n');
                let resolution = loop {
                    match buffer.process(&unit) {
                        Err(e) if e.is_retryable() => thread::yield_now(),
                        other => break other.unwrap(),
                    }
                };
                if let Some(complete) = resolution.complete.clone() {
                    parts.lock().push(((sequence, 1u8), complete));
                }
                spans.lock().extend(resolution.spans());
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let end = pieces.len() as u64 + 1;
    if let Claim::Resolved(span) = buffer.flush(end).unwrap() {
        spans.lock().push(span);
    }
    assert!(buffer.unresolved().is_empty());
    assert!(buffer.validate());

    let spans = std::mem::take(&mut *spans.lock());
    let mut parts = std::mem::take(&mut *parts.lock());
    let covered = spans.iter().map(|s| s.end() - s.start()).sum();
    let mut fragments = Vec::new();
    for span in spans {
        fragments.extend(span.sequence_numbers());
        parts.push(((span.end(), 0), span.to_bytes()));
    }
    parts.sort_by_key(|(key, _)| *key);
    Run {
        parts,
        covered,
        fragments,
    }
}

fn joined(run: &Run) -> Vec<u8> {
    run.parts.iter().flat_map(|(_, b)| b.iter().copied()).collect()
}

#[test]
fn concurrent_out_of_order_reassembly() {
    let data = csv(2_000);
    let chunk = 5;
    let run = run(&data, chunk, 4096, 256, 4);

    println!("spans: {}, parts: {}", run.covered, run.parts.len());
    assert_eq!(joined(&run), data);
    let units = data.chunks(chunk).count() as u64;
    assert_eq!(run.covered, units + 1);
}

#[test]
fn concurrent_reassembly_with_ring_reuse() {
    let data = csv(3_000);
    let chunk = 4;
    // far more units than slots: workers hit WouldBlock and retry
    let run = run(&data, chunk, 64, 16, 4);

    assert_eq!(joined(&run), data);
    let units = data.chunks(chunk).count() as u64;
    assert_eq!(run.covered, units + 1);
}

#[test]
fn every_unit_is_delivered_once() {
    let data = csv(1_000);
    let chunk = 3;
    let pieces: Vec<&[u8]> = data.chunks(chunk).collect();
    let run = run(&data, chunk, 2048, 128, 8);

    // a delimited unit contributes to at most two spans, an undelimited one to exactly one
    let mut seen = vec![0usize; pieces.len() + 2];
    for sequence in &run.fragments {
        seen[*sequence as usize] += 1;
    }
    for (index, piece) in pieces.iter().enumerate() {
        let count = seen[index + 1];
        if piece.contains(&b'\n') {
            assert!((1..=2).contains(&count), "unit {} delivered {} times", index + 1, count);
        } else {
            assert_eq!(count, 1, "unit {} delivered {} times", index + 1, count);
        }
    }
    assert_eq!(joined(&run), data);
}
