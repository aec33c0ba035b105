// Run with: cargo run --example formatter -- <num_rows> [chunk_size]
//
// Cuts a generated CSV into small chunks, submits them to a formatter pool in
// shuffled order and checks that the reassembled records match a plain split.
use sha2::{Digest, Sha256};
use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use stbuffer::Core::scan::split_records;
use stbuffer::{CollectingSink, FormatterBuilder};

fn digest<'a>(records: impl Iterator<Item = &'a [u8]>) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record);
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

fn main() -> stbuffer::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <num_rows> [chunk_size]", args[0]);
        std::process::exit(1);
    }
    let num_rows: usize = args[1].parse().expect("Invalid number of rows");
    let chunk_size: usize = args
        .get(2)
        .map(|s| s.parse().expect("Invalid chunk size"))
        .unwrap_or(7);

    let mut csv = Vec::new();
    for i in 0..num_rows {
        let mut hasher = Sha256::new();
        hasher.update(format!("row_{}", i).as_bytes());
        csv.extend_from_slice(format!("{},{:x}\n", i, hasher.finalize()).as_bytes());
    }
    let chunks: Vec<&[u8]> = csv.chunks(chunk_size).collect();
    println!("Formatter: {} rows in {} chunks of {} bytes", num_rows, chunks.len(), chunk_size);

    // Submission order: shuffled inside windows well below the ring capacity
    let mut order: Vec<usize> = (0..chunks.len()).collect();
    for window in order.chunks_mut(64) {
        fastrand::shuffle(window);
    }

    let running = Arc::new(AtomicBool::new(true));
    let running_for_handler = Arc::clone(&running);
    ctrlc::set_handler(move || {
        running_for_handler.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    let sink = Arc::new(CollectingSink::new());
    let pool = FormatterBuilder::new()
        .with_capacity(1024)
        .with_workers(4)
        .build_pool(sink.clone())?;

    let start = std::time::Instant::now();
    let mut submitted = 0;
    for window in order.chunks(64) {
        if !running.load(Ordering::SeqCst) {
            println!("Formatter: interrupted, flushing what was submitted");
            break;
        }
        for &index in window {
            pool.submit(index as u64 + 1, chunks[index].to_vec())?;
        }
        submitted += window.len();
    }

    let unresolved = pool.shutdown(submitted as u64 + 1)?;
    let elapsed = start.elapsed();

    let records = sink.records();
    let submitted_bytes: usize = chunks[..submitted].iter().map(|c| c.len()).sum();
    let direct: Vec<_> = split_records(csv[..submitted_bytes].to_vec().into(), b'\n').collect();
    let tail = csv[..submitted_bytes]
        .rsplit(|&b| b == b'\n')
        .next()
        .filter(|rest| !rest.is_empty());

    let reassembled = digest(records.iter().map(|r| r.bytes.as_ref()));
    let expected = digest(direct.iter().map(|r| r.as_ref()).chain(tail));

    println!("Formatter: {} records in {:.2?}", records.len(), elapsed);
    println!("Reassembled: {}", reassembled);
    println!("Direct split: {}", expected);
    if !unresolved.is_empty() {
        println!("Unresolved units: {:?}", unresolved);
    }
    for failure in sink.failures() {
        println!("Failed: {:?}", failure);
    }
    if reassembled == expected {
        println!("Formatter: OK");
    } else {
        println!("Formatter: MISMATCH");
        std::process::exit(2);
    }
    Ok(())
}
