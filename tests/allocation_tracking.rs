// Allocation tracking for the reassembly hot path.
//
// Note: every test here is marked with #[serial_test::serial]. dhat only allows
// one profiler at a time, and its heap counters would pick up allocations from
// any test running alongside.
//
// # Run all allocation tracking tests
// cargo test --test allocation_tracking -- --nocapture

use bytes::Bytes;
use stbuffer::{FormatterBuilder, STBufferBuilder, SequencedUnit};

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

fn stream(rows: usize) -> Vec<u8> {
    let mut out = Vec::new();
    for i in 0..rows {
        out.extend_from_slice(format!("{},value_{}\n", i, i).as_bytes());
    }
    out
}

#[test]
#[serial_test::serial]
fn test_ring_is_allocated_up_front() {
    println!("\n--- Ring allocation with dhat ---");
    let _dhat = dhat::Profiler::builder().testing().build();

    let buffer = STBufferBuilder::new().with_capacity(1024).build().unwrap();
    let after_build = dhat::HeapStats::get();
    println!("After build: {} blocks, {} bytes", after_build.curr_blocks, after_build.curr_bytes);

    let data = Bytes::from(stream(2_000));
    let units: Vec<SequencedUnit> = data
        .chunks(16)
        .enumerate()
        .map(|(i, _)| {
            let start = i * 16;
            let end = (start + 16).min(data.len());
            SequencedUnit::scan(i as u64 + 1, data.slice(start..end), b'\n')
        })
        .collect();

    println!("Processing {} units in order...", units.len());
    let mut spans = 0;
    for unit in &units {
        let resolution = buffer.process(unit).unwrap();
        spans += resolution.spans().len();
    }
    drop(units);

    let stats = dhat::HeapStats::get();
    println!("Spans: {}, total blocks: {}, live bytes: {}", spans, stats.total_blocks, stats.curr_bytes);
    println!("  Unit bytes are shared slices of one buffer; spans only allocate their fragment lists.");

    // the ring itself never grows
    assert!(stats.max_bytes >= after_build.curr_bytes);
    assert!(buffer.unresolved().len() <= 1);
}

#[test]
#[serial_test::serial]
fn test_released_units_free_their_bytes() {
    println!("\n--- Released payloads with dhat ---");
    let _dhat = dhat::Profiler::builder().testing().build();

    let buffer = STBufferBuilder::new().with_capacity(64).build().unwrap();
    let mut warm = 0;

    for sequence in 1..=1_000u64 {
        let unit = SequencedUnit::scan(sequence, format!("{}\n", sequence).into_bytes(), b'\n');
        let resolution = buffer.process(&unit).unwrap();
        drop(resolution);
        if sequence == 100 {
            warm = dhat::HeapStats::get().curr_bytes;
        }
    }

    let stats = dhat::HeapStats::get();
    println!("Live after 100 units: {} bytes, after 1000 units: {} bytes", warm, stats.curr_bytes);

    // only the newest unit's trailing fragment is still held by the ring
    dhat::assert!(stats.curr_bytes <= warm + 1024);
}

#[test]
#[serial_test::serial]
fn test_formatter_with_memory_stats() {
    println!("\n--- Formatter with memory-stats ---");
    use memory_stats::memory_stats;

    let before = memory_stats();
    println!("Memory before: {:?}", before);

    let formatter = FormatterBuilder::new().with_capacity(4096).build().unwrap();
    let data = stream(20_000);
    let mut records = 0;
    for (i, chunk) in data.chunks(64).enumerate() {
        records += formatter.format(i as u64 + 1, chunk.to_vec()).unwrap().len();
        if i % 2_000 == 0 {
            println!("  Processed {} units", i);
        }
    }
    let units = data.chunks(64).count() as u64;
    records += formatter.finish(units + 1).unwrap().len();

    let after = memory_stats();
    println!("Memory after: {:?}", after);
    if let (Some(b), Some(a)) = (before, after) {
        let delta = a.physical_mem as i64 - b.physical_mem as i64;
        println!("Memory delta: {} bytes ({:.2} KB)", delta, delta as f64 / 1024.0);
    }

    assert_eq!(records, 20_000);
}
