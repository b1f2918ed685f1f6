//! Example showing the low-level record API for custom processing.

use fpicon_parser::checksum::{split_header, FLOW_SEED, SUMMARY_SEED};
use fpicon_parser::flow::ChunkScanner;
use fpicon_parser::summary::SummaryRecords;
use fpicon_parser::timestamp::STAMP_LEN;
use fpicon_parser::{DeviceClock, TimestampCodec};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let codec = TimestampCodec::new(DeviceClock::Utc);

    // Every field of every summary record, including the ones sessions ignore
    let data = std::fs::read("SUM0001.FPH")?;
    let (checksum, body) = split_header(SUMMARY_SEED, &data, "SUM0001.FPH")?;
    println!("Summary header checksum: {:?}", checksum);

    for record in SummaryRecords::new(codec, body) {
        let record = record?;
        println!(
            "{} run={}s usage={}s p1..p5=[{} {} {} {} {}] j1..j7={:?} humidifier={}",
            record.time.local,
            record.run_time,
            record.usage,
            record.p1,
            record.p2,
            record.p3,
            record.p4,
            record.p5,
            record.counters,
            record.humidifier
        );
    }

    // Raw flow chunk framing with the uninterpreted trailer bytes
    let data = std::fs::read("FLW0001.FPH")?;
    let (_, body) = split_header(FLOW_SEED, &data, "FLW0001.FPH")?;
    let mut chunks = 0;
    let mut scanner = ChunkScanner::new(body, STAMP_LEN);
    for chunk in scanner.by_ref() {
        chunks += 1;
        println!(
            "chunk {}: {} samples, z1={:?} z2={:?}{}",
            chunks,
            chunk.sample_count(),
            chunk.z1(),
            chunk.z2(),
            if chunk.terminal { " (end of stream)" } else { "" }
        );
    }
    println!("First stream ends at byte {}", scanner.position());

    Ok(())
}
