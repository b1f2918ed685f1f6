//! Example showing a full card import into an in-memory profile.

use fpicon_parser::{Channel, DeviceClock, IconImporter, MemoryProfile};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let importer = IconImporter::builder().clock(DeviceClock::Local).build();
    let mut profile = MemoryProfile::new();

    let summary = importer.import("/media/sdcard", &mut profile)?;
    println!(
        "Imported {} session(s) from {} device(s)",
        summary.sessions(),
        summary.devices()
    );

    for device in profile.devices() {
        println!("{} {} #{}", device.info.brand, device.info.model, device.info.serial);
        for session in device.sessions.values() {
            println!(
                "  {} on {}: {:?}, {} pressure samples, {} flow samples",
                session.id(),
                session.date,
                session.mode(),
                session.sample_count(Channel::Pressure),
                session.sample_count(Channel::FlowRate)
            );
        }
    }

    Ok(())
}
