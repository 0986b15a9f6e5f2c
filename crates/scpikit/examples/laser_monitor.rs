//! Read a laser setup and drain its alarm event list.
//!
//! Usage: `laser-monitor <host:port>`
//!
//! Connects to the instrument, snapshots and adjusts a couple of source
//! settings, then fetches the most recent alarm events with decoding
//! enabled.

use scpikit::event::{EventList, EventListConfig};
use scpikit::param::{Parameter, ReadingGroup};
use scpikit::transport::{session_handle, FirmwareVersion, ScpiSession, TcpLineClient};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let addr = std::env::args()
        .nth(1)
        .ok_or("usage: laser-monitor <host:port>")?;

    let client = TcpLineClient::connect(addr.as_str())?;
    let session = session_handle(client);

    // The session layer normally negotiates this right after login.
    let version_reply = session.borrow_mut().query_text(":DIAG:SW?")?;
    let (firmware, build) = FirmwareVersion::parse_diag(&version_reply)?;
    println!("instrument software {firmware} (build {build})");

    let mut frequency = Parameter::new(session.clone(), ":SOUR:FREQ");
    let (min, max) = frequency.range()?;
    println!("frequency {} (range {min}..{max})", frequency.get()?);

    let mut errors = ReadingGroup::new(session.clone(), "section errors");
    errors.add_readings(":FETC:SDH:...:SEC", [("ber", "BER"), ("es", "ESEC")])?;
    for (key, value) in errors.get()? {
        match value {
            Some(value) => println!("{key} = {value}"),
            None => println!("{key} = (invalid)"),
        }
    }

    let config = EventListConfig {
        firmware,
        ..EventListConfig::default()
    };
    let mut alarms = EventList::new(session, ":SDH:ALAR:SEC", config);
    alarms.reset_read_position()?;
    println!("{} alarm events pending", alarms.entries_to_read()?);
    for event in alarms.get(20)? {
        println!(
            "event {} type {} count {} duration {}ns",
            event.id, event.event_type, event.count, event.duration
        );
        if let Some(decoded) = event.decoded {
            for (name, field) in decoded.additional_info {
                match field.label {
                    Some(label) => println!("  {name} = {} ({label})", field.raw),
                    None => println!("  {name} = {}", field.raw),
                }
            }
        }
    }

    Ok(())
}
