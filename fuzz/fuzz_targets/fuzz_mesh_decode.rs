#![no_main]
use jt_tess::{CdpFormat, DecodeOptions, MeshCoderDriver, SchedulerConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    let format = if data[0] & 1 == 0 { CdpFormat::Cdp2 } else { CdpFormat::Cdp1 };
    let driver = MeshCoderDriver::new(DecodeOptions {
        format,
        scheduler: SchedulerConfig::serial(),
        ..Default::default()
    });
    let _ = driver.decode(&data[1..]);
});
