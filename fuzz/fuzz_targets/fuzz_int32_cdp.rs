#![no_main]
use jt_tess::{ByteOrder, CdpFormat, EncodedData, SliceSource};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Byte 0: packet layout (bit 0) and byte order (bit 1)
    let format = if data[0] & 1 == 0 { CdpFormat::Cdp2 } else { CdpFormat::Cdp1 };
    let order = if data[0] & 2 == 0 { ByteOrder::Little } else { ByteOrder::Big };

    let mut source = SliceSource::new(&data[1..], order);
    if let Ok(stream) = EncodedData::load(&mut source, format) {
        // Declared counts are untrusted; cap them before decoding
        if stream.value_count() <= 1 << 20 {
            let _ = stream.decode();
        }
    }
});
