/// SDS011 measurement frame validation and decoding

// SDS011 protocol constants
const FRAME_START: u8 = 0xAA; // First byte of every frame
const FRAME_COMMAND: u8 = 0xC0; // Measurement report command
const FRAME_END: u8 = 0xAB; // Last byte, doubles as the serial watch character
const FRAME_LEN: usize = 10; // Fixed frame length

/// Watch character terminating each serial byte run.
pub const WATCH_BYTE: u8 = FRAME_END;

/// Particulate concentrations decoded from one valid frame, in µg/m³.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticulateReading {
    pub pm25: f64,
    pub pm10: f64,
}

/// Decode an SDS011 measurement frame from a byte run.
///
/// The SDS011 streams 10-byte frames continuously:
/// - Byte 0: start (0xAA)
/// - Byte 1: command (0xC0 for a measurement report)
/// - Bytes 2-3: PM2.5 in tenths of µg/m³, little-endian
/// - Bytes 4-5: PM10 in tenths of µg/m³, little-endian
/// - Bytes 6-7: device ID (not checked)
/// - Byte 8: checksum, low byte of the sum of bytes 2-7
/// - Byte 9: end (0xAB)
///
/// The function is pure and stateless: it validates the first 10 bytes of
/// the run and yields at most one reading. Short, malformed, or corrupted
/// runs decode to `None` — noise is a steady-state occurrence on the serial
/// line, not an error, and each run is validated independently so a bad
/// frame never desynchronizes later ones.
pub fn try_decode(buffer: &[u8]) -> Option<ParticulateReading> {
    if buffer.len() < FRAME_LEN {
        return None;
    }

    if buffer[0] != FRAME_START || buffer[1] != FRAME_COMMAND || buffer[9] != FRAME_END {
        return None;
    }

    let checksum = buffer[2..8]
        .iter()
        .fold(0u8, |sum, byte| sum.wrapping_add(*byte));
    if checksum != buffer[8] {
        return None;
    }

    let pm25 = u16::from_le_bytes([buffer[2], buffer[3]]) as f64 / 10.0;
    let pm10 = u16::from_le_bytes([buffer[4], buffer[5]]) as f64 / 10.0;

    Some(ParticulateReading { pm25, pm10 })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: [u8; 10] = [0xAA, 0xC0, 0x19, 0x00, 0x32, 0x00, 0x00, 0x00, 0x4B, 0xAB];

    #[test]
    fn decodes_a_valid_frame() {
        let reading = try_decode(&VALID).unwrap();
        assert_eq!(reading.pm25, 2.5);
        assert_eq!(reading.pm10, 5.0);
    }

    #[test]
    fn short_run_decodes_to_none() {
        assert_eq!(try_decode(&VALID[..9]), None);
        assert_eq!(try_decode(&[]), None);
    }

    #[test]
    fn longer_run_is_validated_on_its_first_ten_bytes() {
        let mut run = VALID.to_vec();
        run.extend_from_slice(&[0x13, 0x37]);
        assert!(try_decode(&run).is_some());
    }

    #[test]
    fn rejects_wrong_sentinel_bytes() {
        for (index, wrong) in [(0usize, 0xAB), (1, 0xC1), (9, 0xAA)] {
            let mut frame = VALID;
            frame[index] = wrong;
            assert_eq!(try_decode(&frame), None, "byte {index} unchecked");
        }
    }

    #[test]
    fn any_corrupted_payload_byte_fails_the_checksum() {
        for index in 2..8 {
            let mut frame = VALID;
            frame[index] ^= 0x01;
            assert_eq!(try_decode(&frame), None, "byte {index} unchecked");
        }
    }

    #[test]
    fn corrupted_checksum_byte_is_rejected() {
        let mut frame = VALID;
        frame[8] ^= 0xFF;
        assert_eq!(try_decode(&frame), None);
    }

    #[test]
    fn checksum_sums_modulo_256() {
        // 0xFF + 0xFF + 0xFF + 0xFF = 0x3FC, low byte 0xFC.
        let frame = [0xAA, 0xC0, 0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0xFC, 0xAB];
        let reading = try_decode(&frame).unwrap();
        assert_eq!(reading.pm25, 6553.5);
        assert_eq!(reading.pm10, 6553.5);
    }
}
