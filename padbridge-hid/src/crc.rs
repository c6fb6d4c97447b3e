//! Bluetooth report checksums
//!
//! Bluetooth DS4 reports end in a little-endian CRC-32 computed over a one
//! byte HID transaction header followed by the report itself (report id
//! included, CRC excluded). The header differs per direction.

/// Header for input reports (DATA | Input)
pub const SEED_INPUT: u8 = 0xA1;

/// Header for output reports (DATA | Output)
pub const SEED_OUTPUT: u8 = 0xA2;

/// Header for feature reports (DATA | Feature)
pub const SEED_FEATURE: u8 = 0xA3;

/// Size of the trailing checksum
pub const CRC_LEN: usize = 4;

/// CRC-32 over `seed ++ data`
pub fn bt_crc32(seed: u8, data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[seed]);
    hasher.update(data);
    hasher.finalize()
}

/// Compare the trailing CRC of `report` against the computed one
///
/// Returns `Err((reported, computed))` on mismatch or when the report cannot
/// hold a CRC at all.
pub fn verify_bt_crc(seed: u8, report: &[u8]) -> Result<(), (u32, u32)> {
    if report.len() < CRC_LEN {
        return Err((0, 0));
    }
    let (body, tail) = report.split_at(report.len() - CRC_LEN);
    let reported = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
    let computed = bt_crc32(seed, body);
    if reported == computed {
        Ok(())
    } else {
        Err((reported, computed))
    }
}

/// Write the CRC of everything before the last four bytes into them
pub fn write_bt_crc(seed: u8, report: &mut [u8]) {
    if report.len() < CRC_LEN {
        return;
    }
    let split = report.len() - CRC_LEN;
    let crc = bt_crc32(seed, &report[..split]);
    report[split..].copy_from_slice(&crc.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_vector() {
        // CRC-32/ISO-HDLC of "123456789" is the usual check value
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(b"123456789");
        assert_eq!(hasher.finalize(), 0xCBF4_3926);
    }

    #[test]
    fn test_seed_changes_checksum() {
        let data = [0x11u8, 0xC0, 0x00, 0x7F];
        assert_ne!(
            bt_crc32(SEED_INPUT, &data),
            bt_crc32(SEED_OUTPUT, &data)
        );
        assert_ne!(
            bt_crc32(SEED_OUTPUT, &data),
            bt_crc32(SEED_FEATURE, &data)
        );
    }

    #[test]
    fn test_write_then_verify() {
        let mut report = [0u8; 78];
        report[0] = 0x11;
        report[5] = 0x80;
        write_bt_crc(SEED_INPUT, &mut report);
        assert!(verify_bt_crc(SEED_INPUT, &report).is_ok());
        assert!(verify_bt_crc(SEED_OUTPUT, &report).is_err());
    }

    #[test]
    fn test_corrupt_crc_detected() {
        let mut report = [0u8; 78];
        report[0] = 0x11;
        write_bt_crc(SEED_INPUT, &mut report);
        report[77] ^= 0x01;
        let (reported, computed) = verify_bt_crc(SEED_INPUT, &report).unwrap_err();
        assert_ne!(reported, computed);
    }

    #[test]
    fn test_too_short_for_crc() {
        assert!(verify_bt_crc(SEED_INPUT, &[0x11, 0x00]).is_err());
        let mut tiny = [0u8; 2];
        write_bt_crc(SEED_INPUT, &mut tiny);
        assert_eq!(tiny, [0, 0]);
    }

    proptest! {
        #[test]
        fn prop_crc_deterministic(data in proptest::collection::vec(any::<u8>(), 0..128)) {
            prop_assert_eq!(bt_crc32(SEED_INPUT, &data), bt_crc32(SEED_INPUT, &data));
        }

        #[test]
        fn prop_crc_single_bit_sensitive(
            data in proptest::collection::vec(any::<u8>(), 1..128),
            idx in any::<prop::sample::Index>(),
            bit in 0u8..8,
        ) {
            let mut flipped = data.clone();
            let i = idx.index(flipped.len());
            flipped[i] ^= 1 << bit;
            prop_assert_ne!(bt_crc32(SEED_INPUT, &data), bt_crc32(SEED_INPUT, &flipped));
        }
    }
}
