// Little-endian binary reading helpers for the EWF section parser

use std::io::{self, Read};

/// Read a u32 little-endian from the current position.
pub fn read_u32_le<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Read a u64 little-endian from the current position.
pub fn read_u64_le<R: Read>(reader: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_integers() {
        let data = [
            0x78, 0x56, 0x34, 0x12, // u32 = 0x12345678
            0xEF, 0xCD, 0xAB, 0x90, 0x78, 0x56, 0x34, 0x12, // u64
        ];
        let mut cursor = Cursor::new(&data[..]);

        assert_eq!(read_u32_le(&mut cursor).unwrap(), 0x12345678);
        assert_eq!(read_u64_le(&mut cursor).unwrap(), 0x123456789ABCDEF);
    }

    #[test]
    fn test_short_input_errors() {
        let mut cursor = Cursor::new(&[0x01u8, 0x02][..]);
        assert!(read_u32_le(&mut cursor).is_err());
    }
}
