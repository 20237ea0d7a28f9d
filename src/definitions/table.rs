//! Binary table framing shared by every definition record type.
//!
//! Each table file begins with `u16 entry_count`, `u16 table_count`, then
//! `entry_count * table_count` `u16` dynamic-size hints consumed by the
//! per-record parser, followed by `entry_count` records.

use crate::codec::{CodecError, CodecResult, Packet};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("table declares {declared} columns per record, expected {expected}")]
    TableCountMismatch { declared: u16, expected: u16 },
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// A record type that can be parsed out of a binary definition table.
///
/// `parse` receives the per-record slice of dynamic-size hints read from
/// the table header (`hints.len() == table_count`).
pub trait DefinitionRecord: Sized {
    /// Primary numeric id this record is indexed by.
    fn id(&self) -> u32;

    fn parse(reader: &mut Packet, hints: &[u16]) -> CodecResult<Self>;
}

/// Parses every record out of a binary table's raw bytes.
///
/// `expected_table_count`, when given, is asserted against the table's own
/// declared `table_count` and surfaced as a fatal error on mismatch (every
/// boot-time table load is fatal per spec).
pub fn load_table<T: DefinitionRecord>(
    data: &[u8],
    expected_table_count: Option<u16>,
) -> Result<Vec<T>, TableError> {
    let mut reader = Packet::from_bytes(data.to_vec());

    let entry_count = reader.read_u16()?;
    let table_count = reader.read_u16()?;

    if let Some(expected) = expected_table_count {
        if table_count != expected {
            return Err(TableError::TableCountMismatch {
                declared: table_count,
                expected,
            });
        }
    }

    let mut hints = Vec::with_capacity(entry_count as usize * table_count as usize);
    for _ in 0..(entry_count as usize * table_count as usize) {
        hints.push(reader.read_u16()?);
    }

    let mut records = Vec::with_capacity(entry_count as usize);
    for i in 0..entry_count as usize {
        let start = i * table_count as usize;
        let row_hints = &hints[start..start + table_count as usize];
        records.push(T::parse(&mut reader, row_hints)?);
    }

    Ok(records)
}

#[cfg(test)]
mod test {
    use super::*;

    struct Fixed {
        id: u32,
        value: u16,
    }

    impl DefinitionRecord for Fixed {
        fn id(&self) -> u32 {
            self.id
        }

        fn parse(reader: &mut Packet, hints: &[u16]) -> CodecResult<Self> {
            let id = reader.read_u32()?;
            let value = hints[0];
            Ok(Self { id, value })
        }
    }

    fn build_table(entries: &[(u32, u16)]) -> Vec<u8> {
        let mut packet = Packet::new();
        packet.write_u16(entries.len() as u16);
        packet.write_u16(1);
        for (_, hint) in entries {
            packet.write_u16(*hint);
        }
        for (id, _) in entries {
            packet.write_u32(*id);
        }
        packet.into_bytes().to_vec()
    }

    #[test]
    fn parses_entries_and_hints() {
        let data = build_table(&[(1, 10), (2, 20)]);
        let records: Vec<Fixed> = load_table(&data, Some(1)).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, 1);
        assert_eq!(records[0].value, 10);
        assert_eq!(records[1].id, 2);
        assert_eq!(records[1].value, 20);
    }

    #[test]
    fn rejects_table_count_mismatch() {
        let data = build_table(&[(1, 10)]);
        let result: Result<Vec<Fixed>, TableError> = load_table(&data, Some(2));
        assert!(matches!(
            result,
            Err(TableError::TableCountMismatch {
                declared: 1,
                expected: 2
            })
        ));
    }
}
