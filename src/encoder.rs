//! This module converts binary tables to and from a single bit string: the concatenation of
//! every control sequence, in ascending integer order. This is the on-disk form of a binary
//! program.

use crate::binary::{
    BinarySequence, BitString, ControlSequence, IDENTITY_FLAG_LEN, MAX_LABEL_BITS,
    OPERATION_SEQUENCE_LEN,
};
use crate::binary_table::BinaryTable;
use crate::types::ControlError;

/// Returns the length of one control sequence whose states carry `label_size`-bit labels.
pub fn entry_len(label_size: usize) -> usize {
    2 * (label_size + IDENTITY_FLAG_LEN + OPERATION_SEQUENCE_LEN) + 1
}

/// Encodes a binary table as one bit string.
///
/// Entries are written in ascending integer order, so two tables holding the same entries
/// encode identically regardless of insertion order.
pub fn encode(table: &BinaryTable) -> String {
    table
        .sorted_entries()
        .iter()
        .map(|entry| entry.to_string())
        .collect()
}

/// Decodes a bit string produced by [`encode`].
///
/// The label width is not part of the encoding and must be supplied.
pub fn decode(bits: &str, label_size: usize) -> Result<BinaryTable, ControlError> {
    if label_size == 0 || label_size > MAX_LABEL_BITS {
        return Err(ControlError::InvalidSequence(format!(
            "label size must be between 1 and {MAX_LABEL_BITS}, got {label_size}"
        )));
    }

    let bits: BinarySequence = bits.trim().parse()?;
    let len = entry_len(label_size);
    if bits.len() % len != 0 {
        return Err(ControlError::InvalidSequence(format!(
            "{} bits is not a whole number of {}-bit entries",
            bits.len(),
            len
        )));
    }

    let entries: Vec<ControlSequence> = (0..bits.len())
        .step_by(len)
        .map(|start| bits.slice(start..start + len).to_string().parse())
        .collect::<Result<_, _>>()?;

    tracing::debug!("decoded {} entries of {} bits", entries.len(), len);
    BinaryTable::from_entries(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Direction};
    use crate::controller::Closable;
    use crate::table::{Edge, Table};
    use crate::types::{State, Status, Word};

    fn successor() -> BinaryTable {
        let mut table = Table::from_edges([
            Edge::new(
                State::root(0),
                Word::from('1'),
                Action::Move(Direction::Right),
                State::new(0),
            ),
            Edge::new(
                State::new(0),
                Word::from('0'),
                Action::Write(Word::from('1')),
                State::new(1),
            ),
            Edge::new(
                State::new(1),
                Word::from('1'),
                Action::Write(Word::from('1')),
                State::terminal(2, Status::Success),
            ),
        ])
        .unwrap();
        table.prepare().unwrap();
        table.to_binary().unwrap()
    }

    #[test]
    fn test_entry_len() {
        assert_eq!(entry_len(1), 13);
        assert_eq!(entry_len(2), 15);
    }

    #[test]
    fn test_encode_is_sorted_concatenation() {
        let table = successor();
        let encoded = encode(&table);

        assert_eq!(encoded.len(), table.len() * entry_len(2));

        let ints: Vec<u128> = table.sorted_entries().iter().map(|e| e.to_int()).collect();
        let mut sorted = ints.clone();
        sorted.sort_unstable();
        assert_eq!(ints, sorted);
        assert!(encoded.starts_with(&table.sorted_entries()[0].to_string()));
    }

    #[test]
    fn test_decode_restores_entries() {
        let table = successor();
        let decoded = decode(&encode(&table), 2).unwrap();

        assert_eq!(decoded.len(), table.len());
        for entry in table.entries() {
            assert!(decoded.entries().contains(entry));
        }
        assert_eq!(encode(&decoded), encode(&table));
    }

    #[test]
    fn test_decode_rejects_partial_entries() {
        let mut encoded = encode(&successor());
        encoded.push('1');

        assert!(matches!(
            decode(&encoded, 2),
            Err(ControlError::InvalidSequence(_))
        ));
        assert!(decode("", 0).is_err());
    }

    #[test]
    fn test_decode_empty_string() {
        assert!(decode("", 1).unwrap().is_empty());
    }
}
