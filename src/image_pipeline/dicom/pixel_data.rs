//! Assembled pixel data payload of one file

/// Size of an item tag plus its 32-bit length in an encapsulated sequence
const ITEM_HEADER_LEN: u32 = 8;

/// The pixel data element of one file.
///
/// Native data is the raster-ordered concatenation of all frames; encapsulated
/// data keeps one fragment per frame behind a basic offset table.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    Native(Vec<u8>),
    Encapsulated(EncapsulatedPixelData),
}

impl PixelData {
    /// Number of pixel bytes carried, excluding item headers and the offset table
    pub fn payload_len(&self) -> usize {
        match self {
            PixelData::Native(bytes) => bytes.len(),
            PixelData::Encapsulated(sequence) => {
                sequence.fragments.iter().map(Vec::len).sum()
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncapsulatedPixelData {
    /// Offset of each frame's item, measured from the first item after the offset table
    pub offset_table: Vec<u32>,
    /// One fragment per frame, each padded to an even length
    pub fragments: Vec<Vec<u8>>,
    next_offset: u32,
}

impl EncapsulatedPixelData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one compressed frame as a single fragment and records its offset.
    pub fn push_frame(&mut self, bytes: &[u8]) {
        let mut fragment = Vec::with_capacity(bytes.len() + 1);
        fragment.extend_from_slice(bytes);
        if fragment.len() % 2 == 1 {
            fragment.push(0);
        }
        self.offset_table.push(self.next_offset);
        self.next_offset += ITEM_HEADER_LEN + fragment.len() as u32;
        self.fragments.push(fragment);
    }

    pub fn frame_count(&self) -> usize {
        self.fragments.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_account_for_item_headers_and_padding() {
        let mut sequence = EncapsulatedPixelData::new();
        sequence.push_frame(&[1, 2, 3, 4]);
        sequence.push_frame(&[5, 6, 7]);
        sequence.push_frame(&[8, 9]);

        assert_eq!(sequence.offset_table, vec![0, 12, 24]);
        assert_eq!(sequence.fragments[1], vec![5, 6, 7, 0]);
        assert_eq!(sequence.frame_count(), 3);
    }

    #[test]
    fn test_payload_len() {
        let native = PixelData::Native(vec![0; 30]);
        assert_eq!(native.payload_len(), 30);

        let mut sequence = EncapsulatedPixelData::new();
        sequence.push_frame(&[1; 10]);
        sequence.push_frame(&[1; 5]);
        assert_eq!(PixelData::Encapsulated(sequence).payload_len(), 16);
    }
}
