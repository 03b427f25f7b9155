//! Page codec
//!
//! Encodes a `Page` into its fixed-size slotted form and back.

use bytes::{Buf, BufMut, Bytes};

use crate::error::{Result, TreeError};

use super::{
    Entry, NodeKind, Page, PageId, HEADER_SIZE, KIND_OFFSET, NEXT_OFFSET, PARENT_OFFSET,
    PREV_OFFSET, RIGHT_POINTER_OFFSET, SLOT_SIZE,
};

impl Page {
    /// Encode into a new buffer of `page_size` bytes
    pub fn encode(&self, page_size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; page_size];
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Encode into `buf`, overwriting all of it
    ///
    /// Fails with `PageOverflow` instead of truncating when the entries do
    /// not fit with room left for the terminating slot check.
    pub fn encode_into(&self, buf: &mut [u8]) -> Result<()> {
        let used = self.used_bytes();
        if used >= buf.len() {
            return Err(TreeError::PageOverflow {
                page_id: self.id,
                used,
                capacity: buf.len(),
            });
        }

        buf.fill(0);
        let directory_end = HEADER_SIZE + self.entries.len() * SLOT_SIZE;
        let (front, data) = buf.split_at_mut(directory_end);

        // Header + directory grow forward
        let mut cursor: &mut [u8] = front;
        cursor.put_u32_le(self.id);
        cursor.put_u32_le(self.kind as u32);
        cursor.put_u32_le(self.parent_id);
        cursor.put_u32_le(self.prev_id);
        cursor.put_u32_le(self.next_id);
        cursor.put_u32_le(self.right_pointer);

        // Data grows backward: value first, then key in front of it
        let mut tail = directory_end + data.len();
        for entry in &self.entries {
            let value_start = tail - entry.value.len();
            let key_start = value_start - entry.key.len();
            data[value_start - directory_end..tail - directory_end].copy_from_slice(&entry.value);
            data[key_start - directory_end..value_start - directory_end]
                .copy_from_slice(&entry.key);
            tail = key_start;

            cursor.put_u32_le(key_start as u32);
            cursor.put_u32_le(entry.key.len() as u32);
            cursor.put_u32_le(entry.value.len() as u32);
        }

        Ok(())
    }

    /// Decode a page from its slotted form
    pub fn decode(buf: &[u8]) -> Result<Page> {
        if buf.len() < HEADER_SIZE + SLOT_SIZE {
            return Err(TreeError::corrupt(
                0,
                format!("buffer of {} bytes is shorter than a header", buf.len()),
            ));
        }

        let id: PageId = field(buf, 0);
        let kind = NodeKind::try_from(field(buf, KIND_OFFSET))
            .map_err(|raw| TreeError::corrupt(id, format!("unknown node kind {}", raw)))?;
        let parent_id = field(buf, PARENT_OFFSET);
        let prev_id = field(buf, PREV_OFFSET);
        let next_id = field(buf, NEXT_OFFSET);
        let right_pointer = field(buf, RIGHT_POINTER_OFFSET);

        // The directory can never run into the data region, so scanning
        // stops at the lowest data offset seen so far.
        let mut entries = Vec::new();
        let mut cursor = HEADER_SIZE;
        let mut data_start = buf.len();
        while cursor + SLOT_SIZE <= data_start {
            let mut slot = &buf[cursor..cursor + SLOT_SIZE];
            let offset = slot.get_u32_le() as usize;
            let key_len = slot.get_u32_le() as usize;
            let value_len = slot.get_u32_le() as usize;
            cursor += SLOT_SIZE;

            if cursor >= offset {
                break;
            }

            let key_end = offset + key_len;
            let value_end = key_end + value_len;
            if value_end > buf.len() {
                return Err(TreeError::corrupt(
                    id,
                    format!(
                        "slot at {} points past the page end ({} > {})",
                        cursor - SLOT_SIZE,
                        value_end,
                        buf.len()
                    ),
                ));
            }

            data_start = data_start.min(offset);
            entries.push(Entry {
                key: Bytes::copy_from_slice(&buf[offset..key_end]),
                value: Bytes::copy_from_slice(&buf[key_end..value_end]),
            });
        }

        Ok(Page {
            id,
            kind,
            parent_id,
            prev_id,
            next_id,
            right_pointer,
            entries,
        })
    }
}

/// Read the header field starting at `offset`
fn field(buf: &[u8], offset: usize) -> u32 {
    (&buf[offset..offset + 4]).get_u32_le()
}
