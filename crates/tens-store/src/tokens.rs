//! Raw `tokens.bin` buffers: little-endian `u32` ids, no envelope.

/// Width of one id in bytes.
pub const ID_WIDTH: usize = 4;

/// Packs ids into a buffer.
pub fn pack(ids: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ids.len() * ID_WIDTH);
    for id in ids {
        out.extend_from_slice(&id.to_le_bytes());
    }
    out
}

/// Unpacks a buffer. `None` when its length is not a multiple of [`ID_WIDTH`].
pub fn unpack(bytes: &[u8]) -> Option<Vec<u32>> {
    if bytes.len() % ID_WIDTH != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(ID_WIDTH)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
