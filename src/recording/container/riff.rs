//! Little-endian RIFF chunk helpers shared by the AVI and WebP writers

pub(crate) type FourCC = [u8; 4];

pub(crate) fn put_fourcc(buf: &mut Vec<u8>, tag: &FourCC) {
    buf.extend_from_slice(tag);
}

pub(crate) fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i16(buf: &mut Vec<u8>, v: i16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_u24(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes()[..3]);
}

/// Overwrite a u32 previously reserved at `offset`
pub(crate) fn patch_u32(buf: &mut [u8], offset: usize, v: u32) {
    buf[offset..offset + 4].copy_from_slice(&v.to_le_bytes());
}

/// Append a full chunk: tag, size, payload and the pad byte for odd sizes
pub(crate) fn put_chunk(buf: &mut Vec<u8>, tag: &FourCC, payload: &[u8]) {
    put_fourcc(buf, tag);
    put_u32(buf, payload.len() as u32);
    buf.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        buf.push(0);
    }
}

/// Chunk size on disk including header and padding
pub(crate) fn padded_chunk_len(payload_len: usize) -> usize {
    8 + payload_len + (payload_len & 1)
}

pub(crate) fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let b = buf.get(offset..offset + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]))
}

pub(crate) fn read_u24(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset + 3)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], 0]))
}

pub(crate) fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let b = buf.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

/// One chunk found while walking a RIFF body
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk<'a> {
    pub tag: FourCC,
    /// Offset of the tag within the walked buffer
    pub offset: usize,
    pub payload: &'a [u8],
}

/// Iterate the chunks of `buf[start..]`, stopping at the first truncated one
pub(crate) fn chunks(buf: &[u8], start: usize) -> ChunkIter<'_> {
    ChunkIter { buf, pos: start }
}

pub(crate) struct ChunkIter<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let header = self.buf.get(self.pos..self.pos + 8)?;
        let tag = [header[0], header[1], header[2], header[3]];
        let size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
        let payload = self.buf.get(self.pos + 8..self.pos + 8 + size)?;
        let chunk = Chunk {
            tag,
            offset: self.pos,
            payload,
        };
        self.pos += padded_chunk_len(size);
        Some(chunk)
    }
}

/// Payload of the first top-level chunk tagged `tag` in a RIFF file
pub(crate) fn find_chunk<'a>(riff: &'a [u8], tag: &FourCC) -> Option<&'a [u8]> {
    if riff.get(0..4)? != b"RIFF" {
        return None;
    }
    chunks(riff, 12).find(|c| &c.tag == tag).map(|c| c.payload)
}
