/// Header of the fallback raw-PCM output format.
///
/// Layout (little-endian):
/// ```text
/// [0-3]    "RPCM"
/// [4-7]    sample_rate (u32)
/// [8-9]    channels (u16)
/// [10-11]  encoding tag (u16, 1 = PCM16)
/// [12-19]  created_at, Unix milliseconds (i64)
/// [20..]   raw PCM samples
/// ```
pub const PCM_HEADER_SIZE: usize = 20;
pub const PCM_MAGIC: &[u8; 4] = b"RPCM";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub encoding_tag: u16,
    pub created_at_ms: i64,
}

impl PcmHeader {
    pub fn to_bytes(&self) -> [u8; PCM_HEADER_SIZE] {
        let mut header = [0u8; PCM_HEADER_SIZE];
        header[0..4].copy_from_slice(PCM_MAGIC);
        header[4..8].copy_from_slice(&self.sample_rate.to_le_bytes());
        header[8..10].copy_from_slice(&self.channels.to_le_bytes());
        header[10..12].copy_from_slice(&self.encoding_tag.to_le_bytes());
        header[12..20].copy_from_slice(&self.created_at_ms.to_le_bytes());
        header
    }

    /// Parse a header, returning `None` if the magic does not match.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < PCM_HEADER_SIZE || &bytes[0..4] != PCM_MAGIC {
            return None;
        }
        Some(Self {
            sample_rate: u32::from_le_bytes(bytes[4..8].try_into().ok()?),
            channels: u16::from_le_bytes(bytes[8..10].try_into().ok()?),
            encoding_tag: u16::from_le_bytes(bytes[10..12].try_into().ok()?),
            created_at_ms: i64::from_le_bytes(bytes[12..20].try_into().ok()?),
        })
    }
}

/// Serialize samples as little-endian bytes into `out`, replacing its contents.
pub fn samples_to_le_bytes(samples: &[i16], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
}
