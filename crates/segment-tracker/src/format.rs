use std::fmt;

/// Container format of the bytes carried by a chunk.
///
/// `Unknown` means "not probed yet", while `Unsupported` is terminal: once a
/// tracker records it, no demuxer can be created for the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamFormat {
    #[default]
    Unknown,
    Unsupported,
    MpegTs,
    Mp4,
    WebM,
    Ogg,
    WebVtt,
    Ttml,
    PackedAac,
    PackedMp3,
    PackedAc3,
}

const TS_PACKET_SIZE: usize = 188;
const TS_SYNC_BYTE: u8 = 0x47;

impl StreamFormat {
    /// Detect a format from the leading bytes of a segment.
    ///
    /// Returns [`StreamFormat::Unknown`] when the signature is inconclusive.
    pub fn from_bytes(data: &[u8]) -> Self {
        if data.starts_with(b"WEBVTT") || data.starts_with(b"\xEF\xBB\xBFWEBVTT") {
            return Self::WebVtt;
        }
        if data.starts_with(b"<?xml") || data.starts_with(b"<tt") {
            return Self::Ttml;
        }
        if data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            return Self::WebM;
        }
        if data.starts_with(b"OggS") {
            return Self::Ogg;
        }
        if data.len() >= 8 {
            let magic = &data[4..8];
            if matches!(magic, b"ftyp" | b"styp" | b"moov" | b"moof" | b"sidx") {
                return Self::Mp4;
            }
        }
        if data.first() == Some(&TS_SYNC_BYTE)
            && data
                .get(TS_PACKET_SIZE)
                .map_or(true, |b| *b == TS_SYNC_BYTE)
        {
            return Self::MpegTs;
        }

        Self::from_packed_audio(skip_id3(data))
    }

    fn from_packed_audio(data: &[u8]) -> Self {
        match data {
            // ADTS: 12 bit sync word, layer bits must be zero
            [0xFF, b1, ..] if b1 & 0xF6 == 0xF0 => Self::PackedAac,
            // MPEG audio: 11 bit sync word, layer bits non zero
            [0xFF, b1, ..] if b1 & 0xE0 == 0xE0 && b1 & 0x06 != 0 => Self::PackedMp3,
            [0x0B, 0x77, ..] => Self::PackedAc3,
            _ => Self::Unknown,
        }
    }

    pub fn from_mime_type(mime_type: &str) -> Self {
        let mime_type = mime_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime_type.as_str() {
            "video/mp2t" => Self::MpegTs,
            "video/mp4" | "audio/mp4" | "application/mp4" | "video/iso.segment"
            | "audio/iso.segment" => Self::Mp4,
            "video/webm" | "audio/webm" => Self::WebM,
            "audio/ogg" | "video/ogg" | "application/ogg" => Self::Ogg,
            "text/vtt" => Self::WebVtt,
            "application/ttml+xml" => Self::Ttml,
            "audio/aac" | "audio/x-aac" => Self::PackedAac,
            "audio/mpeg" | "audio/mp3" => Self::PackedMp3,
            "audio/ac3" | "audio/eac3" => Self::PackedAc3,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for StreamFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "unknown",
            Self::Unsupported => "unsupported",
            Self::MpegTs => "MPEG2-TS",
            Self::Mp4 => "MP4",
            Self::WebM => "WebM",
            Self::Ogg => "Ogg",
            Self::WebVtt => "WebVTT",
            Self::Ttml => "TTML",
            Self::PackedAac => "Packed AAC",
            Self::PackedMp3 => "Packed MP3",
            Self::PackedAc3 => "Packed AC-3",
        };
        f.write_str(name)
    }
}

/// Skip an ID3v2 tag, which packed audio segments commonly start with.
fn skip_id3(data: &[u8]) -> &[u8] {
    const HEADER_SIZE: usize = 10;

    if data.len() < HEADER_SIZE || !data.starts_with(b"ID3") {
        return data;
    }
    // syncsafe integer
    let size = data[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b & 0x7F) as usize);
    let footer = if data[5] & 0x10 != 0 { HEADER_SIZE } else { 0 };

    data.get(HEADER_SIZE + size + footer..).unwrap_or_default()
}
