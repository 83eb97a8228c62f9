// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Decodes the main (`avih`) and per-stream (`strh`/`strf`) headers out of a parsed chunk tree.

use bitflags::bitflags;

use crate::chunk::ChunkNode;
use crate::error::{fail, AviError, Result};
use crate::fourcc::{AUDS, AVIH, HDRL, MIDS, STRF, STRH, STRL, TXTS, VIDS};
use crate::io::ByteReader;

bitflags! {
    /// Flags carried by `avih.flags`. Bit positions match the values the format has used since
    /// its introduction; unrecognized bits are preserved by `from_bits_retain` rather than
    /// dropped.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AvihFlags: u32 {
        const HAS_INDEX = 0x0000_0010;
        const MUST_USE_INDEX = 0x0000_0020;
        const IS_INTERLEAVED = 0x0000_0100;
        const TRUST_CK_TYPE = 0x0000_0800;
        const WAS_CAPTURE_FILE = 0x0001_0000;
        const COPYRIGHTED = 0x0002_0000;
    }
}

/// The main file header (`avih`), 56 bytes, one per file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avih {
    pub microsec_per_frame: u32,
    pub max_bytes_per_sec: u32,
    pub padding_granularity: u32,
    pub flags: AvihFlags,
    pub total_frames: u32,
    pub initial_frames: u32,
    pub stream_count: u32,
    pub suggested_buffer_size: u32,
    pub width: u32,
    pub height: u32,
    pub reserved: [u32; 4],
}

impl Avih {
    fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(payload);
        Ok(Avih {
            microsec_per_frame: r.read_u32_le()?,
            max_bytes_per_sec: r.read_u32_le()?,
            padding_granularity: r.read_u32_le()?,
            flags: AvihFlags::from_bits_retain(r.read_u32_le()?),
            total_frames: r.read_u32_le()?,
            initial_frames: r.read_u32_le()?,
            stream_count: r.read_u32_le()?,
            suggested_buffer_size: r.read_u32_le()?,
            width: r.read_u32_le()?,
            height: r.read_u32_le()?,
            reserved: [r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?],
        })
    }
}

/// A destination rectangle, as used by `strh.rect`: four signed 16-bit edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

/// A per-stream header (`strh`), 56 bytes, one per `LIST[strl]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strh {
    pub stream_type: crate::fourcc::FourCc,
    pub handler: crate::fourcc::FourCc,
    pub flags: u32,
    pub priority: u16,
    pub language: u16,
    pub initial_frames: u32,
    pub scale: u32,
    pub rate: u32,
    pub start: u32,
    pub length: u32,
    pub suggested_buffer_size: u32,
    pub quality: u32,
    pub sample_size: u32,
    pub rect: Rect,
}

impl Strh {
    fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(payload);
        let stream_type = r.read_fourcc()?;
        let handler = r.read_fourcc()?;
        let flags = r.read_u32_le()?;
        let priority = r.read_u16_le()?;
        let language = r.read_u16_le()?;
        let initial_frames = r.read_u32_le()?;
        let scale = r.read_u32_le()?;
        let rate = r.read_u32_le()?;
        let start = r.read_u32_le()?;
        let length = r.read_u32_le()?;
        let suggested_buffer_size = r.read_u32_le()?;
        let quality = r.read_u32_le()?;
        let sample_size = r.read_u32_le()?;
        let rect = Rect {
            left: r.read_i16_le()?,
            top: r.read_i16_le()?,
            right: r.read_i16_le()?,
            bottom: r.read_i16_le()?,
        };
        Ok(Strh {
            stream_type,
            handler,
            flags,
            priority,
            language,
            initial_frames,
            scale,
            rate,
            start,
            length,
            suggested_buffer_size,
            quality,
            sample_size,
            rect,
        })
    }
}

/// The fixed 40-byte prefix of a video `strf` (BITMAPINFOHEADER). `compression` is left as a raw
/// `u32` since it is either a four-character codec tag or a numeric flag depending on the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapInfoHeader {
    pub header_size: u32,
    pub width: i32,
    pub height: i32,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub image_size: u32,
    pub horizontal_ppm: i32,
    pub vertical_ppm: i32,
    pub colours_used: u32,
    pub colours_important: u32,
}

impl BitmapInfoHeader {
    fn parse(payload: &[u8]) -> Result<Self> {
        let mut r = ByteReader::new(payload);
        Ok(BitmapInfoHeader {
            header_size: r.read_u32_le()?,
            width: r.read_i32_le()?,
            height: r.read_i32_le()?,
            planes: r.read_u16_le()?,
            bit_count: r.read_u16_le()?,
            compression: r.read_u32_le()?,
            image_size: r.read_u32_le()?,
            horizontal_ppm: r.read_i32_le()?,
            vertical_ppm: r.read_i32_le()?,
            colours_used: r.read_u32_le()?,
            colours_important: r.read_u32_le()?,
        })
    }
}

/// The per-stream format descriptor (`strf`), interpreted by `strh.stream_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFormat<'a> {
    Video { info: BitmapInfoHeader, extradata: &'a [u8] },
    /// Audio `strf` is an opaque WAVEFORMATEX-shaped byte range; interpreting it is out of scope.
    Audio(&'a [u8]),
    /// A stream type other than `vids`/`auds` (e.g. `mids`, `txts`); no format is retained.
    Unknown,
}

/// Walks `root`'s `LIST[hdrl]` and decodes `avih` plus every `LIST[strl]`'s `strh`/`strf` pair, in
/// document order. Returns one `(Strh, StreamFormat)` per stream, matching `avih.stream_count`.
pub fn decode_headers<'a>(root: &ChunkNode<'a>) -> Result<(Avih, Vec<(Strh, StreamFormat<'a>)>)> {
    let hdrl = match root.find_list(HDRL) {
        Some(hdrl) => hdrl,
        None => return fail(AviError::MissingAvih),
    };

    let avih_node = match hdrl.find_chunk(AVIH) {
        Some(node) => node,
        None => return fail(AviError::MissingAvih),
    };
    if avih_node.length != 56 {
        return fail(AviError::BadAvihSize { actual: avih_node.length });
    }
    let avih = Avih::parse(avih_node.payload)?;

    let mut streams = Vec::new();
    for strl in hdrl.find_lists(STRL) {
        streams.push(decode_strl(strl)?);
    }

    if avih.stream_count > 255 {
        return fail(AviError::TooManyStreams { declared: avih.stream_count });
    }
    if streams.len() != avih.stream_count as usize {
        return fail(AviError::StreamCountMismatch {
            declared: avih.stream_count,
            observed: streams.len() as u32,
        });
    }

    Ok((avih, streams))
}

fn decode_strl<'a>(strl: &ChunkNode<'a>) -> Result<(Strh, StreamFormat<'a>)> {
    let strh_positions: Vec<usize> =
        strl.children.iter().enumerate().filter(|(_, c)| c.identifier == STRH).map(|(i, _)| i).collect();
    if strh_positions.is_empty() {
        return fail(AviError::MissingStrh);
    }
    if strh_positions.len() > 1 {
        return fail(AviError::DuplicateStrh);
    }
    let strh_idx = strh_positions[0];
    let strh_node = &strl.children[strh_idx];
    if strh_node.length != 56 {
        return fail(AviError::BadStrhSize { actual: strh_node.length });
    }
    let strh = Strh::parse(strh_node.payload)?;

    let strf_positions: Vec<usize> =
        strl.children.iter().enumerate().filter(|(_, c)| c.identifier == STRF).map(|(i, _)| i).collect();
    if strf_positions.is_empty() {
        return fail(AviError::MissingStrf);
    }
    if strf_positions.len() > 1 {
        return fail(AviError::DuplicateStrf);
    }
    let strf_idx = strf_positions[0];
    if strf_idx < strh_idx {
        return fail(AviError::StrfBeforeStrh);
    }
    let strf_node = &strl.children[strf_idx];

    let format = if strh.stream_type == VIDS {
        if strf_node.length < 40 {
            return fail(AviError::BadStrfSize { actual: strf_node.length });
        }
        let info = BitmapInfoHeader::parse(&strf_node.payload[..40])?;
        StreamFormat::Video { info, extradata: &strf_node.payload[40..] }
    } else if strh.stream_type == AUDS {
        StreamFormat::Audio(strf_node.payload)
    } else {
        if strh.stream_type == MIDS || strh.stream_type == TXTS {
            log::warn!("stream type '{}' retains no interpreted format", strh.stream_type);
        } else {
            log::debug!("unrecognized stream type '{}'", strh.stream_type);
        }
        StreamFormat::Unknown
    };

    Ok((strh, format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::parse_chunks;

    fn chunk(out: &mut Vec<u8>, tag: &[u8; 4], payload: &[u8]) {
        out.extend_from_slice(tag);
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        if payload.len() % 2 == 1 {
            out.push(0);
        }
    }

    fn list(out: &mut Vec<u8>, form: &[u8; 4], children: &[u8]) {
        let mut payload = Vec::new();
        payload.extend_from_slice(form);
        payload.extend_from_slice(children);
        chunk(out, b"LIST", &payload);
    }

    fn avih_bytes(stream_count: u32) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&1000u32.to_le_bytes()); // microsec_per_frame
        b.extend_from_slice(&0u32.to_le_bytes()); // max_bytes_per_sec
        b.extend_from_slice(&0u32.to_le_bytes()); // padding_granularity
        b.extend_from_slice(&0x10u32.to_le_bytes()); // flags: HAS_INDEX
        b.extend_from_slice(&10u32.to_le_bytes()); // total_frames
        b.extend_from_slice(&0u32.to_le_bytes()); // initial_frames
        b.extend_from_slice(&stream_count.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes()); // suggested_buffer_size
        b.extend_from_slice(&320u32.to_le_bytes()); // width
        b.extend_from_slice(&240u32.to_le_bytes()); // height
        b.extend_from_slice(&[0u8; 16]); // reserved
        b
    }

    fn strh_bytes(stream_type: &[u8; 4]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(stream_type);
        b.extend_from_slice(b"\0\0\0\0"); // handler
        b.extend_from_slice(&0u32.to_le_bytes()); // flags
        b.extend_from_slice(&0u16.to_le_bytes()); // priority
        b.extend_from_slice(&0u16.to_le_bytes()); // language
        b.extend_from_slice(&0u32.to_le_bytes()); // initial_frames
        b.extend_from_slice(&1u32.to_le_bytes()); // scale
        b.extend_from_slice(&25u32.to_le_bytes()); // rate
        b.extend_from_slice(&0u32.to_le_bytes()); // start
        b.extend_from_slice(&10u32.to_le_bytes()); // length
        b.extend_from_slice(&0u32.to_le_bytes()); // suggested_buffer_size
        b.extend_from_slice(&0u32.to_le_bytes()); // quality
        b.extend_from_slice(&0u32.to_le_bytes()); // sample_size
        b.extend_from_slice(&[0u8; 8]); // rect
        b
    }

    fn video_strf_bytes() -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(&40u32.to_le_bytes()); // header_size
        b.extend_from_slice(&320i32.to_le_bytes());
        b.extend_from_slice(&240i32.to_le_bytes());
        b.extend_from_slice(&1u16.to_le_bytes());
        b.extend_from_slice(&24u16.to_le_bytes());
        b.extend_from_slice(b"HFYU");
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&0i32.to_le_bytes());
        b.extend_from_slice(&0i32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b.extend_from_slice(&0u32.to_le_bytes());
        b
    }

    fn file_with_one_video_stream() -> Vec<u8> {
        let mut strl_children = Vec::new();
        chunk(&mut strl_children, b"strh", &strh_bytes(b"vids"));
        chunk(&mut strl_children, b"strf", &video_strf_bytes());
        let mut strl = Vec::new();
        list(&mut strl, b"strl", &strl_children);

        let mut hdrl_children = Vec::new();
        chunk(&mut hdrl_children, b"avih", &avih_bytes(1));
        hdrl_children.extend_from_slice(&strl);
        let mut hdrl = Vec::new();
        list(&mut hdrl, b"hdrl", &hdrl_children);

        let mut payload = Vec::new();
        payload.extend_from_slice(b"AVI ");
        payload.extend_from_slice(&hdrl);
        let mut out = Vec::new();
        chunk(&mut out, b"RIFF", &payload);
        out
    }

    #[test]
    fn decodes_avih_and_a_single_video_stream() {
        let file = file_with_one_video_stream();
        let root = parse_chunks(&file).unwrap();
        let (avih, streams) = decode_headers(&root).unwrap();
        assert_eq!(avih.width, 320);
        assert!(avih.flags.contains(AvihFlags::HAS_INDEX));
        assert_eq!(streams.len(), 1);
        match &streams[0].1 {
            StreamFormat::Video { info, extradata } => {
                assert_eq!(info.width, 320);
                assert_eq!(info.bit_count, 24);
                assert!(extradata.is_empty());
            }
            _ => panic!("expected a video format"),
        }
    }

    #[test]
    fn stream_count_mismatch_is_an_error() {
        let mut strl_children = Vec::new();
        chunk(&mut strl_children, b"strh", &strh_bytes(b"vids"));
        chunk(&mut strl_children, b"strf", &video_strf_bytes());
        let mut strl = Vec::new();
        list(&mut strl, b"strl", &strl_children);

        let mut hdrl_children = Vec::new();
        chunk(&mut hdrl_children, b"avih", &avih_bytes(2)); // declares 2, only 1 strl present
        hdrl_children.extend_from_slice(&strl);
        let mut hdrl = Vec::new();
        list(&mut hdrl, b"hdrl", &hdrl_children);

        let mut payload = Vec::new();
        payload.extend_from_slice(b"AVI ");
        payload.extend_from_slice(&hdrl);
        let mut out = Vec::new();
        chunk(&mut out, b"RIFF", &payload);

        let root = parse_chunks(&out).unwrap();
        assert_eq!(
            decode_headers(&root),
            Err(AviError::StreamCountMismatch { declared: 2, observed: 1 })
        );
    }

    #[test]
    fn strf_before_strh_is_rejected() {
        let mut strl_children = Vec::new();
        chunk(&mut strl_children, b"strf", &video_strf_bytes());
        chunk(&mut strl_children, b"strh", &strh_bytes(b"vids"));
        let mut strl = Vec::new();
        list(&mut strl, b"strl", &strl_children);

        let mut hdrl_children = Vec::new();
        chunk(&mut hdrl_children, b"avih", &avih_bytes(1));
        hdrl_children.extend_from_slice(&strl);
        let mut hdrl = Vec::new();
        list(&mut hdrl, b"hdrl", &hdrl_children);

        let mut payload = Vec::new();
        payload.extend_from_slice(b"AVI ");
        payload.extend_from_slice(&hdrl);
        let mut out = Vec::new();
        chunk(&mut out, b"RIFF", &payload);

        let root = parse_chunks(&out).unwrap();
        assert_eq!(decode_headers(&root), Err(AviError::StrfBeforeStrh));
    }

    #[test]
    fn unknown_stream_type_logs_and_retains_no_format() {
        let mut strl_children = Vec::new();
        chunk(&mut strl_children, b"strh", &strh_bytes(b"txts"));
        chunk(&mut strl_children, b"strf", &[0u8; 4]);
        let mut strl = Vec::new();
        list(&mut strl, b"strl", &strl_children);

        let mut hdrl_children = Vec::new();
        chunk(&mut hdrl_children, b"avih", &avih_bytes(1));
        hdrl_children.extend_from_slice(&strl);
        let mut hdrl = Vec::new();
        list(&mut hdrl, b"hdrl", &hdrl_children);

        let mut payload = Vec::new();
        payload.extend_from_slice(b"AVI ");
        payload.extend_from_slice(&hdrl);
        let mut out = Vec::new();
        chunk(&mut out, b"RIFF", &payload);

        let root = parse_chunks(&out).unwrap();
        let (_avih, streams) = decode_headers(&root).unwrap();
        assert_eq!(streams[0].1, StreamFormat::Unknown);
    }
}
