// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Writes an `Avih` plus a set of streams back out as a complete, properly aligned AVI byte
//! buffer, including a freshly computed `idx1`.

use crate::error::Result;
use crate::fourcc::{encode_stream_index, FourCc};
use crate::frame::IndexFlags;
use crate::header::{Avih, Strh, StreamFormat};

/// One stream to compose: its header, format descriptor, and frame payloads in emission order.
pub struct ComposeStream<'a> {
    pub strh: Strh,
    pub format: StreamFormat<'a>,
    pub frames: Vec<&'a [u8]>,
}

fn write_chunk(out: &mut Vec<u8>, tag: [u8; 4], payload: &[u8]) {
    out.extend_from_slice(&tag);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 == 1 {
        out.push(0);
    }
}

/// Chunk size rounded up to the next even number, the way every chunk's footprint in a list
/// (including the 8-byte header) must be counted when sizing an enclosing list.
fn padded_chunk_len(payload_len: usize) -> usize {
    8 + payload_len + (payload_len % 2)
}

fn write_avih(out: &mut Vec<u8>, avih: &Avih) {
    let mut payload = Vec::with_capacity(56);
    payload.extend_from_slice(&avih.microsec_per_frame.to_le_bytes());
    payload.extend_from_slice(&avih.max_bytes_per_sec.to_le_bytes());
    payload.extend_from_slice(&avih.padding_granularity.to_le_bytes());
    payload.extend_from_slice(&avih.flags.bits().to_le_bytes());
    payload.extend_from_slice(&avih.total_frames.to_le_bytes());
    payload.extend_from_slice(&avih.initial_frames.to_le_bytes());
    payload.extend_from_slice(&avih.stream_count.to_le_bytes());
    payload.extend_from_slice(&avih.suggested_buffer_size.to_le_bytes());
    payload.extend_from_slice(&avih.width.to_le_bytes());
    payload.extend_from_slice(&avih.height.to_le_bytes());
    for word in avih.reserved {
        payload.extend_from_slice(&word.to_le_bytes());
    }
    write_chunk(out, *b"avih", &payload);
}

fn write_strh(out: &mut Vec<u8>, strh: &Strh) {
    let mut payload = Vec::with_capacity(56);
    payload.extend_from_slice(&strh.stream_type.to_bytes());
    payload.extend_from_slice(&strh.handler.to_bytes());
    payload.extend_from_slice(&strh.flags.to_le_bytes());
    payload.extend_from_slice(&strh.priority.to_le_bytes());
    payload.extend_from_slice(&strh.language.to_le_bytes());
    payload.extend_from_slice(&strh.initial_frames.to_le_bytes());
    payload.extend_from_slice(&strh.scale.to_le_bytes());
    payload.extend_from_slice(&strh.rate.to_le_bytes());
    payload.extend_from_slice(&strh.start.to_le_bytes());
    payload.extend_from_slice(&strh.length.to_le_bytes());
    payload.extend_from_slice(&strh.suggested_buffer_size.to_le_bytes());
    payload.extend_from_slice(&strh.quality.to_le_bytes());
    payload.extend_from_slice(&strh.sample_size.to_le_bytes());
    payload.extend_from_slice(&strh.rect.left.to_le_bytes());
    payload.extend_from_slice(&strh.rect.top.to_le_bytes());
    payload.extend_from_slice(&strh.rect.right.to_le_bytes());
    payload.extend_from_slice(&strh.rect.bottom.to_le_bytes());
    write_chunk(out, *b"strh", &payload);
}

fn write_strf(out: &mut Vec<u8>, format: &StreamFormat<'_>) {
    match format {
        StreamFormat::Video { info, extradata } => {
            let mut payload = Vec::with_capacity(40 + extradata.len());
            payload.extend_from_slice(&info.header_size.to_le_bytes());
            payload.extend_from_slice(&info.width.to_le_bytes());
            payload.extend_from_slice(&info.height.to_le_bytes());
            payload.extend_from_slice(&info.planes.to_le_bytes());
            payload.extend_from_slice(&info.bit_count.to_le_bytes());
            payload.extend_from_slice(&info.compression.to_le_bytes());
            payload.extend_from_slice(&info.image_size.to_le_bytes());
            payload.extend_from_slice(&info.horizontal_ppm.to_le_bytes());
            payload.extend_from_slice(&info.vertical_ppm.to_le_bytes());
            payload.extend_from_slice(&info.colours_used.to_le_bytes());
            payload.extend_from_slice(&info.colours_important.to_le_bytes());
            payload.extend_from_slice(extradata);
            write_chunk(out, *b"strf", &payload);
        }
        StreamFormat::Audio(bytes) => write_chunk(out, *b"strf", bytes),
        StreamFormat::Unknown => write_chunk(out, *b"strf", &[]),
    }
}

fn frame_tag(kind_suffix: [u8; 2], stream_index: u32) -> [u8; 4] {
    let [b0, b1] = encode_stream_index(stream_index);
    [b0, b1, kind_suffix[0], kind_suffix[1]]
}

fn kind_suffix_for(format: &StreamFormat<'_>) -> [u8; 2] {
    match format {
        StreamFormat::Video { .. } => *b"dc",
        StreamFormat::Audio(_) => *b"wb",
        StreamFormat::Unknown => *b"dc",
    }
}

/// Composes a complete `RIFF[AVI ]` byte buffer from a main header and a set of streams. Computes
/// every list's declared length in a first pass (so lengths never need to be patched after the
/// fact) before writing the tree and a freshly built `idx1` in a second. The `Result` return
/// mirrors [`crate::AviFile::parse`]'s fallible surface; today every failure mode here is an
/// internal bookkeeping bug rather than a property of the input, so it only ever returns `Ok`.
pub fn compose(avih: &Avih, streams: &[ComposeStream<'_>]) -> Result<Vec<u8>> {
    let avih_chunk_len = padded_chunk_len(56);

    let strl_lens: Vec<usize> = streams
        .iter()
        .map(|s| {
            let strf_len = match &s.format {
                StreamFormat::Video { extradata, .. } => 40 + extradata.len(),
                StreamFormat::Audio(bytes) => bytes.len(),
                StreamFormat::Unknown => 0,
            };
            let children_len = padded_chunk_len(56) + padded_chunk_len(strf_len);
            4 + children_len // strl's own form tag plus its children
        })
        .collect();

    let hdrl_children_len: usize =
        avih_chunk_len + strl_lens.iter().map(|len| padded_chunk_len(*len)).sum::<usize>();
    let hdrl_len = 4 + hdrl_children_len;

    let movi_children_len: usize = streams
        .iter()
        .flat_map(|s| s.frames.iter())
        .map(|data| padded_chunk_len(data.len()))
        .sum();
    let movi_len = 4 + movi_children_len;

    let total_frames: usize = streams.iter().map(|s| s.frames.len()).sum();
    let idx1_len = total_frames * 16;

    let mut out = Vec::with_capacity(
        12 + padded_chunk_len(hdrl_len) + padded_chunk_len(movi_len) + padded_chunk_len(idx1_len),
    );

    out.extend_from_slice(b"RIFF");
    let riff_len_pos = out.len();
    out.extend_from_slice(&0u32.to_le_bytes()); // patched once at the end
    out.extend_from_slice(b"AVI ");

    out.extend_from_slice(b"LIST");
    out.extend_from_slice(&(hdrl_len as u32).to_le_bytes());
    out.extend_from_slice(b"hdrl");
    write_avih(&mut out, avih);
    for (stream, strl_len) in streams.iter().zip(strl_lens.iter()) {
        out.extend_from_slice(b"LIST");
        let strl_children_len = strl_len - 4;
        out.extend_from_slice(&(4 + strl_children_len as u32).to_le_bytes());
        out.extend_from_slice(b"strl");
        write_strh(&mut out, &stream.strh);
        write_strf(&mut out, &stream.format);
    }

    out.extend_from_slice(b"LIST");
    out.extend_from_slice(&(movi_len as u32).to_le_bytes());
    out.extend_from_slice(b"movi");

    let movi_form_start = out.len(); // first byte after the form tag, the idx1 offset base
    let mut idx1 = Vec::with_capacity(idx1_len);

    for (stream_index, stream) in streams.iter().enumerate() {
        let suffix = kind_suffix_for(&stream.format);
        let tag = frame_tag(suffix, stream_index as u32);
        for data in &stream.frames {
            let offset = (out.len() - movi_form_start) as u32;
            write_chunk(&mut out, tag, data);

            let mut flags = IndexFlags::empty();
            if matches!(stream.format, StreamFormat::Video { .. }) {
                flags |= IndexFlags::KEYFRAME;
            }
            idx1.extend_from_slice(&tag);
            idx1.extend_from_slice(&flags.bits().to_le_bytes());
            idx1.extend_from_slice(&offset.to_le_bytes());
            idx1.extend_from_slice(&(data.len() as u32).to_le_bytes());
        }
    }

    write_chunk(&mut out, *b"idx1", &idx1);

    let total_len = (out.len() - 8) as u32;
    out[riff_len_pos..riff_len_pos + 4].copy_from_slice(&total_len.to_le_bytes());

    debug_assert_eq!(out.len() % 2, 0, "a composed AVI buffer must end on an even boundary");
    Ok(out)
}
