// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A pure Rust parser and composer for the AVI (Audio Video Interleave) container format.
//!
//! AVI is a RIFF-based binary format: a tree of typed, length-prefixed chunks carrying a main
//! header, one descriptor pair per elementary stream, and the interleaved frame payloads
//! themselves. This crate walks that tree, validates its structural invariants, and reconstructs
//! the per-stream frame lists from either an explicit index table (`idx1`) or, failing that, the
//! document order of the `movi` list's children. It does not interpret frame payloads: video
//! decompression, pixel format conversion, and audio sample interpretation are a caller's
//! concern.
//!
//! ```no_run
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let bytes = std::fs::read("clip.avi")?;
//! let file = avi_core::AviFile::parse(&bytes)?;
//! for stream in file.streams() {
//!     println!("{} frames", stream.frames().len());
//! }
//! # Ok(())
//! # }
//! ```

mod chunk;
mod compose;
mod error;
mod fourcc;
mod frame;
mod header;
mod io;

pub use compose::{compose, ComposeStream};
pub use error::{AviError, Result};
pub use fourcc::FourCc;
pub use frame::{Frame, IndexFlags};
pub use header::{Avih, AvihFlags, BitmapInfoHeader, Rect, Strh, StreamFormat};

use chunk::{parse_chunks, ChunkNode};

/// A stream's header, format descriptor, and assembled frames, borrowed from the file that was
/// parsed to produce it.
#[derive(Debug)]
pub struct StreamInfo<'a> {
    strh: Strh,
    format: StreamFormat<'a>,
    frames: Vec<Frame<'a>>,
}

impl<'a> StreamInfo<'a> {
    pub fn strh(&self) -> &Strh {
        &self.strh
    }

    pub fn format(&self) -> &StreamFormat<'a> {
        &self.format
    }

    pub fn frames(&self) -> &[Frame<'a>] {
        &self.frames
    }
}

/// A fully parsed AVI file: the main header plus every stream's descriptors and frames.
#[derive(Debug)]
pub struct AviFile<'a> {
    avih: Avih,
    streams: Vec<StreamInfo<'a>>,
}

impl<'a> AviFile<'a> {
    /// Parses `bytes` as a complete AVI file in one pass. Borrows `bytes` for the entire
    /// lifetime of the returned value: nothing is copied out of the frame payloads or
    /// variable-length format descriptors.
    pub fn parse(bytes: &'a [u8]) -> Result<AviFile<'a>> {
        let root: ChunkNode<'a> = parse_chunks(bytes)?;
        let (avih, headers) = header::decode_headers(&root)?;
        let mut frame_lists = frame::assemble_frames(&root, avih.stream_count)?;

        // assemble_frames returns one list per stream index in ascending order; headers is in
        // document order, which for a well-formed file is the same order, but we zip by index
        // rather than assuming it to keep the two components independent.
        let streams = headers
            .into_iter()
            .enumerate()
            .map(|(i, (strh, format))| StreamInfo {
                strh,
                format,
                frames: std::mem::take(&mut frame_lists[i]),
            })
            .collect();

        Ok(AviFile { avih, streams })
    }

    pub fn avih(&self) -> &Avih {
        &self.avih
    }

    pub fn streams(&self) -> &[StreamInfo<'a>] {
        &self.streams
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn end_to_end_parse_of_a_single_stream_file() {
        let mut strl_children = Vec::new();
        let mut strh_payload = Vec::new();
        strh_payload.extend_from_slice(b"vids");
        strh_payload.extend_from_slice(b"\0\0\0\0");
        strh_payload.extend_from_slice(&[0u8; 48]);
        chunk(&mut strl_children, b"strh", &strh_payload);
        let mut strf_payload = vec![0u8; 40];
        strf_payload[0..4].copy_from_slice(&40u32.to_le_bytes());
        chunk(&mut strl_children, b"strf", &strf_payload);
        let mut strl = Vec::new();
        list(&mut strl, b"strl", &strl_children);

        let mut avih_payload = Vec::new();
        avih_payload.extend_from_slice(&40_000u32.to_le_bytes());
        avih_payload.extend_from_slice(&0u32.to_le_bytes());
        avih_payload.extend_from_slice(&0u32.to_le_bytes());
        avih_payload.extend_from_slice(&0u32.to_le_bytes());
        avih_payload.extend_from_slice(&1u32.to_le_bytes());
        avih_payload.extend_from_slice(&0u32.to_le_bytes());
        avih_payload.extend_from_slice(&1u32.to_le_bytes()); // stream_count
        avih_payload.extend_from_slice(&0u32.to_le_bytes());
        avih_payload.extend_from_slice(&4u32.to_le_bytes());
        avih_payload.extend_from_slice(&4u32.to_le_bytes());
        avih_payload.extend_from_slice(&[0u8; 16]);

        let mut hdrl_children = Vec::new();
        chunk(&mut hdrl_children, b"avih", &avih_payload);
        hdrl_children.extend_from_slice(&strl);
        let mut hdrl = Vec::new();
        list(&mut hdrl, b"hdrl", &hdrl_children);

        let mut movi_children = Vec::new();
        chunk(&mut movi_children, b"00dc", b"\x01\x02\x03");
        let mut movi = Vec::new();
        list(&mut movi, b"movi", &movi_children);

        let mut payload = Vec::new();
        payload.extend_from_slice(b"AVI ");
        payload.extend_from_slice(&hdrl);
        payload.extend_from_slice(&movi);
        let mut file = Vec::new();
        chunk(&mut file, b"RIFF", &payload);

        let parsed = AviFile::parse(&file).unwrap();
        assert_eq!(parsed.avih().stream_count, 1);
        assert_eq!(parsed.streams().len(), 1);
        assert_eq!(parsed.streams()[0].frames().len(), 1);
        assert_eq!(parsed.streams()[0].frames()[0].data, b"\x01\x02\x03");
    }
}
