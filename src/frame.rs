// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconstructs the per-stream frame lists, either from the `idx1` index table or, when no usable
//! index is present, by walking `LIST[movi]`'s children (including nested `LIST[rec ]` groups)
//! positionally.

use bitflags::bitflags;

use crate::chunk::{parse_chunk_at, ChunkNode};
use crate::error::{fail, AviError, Result};
use crate::fourcc::{decode_stream_index, IDX1, LIST, MOVI, REC};
use crate::io::ByteReader;

bitflags! {
    /// Flags carried by each `idx1` entry's `flags` field.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IndexFlags: u32 {
        const LIST = 0x0000_0001;
        const KEYFRAME = 0x0000_0010;
        const NO_TIME = 0x0000_0100;
    }
}

/// One decoded frame: the stream it belongs to, its flags, and a borrow of its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    pub stream_index: u32,
    pub flags: IndexFlags,
    pub data: &'a [u8],
}

struct RawIndexEntry {
    tag: crate::fourcc::FourCc,
    flags: IndexFlags,
    offset: u32,
    size: u32,
}

fn parse_idx1(idx1_node: &ChunkNode<'_>) -> Result<Vec<RawIndexEntry>> {
    if idx1_node.length % 16 != 0 {
        return fail(AviError::BadIdx1Size { len: idx1_node.length });
    }
    let mut r = ByteReader::new(idx1_node.payload);
    let count = idx1_node.payload.len() / 16;
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let tag = r.read_fourcc()?;
        let flags = IndexFlags::from_bits_retain(r.read_u32_le()?);
        let offset = r.read_u32_le()?;
        let size = r.read_u32_le()?;
        entries.push(RawIndexEntry { tag, flags, offset, size });
    }
    Ok(entries)
}

/// Assembles frame lists for every stream in `root`, returning one `Vec<Frame>` per
/// `stream_count`, in stream order. Uses `idx1` when present, falling back to a positional walk
/// of `LIST[movi]` otherwise. `movi` itself is mandatory regardless of strategy.
pub fn assemble_frames<'a>(root: &ChunkNode<'a>, stream_count: u32) -> Result<Vec<Vec<Frame<'a>>>> {
    let movi = match root.find_list(MOVI) {
        Some(movi) => movi,
        None => return fail(AviError::MissingMovi),
    };

    let mut streams: Vec<Vec<Frame<'a>>> = (0..stream_count).map(|_| Vec::new()).collect();

    if let Some(idx1_node) = root.find_chunk(IDX1) {
        let entries = parse_idx1(idx1_node)?;
        // `movi.length` includes the 4-byte form tag; offsets are relative to the first byte
        // after it (the first child chunk header's first byte).
        let children_region_len = movi.length.saturating_sub(4);

        let children = &movi.payload[4..];

        for entry in entries {
            let in_bounds = entry
                .offset
                .checked_add(entry.size)
                .and_then(|v| v.checked_add(8))
                .map(|v| v <= children_region_len)
                .unwrap_or(false);
            if !in_bounds {
                return fail(AviError::BadIndexOffset { offset: entry.offset, size: entry.size });
            }

            if entry.flags.contains(IndexFlags::LIST) {
                // The entry points at a whole LIST[rec ] chunk (header included), not a frame.
                let rec_slice = &children[entry.offset as usize..entry.offset as usize + 8 + entry.size as usize];
                let (rec_node, _) = parse_chunk_at(rec_slice)?;
                if rec_node.identifier != LIST || rec_node.form != Some(REC) {
                    return fail(AviError::BadIndexOffset { offset: entry.offset, size: entry.size });
                }
                for child in &rec_node.children {
                    let stream_index = match decode_stream_index(child.identifier) {
                        Some(i) if i < stream_count => i,
                        _ => {
                            return fail(AviError::BadStreamIndex {
                                tag: child.identifier,
                                stream_count,
                            });
                        }
                    };
                    streams[stream_index as usize].push(Frame {
                        stream_index,
                        flags: IndexFlags::empty(),
                        data: child.payload,
                    });
                }
                continue;
            }

            let stream_index = match decode_stream_index(entry.tag) {
                Some(i) if i < stream_count => i,
                _ => {
                    return fail(AviError::BadStreamIndex { tag: entry.tag, stream_count });
                }
            };

            let start = entry.offset as usize + 8;
            let data = &children[start..start + entry.size as usize];
            streams[stream_index as usize].push(Frame {
                stream_index,
                flags: entry.flags,
                data,
            });
        }
    } else {
        // No index: walk movi's children positionally, descending into LIST[rec ] groups.
        walk_movi_children(&movi.children, stream_count, &mut streams)?;
    }

    Ok(streams)
}

fn walk_movi_children<'a>(
    children: &[ChunkNode<'a>],
    stream_count: u32,
    streams: &mut [Vec<Frame<'a>>],
) -> Result<()> {
    for child in children {
        if child.identifier == crate::fourcc::LIST && child.form == Some(REC) {
            walk_movi_children(&child.children, stream_count, streams)?;
            continue;
        }

        let stream_index = match decode_stream_index(child.identifier) {
            Some(i) if i < stream_count => i,
            _ => {
                return fail(AviError::BadStreamIndex { tag: child.identifier, stream_count });
            }
        };

        streams[stream_index as usize].push(Frame {
            stream_index,
            flags: IndexFlags::empty(),
            data: child.payload,
        });
    }
    Ok(())
}
