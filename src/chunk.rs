// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Recursive-descent parser for the RIFF chunk tree every other component walks. Produces a
//! borrowed tree rooted at the file's `RIFF` chunk; nothing here interprets chunk contents beyond
//! the `RIFF`/`LIST` list-form convention.

use crate::error::{fail, AviError, Result};
use crate::fourcc::{FourCc, AVI_FORM, LIST, RIFF};

/// One node of the parsed chunk tree. `payload` is the chunk's declared bytes, excluding the
/// 8-byte header and any trailing alignment pad; for a list chunk (`form` is `Some`) the first
/// four bytes of `payload` are the form tag itself and `children` holds the parsed remainder.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkNode<'a> {
    pub identifier: FourCc,
    pub length: u32,
    pub payload: &'a [u8],
    pub form: Option<FourCc>,
    pub children: Vec<ChunkNode<'a>>,
}

impl<'a> ChunkNode<'a> {
    pub fn is_list(&self) -> bool {
        self.form.is_some()
    }

    /// The first direct child with the given identifier.
    pub fn find_chunk(&self, identifier: FourCc) -> Option<&ChunkNode<'a>> {
        self.children.iter().find(|c| c.identifier == identifier)
    }

    /// The first direct child that is a `LIST` of the given form.
    pub fn find_list(&self, form: FourCc) -> Option<&ChunkNode<'a>> {
        self.children.iter().find(|c| c.identifier == LIST && c.form == Some(form))
    }

    /// All direct children that are `LIST`s of the given form, in document order.
    pub fn find_lists(&self, form: FourCc) -> impl Iterator<Item = &ChunkNode<'a>> {
        self.children.iter().filter(move |c| c.identifier == LIST && c.form == Some(form))
    }
}

/// Parses `bytes` as a complete AVI file and returns the root `RIFF[AVI ]` node. Fails with
/// [`AviError::RootNotRiff`] or [`AviError::RootNotAvi`] if the outermost chunk isn't that.
pub fn parse_chunks<'a>(bytes: &'a [u8]) -> Result<ChunkNode<'a>> {
    let (root, _consumed) = parse_chunk_at(bytes)?;
    if root.identifier != RIFF {
        return fail(AviError::RootNotRiff);
    }
    if root.form != Some(AVI_FORM) {
        return fail(AviError::RootNotAvi);
    }
    Ok(root)
}

/// Parses one chunk starting at `bytes[0]`. Returns the node and the number of bytes to advance
/// the caller's cursor by, which includes the odd-length alignment pad byte even though that byte
/// is not part of `length` or `payload`.
///
/// Exposed crate-wide because the frame assembler needs it too: an `idx1` entry with the list
/// flag set points at a nested `LIST[rec ]` chunk embedded in `movi`'s children, which is parsed
/// the same way any other chunk is.
pub(crate) fn parse_chunk_at<'a>(bytes: &'a [u8]) -> Result<(ChunkNode<'a>, usize)> {
    if bytes.len() < 8 {
        return fail(AviError::ShortBuffer);
    }

    let identifier = FourCc::from_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let available = bytes.len() - 8;

    if length as usize > available {
        return fail(AviError::OverlongChunk { tag: identifier, declared_len: length, available });
    }

    let payload = &bytes[8..8 + length as usize];
    let consumed = 8 + length as usize + (length as usize & 1);

    if identifier == RIFF || identifier == LIST {
        if length < 4 {
            return fail(AviError::RaggedList { form: identifier, consumed: 0, declared: length });
        }

        let form = FourCc::from_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let region = &payload[4..];
        let mut children = Vec::new();
        let mut index = 0usize;

        while index < region.len() {
            if region.len() - index < 8 {
                return fail(AviError::RaggedList {
                    form,
                    consumed: index as u32,
                    declared: region.len() as u32,
                });
            }

            let (child, child_consumed) = parse_chunk_at(&region[index..])?;
            index += child_consumed;
            children.push(child);
        }

        if index != region.len() {
            return fail(AviError::RaggedList {
                form,
                consumed: index as u32,
                declared: region.len() as u32,
            });
        }

        Ok((ChunkNode { identifier, length, payload, form: Some(form), children }, consumed))
    } else {
        Ok((ChunkNode { identifier, length, payload, form: None, children: Vec::new() }, consumed))
    }
}
