// Symphonia
// Copyright (c) 2019-2022 The Project Symphonia Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `error` module defines the taxonomy of failures reported by the chunk reader, header
//! decoder, frame assembler, and composer.

use std::error::Error as StdError;
use std::fmt;

use crate::fourcc::FourCc;

/// `AviError` enumerates every way a `parse` or `compose` call can fail. All variants are fatal
/// for the enclosing operation; there is no partial or recovered result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AviError {
    /// Fewer bytes remain than a chunk header (8 bytes) requires.
    ShortBuffer,
    /// A chunk's declared length exceeds the bytes available to hold it.
    OverlongChunk { tag: FourCc, declared_len: u32, available: usize },
    /// A list's children did not exactly fill the list's declared payload.
    RaggedList { form: FourCc, consumed: u32, declared: u32 },
    /// `RIFF[AVI ] -> LIST[hdrl] -> avih` is missing.
    MissingAvih,
    /// A `strl` list has no `strh` child.
    MissingStrh,
    /// A `strl` list has no `strf` child.
    MissingStrf,
    /// `RIFF[AVI ] -> LIST[movi]` is missing.
    MissingMovi,
    /// `avih` was found but its length is not exactly 56 bytes.
    BadAvihSize { actual: u32 },
    /// `strh` was found but its length is not exactly 56 bytes.
    BadStrhSize { actual: u32 },
    /// A video `strf` was found but its length is less than the 40-byte BITMAPINFOHEADER prefix
    /// it must contain. Not named in the original error taxonomy; added because section 4.2's
    /// `strf.length >= 40` requirement has nowhere else to report failure.
    BadStrfSize { actual: u32 },
    /// A `strl` list has more than one `strh`.
    DuplicateStrh,
    /// A `strl` list has more than one `strf`.
    DuplicateStrf,
    /// `strf` was encountered in a `strl` before its `strh`.
    StrfBeforeStrh,
    /// `avih.stream_count` does not match the number of `LIST[strl]` children observed.
    StreamCountMismatch { declared: u32, observed: u32 },
    /// `avih.stream_count` exceeds the 255-stream limit.
    TooManyStreams { declared: u32 },
    /// `idx1.length` is not a multiple of 16.
    BadIdx1Size { len: u32 },
    /// An `idx1` entry's offset/size would read outside of `movi`.
    BadIndexOffset { offset: u32, size: u32 },
    /// A frame chunk identifier's first two bytes are not both hex-ASCII digits, or the decoded
    /// index is out of range for the declared stream count.
    BadStreamIndex { tag: FourCc, stream_count: u32 },
    /// The root chunk's identifier is not `RIFF`.
    RootNotRiff,
    /// The root chunk's form is not `AVI `.
    RootNotAvi,
}

impl fmt::Display for AviError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AviError::ShortBuffer => {
                write!(f, "avi: fewer bytes remain than a chunk header requires")
            }
            AviError::OverlongChunk { tag, declared_len, available } => write!(
                f,
                "avi: chunk '{tag}' declares length {declared_len} but only {available} bytes are available"
            ),
            AviError::RaggedList { form, consumed, declared } => write!(
                f,
                "avi: list '{form}' children consumed {consumed} bytes but list declares {declared}"
            ),
            AviError::MissingAvih => write!(f, "avi: missing avih under RIFF[AVI ]/LIST[hdrl]"),
            AviError::MissingStrh => write!(f, "avi: strl list is missing its strh"),
            AviError::MissingStrf => write!(f, "avi: strl list is missing its strf"),
            AviError::MissingMovi => write!(f, "avi: missing LIST[movi] under RIFF[AVI ]"),
            AviError::BadAvihSize { actual } => {
                write!(f, "avi: avih length is {actual}, expected 56")
            }
            AviError::BadStrhSize { actual } => {
                write!(f, "avi: strh length is {actual}, expected 56")
            }
            AviError::BadStrfSize { actual } => {
                write!(f, "avi: video strf length is {actual}, expected at least 40")
            }
            AviError::DuplicateStrh => write!(f, "avi: strl list has more than one strh"),
            AviError::DuplicateStrf => write!(f, "avi: strl list has more than one strf"),
            AviError::StrfBeforeStrh => write!(f, "avi: strf appears before strh in strl list"),
            AviError::StreamCountMismatch { declared, observed } => write!(
                f,
                "avi: avih.stream_count is {declared} but {observed} strl lists were found"
            ),
            AviError::TooManyStreams { declared } => {
                write!(f, "avi: stream_count {declared} exceeds the 255-stream limit")
            }
            AviError::BadIdx1Size { len } => {
                write!(f, "avi: idx1 length {len} is not a multiple of 16")
            }
            AviError::BadIndexOffset { offset, size } => write!(
                f,
                "avi: idx1 entry at offset {offset} with size {size} overruns the movi list"
            ),
            AviError::BadStreamIndex { tag, stream_count } => write!(
                f,
                "avi: chunk '{tag}' does not decode to a stream index in [0, {stream_count})"
            ),
            AviError::RootNotRiff => write!(f, "avi: root chunk is not RIFF"),
            AviError::RootNotAvi => write!(f, "avi: root chunk's form is not 'AVI '"),
        }
    }
}

impl StdError for AviError {}

pub type Result<T> = std::result::Result<T, AviError>;

/// Logs `err` at debug level with the same wording as its `Display` impl, then returns it. Call
/// sites use this instead of a bare `Err(...)` so a consumer with logging enabled can see why
/// parsing or composition stopped without matching on the error variant.
pub(crate) fn fail<T>(err: AviError) -> Result<T> {
    log::debug!("{err}");
    Err(err)
}
