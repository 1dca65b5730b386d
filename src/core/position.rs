//! Position and PositionList codec (C1).
//!
//! Binary format (version 1, §6): a 4-byte big-endian count, then that many
//! `PositionRecord`s. Each record is a 1-byte tag (`0` = plain, `1` =
//! stitch) followed by fixed-width big-endian fields:
//! `document_id(u32) sentence_id(i32) begin_char(u32) end_char(u32)
//! timestamp_seconds(i64)`, and if the tag is `1`, two more fields:
//! `annotation_type(u8) synonym_id(u32)`.

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocumentId, SentenceId, Timestamp};
use chrono::{TimeZone, Utc};
use std::cmp::Ordering;

const TAG_PLAIN: u8 = 0;
const TAG_STITCH: u8 = 1;

/// Discriminates the annotation type a `StitchPosition` binds to (§3, §4.3
/// stitch generator: date, ner, pos, or dependency synonym tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AnnotationType {
    Date = 0,
    Ner = 1,
    Pos = 2,
    Dependency = 3,
}

impl AnnotationType {
    fn from_u8(b: u8) -> Result<Self> {
        match b {
            0 => Ok(AnnotationType::Date),
            1 => Ok(AnnotationType::Ner),
            2 => Ok(AnnotationType::Pos),
            3 => Ok(AnnotationType::Dependency),
            other => Err(Error::new(ErrorKind::Storage, format!("unknown annotation type tag {other}"))),
        }
    }
}

/// A single occurrence record (§3 Position). Equality/ordering are defined
/// over the identifying fields only — payload does not participate.
#[derive(Debug, Clone, Copy)]
pub struct Position {
    pub document_id: DocumentId,
    pub sentence_id: SentenceId,
    pub begin_char: u32,
    pub end_char: u32,
    pub timestamp: Timestamp,
    pub stitch: Option<StitchPosition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StitchPosition {
    pub annotation_type: AnnotationType,
    pub synonym_id: u32,
}

impl Position {
    pub fn plain(document_id: DocumentId, sentence_id: SentenceId, begin_char: u32, end_char: u32, timestamp: Timestamp) -> Self {
        Position { document_id, sentence_id, begin_char, end_char, timestamp, stitch: None }
    }

    pub fn stitched(
        document_id: DocumentId,
        sentence_id: SentenceId,
        begin_char: u32,
        end_char: u32,
        timestamp: Timestamp,
        annotation_type: AnnotationType,
        synonym_id: u32,
    ) -> Self {
        Position {
            document_id,
            sentence_id,
            begin_char,
            end_char,
            timestamp,
            stitch: Some(StitchPosition { annotation_type, synonym_id }),
        }
    }

    /// `(tag, annotation_type, synonym_id)` discriminant for the stitch
    /// payload, `(0, 0, 0)` for a plain position. Participates in identity so
    /// coexisting stitched annotations at the same span (e.g. an NER and a
    /// POS `StitchPosition` for the same token, §4.3) are distinct positions
    /// rather than deduping against each other.
    fn stitch_key(&self) -> (u8, u8, u32) {
        match self.stitch {
            None => (0, 0, 0),
            Some(s) => (1, s.annotation_type as u8, s.synonym_id),
        }
    }

    /// Full identifying key (§3: "two positions are equal iff all
    /// identifying fields match"). Sort order is primarily by
    /// `(document_id, sentence_id, begin_char)` (§3 PositionList) with
    /// `end_char` and the stitch discriminant as tie-breakers so `Ord` and
    /// `PartialEq` stay consistent for `binary_search`-based dedup.
    fn identity_key(&self) -> (u32, i32, u32, u32, u8, u8, u32) {
        let (tag, annotation_type, synonym_id) = self.stitch_key();
        (self.document_id.0, self.sentence_id.0, self.begin_char, self.end_char, tag, annotation_type, synonym_id)
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        self.identity_key() == other.identity_key()
    }
}
impl Eq for Position {}

impl PartialOrd for Position {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Position {
    fn cmp(&self, other: &Self) -> Ordering {
        self.identity_key().cmp(&other.identity_key())
    }
}

/// An ordered set of `Position`s, sorted by `(document_id, sentence_id,
/// begin_char)` (§3 PositionList).
#[derive(Debug, Clone, Default)]
pub struct PositionList {
    positions: Vec<Position>,
}

impl PositionList {
    pub fn new() -> Self {
        PositionList { positions: Vec::new() }
    }

    pub fn from_sorted_unique(positions: Vec<Position>) -> Self {
        debug_assert!(positions.windows(2).all(|w| w[0] < w[1]));
        PositionList { positions }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter()
    }

    pub fn as_slice(&self) -> &[Position] {
        &self.positions
    }

    /// Set-insertion preserving sort order (§4.1 `add`). O(n).
    pub fn add(&mut self, position: Position) {
        match self.positions.binary_search(&position) {
            Ok(_) => {}
            Err(insert_at) => self.positions.insert(insert_at, position),
        }
    }

    /// Sorted-set union of two lists (§4.1 `merge`). O(n + m).
    pub fn merge(a: &PositionList, b: &PositionList) -> PositionList {
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.positions.len() && j < b.positions.len() {
            match a.positions[i].cmp(&b.positions[j]) {
                Ordering::Less => {
                    out.push(a.positions[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(b.positions[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    out.push(a.positions[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a.positions[i..]);
        out.extend_from_slice(&b.positions[j..]);
        PositionList { positions: out }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.positions.len() * 21);
        buf.extend_from_slice(&(self.positions.len() as u32).to_be_bytes());
        for p in &self.positions {
            match p.stitch {
                None => buf.push(TAG_PLAIN),
                Some(_) => buf.push(TAG_STITCH),
            }
            buf.extend_from_slice(&p.document_id.0.to_be_bytes());
            buf.extend_from_slice(&p.sentence_id.0.to_be_bytes());
            buf.extend_from_slice(&p.begin_char.to_be_bytes());
            buf.extend_from_slice(&p.end_char.to_be_bytes());
            buf.extend_from_slice(&p.timestamp.timestamp().to_be_bytes());
            if let Some(stitch) = p.stitch {
                buf.push(stitch.annotation_type as u8);
                buf.extend_from_slice(&stitch.synonym_id.to_be_bytes());
            }
        }
        buf
    }

    pub fn deserialize(bytes: &[u8]) -> Result<PositionList> {
        let mut cursor = Cursor::new(bytes);
        let count = cursor.read_u32()?;
        let mut positions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = cursor.read_u8()?;
            let document_id = DocumentId(cursor.read_u32()?);
            let sentence_id = SentenceId(cursor.read_i32()?);
            let begin_char = cursor.read_u32()?;
            let end_char = cursor.read_u32()?;
            let timestamp = Utc.timestamp_opt(cursor.read_i64()?, 0).single().ok_or_else(|| {
                Error::new(ErrorKind::Storage, "position timestamp out of range")
            })?;
            let stitch = match tag {
                TAG_PLAIN => None,
                TAG_STITCH => {
                    let annotation_type = AnnotationType::from_u8(cursor.read_u8()?)?;
                    let synonym_id = cursor.read_u32()?;
                    Some(StitchPosition { annotation_type, synonym_id })
                }
                other => return Err(Error::new(ErrorKind::Storage, format!("unknown position tag {other}"))),
            };
            positions.push(Position { document_id, sentence_id, begin_char, end_char, timestamp, stitch });
        }
        if !cursor.at_end() {
            return Err(Error::new(ErrorKind::Storage, "trailing bytes after PositionList"));
        }
        Ok(PositionList { positions })
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Cursor { bytes, offset: 0 }
    }

    fn at_end(&self) -> bool {
        self.offset == self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.offset + n > self.bytes.len() {
            return Err(Error::new(ErrorKind::Storage, "truncated PositionList"));
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }
}
