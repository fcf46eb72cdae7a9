//! Reserved id bands and token classification.
//!
//! Ids below [`CTRL_BASE`] are tokenizer vocabulary. Everything above is
//! structure, split into fixed-width bands. [`Token::classify`] is the only
//! place that maps raw ids to meaning.

use std::fmt;

use crate::schema::FieldType;

/// First control id.
pub const CTRL_BASE: u32 = 1_000_000;
/// First presence-mask chunk id.
pub const MASK_CHUNK_BASE: u32 = 1_100_000;
/// First array-length id.
pub const ARRAY_LEN_BASE: u32 = 1_200_000;
/// First dictionary-reference id.
pub const DICT_REF_BASE: u32 = 1_300_000;
/// Width of the control, array-length and dictionary bands.
pub const BAND_WIDTH: u32 = 100_000;
/// Width of the mask-chunk band: one 16-bit chunk per id.
pub const MASK_CHUNK_WIDTH: u32 = 1 << 16;
/// Fields covered by one mask chunk.
pub const MASK_CHUNK_BITS: usize = 16;
/// Longest array the length band can frame.
pub const MAX_ARRAY_LEN: usize = BAND_WIDTH as usize - 1;
/// Largest dictionary the reference band can address.
pub const MAX_DICT_ENTRIES: usize = BAND_WIDTH as usize;
/// Deepest nesting of arrays and inline objects inside one value.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Offset of the first field-type tag inside the control band.
const TYPE_TAG_OFFSET: u32 = 32;

/// Control opcodes, stored as offsets from [`CTRL_BASE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    /// Ends a value.
    Separator = 0,
    /// Ends a row.
    RowBreak = 1,
    /// Opens an object.
    ObjStart = 2,
    /// Closes an object.
    ObjEnd = 3,
    /// Starts a schema definition.
    SchemaDef = 4,
    /// Selects a schema for the following row.
    SchemaRef = 5,
    /// Starts a dictionary definition.
    DictDef = 6,
    /// Starts a masked row.
    PresenceMask = 7,
    /// Starts an array; followed by an array-length token.
    FixedArray = 8,
    /// `null`.
    NullVal = 9,
    /// `true`.
    BoolTrue = 10,
    /// `false`.
    BoolFalse = 11,
    /// The next literal is a string even though its text reads as a number.
    StringLit = 12,
}

impl Opcode {
    const ALL: [Opcode; 13] = [
        Opcode::Separator,
        Opcode::RowBreak,
        Opcode::ObjStart,
        Opcode::ObjEnd,
        Opcode::SchemaDef,
        Opcode::SchemaRef,
        Opcode::DictDef,
        Opcode::PresenceMask,
        Opcode::FixedArray,
        Opcode::NullVal,
        Opcode::BoolTrue,
        Opcode::BoolFalse,
        Opcode::StringLit,
    ];

    fn from_offset(offset: u32) -> Option<Self> {
        Self::ALL.get(offset as usize).copied()
    }
}

/// A classified stream token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    /// Tokenizer vocabulary id.
    Vocabulary(u32),
    /// Control marker.
    Control(Opcode),
    /// Field-type tag inside a schema definition.
    FieldType(FieldType),
    /// One 16-bit presence-mask chunk.
    MaskChunk(u16),
    /// Array length.
    ArrayLen(u32),
    /// Dictionary id.
    DictRef(u32),
}

impl Token {
    /// Classifies a raw id. Returns `None` for ids no band assigns.
    pub fn classify(id: u32) -> Option<Self> {
        match id {
            _ if id < CTRL_BASE => Some(Token::Vocabulary(id)),
            _ if id < CTRL_BASE + BAND_WIDTH => {
                let offset = id - CTRL_BASE;
                if let Some(op) = Opcode::from_offset(offset) {
                    return Some(Token::Control(op));
                }
                offset
                    .checked_sub(TYPE_TAG_OFFSET)
                    .and_then(|i| FieldType::ALL.get(i as usize))
                    .map(|t| Token::FieldType(*t))
            }
            _ if (MASK_CHUNK_BASE..MASK_CHUNK_BASE + MASK_CHUNK_WIDTH).contains(&id) => {
                Some(Token::MaskChunk((id - MASK_CHUNK_BASE) as u16))
            }
            _ if (ARRAY_LEN_BASE..ARRAY_LEN_BASE + BAND_WIDTH).contains(&id) => {
                Some(Token::ArrayLen(id - ARRAY_LEN_BASE))
            }
            _ if (DICT_REF_BASE..DICT_REF_BASE + BAND_WIDTH).contains(&id) => {
                Some(Token::DictRef(id - DICT_REF_BASE))
            }
            _ => None,
        }
    }

    /// Raw id of this token.
    ///
    /// Payloads are taken as given; callers keep them inside their band.
    pub fn id(self) -> u32 {
        match self {
            Token::Vocabulary(id) => id,
            Token::Control(op) => CTRL_BASE + op as u32,
            Token::FieldType(t) => {
                let index = FieldType::ALL.iter().position(|x| *x == t).unwrap_or(0);
                CTRL_BASE + TYPE_TAG_OFFSET + index as u32
            }
            Token::MaskChunk(bits) => MASK_CHUNK_BASE + u32::from(bits),
            Token::ArrayLen(len) => ARRAY_LEN_BASE + len,
            Token::DictRef(id) => DICT_REF_BASE + id,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Vocabulary(id) => write!(f, "vocabulary token {}", id),
            Token::Control(op) => write!(f, "{:?}", op),
            Token::FieldType(t) => write!(f, "type tag {}", t.as_str()),
            Token::MaskChunk(bits) => write!(f, "mask chunk {:#06x}", bits),
            Token::ArrayLen(len) => write!(f, "array length {}", len),
            Token::DictRef(id) => write!(f, "dictionary ref {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_classify_boundaries() {
        assert_eq!(Token::classify(0), Some(Token::Vocabulary(0)));
        assert_eq!(Token::classify(CTRL_BASE - 1), Some(Token::Vocabulary(CTRL_BASE - 1)));
        assert_eq!(Token::classify(CTRL_BASE), Some(Token::Control(Opcode::Separator)));
        assert_eq!(Token::classify(CTRL_BASE + 11), Some(Token::Control(Opcode::BoolFalse)));
        assert_eq!(Token::classify(CTRL_BASE + 12), Some(Token::Control(Opcode::StringLit)));
        assert_eq!(Token::classify(CTRL_BASE + 13), None);
        assert_eq!(Token::classify(CTRL_BASE + 32), Some(Token::FieldType(FieldType::Null)));
        assert_eq!(Token::classify(CTRL_BASE + 38), Some(Token::FieldType(FieldType::Object)));
        assert_eq!(Token::classify(CTRL_BASE + 39), None);
        assert_eq!(Token::classify(MASK_CHUNK_BASE + 0xffff), Some(Token::MaskChunk(0xffff)));
        assert_eq!(Token::classify(MASK_CHUNK_BASE + 0x1_0000), None);
        assert_eq!(Token::classify(ARRAY_LEN_BASE + 99_999), Some(Token::ArrayLen(99_999)));
        assert_eq!(Token::classify(DICT_REF_BASE), Some(Token::DictRef(0)));
        assert_eq!(Token::classify(DICT_REF_BASE + BAND_WIDTH), None);
        assert_eq!(Token::classify(u32::MAX), None);
    }

    #[test]
    fn every_token_kind_maps_back_to_its_id() {
        let mut tokens: Vec<Token> = Opcode::ALL.iter().map(|op| Token::Control(*op)).collect();
        tokens.extend(FieldType::ALL.iter().map(|t| Token::FieldType(*t)));
        tokens.extend([
            Token::Vocabulary(42),
            Token::MaskChunk(0b1010),
            Token::ArrayLen(7),
            Token::DictRef(3),
        ]);
        for token in tokens {
            assert_eq!(Token::classify(token.id()), Some(token));
        }
    }
}
