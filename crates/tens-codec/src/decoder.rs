//! Token-stream decoder.

use std::collections::BTreeMap;
use tens_canonical::{CanonicalValue, Number};

use crate::bands::{Opcode, Token, MASK_CHUNK_BITS, MAX_NESTING_DEPTH};
use crate::dictionary::Dictionary;
use crate::errors::CodecError;
use crate::flatten::{unflatten, FlatRow};
use crate::frame::read_frame;
use crate::schema::Schema;
use crate::tokenizer::Tokenizer;

/// Output of [`Decoder::decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedStream {
    /// Decoded rows.
    pub rows: Vec<CanonicalValue>,
    /// Schemas defined by the stream.
    pub schemas: Vec<Schema>,
    /// Dictionary defined by the stream.
    pub dictionary: Dictionary,
}

/// Decodes token streams written with one tokenizer.
pub struct Decoder<'a> {
    tokenizer: &'a dyn Tokenizer,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder reading literals with `tokenizer`.
    pub fn new(tokenizer: &'a dyn Tokenizer) -> Self {
        Self { tokenizer }
    }

    /// Decodes a framed buffer. The header must name this decoder's encoding.
    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedStream, CodecError> {
        let (header, tokens) = read_frame(bytes)?;
        if header.encoding_name != self.tokenizer.encoding_name() {
            return Err(CodecError::EncodingMismatch {
                expected: self.tokenizer.encoding_name().to_string(),
                found: header.encoding_name,
            });
        }
        self.decode_tokens(&tokens)
    }

    /// Decodes a bare token stream.
    pub fn decode_tokens(&self, tokens: &[u32]) -> Result<DecodedStream, CodecError> {
        let tokens = tokens
            .iter()
            .enumerate()
            .map(|(offset, &id)| {
                Token::classify(id).ok_or(CodecError::InvalidToken { offset, token: id })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut cursor = Cursor {
            tokens: &tokens,
            pos: 0,
            tokenizer: self.tokenizer,
            dictionary: Dictionary::default(),
        };
        cursor.read_dictionary()?;
        let schemas = cursor.read_schemas()?;

        let mut rows = Vec::new();
        while cursor.peek().is_some() {
            let flat = cursor.read_row(&schemas)?;
            cursor.expect(Opcode::RowBreak, "ROW_BREAK")?;
            rows.push(CanonicalValue::Object(unflatten(flat)));
        }

        Ok(DecodedStream {
            rows,
            schemas,
            dictionary: cursor.dictionary,
        })
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    tokenizer: &'a dyn Tokenizer,
    dictionary: Dictionary,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn at(&self, op: Opcode) -> bool {
        self.peek() == Some(Token::Control(op))
    }

    fn unexpected(&self, expected: &'static str) -> CodecError {
        CodecError::UnexpectedToken {
            offset: self.pos,
            expected,
            found: match self.peek() {
                Some(token) => token.to_string(),
                None => "end of stream".to_string(),
            },
        }
    }

    fn expect(&mut self, op: Opcode, name: &'static str) -> Result<(), CodecError> {
        if !self.at(op) {
            return Err(self.unexpected(name));
        }
        self.pos += 1;
        Ok(())
    }

    /// Reads a run of vocabulary tokens. May be empty.
    fn read_literal(&mut self) -> Result<String, CodecError> {
        let start = self.pos;
        while let Some(Token::Vocabulary(_)) = self.peek() {
            self.pos += 1;
        }
        let ids: Vec<u32> = self.tokens[start..self.pos]
            .iter()
            .filter_map(|t| match t {
                Token::Vocabulary(id) => Some(*id),
                _ => None,
            })
            .collect();
        Ok(self.tokenizer.detokenize(&ids)?)
    }

    fn read_id_literal(&mut self, what: &'static str) -> Result<u32, CodecError> {
        let offset = self.pos;
        let text = self.read_literal()?;
        match text.parse::<u32>() {
            Ok(id) if id.to_string() == text => Ok(id),
            _ => Err(CodecError::InvalidLiteral { offset, what, text }),
        }
    }

    fn read_dictionary(&mut self) -> Result<(), CodecError> {
        let mut entries = Vec::new();
        while self.at(Opcode::DictDef) {
            self.pos += 1;
            let offset = self.pos;
            let id = self.read_id_literal("dictionary id")?;
            if id as usize != entries.len() {
                return Err(CodecError::InvalidLiteral {
                    offset,
                    what: "next dictionary id",
                    text: id.to_string(),
                });
            }
            self.expect(Opcode::Separator, "SEPARATOR")?;
            entries.push(self.read_literal()?);
            self.expect(Opcode::Separator, "SEPARATOR")?;
        }
        self.dictionary = Dictionary::from_entries(entries);
        Ok(())
    }

    fn read_schemas(&mut self) -> Result<Vec<Schema>, CodecError> {
        let mut schemas = Vec::new();
        while self.at(Opcode::SchemaDef) {
            self.pos += 1;
            let mut fields = Vec::new();
            let mut field_types = Vec::new();
            while let Some(Token::FieldType(field_type)) = self.peek() {
                self.pos += 1;
                fields.push(self.read_literal()?);
                field_types.push(field_type);
                self.expect(Opcode::Separator, "SEPARATOR")?;
            }
            schemas.push(Schema {
                id: schemas.len() as u32 + 1,
                fields,
                field_types,
            });
        }
        Ok(schemas)
    }

    fn read_row(&mut self, schemas: &[Schema]) -> Result<FlatRow, CodecError> {
        if self.at(Opcode::SchemaRef) {
            self.pos += 1;
            let offset = self.pos;
            let id = self.read_id_literal("schema id")?;
            let schema = id
                .checked_sub(1)
                .and_then(|index| schemas.get(index as usize))
                .ok_or(CodecError::UnknownSchemaRef { offset, id })?;
            self.expect(Opcode::ObjStart, "OBJ_START")?;
            let row = self.read_values(schema, None)?;
            self.expect(Opcode::ObjEnd, "OBJ_END")?;
            return Ok(row);
        }

        let schema = match schemas {
            [only] => only,
            [] => return Err(self.unexpected("SCHEMA_DEF")),
            _ => return Err(self.unexpected("SCHEMA_REF")),
        };

        if self.at(Opcode::PresenceMask) {
            let mask = self.read_mask(schema.field_count())?;
            return self.read_values(schema, Some(&mask));
        }
        self.read_values(schema, None)
    }

    fn read_mask(&mut self, field_count: usize) -> Result<Vec<u16>, CodecError> {
        let offset = self.pos;
        self.pos += 1;
        let mut chunks = Vec::new();
        while let Some(Token::MaskChunk(bits)) = self.peek() {
            self.pos += 1;
            chunks.push(bits);
        }

        let expected = field_count.div_ceil(MASK_CHUNK_BITS);
        if chunks.len() != expected {
            return Err(CodecError::MaskFraming {
                offset,
                reason: format!(
                    "{} chunks for {} fields, expected {}",
                    chunks.len(),
                    field_count,
                    expected
                ),
            });
        }
        let tail = field_count % MASK_CHUNK_BITS;
        if let (Some(last), true) = (chunks.last(), tail != 0) {
            if last >> tail != 0 {
                return Err(CodecError::MaskFraming {
                    offset,
                    reason: format!("bits set beyond field {}", field_count - 1),
                });
            }
        }
        Ok(chunks)
    }

    /// Reads one value per schema field, each followed by a separator.
    /// Fields whose mask bit is clear are `null` and take no tokens.
    fn read_values(
        &mut self,
        schema: &Schema,
        mask: Option<&[u16]>,
    ) -> Result<FlatRow, CodecError> {
        let mut row = FlatRow::new();
        for (i, field) in schema.fields.iter().enumerate() {
            let present = match mask {
                Some(chunks) => chunks[i / MASK_CHUNK_BITS] >> (i % MASK_CHUNK_BITS) & 1 == 1,
                None => true,
            };
            let value = if present {
                let value = self.read_value(0)?;
                self.expect(Opcode::Separator, "SEPARATOR")?;
                value
            } else {
                CanonicalValue::Null
            };
            row.insert(field.clone(), value);
        }
        Ok(row)
    }

    /// Reads one value. Unmarked literals are numbers when their text is
    /// canonical number text; `STRING_LIT` forces a string.
    fn read_value(&mut self, depth: usize) -> Result<CanonicalValue, CodecError> {
        let offset = self.pos;
        match self.peek() {
            Some(Token::Control(Opcode::NullVal)) => {
                self.pos += 1;
                Ok(CanonicalValue::Null)
            }
            Some(Token::Control(Opcode::BoolTrue)) => {
                self.pos += 1;
                Ok(CanonicalValue::Bool(true))
            }
            Some(Token::Control(Opcode::BoolFalse)) => {
                self.pos += 1;
                Ok(CanonicalValue::Bool(false))
            }
            Some(Token::DictRef(id)) => {
                self.pos += 1;
                self.dictionary
                    .get(id)
                    .map(CanonicalValue::from)
                    .ok_or(CodecError::UnknownDictRef { offset, id })
            }
            Some(Token::Control(Opcode::StringLit)) => {
                self.pos += 1;
                let text = self.read_literal()?;
                if Number::parse_canonical(&text).is_none() {
                    return Err(CodecError::InvalidLiteral {
                        offset,
                        what: "number-like string",
                        text,
                    });
                }
                Ok(CanonicalValue::String(text))
            }
            Some(Token::Control(Opcode::FixedArray)) => {
                self.enter(depth)?;
                self.pos += 1;
                let len = match self.peek() {
                    Some(Token::ArrayLen(len)) => len as usize,
                    _ => return Err(self.unexpected("array length")),
                };
                self.pos += 1;
                let mut items = Vec::with_capacity(len);
                for i in 0..len {
                    if i > 0 {
                        self.expect(Opcode::Separator, "SEPARATOR")?;
                    }
                    items.push(self.read_value(depth + 1)?);
                }
                Ok(CanonicalValue::Array(items))
            }
            Some(Token::Control(Opcode::ObjStart)) => {
                self.enter(depth)?;
                self.pos += 1;
                let mut map = BTreeMap::new();
                while !self.at(Opcode::ObjEnd) {
                    if self.peek().is_none() {
                        return Err(self.unexpected("OBJ_END"));
                    }
                    let key = self.read_literal()?;
                    self.expect(Opcode::Separator, "SEPARATOR")?;
                    let value = self.read_value(depth + 1)?;
                    self.expect(Opcode::Separator, "SEPARATOR")?;
                    map.insert(key, value);
                }
                self.pos += 1;
                Ok(CanonicalValue::Object(map))
            }
            _ => {
                let text = self.read_literal()?;
                Ok(match Number::parse_canonical(&text) {
                    Some(number) => CanonicalValue::Number(number),
                    None => CanonicalValue::String(text),
                })
            }
        }
    }

    fn enter(&self, depth: usize) -> Result<(), CodecError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(CodecError::NestingTooDeep {
                offset: self.pos,
                max: MAX_NESTING_DEPTH,
            });
        }
        Ok(())
    }
}
