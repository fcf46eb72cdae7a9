//! Token-stream encoder.

use serde::{Deserialize, Serialize};
use tens_canonical::{CanonicalValue, Number};
use tracing::debug;

use crate::bands::{Opcode, Token, CTRL_BASE, MASK_CHUNK_BITS, MAX_ARRAY_LEN, MAX_NESTING_DEPTH};
use crate::dictionary::Dictionary;
use crate::errors::CodecError;
use crate::flatten::{flatten, FlatRow};
use crate::schema::{Schema, SchemaRegistry};
use crate::tokenizer::Tokenizer;

/// Options for encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderOptions {
    /// Null-cell ratio above which rows with nulls use masked framing (default: 0.5).
    pub sparse_threshold: f64,
    /// Whether to build a value dictionary (default: true).
    pub dictionary: bool,
    /// Minimum character count of a dictionary entry (default: 2).
    pub min_dict_chars: usize,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        Self {
            sparse_threshold: 0.5,
            dictionary: true,
            min_dict_chars: 2,
        }
    }
}

/// How a row is framed in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Framing {
    /// Values in schema order, no markers.
    Positional,
    /// Presence mask followed by the non-null values.
    Masked,
    /// Explicit schema reference wrapping the values.
    Referenced,
}

/// Layout decisions for one batch: flattened rows, schemas, dictionary and
/// sparsity.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    /// Flattened rows, in input order.
    pub rows: Vec<FlatRow>,
    /// Schema id of each row.
    pub row_schemas: Vec<u32>,
    /// Schemas in id order.
    pub schemas: Vec<Schema>,
    /// Value dictionary.
    pub dictionary: Dictionary,
    /// Total number of cells.
    pub cells: usize,
    /// Number of `null` cells.
    pub null_cells: usize,
    /// Whether the null ratio exceeds the sparse threshold.
    pub sparse: bool,
}

impl BatchPlan {
    /// Analyzes canonical rows. Every row must be an object.
    pub fn new(rows: &[CanonicalValue], options: &EncoderOptions) -> Result<Self, CodecError> {
        let mut registry = SchemaRegistry::new();
        let mut flat_rows = Vec::with_capacity(rows.len());
        let mut row_schemas = Vec::with_capacity(rows.len());
        let mut cells = 0;
        let mut null_cells = 0;

        for (index, row) in rows.iter().enumerate() {
            let object = row.as_object().ok_or(CodecError::RowNotObject { index })?;
            let flat = flatten(object);
            let fields: Vec<String> = flat.keys().cloned().collect();
            let id = registry.register(&fields).id;
            for (field, value) in &flat {
                registry.observe(id, field, value);
                if value.is_null() {
                    null_cells += 1;
                }
            }
            cells += flat.len();
            row_schemas.push(id);
            flat_rows.push(flat);
        }

        let dictionary = if options.dictionary {
            Dictionary::build(&flat_rows, options.min_dict_chars)
        } else {
            Dictionary::default()
        };
        let sparse = cells > 0 && (null_cells as f64 / cells as f64) > options.sparse_threshold;

        Ok(Self {
            rows: flat_rows,
            row_schemas,
            schemas: registry.into_schemas(),
            dictionary,
            cells,
            null_cells,
            sparse,
        })
    }

    /// Looks up a schema by id.
    pub fn schema(&self, id: u32) -> Option<&Schema> {
        id.checked_sub(1)
            .and_then(|index| self.schemas.get(index as usize))
    }

    /// Framing chosen for row `index`.
    pub fn framing(&self, index: usize) -> Framing {
        if self.schemas.len() > 1 {
            Framing::Referenced
        } else if self.sparse && self.rows[index].values().any(CanonicalValue::is_null) {
            Framing::Masked
        } else {
            Framing::Positional
        }
    }
}

/// Per-batch encoding counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeStats {
    /// Rows encoded.
    pub rows: usize,
    /// Rows in positional framing.
    pub positional_rows: usize,
    /// Rows in masked framing.
    pub masked_rows: usize,
    /// Rows in referenced framing.
    pub referenced_rows: usize,
    /// Dictionary entries defined.
    pub dictionary_entries: usize,
    /// Tokens emitted.
    pub tokens: usize,
}

/// Output of [`Encoder::encode`].
#[derive(Debug, Clone)]
pub struct EncodedStream {
    /// Token stream, without header.
    pub tokens: Vec<u32>,
    /// Schemas in id order.
    pub schemas: Vec<Schema>,
    /// Dictionary defined at the head of the stream.
    pub dictionary: Dictionary,
    /// Framing counters.
    pub stats: EncodeStats,
}

/// Encodes canonical rows into a token stream.
pub struct Encoder<'a> {
    tokenizer: &'a dyn Tokenizer,
    options: EncoderOptions,
}

impl<'a> Encoder<'a> {
    /// Creates an encoder writing literals with `tokenizer`.
    pub fn new(tokenizer: &'a dyn Tokenizer, options: EncoderOptions) -> Self {
        Self { tokenizer, options }
    }

    /// Encodes rows. The same rows always produce the same tokens.
    pub fn encode(&self, rows: &[CanonicalValue]) -> Result<EncodedStream, CodecError> {
        let plan = BatchPlan::new(rows, &self.options)?;
        let mut writer = StreamWriter::new(self.tokenizer, &plan.dictionary);
        let mut stats = EncodeStats {
            rows: plan.rows.len(),
            dictionary_entries: plan.dictionary.len(),
            ..EncodeStats::default()
        };

        for (id, entry) in plan.dictionary.entries().iter().enumerate() {
            writer.op(Opcode::DictDef);
            writer.literal(&id.to_string())?;
            writer.op(Opcode::Separator);
            writer.literal(entry)?;
            writer.op(Opcode::Separator);
        }

        for schema in &plan.schemas {
            writer.op(Opcode::SchemaDef);
            for (field, field_type) in schema.fields.iter().zip(&schema.field_types) {
                writer.push(Token::FieldType(*field_type));
                writer.literal(field)?;
                writer.op(Opcode::Separator);
            }
        }

        for (index, row) in plan.rows.iter().enumerate() {
            match plan.framing(index) {
                Framing::Positional => {
                    stats.positional_rows += 1;
                    for value in row.values() {
                        writer.value(value, 0)?;
                        writer.op(Opcode::Separator);
                    }
                }
                Framing::Masked => {
                    stats.masked_rows += 1;
                    writer.op(Opcode::PresenceMask);
                    for chunk in presence_chunks(row) {
                        writer.push(Token::MaskChunk(chunk));
                    }
                    for value in row.values().filter(|v| !v.is_null()) {
                        writer.value(value, 0)?;
                        writer.op(Opcode::Separator);
                    }
                }
                Framing::Referenced => {
                    stats.referenced_rows += 1;
                    writer.op(Opcode::SchemaRef);
                    writer.literal(&plan.row_schemas[index].to_string())?;
                    writer.op(Opcode::ObjStart);
                    for value in row.values() {
                        writer.value(value, 0)?;
                        writer.op(Opcode::Separator);
                    }
                    writer.op(Opcode::ObjEnd);
                }
            }
            writer.op(Opcode::RowBreak);
        }

        stats.tokens = writer.tokens.len();
        debug!(
            rows = stats.rows,
            schemas = plan.schemas.len(),
            dictionary_entries = stats.dictionary_entries,
            masked_rows = stats.masked_rows,
            tokens = stats.tokens,
            encoding = self.tokenizer.encoding_name(),
            "encoded token stream"
        );

        Ok(EncodedStream {
            tokens: writer.tokens,
            schemas: plan.schemas,
            dictionary: plan.dictionary,
            stats,
        })
    }
}

/// One bit per field, set when the value is not `null`.
fn presence_chunks(row: &FlatRow) -> Vec<u16> {
    let mut chunks = vec![0u16; row.len().div_ceil(MASK_CHUNK_BITS)];
    for (i, value) in row.values().enumerate() {
        if !value.is_null() {
            chunks[i / MASK_CHUNK_BITS] |= 1 << (i % MASK_CHUNK_BITS);
        }
    }
    chunks
}

struct StreamWriter<'a> {
    tokenizer: &'a dyn Tokenizer,
    dictionary: &'a Dictionary,
    limit: u32,
    tokens: Vec<u32>,
}

impl<'a> StreamWriter<'a> {
    fn new(tokenizer: &'a dyn Tokenizer, dictionary: &'a Dictionary) -> Self {
        Self {
            tokenizer,
            dictionary,
            limit: tokenizer.vocab_size().min(CTRL_BASE),
            tokens: Vec::new(),
        }
    }

    fn push(&mut self, token: Token) {
        self.tokens.push(token.id());
    }

    fn op(&mut self, op: Opcode) {
        self.push(Token::Control(op));
    }

    fn literal(&mut self, text: &str) -> Result<(), CodecError> {
        for id in self.tokenizer.tokenize(text) {
            if id >= self.limit {
                return Err(CodecError::VocabularyOverflow {
                    encoding: self.tokenizer.encoding_name().to_string(),
                    id,
                    limit: self.limit,
                });
            }
            self.tokens.push(id);
        }
        Ok(())
    }

    /// Writes one value. Strings whose text reads as a number are marked
    /// with `STRING_LIT` so every literal decodes to its original type.
    fn value(&mut self, value: &CanonicalValue, depth: usize) -> Result<(), CodecError> {
        match value {
            CanonicalValue::Null => self.op(Opcode::NullVal),
            CanonicalValue::Bool(true) => self.op(Opcode::BoolTrue),
            CanonicalValue::Bool(false) => self.op(Opcode::BoolFalse),
            CanonicalValue::Number(n) => self.literal(&n.to_string())?,
            CanonicalValue::String(s) => match self.dictionary.id_of(s) {
                Some(id) => self.push(Token::DictRef(id)),
                None => {
                    if Number::parse_canonical(s).is_some() {
                        self.op(Opcode::StringLit);
                    }
                    self.literal(s)?
                }
            },
            CanonicalValue::Array(items) => {
                self.enter(depth)?;
                if items.len() > MAX_ARRAY_LEN {
                    return Err(CodecError::ArrayTooLong {
                        len: items.len(),
                        max: MAX_ARRAY_LEN,
                    });
                }
                self.op(Opcode::FixedArray);
                self.push(Token::ArrayLen(items.len() as u32));
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.op(Opcode::Separator);
                    }
                    self.value(item, depth + 1)?;
                }
            }
            CanonicalValue::Object(map) => {
                self.enter(depth)?;
                self.op(Opcode::ObjStart);
                for (key, item) in map {
                    self.literal(key)?;
                    self.op(Opcode::Separator);
                    self.value(item, depth + 1)?;
                    self.op(Opcode::Separator);
                }
                self.op(Opcode::ObjEnd);
            }
        }
        Ok(())
    }

    fn enter(&self, depth: usize) -> Result<(), CodecError> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(CodecError::NestingTooDeep {
                offset: self.tokens.len(),
                max: MAX_NESTING_DEPTH,
            });
        }
        Ok(())
    }
}
