//! Compiled BEAM module container
//!
//! A `.beam` file is an IFF envelope: the magic `"FOR1"`, a big-endian
//! payload size, the form type `"BEAM"`, then named chunks. Each chunk is a
//! 4-byte name, a big-endian byte length, and the payload padded to a 4-byte
//! boundary. [`BeamFile`] extracts the chunk table and gives typed access to
//! the chunks the decompiler needs: the atom table, the import and export
//! tables, the literal table and the debug-info term.

use std::io::Read;
use std::path::Path;

use indexmap::IndexMap;
use nom::bytes::complete::{tag, take};
use nom::number::complete::be_u32;
use nom::IResult;
use thiserror::Error;
use tracing::{debug, warn};

use crate::term::Term;

pub mod code;
pub mod etf;
pub mod opcodes;

/// Errors from container extraction and the decoders layered on it.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a BEAM file: expected the FOR1/BEAM envelope")]
    BadMagic,

    #[error("truncated data: needed {needed} more bytes")]
    Truncated { needed: usize },

    #[error("required chunk {0:?} is missing")]
    MissingChunk(&'static str),

    #[error("external term format version {0} is not version 131")]
    UnsupportedVersion(u8),

    #[error("unsupported external term tag {0}")]
    UnsupportedTag(u8),

    #[error("improper list tail in external term data")]
    ImproperList,

    #[error("term nesting exceeds the decode depth ceiling")]
    TooDeep,

    #[error("big integer magnitude of {0} bytes exceeds the 8-byte limit")]
    BigTooLarge(usize),

    #[error("malformed float text in external term data")]
    BadFloat,

    #[error("unknown opcode {0} in code chunk")]
    UnknownOpcode(u64),

    #[error("unsupported compact term tag {0:#04x} in code chunk")]
    BadCompactTag(u8),

    #[error("atom index {0} is out of range")]
    AtomIndex(usize),
}

/// An entry in a module's import or export table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FunctionReference {
    pub module: Option<String>,
    pub function: Option<String>,
    pub arity: u32,
    /// Export entries carry a label instead of a module
    pub label: Option<u32>,
}

/// Chunk inventory entry: name, offset of the payload within the file, and
/// payload byte length.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChunkInfo {
    pub name: String,
    pub offset: usize,
    pub length: usize,
}

/// A parsed `.beam` container: the chunk table in file order.
#[derive(Debug, Clone)]
pub struct BeamFile {
    chunks: IndexMap<String, ChunkData>,
}

#[derive(Debug, Clone)]
struct ChunkData {
    offset: usize,
    bytes: Vec<u8>,
}

impl BeamFile {
    /// Read and parse a `.beam` file from disk.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let mut bytes = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut bytes)?;

        Self::parse(&bytes)
    }

    /// Parse a `.beam` container from bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (payload, declared_size) = envelope(bytes).map_err(|_| DecodeError::BadMagic)?;

        // the declared size counts from after the size field, BEAM tag included
        let available = payload.len() + 4;
        if (declared_size as usize) > available {
            warn!(
                declared = declared_size,
                available, "container size field exceeds the data on hand"
            );
        }

        let mut chunks = IndexMap::new();
        let mut rest = payload;

        while rest.len() >= 8 {
            let offset = bytes.len() - rest.len() + 8;
            let (after, (name, chunk_bytes)) =
                chunk(rest).map_err(|_| DecodeError::Truncated { needed: 8 })?;

            debug!(name = %name, length = chunk_bytes.len(), "chunk");
            chunks.insert(
                name,
                ChunkData {
                    offset,
                    bytes: chunk_bytes.to_vec(),
                },
            );
            rest = after;
        }

        Ok(BeamFile { chunks })
    }

    /// Raw payload of a named chunk.
    pub fn chunk(&self, name: &str) -> Option<&[u8]> {
        self.chunks.get(name).map(|chunk| chunk.bytes.as_slice())
    }

    /// The chunk inventory in file order.
    pub fn chunk_inventory(&self) -> Vec<ChunkInfo> {
        self.chunks
            .iter()
            .map(|(name, chunk)| ChunkInfo {
                name: name.clone(),
                offset: chunk.offset,
                length: chunk.bytes.len(),
            })
            .collect()
    }

    /// The atom table, from `AtU8` or the latin-1 `Atom` fallback.
    ///
    /// Atom operands in other chunks are 1-based; index 0 stands for `nil`.
    pub fn atoms(&self) -> Result<Vec<String>, DecodeError> {
        let bytes = self
            .chunk("AtU8")
            .or_else(|| self.chunk("Atom"))
            .ok_or(DecodeError::MissingChunk("AtU8"))?;

        let mut cursor = etf::Cursor::new(bytes);
        let count = cursor.u32_be()? as usize;
        let mut atoms = Vec::with_capacity(count);

        for _ in 0..count {
            let length = cursor.u8()? as usize;
            let name = cursor.take(length)?;
            atoms.push(String::from_utf8_lossy(name).into_owned());
        }

        Ok(atoms)
    }

    /// The module name: atom zero of the atom table.
    pub fn module_name(&self) -> Result<String, DecodeError> {
        let atoms = self.atoms()?;
        atoms.into_iter().next().ok_or(DecodeError::AtomIndex(0))
    }

    /// The import table (`ImpT`): functions this module calls externally.
    pub fn imports(&self) -> Result<Vec<FunctionReference>, DecodeError> {
        let bytes = self.chunk("ImpT").ok_or(DecodeError::MissingChunk("ImpT"))?;
        let atoms = self.atoms()?;

        let mut cursor = etf::Cursor::new(bytes);
        let count = cursor.u32_be()? as usize;
        let mut imports = Vec::with_capacity(count);

        for _ in 0..count {
            let module = atom_at(&atoms, cursor.u32_be()? as usize)?;
            let function = atom_at(&atoms, cursor.u32_be()? as usize)?;
            let arity = cursor.u32_be()?;

            imports.push(FunctionReference {
                module,
                function,
                arity,
                label: None,
            });
        }

        Ok(imports)
    }

    /// The export table (`ExpT`): this module's public functions.
    pub fn exports(&self) -> Result<Vec<FunctionReference>, DecodeError> {
        let bytes = self.chunk("ExpT").ok_or(DecodeError::MissingChunk("ExpT"))?;
        let atoms = self.atoms()?;

        let mut cursor = etf::Cursor::new(bytes);
        let count = cursor.u32_be()? as usize;
        let mut exports = Vec::with_capacity(count);

        for _ in 0..count {
            let function = atom_at(&atoms, cursor.u32_be()? as usize)?;
            let arity = cursor.u32_be()?;
            let label = cursor.u32_be()?;

            exports.push(FunctionReference {
                module: None,
                function,
                arity,
                label: Some(label),
            });
        }

        Ok(exports)
    }

    /// The literal table (`LitT`): zlib-deflated, a count then a
    /// length-prefixed external term per literal.
    pub fn literals(&self) -> Result<Vec<Term>, DecodeError> {
        let bytes = match self.chunk("LitT") {
            Some(bytes) => bytes,
            None => return Ok(Vec::new()),
        };

        let mut cursor = etf::Cursor::new(bytes);
        let uncompressed_size = cursor.u32_be()? as usize;
        let inflated = inflate(cursor.rest(), uncompressed_size)?;

        let mut cursor = etf::Cursor::new(&inflated);
        let count = cursor.u32_be()? as usize;
        let mut literals = Vec::with_capacity(count);

        for _ in 0..count {
            let length = cursor.u32_be()? as usize;
            let term_bytes = cursor.take(length)?;
            literals.push(etf::decode(term_bytes)?);
        }

        Ok(literals)
    }

    /// The debug-info term from the `Dbgi` chunk.
    pub fn debug_info_term(&self) -> Result<Term, DecodeError> {
        let bytes = self.chunk("Dbgi").ok_or(DecodeError::MissingChunk("Dbgi"))?;

        etf::decode(bytes)
    }

    /// The decoded `Code` chunk.
    pub fn code(&self) -> Result<code::Code, DecodeError> {
        let bytes = self.chunk("Code").ok_or(DecodeError::MissingChunk("Code"))?;

        code::Code::parse(bytes)
    }
}

fn atom_at(atoms: &[String], index: usize) -> Result<Option<String>, DecodeError> {
    if index == 0 {
        return Ok(None);
    }
    atoms
        .get(index - 1)
        .cloned()
        .map(Some)
        .ok_or(DecodeError::AtomIndex(index))
}

fn envelope(input: &[u8]) -> IResult<&[u8], u32> {
    let (input, _) = tag("FOR1")(input)?;
    let (input, size) = be_u32(input)?;
    let (input, _) = tag("BEAM")(input)?;

    Ok((input, size))
}

fn chunk(input: &[u8]) -> IResult<&[u8], (String, &[u8])> {
    let (input, name) = take(4usize)(input)?;
    let (input, length) = be_u32(input)?;
    let (input, bytes) = take(length as usize)(input)?;

    // chunks are padded to a 4-byte boundary
    let padding = (4 - length as usize % 4) % 4;
    let (input, _) = take(padding.min(input.len()))(input)?;

    Ok((
        input,
        (String::from_utf8_lossy(name).into_owned(), bytes),
    ))
}

pub(crate) fn inflate(bytes: &[u8], size_hint: usize) -> Result<Vec<u8>, DecodeError> {
    let mut inflated = Vec::with_capacity(size_hint);
    flate2::read::ZlibDecoder::new(bytes).read_to_end(&mut inflated)?;

    Ok(inflated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_bytes(name: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
        bytes.extend_from_slice(payload);
        while bytes.len() % 4 != 0 {
            bytes.push(0);
        }
        bytes
    }

    fn container(chunks: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(b"BEAM");
        for (name, payload) in chunks {
            body.extend_from_slice(&chunk_bytes(name, payload));
        }

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"FOR1");
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&body);
        bytes
    }

    fn atom_chunk(names: &[&str]) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&(names.len() as u32).to_be_bytes());
        for name in names {
            payload.push(name.len() as u8);
            payload.extend_from_slice(name.as_bytes());
        }
        payload
    }

    #[test]
    fn rejects_non_beam_data() {
        assert!(matches!(
            BeamFile::parse(b"RIFF....WAVE"),
            Err(DecodeError::BadMagic)
        ));
    }

    #[test]
    fn lists_chunks_in_file_order() {
        let bytes = container(&[
            ("AtU8", atom_chunk(&["Elixir.Sample"])),
            ("StrT", Vec::new()),
        ]);
        let beam = BeamFile::parse(&bytes).unwrap();

        let inventory = beam.chunk_inventory();
        assert_eq!(inventory.len(), 2);
        assert_eq!(inventory[0].name, "AtU8");
        assert_eq!(inventory[1].name, "StrT");
        assert_eq!(inventory[1].length, 0);
    }

    #[test]
    fn unpadded_chunk_payloads_survive_the_padding() {
        // a 5-byte payload forces 3 padding bytes before the next chunk
        let bytes = container(&[("StrT", vec![1, 2, 3, 4, 5]), ("Attr", vec![9])]);
        let beam = BeamFile::parse(&bytes).unwrap();

        assert_eq!(beam.chunk("StrT"), Some(&[1u8, 2, 3, 4, 5][..]));
        assert_eq!(beam.chunk("Attr"), Some(&[9u8][..]));
    }

    #[test]
    fn module_name_is_atom_zero() {
        let bytes = container(&[("AtU8", atom_chunk(&["Elixir.Sample", "ok"]))]);
        let beam = BeamFile::parse(&bytes).unwrap();

        assert_eq!(beam.module_name().unwrap(), "Elixir.Sample");
        assert_eq!(beam.atoms().unwrap(), vec!["Elixir.Sample", "ok"]);
    }

    #[test]
    fn imports_resolve_through_the_atom_table() {
        let mut import_payload = Vec::new();
        import_payload.extend_from_slice(&1u32.to_be_bytes());
        import_payload.extend_from_slice(&2u32.to_be_bytes()); // erlang
        import_payload.extend_from_slice(&3u32.to_be_bytes()); // self
        import_payload.extend_from_slice(&0u32.to_be_bytes()); // arity 0

        let bytes = container(&[
            ("AtU8", atom_chunk(&["Elixir.Sample", "erlang", "self"])),
            ("ImpT", import_payload),
        ]);
        let beam = BeamFile::parse(&bytes).unwrap();

        let imports = beam.imports().unwrap();
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].module.as_deref(), Some("erlang"));
        assert_eq!(imports[0].function.as_deref(), Some("self"));
        assert_eq!(imports[0].arity, 0);
    }

    #[test]
    fn missing_required_chunks_are_typed_errors() {
        let bytes = container(&[("AtU8", atom_chunk(&["Elixir.Sample"]))]);
        let beam = BeamFile::parse(&bytes).unwrap();

        assert!(matches!(
            beam.debug_info_term(),
            Err(DecodeError::MissingChunk("Dbgi"))
        ));
        assert!(matches!(beam.code(), Err(DecodeError::MissingChunk("Code"))));
    }

    #[test]
    fn literal_table_inflates_and_decodes() {
        use std::io::Write;

        // one literal: the atom :ok
        let term = [131u8, 119, 2, b'o', b'k'];
        let mut plain = Vec::new();
        plain.extend_from_slice(&1u32.to_be_bytes());
        plain.extend_from_slice(&(term.len() as u32).to_be_bytes());
        plain.extend_from_slice(&term);

        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&plain).unwrap();
        let deflated = encoder.finish().unwrap();

        let mut payload = Vec::new();
        payload.extend_from_slice(&(plain.len() as u32).to_be_bytes());
        payload.extend_from_slice(&deflated);

        let bytes = container(&[
            ("AtU8", atom_chunk(&["Elixir.Sample"])),
            ("LitT", payload),
        ]);
        let beam = BeamFile::parse(&bytes).unwrap();

        assert_eq!(beam.literals().unwrap(), vec![Term::atom("ok")]);
    }
}
