//! Code chunk decoder and assembly renderer
//!
//! The chunk holds a header (instruction-set version, maximum opcode used,
//! label and function counts) followed by instructions: an opcode byte, then
//! that opcode's operands in the compact term encoding. Operand values pack
//! into 4 or 11 bits when small and spill into big-endian byte runs when not;
//! tag 7 escapes into the extended encodings (old-style floats, embedded
//! lists, float registers, allocation lists, literal-table indexes).

use nom::number::complete::be_u32;
use nom::sequence::tuple;
use nom::IResult;
use tracing::warn;

use crate::render::inspect;
use crate::term::Term;

use super::etf::Cursor;
use super::{opcodes, DecodeError, FunctionReference};

/// A decoded operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Tag 0, an untagged unsigned value (arities, indexes, counts)
    Untagged(u64),
    Int(i64),
    /// Atom table index; 0 stands for `nil`
    Atom(u64),
    X(u64),
    Y(u64),
    Label(u64),
    Character(u64),
    Float(f64),
    FloatRegister(u64),
    List(Vec<Operand>),
    /// `(type, count)` pairs; type 0 words, 1 floats, 2 funs
    AllocList(Vec<(u64, u64)>),
    /// Literal table index
    Literal(u64),
}

/// One decoded instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub number: u64,
    pub name: &'static str,
    pub operands: Vec<Operand>,
}

/// Operand inlining choices for assembly text.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub inline: Inline,
}

#[derive(Debug, Clone, Copy)]
pub struct Inline {
    pub atoms: bool,
    pub imports: bool,
    pub integers: bool,
    pub literals: bool,
}

impl Default for Inline {
    fn default() -> Self {
        Inline {
            atoms: true,
            imports: false,
            integers: true,
            literals: false,
        }
    }
}

impl Options {
    /// Resolutions that cannot mislead: atom names and integers only.
    pub const UNAMBIGUOUS: Options = Options {
        inline: Inline {
            atoms: true,
            imports: false,
            integers: true,
            literals: false,
        },
    };

    /// Everything resolved, for human reading.
    pub const RESOLVED: Options = Options {
        inline: Inline {
            atoms: true,
            imports: true,
            integers: true,
            literals: true,
        },
    };
}

impl Default for Options {
    fn default() -> Self {
        Options::UNAMBIGUOUS
    }
}

/// Tables the assembly renderer resolves operand indexes against.
#[derive(Debug, Clone, Default)]
pub struct ResolveContext {
    pub atoms: Vec<String>,
    pub imports: Vec<FunctionReference>,
    pub literals: Vec<Term>,
}

/// The decoded Code chunk.
#[derive(Debug, Clone)]
pub struct Code {
    version: u32,
    max_opcode: u32,
    label_count: u32,
    function_count: u32,
    operations: Vec<Operation>,
}

impl Code {
    /// Decode a Code chunk payload.
    pub fn parse(bytes: &[u8]) -> Result<Self, DecodeError> {
        let (body, (_info_size, version, max_opcode, label_count, function_count)) =
            header(bytes).map_err(|_| DecodeError::Truncated { needed: 20 })?;

        if version != 0 {
            warn!(
                version,
                "instruction set version differs from 0; decoding may misread operands"
            );
        }
        if u64::from(max_opcode) > opcodes::MAX_OPCODE {
            warn!(
                max_opcode,
                known = opcodes::MAX_OPCODE,
                "module uses opcodes newer than this opcode table; decoding best-effort"
            );
        }

        let mut cursor = Cursor::new(body);
        let mut operations = Vec::new();

        while !cursor.is_empty() {
            let number = u64::from(cursor.u8()?);
            let (name, arity) =
                opcodes::lookup(number).ok_or(DecodeError::UnknownOpcode(number))?;

            let mut operands = Vec::with_capacity(arity);
            for _ in 0..arity {
                operands.push(decode_operand(&mut cursor)?);
            }

            operations.push(Operation {
                number,
                name,
                operands,
            });
        }

        Ok(Code {
            version,
            max_opcode,
            label_count,
            function_count,
            operations,
        })
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn max_opcode(&self) -> u32 {
        self.max_opcode
    }

    pub fn label_count(&self) -> u32 {
        self.label_count
    }

    pub fn function_count(&self) -> u32 {
        self.function_count
    }

    pub fn get(&self, index: usize) -> Option<&Operation> {
        self.operations.get(index)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Whole-chunk assembly text.
    ///
    /// Function heads sit at column zero. A head is the `func_info`
    /// instruction together with the `line` and `label` instructions
    /// immediately before it when present. Body labels indent 2, line
    /// markers 4, everything else 6, and control-flow exits get a blank
    /// separator line.
    pub fn assembly(&self, context: &ResolveContext, options: &Options) -> String {
        self.indented_operations()
            .into_iter()
            .map(|(indent, operation)| {
                let suffix = match operation.name {
                    "badmatch" | "call_ext_last" | "call_ext_only" | "call_only" | "call_last"
                    | "return" => "\n",
                    _ => "",
                };

                format!(
                    "{}{}{suffix}",
                    " ".repeat(indent),
                    operation.assembly(context, options)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Assembly text for one function, selected by its `func_info` name and
    /// arity.
    pub fn assembly_for(
        &self,
        context: &ResolveContext,
        options: &Options,
        name: &str,
        arity: u64,
    ) -> Option<String> {
        for (head, body) in self.function_spans() {
            let func_info = match head.iter().find(|operation| operation.name == "func_info") {
                Some(operation) => operation,
                None => continue,
            };
            let matches = match func_info.operands.as_slice() {
                [_, Operand::Atom(function), Operand::Untagged(function_arity)] => {
                    (*function as usize)
                        .checked_sub(1)
                        .and_then(|index| context.atoms.get(index))
                        .map(|atom| atom == name)
                        .unwrap_or(false)
                        && *function_arity == arity
                }
                _ => false,
            };
            if !matches {
                continue;
            }

            let mut lines = Vec::with_capacity(head.len() + body.len());
            for operation in head {
                lines.push(operation.assembly(context, options));
            }
            for operation in body {
                let indent = match operation.name {
                    "label" => 2,
                    "line" => 4,
                    _ => 6,
                };
                lines.push(format!(
                    "{}{}",
                    " ".repeat(indent),
                    operation.assembly(context, options)
                ));
            }
            return Some(lines.join("\n"));
        }

        None
    }

    fn indented_operations(&self) -> Vec<(usize, &Operation)> {
        let mut indented = Vec::with_capacity(self.operations.len());

        for (head, body) in self.function_spans() {
            for operation in head {
                indented.push((0, operation));
            }
            for operation in body {
                let indent = match operation.name {
                    "label" => 2,
                    "line" => 4,
                    _ => 6,
                };
                indented.push((indent, operation));
            }
        }

        indented
    }

    /// Split the instruction list into (head, body) spans per function.
    fn function_spans(&self) -> Vec<(&[Operation], &[Operation])> {
        let mut headers: Vec<(usize, usize)> = Vec::new();

        for (index, operation) in self.operations.iter().enumerate() {
            if operation.name != "func_info" {
                continue;
            }

            let preceded_by = |offset: usize, name: &str| {
                index
                    .checked_sub(offset)
                    .and_then(|at| self.operations.get(at))
                    .map(|operation| operation.name == name)
                    .unwrap_or(false)
            };

            if preceded_by(1, "line") {
                if preceded_by(2, "label") {
                    headers.push((index - 2, 3));
                } else {
                    headers.push((index - 1, 2));
                }
            } else {
                headers.push((index, 1));
            }
        }

        // instructions before the first header form a headless span
        if headers.first().map(|(start, _)| *start > 0).unwrap_or(false) {
            headers.insert(0, (0, 0));
        }

        headers
            .iter()
            .enumerate()
            .map(|(position, (start, length))| {
                let body_start = start + length;
                let span_end = headers
                    .get(position + 1)
                    .map(|(next, _)| *next)
                    .unwrap_or(self.operations.len());

                (
                    &self.operations[*start..body_start],
                    &self.operations[body_start..span_end],
                )
            })
            .collect()
    }
}

impl Operation {
    /// Single-instruction assembly text.
    pub fn assembly(&self, context: &ResolveContext, options: &Options) -> String {
        if self.operands.is_empty() {
            return self.name.to_string();
        }

        // the mnemonic already names its operand's rendering
        if let ("label", [Operand::Label(label)]) = (self.name, self.operands.as_slice()) {
            return format!("label({label})");
        }

        let import_operand = if options.inline.imports {
            import_operand_index(self.name)
        } else {
            None
        };

        let operands = self
            .operands
            .iter()
            .enumerate()
            .map(|(index, operand)| {
                if import_operand == Some(index) {
                    if let Operand::Untagged(import) = operand {
                        if let Some(text) = resolve_import(context, *import) {
                            return text;
                        }
                    }
                }
                operand_assembly(operand, context, options)
            })
            .collect::<Vec<_>>()
            .join(", ");

        format!("{}({operands})", self.name)
    }
}

/// Which operand of an instruction is an import-table index.
fn import_operand_index(name: &str) -> Option<usize> {
    match name {
        "call_ext" | "call_ext_last" | "call_ext_only" => Some(1),
        "bif0" => Some(0),
        "bif1" | "bif2" | "gc_bif1" | "gc_bif2" | "gc_bif3" => Some(1),
        _ => None,
    }
}

fn resolve_import(context: &ResolveContext, index: u64) -> Option<String> {
    let import = context.imports.get(index as usize)?;

    Some(format!(
        "{}:{}/{}",
        import.module.as_deref().unwrap_or("nil"),
        import.function.as_deref().unwrap_or("nil"),
        import.arity
    ))
}

fn operand_assembly(operand: &Operand, context: &ResolveContext, options: &Options) -> String {
    match operand {
        Operand::Untagged(value) => value.to_string(),
        Operand::Int(value) => {
            if options.inline.integers {
                value.to_string()
            } else {
                format!("int({value})")
            }
        }
        Operand::Atom(0) => "nil".to_string(),
        Operand::Atom(index) => {
            let resolved = if options.inline.atoms {
                context.atoms.get(*index as usize - 1)
            } else {
                None
            };
            match resolved {
                Some(name) => format!(":{name}"),
                None => format!("atom({index})"),
            }
        }
        Operand::X(register) => format!("x({register})"),
        Operand::Y(register) => format!("y({register})"),
        Operand::Label(label) => format!("label({label})"),
        Operand::Character(codepoint) => match u32::try_from(*codepoint)
            .ok()
            .and_then(char::from_u32)
        {
            Some(c) => format!("${c}"),
            None => format!("char({codepoint})"),
        },
        Operand::Float(value) => format!("{value:?}"),
        Operand::FloatRegister(register) => format!("fr({register})"),
        Operand::List(elements) => {
            let rendered = elements
                .iter()
                .map(|element| operand_assembly(element, context, options))
                .collect::<Vec<_>>()
                .join(", ");
            format!("[{rendered}]")
        }
        Operand::AllocList(pairs) => {
            let rendered = pairs
                .iter()
                .map(|(kind, count)| {
                    let name = match kind {
                        0 => "words",
                        1 => "floats",
                        2 => "funs",
                        _ => "unknown",
                    };
                    format!("{name}: {count}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            format!("alloc({rendered})")
        }
        Operand::Literal(index) => {
            let resolved = if options.inline.literals {
                context.literals.get(*index as usize)
            } else {
                None
            };
            match resolved {
                Some(term) => inspect::inspect(term),
                None => format!("literal({index})"),
            }
        }
    }
}

fn header(input: &[u8]) -> IResult<&[u8], (u32, u32, u32, u32, u32)> {
    tuple((be_u32, be_u32, be_u32, be_u32, be_u32))(input)
}

const TAG_MASK: u8 = 0b111;
const TAG_UNTAGGED: u8 = 0;
const TAG_INTEGER: u8 = 1;
const TAG_ATOM: u8 = 2;
const TAG_X: u8 = 3;
const TAG_Y: u8 = 4;
const TAG_LABEL: u8 = 5;
const TAG_CHARACTER: u8 = 6;

const EXTENDED_FLOAT: u8 = 0x07;
const EXTENDED_LIST: u8 = 0x17;
const EXTENDED_FLOAT_REGISTER: u8 = 0x27;
const EXTENDED_ALLOC_LIST: u8 = 0x37;
const EXTENDED_LITERAL: u8 = 0x47;

fn decode_operand(cursor: &mut Cursor) -> Result<Operand, DecodeError> {
    let byte = cursor.u8()?;

    if byte & TAG_MASK == 7 {
        return decode_extended(cursor, byte);
    }

    let tag = byte & TAG_MASK;

    if tag == TAG_INTEGER {
        let value = decode_signed_value(cursor, byte)?;
        return Ok(Operand::Int(value));
    }

    let value = decode_unsigned_value(cursor, byte)?;
    Ok(match tag {
        TAG_UNTAGGED => Operand::Untagged(value),
        TAG_ATOM => Operand::Atom(value),
        TAG_X => Operand::X(value),
        TAG_Y => Operand::Y(value),
        TAG_LABEL => Operand::Label(value),
        TAG_CHARACTER => Operand::Character(value),
        _ => return Err(DecodeError::BadCompactTag(byte)),
    })
}

fn decode_extended(cursor: &mut Cursor, byte: u8) -> Result<Operand, DecodeError> {
    match byte {
        EXTENDED_FLOAT => Ok(Operand::Float(f64::from_be_bytes(cursor.array()?))),
        EXTENDED_LIST => {
            let length = decode_length(cursor)?;
            let mut elements = Vec::with_capacity(length);
            for _ in 0..length {
                elements.push(decode_operand(cursor)?);
            }
            Ok(Operand::List(elements))
        }
        EXTENDED_FLOAT_REGISTER => {
            let register = decode_length(cursor)? as u64;
            Ok(Operand::FloatRegister(register))
        }
        EXTENDED_ALLOC_LIST => {
            let length = decode_length(cursor)?;
            let mut pairs = Vec::with_capacity(length);
            for _ in 0..length {
                let kind = decode_length(cursor)? as u64;
                let count = decode_length(cursor)? as u64;
                pairs.push((kind, count));
            }
            Ok(Operand::AllocList(pairs))
        }
        EXTENDED_LITERAL => {
            let index = decode_length(cursor)? as u64;
            Ok(Operand::Literal(index))
        }
        other => Err(DecodeError::BadCompactTag(other)),
    }
}

/// An embedded length or index: an untagged compact value.
fn decode_length(cursor: &mut Cursor) -> Result<usize, DecodeError> {
    let byte = cursor.u8()?;
    if byte & TAG_MASK != TAG_UNTAGGED {
        return Err(DecodeError::BadCompactTag(byte));
    }

    Ok(decode_unsigned_value(cursor, byte)? as usize)
}

fn decode_unsigned_value(cursor: &mut Cursor, byte: u8) -> Result<u64, DecodeError> {
    if byte & 0b1000 == 0 {
        // 4-bit immediate
        return Ok(u64::from(byte >> 4));
    }
    if byte & 0b1_0000 == 0 {
        // 11 bits: top 3 in this byte, 8 in the next
        let low = cursor.u8()?;
        return Ok((u64::from(byte >> 5) << 8) | u64::from(low));
    }

    let bytes = spilled_bytes(cursor, byte)?;
    let mut value: u64 = 0;
    for byte in bytes {
        value = (value << 8) | u64::from(*byte);
    }
    Ok(value)
}

fn decode_signed_value(cursor: &mut Cursor, byte: u8) -> Result<i64, DecodeError> {
    if byte & 0b1000 == 0 {
        return Ok(i64::from(byte >> 4));
    }
    if byte & 0b1_0000 == 0 {
        let low = cursor.u8()?;
        return Ok((i64::from(byte >> 5) << 8) | i64::from(low));
    }

    let bytes = spilled_bytes(cursor, byte)?;
    // sign-extend from the first byte
    let mut value: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
    for byte in bytes {
        value = (value << 8) | i64::from(*byte);
    }
    Ok(value)
}

/// The big-endian byte run of a spilled value. The 3 size bits encode
/// 2 to 8 bytes; the escape size 7 defers the byte count to a nested
/// value, which this decoder caps at 8 bytes.
fn spilled_bytes<'a>(cursor: &mut Cursor<'a>, byte: u8) -> Result<&'a [u8], DecodeError> {
    let size_code = usize::from(byte >> 5);
    let count = if size_code < 7 {
        size_code + 2
    } else {
        decode_length(cursor)? + 9
    };

    if count > 8 {
        return Err(DecodeError::BigTooLarge(count));
    }

    cursor.take(count)
}
