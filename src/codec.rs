// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Translates between [`OperationKind`] and the wire [`Instruction`] form.
//! Encoding never fails (every operation has exactly one instruction
//! shape); decoding fails only on a genuinely malformed or unrecognized
//! instruction, which the caller should treat as a protocol version
//! mismatch rather than something to recover from locally.

use tracing::warn;

use crate::error::CodecError;
use crate::protocol::{Instruction, InstructionValue, OpCode};
use crate::types::{Operation, OperationKind, Origin};

/// Encodes a single operation into its wire instruction.
#[must_use]
pub fn encode(op: &OperationKind) -> Instruction {
    match op {
        OperationKind::InsertText { line, column, text } => Instruction {
            o: OpCode::StrIns,
            p: vec![line.to_string()],
            i: Some(*column as i64),
            l: None,
            v: Some(InstructionValue::Text(text.clone())),
        },
        OperationKind::DeleteText { line, column, length } => Instruction {
            o: OpCode::StrRem,
            p: vec![line.to_string()],
            i: Some(*column as i64),
            l: Some(*length as i64),
            v: None,
        },
        OperationKind::InsertLine { index, text } => Instruction {
            o: OpCode::ArrIns,
            p: vec![],
            i: Some(*index as i64),
            l: None,
            v: Some(InstructionValue::Text(text.clone())),
        },
        OperationKind::DeleteLine { index } => Instruction {
            o: OpCode::ArrRemIdx,
            p: vec![],
            i: Some(*index as i64),
            l: None,
            v: None,
        },
        OperationKind::ReplaceLine { index, text } => Instruction {
            o: OpCode::Set,
            p: vec![index.to_string()],
            i: None,
            l: None,
            v: Some(InstructionValue::Text(text.clone())),
        },
        OperationKind::SplitLine { line, column } => Instruction {
            o: OpCode::Set,
            p: vec!["s".to_string(), line.to_string()],
            i: None,
            l: None,
            v: Some(InstructionValue::Int(*column as i64)),
        },
        OperationKind::MergeLine { line } => Instruction {
            o: OpCode::Set,
            p: vec!["m".to_string()],
            i: None,
            l: None,
            v: Some(InstructionValue::Int(*line as i64)),
        },
    }
}

/// Encodes a batch of operations in order.
#[must_use]
pub fn encode_many(ops: &[Operation]) -> Vec<Instruction> {
    ops.iter().map(|op| encode(&op.kind)).collect()
}

fn parse_path_index(inst: &Instruction, index: usize) -> Result<usize, CodecError> {
    let raw = inst.p.get(index).ok_or(CodecError::MalformedPath {
        opcode: inst.o,
        expected: index + 1,
        found: inst.p.len(),
    })?;
    raw.parse::<usize>()
        .map_err(|source| CodecError::InvalidPathIndex { opcode: inst.o, index, source })
}

fn text_value(inst: &Instruction) -> Result<String, CodecError> {
    match &inst.v {
        Some(InstructionValue::Text(t)) => Ok(t.clone()),
        _ => Err(CodecError::WrongValueShape { opcode: inst.o }),
    }
}

fn int_value(inst: &Instruction) -> Result<i64, CodecError> {
    match &inst.v {
        Some(InstructionValue::Int(i)) => Ok(*i),
        _ => Err(CodecError::WrongValueShape { opcode: inst.o }),
    }
}

fn field_i(inst: &Instruction) -> Result<usize, CodecError> {
    inst.i
        .map(|n| n as usize)
        .ok_or(CodecError::MissingField { opcode: inst.o, field: "i" })
}

fn field_l(inst: &Instruction) -> Result<usize, CodecError> {
    inst.l
        .map(|n| n as usize)
        .ok_or(CodecError::MissingField { opcode: inst.o, field: "l" })
}

/// Decodes a wire instruction back into an [`OperationKind`].
///
/// # Errors
///
/// Returns [`CodecError`] if the opcode is unrecognized, a required field
/// or path element is missing, or a present field has the wrong shape.
pub fn decode(inst: &Instruction) -> Result<OperationKind, CodecError> {
    match inst.o {
        OpCode::StrIns => Ok(OperationKind::InsertText {
            line: parse_path_index(inst, 0)?,
            column: field_i(inst)?,
            text: text_value(inst)?,
        }),
        OpCode::StrRem => Ok(OperationKind::DeleteText {
            line: parse_path_index(inst, 0)?,
            column: field_i(inst)?,
            length: field_l(inst)?,
        }),
        OpCode::ArrIns => Ok(OperationKind::InsertLine {
            index: field_i(inst)?,
            text: text_value(inst)?,
        }),
        OpCode::ArrRemIdx => Ok(OperationKind::DeleteLine { index: field_i(inst)? }),
        OpCode::Set => decode_set(inst),
    }
}

fn decode_set(inst: &Instruction) -> Result<OperationKind, CodecError> {
    match inst.p.first().map(String::as_str) {
        Some("s") => Ok(OperationKind::SplitLine {
            line: parse_path_index(inst, 1)?,
            column: usize::try_from(int_value(inst)?).map_err(|_| CodecError::WrongValueShape { opcode: inst.o })?,
        }),
        Some("m") => Ok(OperationKind::MergeLine {
            line: usize::try_from(int_value(inst)?).map_err(|_| CodecError::WrongValueShape { opcode: inst.o })?,
        }),
        _ => Ok(OperationKind::ReplaceLine {
            index: parse_path_index(inst, 0)?,
            text: text_value(inst)?,
        }),
    }
}

/// Decodes a batch of instructions, tagging every result with `origin`
/// (defaulting to [`Origin::Remote`] — how operations arriving over the
/// wire are normalized).
///
/// # Errors
///
/// Returns the first [`CodecError`] encountered; decoding is not partial.
pub fn decode_many(instructions: &[Instruction], origin: Origin) -> Result<Vec<Operation>, CodecError> {
    instructions
        .iter()
        .map(|inst| {
            decode(inst).map(|kind| Operation::new(kind, origin)).inspect_err(|error| {
                warn!(?error, opcode = ?inst.o, "codec: failed to decode instruction");
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::factories;
    use pretty_assertions::assert_eq;

    fn round_trips(op: OperationKind) {
        let encoded = encode(&op);
        let decoded = decode(&encoded).expect("decode should succeed for a freshly encoded instruction");
        assert_eq!(decoded, op);
    }

    #[test]
    fn insert_text_round_trips() {
        round_trips(factories::insert_text(3, 7, "hi").kind);
    }

    #[test]
    fn delete_text_round_trips() {
        round_trips(factories::delete_text(3, 7, 4).kind);
    }

    #[test]
    fn insert_line_round_trips() {
        round_trips(factories::insert_line(2, "new line").kind);
    }

    #[test]
    fn delete_line_round_trips() {
        round_trips(factories::delete_line(2).kind);
    }

    #[test]
    fn replace_line_round_trips() {
        round_trips(factories::replace_line(2, "replacement").kind);
    }

    #[test]
    fn split_line_round_trips() {
        round_trips(factories::split_line(2, 5).kind);
    }

    #[test]
    fn merge_line_round_trips() {
        round_trips(factories::merge_line(2).kind);
    }

    #[test]
    fn decoded_operation_is_normalized_to_remote_origin() {
        let instructions = vec![encode(&factories::insert_text(0, 0, "x").kind)];
        let ops = decode_many(&instructions, Origin::Remote).unwrap();
        assert_eq!(ops[0].origin, Origin::Remote);
    }

    #[test]
    fn unknown_set_shape_falls_back_to_replace_line() {
        // p = [] with opcode Set and no recognizable marker decodes as a
        // replaceLine whose index parse fails -- exercising the error path.
        let inst = Instruction { o: OpCode::Set, p: vec![], i: None, l: None, v: None };
        assert!(decode(&inst).is_err());
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let inst = Instruction { o: OpCode::ArrRemIdx, p: vec![], i: None, l: None, v: None };
        assert_eq!(decode(&inst), Err(CodecError::MissingField { opcode: OpCode::ArrRemIdx, field: "i" }));
    }

    #[test]
    fn malformed_path_is_an_error() {
        let inst = Instruction { o: OpCode::StrIns, p: vec![], i: Some(0), l: None, v: Some(InstructionValue::Text(String::new())) };
        assert!(matches!(decode(&inst), Err(CodecError::MalformedPath { .. })));
    }
}
