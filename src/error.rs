// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The crate's one fallible surface: decoding a wire [`crate::protocol::Instruction`]
//! back into an [`crate::types::OperationKind`].
//!
//! The document/OT/state-machine paths are total and never return
//! `Result` — only the codec can fail, and only on a malformed or
//! unrecognized instruction, which indicates a protocol version mismatch
//! rather than a recoverable local condition.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unknown instruction opcode {0:?}")]
    UnknownOpcode(crate::protocol::OpCode),

    #[error("instruction {opcode:?} is missing its {field} field")]
    MissingField {
        opcode: crate::protocol::OpCode,
        field: &'static str,
    },

    #[error("instruction {opcode:?} path has {found} element(s), expected {expected}")]
    MalformedPath {
        opcode: crate::protocol::OpCode,
        expected: usize,
        found: usize,
    },

    #[error("instruction {opcode:?} path element {index} could not be parsed as an index: {source}")]
    InvalidPathIndex {
        opcode: crate::protocol::OpCode,
        index: usize,
        #[source]
        source: std::num::ParseIntError,
    },

    #[error("instruction {opcode:?} has value of the wrong shape")]
    WrongValueShape { opcode: crate::protocol::OpCode },
}
