// SPDX-FileCopyrightText: 2026 lineot contributors
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Wire-format types shared by client and server: the compact instruction
//! record and the discriminated messages that ride over it. Everything
//! here is `serde`-derived so any transport that preserves field identity
//! and ordering (line-delimited JSON, a framed binary blob, …) can carry
//! it; this crate itself stays transport-agnostic.

use serde::{Deserialize, Serialize};

use crate::types::Position;

/// The wire opcode for an [`Instruction`], one per operation variant except
/// that `splitLine`/`mergeLine`/`replaceLine` all share `Set` and are told
/// apart by the shape of `p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpCode {
    #[serde(rename = "str_ins")]
    StrIns,
    #[serde(rename = "str_rem")]
    StrRem,
    #[serde(rename = "arr_ins")]
    ArrIns,
    #[serde(rename = "arr_rem_idx")]
    ArrRemIdx,
    #[serde(rename = "set")]
    Set,
}

/// The `v` field of an [`Instruction`]: either a string payload (inserted or
/// replacement text) or an integer payload (a split column or merge line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InstructionValue {
    Text(String),
    Int(i64),
}

/// The compact tagged record operations are encoded to for the wire. Field
/// names (`o`/`p`/`i`/`l`/`v`) are kept short and stable so this type is
/// bit-exact for interop with another implementation of the same protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub o: OpCode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub p: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub l: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<InstructionValue>,
}

/// A `(line, column)` position as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePosition {
    pub line: usize,
    pub column: usize,
}

impl From<Position> for WirePosition {
    fn from(pos: Position) -> Self {
        Self { line: pos.line, column: pos.column }
    }
}

impl From<WirePosition> for Position {
    fn from(pos: WirePosition) -> Self {
        Self::new(pos.line, pos.column)
    }
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    Operation {
        revision: u64,
        instructions: Vec<Instruction>,
    },
    Cursor {
        position: WirePosition,
        color: String,
    },
}

/// Messages the server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Ack {
        revision: u64,
    },
    #[serde(rename_all = "camelCase")]
    Operation {
        revision: u64,
        user_id: String,
        instructions: Vec<Instruction>,
    },
    Cursor {
        #[serde(rename = "userId")]
        user_id: String,
        position: WirePosition,
        color: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn client_operation_round_trips_through_json() {
        let msg = ClientMessage::Operation {
            revision: 3,
            instructions: vec![Instruction {
                o: OpCode::StrIns,
                p: vec!["0".to_string()],
                i: Some(2),
                l: None,
                v: Some(InstructionValue::Text("hi".to_string())),
            }],
        };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn server_ack_round_trips_through_json() {
        let msg = ServerMessage::Ack { revision: 5 };
        let json = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
