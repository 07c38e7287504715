//! Bytecode opcodes
//!
//! The opcode values and their operand counts are an ABI shared by the
//! compiler, the interpreter and any external disassembler. Every
//! instruction is one opcode word followed by a fixed number of operand
//! words, except `CALL`, whose third operand is the number of trailing
//! parameter operands.
//!
//! Conditional instructions end with two length operands `t f`: the next
//! `t` words are the "then" block and the `f` words after those are the
//! "else" block. Loop instructions end with one length operand `b` for the
//! body.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::Serialize;
use std::fmt;

/// Opcode words of the stack machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    // === Stack manipulation ===
    /// Push a string constant.
    ///
    /// `c`
    Push = 0,
    /// Push the current input position.
    PushCurrPos = 1,
    /// Drop the top of stack.
    Pop = 2,
    /// Pop a saved position into the current position.
    PopCurrPos = 3,
    /// Drop `n` entries.
    ///
    /// `n`
    PopN = 4,
    /// Drop the entry below the top of stack.
    Nip = 5,
    /// Pop a value and append it to the array below it.
    Append = 6,
    /// Replace the top `n` entries with an array of them.
    ///
    /// `n`
    Wrap = 7,
    /// Replace a saved position with the input text from it to the current position.
    Text = 8,

    // === Conditions and loops ===
    /// Branch on the truthiness of the top of stack.
    ///
    /// `t f`
    If = 9,
    /// Branch if the top of stack is the failure sentinel.
    ///
    /// `t f`
    IfError = 10,
    /// Branch if the top of stack is not the failure sentinel.
    ///
    /// `t f`
    IfNotError = 11,
    /// Run the body while the top of stack is not the failure sentinel.
    ///
    /// `b`
    WhileNotError = 14,

    // === Matching ===
    /// Branch on whether any input remains.
    ///
    /// `t f`
    MatchAny = 15,
    /// Branch on whether the input continues with a string constant.
    ///
    /// `c t f`
    MatchString = 16,
    /// Like `MatchString`, ignoring case. The constant is stored lowercased.
    ///
    /// `c t f`
    MatchStringIc = 17,
    /// Branch on whether a regexp constant matches at the current position.
    ///
    /// `c t f`
    MatchRegexp = 18,
    /// Push the next `n` characters and advance past them.
    ///
    /// `n`
    AcceptN = 19,
    /// Push a string constant and advance past it.
    ///
    /// `c`
    AcceptString = 20,
    /// Push the failure sentinel and report an expectation constant.
    ///
    /// `e`
    Fail = 21,

    // === Calls ===
    /// Load the saved-position register from the stack entry `p` below the top.
    ///
    /// `p`
    LoadSavedPos = 22,
    /// Set the saved-position register to the current position.
    UpdateSavedPos = 23,
    /// Call action `f` with `pc` parameters, replacing the top `n` entries with the result.
    ///
    /// `f n pc p1 .. pN`
    Call = 24,
    /// Invoke rule `r` and push its result.
    ///
    /// `r`
    Rule = 25,

    // === Constants ===
    /// Push the undefined value.
    PushUndefined = 26,
    /// Push null.
    PushNull = 27,
    /// Push the failure sentinel without reporting.
    PushFailed = 28,
    /// Push an empty array.
    PushEmptyArray = 29,

    // === Ranges ===
    /// Branch if the array on top has fewer than `min` elements.
    ///
    /// `min t f`
    IfArrlenMin = 30,
    /// Branch if the array on top has at least `max` elements.
    ///
    /// `max t f`
    IfArrlenMax = 31,

    // === Silent failures ===
    /// Enter a predicate: failures stop being reported.
    SilentFailsOn = 32,
    /// Leave a predicate.
    SilentFailsOff = 33,
    /// Clear the silent-failure counter.
    SilentFailsReset = 34,

    /// Push the text a regexp constant matches and advance past it.
    ///
    /// `c`
    AcceptRegexp = 35,
}

/// Static facts about one opcode
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    /// The opcode
    pub opcode: Opcode,
    /// Mnemonic used in listings
    pub mnemonic: &'static str,
    /// Fixed operand count (for `CALL`, the count before the parameters)
    pub operands: usize,
}

const TABLE: &[OpcodeInfo] = &[
    info(Opcode::Push, "PUSH", 1),
    info(Opcode::PushCurrPos, "PUSH_CURR_POS", 0),
    info(Opcode::Pop, "POP", 0),
    info(Opcode::PopCurrPos, "POP_CURR_POS", 0),
    info(Opcode::PopN, "POP_N", 1),
    info(Opcode::Nip, "NIP", 0),
    info(Opcode::Append, "APPEND", 0),
    info(Opcode::Wrap, "WRAP", 1),
    info(Opcode::Text, "TEXT", 0),
    info(Opcode::If, "IF", 2),
    info(Opcode::IfError, "IF_ERROR", 2),
    info(Opcode::IfNotError, "IF_NOT_ERROR", 2),
    info(Opcode::WhileNotError, "WHILE_NOT_ERROR", 1),
    info(Opcode::MatchAny, "MATCH_ANY", 2),
    info(Opcode::MatchString, "MATCH_STRING", 3),
    info(Opcode::MatchStringIc, "MATCH_STRING_IC", 3),
    info(Opcode::MatchRegexp, "MATCH_REGEXP", 3),
    info(Opcode::AcceptN, "ACCEPT_N", 1),
    info(Opcode::AcceptString, "ACCEPT_STRING", 1),
    info(Opcode::Fail, "FAIL", 1),
    info(Opcode::LoadSavedPos, "LOAD_SAVED_POS", 1),
    info(Opcode::UpdateSavedPos, "UPDATE_SAVED_POS", 0),
    info(Opcode::Call, "CALL", 3),
    info(Opcode::Rule, "RULE", 1),
    info(Opcode::PushUndefined, "PUSH_UNDEFINED", 0),
    info(Opcode::PushNull, "PUSH_NULL", 0),
    info(Opcode::PushFailed, "PUSH_FAILED", 0),
    info(Opcode::PushEmptyArray, "PUSH_EMPTY_ARRAY", 0),
    info(Opcode::IfArrlenMin, "IF_ARRLEN_MIN", 3),
    info(Opcode::IfArrlenMax, "IF_ARRLEN_MAX", 3),
    info(Opcode::SilentFailsOn, "SILENT_FAILS_ON", 0),
    info(Opcode::SilentFailsOff, "SILENT_FAILS_OFF", 0),
    info(Opcode::SilentFailsReset, "SILENT_FAILS_RESET", 0),
    info(Opcode::AcceptRegexp, "ACCEPT_REGEXP", 1),
];

const fn info(opcode: Opcode, mnemonic: &'static str, operands: usize) -> OpcodeInfo {
    OpcodeInfo {
        opcode,
        mnemonic,
        operands,
    }
}

impl Opcode {
    /// All opcodes, in table order
    pub fn all() -> impl Iterator<Item = Opcode> {
        TABLE.iter().map(|i| i.opcode)
    }

    /// Decode an opcode word
    #[inline]
    pub fn from_word(word: u32) -> Option<Opcode> {
        u8::try_from(word)
            .ok()
            .and_then(|b| Opcode::try_from(b).ok())
    }

    /// The opcode word
    #[inline]
    pub fn word(self) -> u32 {
        u8::from(self) as u32
    }

    /// Static facts for this opcode
    pub fn info(self) -> &'static OpcodeInfo {
        // Every variant has exactly one table row.
        let index = TABLE
            .iter()
            .position(|i| i.opcode == self)
            .unwrap_or(TABLE.len() - 1);
        &TABLE[index]
    }

    /// Mnemonic used in listings
    pub fn mnemonic(self) -> &'static str {
        self.info().mnemonic
    }

    /// Fixed operand count
    pub fn operands(self) -> usize {
        self.info().operands
    }

    /// Whether the last two operands are then/else block lengths
    pub fn is_condition(self) -> bool {
        matches!(
            self,
            Opcode::If
                | Opcode::IfError
                | Opcode::IfNotError
                | Opcode::MatchAny
                | Opcode::MatchString
                | Opcode::MatchStringIc
                | Opcode::MatchRegexp
                | Opcode::IfArrlenMin
                | Opcode::IfArrlenMax
        )
    }

    /// Whether the last operand is a loop body length
    pub fn is_loop(self) -> bool {
        matches!(self, Opcode::WhileNotError)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Total length in words of the instruction at `ip`, if it is well formed
pub fn instruction_len(bytecode: &[u32], ip: usize) -> Option<usize> {
    let opcode = Opcode::from_word(*bytecode.get(ip)?)?;
    let mut len = 1 + opcode.operands();
    if opcode == Opcode::Call {
        len += *bytecode.get(ip + 3)? as usize;
    }
    if ip + len > bytecode.len() {
        return None;
    }
    Some(len)
}

/// One decoded instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    /// Offset of the opcode word
    pub offset: usize,
    /// Raw opcode word
    pub opcode: u32,
    /// Mnemonic
    pub mnemonic: &'static str,
    /// Operand words
    pub operands: Vec<u32>,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>5}  {}", self.offset, self.mnemonic)?;
        for (i, op) in self.operands.iter().enumerate() {
            if i == 0 {
                write!(f, " {}", op)?;
            } else {
                write!(f, ", {}", op)?;
            }
        }
        Ok(())
    }
}

/// Error produced when a word sequence is not valid bytecode
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecompileError {
    /// The word at `offset` is not an opcode
    #[error("invalid opcode {word} at offset {offset}")]
    InvalidOpcode {
        /// Offset of the bad word
        offset: usize,
        /// The word
        word: u32,
    },
    /// The instruction at `offset` needs more words than remain
    #[error("truncated {mnemonic} at offset {offset}")]
    Truncated {
        /// Offset of the opcode
        offset: usize,
        /// Mnemonic of the opcode
        mnemonic: &'static str,
    },
}

/// Decode a whole bytecode array, one instruction per opcode word
///
/// Blocks of conditions and loops are decoded inline, so the listing has
/// exactly one entry for every instruction start.
pub fn decompile(bytecode: &[u32]) -> Result<Vec<Instruction>, DecompileError> {
    let mut out = Vec::new();
    let mut ip = 0;

    while ip < bytecode.len() {
        let word = bytecode[ip];
        let opcode = Opcode::from_word(word)
            .ok_or(DecompileError::InvalidOpcode { offset: ip, word })?;
        let len = instruction_len(bytecode, ip).ok_or(DecompileError::Truncated {
            offset: ip,
            mnemonic: opcode.mnemonic(),
        })?;

        out.push(Instruction {
            offset: ip,
            opcode: word,
            mnemonic: opcode.mnemonic(),
            operands: bytecode[ip + 1..ip + len].to_vec(),
        });
        ip += len;
    }

    Ok(out)
}
