use std::fmt;

/// One-byte instruction tags. Operands follow the tag big-endian.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    Halt = 0x00,
    Push = 0x01,
    Pop = 0x02,
    Load = 0x03,
    Store = 0x04,
    Get = 0x05,
    Dup = 0x06,
    Add = 0x10,
    Sub = 0x11,
    Mul = 0x12,
    Div = 0x13,
    Mod = 0x14,
    Compare = 0x15,
    And = 0x16,
    Or = 0x17,
    Not = 0x18,
    Jump = 0x20,
    True = 0x21,
    False = 0x22,
    Iter = 0x23,
    Make = 0x30,
    Set = 0x31,
    Call = 0x40,
    Invoke = 0x41,
    Return = 0x42,
    Defer = 0x43,
    Spawn = 0x44,
}

/// `MAKE` operand selecting the container kind.
pub const MAKE_MAP: u8 = 0;
pub const MAKE_ARRAY: u8 = 1;

/// `COMPARE` mode past the relational ones: true when the operand is nil or
/// the text "null". Takes one operand and never consults a proxy.
pub const COMPARE_ABSENT: u8 = 6;

const ALL: [Opcode; 27] = [
    Opcode::Halt,
    Opcode::Push,
    Opcode::Pop,
    Opcode::Load,
    Opcode::Store,
    Opcode::Get,
    Opcode::Dup,
    Opcode::Add,
    Opcode::Sub,
    Opcode::Mul,
    Opcode::Div,
    Opcode::Mod,
    Opcode::Compare,
    Opcode::And,
    Opcode::Or,
    Opcode::Not,
    Opcode::Jump,
    Opcode::True,
    Opcode::False,
    Opcode::Iter,
    Opcode::Make,
    Opcode::Set,
    Opcode::Call,
    Opcode::Invoke,
    Opcode::Return,
    Opcode::Defer,
    Opcode::Spawn,
];

const fn decode_table() -> [Option<Opcode>; 256] {
    let mut table = [None; 256];
    let mut i = 0;
    while i < ALL.len() {
        table[ALL[i] as usize] = Some(ALL[i]);
        i += 1;
    }
    table
}

const fn energy_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < ALL.len() {
        table[ALL[i] as usize] = ALL[i].energy();
        i += 1;
    }
    table
}

static DECODE: [Option<Opcode>; 256] = decode_table();

/// Cost charged per executed instruction, indexed by the raw opcode byte.
/// Unknown bytes cost nothing; the VM faults on them before charging.
pub static ENERGY: [u32; 256] = energy_table();

impl Opcode {
    #[inline]
    pub fn from_byte(b: u8) -> Option<Opcode> {
        DECODE[b as usize]
    }

    /// Number of operand bytes following the tag.
    pub const fn operand_width(self) -> usize {
        use Opcode::*;
        match self {
            Push | Load | Store | Jump | True | False | Iter => 2,
            Compare | Make | Call | Invoke => 1,
            _ => 0,
        }
    }

    pub const fn energy(self) -> u32 {
        use Opcode::*;
        match self {
            Halt => 0,
            Push | Pop | Dup | And | Or | Not => 1,
            Load | Store | Add | Sub => 2,
            Compare => 4,
            Jump | True | False => 3,
            Return => 5,
            Mul => 6,
            Set | Defer => 10,
            Get => 12,
            Iter => 15,
            Div | Mod => 25,
            Make => 80,
            Call | Invoke => 150,
            Spawn => 200,
        }
    }

    pub const fn name(self) -> &'static str {
        use Opcode::*;
        match self {
            Halt => "HALT",
            Push => "PUSH",
            Pop => "POP",
            Load => "LOAD",
            Store => "STORE",
            Get => "GET",
            Dup => "DUP",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Compare => "COMPARE",
            And => "AND",
            Or => "OR",
            Not => "NOT",
            Jump => "JUMP",
            True => "TRUE",
            False => "FALSE",
            Iter => "ITER",
            Make => "MAKE",
            Set => "SET",
            Call => "CALL",
            Invoke => "INVOKE",
            Return => "RETURN",
            Defer => "DEFER",
            Spawn => "SPAWN",
        }
    }

    /// Opcodes whose u16 operand is a code address.
    pub const fn is_jump(self) -> bool {
        matches!(self, Opcode::Jump | Opcode::True | Opcode::False | Opcode::Iter)
    }

    pub fn all() -> &'static [Opcode] {
        &ALL
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
