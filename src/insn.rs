//! Static instruction descriptors.
//!
//! Each descriptor covers a run of opcodes that share a mnemonic root: the
//! low `width` bits of the opcode pick the suffix. Descriptors that pin the
//! AC field (HALT, JOV and friends) come before the generic entry they
//! refine, and lookup is a linear scan, so the first match wins.

use crate::word::{ac_field, opcode, Word};

/// Set of processor models an instruction exists on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model(u8);

impl Model {
    pub const PDP6: Model = Model(0o01);
    pub const KA10: Model = Model(0o02);
    pub const KI10: Model = Model(0o04);
    pub const KL10: Model = Model(0o10);
    pub const KS10: Model = Model(0o20);
    pub const ALL: Model = Model(0o37);

    const KA_UP: Model = Model(0o36);
    const KI_UP: Model = Model(0o34);
    const KL_UP: Model = Model(0o30);

    pub fn intersects(self, other: Model) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for Model {
    type Output = Model;

    fn bitor(self, rhs: Model) -> Model {
        Model(self.0 | rhs.0)
    }
}

impl std::str::FromStr for Model {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "pdp6" => Model::PDP6,
            "ka10" => Model::KA10,
            "ki10" => Model::KI10,
            "kl10" => Model::KL10,
            "ks10" => Model::KS10,
            "all" => Model::ALL,
            _ => anyhow::bail!("unknown model: {}", s),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suffix {
    Plain,
    /// `""`, `I`, `M`, `S`.
    Modes,
    /// `""`, `I`, `M`, `B`.
    Both,
    /// Skip and jump conditions.
    Cond,
    /// `""`, `L`, `M`, `B`, `R`, `RI`, `RM`, `RB`.
    Float,
    /// The whole half-word family.
    Half,
    /// The whole test family.
    Test,
    /// I/O function from the AC field.
    Io,
    /// The opcode in octal.
    Octal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `AC,E`
    Normal,
    /// `E`; the AC field is part of the opcode or unused.
    NoAc,
    /// `DEV,E`
    Io,
    /// ITS `.OPER`: E names the call.
    Oper,
}

#[derive(Debug)]
pub struct Insn {
    pub opcode: u16,
    pub width: u8,
    /// AC field the instruction requires, if any.
    pub ac: Option<u8>,
    pub root: &'static str,
    pub suffix: Suffix,
    pub shape: Shape,
    pub models: Model,
}

const fn op(opcode: u16, width: u8, root: &'static str, suffix: Suffix, models: Model) -> Insn {
    Insn {
        opcode,
        width,
        ac: None,
        root,
        suffix,
        shape: Shape::Normal,
        models,
    }
}

const fn no_ac(opcode: u16, root: &'static str, models: Model) -> Insn {
    Insn {
        shape: Shape::NoAc,
        ..op(opcode, 0, root, Plain, models)
    }
}

const fn with_ac(opcode: u16, ac: u8, root: &'static str, models: Model) -> Insn {
    Insn {
        ac: Some(ac),
        ..no_ac(opcode, root, models)
    }
}

use Suffix::*;

const ALL: Model = Model::ALL;

pub static INSNS: &[Insn] = &[
    op(0o000, 0, "Z", Plain, ALL),
    op(0o000, 5, "UUO", Octal, ALL),
    // ITS system calls.
    with_ac(0o045, 0o16, ".VALUE", ALL),
    op(0o040, 0, ".IOT", Plain, ALL),
    op(0o041, 0, ".OPEN", Plain, ALL),
    Insn {
        shape: Shape::Oper,
        ..op(0o042, 0, ".OPER", Plain, ALL)
    },
    op(0o043, 0, ".CALL", Plain, ALL),
    op(0o044, 0, ".USET", Plain, ALL),
    op(0o045, 0, ".BREAK", Plain, ALL),
    op(0o046, 0, ".STATUS", Plain, ALL),
    op(0o047, 0, ".ACCESS", Plain, ALL),
    op(0o050, 3, "UUO", Octal, ALL),
    op(0o060, 4, "UUO", Octal, ALL),
    op(0o100, 2, "UUO", Octal, ALL),
    op(0o104, 0, "JSYS", Plain, Model::KL_UP),
    op(0o105, 0, "ADJSP", Plain, Model::KL_UP),
    op(0o106, 1, "UUO", Octal, ALL),
    // Double precision.
    op(0o110, 0, "DFAD", Plain, Model::KI_UP),
    op(0o111, 0, "DFSB", Plain, Model::KI_UP),
    op(0o112, 0, "DFMP", Plain, Model::KI_UP),
    op(0o113, 0, "DFDV", Plain, Model::KI_UP),
    op(0o114, 0, "DADD", Plain, Model::KL_UP),
    op(0o115, 0, "DSUB", Plain, Model::KL_UP),
    op(0o116, 0, "DMUL", Plain, Model::KL_UP),
    op(0o117, 0, "DDIV", Plain, Model::KL_UP),
    op(0o120, 0, "DMOVE", Plain, Model::KI_UP),
    op(0o121, 0, "DMOVN", Plain, Model::KI_UP),
    op(0o122, 0, "FIX", Plain, Model::KI_UP),
    op(0o123, 0, "EXTEND", Plain, Model::KL_UP),
    op(0o124, 0, "DMOVEM", Plain, Model::KI_UP),
    op(0o125, 0, "DMOVNM", Plain, Model::KI_UP),
    op(0o126, 0, "FIXR", Plain, Model::KI_UP),
    op(0o127, 0, "FLTR", Plain, Model::KI_UP),
    op(0o130, 0, "UFA", Plain, ALL),
    op(0o131, 0, "DFN", Plain, ALL),
    op(0o132, 0, "FSC", Plain, ALL),
    // Bytes.
    op(0o133, 0, "IBP", Plain, ALL),
    op(0o134, 0, "ILDB", Plain, ALL),
    op(0o135, 0, "LDB", Plain, ALL),
    op(0o136, 0, "IDPB", Plain, ALL),
    op(0o137, 0, "DPB", Plain, ALL),
    // Floating point.
    op(0o140, 3, "FAD", Float, ALL),
    op(0o150, 3, "FSB", Float, ALL),
    op(0o160, 3, "FMP", Float, ALL),
    op(0o170, 3, "FDV", Float, ALL),
    // Full word.
    op(0o200, 2, "MOVE", Modes, ALL),
    op(0o204, 2, "MOVS", Modes, ALL),
    op(0o210, 2, "MOVN", Modes, ALL),
    op(0o214, 2, "MOVM", Modes, ALL),
    op(0o220, 2, "IMUL", Both, ALL),
    op(0o224, 2, "MUL", Both, ALL),
    op(0o230, 2, "IDIV", Both, ALL),
    op(0o234, 2, "DIV", Both, ALL),
    op(0o240, 0, "ASH", Plain, ALL),
    op(0o241, 0, "ROT", Plain, ALL),
    op(0o242, 0, "LSH", Plain, ALL),
    op(0o243, 0, "JFFO", Plain, Model::KA_UP),
    op(0o244, 0, "ASHC", Plain, ALL),
    op(0o245, 0, "ROTC", Plain, ALL),
    op(0o246, 0, "LSHC", Plain, ALL),
    op(0o247, 0, "UUO247", Plain, ALL),
    op(0o250, 0, "EXCH", Plain, ALL),
    op(0o251, 0, "BLT", Plain, ALL),
    op(0o252, 0, "AOBJP", Plain, ALL),
    op(0o253, 0, "AOBJN", Plain, ALL),
    with_ac(0o254, 0o4, "HALT", ALL),
    with_ac(0o254, 0o2, "JRSTF", ALL),
    with_ac(0o254, 0o1, "PORTAL", Model::KI_UP),
    with_ac(0o254, 0o12, "JEN", ALL),
    op(0o254, 0, "JRST", Plain, ALL),
    with_ac(0o255, 0o10, "JOV", ALL),
    with_ac(0o255, 0o06, "JCRY", ALL),
    with_ac(0o255, 0o04, "JCRY0", ALL),
    with_ac(0o255, 0o02, "JCRY1", ALL),
    with_ac(0o255, 0o01, "JFOV", Model::KA_UP),
    op(0o255, 0, "JFCL", Plain, ALL),
    op(0o256, 0, "XCT", Plain, ALL),
    op(0o257, 0, "MAP", Plain, Model::KI_UP),
    // Stack and subroutines.
    op(0o260, 0, "PUSHJ", Plain, ALL),
    op(0o261, 0, "PUSH", Plain, ALL),
    op(0o262, 0, "POP", Plain, ALL),
    op(0o263, 0, "POPJ", Plain, ALL),
    no_ac(0o264, "JSR", ALL),
    op(0o265, 0, "JSP", Plain, ALL),
    op(0o266, 0, "JSA", Plain, ALL),
    op(0o267, 0, "JRA", Plain, ALL),
    op(0o270, 2, "ADD", Both, ALL),
    op(0o274, 2, "SUB", Both, ALL),
    // Compare, jump, skip.
    op(0o300, 3, "CAI", Cond, ALL),
    op(0o310, 3, "CAM", Cond, ALL),
    op(0o320, 3, "JUMP", Cond, ALL),
    op(0o330, 3, "SKIP", Cond, ALL),
    op(0o340, 3, "AOJ", Cond, ALL),
    op(0o350, 3, "AOS", Cond, ALL),
    op(0o360, 3, "SOJ", Cond, ALL),
    op(0o370, 3, "SOS", Cond, ALL),
    // Boolean.
    op(0o400, 2, "SETZ", Both, ALL),
    op(0o404, 2, "AND", Both, ALL),
    op(0o410, 2, "ANDCA", Both, ALL),
    op(0o414, 2, "SETM", Both, ALL),
    op(0o420, 2, "ANDCM", Both, ALL),
    op(0o424, 2, "SETA", Both, ALL),
    op(0o430, 2, "XOR", Both, ALL),
    op(0o434, 2, "IOR", Both, ALL),
    op(0o440, 2, "ANDCB", Both, ALL),
    op(0o444, 2, "EQV", Both, ALL),
    op(0o450, 2, "SETCA", Both, ALL),
    op(0o454, 2, "ORCA", Both, ALL),
    op(0o460, 2, "SETCM", Both, ALL),
    op(0o464, 2, "ORCM", Both, ALL),
    op(0o470, 2, "ORCB", Both, ALL),
    op(0o474, 2, "SETO", Both, ALL),
    op(0o500, 6, "H", Half, ALL),
    op(0o600, 6, "T", Test, ALL),
    Insn {
        shape: Shape::Io,
        ..op(0o700, 6, "", Io, ALL)
    },
];

static OPER_NAMES: &[(Word, &str)] = &[
    (0o01, ".ITYIC"),
    (0o02, ".LISTEN"),
    (0o03, ".SLEEP"),
    (0o04, ".SETMSK"),
    (0o05, ".SETM2"),
    (0o06, ".DEMON"),
    (0o07, ".CLOSE"),
    (0o10, ".UCLOSE"),
    (0o11, ".ATTY"),
    (0o12, ".DTTY"),
    (0o13, ".IOPUSH"),
    (0o14, ".IOPOP"),
    (0o15, ".DCLOSE"),
    (0o16, ".DSTOP"),
    (0o17, ".RDTIME"),
    (0o20, ".RDSW"),
    (0o21, ".GUN"),
    (0o22, ".UDISMT"),
    (0o23, ".GETSYS"),
    (0o24, ".IPDP"),
    (0o25, ".GETLOC"),
    (0o26, ".SETLOC"),
    (0o27, ".DISOWN"),
    (0o30, ".DWORD"),
    (0o31, ".DSTEP"),
    (0o32, ".GENSYM"),
    (0o33, ".LOGOUT"),
    (0o34, ".REALT"),
    (0o35, ".WSNAME"),
    (0o36, ".UPISET"),
    (0o37, ".RESET"),
    (0o40, ".ARMOVE"),
    (0o41, ".DCONTIN"),
    (0o42, ".CBLK"),
    (0o43, ".ASSIGN"),
    (0o44, ".DESIGN"),
    (0o45, ".RTIME"),
    (0o46, ".RDATE"),
    (0o47, ".HANG"),
    (0o50, ".EOFC"),
    (0o51, ".EVAL"),
    (0o52, ".REDEF"),
    (0o53, ".INSRT"),
    (0o64, ".SUSET"),
];

/// Name of the `.OPER` call numbered `n`.
pub fn oper_name(n: Word) -> Option<&'static str> {
    OPER_NAMES.iter().find(|(k, _)| *k == n).map(|(_, name)| *name)
}

const CONDS: [&str; 8] = ["", "L", "E", "LE", "A", "GE", "N", "G"];
const IO_FUNCTIONS: [&str; 8] = [
    "BLKI", "DATAI", "BLKO", "DATAO", "CONO", "CONI", "CONSZ", "CONSO",
];

impl Insn {
    pub fn matches(&self, word: Word) -> bool {
        let op = opcode(word);
        op >> self.width == (self.opcode as usize) >> self.width
            && self.ac.map_or(true, |ac| ac as usize == ac_field(word))
    }

    /// Full mnemonic of `word`, which must match this descriptor.
    pub fn mnemonic(&self, word: Word) -> String {
        let op = opcode(word);
        let low = op & ((1 << self.width) - 1);
        let suffix = match self.suffix {
            Plain => String::new(),
            Modes => ["", "I", "M", "S"][low].to_string(),
            Both => ["", "I", "M", "B"][low].to_string(),
            Cond => CONDS[low].to_string(),
            Float => ["", "L", "M", "B", "R", "RI", "RM", "RB"][low].to_string(),
            Half => half_suffix(low),
            Test => test_suffix(low),
            Io => IO_FUNCTIONS[ac_field(word) & 7].to_string(),
            Octal => format!("{op:03o}"),
        };
        format!("{}{}", self.root, suffix)
    }
}

fn half_suffix(low: usize) -> String {
    let kind = low >> 2;
    let to_right = kind & 0o10 != 0;
    let from_right = to_right != (kind & 1 != 0);
    let side = |right| if right { 'R' } else { 'L' };
    let ext = ["", "Z", "O", "E"][(kind >> 1) & 3];
    let mode = ["", "I", "M", "S"][low & 3];
    format!("{}{}{ext}{mode}", side(from_right), side(to_right))
}

fn test_suffix(low: usize) -> String {
    let operand = ["R", "L", "D", "S"][((low >> 3) & 1) << 1 | (low & 1)];
    let modify = ["N", "Z", "C", "O"][(low >> 4) & 3];
    let skip = ["", "E", "A", "N"][(low >> 1) & 3];
    format!("{operand}{modify}{skip}")
}

/// First descriptor for `word` that exists on any of `models`.
pub fn lookup(word: Word, models: Model) -> Option<&'static Insn> {
    INSNS
        .iter()
        .find(|i| i.models.intersects(models) && i.matches(word))
}
