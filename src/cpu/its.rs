//! ITS system calls.
//!
//! Only what a simple console program needs is here: TTY channels, a few
//! `.OPER` calls and the ways of ending a job. Anything else stops the
//! machine with an unimplemented fault naming the call.

use std::io::{self, Read, Write};

use log::{debug, warn};

use super::{Cpu, Stop};
use crate::{
    insn,
    word::{
        lh, opcode, rh, sixbit_to_string, squoze_to_string, string_to_sixbit, Address, Word,
        HALF_MASK,
    },
};

type Result = std::result::Result<(), Stop>;

const IOT: usize = 0o040;
const OPEN: usize = 0o041;
const OPER: usize = 0o042;
const CALL: usize = 0o043;
const BREAK: usize = 0o045;

const OPER_LOGOUT: Word = 0o33;
const OPER_EVAL: Word = 0o51;
const OPER_SUSET: Word = 0o64;

/// `.BREAK 16,` (also known as `.VALUE`) ends the job.
const BREAK_LOGOUT: usize = 0o16;

const CHANNELS: usize = 16;
const USER_VARS: usize = 64;

// User variable indices for .SUSET.
const UNAME: usize = 0o4;
const JNAME: usize = 0o5;
const MEMT: usize = 0o12;
const SNAME: usize = 0o16;
const UIND: usize = 0o23;

/// `.SUSET` sets the variable instead of reading it.
const SUSET_WRITE: Word = 0o400000;

/// Device SIXBIT `TTY`, right-justified as in an `.OPEN` block.
const TTY: &str = "TTY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    TtyIn,
    TtyOut,
}

pub(super) struct Its {
    channels: [Option<Channel>; CHANNELS],
    vars: [Word; USER_VARS],
    output: Box<dyn Write>,
    input: Box<dyn Read>,
}

impl Drop for Its {
    fn drop(&mut self) {
        let _ = self.output.flush();
    }
}

impl Its {
    pub(super) fn new(top: Address) -> Self {
        let mut vars = [0; USER_VARS];
        vars[UNAME] = string_to_sixbit("GUEST");
        vars[JNAME] = string_to_sixbit("PDP10");
        vars[SNAME] = vars[UNAME];
        vars[MEMT] = top as Word;
        vars[UIND] = 1;
        Self {
            channels: [None; CHANNELS],
            vars,
            output: Box::new(io::stdout()),
            input: Box::new(io::stdin()),
        }
    }

    pub(super) fn set_console(&mut self, output: Box<dyn Write>, input: Box<dyn Read>) {
        self.output = output;
        self.input = input;
    }

    fn symbol(&self, name: &str) -> Option<Word> {
        match name {
            "ITSNAM" => Some(string_to_sixbit("PDP10")),
            "SUSRS" => Some(1),
            "SYSDBG" => Some(0),
            "TIME" => Some(0),
            "MEMT" => Some(self.vars[MEMT]),
            _ => None,
        }
    }
}

/// Monitor call entry point for opcodes 040-077 and JSYS.
pub(super) fn muuo(m: &mut Cpu) -> Result {
    match opcode(m.regs.ir) {
        IOT => iot(m),
        OPEN => open(m),
        OPER => oper(m),
        CALL => call(m),
        BREAK if m.regs.ac == BREAK_LOGOUT => logout(m),
        _ => {
            let name = crate::disasm::mnemonic(m.regs.ir);
            Err(m.unimplemented(format!("system call {name} {:o},{:o}", m.regs.ac, m.regs.ma)))
        }
    }
}

fn logout(m: &mut Cpu) -> Result {
    debug!("job logged out");
    m.its.output.flush()?;
    Err(Stop::Logout)
}

fn iot(m: &mut Cpu) -> Result {
    let ch = m.regs.ac;
    match m.its.channels[ch] {
        Some(Channel::TtyOut) => {
            let c = m.read_memory(m.regs.ma)? & 0o177;
            m.its.output.write_all(&[c as u8])?;
        }
        Some(Channel::TtyIn) => {
            m.its.output.flush()?;
            let mut buf = [0u8];
            // End of input reads as ^C.
            let c = match m.its.input.read(&mut buf)? {
                0 => 0o3,
                _ => buf[0] as Word & 0o177,
            };
            m.write_memory(m.regs.ma, c)?;
        }
        None => return Err(m.unimplemented(format!(".IOT on closed channel {ch:o}"))),
    }
    Ok(())
}

/// `.OPEN ch,E` with `mode,,device` in E. Skips when the channel opened.
fn open(m: &mut Cpu) -> Result {
    let block = m.read_memory(m.regs.ma)?;
    let device = sixbit_to_string(rh(block) << 18);
    let device = device.trim();
    let output = lh(block) & 1 != 0;
    let ch = m.regs.ac;

    if device != TTY {
        warn!(".OPEN of unsupported device {device} on channel {ch:o}");
        return Ok(());
    }
    let channel = if output {
        Channel::TtyOut
    } else {
        Channel::TtyIn
    };
    debug!(".OPEN {ch:o}: {channel:?}");
    m.its.channels[ch] = Some(channel);
    m.regs.skip();
    Ok(())
}

fn oper(m: &mut Cpu) -> Result {
    let n = m.regs.ma as Word;
    match n {
        OPER_LOGOUT => logout(m),
        OPER_EVAL => eval(m),
        OPER_SUSET => suset(m),
        _ => {
            let name = insn::oper_name(n).map_or_else(|| format!("{n:o}"), str::to_string);
            Err(m.unimplemented(format!(".OPER {name}")))
        }
    }
}

/// Look up the SQUOZE symbol in AC and replace it with its value, skipping.
fn eval(m: &mut Cpu) -> Result {
    let symbol = squoze_to_string(m.regs.fm[m.regs.ac]);
    match m.its.symbol(&symbol) {
        Some(value) => {
            m.regs.fm[m.regs.ac] = value;
            m.regs.skip();
        }
        None => warn!(".EVAL of unknown symbol {symbol}"),
    }
    Ok(())
}

/// AC holds `variable,,address`; bit 0 of the left half selects a store.
fn suset(m: &mut Cpu) -> Result {
    let arg = m.regs.fm[m.regs.ac];
    let index = (lh(arg) & 0o777) as usize;
    let address = rh(arg) as Address;
    if index >= USER_VARS {
        return Err(m.unimplemented(format!(".SUSET of variable {index:o}")));
    }
    if lh(arg) & SUSET_WRITE != 0 {
        m.its.vars[index] = m.read_memory(address)?;
    } else {
        let value = m.its.vars[index];
        m.write_memory(address, value)?;
    }
    Ok(())
}

/// `.CALL E` points at a block holding the call name in its second word.
fn call(m: &mut Cpu) -> Result {
    let name = m.read_memory((m.regs.ma + 1) & HALF_MASK as Address)?;
    Err(m.unimplemented(format!(".CALL {}", sixbit_to_string(name))))
}
