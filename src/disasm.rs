use crate::{
    insn::{self, Model, Shape},
    memory::Memory,
    word::{ac_field, index_field, indirect, lh, rh, y_field, Address, Word},
};

/// Mnemonic of `word` on any model, or its opcode in octal when nothing
/// matches.
pub fn mnemonic(word: Word) -> String {
    match insn::lookup(word, Model::ALL) {
        Some(i) => i.mnemonic(word),
        None => format!("{:03o}", crate::word::opcode(word)),
    }
}

fn address_part(word: Word) -> String {
    let mut s = String::new();
    if indirect(word) {
        s.push('@');
    }
    s += &format!("{:o}", y_field(word));
    let x = index_field(word);
    if x != 0 {
        s += &format!("({x:o})");
    }
    s
}

/// Render `word` as an instruction for `model`. Words that are not an
/// instruction on that model come out as half-words.
pub fn format_for(word: Word, model: Model) -> String {
    let Some(i) = insn::lookup(word, model) else {
        return format!("{:o},,{:o}", lh(word), rh(word));
    };
    let name = i.mnemonic(word);
    let ac = ac_field(word);
    let e = address_part(word);

    match i.shape {
        Shape::Normal if ac != 0 => format!("{name} {ac:o},{e}"),
        Shape::Normal | Shape::NoAc => format!("{name} {e}"),
        Shape::Io => {
            let device = ((word >> 26) & 0o177) << 2;
            format!("{name} {device:o},{e}")
        }
        Shape::Oper => {
            let oper = if indirect(word) || index_field(word) != 0 {
                None
            } else {
                insn::oper_name(y_field(word) as Word)
            };
            match (oper, ac) {
                (Some(call), 0) => call.to_string(),
                (Some(call), ac) => format!("{call} {ac:o},"),
                (None, 0) => format!("{name} {e}"),
                (None, ac) => format!("{name} {ac:o},{e}"),
            }
        }
    }
}

pub fn format_instruction(word: Word) -> String {
    format_for(word, Model::ALL)
}

/// Walk every mapped word in address order.
pub fn disassemble(memory: &mut Memory, model: Model, mut f: impl FnMut(Address, Word, &str)) {
    memory.set_address(None);
    while let Some((address, word)) = memory.get_next() {
        let text = format_for(word, model);
        f(address, word, &text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::instruction;

    #[test]
    fn operands() {
        assert_eq!(
            format_instruction(instruction(0o201, 1, false, 0, 5)),
            "MOVEI 1,5"
        );
        assert_eq!(
            format_instruction(instruction(0o200, 2, true, 3, 0o100)),
            "MOVE 2,@100(3)"
        );
        assert_eq!(format_instruction(instruction(0o254, 0, false, 0, 0)), "JRST 0");
        assert_eq!(
            format_instruction(instruction(0o254, 4, false, 0, 0o1000)),
            "HALT 1000"
        );
        assert_eq!(
            format_instruction(instruction(0o264, 0, false, 0, 0o200)),
            "JSR 200"
        );
    }

    #[test]
    fn io_and_oper() {
        // CONO 120,3
        let cono = instruction(0o700, 0, false, 0, 3) | (0o120 >> 2) << 26 | 4 << 23;
        assert_eq!(format_instruction(cono), "CONO 120,3");
        assert_eq!(
            format_instruction(instruction(0o042, 0, false, 0, 0o33)),
            ".LOGOUT"
        );
        assert_eq!(
            format_instruction(instruction(0o042, 1, false, 0, 0o51)),
            ".EVAL 1,"
        );
        assert_eq!(
            format_instruction(instruction(0o042, 0, false, 0, 0o777)),
            ".OPER 777"
        );
    }

    #[test]
    fn model_specific_words_fall_back_to_halves() {
        let dmove = instruction(0o120, 1, false, 0, 0o100);
        assert_eq!(format_for(dmove, Model::KA10), "120040,,100");
        assert_eq!(format_for(dmove, Model::KL10), "DMOVE 1,100");
    }

    #[test]
    fn walks_memory_in_order() {
        let mut memory = Memory::new();
        memory
            .add(0o200, vec![instruction(0o254, 0, false, 0, 0o200)].into())
            .unwrap();
        memory
            .add(0o100, vec![instruction(0o201, 1, false, 0, 5), 0].into())
            .unwrap();
        let mut lines = vec![];
        disassemble(&mut memory, Model::ALL, |address, _, text| {
            lines.push(format!("{address:06o}: {text}"))
        });
        assert_eq!(
            lines,
            ["000100: MOVEI 1,5", "000101: Z 0", "000200: JRST 200"]
        );
    }
}
