use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use pdp10_tools::{
    cpu::{cache::page_base, Cpu, Engine, Exit, PAGE_SIZE},
    disasm::disassemble,
    format::{Format, WordReader, WordWriter},
    insn::Model,
    memory::Memory,
    word::Address,
};

fn parse_address(s: &str) -> anyhow::Result<Address> {
    let address = Address::from_str_radix(s, 8)?;
    if address > 0o777777 {
        anyhow::bail!("address out of range: {}", s);
    }
    Ok(address)
}

fn word_format(format: Option<&str>, path: &Path) -> anyhow::Result<Format> {
    Ok(match format {
        Some(name) => Format::from_name(name)?,
        None => Format::guess(path),
    })
}

fn load(image: &Path, format: Option<&str>, origin: Address) -> anyhow::Result<(Memory, usize)> {
    let format = word_format(format, image)?;
    let mut reader = WordReader::new(File::open(image)?, format);
    let mut memory = Memory::new();
    let len = memory.load(&mut reader, origin)?;
    info!(
        "{}: {} words at {:06o} ({:?})",
        image.display(),
        len,
        origin,
        format
    );
    Ok((memory, len))
}

#[argopt::subcmd]
fn run(
    #[opt(long, default_value = "cached")] engine: String,
    #[opt(long)] format: Option<String>,
    #[opt(long, default_value = "0")] origin: String,
    #[opt(long)] start: Option<String>,
    #[opt(long)] steps: Option<u64>,
    #[opt(long)] pure: bool,
    image: PathBuf,
) -> anyhow::Result<()> {
    let engine: Engine = engine.parse()?;
    let origin = parse_address(&origin)?;
    let start = match start {
        Some(start) => parse_address(&start)?,
        None => origin,
    };
    let (memory, len) = load(&image, format.as_deref(), origin)?;

    let mut cpu = Cpu::new(memory);
    cpu.set_engine(engine);
    if pure {
        let end = origin + len as Address;
        let mut page = page_base(origin);
        while page < end {
            cpu.pure_page(page);
            page += PAGE_SIZE as Address;
        }
    }

    let exit = match steps {
        Some(steps) => cpu.run_for(start, steps)?,
        None => Some(cpu.run(start)?),
    };
    match exit {
        Some(Exit::Halt(pc)) => info!("halted at {:06o}", pc),
        Some(Exit::Logout) => info!("logged out"),
        None => info!("still running after {} steps", steps.unwrap_or_default()),
    }

    Ok(())
}

#[argopt::subcmd]
fn disasm(
    #[opt(long)] format: Option<String>,
    #[opt(long, default_value = "0")] origin: String,
    #[opt(long, default_value = "all")] model: String,
    image: PathBuf,
) -> anyhow::Result<()> {
    let model: Model = model.parse()?;
    let (mut memory, _) = load(&image, format.as_deref(), parse_address(&origin)?)?;

    disassemble(&mut memory, model, |address, word, text| {
        println!("{:06o}/  {:012o}  {}", address, word, text);
    });

    Ok(())
}

#[argopt::subcmd]
fn convert(
    #[opt(long)] from: Option<String>,
    #[opt(long)] to: Option<String>,
    input: PathBuf,
    output: PathBuf,
) -> anyhow::Result<()> {
    let mut reader = WordReader::new(File::open(&input)?, word_format(from.as_deref(), &input)?);
    let mut writer = WordWriter::new(File::create(&output)?, word_format(to.as_deref(), &output)?);

    let mut count = 0;
    while let Some(word) = reader.get_word()? {
        writer.write_word(word)?;
        count += 1;
    }
    writer.flush()?;
    info!("converted {} words", count);

    Ok(())
}

#[argopt::cmd_group(commands = [run, disasm, convert])]
fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}
