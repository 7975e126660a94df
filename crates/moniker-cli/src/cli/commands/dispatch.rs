use super::super::args::*;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Parse(args) => super::parse::run(args),
        Command::Cat(args) => super::cat::run(args),
        Command::Patch(args) => super::patch::run(args),
    }
}
