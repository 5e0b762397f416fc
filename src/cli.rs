use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "lms2py",
    about = "Compile MINDSTORMS Robot Inventor word-block (.lms) programs to MINDSTORMS Python."
)]
pub struct Args {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(value_name = "OUTPUT", help = "Write the generated Python program to this path.")]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        help = "Print the generated Python program instead of the block graph."
    )]
    pub python: bool,

    #[arg(
        long,
        help = "Emit placeholders for unknown blocks instead of failing. Unknown reporters read as 0."
    )]
    pub best_effort: bool,
}
