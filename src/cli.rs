use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "rezip")]
#[command(version)]
#[command(about = "A Rust zip utility with legacy ZipCrypto support", long_about = None)]
#[command(after_help = "Examples:\n  \
  rezip -l data1.zip             list files in data1.zip\n  \
  rezip data1.zip -x joe         extract all files except joe from data1.zip\n  \
  rezip -c out.zip src/ README   create out.zip from src/ and README\n  \
  rezip -c -P secret out.zip f   create an encrypted archive")]
pub struct Cli {
    /// ZIP file path
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract or add (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely/show version info
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Create a new archive from FILES
    #[arg(short = 'c', conflicts_with = "add")]
    pub create: bool,

    /// Add FILES to an existing archive
    #[arg(short = 'a')]
    pub add: bool,

    /// Password for encrypted entries (both directions)
    #[arg(short = 'P', value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }
}
