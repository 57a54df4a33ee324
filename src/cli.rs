use clap::Parser;
use std::{convert::TryFrom, path::PathBuf};

#[derive(Parser, Debug)]
#[clap(author, version)]
#[clap(name = "txload")]
#[clap(
    about = "Generates load with barrier synchronized writer and reader threads",
    long_about = None
)]
pub struct Cli {
    /// Identifier of the store to attach to or create
    pub store: String,

    /// Number of reader threads
    #[clap(allow_negative_numbers = true)]
    pub readers: i64,

    /// Number of writer threads
    #[clap(allow_negative_numbers = true)]
    pub writers: i64,

    /// HOCON file with harness settings, read from its `txload` section
    #[clap(short, long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Reader and writer counts, or `None` if either is negative or does not fit a `usize`.
    pub fn counts(&self) -> Option<(usize, usize)> {
        let readers = usize::try_from(self.readers).ok()?;
        let writers = usize::try_from(self.writers).ok()?;

        Some((readers, writers))
    }
}
