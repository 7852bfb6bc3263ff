use std::io::{self, IsTerminal as _, Read};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;

const UNKNOWN_LENGTH_STEP: u64 = 64 * 1024 * 1024;

const KNOWN_LENGTH_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {bytes:>10}/{total_bytes:10} {msg}";
const UNKNOWN_LENGTH_TEMPLATE: &str = "[{elapsed_precise}] {spinner} {bytes:>10} {msg}";

fn progress_bar(name: &str, total: Option<u64>) -> ProgressBar {
    let (bar, template) = match total {
        Some(total) => (ProgressBar::new(total), KNOWN_LENGTH_TEMPLATE),
        None => (ProgressBar::new_spinner(), UNKNOWN_LENGTH_TEMPLATE),
    };

    if !io::stderr().is_terminal() {
        bar.set_draw_target(ProgressDrawTarget::hidden());
    }

    if let Ok(style) = ProgressStyle::default_bar().template(template) {
        bar.set_style(style.progress_chars("#>."));
    }

    bar.set_message(name.to_owned());
    bar
}

/// Tracks the progress of a download as it is being read
///
/// A progress bar is drawn on interactive terminals, and milestones are logged every 10% of the
/// download, or every 64 MiB if the length isn't known.
#[derive(Debug)]
pub(crate) struct ProgressReader<R> {
    inner: R,
    bar: ProgressBar,
    name: String,
    total: Option<u64>,
    read: u64,
    next_report: u64,
}

impl<R: Read> ProgressReader<R> {
    pub(crate) fn new(inner: R, name: &str, total: Option<u64>) -> Self {
        let total = total.filter(|t| *t > 0);

        let mut reader = Self {
            inner,
            bar: progress_bar(name, total),
            name: name.to_owned(),
            total,
            read: 0,
            next_report: 0,
        };

        reader.next_report = reader.step();
        reader
    }

    fn step(&self) -> u64 {
        self.total
            .map_or(UNKNOWN_LENGTH_STEP, |total| (total / 10).max(1))
    }

    fn report(&self) {
        self.bar.suspend(|| match self.total {
            Some(total) => info!(
                "Downloading {}: {}% ({}/{} bytes)",
                self.name,
                self.read.saturating_mul(100) / total,
                self.read,
                total
            ),
            None => info!(
                "Downloading {}: {} MiB",
                self.name,
                self.read / (1024 * 1024)
            ),
        });
    }

    pub(crate) fn bytes_read(&self) -> u64 {
        self.read
    }
}

impl<R: Read> Read for ProgressReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.inner.read(buf)?;
        self.read += count as u64;
        self.bar.inc(count as u64);

        if count == 0 && !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }

        if count > 0 && self.read >= self.next_report {
            self.report();

            let step = self.step();
            while self.next_report <= self.read {
                self.next_report += step;
            }
        }

        Ok(count)
    }
}
