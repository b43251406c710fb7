//! Output sinks.

use std::io;

/// Destination of rendered text.
pub trait Output {
    fn write(&mut self, s: &str) -> io::Result<()>;
}

impl Output for String {
    fn write(&mut self, s: &str) -> io::Result<()> {
        self.push_str(s);
        Ok(())
    }
}

/// Adapts any [io::Write] into an [Output].
pub struct IoOutput<W: io::Write> {
    writer: W,
}

impl<W: io::Write> IoOutput<W> {
    pub fn new(writer: W) -> IoOutput<W> {
        IoOutput { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: io::Write> Output for IoOutput<W> {
    fn write(&mut self, s: &str) -> io::Result<()> {
        self.writer.write_all(s.as_bytes())
    }
}
