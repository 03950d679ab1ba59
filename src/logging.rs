//! Log output that leaves live progress bars intact.

use std::io;

use indicatif::MultiProgress;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;

/// Installs the global subscriber, writing to stderr around `bars`.
///
/// `RUST_LOG` overrides the default `info` level.
pub fn init_logging(bars: &MultiProgress) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(BarsAwareWriter::new(bars.clone(), io::stderr))
        .init();
}

/// Writer factory that hides the bars of `bars` while a log line is written,
/// then redraws them below it.
pub struct BarsAwareWriter<M> {
    bars: MultiProgress,
    inner: M,
}

impl<M> BarsAwareWriter<M> {
    pub fn new(bars: MultiProgress, inner: M) -> Self {
        BarsAwareWriter { bars, inner }
    }
}

impl<'a, M: MakeWriter<'a>> MakeWriter<'a> for BarsAwareWriter<M> {
    type Writer = SuspendingWriter<'a, M::Writer>;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendingWriter {
            bars: &self.bars,
            inner: self.inner.make_writer(),
        }
    }
}

pub struct SuspendingWriter<'a, W> {
    bars: &'a MultiProgress,
    inner: W,
}

impl<W: io::Write> io::Write for SuspendingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let inner = &mut self.inner;
        self.bars.suspend(|| inner.write(buf))
    }

    // one suspend per formatted event
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let inner = &mut self.inner;
        self.bars.suspend(|| inner.write_all(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        let inner = &mut self.inner;
        self.bars.suspend(|| inner.flush())
    }
}
