use crate::report::common::OrNa;
use crate::stats::RunSummary;
use crate::LoadTestError;
use std::io::Write;

struct Markdown<'s, 'w, W: Write> {
    w: &'w mut W,
    summary: &'s RunSummary,
}

pub(crate) fn write_markdown_report<W: Write>(
    w: &mut W,
    summary: &RunSummary,
) -> Result<(), LoadTestError> {
    Markdown { w, summary }.write()
}

impl<W: Write> Markdown<'_, '_, W> {
    pub fn write(mut self) -> Result<(), LoadTestError> {
        self.write_header()?;
        self.write_overview()?;
        self.write_latency()?;

        Ok(())
    }

    fn write_header(&mut self) -> Result<(), LoadTestError> {
        writeln!(self.w, "## Load test report (host routing + body check)")?;

        Ok(())
    }

    fn write_overview(&mut self) -> Result<(), LoadTestError> {
        let summary = self.summary;
        writeln!(
            self.w,
            r#"- total requests: {total}
- concurrency: {concurrency}
- duration (wall sec): {duration:.2}
- requests/sec: {throughput:.2}
- failed requests: {failed} ({percentage:.2}%)"#,
            total = summary.total_requests,
            concurrency = summary.concurrency,
            duration = summary.duration.as_secs_f64(),
            throughput = summary.throughput(),
            failed = summary.failure_count,
            percentage = summary.failure_percentage(),
        )?;

        Ok(())
    }

    fn write_latency(&mut self) -> Result<(), LoadTestError> {
        write!(
            self.w,
            r#"
### Latency (ms)
"#
        )?;

        for (label, value) in self.summary.percentiles.entries() {
            writeln!(self.w, "- {}: {:.2}", label, OrNa(value))?;
        }

        Ok(())
    }
}
