//! Error reporter: prints traced errors locally or delivers them to the errors channel

use std::future::Future;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};

use crossterm::style::{style, Stylize};

use crate::config::{ReportMode, ReporterConfig};
use crate::notifier::{Attachment, Notifier};
use crate::trace::Traced;

/// Destination for locally printed reports
pub type Console = Arc<Mutex<dyn Write + Send>>;

/// Wraps failures with a trace and applies the print-vs-deliver policy
pub struct ErrorReporter {
    mode: ReportMode,
    color: bool,
    notifier: Arc<Notifier>,
    console: Console,
}

impl std::fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("mode", &self.mode)
            .field("color", &self.color)
            .finish()
    }
}

impl ErrorReporter {
    /// Create a reporter printing to stderr in local mode
    pub fn new(config: &ReporterConfig, notifier: Arc<Notifier>) -> Self {
        tracing::debug!(
            "Created ErrorReporter in {:?} mode (color: {})",
            config.mode,
            config.color
        );
        Self {
            mode: config.mode,
            color: config.color,
            notifier,
            console: Arc::new(Mutex::new(std::io::stderr())),
        }
    }

    /// Replace the console used in local mode
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    /// Report a failure, wrapping it unless it is already traced.
    ///
    /// In local mode the trace is printed and `Ok(())` returned; otherwise the
    /// delivery result of the errors channel is returned.
    #[track_caller]
    pub fn report<E>(&self, err: E) -> impl Future<Output = crate::Result<()>> + Send + '_
    where
        Traced: From<E>,
    {
        let traced = Traced::from(err);
        async move { self.report_traced(&traced).await }
    }

    /// Report on a detached task. The outcome cannot be observed.
    #[track_caller]
    pub fn report_async<E>(self: &Arc<Self>, err: E)
    where
        Traced: From<E>,
    {
        let traced = Traced::from(err);
        let reporter = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = reporter.report_traced(&traced).await {
                tracing::debug!("Background report of '{}' failed: {}", traced, e);
            }
        });
    }

    /// Report the failure, then panic with it.
    ///
    /// # Panics
    ///
    /// Always, after the report attempt, whether or not the report succeeded.
    #[track_caller]
    pub fn report_and_abort<E>(&self, err: E) -> impl Future<Output = ()> + Send + '_
    where
        Traced: From<E>,
    {
        let traced = Traced::from(err);
        async move {
            if let Err(e) = self.report_traced(&traced).await {
                tracing::warn!("Failed to report fatal error: {}", e);
            }
            panic!("fatal: {}", traced);
        }
    }

    async fn report_traced(&self, traced: &Traced) -> crate::Result<()> {
        match self.mode {
            ReportMode::Local => {
                self.print(&traced.render());
                Ok(())
            }
            ReportMode::Deliver => {
                let mut lines = traced.render().into_iter();
                let headline = lines.next().map(|line| line.text).unwrap_or_default();
                self.notifier.deliver_error(&headline, lines).await
            }
        }
    }

    fn print(&self, lines: &[Attachment]) {
        let mut console = self.console.lock().unwrap_or_else(PoisonError::into_inner);
        for (i, line) in lines.iter().enumerate() {
            let result = match (self.color, i == 0, line.highlighted) {
                (false, _, _) => writeln!(console, "{}", line.text),
                (true, true, _) => writeln!(console, "{}", style(&line.text).bold()),
                (true, false, true) => writeln!(console, "{}", style(&line.text).red()),
                (true, false, false) => writeln!(console, "{}", line.text),
            };
            if let Err(e) = result {
                tracing::warn!("Failed to print error report: {}", e);
                return;
            }
        }
    }
}
