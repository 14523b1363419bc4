//! Error wrapping with call-site location, cause chain and backtrace

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;

use crate::notifier::Attachment;

/// Lines of source shown on each side of the wrap location
const SOURCE_CONTEXT: usize = 2;

/// An error together with the place it was wrapped.
///
/// `Traced` intentionally does not implement [`std::error::Error`]: any error
/// converts into it, and converting a `Traced` is the identity, so wrapping
/// twice keeps the original location and backtrace. Conversions through `?`
/// record the location of the `?`.
pub struct Traced {
    error: anyhow::Error,
    location: &'static Location<'static>,
    backtrace: Backtrace,
}

impl Traced {
    /// Wrap an ad-hoc message
    #[track_caller]
    pub fn msg(message: impl fmt::Display) -> Self {
        Self::wrap(anyhow::Error::msg(message.to_string()))
    }

    #[track_caller]
    fn wrap(error: anyhow::Error) -> Self {
        Self {
            error,
            location: Location::caller(),
            backtrace: Backtrace::force_capture(),
        }
    }

    /// The wrapped error
    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.error.as_ref()
    }

    /// Where the error was first wrapped
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// Render as report lines: the error message first, then the cause chain,
    /// the wrap location with surrounding source, and the backtrace frames.
    pub fn render(&self) -> Vec<Attachment> {
        let mut lines = vec![Attachment::plain(self.error.to_string())];

        lines.extend(
            self.error
                .chain()
                .skip(1)
                .map(|cause| Attachment::plain(format!("caused by: {}", cause))),
        );

        lines.push(Attachment::alert(format!(
            "at {}:{}:{}",
            self.location.file(),
            self.location.line(),
            self.location.column()
        )));
        lines.extend(source_context(self.location));

        // Unsupported platforms capture nothing
        if self.backtrace.status() == BacktraceStatus::Captured {
            lines.extend(
                self.backtrace
                    .to_string()
                    .lines()
                    .filter(|frame| !frame.trim().is_empty())
                    .map(|frame| Attachment::plain(frame.trim_end())),
            );
        }

        lines
    }
}

impl<E> From<E> for Traced
where
    E: StdError + Send + Sync + 'static,
{
    #[track_caller]
    fn from(error: E) -> Self {
        Self::wrap(anyhow::Error::new(error))
    }
}

impl fmt::Display for Traced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl fmt::Debug for Traced {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Traced")
            .field("error", &self.error.to_string())
            .field("location", &self.location)
            .finish()
    }
}

/// Source lines around `location`, the wrapped line highlighted.
/// Empty when the file is not readable from the working directory.
fn source_context(location: &Location<'_>) -> Vec<Attachment> {
    let Ok(content) = std::fs::read_to_string(location.file()) else {
        return Vec::new();
    };

    let target = location.line() as usize;
    let first = target.saturating_sub(SOURCE_CONTEXT).max(1);

    content
        .lines()
        .enumerate()
        .map(|(i, code)| (i + 1, code))
        .skip(first - 1)
        .take_while(|(n, _)| *n <= target + SOURCE_CONTEXT)
        .map(|(n, code)| Attachment::marked(format!("{:>5} | {}", n, code), n == target))
        .collect()
}
