// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Log output for the shipper's own diagnostics.
//!
//! Lines are prefixed with `LOG_SHIPPER` so they can be told apart from the
//! host application's output. The module that logged follows the level, and
//! active spans trail the message, innermost last:
//!
//! ```text
//! LOG_SHIPPER | WARN | flusher | SHIPPER | Flush delivered 9 events and dropped 1 [flush{attempt=2} > put]
//! ```

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::EnvFilter;

use crate::errors::ShipperError;

#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(
            &mut writer,
            "LOG_SHIPPER | {} | {} | ",
            metadata.level(),
            component(metadata.target())
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;

        if let Some(scope) = ctx.event_scope() {
            let mut separator = " [";
            for span in scope.from_root() {
                write!(writer, "{separator}{}", span.name())?;
                separator = " > ";
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
            }
            if separator != " [" {
                write!(writer, "]")?;
            }
        }
        writeln!(writer)
    }
}

/// Module path relative to this crate; other targets are kept whole.
fn component(target: &str) -> &str {
    target.strip_prefix("log_shipper::").unwrap_or(target)
}

fn env_filter(log_level: &str) -> Result<EnvFilter, ShipperError> {
    EnvFilter::try_new(format!("h2=off,hyper=off,reqwest=off,rustls=off,{log_level}"))
        .map_err(|e| ShipperError::InvalidConfig(format!("log level {log_level}: {e}")))
}

/// Installs a global subscriber writing [`Formatter`] lines at `log_level`.
///
/// `log_level` accepts anything an `EnvFilter` directive does, e.g. `debug`
/// or `log_shipper=trace`. Fails if a global subscriber is already set.
pub fn init(log_level: &str) -> Result<(), ShipperError> {
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter(log_level)?)
        .event_format(Formatter)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| ShipperError::InvalidConfig(format!("failed to set subscriber: {e}")))?;
    tracing::debug!("SHIPPER | Logging subsystem enabled");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_lines_carry_prefix_and_spans() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_env_filter(env_filter("debug").unwrap())
            .with_ansi(false)
            .event_format(Formatter)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("started");
            let flush = tracing::info_span!("flush", attempt = 2);
            let _flush = flush.enter();
            let put = tracing::info_span!("put");
            let _put = put.enter();
            tracing::warn!(dropped = 1, "gave up");
        });

        let text = captured.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "LOG_SHIPPER | INFO | logger::tests | started");
        assert_eq!(
            lines[1],
            "LOG_SHIPPER | WARN | logger::tests | gave up dropped=1 [flush{attempt=2} > put]"
        );
    }

    #[test]
    fn test_component_strips_crate_name() {
        assert_eq!(component("log_shipper::flusher"), "flusher");
        assert_eq!(component("hyper::client"), "hyper::client");
    }

    #[test]
    fn test_bad_level_is_config_error() {
        assert!(matches!(
            env_filter("log_shipper=loud"),
            Err(ShipperError::InvalidConfig(_))
        ));
    }
}
