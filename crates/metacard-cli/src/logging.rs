//! Tracing subscriber setup

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive used when `RUST_LOG` is unset
#[must_use]
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "metacard=debug,metacard_cli=debug,metacard_engine=debug,metacard_rules=debug,metacard_model=debug"
    } else {
        "info"
    }
}

/// Install the global subscriber, writing to stderr
///
/// `RUST_LOG` wins over `verbose`.
pub fn init(verbose: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_lowers_engine_level() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).contains("metacard_engine=debug"));
        assert!(EnvFilter::try_new(default_directive(true)).is_ok());
    }
}
