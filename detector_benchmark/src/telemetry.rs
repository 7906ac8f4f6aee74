use crate::config::{LogFormat, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when `RUST_LOG` is unset.
pub fn default_filter(settings: &Settings) -> String {
    format!("{},ort=warn", settings.log_level.as_str())
}

/// Installs the global subscriber. Logs go to stderr so the report on
/// stdout stays readable.
pub fn init_subscriber(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(settings)));
    let registry = tracing_subscriber::registry().with(filter);

    match settings.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_default_filter_quiets_ort() {
        let settings = Settings {
            log_level: LogLevel::Debug,
            ..Default::default()
        };
        assert_eq!(default_filter(&settings), "debug,ort=warn");
        assert_eq!(default_filter(&Settings::default()), "info,ort=warn");
    }
}
