// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `env_logger` setup for hosts and tools embedding the translator.

use std::sync::Once;

/// Logger configuration.
///
/// `filter` follows the `env_logger` syntax, e.g. `"veneer_core=debug,wgpu=warn"`.
/// When unset, `RUST_LOG` is honored, falling back to `info`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Explicit filter directives.
    pub filter: Option<String>,
    /// ANSI coloring behavior.
    pub write_style: env_logger::WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            write_style: env_logger::WriteStyle::Auto,
        }
    }
}

static INIT: Once = Once::new();

/// Installs the global logger. Later calls are ignored, as is an already
/// installed logger.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        match config.filter {
            Some(filter) => {
                builder.parse_filters(&filter);
            }
            None => match std::env::var("RUST_LOG") {
                Ok(filter) => {
                    builder.parse_filters(&filter);
                }
                Err(_) => {
                    builder.filter_level(log::LevelFilter::Info);
                }
            },
        }
        // Backend HAL chatter drowns out translator logs.
        builder.filter_module("wgpu_hal", log::LevelFilter::Error);
        builder.write_style(config.write_style);

        if builder.try_init().is_ok() {
            log::debug!("Logging initialized");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(LoggingConfig::default());
        init_logging(LoggingConfig {
            filter: Some("trace".into()),
            ..Default::default()
        });
        log::info!("still logging");
    }
}
