// Copyright 2025 HEM Sp. z o.o.
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

use std::path::{Path, PathBuf};

use log::debug;
use log4rs::{
    append::{console::ConsoleAppender, file::FileAppender},
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
};

use crate::cli::LogLevel;

pub const LOG_FILE_NAME: &str = "pnut_remote.log";

fn pattern() -> PatternEncoder {
    PatternEncoder::new("{d(%Y-%m-%d %H:%M:%S%.3f)} - {l} - {m}\n")
}

pub fn build_logger_config(log_file: PathBuf, log_level: LogLevel, include_console: bool) -> anyhow::Result<Config> {
    let file_appender = FileAppender::builder().encoder(Box::new(pattern())).build(log_file)?;

    let mut config_builder = Config::builder().appender(Appender::builder().build("file", Box::new(file_appender)));
    let mut root_builder = Root::builder().appender("file");

    if include_console {
        let console_appender = ConsoleAppender::builder().encoder(Box::new(pattern())).build();
        config_builder = config_builder.appender(Appender::builder().build("console", Box::new(console_appender)));
        root_builder = root_builder.appender("console");
    }

    Ok(config_builder.build(root_builder.build(log_level.into()))?)
}

pub fn init_logger(log_dir: &Path, log_level: LogLevel, include_console: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let config = build_logger_config(log_dir.join(LOG_FILE_NAME), log_level, include_console)?;
    log4rs::init_config(config)?;
    debug!("Logger initialized with level: {:?}", log_level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_file_and_console_appenders() {
        let log_file = std::env::temp_dir().join(format!("pnut_logger_test_{}.log", std::process::id()));
        let config = build_logger_config(log_file.clone(), LogLevel::Debug, true).unwrap();

        let names: Vec<&str> = config.appenders().iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["file", "console"]);
        assert_eq!(config.root().level(), log::LevelFilter::Debug);
        let _ = std::fs::remove_file(log_file);
    }
}
