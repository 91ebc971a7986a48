// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

pub fn resolve_config_path(rel: &str) -> Result<PathBuf> {
    let p = Path::new(rel);

    let abs = if p.is_absolute() {
        p.to_path_buf()
    } else {
        std::env::current_dir()
            .context("cannot get current working dir")?
            .join(p)
    };

    let canon = abs
        .canonicalize()
        .with_context(|| format!("failed to canonicalize path {abs:?}"))?;

    Ok(canon)
}

/// Command line of the daemon: `metisd [config.yaml [logger.yaml]]`.
#[derive(Debug, Clone)]
pub struct DaemonArgs {
    pub config: String,
    pub logger: String,
}

impl DaemonArgs {
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self> {
        let mut args = args.into_iter().skip(1);
        let config = args
            .next()
            .unwrap_or_else(|| "config/metisd.yaml".to_string());
        let logger = args
            .next()
            .unwrap_or_else(|| "config/logger.yaml".to_string());
        if args.next().is_some() {
            bail!("usage: metisd [config.yaml [logger.yaml]]");
        }
        Ok(Self { config, logger })
    }
}
