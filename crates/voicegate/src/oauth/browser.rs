// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::process::{Command, Stdio};

/// Opens the authorize URL for the user.
pub trait BrowserOpener: Send + Sync {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

/// Platform URL handler (`open`, `xdg-open`, or `rundll32`).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemBrowser;

impl BrowserOpener for SystemBrowser {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        let mut cmd = if cfg!(target_os = "macos") {
            let mut c = Command::new("open");
            c.arg(url);
            c
        } else if cfg!(target_os = "windows") {
            let mut c = Command::new("rundll32");
            c.arg("url.dll,FileProtocolHandler").arg(url);
            c
        } else {
            let mut c = Command::new("xdg-open");
            c.arg(url);
            c
        };
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
        cmd.spawn().map_err(|e| anyhow::anyhow!("failed to open browser: {e}"))?;
        Ok(())
    }
}

/// Never opens anything; the caller prints the URL instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualBrowser;

impl BrowserOpener for ManualBrowser {
    fn open(&self, _url: &str) -> anyhow::Result<()> {
        Ok(())
    }
}
