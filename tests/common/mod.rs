//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::io;
use std::sync::{Arc, Mutex};

use service_kit::lifecycle::{HookResult, ShutdownContext};
use tracing_subscriber::fmt::MakeWriter;

/// Log sink that keeps everything written to it in memory.
#[derive(Clone, Default)]
pub struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl CaptureWriter {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// A plain-text subscriber writing into this sink.
    pub fn dispatch(&self) -> tracing::Dispatch {
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(self.clone())
            .finish();
        tracing::Dispatch::new(subscriber)
    }
}

impl io::Write for CaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CaptureWriter {
    type Writer = CaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Ordered record of which hooks ran.
#[derive(Clone, Default)]
pub struct Calls(Arc<Mutex<Vec<String>>>);

impl Calls {
    /// A hook that appends `name` when it runs.
    pub fn hook(
        &self,
        name: &str,
    ) -> impl FnOnce(ShutdownContext) -> std::future::Ready<HookResult> + Send + 'static {
        let calls = self.clone();
        let name = name.to_string();
        move |_ctx| {
            calls.push(&name);
            std::future::ready(Ok(()))
        }
    }

    pub fn push(&self, name: &str) {
        self.0.lock().unwrap().push(name.to_string());
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
