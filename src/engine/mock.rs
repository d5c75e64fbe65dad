//! Scripted engine for request lifecycle tests.
//!
//! Every `execute` pops the next scripted reply (or a bare `200 OK` when the
//! script is empty), writes its header block and trace into the sinks and
//! returns its exchange. All handle activity is recorded in a shared
//! [`MockState`] the test keeps a clone of.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::engine::{
    EngineHandle, Exchange, OptionValue, Sinks, TransferEngine, TransferInfo, TransferOptions,
};
use crate::errors::RequestError;

#[derive(Debug, Clone, Default)]
pub(crate) struct Scripted {
    pub headers: String,
    pub verbose: Option<String>,
    pub exchange: Exchange,
}

impl Scripted {
    pub fn status(code: u16, body: &str) -> Self {
        Self {
            headers: format!("HTTP/1.1 {code} Scripted\r\nContent-Type: text/plain\r\n\r\n"),
            verbose: None,
            exchange: Exchange {
                body: Some(body.as_bytes().to_vec()),
                info: Some(TransferInfo { http_code: code, ..TransferInfo::default() }),
            },
        }
    }

    pub fn with_info(mut self, f: impl FnOnce(&mut TransferInfo)) -> Self {
        if let Some(info) = self.exchange.info.as_mut() {
            f(info);
        }
        self
    }

    pub fn with_headers(mut self, headers: &str) -> Self {
        self.headers = headers.to_string();
        self
    }

    pub fn with_verbose(mut self, trace: &str) -> Self {
        self.verbose = Some(trace.to_string());
        self
    }
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub script: VecDeque<Scripted>,
    /// Options of every configure call, in order.
    pub configured: Vec<TransferOptions>,
    pub opened: usize,
    pub closed: usize,
    pub executed: usize,
    pub fail_open: bool,
    /// Metadata handed to freshly opened handles.
    pub inherited: Vec<TransferInfo>,
}

#[derive(Clone, Default)]
pub(crate) struct MockEngine {
    state: Arc<Mutex<MockState>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, reply: Scripted) -> &Self {
        self.state().script.push_back(reply);
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Options handed to the most recent configure call.
    pub fn last_options(&self) -> TransferOptions {
        self.state().configured.last().cloned().expect("engine was never configured")
    }

    pub fn handle(&self) -> crate::engine::TransferEngineHandle {
        Arc::new(self.clone())
    }
}

impl TransferEngine for MockEngine {
    fn open(&self) -> Result<Box<dyn EngineHandle>, RequestError> {
        let mut state = self.state();
        if state.fail_open {
            return Err(RequestError::Configuration("mock engine refuses to open".into()));
        }
        state.opened += 1;
        Ok(Box::new(MockHandle {
            state: Arc::clone(&self.state),
            options: None,
            closed: false,
        }))
    }
}

struct MockHandle {
    state: Arc<Mutex<MockState>>,
    options: Option<TransferOptions>,
    closed: bool,
}

impl MockHandle {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl EngineHandle for MockHandle {
    fn configure(&mut self, options: &TransferOptions) -> Result<(), RequestError> {
        self.state().configured.push(options.clone());
        self.options = Some(options.clone());
        Ok(())
    }

    fn execute(&mut self, sinks: Sinks<'_>) -> Exchange {
        let reply = {
            let mut state = self.state();
            state.executed += 1;
            state.script.pop_front().unwrap_or_else(|| Scripted::status(200, ""))
        };

        let _ = sinks.header.write_all(reply.headers.as_bytes());
        if let (Some(sink), Some(trace)) = (sinks.verbose, reply.verbose.as_ref()) {
            let _ = sink.write_all(trace.as_bytes());
        }

        let mut exchange = reply.exchange;
        if let (Some(info), Some(options)) = (exchange.info.as_mut(), self.options.as_ref()) {
            if info.url.is_empty() {
                info.url = options.url.clone().unwrap_or_default();
            }
        }
        exchange
    }

    fn invoke(&mut self, operation: &str, args: &[OptionValue]) -> Result<OptionValue, RequestError> {
        match operation {
            "echo" => Ok(args.first().cloned().unwrap_or(OptionValue::Bool(false))),
            other => Err(RequestError::UnsupportedOperation(other.to_string())),
        }
    }

    fn inherit(&mut self, last: &TransferInfo) {
        self.state().inherited.push(last.clone());
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state().closed += 1;
        }
    }
}

impl Drop for MockHandle {
    fn drop(&mut self) {
        self.close();
    }
}
