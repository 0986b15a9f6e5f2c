//! Scripted instrument session for deterministic protocol tests.
//!
//! [`ScriptedSession`] is an in-memory [`ScpiSession`] pre-loaded with an
//! ordered queue of expected commands and query/response pairs. It verifies
//! the exact wire text of every round trip, which lets tests assert not only
//! results but also how many round trips an operation performed.
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use scpikit_test_harness::ScriptedSession;
//! use scpikit_transport::{ScpiSession, SessionHandle};
//!
//! let session = Rc::new(RefCell::new(ScriptedSession::new()));
//! session
//!     .borrow_mut()
//!     .expect_query(":SOUR:FREQ?", "193.1")
//!     .expect_command(":SOUR:FREQ 193.4");
//!
//! let handle: SessionHandle = session.clone();
//! handle.borrow_mut().query_text(":SOUR:FREQ?").unwrap();
//! handle.borrow_mut().send_command(":SOUR:FREQ 193.4").unwrap();
//!
//! session.borrow().assert_done();
//! ```

use std::collections::VecDeque;

use scpikit_transport::{Result, ScpiSession};

#[derive(Debug, Clone)]
enum Expectation {
    /// A fire-and-forget command with this exact text.
    Command(String),
    /// A query with this exact text, answered with the canned response.
    Query { request: String, response: String },
}

/// An in-memory session that replays a scripted exchange.
///
/// Any deviation from the script — wrong text, a query where a command was
/// expected, or a round trip past the end of the script — panics with the
/// offending wire text, failing the surrounding test.
#[derive(Debug, Default)]
pub struct ScriptedSession {
    expectations: VecDeque<Expectation>,
    round_trips: usize,
}

impl ScriptedSession {
    /// Create an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a fire-and-forget command.
    pub fn expect_command(&mut self, cmd: &str) -> &mut Self {
        self.expectations.push_back(Expectation::Command(cmd.to_string()));
        self
    }

    /// Expect a query and script its response.
    pub fn expect_query(&mut self, request: &str, response: &str) -> &mut Self {
        self.expectations.push_back(Expectation::Query {
            request: request.to_string(),
            response: response.to_string(),
        });
        self
    }

    /// Number of query round trips performed so far.
    pub fn round_trips(&self) -> usize {
        self.round_trips
    }

    /// Panic unless every scripted expectation was consumed.
    pub fn assert_done(&self) {
        assert!(
            self.expectations.is_empty(),
            "scripted session finished with {} unconsumed expectation(s): {:?}",
            self.expectations.len(),
            self.expectations
        );
    }
}

impl ScpiSession for ScriptedSession {
    fn send_command(&mut self, cmd: &str) -> Result<()> {
        match self.expectations.pop_front() {
            Some(Expectation::Command(expected)) => {
                assert_eq!(cmd, expected, "unexpected command text");
                Ok(())
            }
            Some(other) => panic!("expected {other:?}, got command {cmd:?}"),
            None => panic!("unexpected command past end of script: {cmd:?}"),
        }
    }

    fn query_text(&mut self, cmd: &str) -> Result<String> {
        match self.expectations.pop_front() {
            Some(Expectation::Query { request, response }) => {
                assert_eq!(cmd, request, "unexpected query text");
                self.round_trips += 1;
                Ok(response)
            }
            Some(other) => panic!("expected {other:?}, got query {cmd:?}"),
            None => panic!("unexpected query past end of script: {cmd:?}"),
        }
    }
}
