use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Result, TransportError};

/// A connected instrument session — the two primitives the protocol layer
/// consumes, plus the existence probe built on top of them.
///
/// Every operation is one or more blocking round trips; there is no
/// pipelining and no internal locking. The only timeout semantics are the
/// transport's read deadline, inherited by every query.
pub trait ScpiSession {
    /// Send a command line, fire and forget.
    fn send_command(&mut self, cmd: &str) -> Result<()>;

    /// Send a query line and return the response with the line terminator
    /// stripped.
    fn query_text(&mut self, cmd: &str) -> Result<String>;

    /// Probe whether a command path exists on the instrument.
    ///
    /// Issues `*EXIST? "<path>"` and interprets the integer reply.
    fn exists(&mut self, path: &str) -> Result<bool> {
        let query = format!("*EXIST? \"{path}\"");
        let response = self.query_text(&query)?;
        match response.trim().parse::<i64>() {
            Ok(v) => Ok(v != 0),
            Err(_) => Err(TransportError::UnexpectedResponse { query, response }),
        }
    }
}

/// Shared handle to the one session a set of endpoints talks through.
///
/// `Rc<RefCell<..>>` by design: the session model is single-threaded and
/// strictly serialized, and endpoint types each hold a handle to the same
/// underlying connection.
pub type SessionHandle = Rc<RefCell<dyn ScpiSession>>;

/// Wrap a concrete session into a [`SessionHandle`].
pub fn session_handle(session: impl ScpiSession + 'static) -> SessionHandle {
    Rc::new(RefCell::new(session))
}
