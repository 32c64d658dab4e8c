use std::fmt;

use failure::Backtrace;
use failure::Context;
use failure::Fail;

/// Error information returned by the `Session` API in case of errors.
#[derive(Debug)]
pub struct Error(Context<ErrorKind>);

impl Error {
    pub fn kind(&self) -> ErrorKind {
        self.0.get_context().clone()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error(Context::new(kind))
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(inner: Context<ErrorKind>) -> Error {
        Error(inner)
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.0.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.0.backtrace()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Exhaustive list of possible errors emitted by this crate.
#[derive(Clone, Eq, PartialEq, Hash, Debug, Fail)]
pub enum ErrorKind {
    #[fail(display = "zookeeper authentication failed")]
    AuthFailed,

    #[fail(display = "{} failed due to zookeeper error", _0)]
    Backend(&'static str),

    #[fail(display = "version check failed for node '{}'", _0)]
    BadVersion(String),

    #[fail(display = "unable to load configuration from '{}'", _0)]
    ConfigLoad(String),

    #[fail(display = "connection to the zookeeper ensemble failed")]
    Connect,

    #[fail(display = "timed out waiting for the session to connect")]
    ConnectTimeout,

    #[fail(display = "failed to decode {}", _0)]
    Decode(&'static str),

    #[fail(display = "node '{}' already exists", _0)]
    NodeExists(String),

    #[fail(display = "parent node '{}' does not exist", _0)]
    NoParent(String),

    #[fail(display = "node '{}' does not exist", _0)]
    NoSuchNode(String),

    #[fail(display = "session is not connected")]
    NotConnected,

    #[fail(display = "node '{}' has children and cannot be deleted", _0)]
    NotEmpty(String),

    #[fail(display = "zookeeper session expired")]
    SessionExpired,
}

/// Short form alias for functions returning `Error`s.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Render an error and its chain of causes into a printable message.
pub fn format_fail(fail: &dyn Fail) -> String {
    let mut message = format!("Error: {}", fail);
    for cause in fail.iter_causes() {
        message.push_str(&format!("\n    Caused by: {}", cause));
    }
    message
}
