pub mod envelope;
pub mod result;

pub use envelope::{
    CommandRequest, DriverCommand, EnvelopeError, RouteKey, SCREENSHOT_COMMAND, WaitUntil,
};
pub use result::{
    CommandResult, STATUS_SUCCESS, STATUS_UNKNOWN_ERROR, STATUS_WAIT_TIMEOUT,
};
