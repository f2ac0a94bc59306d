use std::fmt;

use beacon_deposit::DepositError;

/// Exit code when every deposit was handled.
pub(crate) const EXIT_SUCCESS: i32 = 0;

/// Exit code when validation or submission failed.
pub(crate) const EXIT_FAILURE: i32 = 1;

/// Exit code when deposits were submitted but not seen mined in time.
pub(crate) const EXIT_UNCONFIRMED: i32 = 2;

/// Errors displayed to the user when using the CLI.
#[derive(Debug)]
pub(crate) enum DisplayedError {
    /// Errors the user can address by changing flags, configuration or deposit data.
    UserError(String, Box<dyn fmt::Debug>),
    /// Errors from the services the CLI talks to.
    InternalError(String, Box<dyn fmt::Debug>),
}

#[inline]
pub(crate) fn user_error<E>(msg: impl Into<String>) -> impl FnOnce(E) -> DisplayedError
where
    E: fmt::Debug + 'static,
{
    move |e| DisplayedError::UserError(msg.into(), Box::new(e))
}

#[inline]
pub(crate) fn internal_error<E>(msg: impl Into<String>) -> impl FnOnce(E) -> DisplayedError
where
    E: fmt::Debug + 'static,
{
    move |e| DisplayedError::InternalError(msg.into(), Box::new(e))
}

pub(crate) trait DisplayableError {
    type Output;
    fn user_error(self, msg: impl Into<String>) -> Result<Self::Output, DisplayedError>;
    fn internal_error(self, msg: impl Into<String>) -> Result<Self::Output, DisplayedError>;
}

impl<T, E: fmt::Debug + 'static> DisplayableError for Result<T, E> {
    type Output = T;
    #[inline]
    fn user_error(self, msg: impl Into<String>) -> Result<Self::Output, DisplayedError> {
        self.map_err(user_error(msg))
    }
    #[inline]
    fn internal_error(self, msg: impl Into<String>) -> Result<Self::Output, DisplayedError> {
        self.map_err(internal_error(msg))
    }
}

impl From<DepositError> for DisplayedError {
    fn from(err: DepositError) -> Self {
        // Deposit errors carry their own remediation, so the message is the error itself.
        let msg = err.to_string();
        if err.is_user_error() {
            DisplayedError::UserError(msg, Box::new(err))
        } else {
            DisplayedError::InternalError(msg, Box::new(err))
        }
    }
}

impl fmt::Display for DisplayedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayedError::UserError(msg, _) => write!(f, "{msg}"),
            DisplayedError::InternalError(msg, e) => write!(f, "internal error: {msg}: {e:?}"),
        }
    }
}

/// How a command finished when it did not fail outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Done,
    Unconfirmed,
}

impl Completion {
    pub(crate) fn exit_code(self) -> i32 {
        match self {
            Completion::Done => EXIT_SUCCESS,
            Completion::Unconfirmed => EXIT_UNCONFIRMED,
        }
    }
}
