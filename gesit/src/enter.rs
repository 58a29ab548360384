use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;

thread_local! {
    static ENTERED: Cell<bool> = Cell::new(false);
}

/// Marks the current thread as being within the dynamic extent of an
/// executor.
///
/// Dropping the returned [`Enter`] releases the thread again, on every exit
/// path.
///
/// # Example
///
/// ```
/// let guard = gesit::enter().unwrap();
///
/// // the thread is taken until the guard is dropped
/// assert!(gesit::enter().is_err());
///
/// drop(guard);
/// assert!(gesit::enter().is_ok());
/// ```
///
/// [`Enter`]: struct.Enter.html
pub fn enter() -> Result<Enter, EnterError> {
    ENTERED.with(|entered| {
        if entered.get() {
            Err(EnterError { _priv: () })
        } else {
            entered.set(true);
            Ok(Enter {
                _marker: PhantomData,
            })
        }
    })
}

/// Represents an executor context.
///
/// Returned by [`enter`], see its documentation
///
/// [`enter`]: fn.enter.html
pub struct Enter {
    // !Send + !Sync
    _marker: PhantomData<*mut ()>,
}

impl Drop for Enter {
    fn drop(&mut self) {
        ENTERED.with(|entered| entered.set(false));
    }
}

impl fmt::Debug for Enter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Enter { .. }")
    }
}

/// An error returned by [`enter`] if an execution scope has already been
/// entered.
///
/// [`enter`]: fn.enter.html
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterError {
    _priv: (),
}

impl fmt::Display for EnterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("an execution scope has already been entered on this thread")
    }
}

impl std::error::Error for EnterError {}
