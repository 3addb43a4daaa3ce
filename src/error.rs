//! There be Errors here.

use std::cell::RefCell;
use std::fmt;

use thiserror::Error;

/// Representation of a single Apt Error or Warning.
#[derive(Debug, Clone)]
pub struct AptError {
	/// * [`true`] = Error.
	/// * [`false`] = Warning, Notice, etc.
	pub is_error: bool,
	/// The String version of the Error.
	pub msg: String,
}

impl fmt::Display for AptError {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if self.is_error {
			write!(f, "E: {}", self.msg)?;
		} else {
			write!(f, "W: {}", self.msg)?;
		}
		Ok(())
	}
}

impl std::error::Error for AptError {}

/// The typed error taxonomy for every fallible operation in this crate.
///
/// Subsystem-specific error enums (archive, tag-file, acquire, resolver) convert into
/// this via `#[from]`; callers that want the full taxonomy rather than a subsystem's
/// own enum can match on this one.
#[derive(Debug, Error)]
pub enum AptErrorKind {
	#[error("malformed input: {0}")]
	MalformedInput(String),
	#[error("integrity mismatch: expected {expected}, got {got}")]
	IntegrityMismatch { expected: String, got: String },
	#[error("authenticity missing: {0}")]
	AuthenticityMissing(String),
	#[error("transient error: {0}")]
	Transient(String),
	#[error("dependencies could not be resolved: {0}")]
	Unresolvable(String),
	#[error("lock contention: {0}")]
	LockContention(String),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error("configuration error: {0}")]
	Configuration(String),
}

/// Struct that represents multiple apt errors and warnings.
///
/// This is essentially just a wrapper around [`Vec<AptError>`]
#[derive(Debug, Default, Clone)]
pub struct AptErrors {
	pub(crate) ptr: Vec<AptError>,
}

impl AptErrors {
	/// Snapshot the current thread-local [`ErrorStack`] into an owned [`AptErrors`].
	pub fn new() -> AptErrors {
		AptErrors {
			ptr: ErrorStack::get_all(),
		}
	}

	pub fn push_error(&mut self, msg: impl Into<String>) {
		self.ptr.push(AptError {
			is_error: true,
			msg: msg.into(),
		});
	}

	pub fn push_warning(&mut self, msg: impl Into<String>) {
		self.ptr.push(AptError {
			is_error: false,
			msg: msg.into(),
		});
	}

	pub fn is_empty(&self) -> bool { self.ptr.is_empty() }

	pub fn iter(&self) -> std::slice::Iter<'_, AptError> { self.ptr.iter() }

	/// [`true`] if any item in this stack is a hard error (not just a warning).
	pub fn pending(&self) -> bool { self.ptr.iter().any(|e| e.is_error) }
}

impl fmt::Display for AptErrors {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		for error in self.iter() {
			writeln!(f, "{error}")?;
		}
		Ok(())
	}
}

impl From<String> for AptErrors {
	fn from(err: String) -> Self {
		AptErrors {
			ptr: vec![AptError {
				is_error: true,
				msg: err,
			}],
		}
	}
}

impl From<AptErrorKind> for AptErrors {
	fn from(err: AptErrorKind) -> Self { AptErrors::from(err.to_string()) }
}

impl From<std::io::Error> for AptErrors {
	fn from(err: std::io::Error) -> Self { AptErrors::from(err.to_string()) }
}

impl std::error::Error for AptErrors {}

thread_local! {
	static ERROR_STACK: RefCell<Vec<AptError>> = const { RefCell::new(Vec::new()) };
}

/// A thread-local scoped error/warning stack, mirroring the original's push/pop/merge
/// semantics for scoping warnings generated by tentative operations (probing alternate
/// URIs, speculative pin evaluation).
pub struct ErrorStack;

impl ErrorStack {
	/// Record an error onto the current stack.
	pub fn error(msg: impl Into<String>) {
		ERROR_STACK.with(|s| {
			s.borrow_mut().push(AptError {
				is_error: true,
				msg: msg.into(),
			})
		});
	}

	/// Record a warning onto the current stack.
	pub fn warning(msg: impl Into<String>) {
		ERROR_STACK.with(|s| {
			s.borrow_mut().push(AptError {
				is_error: false,
				msg: msg.into(),
			})
		});
	}

	/// Save and clear the current stack, returning what was saved.
	pub fn push() -> Vec<AptError> { ERROR_STACK.with(|s| s.borrow_mut().drain(..).collect()) }

	/// Discard the current stack without inspecting it.
	pub fn discard() { ERROR_STACK.with(|s| s.borrow_mut().clear()); }

	/// Restore a previously-saved stack, replacing whatever is current.
	pub fn pop(saved: Vec<AptError>) { ERROR_STACK.with(|s| *s.borrow_mut() = saved); }

	/// Append `items` onto the current stack.
	pub fn merge(items: Vec<AptError>) { ERROR_STACK.with(|s| s.borrow_mut().extend(items)); }

	/// [`true`] if there are any pending errors (not counting warnings).
	pub fn pending_error() -> bool { ERROR_STACK.with(|s| s.borrow().iter().any(|e| e.is_error)) }

	/// [`true`] if there are no errors or warnings.
	pub fn empty() -> bool { ERROR_STACK.with(|s| s.borrow().is_empty()) }

	/// Return a snapshot of all current errors and warnings.
	pub fn get_all() -> Vec<AptError> { ERROR_STACK.with(|s| s.borrow().clone()) }
}

/// [`true`] if there are any pending Apt Errors.
pub fn pending_error() -> bool { ErrorStack::pending_error() }

/// [`true`] if there are no Errors or Warnings.
pub fn empty() -> bool { ErrorStack::empty() }
