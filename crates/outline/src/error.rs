//! Outline engine errors.

use thiserror::Error;

/// Failure of an outline computation.
///
/// Cloneable because one failure is delivered to every caller joined on the
/// same in-flight computation. Provider failures never surface here; they
/// are recovered inside the build (the provider's group stays empty).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OutlineError {
	/// The computation was cancelled before a model was produced.
	#[error("outline computation was cancelled")]
	Cancelled,
}
