use thiserror::Error;

/// The ways translating a set of classes can fail, apart from the classes being malformed (see [`duke::DecodeError`]).
///
/// Like [`duke::DecodeError`] these are wrapped in an [`anyhow::Error`], use [`anyhow::Error::downcast_ref`] to get at
/// the kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
	/// A class couldn't be loaded, or a provided class lacks the member that is used.
	#[error("{}, it's referenced from {}", missing(.class, .member), .referenced_from.as_deref().unwrap_or("the entry classes"))]
	MissingDependency { class: String, member: Option<String>, referenced_from: Option<String> },
	#[error("instruction {opcode:#04x} at offset {offset} in {class}.{method} can't be translated")]
	UnsupportedInstruction { class: String, method: String, offset: u16, opcode: u8 },
	#[error("malformed control flow at offset {offset}: {reason}")]
	MalformedControlFlow { offset: u16, reason: String },
	#[error("native method {class}.{method}{descriptor} has no body")]
	MissingNativeBody { class: String, method: String, descriptor: String },
}

fn missing(class: &str, member: &Option<String>) -> String {
	match member {
		Some(member) => format!("provided class {class} has no member {member}"),
		None => format!("class {class} could not be found"),
	}
}

impl CompileError {
	pub(crate) fn control_flow(offset: u16, reason: impl Into<String>) -> CompileError {
		CompileError::MalformedControlFlow { offset, reason: reason.into() }
	}
}
