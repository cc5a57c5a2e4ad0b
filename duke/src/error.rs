use thiserror::Error;

/// The ways a class file can be malformed.
///
/// These are returned wrapped in an [`anyhow::Error`], usually with some context attached. Use
/// [`anyhow::Error::downcast_ref`] to get at the kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
	#[error("wrong magic: got {0:#x}, expected 0xcafebabe")]
	BadMagic(u32),
	#[error("unsupported class file version {major}.{minor}")]
	UnsupportedVersion { major: u16, minor: u16 },
	#[error("unexpected end of data at byte {position}")]
	Truncated { position: u64 },
	#[error("pool index {index} doesn't point to a usable entry, the pool has {count} slots")]
	PoolIndexOutOfRange { index: u16, count: usize },
	#[error("pool entry at index {index} is `{found}`, expected `{expected}`")]
	PoolTagMismatch { index: u16, expected: &'static str, found: &'static str },
	#[error("unknown constant pool tag {tag} at pool index {index}")]
	UnknownPoolTag { tag: u8, index: usize },
	#[error("pool entry at index {index} is not valid utf8")]
	MalformedUtf8 { index: u16 },
	#[error("unknown annotation element value tag {:?}", char::from(*tag))]
	UnknownAnnotationTag { tag: u8 },
	#[error("annotations are nested deeper than {limit} levels")]
	AnnotationTooDeep { limit: usize },
	#[error("attribute `{name}` has length {declared}, but {consumed} bytes were read")]
	AttributeLength { name: String, declared: u32, consumed: u64 },
	#[error("exception handler range {start}..{end} (handler at {handler}) doesn't fit into code of length {code_length}")]
	MalformedExceptionRange { start: u16, end: u16, handler: u16, code_length: u32 },
	#[error("unknown opcode {opcode:#x} at offset {offset}")]
	UnknownOpcode { opcode: u8, offset: u16 },
	#[error("instruction at offset {offset} branches to {target}, which is outside of the code")]
	BranchOutOfRange { offset: u16, target: i64 },
}
