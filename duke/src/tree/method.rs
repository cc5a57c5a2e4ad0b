pub mod code;

use crate::class_constants::access;
use crate::tree::annotation::Annotation;
use crate::tree::class::ClassName;
use crate::tree::method::code::Code;

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
	pub access: MethodAccess,
	pub name: String,
	pub descriptor: String,

	/// Abstract and native methods don't have code.
	pub code: Option<Code>,
	/// The classes from the `Exceptions` attribute.
	pub exceptions: Vec<ClassName>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
}

impl Method {
	pub const INIT: &'static str = "<init>";
	pub const CLINIT: &'static str = "<clinit>";

	/// All the annotations of the method, both the visible and the invisible ones.
	pub fn annotations(&self) -> impl Iterator<Item=&Annotation> {
		self.runtime_visible_annotations.iter().chain(&self.runtime_invisible_annotations)
	}

	/// Looks for an annotation by its type, for example `Ljava/lang/Deprecated;`.
	pub fn annotation(&self, type_descriptor: &str) -> Option<&Annotation> {
		self.annotations().find(|annotation| annotation.type_descriptor == type_descriptor)
	}
}

/// A reference to a method, as used by the `invoke*` instructions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodRef {
	pub class: ClassName,
	pub name: String,
	pub descriptor: String,
}

/// Only the flags that change how a method is translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodAccess {
	pub is_public: bool,
	pub is_private: bool,
	pub is_static: bool,
	pub is_final: bool,
	pub is_synchronized: bool,
	pub is_native: bool,
	pub is_abstract: bool,
}

impl From<u16> for MethodAccess {
	fn from(value: u16) -> Self {
		MethodAccess {
			is_public: value & access::PUBLIC != 0,
			is_private: value & access::PRIVATE != 0,
			is_static: value & access::STATIC != 0,
			is_final: value & access::FINAL != 0,
			is_synchronized: value & access::SYNCHRONIZED != 0,
			is_native: value & access::NATIVE != 0,
			is_abstract: value & access::ABSTRACT != 0,
		}
	}
}
