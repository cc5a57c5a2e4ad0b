use std::borrow::Borrow;
use std::fmt::{Debug, Display, Formatter};
use crate::class_constants::access;
use crate::class_reader::pool::ConstantPool;
use crate::tree::annotation::Annotation;
use crate::tree::field::Field;
use crate::tree::method::Method;
use crate::tree::version::Version;

/// A decoded class file. Nothing in here changes after [`crate::parse`] returned it.
#[derive(Debug, Clone)]
pub struct ClassFile {
	pub version: Version,
	/// The constant pool of this class. Instructions are decoded against it, see [`crate::tree::method::code::Code::decode`].
	pub pool: ConstantPool,
	pub access: ClassAccess,
	pub name: ClassName,
	/// Only `java/lang/Object` has no super class.
	pub super_class: Option<ClassName>,
	pub interfaces: Vec<ClassName>,

	pub fields: Vec<Field>,
	pub methods: Vec<Method>,

	pub source_file: Option<String>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
}

impl ClassFile {
	pub fn method(&self, name: &str, descriptor: &str) -> Option<&Method> {
		self.methods.iter().find(|method| method.name == name && method.descriptor == descriptor)
	}

	pub fn field(&self, name: &str) -> Option<&Field> {
		self.fields.iter().find(|field| field.name == name)
	}

	/// All the annotations of the class, both the visible and the invisible ones.
	pub fn annotations(&self) -> impl Iterator<Item=&Annotation> {
		self.runtime_visible_annotations.iter().chain(&self.runtime_invisible_annotations)
	}
}

/// The name of a class, in internal form, like `java/lang/Object`.
///
/// Array classes (as they appear in `checkcast`, `anewarray` and similar) are named by their descriptor, like
/// `[Ljava/lang/String;` or `[[I`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassName(String);

impl ClassName {
	pub const JAVA_LANG_OBJECT: &'static str = "java/lang/Object";

	pub fn new(name: impl Into<String>) -> ClassName {
		ClassName(name.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	pub fn is_array(&self) -> bool {
		self.0.starts_with('[')
	}

	/// For an array class, returns the name of the class of the innermost elements, if that's not a primitive.
	/// For any other class, returns itself.
	///
	/// ```
	/// use duke::tree::class::ClassName;
	/// assert_eq!(ClassName::from("[[Ljava/lang/String;").element_class(), Some(ClassName::from("java/lang/String")));
	/// assert_eq!(ClassName::from("[I").element_class(), None);
	/// assert_eq!(ClassName::from("a/B").element_class(), Some(ClassName::from("a/B")));
	/// ```
	pub fn element_class(&self) -> Option<ClassName> {
		if !self.is_array() {
			return Some(self.clone());
		}
		self.0.trim_start_matches('[')
			.strip_prefix('L')
			.and_then(|x| x.strip_suffix(';'))
			.map(ClassName::from)
	}
}

impl Borrow<str> for ClassName {
	fn borrow(&self) -> &str {
		&self.0
	}
}

impl From<&str> for ClassName {
	fn from(value: &str) -> Self {
		ClassName(value.to_owned())
	}
}

impl From<String> for ClassName {
	fn from(value: String) -> Self {
		ClassName(value)
	}
}

impl PartialEq<str> for ClassName {
	fn eq(&self, other: &str) -> bool {
		self.0 == other
	}
}

impl PartialEq<&str> for ClassName {
	fn eq(&self, other: &&str) -> bool {
		self.0 == *other
	}
}

impl Debug for ClassName {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "ClassName({:?})", self.0)
	}
}

impl Display for ClassName {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClassAccess {
	pub is_public: bool,
	pub is_final: bool,
	pub is_interface: bool,
	pub is_abstract: bool,
}

impl From<u16> for ClassAccess {
	fn from(value: u16) -> Self {
		ClassAccess {
			is_public: value & access::PUBLIC != 0,
			is_final: value & access::FINAL != 0,
			is_interface: value & access::INTERFACE != 0,
			is_abstract: value & access::ABSTRACT != 0,
		}
	}
}
