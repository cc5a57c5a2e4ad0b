use indexmap::IndexMap;
use java_string::JavaStr;
use crate::tree::field::ConstantValue;

/// An annotation, like `@JavaScriptBody(args = { "a" }, body = "return a;")`.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
	/// The field descriptor of the annotation interface, like `Lorg/example/MyAnnotation;`.
	pub type_descriptor: String,
	/// The element value pairs, in the order they're stored in.
	pub elements: IndexMap<String, AnnotationValue>,
}

impl Annotation {
	pub fn new(type_descriptor: impl Into<String>) -> Annotation {
		Annotation {
			type_descriptor: type_descriptor.into(),
			elements: IndexMap::new(),
		}
	}

	pub fn get(&self, name: &str) -> Option<&AnnotationValue> {
		self.elements.get(name)
	}
}

/// The value of an element of an annotation.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
	/// A constant. The `char` is the tag it was stored with, one of `B C D F I J S Z s`.
	///
	/// For the tags `B C I S Z` the constant is an [`ConstantValue::Integer`], for `s` it's a
	/// [`ConstantValue::String`].
	Primitive(char, ConstantValue),
	EnumConstant {
		/// The field descriptor of the enum class.
		type_descriptor: String,
		const_name: String,
	},
	/// A class literal, stored as a return descriptor, so `V` for `void.class`.
	ClassLiteral(String),
	Array(Vec<AnnotationValue>),
	Nested(Annotation),
}

impl AnnotationValue {
	/// If this is a [`AnnotationValue::Primitive`] holding a string, returns that string.
	pub fn as_string(&self) -> Option<&JavaStr> {
		match self {
			AnnotationValue::Primitive('s', ConstantValue::String(string)) => Some(&**string),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&[AnnotationValue]> {
		match self {
			AnnotationValue::Array(values) => Some(values.as_slice()),
			_ => None,
		}
	}
}
