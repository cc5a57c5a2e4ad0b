use java_string::JavaString;
use crate::class_constants::access;
use crate::tree::annotation::Annotation;
use crate::tree::class::ClassName;

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
	pub access: FieldAccess,
	pub name: String,
	pub descriptor: String,

	/// The value of the `ConstantValue` attribute. Only meaningful for static fields.
	pub constant_value: Option<ConstantValue>,

	pub runtime_visible_annotations: Vec<Annotation>,
	pub runtime_invisible_annotations: Vec<Annotation>,
}

/// A reference to a field, as used by the `get*` and `put*` instructions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
	pub class: ClassName,
	pub name: String,
	pub descriptor: String,
}

/// A constant, as stored in the `ConstantValue` attribute, or in a primitive annotation element value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	String(JavaString),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldAccess {
	pub is_public: bool,
	pub is_private: bool,
	pub is_static: bool,
	pub is_final: bool,
}

impl From<u16> for FieldAccess {
	fn from(value: u16) -> Self {
		FieldAccess {
			is_public: value & access::PUBLIC != 0,
			is_private: value & access::PRIVATE != 0,
			is_static: value & access::STATIC != 0,
			is_final: value & access::FINAL != 0,
		}
	}
}
