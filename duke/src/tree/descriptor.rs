use std::fmt::{Display, Formatter};
use std::iter::Peekable;
use std::str::Chars;
use anyhow::{anyhow, bail, Context, Result};
use crate::tree::class::ClassName;

/// Represents a type.
///
/// ```
/// use duke::tree::descriptor::Type;
///
/// // the type of a java `int[][]`
/// let int_array_type = Type::parse("[[I").unwrap();
///
/// assert_eq!(int_array_type, Type::Array(Box::new(Type::Array(Box::new(Type::I)))));
/// assert_eq!(int_array_type.to_string(), "[[I");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
	/// A `byte`. In rust, this is a `i8`.
	B,
	/// A `char`.
	C,
	/// A `double`. In rust, this is a `f64`.
	D,
	/// A `float`. In rust, this is a `f32`.
	F,
	/// An `int`. In rust, this is a `i32`.
	I,
	/// A `long`. In rust, this is a `i64`.
	J,
	/// A `short`. In rust, this is a `i16`.
	S,
	/// A `boolean`. In rust, this is a `bool`.
	Z,
	/// An instance of the class specified by [`ClassName`].
	Object(ClassName),
	/// An array with the given element type.
	Array(Box<Type>),
}

impl Type {
	/// Parses a field descriptor, the whole string must be one type.
	pub fn parse(descriptor: &str) -> Result<Type> {
		let mut chars = descriptor.chars().peekable();
		let t = read_field_type(&mut chars)
			.with_context(|| anyhow!("invalid field descriptor {descriptor:?}"))?;
		if chars.next().is_some() {
			bail!("trailing characters in field descriptor {descriptor:?}");
		}
		Ok(t)
	}

	/// `long` and `double` take up two local variable slots, and are of computational type category 2.
	pub fn is_wide(&self) -> bool {
		matches!(self, Type::J | Type::D)
	}

	/// For class names as they appear in `anewarray` or `checkcast`, which may be array descriptors.
	pub fn from_class_name(class: &ClassName) -> Result<Type> {
		if class.is_array() {
			Type::parse(class.as_str())
		} else {
			Ok(Type::Object(class.clone()))
		}
	}
}

impl Display for Type {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Type::B => f.write_str("B"),
			Type::C => f.write_str("C"),
			Type::D => f.write_str("D"),
			Type::F => f.write_str("F"),
			Type::I => f.write_str("I"),
			Type::J => f.write_str("J"),
			Type::S => f.write_str("S"),
			Type::Z => f.write_str("Z"),
			Type::Object(class_name) => write!(f, "L{class_name};"),
			Type::Array(inner) => write!(f, "[{inner}"),
		}
	}
}

/// A parsed method descriptor, like `(IJ)D`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
	pub parameters: Vec<Type>,
	/// [`None`] for `void`.
	pub return_type: Option<Type>,
}

impl MethodDescriptor {
	pub fn parse(descriptor: &str) -> Result<MethodDescriptor> {
		(|| {
			let mut chars = descriptor.chars().peekable();

			if chars.next() != Some('(') {
				bail!("must start with `(`");
			}
			let mut parameters = Vec::new();
			while chars.next_if_eq(&')').is_none() {
				parameters.push(read_field_type(&mut chars)?);
			}

			let return_type = if chars.next_if_eq(&'V').is_some() {
				None
			} else {
				Some(read_field_type(&mut chars)?)
			};

			if chars.next().is_some() {
				bail!("trailing characters after return type");
			}
			Ok(MethodDescriptor { parameters, return_type })
		})()
			.with_context(|| anyhow!("invalid method descriptor {descriptor:?}"))
	}

	/// The number of local variable slots the parameters take, not including `this`.
	pub fn parameter_slots(&self) -> u16 {
		self.parameters.iter()
			.map(|t| if t.is_wide() { 2 } else { 1 })
			.sum()
	}
}

// The grammar for descriptors is:
//   FieldDescriptor:
//     FieldType
//
//   MethodDescriptor:
//     "(" FieldType* ")" ReturnDescriptor
//
//   ReturnDescriptor:
//     FieldType | "V"
//
//   FieldType:
//     "B" | "C" | "D" | "F" | "I" | "J" | "S" | "Z" |
//     "L" ClassName ";" |
//     "[" FieldType
fn read_field_type(chars: &mut Peekable<Chars>) -> Result<Type> {
	let mut array_dimension = 0usize;
	while chars.next_if_eq(&'[').is_some() {
		array_dimension += 1;
	}
	if array_dimension > 255 {
		bail!("array dimension {array_dimension} is larger than 255");
	}

	let char = chars.next().ok_or_else(|| anyhow!("unexpected abrupt ending of descriptor"))?;
	let mut t = match char {
		'B' => Type::B,
		'C' => Type::C,
		'D' => Type::D,
		'F' => Type::F,
		'I' => Type::I,
		'J' => Type::J,
		'S' => Type::S,
		'Z' => Type::Z,
		'L' => {
			let mut s = String::new();
			loop {
				match chars.next() {
					Some(';') => break,
					Some(char) => s.push(char),
					None => bail!("unexpected abrupt ending of descriptor"),
				}
			}
			if s.is_empty() {
				bail!("empty class name in descriptor");
			}
			Type::Object(ClassName::from(s))
		},
		x => bail!("unexpected char {x:?} in descriptor"),
	};

	for _ in 0..array_dimension {
		t = Type::Array(Box::new(t));
	}
	Ok(t)
}
