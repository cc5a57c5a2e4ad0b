use anyhow::{anyhow, Context, Result};
use java_string::{JavaStr, JavaString};
use crate::{ClassRead, DecodeError};
use crate::class_constants::pool;
use crate::jstring;
use crate::tree::class::ClassName;
use crate::tree::field::{ConstantValue, FieldRef};
use crate::tree::method::code::Loadable;
use crate::tree::method::MethodRef;

/// An entry of the constant pool, with the indices into the pool kept as they are.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
	Utf8(JavaString),
	Integer(i32),
	Float(f32),
	Long(i64),
	Double(f64),
	Class { name_index: u16 },
	String { string_index: u16 },
	FieldRef { class_index: u16, name_and_type_index: u16 },
	MethodRef { class_index: u16, name_and_type_index: u16 },
	InterfaceMethodRef { class_index: u16, name_and_type_index: u16 },
	NameAndType { name_index: u16, descriptor_index: u16 },
	MethodHandle { reference_kind: u8, reference_index: u16 },
	MethodType { descriptor_index: u16 },
	Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
	Module { name_index: u16 },
	Package { name_index: u16 },
}

impl PoolEntry {
	/// The name of the kind of entry, as used in error messages.
	pub fn kind(&self) -> &'static str {
		match self {
			PoolEntry::Utf8(_) => "Utf8",
			PoolEntry::Integer(_) => "Integer",
			PoolEntry::Float(_) => "Float",
			PoolEntry::Long(_) => "Long",
			PoolEntry::Double(_) => "Double",
			PoolEntry::Class { .. } => "Class",
			PoolEntry::String { .. } => "String",
			PoolEntry::FieldRef { .. } => "Fieldref",
			PoolEntry::MethodRef { .. } => "Methodref",
			PoolEntry::InterfaceMethodRef { .. } => "InterfaceMethodref",
			PoolEntry::NameAndType { .. } => "NameAndType",
			PoolEntry::MethodHandle { .. } => "MethodHandle",
			PoolEntry::MethodType { .. } => "MethodType",
			PoolEntry::Dynamic { .. } => "Dynamic",
			PoolEntry::InvokeDynamic { .. } => "InvokeDynamic",
			PoolEntry::Module { .. } => "Module",
			PoolEntry::Package { .. } => "Package",
		}
	}

	fn is_wide(&self) -> bool {
		matches!(self, PoolEntry::Long(_) | PoolEntry::Double(_))
	}
}

/// The constant pool of a class file.
///
/// Indices are 1-based like in the class file. Slot 0 and the upper slot of `Long` and `Double` entries are empty,
/// and looking them up is an error.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstantPool {
	entries: Vec<Option<PoolEntry>>,
}

impl ConstantPool {
	/// Reads the `constant_pool_count` and `constant_pool` items.
	pub(crate) fn read(reader: &mut impl ClassRead) -> Result<ConstantPool> {
		let count = reader.read_u16_as_usize()?;
		let mut entries = Vec::with_capacity(count.max(1));
		entries.push(None);

		while entries.len() < count {
			let index = entries.len();
			let entry = Self::read_entry(reader, index)
				.with_context(|| anyhow!("in constant pool entry {index}"))?;

			let is_wide = entry.is_wide();
			entries.push(Some(entry));
			if is_wide {
				entries.push(None);
			}
		}
		// A wide entry in the last slot pushes us one over the count.
		if entries.len() > count {
			return Err(DecodeError::PoolIndexOutOfRange { index: count as u16, count }.into());
		}

		Ok(ConstantPool { entries })
	}

	fn read_entry(reader: &mut impl ClassRead, index: usize) -> Result<PoolEntry> {
		Ok(match reader.read_u8()? {
			pool::UTF8 => {
				let length = reader.read_u16_as_usize()?;
				let bytes = reader.read_u8_vec(length)?;
				let string = jstring::from_vec_to_string(bytes)
					.map_err(|_| DecodeError::MalformedUtf8 { index: index as u16 })?;
				PoolEntry::Utf8(string)
			},
			pool::INTEGER => PoolEntry::Integer(reader.read_i32()?),
			pool::FLOAT => PoolEntry::Float(f32::from_bits(reader.read_u32()?)),
			pool::LONG => PoolEntry::Long(reader.read_i64()?),
			pool::DOUBLE => PoolEntry::Double(f64::from_bits(reader.read_u64()?)),
			pool::CLASS => PoolEntry::Class { name_index: reader.read_u16()? },
			pool::STRING => PoolEntry::String { string_index: reader.read_u16()? },
			pool::FIELD_REF => PoolEntry::FieldRef {
				class_index: reader.read_u16()?,
				name_and_type_index: reader.read_u16()?,
			},
			pool::METHOD_REF => PoolEntry::MethodRef {
				class_index: reader.read_u16()?,
				name_and_type_index: reader.read_u16()?,
			},
			pool::INTERFACE_METHOD_REF => PoolEntry::InterfaceMethodRef {
				class_index: reader.read_u16()?,
				name_and_type_index: reader.read_u16()?,
			},
			pool::NAME_AND_TYPE => PoolEntry::NameAndType {
				name_index: reader.read_u16()?,
				descriptor_index: reader.read_u16()?,
			},
			pool::METHOD_HANDLE => PoolEntry::MethodHandle {
				reference_kind: reader.read_u8()?,
				reference_index: reader.read_u16()?,
			},
			pool::METHOD_TYPE => PoolEntry::MethodType { descriptor_index: reader.read_u16()? },
			pool::DYNAMIC => PoolEntry::Dynamic {
				bootstrap_method_attr_index: reader.read_u16()?,
				name_and_type_index: reader.read_u16()?,
			},
			pool::INVOKE_DYNAMIC => PoolEntry::InvokeDynamic {
				bootstrap_method_attr_index: reader.read_u16()?,
				name_and_type_index: reader.read_u16()?,
			},
			pool::MODULE => PoolEntry::Module { name_index: reader.read_u16()? },
			pool::PACKAGE => PoolEntry::Package { name_index: reader.read_u16()? },
			tag => return Err(DecodeError::UnknownPoolTag { tag, index }.into()),
		})
	}

	/// The `constant_pool_count`, so one more than the highest index.
	pub fn count(&self) -> usize {
		self.entries.len()
	}

	pub fn get(&self, index: u16) -> Result<&PoolEntry> {
		self.entries.get(index as usize)
			.and_then(Option::as_ref)
			.ok_or_else(|| DecodeError::PoolIndexOutOfRange { index, count: self.entries.len() }.into())
	}

	fn mismatch(&self, index: u16, expected: &'static str, found: &PoolEntry) -> anyhow::Error {
		DecodeError::PoolTagMismatch { index, expected, found: found.kind() }.into()
	}

	pub fn utf8_at(&self, index: u16) -> Result<&JavaStr> {
		match self.get(index)? {
			PoolEntry::Utf8(string) => Ok(&**string),
			other => Err(self.mismatch(index, "Utf8", other)),
		}
	}

	/// Like [`ConstantPool::utf8_at`], but requires the string to be valid utf8, without unpaired surrogates.
	pub fn str_at(&self, index: u16) -> Result<&str> {
		self.utf8_at(index)?
			.as_str()
			.map_err(|_| DecodeError::MalformedUtf8 { index }.into())
	}

	pub fn class_name_at(&self, index: u16) -> Result<ClassName> {
		match self.get(index)? {
			&PoolEntry::Class { name_index } => Ok(ClassName::from(self.str_at(name_index)?)),
			other => Err(self.mismatch(index, "Class", other)),
		}
	}

	/// Returns the name and the descriptor.
	pub fn name_and_type_at(&self, index: u16) -> Result<(&str, &str)> {
		match self.get(index)? {
			&PoolEntry::NameAndType { name_index, descriptor_index } => {
				Ok((self.str_at(name_index)?, self.str_at(descriptor_index)?))
			},
			other => Err(self.mismatch(index, "NameAndType", other)),
		}
	}

	pub fn integer_at(&self, index: u16) -> Result<i32> {
		match self.get(index)? {
			&PoolEntry::Integer(value) => Ok(value),
			other => Err(self.mismatch(index, "Integer", other)),
		}
	}

	pub fn float_at(&self, index: u16) -> Result<f32> {
		match self.get(index)? {
			&PoolEntry::Float(value) => Ok(value),
			other => Err(self.mismatch(index, "Float", other)),
		}
	}

	pub fn long_at(&self, index: u16) -> Result<i64> {
		match self.get(index)? {
			&PoolEntry::Long(value) => Ok(value),
			other => Err(self.mismatch(index, "Long", other)),
		}
	}

	pub fn double_at(&self, index: u16) -> Result<f64> {
		match self.get(index)? {
			&PoolEntry::Double(value) => Ok(value),
			other => Err(self.mismatch(index, "Double", other)),
		}
	}

	/// Resolves a `String` entry to the string it refers to.
	pub fn string_at(&self, index: u16) -> Result<JavaString> {
		match self.get(index)? {
			&PoolEntry::String { string_index } => Ok(self.utf8_at(string_index)?.to_owned()),
			other => Err(self.mismatch(index, "String", other)),
		}
	}

	pub fn field_ref_at(&self, index: u16) -> Result<FieldRef> {
		match self.get(index)? {
			&PoolEntry::FieldRef { class_index, name_and_type_index } => {
				let class = self.class_name_at(class_index)?;
				let (name, descriptor) = self.name_and_type_at(name_and_type_index)?;
				Ok(FieldRef { class, name: name.to_owned(), descriptor: descriptor.to_owned() })
			},
			other => Err(self.mismatch(index, "Fieldref", other)),
		}
	}

	/// Accepts both `Methodref` and `InterfaceMethodref` entries, the `bool` tells if it was the latter.
	pub fn method_ref_at(&self, index: u16) -> Result<(MethodRef, bool)> {
		let (class_index, name_and_type_index, is_interface) = match self.get(index)? {
			&PoolEntry::MethodRef { class_index, name_and_type_index } => (class_index, name_and_type_index, false),
			&PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => (class_index, name_and_type_index, true),
			other => return Err(self.mismatch(index, "Methodref", other)),
		};
		Ok((self.method_ref(class_index, name_and_type_index)?, is_interface))
	}

	pub fn interface_method_ref_at(&self, index: u16) -> Result<MethodRef> {
		match self.get(index)? {
			&PoolEntry::InterfaceMethodRef { class_index, name_and_type_index } => {
				self.method_ref(class_index, name_and_type_index)
			},
			other => Err(self.mismatch(index, "InterfaceMethodref", other)),
		}
	}

	fn method_ref(&self, class_index: u16, name_and_type_index: u16) -> Result<MethodRef> {
		let class = self.class_name_at(class_index)?;
		let (name, descriptor) = self.name_and_type_at(name_and_type_index)?;
		Ok(MethodRef { class, name: name.to_owned(), descriptor: descriptor.to_owned() })
	}

	/// Resolves an entry that `ldc`, `ldc_w` or `ldc2_w` may load.
	pub fn loadable_at(&self, index: u16) -> Result<Loadable> {
		Ok(match self.get(index)? {
			&PoolEntry::Integer(value) => Loadable::Integer(value),
			&PoolEntry::Float(value) => Loadable::Float(value),
			&PoolEntry::Long(value) => Loadable::Long(value),
			&PoolEntry::Double(value) => Loadable::Double(value),
			PoolEntry::String { .. } => Loadable::String(self.string_at(index)?),
			PoolEntry::Class { .. } => Loadable::Class(self.class_name_at(index)?),
			PoolEntry::MethodHandle { .. } => Loadable::MethodHandle(index),
			PoolEntry::MethodType { .. } => Loadable::MethodType(index),
			PoolEntry::Dynamic { .. } => Loadable::Dynamic(index),
			other => return Err(self.mismatch(index, "loadable constant", other)),
		})
	}

	/// Resolves an entry as stored in the `ConstantValue` attribute.
	pub fn constant_at(&self, index: u16) -> Result<ConstantValue> {
		Ok(match self.get(index)? {
			&PoolEntry::Integer(value) => ConstantValue::Integer(value),
			&PoolEntry::Float(value) => ConstantValue::Float(value),
			&PoolEntry::Long(value) => ConstantValue::Long(value),
			&PoolEntry::Double(value) => ConstantValue::Double(value),
			PoolEntry::String { .. } => ConstantValue::String(self.string_at(index)?),
			other => return Err(self.mismatch(index, "constant value", other)),
		})
	}

	/// For pool indices that may be zero, like the `super_class` item or the `catch_type` of a handler.
	pub(crate) fn optional<'a, T>(&'a self, index: u16, f: impl FnOnce(&'a Self, u16) -> Result<T>) -> Result<Option<T>> {
		if index == 0 {
			Ok(None)
		} else {
			f(self, index).map(Some)
		}
	}
}
