use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use crate::{ClassRead, DecodeError};
use crate::class_reader::pool::ConstantPool;
use crate::tree::annotation::{Annotation, AnnotationValue};
use crate::tree::field::ConstantValue;

/// How deep annotations and arrays may be nested in each other.
const MAX_DEPTH: usize = 64;

/// Reads the `num_annotations` and `annotations` items of a `Runtime[In]VisibleAnnotations` attribute.
pub(crate) fn read_annotations(reader: &mut impl ClassRead, pool: &ConstantPool) -> Result<Vec<Annotation>> {
	reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| read_annotation(r, pool, 0),
	)
}

fn read_annotation(reader: &mut impl ClassRead, pool: &ConstantPool, depth: usize) -> Result<Annotation> {
	if depth >= MAX_DEPTH {
		return Err(DecodeError::AnnotationTooDeep { limit: MAX_DEPTH }.into());
	}

	let type_descriptor = pool.str_at(reader.read_u16()?)?.to_owned();

	let count = reader.read_u16()?;
	let mut elements = IndexMap::with_capacity(count as usize);
	for _ in 0..count {
		let name = pool.str_at(reader.read_u16()?)?.to_owned();
		let value = read_element_value(reader, pool, depth + 1)
			.with_context(|| anyhow!("in element {name:?} of annotation {type_descriptor:?}"))?;
		elements.insert(name, value);
	}

	Ok(Annotation { type_descriptor, elements })
}

fn read_element_value(reader: &mut impl ClassRead, pool: &ConstantPool, depth: usize) -> Result<AnnotationValue> {
	if depth >= MAX_DEPTH {
		return Err(DecodeError::AnnotationTooDeep { limit: MAX_DEPTH }.into());
	}

	let tag = reader.read_u8()?;
	Ok(match tag {
		b'B' | b'C' | b'I' | b'S' | b'Z' => {
			let value = pool.integer_at(reader.read_u16()?)?;
			AnnotationValue::Primitive(tag as char, ConstantValue::Integer(value))
		},
		b'J' => AnnotationValue::Primitive('J', ConstantValue::Long(pool.long_at(reader.read_u16()?)?)),
		b'F' => AnnotationValue::Primitive('F', ConstantValue::Float(pool.float_at(reader.read_u16()?)?)),
		b'D' => AnnotationValue::Primitive('D', ConstantValue::Double(pool.double_at(reader.read_u16()?)?)),
		b's' => {
			// Unlike `ldc`, this points directly to an `Utf8` entry.
			let string = pool.utf8_at(reader.read_u16()?)?.to_owned();
			AnnotationValue::Primitive('s', ConstantValue::String(string))
		},
		b'e' => {
			let type_descriptor = pool.str_at(reader.read_u16()?)?.to_owned();
			let const_name = pool.str_at(reader.read_u16()?)?.to_owned();
			AnnotationValue::EnumConstant { type_descriptor, const_name }
		},
		b'c' => AnnotationValue::ClassLiteral(pool.str_at(reader.read_u16()?)?.to_owned()),
		b'@' => AnnotationValue::Nested(read_annotation(reader, pool, depth + 1)?),
		b'[' => {
			let values = reader.read_vec(
				|r| r.read_u16_as_usize(),
				|r| read_element_value(r, pool, depth + 1),
			)?;
			AnnotationValue::Array(values)
		},
		tag => return Err(DecodeError::UnknownAnnotationTag { tag }.into()),
	})
}
