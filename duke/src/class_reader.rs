use std::io::Cursor;
use anyhow::{anyhow, bail, Context, Result};
use log::trace;
use crate::{ClassRead, DecodeError};
use crate::class_constants::{self, attribute};
use crate::class_reader::pool::ConstantPool;
use crate::tree::annotation::Annotation;
use crate::tree::class::{ClassAccess, ClassFile};
use crate::tree::field::Field;
use crate::tree::method::code::{Code, ExceptionHandler, LineNumber};
use crate::tree::method::Method;
use crate::tree::version::Version;

pub(crate) mod pool;
pub(crate) mod code;
pub(crate) mod annotation;

/// Checks that reading an attribute used up exactly the number of bytes it declared.
pub(crate) fn check_consumed(reader: &Cursor<&[u8]>, name: &str, declared: u32) -> Result<()> {
	let consumed = reader.position();
	if consumed != declared as u64 {
		return Err(DecodeError::AttributeLength { name: name.to_owned(), declared, consumed }.into());
	}
	Ok(())
}

/// Iterates over the `attributes_count` and `attributes` items.
///
/// For each attribute, `f` is called with the name and a reader limited to the contents of the attribute. If it
/// returns `false` the attribute is skipped, otherwise it must read the contents completely.
fn read_attributes<R: ClassRead>(
	reader: &mut R,
	pool: &ConstantPool,
	mut f: impl FnMut(&str, &mut Cursor<&[u8]>) -> Result<bool>,
) -> Result<()> {
	let attributes_count = reader.read_u16()?;
	for _ in 0..attributes_count {
		let name = pool.str_at(reader.read_u16()?)?;
		let length = reader.read_u32()?;

		if !is_known_attribute(name) {
			trace!("skipping attribute {name:?} of length {length}");
			reader.skip(length as u64)?;
			continue;
		}

		let bytes = reader.read_u8_vec(length as usize)?;
		let mut contents = Cursor::new(bytes.as_slice());
		let read = f(name, &mut contents)
			.with_context(|| anyhow!("in attribute {name:?}"))?;
		if read {
			check_consumed(&contents, name, length)?;
		}
	}
	Ok(())
}

fn is_known_attribute(name: &str) -> bool {
	matches!(name,
		attribute::CODE |
		attribute::CONSTANT_VALUE |
		attribute::EXCEPTIONS |
		attribute::LINE_NUMBER_TABLE |
		attribute::SOURCE_FILE |
		attribute::RUNTIME_VISIBLE_ANNOTATIONS |
		attribute::RUNTIME_INVISIBLE_ANNOTATIONS
	)
}

/// Reads a class file.
pub(crate) fn read(reader: &mut impl ClassRead) -> Result<ClassFile> {
	let magic = reader.read_u32()?;
	if magic != class_constants::MAGIC {
		return Err(DecodeError::BadMagic(magic).into());
	}

	let minor = reader.read_u16()?;
	let major = reader.read_u16()?;
	if !(class_constants::MIN_MAJOR_VERSION..=class_constants::MAX_MAJOR_VERSION).contains(&major) {
		return Err(DecodeError::UnsupportedVersion { major, minor }.into());
	}
	let version = Version::new(major, minor);

	let pool = ConstantPool::read(reader)?;

	let access: ClassAccess = reader.read_u16()?.into();
	let name = pool.class_name_at(reader.read_u16()?)
		.context("in `this_class`")?;
	let super_class = pool.optional(reader.read_u16()?, ConstantPool::class_name_at)
		.context("in `super_class`")?;
	let interfaces = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| pool.class_name_at(r.read_u16()?),
	)?;

	let fields = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| read_field(r, &pool),
	).with_context(|| anyhow!("in fields of class {name}"))?;

	let methods = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| read_method(r, &pool),
	).with_context(|| anyhow!("in methods of class {name}"))?;

	let mut source_file = None;
	let mut runtime_visible_annotations = Vec::new();
	let mut runtime_invisible_annotations = Vec::new();

	read_attributes(reader, &pool, |attribute_name, r| {
		match attribute_name {
			attribute::SOURCE_FILE => {
				source_file = Some(pool.str_at(r.read_u16()?)?.to_owned());
			},
			attribute::RUNTIME_VISIBLE_ANNOTATIONS => {
				runtime_visible_annotations = annotation::read_annotations(r, &pool)?;
			},
			attribute::RUNTIME_INVISIBLE_ANNOTATIONS => {
				runtime_invisible_annotations = annotation::read_annotations(r, &pool)?;
			},
			_ => return Ok(false),
		}
		Ok(true)
	}).with_context(|| anyhow!("in attributes of class {name}"))?;

	if reader.read_u8().is_ok() {
		bail!("trailing bytes after the end of class {name}");
	}

	Ok(ClassFile {
		version,
		pool,
		access,
		name,
		super_class,
		interfaces,
		fields,
		methods,
		source_file,
		runtime_visible_annotations,
		runtime_invisible_annotations,
	})
}

fn read_field(reader: &mut impl ClassRead, pool: &ConstantPool) -> Result<Field> {
	let access = reader.read_u16()?.into();
	let name = pool.str_at(reader.read_u16()?)?.to_owned();
	let descriptor = pool.str_at(reader.read_u16()?)?.to_owned();

	let mut constant_value = None;
	let mut runtime_visible_annotations = Vec::new();
	let mut runtime_invisible_annotations = Vec::new();

	read_attributes(reader, pool, |attribute_name, r| {
		match attribute_name {
			attribute::CONSTANT_VALUE => {
				constant_value = Some(pool.constant_at(r.read_u16()?)?);
			},
			attribute::RUNTIME_VISIBLE_ANNOTATIONS => {
				runtime_visible_annotations = annotation::read_annotations(r, pool)?;
			},
			attribute::RUNTIME_INVISIBLE_ANNOTATIONS => {
				runtime_invisible_annotations = annotation::read_annotations(r, pool)?;
			},
			_ => return Ok(false),
		}
		Ok(true)
	}).with_context(|| anyhow!("in field {name:?} {descriptor:?}"))?;

	Ok(Field {
		access,
		name,
		descriptor,
		constant_value,
		runtime_visible_annotations,
		runtime_invisible_annotations,
	})
}

fn read_method(reader: &mut impl ClassRead, pool: &ConstantPool) -> Result<Method> {
	let access = reader.read_u16()?.into();
	let name = pool.str_at(reader.read_u16()?)?.to_owned();
	let descriptor = pool.str_at(reader.read_u16()?)?.to_owned();

	let mut code = None;
	let mut exceptions = Vec::new();
	let mut runtime_visible_annotations: Vec<Annotation> = Vec::new();
	let mut runtime_invisible_annotations: Vec<Annotation> = Vec::new();

	read_attributes(reader, pool, |attribute_name, r| {
		match attribute_name {
			attribute::CODE => {
				if code.is_some() {
					bail!("only one `Code` attribute is allowed");
				}
				code = Some(read_code(r, pool)?);
			},
			attribute::EXCEPTIONS => {
				exceptions = r.read_vec(
					|r| r.read_u16_as_usize(),
					|r| pool.class_name_at(r.read_u16()?),
				)?;
			},
			attribute::RUNTIME_VISIBLE_ANNOTATIONS => {
				runtime_visible_annotations = annotation::read_annotations(r, pool)?;
			},
			attribute::RUNTIME_INVISIBLE_ANNOTATIONS => {
				runtime_invisible_annotations = annotation::read_annotations(r, pool)?;
			},
			_ => return Ok(false),
		}
		Ok(true)
	}).with_context(|| anyhow!("in method {name:?} {descriptor:?}"))?;

	Ok(Method {
		access,
		name,
		descriptor,
		code,
		exceptions,
		runtime_visible_annotations,
		runtime_invisible_annotations,
	})
}

fn read_code(reader: &mut Cursor<&[u8]>, pool: &ConstantPool) -> Result<Code> {
	let max_stack = reader.read_u16()?;
	let max_locals = reader.read_u16()?;

	let code_length = reader.read_u32()?;
	// This allows us to store offsets in an u16.
	if code_length == 0 || code_length > u16::MAX as u32 {
		bail!("`code_length` must be greater than zero and less than 65536, got {code_length:?}");
	}

	let bytecode = reader.read_u8_vec(code_length as usize)?;

	let exception_table = reader.read_vec(
		|r| r.read_u16_as_usize(),
		|r| {
			let start = r.read_u16()?;
			let end = r.read_u16()?;
			let handler = r.read_u16()?;
			let catch = pool.optional(r.read_u16()?, ConstantPool::class_name_at)?;

			if !(start <= end && end as u32 <= code_length && (handler as u32) < code_length) {
				return Err(DecodeError::MalformedExceptionRange { start, end, handler, code_length }.into());
			}
			Ok(ExceptionHandler { start, end, handler, catch })
		},
	)?;

	let mut line_numbers = Vec::new();
	read_attributes(reader, pool, |attribute_name, r| {
		match attribute_name {
			attribute::LINE_NUMBER_TABLE => {
				let table = r.read_vec(
					|r| r.read_u16_as_usize(),
					|r| Ok(LineNumber { start: r.read_u16()?, line: r.read_u16()? }),
				)?;
				line_numbers.extend(table);
			},
			_ => return Ok(false),
		}
		Ok(true)
	})?;

	Ok(Code { max_stack, max_locals, bytecode, exception_table, line_numbers })
}
