//! A crate for reading [Java Class Files](https://docs.oracle.com/javase/specs/jvms/se22/html/jvms-4.html)
//! into an immutable tree, as needed by an ahead-of-time translator.
//!
//! Use [`parse`] to read a class, and [`decode_annotations`] to decode the payload of an annotation attribute
//! on its own.

pub mod tree;
mod class_reader;
mod class_constants;
mod error;
mod jstring;

use std::io::{Cursor, Read, Seek};
use anyhow::{Context, Result};
use crate::tree::annotation::AnnotationValue;
use crate::tree::class::ClassFile;

pub use class_constants::opcode;
pub use class_reader::pool::{ConstantPool, PoolEntry};
pub use error::DecodeError;

/// Reads a single java class file from the given bytes.
///
/// The magic and the version are checked first, nothing else is read if they don't match.
pub fn parse(bytes: &[u8]) -> Result<ClassFile> {
	class_reader::read(&mut Cursor::new(bytes))
}

/// Decodes the contents of a `RuntimeVisibleAnnotations` (or `RuntimeInvisibleAnnotations`) attribute, without
/// the attribute name index and length.
///
/// Returns one `(annotation type, element name, value)` entry per element value pair, in the order they appear.
pub fn decode_annotations(bytes: &[u8], pool: &ConstantPool) -> Result<Vec<(String, String, AnnotationValue)>> {
	let mut reader = Cursor::new(bytes);
	let annotations = class_reader::annotation::read_annotations(&mut reader, pool)?;
	class_reader::check_consumed(&reader, "annotations", bytes.len() as u32)?;

	Ok(annotations.into_iter()
		.flat_map(|annotation| {
			let owner = annotation.type_descriptor;
			annotation.elements.into_iter()
				.map(move |(name, value)| (owner.clone(), name, value))
		})
		.collect())
}

trait ClassRead {
	fn marker(&mut self) -> Result<u64>;
	fn skip(&mut self, n: u64) -> Result<()>;

	fn read_n<const N: usize>(&mut self) -> Result<[u8; N]>;
	fn read_u8(&mut self) -> Result<u8> {
		Ok(u8::from_be_bytes(self.read_n().context("couldn't read u8")?))
	}
	fn read_u16(&mut self) -> Result<u16> {
		Ok(u16::from_be_bytes(self.read_n().context("couldn't read u16")?))
	}
	fn read_u32(&mut self) -> Result<u32> {
		Ok(u32::from_be_bytes(self.read_n().context("couldn't read u32")?))
	}
	fn read_u64(&mut self) -> Result<u64> {
		Ok(u64::from_be_bytes(self.read_n().context("couldn't read u64")?))
	}
	fn read_i8(&mut self) -> Result<i8> {
		Ok(i8::from_be_bytes(self.read_n().context("couldn't read i8")?))
	}
	fn read_i16(&mut self) -> Result<i16> {
		Ok(i16::from_be_bytes(self.read_n().context("couldn't read i16")?))
	}
	fn read_i32(&mut self) -> Result<i32> {
		Ok(i32::from_be_bytes(self.read_n().context("couldn't read i32")?))
	}
	fn read_i64(&mut self) -> Result<i64> {
		Ok(i64::from_be_bytes(self.read_n().context("couldn't read i64")?))
	}

	fn read_u16_as_usize(&mut self) -> Result<usize> {
		Ok(self.read_u16()? as usize)
	}
	fn read_u8_vec(&mut self, size: usize) -> Result<Vec<u8>>;
	fn read_vec<T, S, E>(&mut self, get_size: S, mut get_element: E) -> Result<Vec<T>>
		where
			S: FnOnce(&mut Self) -> Result<usize>,
			E: FnMut(&mut Self) -> Result<T>
	{
		let size = get_size(self)?;
		let mut vec = Vec::with_capacity(size);
		for _ in 0..size {
			vec.push(get_element(self)?);
		}
		Ok(vec)
	}
}

impl<T: Read + Seek> ClassRead for T {
	fn marker(&mut self) -> Result<u64> {
		Ok(self.stream_position()?)
	}
	fn skip(&mut self, n: u64) -> Result<()> {
		// Seeking past the end is allowed by `Seek`, so we read the bytes instead to notice truncation.
		let position = self.marker()?;
		let skipped = std::io::copy(&mut Read::take(&mut *self, n), &mut std::io::sink())?;
		if skipped != n {
			return Err(DecodeError::Truncated { position: position + skipped }.into());
		}
		Ok(())
	}

	fn read_n<const N: usize>(&mut self) -> Result<[u8; N]> {
		let position = self.marker()?;
		let mut buf = [0u8; N];
		self.read_exact(&mut buf)
			.map_err(|_| DecodeError::Truncated { position })?;
		Ok(buf)
	}
	fn read_u8_vec(&mut self, size: usize) -> Result<Vec<u8>> {
		let position = self.marker()?;
		let mut vec = vec![0; size];
		self.read_exact(&mut vec)
			.map_err(|_| DecodeError::Truncated { position })?;
		Ok(vec)
	}
}
