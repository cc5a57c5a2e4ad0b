//! This crate writes java class files, byte for byte as given.
//!
//! No format checking is done, which makes it useful for writing class files that a reader should reject. Use
//! [`PoolBuilder`] to hand out constant pool indices and [`Asm`] to assemble bytecode with labels.
//!
//! This builds the same class as `javac` would for
//! ```java,ignore
//! package org.example;
//!
//! class Main {}
//! ```
//! except for the `LineNumberTable` and `SourceFile` attributes.
//! ```
//! # use pretty_assertions::assert_eq;
//! use raw_class_file::{flags, insn, ClassFile};
//! let mut class = ClassFile::new("org/example/Main", Some("java/lang/Object"));
//! class.access_flags = flags::ACC_SUPER;
//!
//! let init = class.pool.method_ref("java/lang/Object", "<init>", "()V");
//! let [high, low] = init.to_be_bytes();
//! let code = class.code(1, 1, vec![insn::aload_0, insn::invokespecial, high, low, insn::r#return], vec![]);
//! class.method(0, "<init>", "()V", vec![code]);
//!
//! let bytes = class.to_bytes();
//! assert_eq!(&bytes[0..4], &[0xca, 0xfe, 0xba, 0xbe]);
//! // header, pool, access and names, three counts, one method with its `Code`, attribute count
//! assert_eq!(bytes.len(), 8 + class.pool.to_bytes().len() + 6 + 6 + 8 + 6 + 17 + 2);
//! ```

mod asm;
mod pool;

pub use asm::{Asm, Label};
pub use pool::{modified_utf8, CpInfo, PoolBuilder};

pub mod flags {
	pub const ACC_PUBLIC: u16       = 0x0001; // class, field, method
	pub const ACC_PRIVATE: u16      = 0x0002; // field, method
	pub const ACC_PROTECTED: u16    = 0x0004; // field, method
	pub const ACC_STATIC: u16       = 0x0008; // field, method
	pub const ACC_FINAL: u16        = 0x0010; // class, field, method
	pub const ACC_SUPER: u16        = 0x0020; // class
	pub const ACC_SYNCHRONIZED: u16 = 0x0020; // method
	pub const ACC_VOLATILE: u16     = 0x0040; // field
	pub const ACC_BRIDGE: u16       = 0x0040; // method
	pub const ACC_TRANSIENT: u16    = 0x0080; // field
	pub const ACC_VARARGS: u16      = 0x0080; // method
	pub const ACC_NATIVE: u16       = 0x0100; // method
	pub const ACC_INTERFACE: u16    = 0x0200; // class
	pub const ACC_ABSTRACT: u16     = 0x0400; // class, method
	pub const ACC_STRICT: u16       = 0x0800; // method
	pub const ACC_SYNTHETIC: u16    = 0x1000; // class, field, method
	pub const ACC_ANNOTATION: u16   = 0x2000; // class
	pub const ACC_ENUM: u16         = 0x4000; // class, field
}

fn write_u16(out: &mut Vec<u8>, value: u16) {
	out.extend(value.to_be_bytes());
}

fn write_u32(out: &mut Vec<u8>, value: u32) {
	out.extend(value.to_be_bytes());
}

fn write_all<T>(out: &mut Vec<u8>, items: &[T], write: impl Fn(&T, &mut Vec<u8>)) {
	write_u16(out, items.len() as u16);
	for item in items {
		write(item, out);
	}
}

/// A class file, with the constant pool built up as the other parts are added.
#[derive(Debug, Clone)]
pub struct ClassFile {
	pub minor_version: u16,
	pub major_version: u16,
	pub pool: PoolBuilder,
	pub access_flags: u16,
	pub this_class: u16,
	pub super_class: u16,
	pub interfaces: Vec<u16>,
	pub fields: Vec<FieldInfo>,
	pub methods: Vec<MethodInfo>,
	pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
	/// A public class of version 52.0 (Java 8), with nothing in it yet.
	pub fn new(name: &str, super_class: Option<&str>) -> ClassFile {
		let mut pool = PoolBuilder::new();
		let this_class = pool.class(name);
		let super_class = super_class.map_or(0, |super_class| pool.class(super_class));
		ClassFile {
			minor_version: 0,
			major_version: 52,
			pool,
			access_flags: flags::ACC_PUBLIC | flags::ACC_SUPER,
			this_class,
			super_class,
			interfaces: Vec::new(),
			fields: Vec::new(),
			methods: Vec::new(),
			attributes: Vec::new(),
		}
	}

	pub fn interface(&mut self, name: &str) {
		let index = self.pool.class(name);
		self.interfaces.push(index);
	}

	pub fn field(&mut self, access_flags: u16, name: &str, descriptor: &str, attributes: Vec<AttributeInfo>) {
		let name_index = self.pool.utf8(name);
		let descriptor_index = self.pool.utf8(descriptor);
		self.fields.push(FieldInfo { access_flags, name_index, descriptor_index, attributes });
	}

	pub fn method(&mut self, access_flags: u16, name: &str, descriptor: &str, attributes: Vec<AttributeInfo>) {
		let name_index = self.pool.utf8(name);
		let descriptor_index = self.pool.utf8(descriptor);
		self.methods.push(MethodInfo { access_flags, name_index, descriptor_index, attributes });
	}

	/// Creates a `Code` attribute without attributes of its own.
	pub fn code(&mut self, max_stack: u16, max_locals: u16, code: Vec<u8>, exception_table: Vec<ExceptionTableEntry>) -> AttributeInfo {
		AttributeInfo::Code {
			attribute_name_index: self.pool.utf8("Code"),
			max_stack,
			max_locals,
			code,
			exception_table,
			attributes: Vec::new(),
		}
	}

	/// Creates a `RuntimeVisibleAnnotations` or `RuntimeInvisibleAnnotations` attribute.
	pub fn annotations(&mut self, visible: bool, annotations: Vec<Annotation>) -> AttributeInfo {
		if visible {
			let attribute_name_index = self.pool.utf8("RuntimeVisibleAnnotations");
			AttributeInfo::RuntimeVisibleAnnotations { attribute_name_index, annotations }
		} else {
			let attribute_name_index = self.pool.utf8("RuntimeInvisibleAnnotations");
			AttributeInfo::RuntimeInvisibleAnnotations { attribute_name_index, annotations }
		}
	}

	/// Converts the class file to binary representation.
	pub fn to_bytes(&self) -> Vec<u8> {
		let mut out = Vec::new();
		write_u32(&mut out, 0xCAFE_BABE);
		write_u16(&mut out, self.minor_version);
		write_u16(&mut out, self.major_version);
		self.pool.write(&mut out);
		write_u16(&mut out, self.access_flags);
		write_u16(&mut out, self.this_class);
		write_u16(&mut out, self.super_class);
		write_all(&mut out, &self.interfaces, |&index, out| write_u16(out, index));
		write_all(&mut out, &self.fields, FieldInfo::write);
		write_all(&mut out, &self.methods, MethodInfo::write);
		write_all(&mut out, &self.attributes, AttributeInfo::write);
		out
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldInfo {
	pub access_flags: u16,
	pub name_index: u16,
	pub descriptor_index: u16,
	pub attributes: Vec<AttributeInfo>,
}

impl FieldInfo {
	pub fn write(&self, out: &mut Vec<u8>) {
		write_u16(out, self.access_flags);
		write_u16(out, self.name_index);
		write_u16(out, self.descriptor_index);
		write_all(out, &self.attributes, AttributeInfo::write);
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
	pub access_flags: u16,
	pub name_index: u16,
	pub descriptor_index: u16,
	pub attributes: Vec<AttributeInfo>,
}

impl MethodInfo {
	pub fn write(&self, out: &mut Vec<u8>) {
		write_u16(out, self.access_flags);
		write_u16(out, self.name_index);
		write_u16(out, self.descriptor_index);
		write_all(out, &self.attributes, AttributeInfo::write);
	}
}

/// The attributes needed for testing a class reader. Anything else can be written with [`AttributeInfo::Other`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeInfo {
	ConstantValue {
		attribute_name_index: u16,
		constantvalue_index: u16,
	},
	Code {
		attribute_name_index: u16,
		max_stack: u16,
		max_locals: u16,
		code: Vec<u8>,
		exception_table: Vec<ExceptionTableEntry>,
		attributes: Vec<AttributeInfo>,
	},
	Exceptions {
		attribute_name_index: u16,
		exception_index_table: Vec<u16>,
	},
	SourceFile {
		attribute_name_index: u16,
		sourcefile_index: u16,
	},
	LineNumberTable {
		attribute_name_index: u16,
		line_number_table: Vec<LineNumberTableEntry>,
	},
	RuntimeVisibleAnnotations {
		attribute_name_index: u16,
		annotations: Vec<Annotation>,
	},
	RuntimeInvisibleAnnotations {
		attribute_name_index: u16,
		annotations: Vec<Annotation>,
	},
	/// The `attribute_length` is the length of `info`.
	Other {
		attribute_name_index: u16,
		info: Vec<u8>,
	},
}

impl AttributeInfo {
	fn attribute_name_index(&self) -> u16 {
		match self {
			AttributeInfo::ConstantValue { attribute_name_index, .. } |
			AttributeInfo::Code { attribute_name_index, .. } |
			AttributeInfo::Exceptions { attribute_name_index, .. } |
			AttributeInfo::SourceFile { attribute_name_index, .. } |
			AttributeInfo::LineNumberTable { attribute_name_index, .. } |
			AttributeInfo::RuntimeVisibleAnnotations { attribute_name_index, .. } |
			AttributeInfo::RuntimeInvisibleAnnotations { attribute_name_index, .. } |
			AttributeInfo::Other { attribute_name_index, .. } => *attribute_name_index,
		}
	}

	/// Writes the contents, without the name index and length.
	fn write_info(&self, out: &mut Vec<u8>) {
		match self {
			AttributeInfo::ConstantValue { constantvalue_index, .. } => write_u16(out, *constantvalue_index),
			AttributeInfo::Code { max_stack, max_locals, code, exception_table, attributes, .. } => {
				write_u16(out, *max_stack);
				write_u16(out, *max_locals);
				write_u32(out, code.len() as u32);
				out.extend(code);
				write_all(out, exception_table, ExceptionTableEntry::write);
				write_all(out, attributes, AttributeInfo::write);
			},
			AttributeInfo::Exceptions { exception_index_table, .. } => {
				write_all(out, exception_index_table, |&index, out| write_u16(out, index));
			},
			AttributeInfo::SourceFile { sourcefile_index, .. } => write_u16(out, *sourcefile_index),
			AttributeInfo::LineNumberTable { line_number_table, .. } => {
				write_all(out, line_number_table, |entry, out| {
					write_u16(out, entry.start_pc);
					write_u16(out, entry.line_number);
				});
			},
			AttributeInfo::RuntimeVisibleAnnotations { annotations, .. } |
			AttributeInfo::RuntimeInvisibleAnnotations { annotations, .. } => {
				write_all(out, annotations, Annotation::write);
			},
			AttributeInfo::Other { info, .. } => out.extend(info),
		}
	}

	pub fn write(&self, out: &mut Vec<u8>) {
		let mut info = Vec::new();
		self.write_info(&mut info);
		write_u16(out, self.attribute_name_index());
		write_u32(out, info.len() as u32);
		out.extend(info);
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionTableEntry {
	pub start_pc: u16,
	pub end_pc: u16,
	pub handler_pc: u16,
	/// Zero catches everything.
	pub catch_type: u16,
}

impl ExceptionTableEntry {
	pub fn write(&self, out: &mut Vec<u8>) {
		write_u16(out, self.start_pc);
		write_u16(out, self.end_pc);
		write_u16(out, self.handler_pc);
		write_u16(out, self.catch_type);
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumberTableEntry {
	pub start_pc: u16,
	pub line_number: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
	pub type_index: u16,
	pub element_value_pairs: Vec<ElementValuePairsEntry>,
}

impl Annotation {
	pub fn write(&self, out: &mut Vec<u8>) {
		write_u16(out, self.type_index);
		write_all(out, &self.element_value_pairs, |pair, out| {
			write_u16(out, pair.element_name_index);
			pair.value.write(out);
		});
	}

	/// Writes the contents of an annotations attribute holding just these annotations.
	pub fn attribute_info(annotations: &[Annotation]) -> Vec<u8> {
		let mut out = Vec::new();
		write_all(&mut out, annotations, Annotation::write);
		out
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElementValuePairsEntry {
	pub element_name_index: u16,
	pub value: ElementValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ElementValue {
	Byte { const_value_index: u16 },
	Char { const_value_index: u16 },
	Double { const_value_index: u16 },
	Float { const_value_index: u16 },
	Integer { const_value_index: u16 },
	Long { const_value_index: u16 },
	Short { const_value_index: u16 },
	Boolean { const_value_index: u16 },
	String { const_value_index: u16 },
	Enum { type_name_index: u16, const_name_index: u16 },
	Class { class_info_index: u16 },
	Annotation { annotation_value: Annotation },
	Array { values: Vec<ElementValue> },
	/// Any tag, followed by the given bytes.
	Raw { tag: u8, bytes: Vec<u8> },
}

impl ElementValue {
	pub fn write(&self, out: &mut Vec<u8>) {
		let mut index = |tag: u8, index: u16| {
			out.push(tag);
			write_u16(out, index);
		};
		match self {
			ElementValue::Byte { const_value_index } => index(b'B', *const_value_index),
			ElementValue::Char { const_value_index } => index(b'C', *const_value_index),
			ElementValue::Double { const_value_index } => index(b'D', *const_value_index),
			ElementValue::Float { const_value_index } => index(b'F', *const_value_index),
			ElementValue::Integer { const_value_index } => index(b'I', *const_value_index),
			ElementValue::Long { const_value_index } => index(b'J', *const_value_index),
			ElementValue::Short { const_value_index } => index(b'S', *const_value_index),
			ElementValue::Boolean { const_value_index } => index(b'Z', *const_value_index),
			ElementValue::String { const_value_index } => index(b's', *const_value_index),
			ElementValue::Class { class_info_index } => index(b'c', *class_info_index),
			ElementValue::Enum { type_name_index, const_name_index } => {
				index(b'e', *type_name_index);
				write_u16(out, *const_name_index);
			},
			ElementValue::Annotation { annotation_value } => {
				out.push(b'@');
				annotation_value.write(out);
			},
			ElementValue::Array { values } => {
				out.push(b'[');
				write_all(out, values, ElementValue::write);
			},
			ElementValue::Raw { tag, bytes } => {
				out.push(*tag);
				out.extend(bytes);
			},
		}
	}
}

#[allow(non_upper_case_globals)]
pub mod insn {
	pub const nop: u8 = 0x00;
	pub const aconst_null: u8 = 0x01;
	pub const iconst_m1: u8 = 0x02;
	pub const iconst_0: u8 = 0x03;
	pub const iconst_1: u8 = 0x04;
	pub const iconst_2: u8 = 0x05;
	pub const iconst_3: u8 = 0x06;
	pub const iconst_4: u8 = 0x07;
	pub const iconst_5: u8 = 0x08;
	pub const lconst_0: u8 = 0x09;
	pub const lconst_1: u8 = 0x0a;
	pub const fconst_0: u8 = 0x0b;
	pub const fconst_1: u8 = 0x0c;
	pub const fconst_2: u8 = 0x0d;
	pub const dconst_0: u8 = 0x0e;
	pub const dconst_1: u8 = 0x0f;
	pub const bipush: u8 = 0x10;
	pub const sipush: u8 = 0x11;
	pub const ldc: u8 = 0x12;
	pub const ldc_w: u8 = 0x13;
	pub const ldc2_w: u8 = 0x14;
	pub const iload: u8 = 0x15;
	pub const lload: u8 = 0x16;
	pub const fload: u8 = 0x17;
	pub const dload: u8 = 0x18;
	pub const aload: u8 = 0x19;
	pub const iload_0: u8 = 0x1a;
	pub const iload_1: u8 = 0x1b;
	pub const iload_2: u8 = 0x1c;
	pub const iload_3: u8 = 0x1d;
	pub const lload_0: u8 = 0x1e;
	pub const lload_1: u8 = 0x1f;
	pub const lload_2: u8 = 0x20;
	pub const lload_3: u8 = 0x21;
	pub const fload_0: u8 = 0x22;
	pub const fload_1: u8 = 0x23;
	pub const fload_2: u8 = 0x24;
	pub const fload_3: u8 = 0x25;
	pub const dload_0: u8 = 0x26;
	pub const dload_1: u8 = 0x27;
	pub const dload_2: u8 = 0x28;
	pub const dload_3: u8 = 0x29;
	pub const aload_0: u8 = 0x2a;
	pub const aload_1: u8 = 0x2b;
	pub const aload_2: u8 = 0x2c;
	pub const aload_3: u8 = 0x2d;
	pub const iaload: u8 = 0x2e;
	pub const laload: u8 = 0x2f;
	pub const faload: u8 = 0x30;
	pub const daload: u8 = 0x31;
	pub const aaload: u8 = 0x32;
	pub const baload: u8 = 0x33;
	pub const caload: u8 = 0x34;
	pub const saload: u8 = 0x35;
	pub const istore: u8 = 0x36;
	pub const lstore: u8 = 0x37;
	pub const fstore: u8 = 0x38;
	pub const dstore: u8 = 0x39;
	pub const astore: u8 = 0x3a;
	pub const istore_0: u8 = 0x3b;
	pub const istore_1: u8 = 0x3c;
	pub const istore_2: u8 = 0x3d;
	pub const istore_3: u8 = 0x3e;
	pub const lstore_0: u8 = 0x3f;
	pub const lstore_1: u8 = 0x40;
	pub const lstore_2: u8 = 0x41;
	pub const lstore_3: u8 = 0x42;
	pub const fstore_0: u8 = 0x43;
	pub const fstore_1: u8 = 0x44;
	pub const fstore_2: u8 = 0x45;
	pub const fstore_3: u8 = 0x46;
	pub const dstore_0: u8 = 0x47;
	pub const dstore_1: u8 = 0x48;
	pub const dstore_2: u8 = 0x49;
	pub const dstore_3: u8 = 0x4a;
	pub const astore_0: u8 = 0x4b;
	pub const astore_1: u8 = 0x4c;
	pub const astore_2: u8 = 0x4d;
	pub const astore_3: u8 = 0x4e;
	pub const iastore: u8 = 0x4f;
	pub const lastore: u8 = 0x50;
	pub const fastore: u8 = 0x51;
	pub const dastore: u8 = 0x52;
	pub const aastore: u8 = 0x53;
	pub const bastore: u8 = 0x54;
	pub const castore: u8 = 0x55;
	pub const sastore: u8 = 0x56;
	pub const pop: u8 = 0x57;
	pub const pop2: u8 = 0x58;
	pub const dup: u8 = 0x59;
	pub const dup_x1: u8 = 0x5a;
	pub const dup_x2: u8 = 0x5b;
	pub const dup2: u8 = 0x5c;
	pub const dup2_x1: u8 = 0x5d;
	pub const dup2_x2: u8 = 0x5e;
	pub const swap: u8 = 0x5f;
	pub const iadd: u8 = 0x60;
	pub const ladd: u8 = 0x61;
	pub const fadd: u8 = 0x62;
	pub const dadd: u8 = 0x63;
	pub const isub: u8 = 0x64;
	pub const lsub: u8 = 0x65;
	pub const fsub: u8 = 0x66;
	pub const dsub: u8 = 0x67;
	pub const imul: u8 = 0x68;
	pub const lmul: u8 = 0x69;
	pub const fmul: u8 = 0x6a;
	pub const dmul: u8 = 0x6b;
	pub const idiv: u8 = 0x6c;
	pub const ldiv: u8 = 0x6d;
	pub const fdiv: u8 = 0x6e;
	pub const ddiv: u8 = 0x6f;
	pub const irem: u8 = 0x70;
	pub const lrem: u8 = 0x71;
	pub const frem: u8 = 0x72;
	pub const drem: u8 = 0x73;
	pub const ineg: u8 = 0x74;
	pub const lneg: u8 = 0x75;
	pub const fneg: u8 = 0x76;
	pub const dneg: u8 = 0x77;
	pub const ishl: u8 = 0x78;
	pub const lshl: u8 = 0x79;
	pub const ishr: u8 = 0x7a;
	pub const lshr: u8 = 0x7b;
	pub const iushr: u8 = 0x7c;
	pub const lushr: u8 = 0x7d;
	pub const iand: u8 = 0x7e;
	pub const land: u8 = 0x7f;
	pub const ior: u8 = 0x80;
	pub const lor: u8 = 0x81;
	pub const ixor: u8 = 0x82;
	pub const lxor: u8 = 0x83;
	pub const iinc: u8 = 0x84;
	pub const i2l: u8 = 0x85;
	pub const i2f: u8 = 0x86;
	pub const i2d: u8 = 0x87;
	pub const l2i: u8 = 0x88;
	pub const l2f: u8 = 0x89;
	pub const l2d: u8 = 0x8a;
	pub const f2i: u8 = 0x8b;
	pub const f2l: u8 = 0x8c;
	pub const f2d: u8 = 0x8d;
	pub const d2i: u8 = 0x8e;
	pub const d2l: u8 = 0x8f;
	pub const d2f: u8 = 0x90;
	pub const i2b: u8 = 0x91;
	pub const i2c: u8 = 0x92;
	pub const i2s: u8 = 0x93;
	pub const lcmp: u8 = 0x94;
	pub const fcmpl: u8 = 0x95;
	pub const fcmpg: u8 = 0x96;
	pub const dcmpl: u8 = 0x97;
	pub const dcmpg: u8 = 0x98;
	pub const ifeq: u8 = 0x99;
	pub const ifne: u8 = 0x9a;
	pub const iflt: u8 = 0x9b;
	pub const ifge: u8 = 0x9c;
	pub const ifgt: u8 = 0x9d;
	pub const ifle: u8 = 0x9e;
	pub const if_icmpeq: u8 = 0x9f;
	pub const if_icmpne: u8 = 0xa0;
	pub const if_icmplt: u8 = 0xa1;
	pub const if_icmpge: u8 = 0xa2;
	pub const if_icmpgt: u8 = 0xa3;
	pub const if_icmple: u8 = 0xa4;
	pub const if_acmpeq: u8 = 0xa5;
	pub const if_acmpne: u8 = 0xa6;
	pub const goto: u8 = 0xa7;
	pub const jsr: u8 = 0xa8;
	pub const ret: u8 = 0xa9;
	pub const tableswitch: u8 = 0xaa;
	pub const lookupswitch: u8 = 0xab;
	pub const ireturn: u8 = 0xac;
	pub const lreturn: u8 = 0xad;
	pub const freturn: u8 = 0xae;
	pub const dreturn: u8 = 0xaf;
	pub const areturn: u8 = 0xb0;
	pub const r#return: u8 = 0xb1;
	pub const getstatic: u8 = 0xb2;
	pub const putstatic: u8 = 0xb3;
	pub const getfield: u8 = 0xb4;
	pub const putfield: u8 = 0xb5;
	pub const invokevirtual: u8 = 0xb6;
	pub const invokespecial: u8 = 0xb7;
	pub const invokestatic: u8 = 0xb8;
	pub const invokeinterface: u8 = 0xb9;
	pub const invokedynamic: u8 = 0xba;
	pub const new: u8 = 0xbb;
	pub const newarray: u8 = 0xbc;
	pub const anewarray: u8 = 0xbd;
	pub const arraylength: u8 = 0xbe;
	pub const athrow: u8 = 0xbf;
	pub const checkcast: u8 = 0xc0;
	pub const instanceof: u8 = 0xc1;
	pub const monitorenter: u8 = 0xc2;
	pub const monitorexit: u8 = 0xc3;
	pub const wide: u8 = 0xc4;
	pub const multianewarray: u8 = 0xc5;
	pub const ifnull: u8 = 0xc6;
	pub const ifnonnull: u8 = 0xc7;
	pub const goto_w: u8 = 0xc8;
	pub const jsr_w: u8 = 0xc9;

	pub const breakpoint: u8 = 0xca;
	pub const impdep1: u8 = 0xfe;
	pub const impdep2: u8 = 0xff;
}
