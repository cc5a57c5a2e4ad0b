use anyhow::Result;
use pretty_assertions::assert_eq;
use raw_class_file::{flags, insn, Asm, AttributeInfo, ClassFile, ExceptionTableEntry, LineNumberTableEntry};
use duke::DecodeError;
use duke::tree::field::ConstantValue;
use duke::tree::method::code::{ExceptionHandler, Instruction, LineNumber, LvIndex};

fn decode_error(bytes: &[u8]) -> DecodeError {
	let error = duke::parse(bytes).unwrap_err();
	error.downcast_ref::<DecodeError>().cloned()
		.unwrap_or_else(|| panic!("expected a DecodeError, got {error:?}"))
}

/// `static int sum(int a, int b) { return a + b; }` with a catch-all handler around the addition.
fn static_method_class() -> Result<ClassFile> {
	let mut class = ClassFile::new("org/apidesign/vm4brwsr/StaticMethod", Some("java/lang/Object"));
	class.interface("java/io/Serializable");

	let attribute_name_index = class.pool.utf8("ConstantValue");
	let constantvalue_index = class.pool.long(-3);
	class.field(flags::ACC_STATIC | flags::ACC_FINAL, "CONST", "J", vec![
		AttributeInfo::ConstantValue { attribute_name_index, constantvalue_index },
	]);

	let mut asm = Asm::new();
	asm.op(insn::iload_0);
	asm.op(insn::iload_1);
	asm.op(insn::iadd);
	asm.op(insn::ireturn);
	asm.op(insn::astore_2);
	asm.op(insn::iconst_0);
	asm.op(insn::ireturn);
	let mut code = class.code(2, 3, asm.finish()?, vec![
		ExceptionTableEntry { start_pc: 0, end_pc: 4, handler_pc: 4, catch_type: 0 },
	]);
	let line_numbers = AttributeInfo::LineNumberTable {
		attribute_name_index: class.pool.utf8("LineNumberTable"),
		line_number_table: vec![LineNumberTableEntry { start_pc: 0, line_number: 27 }],
	};
	let unknown = AttributeInfo::Other {
		attribute_name_index: class.pool.utf8("StackMapTable"),
		info: vec![0, 0],
	};
	if let AttributeInfo::Code { attributes, .. } = &mut code {
		attributes.push(line_numbers);
		attributes.push(unknown);
	}
	let exceptions = AttributeInfo::Exceptions {
		attribute_name_index: class.pool.utf8("Exceptions"),
		exception_index_table: vec![class.pool.class("java/lang/Exception")],
	};
	class.method(flags::ACC_STATIC, "sum", "(II)I", vec![code, exceptions]);
	class.method(flags::ACC_PUBLIC | flags::ACC_NATIVE, "nat", "()V", vec![]);

	let source_file = AttributeInfo::SourceFile {
		attribute_name_index: class.pool.utf8("SourceFile"),
		sourcefile_index: class.pool.utf8("StaticMethod.java"),
	};
	class.attributes.push(source_file);

	Ok(class)
}

#[test]
fn reads_a_class() -> Result<()> {
	let class = duke::parse(&static_method_class()?.to_bytes())?;

	assert_eq!(class.name, "org/apidesign/vm4brwsr/StaticMethod");
	assert_eq!(class.super_class.as_ref().map(|x| x.as_str()), Some("java/lang/Object"));
	assert_eq!(class.interfaces.len(), 1);
	assert_eq!(class.interfaces[0], "java/io/Serializable");
	assert_eq!(class.version.major, 52);
	assert!(class.access.is_public);
	assert_eq!(class.source_file.as_deref(), Some("StaticMethod.java"));

	let field = class.field("CONST").expect("field is there");
	assert!(field.access.is_static);
	assert_eq!(field.descriptor, "J");
	assert_eq!(field.constant_value, Some(ConstantValue::Long(-3)));

	let sum = class.method("sum", "(II)I").expect("method is there");
	assert!(sum.access.is_static);
	assert_eq!(sum.exceptions.len(), 1);
	assert_eq!(sum.exceptions[0], "java/lang/Exception");

	let code = sum.code.as_ref().expect("has code");
	assert_eq!((code.max_stack, code.max_locals), (2, 3));
	assert_eq!(code.exception_table, vec![ExceptionHandler { start: 0, end: 4, handler: 4, catch: None }]);
	assert_eq!(code.line_numbers, vec![LineNumber { start: 0, line: 27 }]);

	let instructions: Vec<_> = code.decode(&class.pool)?.into_iter().map(|insn| insn.instruction).collect();
	assert_eq!(instructions, vec![
		Instruction::ILoad(LvIndex { index: 0 }),
		Instruction::ILoad(LvIndex { index: 1 }),
		Instruction::IAdd,
		Instruction::IReturn,
		Instruction::AStore(LvIndex { index: 2 }),
		Instruction::IConst0,
		Instruction::IReturn,
	]);

	let native = class.method("nat", "()V").expect("method is there");
	assert!(native.access.is_native);
	assert!(native.code.is_none());

	Ok(())
}

#[test]
fn bad_magic() {
	assert_eq!(decode_error(&[0xca, 0xfe, 0xd0, 0x0d, 0, 0, 0, 52]), DecodeError::BadMagic(0xcafed00d));
}

#[test]
fn unsupported_versions() -> Result<()> {
	let mut class = static_method_class()?;

	class.major_version = 70;
	assert_eq!(decode_error(&class.to_bytes()), DecodeError::UnsupportedVersion { major: 70, minor: 0 });

	class.major_version = 44;
	class.minor_version = 3;
	assert_eq!(decode_error(&class.to_bytes()), DecodeError::UnsupportedVersion { major: 44, minor: 3 });

	class.major_version = 45;
	duke::parse(&class.to_bytes())?;
	Ok(())
}

#[test]
fn truncated_anywhere() -> Result<()> {
	let bytes = static_method_class()?.to_bytes();
	for length in [0, 3, 9, 40, bytes.len() - 1] {
		let error = decode_error(&bytes[..length]);
		assert!(matches!(error, DecodeError::Truncated { .. }), "at length {length}: {error:?}");
	}
	Ok(())
}

#[test]
fn trailing_bytes() -> Result<()> {
	let mut bytes = static_method_class()?.to_bytes();
	bytes.push(0);
	assert!(duke::parse(&bytes).is_err());
	Ok(())
}

#[test]
fn malformed_exception_range() -> Result<()> {
	let mut class = ClassFile::new("A", Some("java/lang/Object"));
	let code = class.code(1, 1, vec![insn::r#return], vec![
		ExceptionTableEntry { start_pc: 0, end_pc: 2, handler_pc: 0, catch_type: 0 },
	]);
	class.method(flags::ACC_STATIC, "m", "()V", vec![code]);

	assert_eq!(decode_error(&class.to_bytes()), DecodeError::MalformedExceptionRange {
		start: 0,
		end: 2,
		handler: 0,
		code_length: 1,
	});
	Ok(())
}

#[test]
fn attribute_length_must_match() -> Result<()> {
	let mut class = ClassFile::new("A", Some("java/lang/Object"));
	let attribute_name_index = class.pool.utf8("SourceFile");
	let source = class.pool.utf8("A.java");
	let [high, low] = source.to_be_bytes();
	class.attributes.push(AttributeInfo::Other { attribute_name_index, info: vec![high, low, 0] });

	assert_eq!(decode_error(&class.to_bytes()), DecodeError::AttributeLength {
		name: "SourceFile".to_owned(),
		declared: 3,
		consumed: 2,
	});
	Ok(())
}

#[test]
fn this_class_must_be_a_class() -> Result<()> {
	let mut class = ClassFile::new("A", None);
	class.this_class = class.pool.utf8("A");

	assert_eq!(decode_error(&class.to_bytes()), DecodeError::PoolTagMismatch {
		index: class.this_class,
		expected: "Class",
		found: "Utf8",
	});
	Ok(())
}
