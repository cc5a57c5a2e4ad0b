#![allow(dead_code)]

use anyhow::{anyhow, Result};
use boa_engine::{Context, Source};
use raw_class_file::{flags, insn, Asm, ClassFile, ExceptionTableEntry};
use duke::tree::class::ClassName;
use dukejs::{compile, CompileError, MemoryLoader, Options};

pub fn loader(classes: &[&ClassFile]) -> Result<MemoryLoader> {
	let mut loader = MemoryLoader::new();
	for class in classes {
		let bytes = class.to_bytes();
		let name = duke::parse(&bytes)?.name.to_string();
		loader.insert(name, bytes);
	}
	Ok(loader)
}

pub fn compile_with(classes: &[&ClassFile], entry: &str, options: &Options) -> Result<String> {
	let loader = loader(classes)?;
	let mut out = Vec::new();
	compile(&mut out, &[ClassName::from(entry)], &loader, options)?;
	Ok(String::from_utf8(out)?)
}

pub fn compile_classes(classes: &[&ClassFile], entry: &str) -> Result<String> {
	compile_with(classes, entry, &Options::default())
}

pub fn method(class: &mut ClassFile, access: u16, name: &str, descriptor: &str, max_locals: u16, asm: Asm) -> Result<()> {
	method_with_handlers(class, access, name, descriptor, max_locals, asm, vec![])
}

pub fn method_with_handlers(class: &mut ClassFile, access: u16, name: &str, descriptor: &str, max_locals: u16, asm: Asm, exception_table: Vec<ExceptionTableEntry>) -> Result<()> {
	let code = class.code(8, max_locals, asm.finish()?, exception_table);
	class.method(access, name, descriptor, vec![code]);
	Ok(())
}

pub fn static_method(class: &mut ClassFile, name: &str, descriptor: &str, max_locals: u16, asm: Asm) -> Result<()> {
	method(class, flags::ACC_PUBLIC | flags::ACC_STATIC, name, descriptor, max_locals, asm)
}

pub fn compile_error(result: Result<String>) -> CompileError {
	let error = result.expect_err("compiling should fail");
	error.downcast_ref::<CompileError>()
		.cloned()
		.unwrap_or_else(|| panic!("expected a CompileError, got {error:?}"))
}

/// Evaluates the program, and then `expression`, returning the value of the latter converted to a string.
pub fn run(js: &str, expression: &str) -> Result<String> {
	let mut context = Context::default();
	let source = format!("{js}\nString({expression});\n");
	let value = context.eval(Source::from_bytes(&source))
		.map_err(|error| anyhow!("evaluating failed: {error}"))?;
	let string = value.to_string(&mut context)
		.map_err(|error| anyhow!("converting {value:?} to a string failed: {error}"))?;
	Ok(string.to_std_string_escaped())
}

/// An expression calling `call`, and giving the `toString` of the java exception it throws.
pub fn thrown(call: &str) -> String {
	format!("(function() {{ try {{ {call}; return \"nothing thrown\"; }} catch (e) {{ return e.toStringLjava_lang_String(); }} }})()")
}

#[track_caller]
pub fn assert_contains(js: &str, part: &str) {
	assert!(js.contains(part), "expected the output to contain\n{part}\nbut it is\n{js}");
}

#[track_caller]
pub fn assert_not_contains(js: &str, part: &str) {
	assert!(!js.contains(part), "expected the output to not contain\n{part}\nbut it is\n{js}");
}

/// `Main.x = Helper.y + 1` and `Helper.y = 41`, both set by static initializers.
pub fn initializer_classes() -> Result<(ClassFile, ClassFile)> {
	let mut main = ClassFile::new("Main", Some("java/lang/Object"));
	main.field(flags::ACC_STATIC, "x", "I", vec![]);
	let x = main.pool.field_ref("Main", "x", "I");
	let y = main.pool.field_ref("Helper", "y", "I");
	let mut asm = Asm::new();
	asm.op_u16(insn::getstatic, y);
	asm.op(insn::iconst_1);
	asm.op(insn::iadd);
	asm.op_u16(insn::putstatic, x);
	asm.op(insn::r#return);
	static_method(&mut main, "<clinit>", "()V", 0, asm)?;

	let mut helper = ClassFile::new("Helper", Some("java/lang/Object"));
	helper.field(flags::ACC_STATIC, "y", "I", vec![]);
	let y = helper.pool.field_ref("Helper", "y", "I");
	let mut asm = Asm::new();
	asm.bipush(41);
	asm.op_u16(insn::putstatic, y);
	asm.op(insn::r#return);
	static_method(&mut helper, "<clinit>", "()V", 0, asm)?;

	Ok((main, helper))
}
