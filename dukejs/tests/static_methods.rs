mod common;

use anyhow::Result;
use raw_class_file::{flags, insn, Asm, ClassFile};
use crate::common::{assert_contains, assert_not_contains, compile_classes, initializer_classes, method, static_method};

const CLASS: &str = "org/example/StaticMethod";

fn class() -> Result<ClassFile> {
	let mut class = ClassFile::new(CLASS, Some("java/lang/Object"));

	let mut asm = Asm::new();
	asm.op(insn::iload_0);
	asm.op(insn::iload_1);
	asm.op(insn::iadd);
	asm.op(insn::ireturn);
	static_method(&mut class, "sum", "(II)I", 2, asm)?;

	let mut asm = Asm::new();
	asm.op(insn::fload_0);
	asm.op(insn::fload_0);
	asm.op(insn::fmul);
	asm.op(insn::freturn);
	static_method(&mut class, "power", "(F)F", 1, asm)?;

	let mut asm = Asm::new();
	asm.op(insn::dload_0);
	asm.op(insn::lload_2);
	asm.op(insn::l2d);
	asm.op(insn::dsub);
	asm.op(insn::dreturn);
	static_method(&mut class, "minus", "(DJ)D", 4, asm)?;

	let fact_rec = class.pool.method_ref(CLASS, "factRec", "(I)J");
	let mut asm = Asm::new();
	let recurse = asm.label();
	asm.op(insn::iload_0);
	asm.op(insn::iconst_1);
	asm.branch(insn::if_icmpgt, recurse);
	asm.op(insn::lconst_1);
	asm.op(insn::lreturn);
	asm.bind(recurse);
	asm.op(insn::iload_0);
	asm.op(insn::i2l);
	asm.op(insn::iload_0);
	asm.op(insn::iconst_1);
	asm.op(insn::isub);
	asm.op_u16(insn::invokestatic, fact_rec);
	asm.op(insn::lmul);
	asm.op(insn::lreturn);
	static_method(&mut class, "factRec", "(I)J", 1, asm)?;

	let mut asm = Asm::new();
	let head = asm.label();
	let end = asm.label();
	asm.op(insn::lconst_1);
	asm.op(insn::lstore_1);
	asm.op(insn::iconst_1);
	asm.op(insn::istore_3);
	asm.bind(head);
	asm.op(insn::iload_3);
	asm.op(insn::iload_0);
	asm.branch(insn::if_icmpgt, end);
	asm.op(insn::lload_1);
	asm.op(insn::iload_3);
	asm.op(insn::i2l);
	asm.op(insn::lmul);
	asm.op(insn::lstore_1);
	asm.iinc(3, 1);
	asm.branch(insn::goto, head);
	asm.bind(end);
	asm.op(insn::lload_1);
	asm.op(insn::lreturn);
	static_method(&mut class, "factIter", "(I)J", 4, asm)?;

	let mut asm = Asm::new();
	asm.op(insn::lload_0);
	asm.op(insn::iload_2);
	asm.op(insn::lshl);
	asm.op(insn::lreturn);
	static_method(&mut class, "shiftLeft", "(JI)J", 3, asm)?;

	let mut asm = Asm::new();
	asm.op(insn::iload_0);
	asm.op(insn::iload_1);
	asm.op(insn::iushr);
	asm.op(insn::ireturn);
	static_method(&mut class, "shiftRight", "(II)I", 2, asm)?;

	let mut asm = Asm::new();
	asm.op(insn::aconst_null);
	asm.op(insn::areturn);
	static_method(&mut class, "none", "(II)Ljava/lang/Object;", 2, asm)?;

	Ok(class)
}

#[test]
fn sum() -> Result<()> {
	let js = compile_classes(&[&class()?], CLASS)?;

	assert_contains(&js, "\
function org_example_StaticMethod_sumIII(lc0, lc1) {
	lc0 = lc0 | 0;
	lc1 = lc1 | 0;
	var si0, si1;
	si0 = lc0;
	si1 = lc1;
	si0 = (si0 + si1) | 0;
	return si0;
}
");
	Ok(())
}

#[test]
fn floats_and_doubles() -> Result<()> {
	let js = compile_classes(&[&class()?], CLASS)?;

	assert_contains(&js, "function org_example_StaticMethod_powerFF(lc0) {");
	assert_contains(&js, "lc0 = Math.fround(lc0);");
	assert_contains(&js, "sf0 = Math.fround(sf0 * sf1);");

	assert_contains(&js, "function org_example_StaticMethod_minusDDJ(lc0, lc2) {");
	assert_contains(&js, "lc2 = $vm.toLong(lc2);");
	assert_contains(&js, "sd1 = Number(sl1);");
	assert_contains(&js, "sd0 = sd0 - sd1;");
	Ok(())
}

#[test]
fn factorial() -> Result<()> {
	let js = compile_classes(&[&class()?], CLASS)?;

	assert_contains(&js, "function org_example_StaticMethod_factRecJI(lc0) {");
	assert_contains(&js, "if (si0 > si1) {");
	assert_contains(&js, "sl1 = org_example_StaticMethod_factRecJI(si1);");
	assert_contains(&js, "sl0 = BigInt.asIntN(64, sl0 * sl1);");
	assert_contains(&js, "sl0 = 1n;");

	assert_contains(&js, "function org_example_StaticMethod_factIterJI(lc0) {");
	assert_contains(&js, "var lc1, lc3, si0, si1, sl0, sl1;");
	assert_contains(&js, "L4: while (true) {");
	assert_contains(&js, "lc3 = (lc3 + 1) | 0;");
	assert_contains(&js, "continue L4;");
	Ok(())
}

#[test]
fn shifts() -> Result<()> {
	let js = compile_classes(&[&class()?], CLASS)?;

	assert_contains(&js, "function org_example_StaticMethod_shiftLeftJJI(lc0, lc2) {");
	assert_contains(&js, "sl0 = BigInt.asIntN(64, sl0 << BigInt(si1 & 63));");
	assert_contains(&js, "function org_example_StaticMethod_shiftRightIII(lc0, lc1) {");
	assert_contains(&js, "si0 = (si0 >>> si1) | 0;");
	Ok(())
}

#[test]
fn object_return_type() -> Result<()> {
	let js = compile_classes(&[&class()?], CLASS)?;

	assert_contains(&js, "function org_example_StaticMethod_noneLjava_lang_ObjectII(lc0, lc1) {");
	assert_contains(&js, "sa0 = null;");
	Ok(())
}

#[test]
fn class_layout() -> Result<()> {
	let js = compile_classes(&[&class()?], CLASS)?;

	assert_contains(&js, "\
// org/example/StaticMethod
function org_example_StaticMethod() {
	java_lang_Object.call(this);
}
$vm.defineClass(org_example_StaticMethod, \"org/example/StaticMethod\", java_lang_Object, [], false);
");
	assert!(js.ends_with("$vm.link();\n"), "{js}");

	// the runtime is only what's used
	assert_contains(&js, "// class model");
	assert_contains(&js, "// longs");
	assert_not_contains(&js, "// arithmetic");
	assert_not_contains(&js, "// arrays");
	assert_not_contains(&js, "// type checks");
	Ok(())
}

#[test]
fn instance_fields_and_methods() -> Result<()> {
	let mut class = ClassFile::new("org/example/Point", Some("java/lang/Object"));
	class.field(flags::ACC_PRIVATE, "x", "I", vec![]);
	let object_init = class.pool.method_ref("java/lang/Object", "<init>", "()V");
	let x = class.pool.field_ref("org/example/Point", "x", "I");

	let mut asm = Asm::new();
	asm.op(insn::aload_0);
	asm.op_u16(insn::invokespecial, object_init);
	asm.op(insn::aload_0);
	asm.op(insn::iload_1);
	asm.op_u16(insn::putfield, x);
	asm.op(insn::r#return);
	method(&mut class, flags::ACC_PUBLIC, "<init>", "(I)V", 2, asm)?;

	let mut asm = Asm::new();
	asm.op(insn::aload_0);
	asm.op_u16(insn::getfield, x);
	asm.op(insn::ireturn);
	method(&mut class, flags::ACC_PUBLIC, "getX", "()I", 1, asm)?;

	let js = compile_classes(&[&class], "org/example/Point")?;

	assert_contains(&js, "\
function org_example_Point() {
	java_lang_Object.call(this);
	this.fld_x = 0;
}
");
	assert_contains(&js, "org_example_Point.prototype.consVI = function(lc1) {\n\tvar lc0 = this;\n");
	assert_contains(&js, "java_lang_Object.prototype.consV.call(sa0);");
	assert_contains(&js, "$vm.nn(sa0).fld_x = si1;");
	assert_contains(&js, "org_example_Point.prototype.getXI = function() {");
	assert_contains(&js, "si0 = $vm.nn(sa0).fld_x;");
	assert_contains(&js, "// null checks");
	Ok(())
}

#[test]
fn static_initializers_run_after_linking() -> Result<()> {
	let mut class = ClassFile::new("org/example/Init", Some("java/lang/Object"));
	class.field(flags::ACC_STATIC, "x", "I", vec![]);
	class.field(flags::ACC_STATIC, "y", "J", vec![]);
	let x = class.pool.field_ref("org/example/Init", "x", "I");

	let mut asm = Asm::new();
	asm.bipush(42);
	asm.op_u16(insn::putstatic, x);
	asm.op(insn::r#return);
	static_method(&mut class, "<clinit>", "()V", 0, asm)?;

	let js = compile_classes(&[&class], "org/example/Init")?;

	assert_contains(&js, "org_example_Init.fld_x = 0;\norg_example_Init.fld_y = 0n;\n");
	assert_contains(&js, "org_example_Init.fld_x = si0;");
	assert!(js.ends_with("$vm.link();\norg_example_Init_clinitV();\n"), "{js}");
	Ok(())
}

#[test]
fn static_initializers_run_after_the_ones_they_use() -> Result<()> {
	let (main, helper) = initializer_classes()?;
	let js = compile_classes(&[&main, &helper], "Main")?;

	assert_contains(&js, "si0 = Helper.fld_y;");
	assert!(js.ends_with("$vm.link();\nHelper_clinitV();\nMain_clinitV();\n"), "{js}");
	Ok(())
}
