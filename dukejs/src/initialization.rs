//! The order the static initializers run in.
//!
//! Java runs a static initializer on first use of the class. Here they all run once, right after linking, so a class
//! has to come after the classes its initializer uses: its super class, the classes whose static members it touches,
//! and the classes it creates instances of. Static methods and constructors called on the way are followed.

use std::collections::HashSet;
use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use log::trace;
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::method::Method;
use duke::tree::method::code::Instruction;

/// The classes with a static initializer, in the order these run.
///
/// The classes are visited in the order of `classes`, a cycle is broken at the class reached first.
pub(crate) fn order(classes: &IndexMap<ClassName, ClassFile>) -> Result<Vec<ClassName>> {
	let mut order = Order {
		classes,
		visited_classes: HashSet::new(),
		visited_methods: HashSet::new(),
		out: Vec::new(),
	};
	for name in classes.keys() {
		order.class(name)?;
	}
	Ok(order.out)
}

struct Order<'a> {
	classes: &'a IndexMap<ClassName, ClassFile>,
	visited_classes: HashSet<ClassName>,
	visited_methods: HashSet<(ClassName, String, String)>,
	out: Vec<ClassName>,
}

impl Order<'_> {
	fn class(&mut self, name: &ClassName) -> Result<()> {
		let classes = self.classes;
		let Some(class) = classes.get(name) else { return Ok(()) };
		if !self.visited_classes.insert(name.clone()) {
			return Ok(());
		}

		if let Some(super_class) = &class.super_class {
			self.class(super_class)?;
		}
		if class.method(Method::CLINIT, "()V").is_some() {
			self.method(name, Method::CLINIT, "()V")?;
			trace!("initializer of {name} is number {}", self.out.len());
			self.out.push(name.clone());
		}
		Ok(())
	}

	fn method(&mut self, class_name: &ClassName, name: &str, descriptor: &str) -> Result<()> {
		let classes = self.classes;
		let Some(class) = classes.get(class_name) else { return Ok(()) };
		if !self.visited_methods.insert((class_name.clone(), name.to_owned(), descriptor.to_owned())) {
			return Ok(());
		}
		let Some(code) = class.method(name, descriptor).and_then(|method| method.code.as_ref()) else {
			return Ok(());
		};

		let instructions = code.decode(&class.pool)
			.with_context(|| anyhow!("failed to decode method {class_name}.{name}{descriptor}"))?;
		for insn in instructions {
			match insn.instruction {
				Instruction::GetStatic(field) | Instruction::PutStatic(field) => self.class(&field.class)?,
				Instruction::InvokeStatic(method, _) => {
					self.class(&method.class)?;
					self.method(&method.class, &method.name, &method.descriptor)?;
				},
				Instruction::New(class) => self.class(&class)?,
				Instruction::InvokeSpecial(method, _) if method.name == Method::INIT => {
					self.method(&method.class, &method.name, &method.descriptor)?;
				},
				_ => {},
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod testing {
	use anyhow::Result;
	use indexmap::IndexMap;
	use pretty_assertions::assert_eq;
	use raw_class_file::{flags, insn, Asm, ClassFile};
	use duke::tree::class::ClassName;
	use crate::initialization::order;

	fn initializer(class: &mut ClassFile, asm: Asm) -> Result<()> {
		let code = class.code(4, 0, asm.finish()?, vec![]);
		class.method(flags::ACC_STATIC, "<clinit>", "()V", vec![code]);
		Ok(())
	}

	fn empty_initializer(class: &mut ClassFile) -> Result<()> {
		let mut asm = Asm::new();
		asm.op(insn::r#return);
		initializer(class, asm)
	}

	fn reads(class: &mut ClassFile, owner: &str) -> Result<()> {
		let field = class.pool.field_ref(owner, "x", "I");
		let mut asm = Asm::new();
		asm.op_u16(insn::getstatic, field);
		asm.op(insn::pop);
		asm.op(insn::r#return);
		initializer(class, asm)
	}

	fn order_of(classes: Vec<ClassFile>) -> Result<Vec<String>> {
		let mut map = IndexMap::new();
		for class in classes {
			let class = duke::parse(&class.to_bytes())?;
			map.insert(class.name.clone(), class);
		}
		Ok(order(&map)?.iter().map(ClassName::to_string).collect())
	}

	#[test]
	fn used_classes_first() -> Result<()> {
		let mut main = ClassFile::new("Main", Some("java/lang/Object"));
		reads(&mut main, "Helper")?;
		let mut helper = ClassFile::new("Helper", Some("java/lang/Object"));
		empty_initializer(&mut helper)?;
		let plain = ClassFile::new("Plain", Some("java/lang/Object"));

		assert_eq!(order_of(vec![main, helper, plain])?, vec!["Helper", "Main"]);
		Ok(())
	}

	#[test]
	fn super_classes_first() -> Result<()> {
		let mut sub = ClassFile::new("Sub", Some("Base"));
		empty_initializer(&mut sub)?;
		let mut base = ClassFile::new("Base", Some("java/lang/Object"));
		empty_initializer(&mut base)?;

		assert_eq!(order_of(vec![sub, base])?, vec!["Base", "Sub"]);
		Ok(())
	}

	#[test]
	fn static_methods_are_followed() -> Result<()> {
		let mut main = ClassFile::new("Main", Some("java/lang/Object"));
		let compute = main.pool.method_ref("Util", "compute", "()I");
		let mut asm = Asm::new();
		asm.op_u16(insn::invokestatic, compute);
		asm.op(insn::pop);
		asm.op(insn::r#return);
		initializer(&mut main, asm)?;

		let mut util = ClassFile::new("Util", Some("java/lang/Object"));
		let field = util.pool.field_ref("Helper", "x", "I");
		let mut asm = Asm::new();
		asm.op_u16(insn::getstatic, field);
		asm.op(insn::ireturn);
		let code = util.code(1, 0, asm.finish()?, vec![]);
		util.method(flags::ACC_STATIC, "compute", "()I", vec![code]);

		let mut helper = ClassFile::new("Helper", Some("java/lang/Object"));
		empty_initializer(&mut helper)?;

		assert_eq!(order_of(vec![main, util, helper])?, vec!["Helper", "Main"]);
		Ok(())
	}

	#[test]
	fn cycles_are_broken_where_reached() -> Result<()> {
		let mut a = ClassFile::new("A", Some("java/lang/Object"));
		reads(&mut a, "B")?;
		let mut b = ClassFile::new("B", Some("java/lang/Object"));
		reads(&mut b, "A")?;

		assert_eq!(order_of(vec![a.clone(), b.clone()])?, vec!["B", "A"]);
		assert_eq!(order_of(vec![b, a])?, vec!["A", "B"]);
		Ok(())
	}
}
