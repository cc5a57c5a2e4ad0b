//! Translates the bytecode of one method into a javascript function.
//!
//! The operand stack is turned into variables: the value at depth `n` of kind `k` lives in `s{k}{n}`, so `si0` is an
//! int at the bottom of the stack. Local variable `n` lives in `lc{n}`. Every instruction becomes at most a few
//! statements on these variables, and the blocks are then put back together by [`crate::structure`].
//!
//! Values are represented as follows:
//! - `int`, `short`, `char`, `byte`, `boolean`: numbers kept in the 32-bit range by `| 0` and friends
//! - `long`: `BigInt`s, kept in the 64-bit range by `BigInt.asIntN`
//! - `float`: numbers rounded by `Math.fround`
//! - `double`: numbers
//! - references: objects, javascript strings, or `null`

use std::collections::BTreeSet;
use anyhow::{anyhow, Context, Result};
use log::trace;
use java_string::JavaStr;
use duke::tree::class::{ClassFile, ClassName};
use duke::tree::descriptor::{MethodDescriptor, Type};
use duke::tree::field::FieldRef;
use duke::tree::method::{Method, MethodRef};
use duke::tree::method::code::{Insn, Instruction, Loadable};
use crate::cfg::ControlFlow;
use crate::error::CompileError;
use crate::hierarchy::Hierarchy;
use crate::js::{self, Js};
use crate::mangle;
use crate::runtime::{self, Feature, Features};
use crate::structure;

/// What a stack slot or local variable holds, as far as javascript is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Kind {
	Int,
	Long,
	Float,
	Double,
	Reference,
}

impl Kind {
	pub(crate) fn of(t: &Type) -> Kind {
		match t {
			Type::B | Type::C | Type::I | Type::S | Type::Z => Kind::Int,
			Type::J => Kind::Long,
			Type::F => Kind::Float,
			Type::D => Kind::Double,
			Type::Object(_) | Type::Array(_) => Kind::Reference,
		}
	}

	fn letter(self) -> char {
		match self {
			Kind::Int => 'i',
			Kind::Long => 'l',
			Kind::Float => 'f',
			Kind::Double => 'd',
			Kind::Reference => 'a',
		}
	}

	fn is_wide(self) -> bool {
		matches!(self, Kind::Long | Kind::Double)
	}

	/// The value of a field that was never assigned.
	pub(crate) fn default_value(self) -> &'static str {
		match self {
			Kind::Int | Kind::Float | Kind::Double => "0",
			Kind::Long => "0n",
			Kind::Reference => "null",
		}
	}
}

pub(crate) fn stack_var(depth: usize, kind: Kind) -> String {
	format!("s{}{depth}", kind.letter())
}

/// How a block is left, apart from exceptions.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Exit {
	Goto(u16),
	If {
		condition: String,
		target: u16,
		otherwise: u16,
	},
	Switch {
		key: String,
		cases: Vec<(i32, u16)>,
		default: u16,
	},
	Return(Option<String>),
	/// The statements already end in a `throw`.
	Throw,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BlockCode {
	pub(crate) statements: Vec<String>,
	pub(crate) exit: Exit,
}

/// Quotes a class name for use in the runtime calls.
pub(crate) fn class_literal(class: &str) -> String {
	js::string_literal(JavaStr::from_str(class))
}

/// Translates a method with code into a javascript function.
///
/// Static methods become a global function named by [`mangle::static_method`], instance methods are assigned to the
/// prototype of the class under [`mangle::method_name`].
pub fn translate_method(class: &ClassFile, method: &Method, hierarchy: &Hierarchy, features: &mut Features) -> Result<String> {
	let code = method.code.as_ref()
		.with_context(|| anyhow!("method {}{} has no code", method.name, method.descriptor))?;
	let insns = code.decode(&class.pool)?;
	let cfg = ControlFlow::build(&insns, &code.exception_table, code.bytecode.len())?;
	let descriptor = MethodDescriptor::parse(&method.descriptor)?;

	let mut translator = Translator {
		class,
		method,
		hierarchy,
		features,
		stack: Vec::new(),
		statements: Vec::new(),
		offset: 0,
		stack_vars: BTreeSet::new(),
		locals: BTreeSet::new(),
		temps: 0,
	};
	let blocks = translator.blocks(&cfg, &insns)?;

	let is_static = method.access.is_static;
	let mut parameters = Vec::new();
	let mut slot = if is_static { 0 } else { 1 };
	for parameter in &descriptor.parameters {
		parameters.push((slot, parameter));
		slot += if parameter.is_wide() { 2 } else { 1 };
	}
	let names: Vec<String> = parameters.iter().map(|(slot, _)| format!("lc{slot}")).collect();

	let mut js = Js::new();
	let class_name = mangle::class_name(class.name.as_str());
	if is_static {
		js.open(format!("function {}({}) {{", mangle::static_method(class.name.as_str(), &method.name, &method.descriptor)?, names.join(", ")));
	} else {
		js.open(format!("{class_name}.prototype.{} = function({}) {{", mangle::method_name(&method.name, &method.descriptor)?, names.join(", ")));
		js.line("var lc0 = this;");
	}

	for ((_, parameter), name) in parameters.iter().zip(&names) {
		match parameter {
			Type::B | Type::C | Type::I | Type::S | Type::Z => js.line(format!("{name} = {name} | 0;")),
			Type::F => js.line(format!("{name} = Math.fround({name});")),
			Type::J => {
				translator.features.insert(Feature::Longs);
				js.line(format!("{name} = $vm.toLong({name});"));
			},
			_ => {},
		}
	}

	let mut vars = Vec::new();
	for &local in &translator.locals {
		let is_parameter = parameters.iter().any(|&(slot, _)| slot == local);
		if !is_parameter && (is_static || local != 0) {
			vars.push(format!("lc{local}"));
		}
	}
	vars.extend(translator.stack_vars.iter().map(|&(kind, depth)| stack_var(depth, kind)));
	vars.extend((0..translator.temps).map(|temp| format!("$t{temp}")));
	if !vars.is_empty() {
		js.line(format!("var {};", vars.join(", ")));
	}

	structure::emit(&mut js, &cfg, &blocks)?;

	js.close(if is_static { "}" } else { "};" });

	trace!("translated {}.{}{} into {} blocks", class.name, method.name, method.descriptor, cfg.blocks.len());
	Ok(js.finish())
}

struct Translator<'a> {
	class: &'a ClassFile,
	method: &'a Method,
	hierarchy: &'a Hierarchy<'a>,
	features: &'a mut Features,

	stack: Vec<Kind>,
	statements: Vec<String>,
	/// The offset of the instruction being translated.
	offset: u16,

	stack_vars: BTreeSet<(Kind, usize)>,
	locals: BTreeSet<u16>,
	temps: usize,
}

impl Translator<'_> {
	/// Translates all reachable blocks, following the stack from the entry.
	fn blocks(&mut self, cfg: &ControlFlow, insns: &[Insn]) -> Result<Vec<Option<BlockCode>>> {
		let mut entries: Vec<Option<Vec<Kind>>> = vec![None; cfg.blocks.len()];
		let mut code: Vec<Option<BlockCode>> = (0..cfg.blocks.len()).map(|_| None).collect();

		entries[cfg.entry()] = Some(Vec::new());
		let mut queue = vec![cfg.entry()];
		while let Some(index) = queue.pop() {
			let Some(entry) = entries[index].clone() else { continue };
			let (block, exit_stack) = self.block(cfg, insns, index, entry)?;

			for &successor in &cfg.successors[index] {
				merge(cfg, &mut entries, &mut queue, successor, &exit_stack)?;
			}
			for handler in &cfg.handlers[index] {
				self.features.insert(Feature::Exceptions);
				if handler.catch.is_some() {
					self.features.insert(Feature::TypeChecks);
				}
				self.stack_vars.insert((Kind::Reference, 0));
				merge(cfg, &mut entries, &mut queue, handler.target, &[Kind::Reference])?;
			}

			code[index] = Some(block);
		}

		Ok(code)
	}

	fn block(&mut self, cfg: &ControlFlow, insns: &[Insn], index: usize, entry: Vec<Kind>) -> Result<(BlockCode, Vec<Kind>)> {
		let block = &cfg.blocks[index];
		self.stack = entry;

		let mut exit = None;
		for insn in &insns[block.insns.clone()] {
			self.offset = insn.offset;
			exit = self.instruction(insn, block.end)?;
		}

		let code = BlockCode {
			statements: std::mem::take(&mut self.statements),
			exit: exit.unwrap_or(Exit::Goto(block.end)),
		};
		Ok((code, std::mem::take(&mut self.stack)))
	}

	fn malformed(&self, reason: impl Into<String>) -> anyhow::Error {
		CompileError::control_flow(self.offset, reason).into()
	}

	fn unsupported(&self, insn: &Insn) -> anyhow::Error {
		CompileError::UnsupportedInstruction {
			class: self.class.name.to_string(),
			method: self.method.name.clone(),
			offset: insn.offset,
			opcode: insn.opcode,
		}.into()
	}

	fn missing_member(&self, class: &ClassName, member: String) -> anyhow::Error {
		CompileError::MissingDependency {
			class: class.to_string(),
			member: Some(member),
			referenced_from: Some(self.class.name.to_string()),
		}.into()
	}

	/// Fails if the lookup of a method starting at `referenced` stopped at the builtin class `owner`, and that doesn't
	/// have it.
	///
	/// An abstract class or one with an interface declaring the method may still get it from the actual receiver.
	fn check_method(&self, referenced: &ClassName, owner: &ClassName, name: &str, descriptor: &str) -> Result<()> {
		if self.hierarchy.class(owner.as_str()).is_some() || runtime::builtin_has_method(owner.as_str(), name, descriptor) != Some(false) {
			return Ok(());
		}
		if let Some(file) = self.hierarchy.class(referenced.as_str()) {
			if file.access.is_abstract || file.access.is_interface || self.hierarchy.interface_declares(referenced, name, descriptor) {
				return Ok(());
			}
		}
		Err(self.missing_member(owner, format!("{name}{descriptor}")))
	}

	/// Builtin classes have no fields and no static methods, so using one of these on them fails.
	fn check_not_builtin(&self, owner: &ClassName, member: String) -> Result<()> {
		if self.hierarchy.class(owner.as_str()).is_none() && runtime::builtin_feature(owner.as_str()).is_some() {
			return Err(self.missing_member(owner, member));
		}
		Ok(())
	}

	fn emit(&mut self, statement: String) {
		self.statements.push(statement);
	}

	fn push(&mut self, kind: Kind) -> String {
		let depth = self.stack.len();
		self.stack.push(kind);
		self.stack_vars.insert((kind, depth));
		stack_var(depth, kind)
	}

	fn push_expr(&mut self, kind: Kind, expr: String) {
		let var = self.push(kind);
		self.emit(format!("{var} = {expr};"));
	}

	fn pop_any(&mut self) -> Result<(Kind, String)> {
		let kind = self.stack.pop()
			.ok_or_else(|| self.malformed("stack underflow"))?;
		Ok((kind, stack_var(self.stack.len(), kind)))
	}

	fn pop(&mut self, kind: Kind) -> Result<String> {
		let (found, var) = self.pop_any()?;
		if found != kind {
			return Err(self.malformed(format!("expected {kind:?} on the stack, found {found:?}")));
		}
		Ok(var)
	}

	/// Pops values making up exactly `words` stack words, and returns them bottom first.
	fn pop_words(&mut self, words: usize) -> Result<Vec<(Kind, String)>> {
		let mut values = Vec::new();
		let mut taken = 0;
		while taken < words {
			let (kind, var) = self.pop_any()?;
			taken += if kind.is_wide() { 2 } else { 1 };
			values.push((kind, var));
		}
		if taken != words {
			return Err(self.malformed("instruction splits a long or double"));
		}
		values.reverse();
		Ok(values)
	}

	fn local(&mut self, index: u16) -> String {
		self.locals.insert(index);
		format!("lc{index}")
	}

	fn load(&mut self, kind: Kind, index: u16) {
		let local = self.local(index);
		self.push_expr(kind, local);
	}

	fn store(&mut self, kind: Kind, index: u16) -> Result<()> {
		let value = self.pop(kind)?;
		let local = self.local(index);
		self.emit(format!("{local} = {value};"));
		Ok(())
	}

	fn binary(&mut self, kind: Kind, f: impl FnOnce(&str, &str) -> String) -> Result<()> {
		let b = self.pop(kind)?;
		let a = self.pop(kind)?;
		self.push_expr(kind, f(&a, &b));
		Ok(())
	}

	fn unary(&mut self, from: Kind, to: Kind, f: impl FnOnce(&str) -> String) -> Result<()> {
		let a = self.pop(from)?;
		self.push_expr(to, f(&a));
		Ok(())
	}

	/// A shift of an int or long by an int.
	fn shift(&mut self, kind: Kind, f: impl FnOnce(&str, &str) -> String) -> Result<()> {
		let b = self.pop(Kind::Int)?;
		let a = self.pop(kind)?;
		self.push_expr(kind, f(&a, &b));
		Ok(())
	}

	fn compare(&mut self, kind: Kind, function: &str) -> Result<()> {
		self.features.insert(Feature::Compares);
		let b = self.pop(kind)?;
		let a = self.pop(kind)?;
		self.push_expr(Kind::Int, format!("$vm.{function}({a}, {b})"));
		Ok(())
	}

	fn if_zero(&mut self, operator: &str, target: u16, otherwise: u16) -> Result<Option<Exit>> {
		let a = self.pop(Kind::Int)?;
		Ok(Some(Exit::If { condition: format!("{a} {operator} 0"), target, otherwise }))
	}

	fn if_compare(&mut self, kind: Kind, operator: &str, target: u16, otherwise: u16) -> Result<Option<Exit>> {
		let b = self.pop(kind)?;
		let a = self.pop(kind)?;
		Ok(Some(Exit::If { condition: format!("{a} {operator} {b}"), target, otherwise }))
	}

	fn if_null(&mut self, operator: &str, target: u16, otherwise: u16) -> Result<Option<Exit>> {
		let a = self.pop(Kind::Reference)?;
		Ok(Some(Exit::If { condition: format!("{a} {operator} null"), target, otherwise }))
	}

	fn array_load(&mut self, kind: Kind) -> Result<()> {
		self.features.insert(Feature::Arrays);
		let index = self.pop(Kind::Int)?;
		let array = self.pop(Kind::Reference)?;
		self.push_expr(kind, format!("$vm.aget({array}, {index})"));
		Ok(())
	}

	fn array_store(&mut self, kind: Kind, function: &str, value: impl FnOnce(&str) -> String) -> Result<()> {
		self.features.insert(Feature::Arrays);
		let v = self.pop(kind)?;
		let index = self.pop(Kind::Int)?;
		let array = self.pop(Kind::Reference)?;
		self.emit(format!("$vm.{function}({array}, {index}, {});", value(&v)));
		Ok(())
	}

	/// Pops `top` and then `under` words, and pushes back the top values, the under values, and if `duplicate` the top
	/// values again. This covers `swap` and the `dup` family.
	fn shuffle(&mut self, top: usize, under: usize, duplicate: bool) -> Result<()> {
		let top = self.pop_words(top)?;
		let under = self.pop_words(under)?;

		if under.is_empty() && duplicate {
			for (kind, _) in &top {
				self.push(*kind);
			}
			for (kind, var) in &top {
				self.push_expr(*kind, var.clone());
			}
			return Ok(());
		}

		let mut temps = Vec::new();
		for (index, (kind, var)) in under.iter().chain(&top).enumerate() {
			let temp = format!("$t{index}");
			self.emit(format!("{temp} = {var};"));
			temps.push((*kind, temp));
		}
		self.temps = self.temps.max(temps.len());

		let (under, top) = temps.split_at(under.len());
		let order: Vec<&(Kind, String)> = if duplicate {
			top.iter().chain(under).chain(top).collect()
		} else {
			top.iter().chain(under).collect()
		};
		for (kind, temp) in order {
			self.push_expr(*kind, temp.clone());
		}
		Ok(())
	}

	fn ldc(&mut self, insn: &Insn, loadable: &Loadable) -> Result<()> {
		match loadable {
			Loadable::Integer(v) => self.push_expr(Kind::Int, v.to_string()),
			Loadable::Float(v) => self.push_expr(Kind::Float, js::float_literal(*v)),
			Loadable::Long(v) => self.push_expr(Kind::Long, js::long_literal(*v)),
			Loadable::Double(v) => self.push_expr(Kind::Double, js::double_literal(*v)),
			Loadable::String(v) => self.push_expr(Kind::Reference, js::string_literal(v)),
			Loadable::Class(class) => {
				self.features.insert(Feature::ClassLiterals);
				self.push_expr(Kind::Reference, format!("$vm.classOf({})", class_literal(class.as_str())));
			},
			Loadable::MethodHandle(_) | Loadable::MethodType(_) | Loadable::Dynamic(_) => return Err(self.unsupported(insn)),
		}
		Ok(())
	}

	fn field_kind(field: &FieldRef) -> Result<Kind> {
		Ok(Kind::of(&Type::parse(&field.descriptor)?))
	}

	fn static_field(&self, field: &FieldRef) -> Result<String> {
		let owner = self.hierarchy.resolve_field(&field.class, &field.name);
		self.check_not_builtin(&owner, format!("{}:{}", field.name, field.descriptor))?;
		Ok(format!("{}.{}", mangle::class_name(owner.as_str()), mangle::field_name(&field.name)))
	}

	fn instance_field(&self, field: &FieldRef) -> Result<String> {
		let owner = self.hierarchy.resolve_field(&field.class, &field.name);
		self.check_not_builtin(&owner, format!("{}:{}", field.name, field.descriptor))?;
		Ok(self.hierarchy.instance_field_name(&owner, &field.name))
	}

	fn arguments(&mut self, descriptor: &MethodDescriptor) -> Result<Vec<String>> {
		let mut arguments = Vec::with_capacity(descriptor.parameters.len());
		for parameter in descriptor.parameters.iter().rev() {
			arguments.push(self.pop(Kind::of(parameter))?);
		}
		arguments.reverse();
		Ok(arguments)
	}

	fn call(&mut self, descriptor: &MethodDescriptor, call: String) {
		match &descriptor.return_type {
			Some(return_type) => self.push_expr(Kind::of(return_type), call),
			None => self.emit(format!("{call};")),
		}
	}

	fn invoke_virtual(&mut self, method: &MethodRef) -> Result<()> {
		let descriptor = MethodDescriptor::parse(&method.descriptor)?;
		let arguments = self.arguments(&descriptor)?;
		let receiver = self.pop(Kind::Reference)?;
		let name = mangle::method_name(&method.name, &method.descriptor)?;

		if method.class.is_array() {
			if method.name != "clone" {
				let object = ClassName::from("java/lang/Object");
				self.check_method(&object, &object, &method.name, &method.descriptor)?;
			}
		} else {
			let owner = self.hierarchy.resolve_method(&method.class, &method.name, &method.descriptor);
			self.check_method(&method.class, &owner, &method.name, &method.descriptor)?;
		}

		if method.name == "getClass" && method.descriptor == "()Ljava/lang/Class;" {
			self.features.insert(Feature::ClassLiterals);
		}

		let call = if method.class.is_array() && method.name == "clone" {
			self.features.insert(Feature::Arrays);
			format!("$vm.aclone({receiver})")
		} else if method.class.is_array() {
			// arrays are javascript arrays, so the methods of Object are called directly
			self.features.insert(Feature::NullChecks);
			let receiver = format!("$vm.nn({receiver})");
			let all: Vec<&str> = std::iter::once(receiver.as_str()).chain(arguments.iter().map(String::as_str)).collect();
			format!("java_lang_Object.prototype.{name}.call({})", all.join(", "))
		} else {
			self.features.insert(Feature::NullChecks);
			format!("$vm.nn({receiver}).{name}({})", arguments.join(", "))
		};
		self.call(&descriptor, call);
		Ok(())
	}

	fn invoke_special(&mut self, method: &MethodRef) -> Result<()> {
		let descriptor = MethodDescriptor::parse(&method.descriptor)?;
		let arguments = self.arguments(&descriptor)?;
		let receiver = self.pop(Kind::Reference)?;
		let name = mangle::method_name(&method.name, &method.descriptor)?;
		let owner = self.hierarchy.resolve_method(&method.class, &method.name, &method.descriptor);
		self.check_method(&method.class, &owner, &method.name, &method.descriptor)?;

		let receiver = if method.name == Method::INIT {
			receiver
		} else {
			self.features.insert(Feature::NullChecks);
			format!("$vm.nn({receiver})")
		};
		let all: Vec<&str> = std::iter::once(receiver.as_str()).chain(arguments.iter().map(String::as_str)).collect();
		let call = format!("{}.prototype.{name}.call({})", mangle::class_name(owner.as_str()), all.join(", "));
		self.call(&descriptor, call);
		Ok(())
	}

	fn invoke_static(&mut self, method: &MethodRef) -> Result<()> {
		let descriptor = MethodDescriptor::parse(&method.descriptor)?;
		let arguments = self.arguments(&descriptor)?;
		let owner = self.hierarchy.resolve_method(&method.class, &method.name, &method.descriptor);
		self.check_not_builtin(&owner, format!("{}{}", method.name, method.descriptor))?;
		let call = format!("{}({})", mangle::static_method(owner.as_str(), &method.name, &method.descriptor)?, arguments.join(", "));
		self.call(&descriptor, call);
		Ok(())
	}

	fn array_descriptor(class: &ClassName) -> String {
		if class.is_array() {
			format!("[{class}")
		} else {
			format!("[L{class};")
		}
	}

	/// Translates one instruction, returning how the block is left if it's a branch or terminator.
	///
	/// `next` is the offset of the following instruction.
	fn instruction(&mut self, insn: &Insn, next: u16) -> Result<Option<Exit>> {
		use Instruction::*;
		use Kind::{Int, Long, Float, Double, Reference};

		match &insn.instruction {
			Nop => {},
			AConstNull => self.push_expr(Reference, "null".to_owned()),
			IConstM1 => self.push_expr(Int, "-1".to_owned()),
			IConst0 => self.push_expr(Int, "0".to_owned()),
			IConst1 => self.push_expr(Int, "1".to_owned()),
			IConst2 => self.push_expr(Int, "2".to_owned()),
			IConst3 => self.push_expr(Int, "3".to_owned()),
			IConst4 => self.push_expr(Int, "4".to_owned()),
			IConst5 => self.push_expr(Int, "5".to_owned()),
			LConst0 => self.push_expr(Long, "0n".to_owned()),
			LConst1 => self.push_expr(Long, "1n".to_owned()),
			FConst0 => self.push_expr(Float, "0".to_owned()),
			FConst1 => self.push_expr(Float, "1".to_owned()),
			FConst2 => self.push_expr(Float, "2".to_owned()),
			DConst0 => self.push_expr(Double, "0".to_owned()),
			DConst1 => self.push_expr(Double, "1".to_owned()),
			BiPush(v) => self.push_expr(Int, v.to_string()),
			SiPush(v) => self.push_expr(Int, v.to_string()),
			Ldc(loadable) => self.ldc(insn, loadable)?,

			ILoad(lv) => self.load(Int, lv.index),
			LLoad(lv) => self.load(Long, lv.index),
			FLoad(lv) => self.load(Float, lv.index),
			DLoad(lv) => self.load(Double, lv.index),
			ALoad(lv) => self.load(Reference, lv.index),
			IStore(lv) => self.store(Int, lv.index)?,
			LStore(lv) => self.store(Long, lv.index)?,
			FStore(lv) => self.store(Float, lv.index)?,
			DStore(lv) => self.store(Double, lv.index)?,
			AStore(lv) => self.store(Reference, lv.index)?,

			IALoad | BALoad | CALoad | SALoad => self.array_load(Int)?,
			LALoad => self.array_load(Long)?,
			FALoad => self.array_load(Float)?,
			DALoad => self.array_load(Double)?,
			AALoad => self.array_load(Reference)?,
			IAStore => self.array_store(Int, "aput", str::to_owned)?,
			LAStore => self.array_store(Long, "aput", str::to_owned)?,
			FAStore => self.array_store(Float, "aput", str::to_owned)?,
			DAStore => self.array_store(Double, "aput", str::to_owned)?,
			AAStore => self.array_store(Reference, "aaput", str::to_owned)?,
			BAStore => self.array_store(Int, "baput", str::to_owned)?,
			CAStore => self.array_store(Int, "aput", |v| format!("{v} & 65535"))?,
			SAStore => self.array_store(Int, "aput", |v| format!("({v} << 16) >> 16"))?,

			Pop => {
				let (kind, _) = self.pop_any()?;
				if kind.is_wide() {
					return Err(self.malformed("pop of a long or double"));
				}
			},
			Pop2 => {
				self.pop_words(2)?;
			},
			Dup => self.shuffle(1, 0, true)?,
			DupX1 => self.shuffle(1, 1, true)?,
			DupX2 => self.shuffle(1, 2, true)?,
			Dup2 => self.shuffle(2, 0, true)?,
			Dup2X1 => self.shuffle(2, 1, true)?,
			Dup2X2 => self.shuffle(2, 2, true)?,
			Swap => self.shuffle(1, 1, false)?,

			IAdd => self.binary(Int, |a, b| format!("({a} + {b}) | 0"))?,
			ISub => self.binary(Int, |a, b| format!("({a} - {b}) | 0"))?,
			IMul => self.binary(Int, |a, b| format!("Math.imul({a}, {b})"))?,
			IDiv | IRem => {
				self.features.insert(Feature::Arithmetic);
				let function = if matches!(insn.instruction, IDiv) { "idiv" } else { "irem" };
				self.binary(Int, |a, b| format!("$vm.{function}({a}, {b})"))?;
			},
			INeg => self.unary(Int, Int, |a| format!("(-{a}) | 0"))?,
			IShl => self.shift(Int, |a, b| format!("{a} << {b}"))?,
			IShr => self.shift(Int, |a, b| format!("{a} >> {b}"))?,
			IUShr => self.shift(Int, |a, b| format!("({a} >>> {b}) | 0"))?,
			IAnd => self.binary(Int, |a, b| format!("{a} & {b}"))?,
			IOr => self.binary(Int, |a, b| format!("{a} | {b}"))?,
			IXor => self.binary(Int, |a, b| format!("{a} ^ {b}"))?,
			IInc(lv, delta) => {
				let local = self.local(lv.index);
				self.emit(format!("{local} = ({local} + {delta}) | 0;"));
			},

			LAdd => self.binary(Long, |a, b| format!("BigInt.asIntN(64, {a} + {b})"))?,
			LSub => self.binary(Long, |a, b| format!("BigInt.asIntN(64, {a} - {b})"))?,
			LMul => self.binary(Long, |a, b| format!("BigInt.asIntN(64, {a} * {b})"))?,
			LDiv | LRem => {
				self.features.insert(Feature::Arithmetic);
				let function = if matches!(insn.instruction, LDiv) { "ldiv" } else { "lrem" };
				self.binary(Long, |a, b| format!("$vm.{function}({a}, {b})"))?;
			},
			LNeg => self.unary(Long, Long, |a| format!("BigInt.asIntN(64, -{a})"))?,
			LShl => self.shift(Long, |a, b| format!("BigInt.asIntN(64, {a} << BigInt({b} & 63))"))?,
			LShr => self.shift(Long, |a, b| format!("{a} >> BigInt({b} & 63)"))?,
			LUShr => self.shift(Long, |a, b| format!("BigInt.asIntN(64, BigInt.asUintN(64, {a}) >> BigInt({b} & 63))"))?,
			LAnd => self.binary(Long, |a, b| format!("{a} & {b}"))?,
			LOr => self.binary(Long, |a, b| format!("{a} | {b}"))?,
			LXor => self.binary(Long, |a, b| format!("{a} ^ {b}"))?,

			FAdd => self.binary(Float, |a, b| format!("Math.fround({a} + {b})"))?,
			FSub => self.binary(Float, |a, b| format!("Math.fround({a} - {b})"))?,
			FMul => self.binary(Float, |a, b| format!("Math.fround({a} * {b})"))?,
			FDiv => self.binary(Float, |a, b| format!("Math.fround({a} / {b})"))?,
			FRem => self.binary(Float, |a, b| format!("Math.fround({a} % {b})"))?,
			FNeg => self.unary(Float, Float, |a| format!("-{a}"))?,
			DAdd => self.binary(Double, |a, b| format!("{a} + {b}"))?,
			DSub => self.binary(Double, |a, b| format!("{a} - {b}"))?,
			DMul => self.binary(Double, |a, b| format!("{a} * {b}"))?,
			DDiv => self.binary(Double, |a, b| format!("{a} / {b}"))?,
			DRem => self.binary(Double, |a, b| format!("{a} % {b}"))?,
			DNeg => self.unary(Double, Double, |a| format!("-{a}"))?,

			I2L => self.unary(Int, Long, |a| format!("BigInt({a})"))?,
			I2F => self.unary(Int, Float, |a| format!("Math.fround({a})"))?,
			I2D => self.unary(Int, Double, str::to_owned)?,
			L2I => self.unary(Long, Int, |a| format!("Number(BigInt.asIntN(32, {a}))"))?,
			L2F => self.unary(Long, Float, |a| format!("Math.fround(Number({a}))"))?,
			L2D => self.unary(Long, Double, |a| format!("Number({a})"))?,
			F2D => self.unary(Float, Double, str::to_owned)?,
			D2F => self.unary(Double, Float, |a| format!("Math.fround({a})"))?,
			F2I | D2I => {
				self.features.insert(Feature::Conversions);
				let from = if matches!(insn.instruction, F2I) { Float } else { Double };
				self.unary(from, Int, |a| format!("$vm.d2i({a})"))?;
			},
			F2L | D2L => {
				self.features.insert(Feature::Conversions);
				let from = if matches!(insn.instruction, F2L) { Float } else { Double };
				self.unary(from, Long, |a| format!("$vm.d2l({a})"))?;
			},
			I2B => self.unary(Int, Int, |a| format!("({a} << 24) >> 24"))?,
			I2C => self.unary(Int, Int, |a| format!("{a} & 65535"))?,
			I2S => self.unary(Int, Int, |a| format!("({a} << 16) >> 16"))?,

			LCmp => self.compare(Long, "cmp")?,
			FCmpL => self.compare(Float, "cmpl")?,
			FCmpG => self.compare(Float, "cmpg")?,
			DCmpL => self.compare(Double, "cmpl")?,
			DCmpG => self.compare(Double, "cmpg")?,

			IfEq(target) => return self.if_zero("==", *target, next),
			IfNe(target) => return self.if_zero("!=", *target, next),
			IfLt(target) => return self.if_zero("<", *target, next),
			IfGe(target) => return self.if_zero(">=", *target, next),
			IfGt(target) => return self.if_zero(">", *target, next),
			IfLe(target) => return self.if_zero("<=", *target, next),
			IfICmpEq(target) => return self.if_compare(Int, "==", *target, next),
			IfICmpNe(target) => return self.if_compare(Int, "!=", *target, next),
			IfICmpLt(target) => return self.if_compare(Int, "<", *target, next),
			IfICmpGe(target) => return self.if_compare(Int, ">=", *target, next),
			IfICmpGt(target) => return self.if_compare(Int, ">", *target, next),
			IfICmpLe(target) => return self.if_compare(Int, "<=", *target, next),
			IfACmpEq(target) => return self.if_compare(Reference, "===", *target, next),
			IfACmpNe(target) => return self.if_compare(Reference, "!==", *target, next),
			IfNull(target) => return self.if_null("==", *target, next),
			IfNonNull(target) => return self.if_null("!=", *target, next),
			Goto(target) => return Ok(Some(Exit::Goto(*target))),
			Jsr(_) | Ret(_) => return Err(self.unsupported(insn)),
			TableSwitch { default, low, high: _, table } => {
				let key = self.pop(Int)?;
				let cases = table.iter()
					.enumerate()
					.map(|(index, target)| (low.wrapping_add(index as i32), *target))
					.collect();
				return Ok(Some(Exit::Switch { key, cases, default: *default }));
			},
			LookupSwitch { default, pairs } => {
				let key = self.pop(Int)?;
				return Ok(Some(Exit::Switch { key, cases: pairs.clone(), default: *default }));
			},

			IReturn => return Ok(Some(Exit::Return(Some(self.pop(Int)?)))),
			LReturn => return Ok(Some(Exit::Return(Some(self.pop(Long)?)))),
			FReturn => return Ok(Some(Exit::Return(Some(self.pop(Float)?)))),
			DReturn => return Ok(Some(Exit::Return(Some(self.pop(Double)?)))),
			AReturn => return Ok(Some(Exit::Return(Some(self.pop(Reference)?)))),
			Return => return Ok(Some(Exit::Return(None))),

			GetStatic(field) => {
				let kind = Self::field_kind(field)?;
				let field = self.static_field(field)?;
				self.push_expr(kind, field);
			},
			PutStatic(field) => {
				let value = self.pop(Self::field_kind(field)?)?;
				let field = self.static_field(field)?;
				self.emit(format!("{field} = {value};"));
			},
			GetField(field) => {
				self.features.insert(Feature::NullChecks);
				let kind = Self::field_kind(field)?;
				let object = self.pop(Reference)?;
				let name = self.instance_field(field)?;
				self.push_expr(kind, format!("$vm.nn({object}).{name}"));
			},
			PutField(field) => {
				self.features.insert(Feature::NullChecks);
				let value = self.pop(Self::field_kind(field)?)?;
				let object = self.pop(Reference)?;
				let name = self.instance_field(field)?;
				self.emit(format!("$vm.nn({object}).{name} = {value};"));
			},
			InvokeVirtual(method) | InvokeInterface(method) => self.invoke_virtual(method)?,
			InvokeSpecial(method, _) => self.invoke_special(method)?,
			InvokeStatic(method, _) => self.invoke_static(method)?,
			InvokeDynamic(_) => return Err(self.unsupported(insn)),

			New(class) => self.push_expr(Reference, format!("new {}()", mangle::class_name(class.as_str()))),
			NewArray(array_type) => {
				self.features.insert(Feature::Arrays);
				let length = self.pop(Int)?;
				self.push_expr(Reference, format!("$vm.newArray(\"[{}\", {length})", array_type.descriptor()));
			},
			ANewArray(class) => {
				self.features.insert(Feature::Arrays);
				let length = self.pop(Int)?;
				let descriptor = class_literal(&Self::array_descriptor(class));
				self.push_expr(Reference, format!("$vm.newArray({descriptor}, {length})"));
			},
			MultiANewArray(class, dimensions) => {
				self.features.insert(Feature::Arrays);
				let mut lengths = Vec::with_capacity(*dimensions as usize);
				for _ in 0..*dimensions {
					lengths.push(self.pop(Int)?);
				}
				lengths.reverse();
				self.push_expr(Reference, format!("$vm.multiNewArray({}, [{}])", class_literal(class.as_str()), lengths.join(", ")));
			},
			ArrayLength => {
				self.features.insert(Feature::NullChecks);
				self.unary(Reference, Int, |a| format!("$vm.nn({a}).length"))?;
			},
			AThrow => {
				self.features.insert(Feature::NullChecks);
				let exception = self.pop(Reference)?;
				self.emit(format!("throw $vm.nn({exception});"));
				return Ok(Some(Exit::Throw));
			},
			CheckCast(class) => {
				self.features.insert(Feature::TypeChecks);
				let object = self.pop(Reference)?;
				self.emit(format!("$vm.cast({object}, {});", class_literal(class.as_str())));
				self.push(Reference);
			},
			InstanceOf(class) => {
				self.features.insert(Feature::TypeChecks);
				let literal = class_literal(class.as_str());
				self.unary(Reference, Int, |a| format!("$vm.isInst({a}, {literal}) ? 1 : 0"))?;
			},
			MonitorEnter | MonitorExit => {
				self.features.insert(Feature::NullChecks);
				let object = self.pop(Reference)?;
				self.emit(format!("$vm.nn({object});"));
			},
		}
		Ok(None)
	}
}

/// Records the stack a block is entered with, queueing it the first time.
fn merge(cfg: &ControlFlow, entries: &mut [Option<Vec<Kind>>], queue: &mut Vec<usize>, target: usize, stack: &[Kind]) -> Result<()> {
	match &entries[target] {
		None => {
			entries[target] = Some(stack.to_vec());
			queue.push(target);
		},
		Some(existing) if existing == stack => {},
		Some(existing) => {
			let reason = format!("the block is entered with the stacks {existing:?} and {stack:?}");
			return Err(CompileError::control_flow(cfg.blocks[target].start, reason).into());
		},
	}
	Ok(())
}
